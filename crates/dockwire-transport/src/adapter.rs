//! Pooled HTTP adapter for socket endpoints
//!
//! The adapter owns an LRU cache of [`UnixConnectionPool`]s keyed by logical
//! URL. Lookup-or-create runs under one lock, so two callers can never build
//! separate pools for the same URL. When an insert pushes the cache past
//! `pool_connections`, the least recently used pool is evicted and retired
//! after the lock is released, so descriptor teardown never stalls unrelated
//! lookups. Retiring closes the pool's idle connections at once; connections
//! lent from it finish their exchange and are closed when they come back.

use crate::connection::UnixConnection;
use crate::error::Result;
use crate::http1;
use crate::pool::UnixConnectionPool;
use crate::url::socket_path_from_url;
use crate::{DEFAULT_MAX_POOL_SIZE, DEFAULT_NUM_POOLS, DEFAULT_TIMEOUT};
use http::{Request, Response, Uri};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Pool key used for requests whose URI carries no scheme or authority
pub const DEFAULT_POOL_KEY: &str = "http+docker://localhost";

/// Tuning knobs for [`UnixHttpAdapter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Connect/read/write timeout; also bounds the wait on a full pool
    pub timeout: Option<Duration>,
    /// Maximum number of pools kept in the LRU cache
    pub pool_connections: usize,
    /// Maximum number of connections per pool
    pub max_pool_size: usize,
    /// Wait for a release when a pool is full instead of dialing overflow connections
    pub pool_block: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            pool_connections: DEFAULT_NUM_POOLS,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            pool_block: true,
        }
    }
}

/// HTTP adapter that speaks to a daemon over a Unix domain socket
pub struct UnixHttpAdapter {
    socket_path: PathBuf,
    config: AdapterConfig,
    pools: Mutex<LruCache<String, Arc<UnixConnectionPool>>>,
}

impl std::fmt::Debug for UnixHttpAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixHttpAdapter")
            .field("socket_path", &self.socket_path)
            .field("config", &self.config)
            .field("pools", &self.pool_count())
            .finish()
    }
}

impl UnixHttpAdapter {
    /// Create an adapter for `socket_url` (`http+unix://...` or `unix://...`)
    pub fn new(socket_url: &str, config: AdapterConfig) -> Result<Self> {
        let socket_path = socket_path_from_url(socket_url)?;
        Ok(Self::with_socket_path(socket_path, config))
    }

    /// Create an adapter for an already-resolved socket path
    pub fn with_socket_path(socket_path: impl Into<PathBuf>, config: AdapterConfig) -> Self {
        let capacity = NonZeroUsize::new(config.pool_connections).unwrap_or(NonZeroUsize::MIN);
        Self {
            socket_path: socket_path.into(),
            config,
            pools: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The socket every pool dials
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// The adapter's configuration
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Number of pools currently cached
    pub fn pool_count(&self) -> usize {
        self.pools.lock().len()
    }

    /// Look up the pool for `url`, creating it on a miss
    ///
    /// A hit marks the pool most recently used. A miss that overflows the
    /// cache evicts and retires the least recently used pool.
    pub fn get_connection_pool(&self, url: &str) -> Arc<UnixConnectionPool> {
        let (pool, evicted) = {
            let mut pools = self.pools.lock();
            if let Some(pool) = pools.get(url) {
                return Arc::clone(pool);
            }

            let pool = Arc::new(
                UnixConnectionPool::new(
                    url,
                    &self.socket_path,
                    self.config.timeout,
                    self.config.max_pool_size,
                )
                .with_blocking(self.config.pool_block),
            );
            let evicted = pools.push(url.to_string(), Arc::clone(&pool));
            (pool, evicted)
        };

        if let Some((evicted_url, evicted_pool)) = evicted {
            debug!(url = %evicted_url, "evicting least recently used connection pool");
            evicted_pool.retire();
        }
        debug!(url, path = %self.socket_path.display(), "created connection pool");
        pool
    }

    /// The request-target to put on the wire
    ///
    /// Proxies have no meaning on a local socket, so this is always the path
    /// and query of the request URI, independent of any proxy settings.
    pub fn request_url<B>(request: &Request<B>) -> String {
        request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .filter(|target| !target.is_empty())
            .unwrap_or_else(|| "/".to_string())
    }

    /// Send `request` over a pooled connection and read the full response
    ///
    /// The pool is chosen by the request's `scheme://authority`. Connections
    /// are returned to the pool only when the response left them reusable.
    pub fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let key = pool_key(request.uri());
        let pool = self.get_connection_pool(&key);
        let mut conn = pool.acquire()?;
        let target = Self::request_url(&request);

        debug!(method = %request.method(), target = %target, "sending request");
        let exchanged = http1::write_request(&mut conn, &request, &target)
            .and_then(|()| http1::read_response(&mut conn, request.method()));

        match exchanged {
            Ok(exchange) => {
                if !exchange.reusable {
                    conn.mark_broken();
                }
                debug!(status = %exchange.response.status(), "received response");
                Ok(exchange.response)
            }
            Err(e) => {
                conn.mark_broken();
                Err(e)
            }
        }
    }

    /// Dial a standalone connection outside of any pool
    pub fn connect(&self) -> Result<UnixConnection> {
        UnixConnection::connect(DEFAULT_POOL_KEY, &self.socket_path, self.config.timeout)
    }

    /// Drop every cached pool and close its connections
    pub fn close(&self) {
        let drained: Vec<Arc<UnixConnectionPool>> = {
            let mut pools = self.pools.lock();
            let mut drained = Vec::with_capacity(pools.len());
            while let Some((_, pool)) = pools.pop_lru() {
                drained.push(pool);
            }
            drained
        };
        for pool in drained {
            pool.close();
        }
    }
}

impl Drop for UnixHttpAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

fn pool_key(uri: &Uri) -> String {
    match (uri.scheme_str(), uri.authority()) {
        (Some(scheme), Some(authority)) => format!("{}://{}", scheme, authority),
        _ => DEFAULT_POOL_KEY.to_string(),
    }
}
