//! Bounded pool of connections to one socket path
//!
//! Connections are owned by the pool while idle and lent out through a
//! [`PooledConnection`] guard. The guard returns the connection exactly once,
//! on [`PooledConnection::release`] or on drop, whichever comes first.
//!
//! ## Capacity
//!
//! Idle, lent, and in-flight dials together never exceed `max_size`. When the
//! pool is full, `acquire` either waits for a release (bounded by the pool
//! timeout) or, with blocking disabled, dials a transient connection that is
//! closed instead of pooled when it comes back.

use crate::connection::UnixConnection;
use crate::error::{Result, TransportError};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Point-in-time view of a pool's bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections parked and ready for reuse
    pub idle: usize,
    /// Connections currently held by callers
    pub lent: usize,
    /// Configured capacity
    pub max_size: usize,
    /// Whether `close` has run
    pub closed: bool,
}

struct LentEntry {
    /// Duplicate descriptor used to shut the socket down if the pool closes
    shutdown: Option<UnixStream>,
    /// Overflow connection dialed past capacity; never pooled
    transient: bool,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<UnixConnection>,
    lent: HashMap<u64, LentEntry>,
    dialing: usize,
    closed: bool,
}

impl PoolState {
    fn live(&self) -> usize {
        self.idle.len() + self.dialing + self.lent.values().filter(|e| !e.transient).count()
    }
}

/// A bounded set of reusable connections to one socket path
pub struct UnixConnectionPool {
    base_url: String,
    socket_path: PathBuf,
    timeout: Option<Duration>,
    max_size: usize,
    block: bool,
    state: Mutex<PoolState>,
    released: Condvar,
    next_ticket: AtomicU64,
}

impl std::fmt::Debug for UnixConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixConnectionPool")
            .field("base_url", &self.base_url)
            .field("socket_path", &self.socket_path)
            .field("timeout", &self.timeout)
            .field("max_size", &self.max_size)
            .field("block", &self.block)
            .field("stats", &self.stats())
            .finish()
    }
}

impl UnixConnectionPool {
    /// Create an empty pool; nothing is dialed until the first `acquire`
    ///
    /// A `max_size` of zero is treated as one.
    pub fn new(
        base_url: impl Into<String>,
        socket_path: impl Into<PathBuf>,
        timeout: Option<Duration>,
        max_size: usize,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            socket_path: socket_path.into(),
            timeout: timeout.filter(|t| !t.is_zero()),
            max_size: max_size.max(1),
            block: true,
            state: Mutex::new(PoolState::default()),
            released: Condvar::new(),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Choose between waiting for a release (default) and dialing transient
    /// overflow connections when the pool is full
    pub fn with_blocking(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    /// The logical URL this pool serves
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The socket path every connection dials
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Maximum number of pooled connections
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Snapshot of idle/lent counts
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            idle: state.idle.len(),
            lent: state.lent.len(),
            max_size: self.max_size,
            closed: state.closed,
        }
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Borrow a connection, reusing an idle one when possible
    ///
    /// When the pool is at capacity this waits up to the pool timeout for a
    /// release and then fails with [`TransportError::PoolExhausted`]. A pool
    /// without a timeout waits indefinitely.
    pub fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        let started = Instant::now();
        let deadline = self.timeout.map(|t| started + t);
        let mut waited_out = false;
        let mut state = self.state.lock();

        loop {
            if state.closed {
                return Err(self.closed_error());
            }

            while let Some(conn) = state.idle.pop() {
                if conn.is_dropped() {
                    debug!(path = %self.socket_path.display(), "discarding stale idle connection");
                    continue;
                }
                trace!(path = %self.socket_path.display(), "reusing idle connection");
                return Ok(self.lend(&mut state, conn, false));
            }

            if state.live() < self.max_size {
                return self.dial_and_lend(&mut state, false);
            }

            if !self.block {
                debug!(
                    path = %self.socket_path.display(),
                    max_size = self.max_size,
                    "pool full, dialing transient connection"
                );
                return self.dial_and_lend(&mut state, true);
            }

            if waited_out {
                debug!(path = %self.socket_path.display(), "pool exhausted");
                return Err(TransportError::PoolExhausted {
                    path: self.socket_path.clone(),
                    max_size: self.max_size,
                    waited: started.elapsed(),
                });
            }

            match deadline {
                Some(deadline) => {
                    waited_out = self.released.wait_until(&mut state, deadline).timed_out();
                }
                None => self.released.wait(&mut state),
            }
        }
    }

    /// Dial with the lock released; the reservation in `dialing` keeps
    /// concurrent acquirers from overshooting capacity meanwhile
    fn dial_and_lend(
        self: &Arc<Self>,
        state: &mut MutexGuard<'_, PoolState>,
        transient: bool,
    ) -> Result<PooledConnection> {
        if !transient {
            state.dialing += 1;
        }

        let dialed = MutexGuard::unlocked(state, || {
            UnixConnection::connect(self.base_url.as_str(), &self.socket_path, self.timeout)
        });

        if !transient {
            state.dialing -= 1;
        }

        match dialed {
            Ok(conn) if state.closed => {
                drop(conn);
                Err(self.closed_error())
            }
            Ok(conn) => {
                debug!(path = %self.socket_path.display(), transient, "dialed new connection");
                Ok(self.lend(state, conn, transient))
            }
            Err(e) => {
                // The reservation is gone, so a waiter may now dial instead.
                self.released.notify_one();
                Err(e)
            }
        }
    }

    fn lend(
        self: &Arc<Self>,
        state: &mut PoolState,
        conn: UnixConnection,
        transient: bool,
    ) -> PooledConnection {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let shutdown = conn.shutdown_handle().ok();
        state.lent.insert(ticket, LentEntry { shutdown, transient });
        PooledConnection {
            pool: Arc::clone(self),
            ticket,
            conn: Some(conn),
            broken: false,
        }
    }

    /// Take a lent connection back
    ///
    /// Unknown tickets are ignored, so a connection can never be counted twice.
    /// Broken, transient, or post-close returns are closed instead of pooled.
    fn release(&self, ticket: u64, conn: UnixConnection, broken: bool) {
        let mut state = self.state.lock();
        let Some(entry) = state.lent.remove(&ticket) else {
            debug!(ticket, "ignoring release of a connection this pool is not lending");
            drop(state);
            return;
        };

        let discard = if state.closed || broken || entry.transient {
            Some(conn)
        } else {
            state.idle.push(conn);
            None
        };
        drop(state);
        self.released.notify_one();

        if discard.is_some() {
            trace!(
                path = %self.socket_path.display(),
                broken,
                transient = entry.transient,
                "closing returned connection"
            );
        }
        // `entry` and `discard` drop here, outside the lock, closing their descriptors.
    }

    /// Close every connection the pool owns, idle or lent
    ///
    /// Idle connections are closed immediately. Lent connections are shut down
    /// so in-flight I/O fails, and their descriptors are closed when the
    /// borrower's guard is released. Calling `close` again is a no-op.
    pub fn close(&self) {
        self.shut(true);
    }

    /// Close idle connections and stop lending, letting in-flight requests finish
    ///
    /// Used for LRU eviction: a request that is mid-exchange on an evicted pool
    /// completes normally, and its connection is closed on release instead of
    /// being parked.
    pub fn retire(&self) {
        self.shut(false);
    }

    fn shut(&self, interrupt_lent: bool) {
        let (idle, lent) = {
            let mut state = self.state.lock();
            if state.closed && !interrupt_lent {
                return;
            }
            state.closed = true;
            let idle = std::mem::take(&mut state.idle);
            let lent: Vec<UnixStream> = if interrupt_lent {
                state
                    .lent
                    .values_mut()
                    .filter_map(|entry| entry.shutdown.take())
                    .collect()
            } else {
                Vec::new()
            };
            (idle, lent)
        };
        self.released.notify_all();

        if idle.is_empty() && lent.is_empty() {
            return;
        }
        debug!(
            path = %self.socket_path.display(),
            idle = idle.len(),
            lent = lent.len(),
            "closing pooled connections"
        );
        for stream in &lent {
            let _ = stream.shutdown(Shutdown::Both);
        }
        drop(lent);
        drop(idle);
    }

    fn closed_error(&self) -> TransportError {
        TransportError::PoolClosed {
            path: self.socket_path.clone(),
        }
    }
}

/// A connection lent out by a [`UnixConnectionPool`]
///
/// Reads and writes go straight to the socket. Dropping the guard returns the
/// connection to the pool.
pub struct PooledConnection {
    pool: Arc<UnixConnectionPool>,
    ticket: u64,
    conn: Option<UnixConnection>,
    broken: bool,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("socket_path", &self.pool.socket_path)
            .field("ticket", &self.ticket)
            .field("broken", &self.broken)
            .finish()
    }
}

impl PooledConnection {
    /// Flag the connection as unusable so the pool closes it on release
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Whether `mark_broken` has been called
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// The pool this connection came from
    pub fn pool(&self) -> &Arc<UnixConnectionPool> {
        &self.pool
    }

    /// Borrow the underlying connection
    pub fn connection(&self) -> Option<&UnixConnection> {
        self.conn.as_ref()
    }

    /// Return the connection to the pool now rather than on drop
    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(self.ticket, conn, self.broken);
        }
    }

    fn inner(&mut self) -> io::Result<&mut UnixConnection> {
        self.conn.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "connection already released")
        })
    }
}

impl Read for PooledConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner()?.read(buf)
    }
}

impl Write for PooledConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner()?.flush()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.give_back();
    }
}
