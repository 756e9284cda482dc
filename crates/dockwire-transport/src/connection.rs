//! A single stream connection dialed to a socket path

use crate::error::{Result, TransportError};
use socket2::{Domain, SockAddr, SockRef, Socket, Type};
use std::io::{self, Read, Write};
use std::mem::MaybeUninit;
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

/// An open stream to a Unix domain socket
///
/// The connection knows nothing about HTTP; it is a plain bidirectional byte
/// stream with the configured timeout applied to the dial and to every read
/// and write. No retries happen here.
#[derive(Debug)]
pub struct UnixConnection {
    base_url: String,
    socket_path: PathBuf,
    timeout: Option<Duration>,
    stream: UnixStream,
}

impl UnixConnection {
    /// Dial `socket_path`, giving up after `timeout`
    ///
    /// `base_url` is the logical URL the connection serves and is kept only for
    /// diagnostics. A `None` or zero timeout blocks on the dial indefinitely.
    pub fn connect(
        base_url: impl Into<String>,
        socket_path: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();
        let timeout = timeout.filter(|t| !t.is_zero());

        let connect_err = |source: io::Error| TransportError::Connect {
            path: socket_path.clone(),
            source,
        };

        let addr = SockAddr::unix(&socket_path).map_err(connect_err)?;
        let socket = Socket::new(Domain::UNIX, Type::STREAM, None).map_err(connect_err)?;

        let dialed = match timeout {
            Some(t) => socket.connect_timeout(&addr, t),
            None => socket.connect(&addr),
        };
        if let Err(e) = dialed {
            debug!(path = %socket_path.display(), error = %e, "socket dial failed");
            return Err(match (e.kind(), timeout) {
                (io::ErrorKind::TimedOut, Some(timeout)) => TransportError::ConnectTimeout {
                    path: socket_path.clone(),
                    timeout,
                },
                _ => connect_err(e),
            });
        }

        let stream = UnixStream::from(OwnedFd::from(socket));
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;

        trace!(path = %socket_path.display(), "socket connected");
        Ok(Self {
            base_url: base_url.into(),
            socket_path,
            timeout,
            stream,
        })
    }

    /// The logical URL this connection was dialed for
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The socket path this connection is bound to
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// The connect/read/write timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Borrow the underlying stream
    pub fn stream(&self) -> &UnixStream {
        &self.stream
    }

    /// Duplicate the descriptor so the owner of the copy can shut the stream down
    pub(crate) fn shutdown_handle(&self) -> io::Result<UnixStream> {
        self.stream.try_clone()
    }

    /// Check whether an idle connection can no longer be reused
    ///
    /// A peer that has hung up reads as EOF; any readable byte on an idle
    /// connection is unsolicited and also makes it unusable for the next
    /// request.
    pub fn is_dropped(&self) -> bool {
        let sock = SockRef::from(&self.stream);
        if sock.set_nonblocking(true).is_err() {
            return true;
        }
        let mut probe = [MaybeUninit::<u8>::uninit(); 1];
        let dropped = match sock.peek(&mut probe) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
            Ok(_) | Err(_) => true,
        };
        sock.set_nonblocking(false).is_err() || dropped
    }
}

impl Read for UnixConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for UnixConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}
