//! The blocking byte-stream abstraction the client reads from and writes to.

use std::{
    fmt::Debug,
    io::{self, Read, Write},
    net::{Shutdown, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tracing::debug;

/// The outcome of a single [`Transport::read_some()`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadStatus {
    /// Zero or more bytes were read and the stream is still open.
    Ok,
    /// No bytes arrived before the timeout elapsed.
    Timeout,
    /// The remote end closed the stream, or it was closed locally.
    Closed,
}

/// The number of bytes read and the status of a [`Transport::read_some()`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadResult {
    /// The number of bytes written into the buffer.
    pub read_size: usize,
    /// Whether the stream is still open.
    pub status: ReadStatus,
}

impl ReadResult {
    /// A read of `read_size` bytes from an open stream.
    pub const fn ok(read_size: usize) -> Self {
        Self {
            read_size,
            status: ReadStatus::Ok,
        }
    }

    /// A read that timed out without data.
    pub const TIMEOUT: Self = Self {
        read_size: 0,
        status: ReadStatus::Timeout,
    };

    /// A read that observed the stream closing.
    pub const CLOSED: Self = Self {
        read_size: 0,
        status: ReadStatus::Closed,
    };
}

/// A blocking, ordered byte stream to a live gateway.
pub trait Transport {
    /// Writes all of `buf`, blocking until done.
    ///
    /// # Errors
    /// This function returns an error if the stream fails or is closed.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Reads whatever is available into `buf`, waiting at most `timeout` for the first
    /// byte. A `None` or zero `timeout` blocks indefinitely.
    ///
    /// # Errors
    /// This function returns an error for I/O failures other than a timeout or the
    /// stream closing, which are reported through [`ReadResult::status`].
    fn read_some(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> io::Result<ReadResult>;

    /// Fills `buf` completely, blocking as long as needed.
    ///
    /// # Errors
    /// This function returns an error of kind [`io::ErrorKind::UnexpectedEof`] if the
    /// stream closes before `buf` is full.
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// Returns a handle that can close the transport from another thread, unblocking
    /// any in-flight read.
    fn closer(&self) -> ShutdownHandle;

    /// Closes the transport. Subsequent reads report [`ReadStatus::Closed`].
    ///
    /// # Errors
    /// This function returns an error if the transport fails to shut down.
    fn close(&mut self) -> io::Result<()> {
        self.closer().shutdown()
    }
}

/// A cloneable, thread-safe handle for closing a [`Transport`].
#[derive(Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    on_shutdown: Arc<dyn Fn() -> io::Result<()> + Send + Sync>,
}

impl ShutdownHandle {
    /// Creates a handle that calls `on_shutdown` the first time
    /// [`shutdown()`](Self::shutdown) is called.
    pub fn new(on_shutdown: impl Fn() -> io::Result<()> + Send + Sync + 'static) -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            on_shutdown: Arc::new(on_shutdown),
        }
    }

    /// Closes the transport. Only the first call has an effect.
    ///
    /// # Errors
    /// This function returns an error if the underlying shutdown fails.
    pub fn shutdown(&self) -> io::Result<()> {
        if self.requested.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        (self.on_shutdown)()
    }

    /// Returns `true` if [`shutdown()`](Self::shutdown) has been called through this or
    /// any cloned handle.
    pub fn is_shutdown(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

impl Debug for ShutdownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("requested", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

/// A [`Transport`] over a [`TcpStream`].
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    closer: ShutdownHandle,
    read_timeout: Option<Duration>,
}

impl TcpTransport {
    /// Opens a TCP connection to `host` on `port`.
    ///
    /// # Errors
    /// This function returns an error if the host can't be resolved or the connection
    /// fails.
    pub fn connect(host: &str, port: u16) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        debug!(host, port, "Connected to gateway");
        Self::from_stream(stream)
    }

    /// Wraps an already connected `stream`.
    ///
    /// # Errors
    /// This function returns an error if the stream handle can't be cloned for the
    /// shutdown handle.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let shutdown_stream = stream.try_clone()?;
        let closer = ShutdownHandle::new(move || match shutdown_stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        });
        Ok(Self {
            stream,
            closer,
            read_timeout: None,
        })
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let timeout = timeout.filter(|t| !t.is_zero());
        if timeout != self.read_timeout {
            self.stream.set_read_timeout(timeout)?;
            self.read_timeout = timeout;
        }
        Ok(())
    }
}

impl Transport for TcpTransport {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf)
    }

    fn read_some(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> io::Result<ReadResult> {
        if self.closer.is_shutdown() {
            return Ok(ReadResult::CLOSED);
        }
        self.set_read_timeout(timeout)?;
        loop {
            match self.stream.read(buf) {
                Ok(0) => return Ok(ReadResult::CLOSED),
                Ok(read_size) => return Ok(ReadResult::ok(read_size)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Ok(ReadResult::TIMEOUT)
                }
                Err(_) if self.closer.is_shutdown() => return Ok(ReadResult::CLOSED),
                Err(e) => return Err(e),
            }
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.set_read_timeout(None)?;
        self.stream.read_exact(buf)
    }

    fn closer(&self) -> ShutdownHandle {
        self.closer.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::{net::TcpListener, thread};

    use super::*;

    fn pair() -> (TcpTransport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = TcpTransport::connect("127.0.0.1", port).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn test_read_some_and_write_all() {
        let (mut client, mut server) = pair();
        server.write_all(b"hello").unwrap();
        let mut buf = [0; 16];
        let res = client.read_some(&mut buf, None).unwrap();
        assert_eq!(res.status, ReadStatus::Ok);
        assert_eq!(&buf[..res.read_size], &b"hello"[..res.read_size]);
        client.write_all(b"pong").unwrap();
        let mut reply = [0; 4];
        server.read_exact(&mut reply).unwrap();
        assert_eq!(&reply, b"pong");
    }

    #[test]
    fn test_read_some_timeout() {
        let (mut client, _server) = pair();
        let mut buf = [0; 16];
        let res = client
            .read_some(&mut buf, Some(Duration::from_millis(10)))
            .unwrap();
        assert_eq!(res, ReadResult::TIMEOUT);
    }

    #[test]
    fn test_read_some_remote_close() {
        let (mut client, server) = pair();
        drop(server);
        let mut buf = [0; 16];
        let res = client
            .read_some(&mut buf, Some(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(res, ReadResult::CLOSED);
    }

    #[test]
    fn test_read_exact_eof() {
        let (mut client, mut server) = pair();
        server.write_all(b"abc").unwrap();
        drop(server);
        let mut buf = [0; 8];
        let err = client.read_exact(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_closer_unblocks_read() {
        let (mut client, _server) = pair();
        let closer = client.closer();
        let handle = thread::spawn(move || {
            let mut buf = [0; 16];
            client.read_some(&mut buf, None)
        });
        thread::sleep(Duration::from_millis(50));
        closer.shutdown().unwrap();
        // Second call is a no-op
        closer.shutdown().unwrap();
        assert_eq!(handle.join().unwrap().unwrap(), ReadResult::CLOSED);
        assert!(closer.is_shutdown());
    }
}
