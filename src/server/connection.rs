//! Owned TCP endpoints.
//!
//! A [`Connection`] owns at most one socket. The listening side is created
//! with [`Connection::new`] and walked through `bind`/`listen`/`accept`; each
//! accepted client is a separate `Connection`. The socket is shut down and
//! released exactly once, by [`Connection::close`] or on drop.

use std::io::{self, Read, Write};
use std::mem;
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};

use crate::server::error::Error;

#[cfg(unix)]
const BACKLOG: i32 = libc::SOMAXCONN as i32;
#[cfg(not(unix))]
const BACKLOG: i32 = 128;

/// An owned socket handle. `None` marks a closed or moved-from connection.
#[derive(Debug, Default)]
pub struct Connection {
    socket: Option<Socket>,
    peer: Option<SocketAddr>,
}

impl Connection {
    /// Create an unbound IPv4 TCP socket with `SO_REUSEADDR` set, so a
    /// restarted server can bind its port again right away.
    pub fn new() -> Result<Self, Error> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(Error::Socket)?;
        socket.set_reuse_address(true).map_err(Error::Socket)?;

        Ok(Self {
            socket: Some(socket),
            peer: None,
        })
    }

    /// An invalid connection that owns nothing.
    pub fn invalid() -> Self {
        Self::default()
    }

    fn socket(&self) -> Result<&Socket, Error> {
        self.socket.as_ref().ok_or(Error::ConnectionClosed)
    }

    pub fn is_valid(&self) -> bool {
        self.socket.is_some()
    }

    /// Bind to `port` on all local interfaces.
    pub fn bind(&self, port: u16) -> Result<(), Error> {
        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        self.socket()?
            .bind(&SocketAddr::V4(addr).into())
            .map_err(|source| Error::Bind { port, source })
    }

    /// Start accepting connections with the platform's maximum backlog.
    pub fn listen(&self) -> Result<(), Error> {
        self.socket()?.listen(BACKLOG).map_err(Error::Listen)
    }

    /// Block until a client connects and return it as a new connection.
    pub fn accept(&self) -> Result<Connection, Error> {
        let (socket, addr) = self.socket()?.accept().map_err(Error::Accept)?;
        Ok(Self {
            socket: Some(socket),
            peer: addr.as_socket(),
        })
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<(), Error> {
        Ok(self.socket()?.set_nonblocking(nonblocking)?)
    }

    /// The locally bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        let addr = self.socket()?.local_addr()?;
        addr.as_socket().ok_or_else(|| {
            Error::IoError(io::Error::new(io::ErrorKind::Unsupported, "not an inet address"))
        })
    }

    /// The remote address of an accepted connection.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// The OS handle, for callers that write to the socket directly.
    #[cfg(unix)]
    pub fn native_handle(&self) -> Option<std::os::unix::io::RawFd> {
        use std::os::unix::io::AsRawFd;
        self.socket.as_ref().map(AsRawFd::as_raw_fd)
    }

    #[cfg(windows)]
    pub fn native_handle(&self) -> Option<std::os::windows::io::RawSocket> {
        use std::os::windows::io::AsRawSocket;
        self.socket.as_ref().map(AsRawSocket::as_raw_socket)
    }

    /// Move the socket out, leaving `self` closed.
    pub fn transfer(&mut self) -> Connection {
        mem::take(self)
    }

    /// Shut down both directions and release the socket. Returns `false` if
    /// there was nothing to close.
    pub fn close(&mut self) -> bool {
        match self.socket.take() {
            Some(socket) => {
                // The peer may already be gone; the handle is released either way.
                let _ = socket.shutdown(Shutdown::Both);
                self.peer = None;
                true
            }
            None => false,
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection is closed")
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.as_mut().ok_or_else(closed)?.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket.as_mut().ok_or_else(closed)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.socket.as_mut().ok_or_else(closed)?.flush()
    }
}
