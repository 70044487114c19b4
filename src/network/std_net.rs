//! `std::net` implementations of the socket traits.
//!
//! These run the protocol clients against real servers from a host. The host
//! has no modem to offload TLS/DTLS to, so any request for a secured socket is
//! refused with [`Error::SocketOption`].

use std::io::{self, Read as _, Write as _};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use log::warn;

use super::error::Error;
use super::security::SecureSocketOptions;
use super::{Close, Connect, Connection, Datagram, DatagramStack, Read, Resolve, Write};

fn map_io(e: io::Error, fallback: Error) -> Error {
    match e.kind() {
        io::ErrorKind::WouldBlock => Error::WouldBlock,
        io::ErrorKind::TimedOut => Error::Timeout,
        io::ErrorKind::ConnectionRefused => Error::ConnectionRefused,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => Error::ConnectionClosed,
        io::ErrorKind::NotConnected => Error::NotOpen,
        _ => fallback,
    }
}

fn refuse_security(security: Option<&SecureSocketOptions<'_>>) -> Result<(), Error> {
    match security {
        Some(_) => {
            warn!("Secure sockets are not available on this host");
            Err(Error::SocketOption)
        }
        None => Ok(()),
    }
}

/// A TCP stream.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
}

impl TcpConnection {
    /// Wrap an already connected stream.
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Read for TcpConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.stream.read(buf).map_err(|e| map_io(e, Error::ReadError))
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Self::Error> {
        // A zero duration is rejected by `set_read_timeout`.
        let timeout = timeout.map(|t| t.max(Duration::from_millis(1)));
        self.stream
            .set_read_timeout(timeout)
            .map_err(|_| Error::SocketOption)
    }
}

impl Write for TcpConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream
            .write(buf)
            .map_err(|e| map_io(e, Error::WriteError))
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream.flush().map_err(|e| map_io(e, Error::WriteError))
    }
}

impl Close for TcpConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        match self.stream.shutdown(std::net::Shutdown::Both) {
            Ok(()) => Ok(()),
            // The peer may already have gone.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(map_io(e, Error::ProtocolError)),
        }
    }
}

impl Connection for TcpConnection {}

/// A UDP socket connected to one peer.
#[derive(Debug)]
pub struct UdpConnection {
    socket: UdpSocket,
}

impl Datagram for UdpConnection {
    fn send(&mut self, buf: &[u8]) -> Result<usize, Error> {
        self.socket
            .send(buf)
            .map_err(|e| map_io(e, Error::WriteError))
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, Error> {
        // A zero duration is rejected by `set_read_timeout`.
        let timeout = timeout.map(|t| t.max(Duration::from_millis(1)));
        self.socket
            .set_read_timeout(timeout)
            .map_err(|_| Error::SocketOption)?;
        match self.socket.recv(buf) {
            Ok(n) => Ok(n),
            // Unix reports an elapsed read timeout as EAGAIN.
            Err(e) if timeout.is_some() && e.kind() == io::ErrorKind::WouldBlock => {
                Err(Error::Timeout)
            }
            Err(e) => Err(map_io(e, Error::ReadError)),
        }
    }

    fn close(self) -> Result<(), Error> {
        drop(self.socket);
        Ok(())
    }
}

/// The host's network stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdStack;

impl Connect for StdStack {
    type Connection = TcpConnection;

    fn connect(
        &mut self,
        remote: SocketAddrV4,
        security: Option<&SecureSocketOptions<'_>>,
    ) -> Result<Self::Connection, Error> {
        refuse_security(security)?;
        let stream =
            TcpStream::connect(remote).map_err(|e| map_io(e, Error::ConnectionRefused))?;
        Ok(TcpConnection::new(stream))
    }
}

impl DatagramStack for StdStack {
    type Socket = UdpConnection;

    fn open(
        &mut self,
        remote: SocketAddrV4,
        security: Option<&SecureSocketOptions<'_>>,
    ) -> Result<Self::Socket, Error> {
        refuse_security(security)?;
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))
            .map_err(|e| map_io(e, Error::NotOpen))?;
        socket
            .connect(remote)
            .map_err(|e| map_io(e, Error::ConnectionRefused))?;
        Ok(UdpConnection { socket })
    }
}

impl Resolve for StdStack {
    fn resolve(&mut self, hostname: &str, port: u16) -> Result<SocketAddrV4, Error> {
        let addrs = (hostname, port)
            .to_socket_addrs()
            .map_err(|_| Error::ResolveFailed)?;
        addrs
            .filter_map(|addr| match addr {
                SocketAddr::V4(v4) => Some(v4),
                SocketAddr::V6(_) => None,
            })
            .next()
            .ok_or(Error::AddressNotFound)
    }
}
