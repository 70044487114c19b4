//! A network abstraction layer for the modem's offloaded sockets
//!
//! The cellular modem owns the IP stack: the application opens stream and
//! datagram sockets, optionally asks the modem to wrap them in TLS/DTLS using
//! credentials referenced by security tag, and resolves hostnames through the
//! modem's DNS client. This module describes those capabilities as traits so the
//! protocol clients in [`application`] can run over the vendor driver on target
//! and over `std::net` (feature `std`) or mocks on a host.

#![allow(async_fn_in_trait)]
#![deny(unsafe_code)]

use core::net::SocketAddrV4;
use core::time::Duration;

/// Common error types for network operations
pub mod error;

/// Security tags, TLS/DTLS socket options and credential provisioning
pub mod security;

/// Application layer protocol implementations
pub mod application;

/// Adapters over `std::net` for running on a host
#[cfg(feature = "std")]
pub mod std_net;

use error::Error;
use security::SecureSocketOptions;

/// Re-exports of common traits
pub mod prelude {
    #[cfg(feature = "async")]
    pub use super::{AsyncClose, AsyncConnection, AsyncDatagram, AsyncRead, AsyncWrite};
    pub use super::{Close, Connect, Connection, Datagram, DatagramStack, Read, Resolve, Write};
}

/// Read half of a stream connection.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug + Into<Error>;
    /// Read data from the connection.
    ///
    /// `Ok(0)` means the peer closed the stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
    /// Bound how long `read` blocks when nothing has arrived; it then fails
    /// with [`Error::Timeout`] or [`Error::WouldBlock`]. `None` blocks until
    /// data arrives.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Self::Error>;
}

/// Write half of a stream connection.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug + Into<Error>;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Closing a connection releases the modem socket.
pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug + Into<Error>;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A stream connection (TCP or TLS).
pub trait Connection: Read + Write + Close {}

/// Opens stream connections (TCP, or TLS when `security` is given).
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Open a connection to `remote`.
    fn connect(
        &mut self,
        remote: SocketAddrV4,
        security: Option<&SecureSocketOptions<'_>>,
    ) -> Result<Self::Connection, Error>;
}

/// A connected datagram socket (UDP, or DTLS 1.2).
pub trait Datagram {
    /// Send one datagram to the connected peer.
    fn send(&mut self, buf: &[u8]) -> Result<usize, Error>;

    /// Receive one datagram.
    ///
    /// `None` blocks until data arrives. With a timeout, an elapsed wait is
    /// reported as [`Error::Timeout`].
    fn recv(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, Error>;

    /// Release the socket.
    fn close(self) -> Result<(), Error>
    where
        Self: Sized;
}

/// Opens connected datagram sockets.
pub trait DatagramStack {
    /// Associated socket type
    type Socket: Datagram;
    /// Create a socket and connect it to `remote`, wrapping it in DTLS when
    /// `security` is given.
    fn open(
        &mut self,
        remote: SocketAddrV4,
        security: Option<&SecureSocketOptions<'_>>,
    ) -> Result<Self::Socket, Error>;
}

/// Hostname resolution through the modem's DNS client.
pub trait Resolve {
    /// Resolve `hostname` to an IPv4 address with `port` applied.
    fn resolve(&mut self, hostname: &str, port: u16) -> Result<SocketAddrV4, Error>;
}

/// Resolve a server name and log the address found.
pub fn server_resolve<R: Resolve>(
    resolver: &mut R,
    hostname: &str,
    port: u16,
) -> Result<SocketAddrV4, Error> {
    match resolver.resolve(hostname, port) {
        Ok(addr) => {
            log::info!("IPv4 Address found {}", addr.ip());
            Ok(addr)
        }
        Err(e) => {
            log::error!("ERROR: resolving {} failed: {}", hostname, e);
            Err(e)
        }
    }
}

// Core async traits
/// Asynchronous counterpart of [`Read`].
#[cfg(feature = "async")]
pub trait AsyncRead {
    /// Associated error type
    type Error: core::fmt::Debug + Into<Error>;
    /// Read data from the connection asynchronously
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Asynchronous counterpart of [`Write`].
#[cfg(feature = "async")]
pub trait AsyncWrite {
    /// Associated error type
    type Error: core::fmt::Debug + Into<Error>;
    /// Write data to the connection asynchronously
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer asynchronously
    async fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Asynchronous counterpart of [`Close`].
#[cfg(feature = "async")]
pub trait AsyncClose {
    /// Associated error type
    type Error: core::fmt::Debug + Into<Error>;
    /// Close the connection asynchronously
    async fn close(self) -> Result<(), Self::Error>;
}

/// Asynchronous counterpart of [`Connection`].
#[cfg(feature = "async")]
pub trait AsyncConnection: AsyncRead + AsyncWrite + AsyncClose {}

/// Asynchronous counterpart of [`Datagram`].
#[cfg(feature = "async")]
pub trait AsyncDatagram {
    /// Send one datagram to the connected peer.
    async fn send(&mut self, buf: &[u8]) -> Result<usize, Error>;
    /// Receive one datagram.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error>;
}
