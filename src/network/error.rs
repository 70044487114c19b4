//! Common error types for network operations

/// A common error type for network operations.
///
/// This enum defines a set of common errors that can occur when working with
/// sockets on the modem. It is designed to be simple and portable for `no_std`
/// environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// A connection attempt was refused.
    ConnectionRefused,
    /// A timeout occurred.
    Timeout,
    /// The operation would block (`EAGAIN`/`EWOULDBLOCK`).
    WouldBlock,
    /// The connection was closed.
    ConnectionClosed,
    /// An invalid address was provided.
    InvalidAddress,
    /// Name resolution failed.
    ResolveFailed,
    /// Name resolution succeeded but returned no usable address.
    AddressNotFound,
    /// A socket option could not be applied.
    SocketOption,
    /// A message did not fit in its fixed-size buffer.
    MessageTooLarge,
    /// A protocol-specific error occurred.
    ProtocolError,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Error::NotOpen => "connection not open",
            Error::WriteError => "write failed",
            Error::ReadError => "read failed",
            Error::ConnectionRefused => "connection refused",
            Error::Timeout => "timed out",
            Error::WouldBlock => "operation would block",
            Error::ConnectionClosed => "connection closed",
            Error::InvalidAddress => "invalid address",
            Error::ResolveFailed => "name resolution failed",
            Error::AddressNotFound => "address not found",
            Error::SocketOption => "socket option rejected",
            Error::MessageTooLarge => "message too large",
            Error::ProtocolError => "protocol error",
        };
        f.write_str(text)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::WouldBlock => defmt::write!(f, "WouldBlock"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            Error::ResolveFailed => defmt::write!(f, "ResolveFailed"),
            Error::AddressNotFound => defmt::write!(f, "AddressNotFound"),
            Error::SocketOption => defmt::write!(f, "SocketOption"),
            Error::MessageTooLarge => defmt::write!(f, "MessageTooLarge"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
        }
    }
}
