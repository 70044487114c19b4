//! Text echo over a TCP connection.
//!
//! The device sends a fixed greeting and logs whatever the echo server sends
//! back. When the server closes the stream the caller opens a new one.

use log::{error, info};

use crate::network::error::Error;
use crate::network::{Close, Connection, Read, Write};
use crate::system::fmt::printable;

/// Receive buffer size. One byte is kept free, matching a NUL-terminated
/// buffer of this size.
pub const MESSAGE_SIZE: usize = 256;

/// Greeting sent on a button press.
pub const MESSAGE_TO_SEND: &str = "Hello from nRF9160 SiP";

/// Result of one receive.
#[derive(Debug, PartialEq, Eq)]
pub enum Received<'a> {
    /// Bytes from the server.
    Data(&'a [u8]),
    /// Nothing arrived before the connection's receive timeout.
    Idle,
    /// The server closed the stream.
    Closed,
}

/// An echo client bound to one connection.
pub struct EchoClient<C: Connection> {
    connection: C,
    buf: [u8; MESSAGE_SIZE],
}

impl<C: Connection> core::fmt::Debug for EchoClient<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EchoClient").finish_non_exhaustive()
    }
}

impl<C: Connection> EchoClient<C> {
    /// Wrap an open connection.
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            buf: [0; MESSAGE_SIZE],
        }
    }

    /// Send `message` in full.
    pub fn send(&mut self, message: &[u8]) -> Result<(), Error> {
        let mut rest = message;
        while !rest.is_empty() {
            let n = self
                .connection
                .write(rest)
                .map_err(|_| Error::WriteError)
                .inspect_err(|e| info!("Failed to send message, {}", e))?;
            if n == 0 {
                return Err(Error::WriteError);
            }
            rest = &rest[n..];
        }
        self.connection.flush().map_err(|_| Error::WriteError)
    }

    /// Block for data from the server.
    pub fn receive(&mut self) -> Result<Received<'_>, Error> {
        match self.connection.read(&mut self.buf[..MESSAGE_SIZE - 1]) {
            Ok(0) => Ok(Received::Closed),
            Ok(len) => {
                info!(
                    "Data received from the server:\n{}",
                    printable::<MESSAGE_SIZE>(&self.buf[..len])
                );
                Ok(Received::Data(&self.buf[..len]))
            }
            Err(e) => {
                let e: Error = e.into();
                match e {
                    Error::WouldBlock | Error::Timeout => Ok(Received::Idle),
                    e => {
                        error!("Error reading response");
                        Err(e)
                    }
                }
            }
        }
    }

    /// Close the connection.
    pub fn close(self) -> Result<(), Error> {
        self.connection.close().map_err(Into::<Error>::into)
    }
}
