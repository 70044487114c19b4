//! Token-correlating CoAP client over a connected datagram socket.

use alloc::vec;
use core::ops::ControlFlow;
use core::time::Duration;

use coap_lite::{CoapOption, MessageClass, MessageType, Packet, RequestType};
use heapless::{String, Vec};
use log::{error, info, warn};
use rand_core::RngCore;

use super::Error;
use crate::network::Datagram;
use crate::network::error::Error as NetworkError;
use crate::system::fmt::printable;

/// Largest message the client sends or receives.
pub const MAX_MESSAGE_LEN: usize = 1280;

/// Bytes of a response payload kept for logging.
const LOGGED_PAYLOAD_LEN: usize = 128;

/// Tokens are 16-bit and travel as two bytes.
const TOKEN_LEN: usize = 2;

/// Content-Format `text/plain; charset=utf-8`.
const TEXT_PLAIN: u8 = 0;

/// Outcome of matching a response against the last request.
#[derive(Debug, Clone, PartialEq)]
pub enum Response<'a> {
    /// The response carries the token of the most recent request.
    Accepted {
        /// Response code.
        code: MessageClass,
        /// The matched token.
        token: u16,
        /// Response payload, possibly empty.
        payload: &'a [u8],
    },
    /// The token does not match; the response was dropped.
    Ignored {
        /// The token the response carried.
        token: Vec<u8, 8>,
    },
}

/// A CoAP client bound to one server.
///
/// The token is randomized when the client is created and incremented before
/// every request, so consecutive requests carry consecutive tokens (mod 2^16).
/// Only a response echoing the current token is accepted.
pub struct CoapClient<S: Datagram> {
    socket: S,
    next_token: u16,
    next_id: u16,
    buf: [u8; MAX_MESSAGE_LEN],
}

impl<S: Datagram> core::fmt::Debug for CoapClient<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CoapClient")
            .field("next_token", &self.next_token)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl<S: Datagram> CoapClient<S> {
    /// Wrap a connected socket, drawing the initial token and message id from
    /// `rng`.
    pub fn new<R: RngCore>(socket: S, rng: &mut R) -> Self {
        let seed = rng.next_u32();
        Self {
            socket,
            next_token: seed as u16,
            next_id: (seed >> 16) as u16,
            buf: [0; MAX_MESSAGE_LEN],
        }
    }

    /// Token of the most recent request.
    pub fn token(&self) -> u16 {
        self.next_token
    }

    /// Send a non-confirmable GET for `resource`. Returns the token used.
    pub fn get(&mut self, resource: &str) -> Result<u16, Error> {
        let request = self.request(MessageType::NonConfirmable, RequestType::Get, resource);
        self.send(request)
    }

    /// Send a non-confirmable PUT of a text payload to `resource`.
    pub fn put(&mut self, resource: &str, payload: &[u8]) -> Result<u16, Error> {
        let mut request = self.request(MessageType::NonConfirmable, RequestType::Put, resource);
        request.add_option(CoapOption::ContentFormat, vec![TEXT_PLAIN]);
        request.payload = payload.to_vec();
        self.send(request)
    }

    /// Send a confirmable POST of a text payload to `resource`, with an
    /// optional Uri-Query such as `keep`.
    pub fn post(
        &mut self,
        resource: &str,
        query: Option<&str>,
        payload: &[u8],
    ) -> Result<u16, Error> {
        let mut request = self.request(MessageType::Confirmable, RequestType::Post, resource);
        // Zero travels as an empty uint option.
        request.add_option(CoapOption::ContentFormat, vec![]);
        if let Some(query) = query {
            request.add_option(CoapOption::UriQuery, query.as_bytes().to_vec());
        }
        request.payload = payload.to_vec();
        self.send(request)
    }

    /// A request stamped with the next token and message id.
    fn request(&mut self, ty: MessageType, method: RequestType, resource: &str) -> Packet {
        self.next_token = self.next_token.wrapping_add(1);
        self.next_id = self.next_id.wrapping_add(1);

        let mut request = Packet::new();
        request.header.set_version(1);
        request.header.set_type(ty);
        request.header.code = MessageClass::Request(method);
        request.header.message_id = self.next_id;
        request.set_token(self.next_token.to_le_bytes().to_vec());
        for segment in resource.split('/').filter(|s| !s.is_empty()) {
            request.add_option(CoapOption::UriPath, segment.as_bytes().to_vec());
        }
        request
    }

    fn send(&mut self, request: Packet) -> Result<u16, Error> {
        let bytes = request
            .to_bytes()
            .ok()
            .filter(|bytes| bytes.len() <= MAX_MESSAGE_LEN)
            .ok_or(Error::MessageTooLarge)
            .inspect_err(|e| error!("Failed to encode CoAP request, {}", e))?;

        self.socket
            .send(&bytes)
            .inspect_err(|e| error!("Failed to send CoAP request, {}", e))?;

        info!("CoAP request sent: token 0x{:04x}", self.next_token);
        Ok(self.next_token)
    }

    /// Block for one datagram and match it against the last request.
    ///
    /// `Ok(None)` reports an empty datagram.
    pub fn receive(&mut self, timeout: Option<Duration>) -> Result<Option<Response<'_>>, Error> {
        let received = self.socket.recv(&mut self.buf, timeout)?;
        if received == 0 {
            return Ok(None);
        }
        handle_response(self.next_token, &self.buf[..received]).map(Some)
    }

    /// One turn of the keepalive loop: wait up to `interval` for a datagram
    /// and ping the server with a GET of `resource` if none arrives.
    ///
    /// A keepalive GET, a would-block result and an empty datagram all yield
    /// `Ok(None)`. A hard socket error or a malformed response is an error.
    pub fn keepalive_step(
        &mut self,
        resource: &str,
        interval: Duration,
    ) -> Result<Option<Response<'_>>, Error> {
        let received = match self.socket.recv(&mut self.buf, Some(interval)) {
            Ok(n) => n,
            Err(NetworkError::Timeout) => {
                self.get(resource)?;
                return Ok(None);
            }
            Err(NetworkError::WouldBlock) => {
                warn!("socket EAGAIN");
                return Ok(None);
            }
            Err(e) => {
                error!("Socket error {}, exit...", e);
                return Err(e.into());
            }
        };

        if received == 0 {
            info!("Empty datagram");
            return Ok(None);
        }

        handle_response(self.next_token, &self.buf[..received])
            .inspect_err(|_| error!("Invalid response, exit..."))
            .map(Some)
    }

    /// Receive loop that pings the server with a GET of `resource` whenever
    /// `interval` passes without a datagram arriving.
    ///
    /// Runs [`keepalive_step`](Self::keepalive_step) until it fails or
    /// `on_response` returns [`ControlFlow::Break`].
    pub fn run_keepalive<F>(
        &mut self,
        resource: &str,
        interval: Duration,
        mut on_response: F,
    ) -> Result<(), Error>
    where
        F: FnMut(&Response<'_>) -> ControlFlow<()>,
    {
        loop {
            if let Some(response) = self.keepalive_step(resource, interval)? {
                if on_response(&response).is_break() {
                    return Ok(());
                }
            }
        }
    }

    /// Release the socket.
    pub fn close(self) -> Result<(), Error> {
        self.socket.close().map_err(Error::from)
    }
}

/// Parse `datagram` and accept it only if its token equals `expected`.
///
/// The payload of an accepted response borrows from `datagram`.
pub fn handle_response(expected: u16, datagram: &[u8]) -> Result<Response<'_>, Error> {
    let reply = Packet::from_bytes(datagram).map_err(|e| {
        error!("Malformed response received: {:?}", e);
        Error::Malformed
    })?;
    let token: &[u8] = reply.get_token();

    if token.len() != TOKEN_LEN || token != expected.to_le_bytes() {
        let (lo, hi) = (
            token.first().copied().unwrap_or(0),
            token.get(1).copied().unwrap_or(0),
        );
        warn!("Invalid token received: 0x{:02x}{:02x}", hi, lo);
        // A parsed token is at most 8 bytes.
        let token = Vec::from_slice(token).map_err(|_| Error::Malformed)?;
        return Ok(Response::Ignored { token });
    }

    // The payload is the tail of the datagram.
    let payload = &datagram[datagram.len() - reply.payload.len()..];
    let text: String<LOGGED_PAYLOAD_LEN> = if payload.is_empty() {
        printable(b"EMPTY")
    } else {
        printable(payload)
    };
    info!(
        "CoAP response: code: 0x{:x}, token 0x{:04x}, payload: {}",
        u8::from(reply.header.code),
        expected,
        text
    );

    Ok(Response::Accepted {
        code: reply.header.code,
        token: expected,
        payload,
    })
}
