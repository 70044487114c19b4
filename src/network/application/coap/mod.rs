//! CoAP (RFC 7252) client for constrained devices.
//!
//! CoAP is a compact request/response protocol over UDP, optionally secured
//! with DTLS 1.2. Messages are encoded and parsed with [`coap_lite`]; this
//! module adds what the device needs on top as a client: a [`CoapClient`]
//! that stamps every request with a 16-bit token and only accepts responses
//! carrying the token it sent last.
//!
//! There is no retransmission layer. Confirmable requests are sent once and
//! mismatched or stale responses are logged and dropped.
//!
//! ```rust
//! use celliot::network::application::coap::handle_response;
//! use celliot::network::application::coap::{
//!     MessageClass, MessageType, Packet, Response, ResponseType,
//! };
//!
//! let mut reply = Packet::new();
//! reply.header.set_version(1);
//! reply.header.set_type(MessageType::Acknowledgement);
//! reply.header.code = MessageClass::Response(ResponseType::Content);
//! reply.set_token(0x1234u16.to_le_bytes().to_vec());
//! reply.payload = b"22.5".to_vec();
//! let bytes = reply.to_bytes().unwrap();
//!
//! match handle_response(0x1234, &bytes).unwrap() {
//!     Response::Accepted { payload, .. } => assert_eq!(payload, b"22.5"),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

use crate::network::error::Error as NetworkError;

/// Token-correlating request/response client.
pub mod client;

pub use client::{handle_response, CoapClient, Response, MAX_MESSAGE_LEN};
pub use coap_lite::{CoapOption, MessageClass, MessageType, Packet, RequestType, ResponseType};

/// Errors raised while building, parsing or exchanging CoAP messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A request does not fit in one datagram.
    MessageTooLarge,
    /// A datagram is not a well-formed CoAP message.
    Malformed,
    /// The socket failed.
    Network(NetworkError),
}

impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Error::Network(e)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::MessageTooLarge => f.write_str("message too large"),
            Error::Malformed => f.write_str("malformed message"),
            Error::Network(e) => write!(f, "socket: {}", e),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::MessageTooLarge => defmt::write!(f, "MessageTooLarge"),
            Error::Malformed => defmt::write!(f, "Malformed"),
            Error::Network(e) => defmt::write!(f, "Network({})", e),
        }
    }
}
