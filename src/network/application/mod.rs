//! # Application Layer Network Protocols
//!
//! The protocols the device speaks once the LTE link is up. Each client is
//! generic over the transport traits of [`crate::network`], so the same code
//! runs over the modem's offloaded sockets, over `std::net` on a host, and
//! over mocks in tests.
//!
//! ## Available Protocols
//!
//! - **[`coap`]**: CoAP over UDP or DTLS, with token correlation and a
//!   keepalive receive loop
//! - **[`mqtt`]**: MQTT 3.1.1 over TCP or TLS, with keep-alive pings and a
//!   fixed-delay reconnect loop
//! - **[`echo`]**: plain text exchange with a TCP echo server
//!
//! ## Design Principles
//!
//! - **Connection Agnostic**: Work with any type implementing
//!   [`Connection`](crate::network::Connection) or
//!   [`Datagram`](crate::network::Datagram)
//! - **No-std Compatible**: No heap allocation
//! - **Bounded**: Fixed-size buffers; oversized input is rejected or
//!   truncated, never written past the end

/// CoAP (Constrained Application Protocol) implementation.
///
/// CoAP is a specialized web transfer protocol designed for use with constrained
/// nodes and constrained networks in the Internet of Things.
pub mod coap;

/// TCP echo client.
pub mod echo;

/// MQTT client implementation.
///
/// Provides an MQTT 3.1.1 client for lightweight publish-subscribe messaging,
/// commonly used in IoT applications.
pub mod mqtt;
