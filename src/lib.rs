//! # celliot - cellular IoT building blocks
//!
//! Protocol clients and application flows for devices built around a
//! cellular modem with an offloaded IP stack, LTE-M/NB-IoT registration and
//! a GNSS receiver. The crate is `no_std` with `alloc`, which CoAP messages
//! are built in; the modem, its sockets and the
//! board's LEDs and buttons are reached through traits, so the same code
//! runs over the vendor driver on target and over `std::net` or mocks on a
//! host.
//!
//! ## Features
//!
//! ### Network
//! - **CoAP**: a client that correlates responses by token, with messages
//!   encoded and parsed by `coap-lite`
//! - **MQTT**: a 3.1.1 client with QoS 0/1 publish, subscribe, keep-alive and
//!   a fixed-delay reconnect loop
//! - **Echo**: plain TCP/UDP exchange with an echo server
//! - **Security**: DTLS/TLS socket options and credential provisioning by
//!   security tag
//!
//! ### Modem and GNSS
//! - LTE attach with registration and PSM signals, AT command helpers
//! - Periodic GNSS fixes, time to first fix, bounded fix formatting
//!
//! ### Applications
//! - LTE bring-up, CoAP client, MQTT client, GNSS over UDP and a GNSS-to-CoAP
//!   tracker, all in [`app`]
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! celliot = "0.1.0"
//! ```
//!
//! ### CoAP request
//!
//! ```rust
//! use celliot::network::application::coap::{
//!     CoapOption, MessageClass, MessageType, Packet, RequestType,
//! };
//!
//! let mut request = Packet::new();
//! request.header.set_version(1);
//! request.header.set_type(MessageType::NonConfirmable);
//! request.header.code = MessageClass::Request(RequestType::Get);
//! request.set_token(vec![0x01, 0x00]);
//! request.add_option(CoapOption::UriPath, b"obs".to_vec());
//! let bytes = request.to_bytes().unwrap();
//!
//! let parsed = Packet::from_bytes(&bytes).unwrap();
//! assert_eq!(parsed.header.code, MessageClass::Request(RequestType::Get));
//! ```
//!
//! ### LED commands over MQTT
//!
//! ```rust
//! use celliot::board::Led;
//! use celliot::network::application::mqtt::LedCommand;
//!
//! let command = LedCommand::parse(b"LED1ON").unwrap();
//! assert_eq!(command.led(), Led::Led1);
//! assert!(command.turns_on());
//! ```
//!
//! ## Optional Features
//!
//! - `std`: `std::net` transports and a system clock (default: disabled)
//! - `async`: async transport traits
//! - `defmt`: `defmt::Format` for error types

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

extern crate alloc;

/// Network abstraction layer and protocol clients.
///
/// Transport traits for the modem's offloaded sockets, TLS/DTLS security and
/// the CoAP, MQTT and echo clients built on them.
pub mod network;

/// LTE link control and AT commands.
pub mod modem;

/// GNSS fixes and their formatting.
pub mod gnss;

/// LEDs and buttons.
pub mod board;

/// Handover between event handlers and the main flow.
pub mod sync;

/// Time and bounded formatting.
pub mod system;

/// Application configuration.
pub mod config;

/// The sample applications.
pub mod app;
