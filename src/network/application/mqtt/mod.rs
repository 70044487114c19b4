//! MQTT 3.1.1 protocol implementation for embedded systems.
//!
//! MQTT uses a publish-subscribe pattern where:
//! - **Publishers** send messages to topics
//! - **Subscribers** receive messages from topics they're interested in
//! - **Brokers** route messages between publishers and subscribers
//!
//! The device keeps one session to a broker over TCP or TLS: it publishes a
//! message when a button is pressed, subscribes to a command topic and drives
//! LEDs from the commands it receives. When the session breaks, the
//! [`ReconnectLoop`] starts a new one after a fixed delay.
//!
//! # Usage
//!
//! ```rust,no_run
//! use core::ops::ControlFlow;
//! use core::time::Duration;
//!
//! use celliot::network::application::mqtt::{Client, Event, LedCommand, Options, QoS, ReconnectLoop};
//! # use celliot::network::Connection;
//! # use celliot::system::{Clock, Delay};
//! # struct Board;
//! # impl Clock for Board { fn uptime_ms(&self) -> u64 { 0 } }
//! # impl Delay for Board { fn sleep(&mut self, _: Duration) {} }
//! # fn example<C: Connection>(open: impl Fn() -> C) {
//! let mut reconnect = ReconnectLoop::new(Duration::from_secs(5));
//! reconnect.run(&mut Board, |_attempt| {
//!     let Ok(mut client) = Client::<_, _>::connect(open(), Board, &Options::new("nrf-1")) else {
//!         return ControlFlow::Continue(());
//!     };
//!     if client.subscribe("devices/led", QoS::AtLeastOnce, 1234).is_err() {
//!         return ControlFlow::Continue(());
//!     }
//!     while let Ok(event) = client.poll() {
//!         if let Some(Event::Publish(message)) = event {
//!             let _command = LedCommand::parse(message.payload);
//!         }
//!     }
//!     ControlFlow::<()>::Continue(())
//! });
//! # }
//! ```

/// MQTT client implementation and supporting types.
pub mod client;

/// Commands carried in the payload of subscribed messages.
pub mod command;

/// Fixed-delay reconnection.
pub mod reconnect;

pub use client::{
    Client, ConnectReturnCode, DEFAULT_BUFFER_SIZE, Event, Options, PublishPacket, QoS,
    SubscribeResult,
};
pub use command::LedCommand;
pub use reconnect::ReconnectLoop;
