//! The samples, as functions over an explicit [`Context`].
//!
//! Each sample is a linear flow: bring up the modem and wait for
//! registration, set up a socket, then serve requests driven by buttons,
//! timers or fixes. The context owns the parts every sample shares. Parts
//! only one sample needs (credential store, AT channel, GNSS receiver, RNG)
//! are passed to that sample.
//!
//! Buttons are polled between blocking operations, so a press is acted on
//! once the current receive returns. Every receive is bounded, by
//! [`BUTTON_POLL_INTERVAL`] or by the time left until a keep-alive is due.

use core::time::Duration;

use log::{error, info};

use crate::board::{Buttons, Led, Leds};
use crate::gnss;
use crate::modem::{self, LinkController, LinkSettings, LteMonitor};
use crate::network::application::coap;
use crate::network::error::Error as NetworkError;
use crate::network::security;
use crate::system::Delay;

mod coap_client;
mod echo;
mod gnss_udp;
mod mqtt;
mod tracker;

pub use tracker::status_of;

/// Longest wait between button polls.
pub const BUTTON_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why a sample stopped.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// Modem bring-up failed.
    Modem(modem::Error),
    /// A socket operation failed.
    Network(NetworkError),
    /// A CoAP exchange failed.
    Coap(coap::Error),
    /// Credentials could not be provisioned.
    Security(security::Error),
    /// The GNSS receiver could not be started.
    Gnss(gnss::Error),
    /// The server closed the connection.
    Disconnected,
}

impl From<modem::Error> for Error {
    fn from(e: modem::Error) -> Self {
        Error::Modem(e)
    }
}

impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Error::Network(e)
    }
}

impl From<coap::Error> for Error {
    fn from(e: coap::Error) -> Self {
        Error::Coap(e)
    }
}

impl From<security::Error> for Error {
    fn from(e: security::Error) -> Self {
        Error::Security(e)
    }
}

impl From<gnss::Error> for Error {
    fn from(e: gnss::Error) -> Self {
        Error::Gnss(e)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Modem(e) => write!(f, "modem: {}", e),
            Error::Network(e) => write!(f, "network: {}", e),
            Error::Coap(e) => write!(f, "coap: {}", e),
            Error::Security(e) => write!(f, "security: {}", e),
            Error::Gnss(e) => write!(f, "gnss: {}", e),
            Error::Disconnected => f.write_str("disconnected"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Modem(e) => defmt::write!(f, "Modem({})", e),
            Error::Network(e) => defmt::write!(f, "Network({})", e),
            Error::Coap(e) => defmt::write!(f, "Coap({})", e),
            Error::Security(e) => defmt::write!(f, "Security({})", e),
            Error::Gnss(e) => defmt::write!(f, "Gnss({})", e),
            Error::Disconnected => defmt::write!(f, "Disconnected"),
        }
    }
}

/// What every sample runs on.
///
/// `L` is the LTE link controller, `N` the modem's socket and DNS interface,
/// `Ld` and `B` the board's LEDs and buttons and `D` the sleep primitive.
#[derive(Debug)]
pub struct Context<L, N, Ld, B, D> {
    /// LTE link controller.
    pub link: L,
    /// Handler receiving LTE events.
    pub lte: &'static LteMonitor,
    /// Sockets and name resolution.
    pub net: N,
    /// LEDs.
    pub leds: Ld,
    /// Buttons.
    pub buttons: B,
    /// Sleep.
    pub delay: D,
}

impl<L, N, Ld, B, D> Context<L, N, Ld, B, D>
where
    L: LinkController,
    Ld: Leds,
    B: Buttons,
    D: Delay,
{
    /// Bundle the parts of a board.
    pub fn new(link: L, lte: &'static LteMonitor, net: N, leds: Ld, buttons: B, delay: D) -> Self {
        Self {
            link,
            lte,
            net,
            leds,
            buttons,
            delay,
        }
    }

    /// Attach to LTE and block until registered, then light LED 2.
    pub fn lte_connect(&mut self, settings: &LinkSettings) -> Result<(), Error> {
        self.attach(settings)?;
        info!("Connected to LTE network");
        set_led(&mut self.leds, Led::Led2, true);
        Ok(())
    }

    fn attach(&mut self, settings: &LinkSettings) -> Result<(), Error> {
        modem::modem_configure(&mut self.link, self.lte, settings)
            .inspect_err(|_| error!("Failed to configure the modem"))?;
        info!("Connecting to LTE network, this may take several minutes...");
        self.lte.wait_registered();
        Ok(())
    }
}

/// LED failures are logged and otherwise ignored.
fn set_led<Ld: Leds>(leds: &mut Ld, led: Led, on: bool) {
    if let Err(e) = leds.set(led, on) {
        error!("Failed to set {:?}: {:?}", led, e);
    }
}
