//! GNSS fixes reported to a CoAP server over DTLS.

use core::convert::Infallible;
use core::net::SocketAddrV4;

use log::{error, info};
use rand_core::RngCore;

use super::{Context, Error, BUTTON_POLL_INTERVAL};
use crate::board::{Buttons, Leds, StatusDisplay, TrackerStatus};
use crate::config::Config;
use crate::gnss::{
    format_tracker_payload, gnss_init_and_start, FixStatus, FixTracker, Gnss, PvtFrame,
    TRACKER_PAYLOAD_LEN,
};
use crate::modem::{LinkController, LinkSettings};
use crate::network::application::coap::{CoapClient, Error as CoapError};
use crate::network::security::{provision_psk, CredentialStore, SecureSocketOptions};
use crate::network::{server_resolve, DatagramStack, Resolve};
use crate::sync::Signal;
use crate::system::{Clock, Delay};

/// The status LED to show for the tracker's current state.
pub fn status_of<K: Clock>(fixes: &FixTracker<K>) -> TrackerStatus {
    match fixes.status() {
        FixStatus::Idle => TrackerStatus::ConnectedNoPsm,
        FixStatus::Searching => TrackerStatus::Searching,
        FixStatus::Fixed => TrackerStatus::Fixed,
    }
}

impl<L, N, Ld, B, D> Context<L, N, Ld, B, D>
where
    L: LinkController,
    N: Resolve + DatagramStack,
    Ld: Leds,
    B: Buttons,
    D: Delay,
{
    /// The simple tracker.
    ///
    /// Stores the DTLS pre-shared key, attaches to LTE with PSM requested and
    /// waits for the network to grant an active time before starting periodic
    /// GNSS fixes. Every fix is POSTed to the CoAP server over a fresh DTLS
    /// session, after which the tracker sleeps for the send period. Button 1
    /// toggles the status LED.
    ///
    /// Returns only on failure.
    pub fn run_tracker<S, R, G, K>(
        &mut self,
        store: &mut S,
        rng: &mut R,
        gnss: &mut G,
        fixes: &'static FixTracker<K>,
        config: &Config<'_>,
    ) -> Result<Infallible, Error>
    where
        S: CredentialStore,
        R: RngCore,
        G: Gnss,
        K: Clock + Sync,
    {
        info!(
            "The nRF91 Simple Tracker Version {} started",
            env!("CARGO_PKG_VERSION")
        );
        let coap = &config.coap;
        provision_psk(store, coap.sec_tag, coap.device_name, coap.psk)?;

        let link = LinkSettings {
            psm: true,
            ..config.link
        };
        self.attach(&link)?;

        let server = server_resolve(&mut self.net, coap.server_hostname, coap.server_port)
            .inspect_err(|_| error!("Failed to resolve server name"))?;

        let mut display = StatusDisplay::new();
        let lte = self.lte;
        self.wait_serving_buttons(lte.active_time(), &mut display, fixes);
        gnss_init_and_start(&mut self.link, gnss, fixes, &config.tracker.gnss)?;

        loop {
            self.wait_serving_buttons(fixes.fix_signal(), &mut display, fixes);
            if let Some(fix) = fixes.current_fix() {
                self.report_fix(server, rng, &fix, config)?;
            }
            self.delay.sleep(config.tracker.send_period());
        }
    }

    /// POST one fix over a new DTLS session and wait for the answer.
    fn report_fix<R: RngCore>(
        &mut self,
        server: SocketAddrV4,
        rng: &mut R,
        fix: &PvtFrame,
        config: &Config<'_>,
    ) -> Result<(), Error> {
        let coap = &config.coap;
        let sec_tags = [coap.sec_tag];
        let security = SecureSocketOptions::required(coap.server_hostname, &sec_tags);
        info!(
            "Setting up TLS credentials, tag {}. Size: {}",
            coap.sec_tag.0,
            sec_tags.len()
        );
        let socket = self
            .net
            .open(server, Some(&security))
            .inspect_err(|_| error!("Failed to initialize CoAP client"))?;

        let mut client = CoapClient::new(socket, rng);
        let payload = format_tracker_payload::<TRACKER_PAYLOAD_LEN>(fix);
        let result = client
            .post(coap.post_resource, Some(coap.post_query), payload.as_bytes())
            .inspect_err(|_| error!("Failed to send POST request, exit..."))
            .map_err(Error::from)
            .and_then(|_| match client.receive(None) {
                Ok(Some(_)) => Ok(()),
                Ok(None) => {
                    info!("Disconnected");
                    Err(Error::Disconnected)
                }
                Err(e @ CoapError::Network(_)) => {
                    error!("Error reading response");
                    Err(e.into())
                }
                Err(e) => {
                    error!("Invalid response, exit...");
                    Err(e.into())
                }
            });

        if let Err(e) = client.close() {
            error!("Failed to close socket: {}", e);
        }
        result
    }

    /// Block until `signal` is given, toggling the status LED on button 1.
    fn wait_serving_buttons<K: Clock>(
        &mut self,
        signal: &Signal,
        display: &mut StatusDisplay,
        fixes: &FixTracker<K>,
    ) {
        loop {
            while let Some(press) = self.buttons.poll_event() {
                if let Err(e) = display.handle(press, status_of(fixes), &mut self.leds) {
                    error!("Failed to update status LEDs: {:?}", e);
                }
            }
            if signal.try_take() {
                return;
            }
            self.delay.sleep(BUTTON_POLL_INTERVAL);
        }
    }
}
