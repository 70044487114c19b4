use core::convert::Infallible;

use log::{error, info};
use rand_core::RngCore;

use super::{Context, Error};
use crate::board::{Buttons, CoapAction, CoapButtons, Leds};
use crate::config::Config;
use crate::modem::LinkController;
use crate::network::application::coap::{CoapClient, Error as CoapError};
use crate::network::security::{provision_psk, CredentialStore, SecureSocketOptions};
use crate::network::{server_resolve, Datagram, DatagramStack, Resolve};
use crate::system::Delay;

impl<L, N, Ld, B, D> Context<L, N, Ld, B, D>
where
    L: LinkController,
    N: Resolve + DatagramStack,
    Ld: Leds,
    B: Buttons,
    D: Delay,
{
    /// The CoAP client sample.
    ///
    /// Stores the DTLS pre-shared key (when DTLS is enabled), attaches to LTE
    /// and opens a socket to the CoAP server. Button presses send GET or PUT
    /// requests as mapped for the board, and a GET of the RX resource pings
    /// the server whenever the keepalive interval passes without a datagram.
    ///
    /// Returns only on failure.
    pub fn run_coap_client<S, R>(
        &mut self,
        store: &mut S,
        rng: &mut R,
        config: &Config<'_>,
    ) -> Result<Infallible, Error>
    where
        S: CredentialStore,
        R: RngCore,
    {
        let coap = &config.coap;
        if coap.dtls {
            provision_psk(store, coap.sec_tag, coap.device_name, coap.psk)?;
        }
        self.lte_connect(&config.link)?;

        let server = server_resolve(&mut self.net, coap.server_hostname, coap.server_port)
            .inspect_err(|_| error!("Failed to resolve server name"))?;

        let sec_tags = [coap.sec_tag];
        let security = SecureSocketOptions::required(coap.server_hostname, &sec_tags);
        let socket = self
            .net
            .open(server, coap.dtls.then_some(&security))
            .inspect_err(|_| error!("Failed to initialize CoAP client"))?;
        info!("Successfully connected to server");

        let mut client = CoapClient::new(socket, rng);
        let mut buttons = CoapButtons::new(config.board);
        let interval = coap.keepalive_interval();

        let result: Result<Infallible, CoapError> = loop {
            if let Err(e) = client.keepalive_step(coap.rx_resource, interval) {
                break Err(e);
            }
            if let Err(e) = send_on_press(&mut self.buttons, &mut buttons, &mut client, config) {
                break Err(e);
            }
        };

        if let Err(e) = client.close() {
            error!("Failed to close socket: {}", e);
        }
        result.map_err(Error::from)
    }
}

fn send_on_press<B, S>(
    source: &mut B,
    mapping: &mut CoapButtons,
    client: &mut CoapClient<S>,
    config: &Config<'_>,
) -> Result<(), CoapError>
where
    B: Buttons,
    S: Datagram,
{
    while let Some(event) = source.poll_event() {
        match mapping.action(event) {
            Some(CoapAction::Get) => {
                client.get(config.coap.rx_resource)?;
            }
            Some(CoapAction::Put) => {
                client.put(config.coap.tx_resource, config.coap.message.as_bytes())?;
            }
            None => {}
        }
    }
    Ok(())
}
