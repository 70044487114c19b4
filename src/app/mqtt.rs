use core::convert::Infallible;
use core::net::SocketAddrV4;
use core::time::Duration;

use heapless::String;
use log::{error, info};

use super::{set_led, Context, Error, BUTTON_POLL_INTERVAL};
use crate::board::{Button, Buttons, Leds};
use crate::config::{Config, MqttConfig};
use crate::modem::at::{self, AtTransport};
use crate::modem::LinkController;
use crate::network::application::mqtt::{
    Client, Event, LedCommand, Options, QoS, ReconnectLoop, DEFAULT_BUFFER_SIZE,
};
use crate::network::security::{provision_ca_certificate, CredentialStore, SecureSocketOptions};
use crate::network::error::Error as NetworkError;
use crate::network::{server_resolve, Connect, Connection, Resolve};
use crate::system::fmt::printable;
use crate::system::{Clock, Delay};

/// Capacity of the client identifier.
const CLIENT_ID_LEN: usize = 32;

impl<L, N, Ld, B, D> Context<L, N, Ld, B, D>
where
    L: LinkController,
    N: Resolve + Connect,
    Ld: Leds,
    B: Buttons,
    D: Delay,
{
    /// The MQTT client sample.
    ///
    /// Provisions the broker's CA certificate (when TLS is enabled), attaches
    /// to LTE, and then keeps a session with the broker alive forever: connect,
    /// subscribe to the command topic, switch LEDs on commands, publish on
    /// button 1 and ping when keep-alive is due. Any session failure
    /// disconnects and retries after the configured delay.
    ///
    /// Returns only if setup fails.
    pub fn run_mqtt_client<S, A, K>(
        &mut self,
        store: &mut S,
        at: &mut A,
        clock: &K,
        ca_certificate: &str,
        config: &Config<'_>,
    ) -> Result<Infallible, Error>
    where
        S: CredentialStore,
        A: AtTransport,
        K: Clock,
    {
        let mqtt = &config.mqtt;
        if mqtt.tls {
            provision_ca_certificate(store, mqtt.sec_tag, ca_certificate)
                .inspect_err(|_| error!("Failed to provision certificates"))?;
        }
        self.lte_connect(&config.link)?;

        let client_id: String<CLIENT_ID_LEN> = at::client_id(mqtt.client_id, at)
            .inspect_err(|e| error!("Failed to initialize MQTT client: {}", e))?;
        let broker = server_resolve(&mut self.net, mqtt.broker_hostname, mqtt.broker_port)?;

        let mut reconnect = ReconnectLoop::new(mqtt.reconnect_delay());
        loop {
            reconnect.next_attempt(&mut self.delay);
            if let Err(e) = self.mqtt_session(broker, &client_id, clock, mqtt) {
                error!("MQTT session ended: {}", e);
            }
        }
    }

    /// One MQTT session: connect, subscribe to the command topic and serve
    /// commands and button presses until the connection fails. The client is
    /// disconnected however the session ends.
    pub fn mqtt_session<K: Clock>(
        &mut self,
        broker: SocketAddrV4,
        client_id: &str,
        clock: &K,
        config: &MqttConfig<'_>,
    ) -> Result<(), Error> {
        let sec_tags = [config.sec_tag];
        let tls = SecureSocketOptions::required(config.broker_hostname, &sec_tags);
        if config.tls {
            info!("TLS enabled");
        }
        let options = Options {
            keep_alive_seconds: config.keep_alive_s,
            ..Options::new(client_id)
        };

        let connection = self
            .net
            .connect(broker, config.tls.then_some(&tls))
            .inspect_err(|e| error!("Error in mqtt_connect: {}", e))?;
        let mut client: Client<_, _> = Client::connect(connection, clock, &options)
            .inspect_err(|e| error!("Error in mqtt_connect: {}", e))?;

        let served = client
            .subscribe(config.sub_topic, QoS::AtLeastOnce, config.subscribe_id)
            .and_then(|_| self.serve(&mut client, config));

        if let Err(e) = client.disconnect() {
            error!("Could not disconnect MQTT client: {}", e);
        }
        served.map_err(Error::from)
    }

    fn serve<C, K>(
        &mut self,
        client: &mut Client<C, K>,
        config: &MqttConfig<'_>,
    ) -> Result<(), NetworkError>
    where
        C: Connection,
        K: Clock,
    {
        loop {
            client
                .live()
                .inspect_err(|e| error!("Error in mqtt_live: {}", e))?;

            // Wake for the next ping or the next button poll.
            let wait =
                Duration::from_millis(client.keepalive_time_left()).min(BUTTON_POLL_INTERVAL);
            client
                .set_read_timeout(Some(wait))
                .inspect_err(|e| error!("Failed to set receive timeout: {}", e))?;
            let event = client
                .poll()
                .inspect_err(|e| error!("Error in mqtt_input: {}", e))?;
            if let Some(Event::Publish(message)) = event {
                info!(
                    "Received: {}",
                    printable::<DEFAULT_BUFFER_SIZE>(message.payload)
                );
                if let Some(command) = LedCommand::parse(message.payload) {
                    set_led(&mut self.leds, command.led(), command.turns_on());
                }
            }

            while let Some(press) = self.buttons.poll_event() {
                if !press.pressed(Button::Button1) {
                    continue;
                }
                if let Err(e) = client.publish(
                    config.pub_topic,
                    config.button_message.as_bytes(),
                    QoS::AtLeastOnce,
                ) {
                    info!("Failed to send message, {}", e);
                }
            }
        }
    }
}
