//! Application configuration.
//!
//! Every sample reads its servers, topics, security tags and timings from a
//! [`Config`]. [`Config::default`] holds the values the firmware is built
//! with; [`Config::from_json`] overrides any subset of them from a JSON
//! document, for example one written to flash at provisioning time.
//!
//! ```rust
//! use celliot::config::Config;
//!
//! let config = Config::from_json(r#"{"mqtt":{"pub_topic":"dev/42/out"},"board":"thingy91"}"#).unwrap();
//! assert_eq!(config.mqtt.pub_topic, "dev/42/out");
//! assert_eq!(config.mqtt.sub_topic, "devacademy/subscribe/topic");
//! assert_eq!(config.coap.keepalive_interval_ms, 6500);
//! ```

use core::time::Duration;

use serde::Deserialize;

use crate::board::BoardKind;
use crate::gnss::GnssSettings;
use crate::modem::LinkSettings;
use crate::network::security::SecTag;

/// Errors raised while loading a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The document is not valid JSON or does not match [`Config`].
    Parse,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Parse => f.write_str("invalid configuration document"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Parse => defmt::write!(f, "Parse"),
        }
    }
}

/// CoAP server and resources.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoapConfig<'a> {
    /// Server hostname, also checked against its certificate.
    pub server_hostname: &'a str,
    /// Server port.
    pub server_port: u16,
    /// Secure the socket with DTLS.
    pub dtls: bool,
    /// Security tag holding the DTLS pre-shared key.
    pub sec_tag: SecTag,
    /// PSK identity.
    pub device_name: &'a str,
    /// Pre-shared key, hex encoded.
    pub psk: &'a str,
    /// Resource read with GET.
    pub rx_resource: &'a str,
    /// Resource written with PUT.
    pub tx_resource: &'a str,
    /// Resource the tracker POSTs fixes to.
    pub post_resource: &'a str,
    /// Uri-Query sent with tracker POSTs.
    pub post_query: &'a str,
    /// Milliseconds without a response before the client pings the server.
    pub keepalive_interval_ms: u32,
    /// Payload of PUT requests.
    pub message: &'a str,
}

impl CoapConfig<'_> {
    /// The keepalive interval.
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms.into())
    }
}

impl Default for CoapConfig<'_> {
    fn default() -> Self {
        Self {
            server_hostname: "californium.eclipseprojects.io",
            server_port: 5684,
            dtls: true,
            sec_tag: SecTag(12),
            device_name: "cali.nrf91.device",
            psk: "000102030405060708090a0b0c0d0e0f",
            rx_resource: "obs",
            tx_resource: "large-update",
            post_resource: "echo",
            post_query: "keep",
            keepalive_interval_ms: 6500,
            message: "Hello from nRF9160 SiP",
        }
    }
}

/// MQTT broker, topics and session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig<'a> {
    /// Broker hostname, also checked against its certificate.
    pub broker_hostname: &'a str,
    /// Broker port.
    pub broker_port: u16,
    /// Connect over TLS.
    pub tls: bool,
    /// Security tag holding the broker's CA certificate.
    pub sec_tag: SecTag,
    /// Client identifier; empty means `nrf-<IMEI>`.
    pub client_id: &'a str,
    /// Topic button presses are published to.
    pub pub_topic: &'a str,
    /// Topic LED commands arrive on.
    pub sub_topic: &'a str,
    /// Packet identifier of the SUBSCRIBE.
    pub subscribe_id: u16,
    /// Message published on a button press.
    pub button_message: &'a str,
    /// Keep-alive interval in seconds.
    pub keep_alive_s: u16,
    /// Seconds between reconnect attempts.
    pub reconnect_delay_s: u32,
}

impl MqttConfig<'_> {
    /// The delay between reconnect attempts.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_s.into())
    }
}

impl Default for MqttConfig<'_> {
    fn default() -> Self {
        Self {
            broker_hostname: "mqtt.nordicsemi.academy",
            broker_port: 8883,
            tls: true,
            sec_tag: SecTag(24),
            client_id: "",
            pub_topic: "devacademy/publish/topic",
            sub_topic: "devacademy/subscribe/topic",
            subscribe_id: 1234,
            button_message: "Hi from nRF9151 SiP",
            keep_alive_s: 60,
            reconnect_delay_s: 60,
        }
    }
}

/// Echo server used by the TCP, UDP and GNSS samples.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EchoConfig<'a> {
    /// Server hostname.
    pub server_hostname: &'a str,
    /// TCP echo port.
    pub tcp_port: u16,
    /// UDP echo port.
    pub udp_port: u16,
    /// Message sent on a button press.
    pub message: &'a str,
}

impl Default for EchoConfig<'_> {
    fn default() -> Self {
        Self {
            server_hostname: "nordicecho.westeurope.cloudapp.azure.com",
            tcp_port: 2555,
            udp_port: 2444,
            message: "Hello from nRF9160 SiP",
        }
    }
}

/// The GNSS-to-CoAP tracker.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Periodic fix timing.
    pub gnss: GnssSettings,
    /// Seconds to sleep after each report.
    pub send_period_s: u32,
}

impl TrackerConfig {
    /// The pause after each report.
    pub fn send_period(&self) -> Duration {
        Duration::from_secs(self.send_period_s.into())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gnss: GnssSettings {
                fix_interval: 300,
                fix_retry: 180,
            },
            send_period_s: 60,
        }
    }
}

/// Configuration of all samples.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config<'a> {
    /// CoAP samples and the tracker's server.
    #[serde(borrow)]
    pub coap: CoapConfig<'a>,
    /// MQTT sample.
    #[serde(borrow)]
    pub mqtt: MqttConfig<'a>,
    /// Echo samples.
    #[serde(borrow)]
    pub echo: EchoConfig<'a>,
    /// GNSS sample fix timing.
    pub gnss: GnssSettings,
    /// Tracker.
    pub tracker: TrackerConfig,
    /// Power saving requests.
    pub link: LinkSettings,
    /// Board the firmware runs on.
    pub board: BoardKind,
}

impl<'a> Config<'a> {
    /// Defaults overridden by the fields present in `json`.
    ///
    /// Strings are borrowed from `json` and may not contain escapes.
    pub fn from_json(json: &'a str) -> Result<Self, Error> {
        serde_json_core::from_str::<Config<'a>>(json)
            .map(|(config, _)| config)
            .map_err(|e| {
                log::error!("Failed to parse configuration: {:?}", e);
                Error::Parse
            })
    }
}
