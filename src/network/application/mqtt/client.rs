//! MQTT 3.1.1 client over a stream [`Connection`].
//!
//! The client frames packets itself into fixed buffers: a message buffer of
//! `N` bytes for outgoing headers and incoming topics, and a payload buffer of
//! `P` bytes for incoming payloads. Outgoing payloads are written straight to
//! the connection after their header, so they are not limited by `N`.
//!
//! # Examples
//!
//! ```rust
//! use celliot::network::application::mqtt::{Client, Event, Options, QoS};
//! # use core::time::Duration;
//! # use celliot::network::error::Error;
//! # use celliot::network::{Close, Connection, Read, Write};
//! # use celliot::system::Clock;
//! # struct Broker { rx: &'static [u8] }
//! # impl Read for Broker {
//! #     type Error = Error;
//! #     fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
//! #         if self.rx.is_empty() { return Err(Error::WouldBlock); }
//! #         let n = buf.len().min(self.rx.len());
//! #         buf[..n].copy_from_slice(&self.rx[..n]);
//! #         self.rx = &self.rx[n..];
//! #         Ok(n)
//! #     }
//! #     fn set_read_timeout(&mut self, _: Option<Duration>) -> Result<(), Error> { Ok(()) }
//! # }
//! # impl Write for Broker {
//! #     type Error = Error;
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Error> { Ok(()) }
//! # }
//! # impl Close for Broker {
//! #     type Error = Error;
//! #     fn close(self) -> Result<(), Error> { Ok(()) }
//! # }
//! # impl Connection for Broker {}
//! # struct Uptime;
//! # impl Clock for Uptime { fn uptime_ms(&self) -> u64 { 0 } }
//! // CONNACK accepted, then a QoS 0 PUBLISH of "LED1ON" on "cmd".
//! let broker = Broker { rx: b"\x20\x02\x00\x00\x30\x0b\x00\x03cmdLED1ON" };
//!
//! let mut client: Client<_, _> =
//!     Client::connect(broker, Uptime, &Options::new("nrf-352656100367872"))?;
//! client.publish("devices/status", b"online", QoS::AtMostOnce)?;
//!
//! match client.poll()? {
//!     Some(Event::Publish(message)) => assert_eq!(message.payload, b"LED1ON"),
//!     other => panic!("unexpected {:?}", other),
//! }
//! # Ok::<(), Error>(())
//! ```

use core::str;
use core::time::Duration;

use log::{debug, error, info, warn};

use crate::network::error::Error;
use crate::network::{Connection, Read, Write};
use crate::system::Clock;
use crate::system::fmt::printable;

// MQTT Control Packet types - these are the fixed header packet type values
const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const PUBACK: u8 = 0x40;
const SUBSCRIBE: u8 = 0x82;
const SUBACK: u8 = 0x90;
const PINGREQ: u8 = 0xC0;
const PINGRESP: u8 = 0xD0;
const DISCONNECT: u8 = 0xE0;

const PROTOCOL_NAME: &[u8] = b"MQTT";
const PROTOCOL_LEVEL: u8 = 4; // MQTT 3.1.1

/// Largest value the variable-length remaining-length field can carry.
const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// SUBACK return code for a refused subscription.
const SUBACK_FAILURE: u8 = 0x80;

/// Bytes of a payload shown in log lines.
const LOGGED_PAYLOAD_LEN: usize = 64;

/// Default size of the message and payload buffers.
pub const DEFAULT_BUFFER_SIZE: usize = 128;

/// Quality of Service levels for MQTT messages.
///
/// ```rust
/// use celliot::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::from_bits(1), Some(QoS::AtLeastOnce));
/// assert_eq!(QoS::from_bits(3), None);
/// assert_eq!(QoS::ExactlyOnce as u8, 2);
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QoS {
    /// **QoS 0**: At most once delivery.
    AtMostOnce = 0,
    /// **QoS 1**: At least once delivery. Acknowledged with PUBACK.
    AtLeastOnce = 1,
    /// **QoS 2**: Exactly once delivery.
    ///
    /// Encoded on the wire, but the PUBREC/PUBREL/PUBCOMP exchange is not
    /// carried out.
    ExactlyOnce = 2,
}

impl QoS {
    /// Decode the two QoS bits of a header or SUBACK code.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}

/// CONNACK return code.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectReturnCode {
    /// Connection accepted.
    Accepted = 0,
    /// The broker does not support protocol level 4.
    UnacceptableProtocolVersion = 1,
    /// The client identifier is not allowed.
    IdentifierRejected = 2,
    /// The MQTT service is unavailable.
    ServerUnavailable = 3,
    /// The user name or password is malformed or wrong.
    BadUserNameOrPassword = 4,
    /// The client is not authorized to connect.
    NotAuthorized = 5,
}

impl ConnectReturnCode {
    /// Decode a CONNACK return code byte.
    pub fn from_byte(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Accepted),
            1 => Some(Self::UnacceptableProtocolVersion),
            2 => Some(Self::IdentifierRejected),
            3 => Some(Self::ServerUnavailable),
            4 => Some(Self::BadUserNameOrPassword),
            5 => Some(Self::NotAuthorized),
            _ => None,
        }
    }
}

impl core::fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Self::Accepted => "accepted",
            Self::UnacceptableProtocolVersion => "unacceptable protocol version",
            Self::IdentifierRejected => "identifier rejected",
            Self::ServerUnavailable => "server unavailable",
            Self::BadUserNameOrPassword => "bad user name or password",
            Self::NotAuthorized => "not authorized",
        };
        f.write_str(text)
    }
}

/// Outcome of one subscription in a SUBACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SubscribeResult {
    /// Subscribed with the granted maximum QoS.
    Granted(QoS),
    /// The broker refused the subscription.
    Failure,
}

/// A PUBLISH message, sent or received.
///
/// On the receive side `topic` and `payload` borrow the client's buffers.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PublishPacket<'a> {
    /// Topic name.
    pub topic: &'a str,
    /// Application payload.
    pub payload: &'a [u8],
    /// Delivery guarantee.
    pub qos: QoS,
    /// Packet identifier; present when `qos` is above 0. When sending, `None`
    /// lets the client allocate one.
    pub packet_id: Option<u16>,
    /// Retain flag.
    pub retain: bool,
    /// Duplicate delivery flag.
    pub dup: bool,
}

/// Something the broker sent.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Event<'a> {
    /// An application message on a subscribed topic. QoS 1 messages have
    /// already been acknowledged.
    Publish(PublishPacket<'a>),
    /// A QoS 1 publish was acknowledged.
    PubAck(u16),
    /// A subscription was answered.
    SubAck {
        /// Packet identifier of the SUBSCRIBE.
        packet_id: u16,
        /// Outcome of the first topic filter.
        result: SubscribeResult,
    },
    /// The broker answered a keepalive ping.
    PingResp,
    /// A publish whose payload exceeds the payload buffer arrived. The payload
    /// was read and discarded so the stream stays in sync.
    PayloadTooLarge {
        /// Payload length announced by the broker.
        len: usize,
    },
}

/// Configuration options for MQTT client connection.
///
/// ```rust
/// use celliot::network::application::mqtt::Options;
///
/// let options = Options {
///     username: Some("device"),
///     password: Some(b"secret"),
///     ..Options::new("my_iot_device")
/// };
/// assert_eq!(options.keep_alive_seconds, 60);
/// ```
#[derive(Debug, Clone)]
pub struct Options<'a> {
    /// The client identifier, unique within the broker.
    pub client_id: &'a str,
    /// The keep-alive interval in seconds. 0 disables keep-alive.
    pub keep_alive_seconds: u16,
    /// Whether the broker should discard any previous session state.
    pub clean_session: bool,
    /// Optional user name.
    pub username: Option<&'a str>,
    /// Optional password. Only valid together with a user name.
    pub password: Option<&'a [u8]>,
}

impl<'a> Options<'a> {
    /// Clean session, 60 s keep-alive, no credentials.
    pub fn new(client_id: &'a str) -> Self {
        Self {
            client_id,
            keep_alive_seconds: 60,
            clean_session: true,
            username: None,
            password: None,
        }
    }
}

/// An MQTT 3.1.1 client for publish-subscribe messaging.
///
/// # Type Parameters
///
/// * `C` - The connection type implementing [`Connection`]
/// * `K` - Uptime source for keep-alive bookkeeping
/// * `N` - Size of the message buffer
/// * `P` - Size of the incoming payload buffer
pub struct Client<
    C: Connection,
    K: Clock,
    const N: usize = DEFAULT_BUFFER_SIZE,
    const P: usize = DEFAULT_BUFFER_SIZE,
> {
    connection: C,
    clock: K,
    keep_alive_ms: u64,
    last_tx_ms: u64,
    ping_outstanding: bool,
    next_packet_id: u16,
    tx: [u8; N],
    rx: [u8; N],
    payload: [u8; P],
}

impl<C: Connection, K: Clock, const N: usize, const P: usize> core::fmt::Debug
    for Client<C, K, N, P>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("keep_alive_ms", &self.keep_alive_ms)
            .field("last_tx_ms", &self.last_tx_ms)
            .field("ping_outstanding", &self.ping_outstanding)
            .field("next_packet_id", &self.next_packet_id)
            .finish_non_exhaustive()
    }
}

impl<C: Connection, K: Clock, const N: usize, const P: usize> Client<C, K, N, P> {
    /// Establish an MQTT connection with the broker.
    ///
    /// Sends CONNECT and waits for CONNACK.
    ///
    /// # Errors
    ///
    /// * [`Error::ConnectionRefused`] - CONNACK carried a non-zero return code
    /// * [`Error::ProtocolError`] - Anything but a well-formed CONNACK arrived,
    ///   or a password was given without a user name
    /// * [`Error::MessageTooLarge`] - CONNECT does not fit in `N` bytes
    /// * Transport errors from the connection
    pub fn connect(connection: C, clock: K, options: &Options<'_>) -> Result<Self, Error> {
        let last_tx_ms = clock.uptime_ms();
        let mut client = Self {
            connection,
            clock,
            keep_alive_ms: u64::from(options.keep_alive_seconds) * 1000,
            last_tx_ms,
            ping_outstanding: false,
            next_packet_id: 1,
            tx: [0; N],
            rx: [0; N],
            payload: [0; P],
        };
        client.send_connect(options)?;
        client.read_connack()?;
        Ok(client)
    }

    fn send_connect(&mut self, options: &Options<'_>) -> Result<(), Error> {
        if options.password.is_some() && options.username.is_none() {
            return Err(Error::ProtocolError);
        }

        let client_id = options.client_id.as_bytes();
        let mut flags = 0;
        if options.clean_session {
            flags |= 0x02;
        }
        // Variable header: protocol name, level, flags, keep-alive.
        let mut remaining = 2 + PROTOCOL_NAME.len() + 4 + 2 + client_id.len();
        if let Some(username) = options.username {
            flags |= 0x80;
            remaining += 2 + username.len();
        }
        if let Some(password) = options.password {
            flags |= 0x40;
            remaining += 2 + password.len();
        }

        let mut packet = PacketWriter::new(&mut self.tx);
        packet.put_fixed_header(CONNECT, remaining)?;
        packet.put_field(PROTOCOL_NAME)?;
        packet.put_u8(PROTOCOL_LEVEL)?;
        packet.put_u8(flags)?;
        packet.put_u16(options.keep_alive_seconds)?;
        packet.put_field(client_id)?;
        if let Some(username) = options.username {
            packet.put_field(username.as_bytes())?;
        }
        if let Some(password) = options.password {
            packet.put_field(password)?;
        }
        let len = packet.len();
        self.send(len, &[])
    }

    fn read_connack(&mut self) -> Result<(), Error> {
        let mut header = [0u8; 4];
        read_exact(&mut self.connection, &mut header)?;
        if header[0] != CONNACK || header[1] != 2 {
            error!("Expected CONNACK, got 0x{:02x}", header[0]);
            return Err(Error::ProtocolError);
        }

        match ConnectReturnCode::from_byte(header[3]) {
            Some(ConnectReturnCode::Accepted) => {
                info!("MQTT client connected");
                Ok(())
            }
            Some(code) => {
                error!("MQTT connect failed: {}", code);
                Err(Error::ConnectionRefused)
            }
            None => Err(Error::ProtocolError),
        }
    }

    /// Publish `payload` to `topic`, without retain or dup flags.
    ///
    /// Returns the packet identifier allocated for QoS 1 and 2.
    pub fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<Option<u16>, Error> {
        self.publish_packet(&PublishPacket {
            topic,
            payload,
            qos,
            packet_id: None,
            retain: false,
            dup: false,
        })
    }

    /// Publish a message with explicit flags and packet identifier.
    pub fn publish_packet(&mut self, message: &PublishPacket<'_>) -> Result<Option<u16>, Error> {
        let packet_id = match message.qos {
            QoS::AtMostOnce => None,
            _ => Some(match message.packet_id {
                Some(id) => id,
                None => self.allocate_packet_id(),
            }),
        };

        let mut first = PUBLISH | ((message.qos as u8) << 1);
        if message.dup {
            first |= 0x08;
        }
        if message.retain {
            first |= 0x01;
        }
        let id_len = if packet_id.is_some() { 2 } else { 0 };
        let remaining = 2 + message.topic.len() + id_len + message.payload.len();

        let mut packet = PacketWriter::new(&mut self.tx);
        packet.put_fixed_header(first, remaining)?;
        packet.put_field(message.topic.as_bytes())?;
        if let Some(id) = packet_id {
            packet.put_u16(id)?;
        }
        let len = packet.len();

        info!(
            "Publishing: {} to topic: {} len: {}",
            printable::<LOGGED_PAYLOAD_LEN>(message.payload),
            message.topic,
            message.topic.len()
        );
        self.send(len, message.payload)?;
        Ok(packet_id)
    }

    /// Subscribe to `topic` and wait for the matching SUBACK.
    ///
    /// Messages that arrive before the SUBACK are logged and dropped.
    ///
    /// # Errors
    ///
    /// * [`Error::ProtocolError`] - A SUBACK for another packet identifier arrived
    /// * Transport errors from the connection
    pub fn subscribe(
        &mut self,
        topic: &str,
        qos: QoS,
        packet_id: u16,
    ) -> Result<SubscribeResult, Error> {
        let remaining = 2 + 2 + topic.len() + 1;
        let mut packet = PacketWriter::new(&mut self.tx);
        packet.put_fixed_header(SUBSCRIBE, remaining)?;
        packet.put_u16(packet_id)?;
        packet.put_field(topic.as_bytes())?;
        packet.put_u8(qos as u8)?;
        let len = packet.len();

        info!("Subscribing to: {} len {}", topic, topic.len());
        self.send(len, &[])?;

        loop {
            match self.poll()? {
                Some(Event::SubAck {
                    packet_id: acked,
                    result,
                }) => {
                    if acked != packet_id {
                        error!("SUBACK for packet id {}, expected {}", acked, packet_id);
                        return Err(Error::ProtocolError);
                    }
                    return Ok(result);
                }
                Some(other) => debug!("Dropped while subscribing: {:?}", other),
                None => {}
            }
        }
    }

    /// Read the next packet from the broker, if one is available.
    ///
    /// `Ok(None)` means the connection had nothing to read (it would block or
    /// its receive timeout elapsed), or an unhandled packet type was skipped.
    ///
    /// # Errors
    ///
    /// * [`Error::ConnectionClosed`] - The broker closed the stream
    /// * [`Error::ProtocolError`] - A malformed packet arrived
    /// * [`Error::MessageTooLarge`] - An incoming topic exceeds `N` bytes
    pub fn poll(&mut self) -> Result<Option<Event<'_>>, Error> {
        let mut header = [0u8; 1];
        match self.connection.read(&mut header) {
            Ok(0) => return Err(Error::ConnectionClosed),
            Ok(_) => {}
            Err(e) => {
                let e: Error = e.into();
                return match e {
                    Error::WouldBlock | Error::Timeout => Ok(None),
                    e => Err(e),
                };
            }
        }
        let remaining = read_remaining_length(&mut self.connection)?;

        match header[0] & 0xF0 {
            PUBLISH => self.read_publish(header[0], remaining),
            PUBACK => {
                let packet_id = self.read_packet_id(remaining)?;
                info!("PUBACK packet id: {}", packet_id);
                Ok(Some(Event::PubAck(packet_id)))
            }
            SUBACK => {
                if remaining < 3 {
                    return Err(Error::ProtocolError);
                }
                let mut ack = [0u8; 3];
                read_exact(&mut self.connection, &mut ack)?;
                drain(&mut self.connection, &mut self.rx, remaining - 3)?;

                let packet_id = u16::from_be_bytes([ack[0], ack[1]]);
                let result = match ack[2] {
                    SUBACK_FAILURE => SubscribeResult::Failure,
                    code => SubscribeResult::Granted(
                        QoS::from_bits(code).ok_or(Error::ProtocolError)?,
                    ),
                };
                info!("SUBACK packet id: {}", packet_id);
                Ok(Some(Event::SubAck { packet_id, result }))
            }
            PINGRESP => {
                if remaining != 0 {
                    return Err(Error::ProtocolError);
                }
                self.ping_outstanding = false;
                debug!("PINGRESP received");
                Ok(Some(Event::PingResp))
            }
            other => {
                warn!("Unhandled MQTT packet type: 0x{:02x}", other);
                drain(&mut self.connection, &mut self.rx, remaining)?;
                Ok(None)
            }
        }
    }

    fn read_publish(&mut self, first: u8, remaining: usize) -> Result<Option<Event<'_>>, Error> {
        let qos = QoS::from_bits((first >> 1) & 0x03).ok_or(Error::ProtocolError)?;
        let dup = first & 0x08 != 0;
        let retain = first & 0x01 != 0;

        let mut topic_len = [0u8; 2];
        read_exact(&mut self.connection, &mut topic_len)?;
        let topic_len = usize::from(u16::from_be_bytes(topic_len));
        let id_len = if qos == QoS::AtMostOnce { 0 } else { 2 };
        let header_len = 2 + topic_len + id_len;
        if header_len > remaining {
            return Err(Error::ProtocolError);
        }
        if topic_len > N {
            error!("Topic of {} bytes exceeds the message buffer", topic_len);
            drain(&mut self.connection, &mut self.payload, remaining - 2)?;
            return Err(Error::MessageTooLarge);
        }
        read_exact(&mut self.connection, &mut self.rx[..topic_len])?;

        let packet_id = if id_len > 0 {
            let mut id = [0u8; 2];
            read_exact(&mut self.connection, &mut id)?;
            Some(u16::from_be_bytes(id))
        } else {
            None
        };

        let len = remaining - header_len;
        info!("MQTT PUBLISH len={}", len);
        let oversize = len > P;
        if oversize {
            drain(&mut self.connection, &mut self.payload, len)?;
        } else {
            read_exact(&mut self.connection, &mut self.payload[..len])?;
        }

        if let (QoS::AtLeastOnce, Some(id)) = (qos, packet_id) {
            self.send_ack(PUBACK, id)?;
        }

        if oversize {
            error!(
                "Received payload ({} bytes) is larger than the payload buffer size ({} bytes).",
                len, P
            );
            return Ok(Some(Event::PayloadTooLarge { len }));
        }

        let topic = str::from_utf8(&self.rx[..topic_len]).map_err(|_| Error::ProtocolError)?;
        Ok(Some(Event::Publish(PublishPacket {
            topic,
            payload: &self.payload[..len],
            qos,
            packet_id,
            retain,
            dup,
        })))
    }

    fn read_packet_id(&mut self, remaining: usize) -> Result<u16, Error> {
        if remaining != 2 {
            return Err(Error::ProtocolError);
        }
        let mut id = [0u8; 2];
        read_exact(&mut self.connection, &mut id)?;
        Ok(u16::from_be_bytes(id))
    }

    fn send_ack(&mut self, kind: u8, packet_id: u16) -> Result<(), Error> {
        let [hi, lo] = packet_id.to_be_bytes();
        self.tx[..4].copy_from_slice(&[kind, 2, hi, lo]);
        self.send(4, &[])
    }

    /// Bound how long [`poll`](Self::poll) waits for the next packet.
    ///
    /// Set it from [`keepalive_time_left`](Self::keepalive_time_left) so that
    /// a quiet broker does not hold off the next [`live`](Self::live).
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Error> {
        self.connection.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Milliseconds until a keep-alive ping is due.
    ///
    /// Returns `u64::MAX` when keep-alive is disabled.
    pub fn keepalive_time_left(&self) -> u64 {
        if self.keep_alive_ms == 0 {
            return u64::MAX;
        }
        let elapsed = self.clock.uptime_ms().saturating_sub(self.last_tx_ms);
        self.keep_alive_ms.saturating_sub(elapsed)
    }

    /// Send PINGREQ if the keep-alive interval passed since the last
    /// transmission. Returns whether a ping was sent.
    pub fn live(&mut self) -> Result<bool, Error> {
        if self.keep_alive_ms == 0 || self.keepalive_time_left() > 0 {
            return Ok(false);
        }
        if self.ping_outstanding {
            warn!("Previous PINGREQ unanswered");
        }
        self.tx[..2].copy_from_slice(&[PINGREQ, 0]);
        self.send(2, &[])?;
        self.ping_outstanding = true;
        debug!("PINGREQ sent");
        Ok(true)
    }

    /// Send DISCONNECT and close the connection.
    pub fn disconnect(mut self) -> Result<(), Error> {
        info!("Disconnecting MQTT client");
        self.tx[..2].copy_from_slice(&[DISCONNECT, 0]);
        let sent = self.send(2, &[]);
        let closed: Result<(), Error> = self.connection.close().map_err(Into::into);
        sent.and(closed)
    }

    fn allocate_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        // Packet identifiers are non-zero.
        self.next_packet_id = self.next_packet_id.wrapping_add(1).max(1);
        id
    }

    fn send(&mut self, len: usize, tail: &[u8]) -> Result<(), Error> {
        write_all(&mut self.connection, &self.tx[..len])?;
        if !tail.is_empty() {
            write_all(&mut self.connection, tail)?;
        }
        self.connection.flush().map_err(|_| Error::WriteError)?;
        self.last_tx_ms = self.clock.uptime_ms();
        Ok(())
    }
}

/// Serializes packet fields into a fixed buffer.
struct PacketWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> PacketWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn put_u8(&mut self, byte: u8) -> Result<(), Error> {
        self.put_slice(&[byte])
    }

    fn put_u16(&mut self, value: u16) -> Result<(), Error> {
        self.put_slice(&value.to_be_bytes())
    }

    fn put_slice(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let end = self.len + bytes.len();
        self.buf
            .get_mut(self.len..end)
            .ok_or(Error::MessageTooLarge)?
            .copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }

    /// A length-prefixed string or binary field.
    fn put_field(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let len = u16::try_from(bytes.len()).map_err(|_| Error::ProtocolError)?;
        self.put_u16(len)?;
        self.put_slice(bytes)
    }

    /// Packet type and flags followed by the remaining length, 7 bits per
    /// byte with the high bit marking continuation.
    fn put_fixed_header(&mut self, first: u8, mut remaining: usize) -> Result<(), Error> {
        if remaining > MAX_REMAINING_LENGTH {
            return Err(Error::ProtocolError);
        }
        self.put_u8(first)?;
        loop {
            let mut byte = (remaining % 128) as u8;
            remaining /= 128;
            if remaining > 0 {
                byte |= 0x80;
            }
            self.put_u8(byte)?;
            if remaining == 0 {
                return Ok(());
            }
        }
    }
}

fn read_remaining_length<C: Read>(connection: &mut C) -> Result<usize, Error> {
    let mut value = 0usize;
    let mut byte = [0u8; 1];
    for shift in [0, 7, 14, 21] {
        read_exact(connection, &mut byte)?;
        value |= usize::from(byte[0] & 0x7F) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(Error::ProtocolError)
}

/// Fill `buf` completely. Would-block results mid-packet are retried.
fn read_exact<C: Read>(connection: &mut C, buf: &mut [u8]) -> Result<(), Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match connection.read(&mut buf[filled..]) {
            Ok(0) => return Err(Error::ConnectionClosed),
            Ok(n) => filled += n,
            // A packet that has started is read to its end.
            Err(e) => match Into::<Error>::into(e) {
                Error::WouldBlock | Error::Timeout => {}
                e => return Err(e),
            },
        }
    }
    Ok(())
}

/// Read and discard `len` bytes through `scratch`.
fn drain<C: Read>(connection: &mut C, scratch: &mut [u8], mut len: usize) -> Result<(), Error> {
    if scratch.is_empty() && len > 0 {
        return Err(Error::MessageTooLarge);
    }
    while len > 0 {
        let chunk = len.min(scratch.len());
        read_exact(connection, &mut scratch[..chunk])?;
        len -= chunk;
    }
    Ok(())
}

fn write_all<C: Write>(connection: &mut C, mut buf: &[u8]) -> Result<(), Error> {
    while !buf.is_empty() {
        match connection.write(buf) {
            Ok(0) => return Err(Error::WriteError),
            Ok(n) => buf = &buf[n..],
            Err(_) => return Err(Error::WriteError),
        }
    }
    Ok(())
}
