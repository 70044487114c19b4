use std::ops::ControlFlow;
use std::time::Duration;

use celliot::board::Led;
use celliot::network::application::mqtt::{
    Client, Event, LedCommand, Options, PublishPacket, QoS, ReconnectLoop, SubscribeResult,
};
use celliot::network::error::Error;

mod common;
use common::{MockConnection, MockDelay, SimClock};

const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

fn connected<'c>(
    wire: &MockConnection,
    clock: &'c SimClock,
) -> Client<MockConnection, &'c SimClock> {
    wire.push_inbound(&CONNACK_ACCEPTED);
    let client = Client::connect(wire.clone(), clock, &Options::new("nrf-1")).unwrap();
    wire.take_outbound();
    client
}

#[test]
fn test_connect_packet() {
    let wire = MockConnection::new();
    wire.push_inbound(&CONNACK_ACCEPTED);
    let clock = SimClock::default();

    let client: Result<Client<_, _>, _> =
        Client::connect(wire.clone(), &clock, &Options::new("nrf-1"));
    assert!(client.is_ok());
    assert_eq!(
        wire.take_outbound(),
        vec![
            0x10, 17, // CONNECT, remaining length
            0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, // protocol name and level
            0x02, // clean session
            0x00, 60, // keep-alive
            0x00, 0x05, b'n', b'r', b'f', b'-', b'1',
        ]
    );
}

#[test]
fn test_connect_with_credentials() {
    let wire = MockConnection::new();
    wire.push_inbound(&CONNACK_ACCEPTED);
    let clock = SimClock::default();
    let options = Options {
        username: Some("u"),
        password: Some(b"p"),
        keep_alive_seconds: 0,
        ..Options::new("c")
    };

    let _client: Client<_, _> = Client::connect(wire.clone(), &clock, &options).unwrap();
    let packet = wire.take_outbound();
    assert_eq!(packet[9], 0xC2);
    assert_eq!(&packet[packet.len() - 6..], &[0, 1, b'u', 0, 1, b'p']);
}

#[test]
fn test_password_requires_username() {
    let wire = MockConnection::new();
    let clock = SimClock::default();
    let options = Options {
        password: Some(b"secret"),
        ..Options::new("c")
    };

    let result: Result<Client<_, _>, _> = Client::connect(wire.clone(), &clock, &options);
    assert_eq!(result.unwrap_err(), Error::ProtocolError);
    assert!(wire.take_outbound().is_empty());
}

#[test]
fn test_connack_refused() {
    let wire = MockConnection::new();
    wire.push_inbound(&[0x20, 0x02, 0x00, 0x05]);
    let clock = SimClock::default();

    let result: Result<Client<_, _>, _> = Client::connect(wire, &clock, &Options::new("c"));
    assert_eq!(result.unwrap_err(), Error::ConnectionRefused);
}

#[test]
fn test_connect_expects_connack() {
    let wire = MockConnection::new();
    wire.push_inbound(&[0xD0, 0x00, 0x00, 0x00]);
    let clock = SimClock::default();

    let result: Result<Client<_, _>, _> = Client::connect(wire, &clock, &Options::new("c"));
    assert_eq!(result.unwrap_err(), Error::ProtocolError);
}

#[test]
fn test_publish_allocates_packet_ids() {
    let wire = MockConnection::new();
    let clock = SimClock::default();
    let mut client = connected(&wire, &clock);

    assert_eq!(client.publish("t", b"hi", QoS::AtLeastOnce), Ok(Some(1)));
    assert_eq!(
        wire.take_outbound(),
        vec![0x32, 7, 0, 1, b't', 0, 1, b'h', b'i']
    );

    assert_eq!(client.publish("t", b"hi", QoS::AtMostOnce), Ok(None));
    assert_eq!(wire.take_outbound(), vec![0x30, 5, 0, 1, b't', b'h', b'i']);

    assert_eq!(client.publish("t", b"hi", QoS::AtLeastOnce), Ok(Some(2)));
}

#[test]
fn test_publish_packet_flags() {
    let wire = MockConnection::new();
    let clock = SimClock::default();
    let mut client = connected(&wire, &clock);

    let message = PublishPacket {
        topic: "t",
        payload: b"x",
        qos: QoS::AtLeastOnce,
        packet_id: Some(0x0102),
        retain: true,
        dup: true,
    };
    assert_eq!(client.publish_packet(&message), Ok(Some(0x0102)));
    assert_eq!(
        wire.take_outbound(),
        vec![0x3B, 6, 0, 1, b't', 0x01, 0x02, b'x']
    );
}

#[test]
fn test_publish_long_payload_uses_two_length_bytes() {
    let wire = MockConnection::new();
    let clock = SimClock::default();
    let mut client = connected(&wire, &clock);

    let payload = [b'a'; 200];
    client.publish("t", &payload, QoS::AtMostOnce).unwrap();
    let packet = wire.take_outbound();
    assert_eq!(&packet[..3], &[0x30, 0xCB, 0x01]);
    assert_eq!(packet.len(), 3 + 203);
}

#[test]
fn test_poll_qos1_publish_is_acknowledged() {
    let wire = MockConnection::new().idle_when_empty();
    let clock = SimClock::default();
    let mut client = connected(&wire, &clock);

    wire.push_inbound(&[
        0x32, 13, 0, 3, b'c', b'm', b'd', 0x00, 0x07, b'L', b'E', b'D', b'1', b'O', b'N',
    ]);
    match client.poll() {
        Ok(Some(Event::Publish(message))) => {
            assert_eq!(message.topic, "cmd");
            assert_eq!(message.payload, b"LED1ON");
            assert_eq!(message.qos, QoS::AtLeastOnce);
            assert_eq!(message.packet_id, Some(7));
            assert_eq!(LedCommand::parse(message.payload), Some(LedCommand::Led1On));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(wire.take_outbound(), vec![0x40, 0x02, 0x00, 0x07]);

    assert_eq!(client.poll(), Ok(None));
}

#[test]
fn test_poll_acks_and_pings() {
    let wire = MockConnection::new().idle_when_empty();
    let clock = SimClock::default();
    let mut client = connected(&wire, &clock);

    wire.push_inbound(&[0x40, 0x02, 0x00, 0x01, 0xD0, 0x00]);
    assert_eq!(client.poll(), Ok(Some(Event::PubAck(1))));
    assert_eq!(client.poll(), Ok(Some(Event::PingResp)));
}

#[test]
fn test_poll_skips_unhandled_packets() {
    let wire = MockConnection::new().idle_when_empty();
    let clock = SimClock::default();
    let mut client = connected(&wire, &clock);

    // PUBREC, then PINGRESP.
    wire.push_inbound(&[0x50, 0x02, 0x00, 0x01, 0xD0, 0x00]);
    assert_eq!(client.poll(), Ok(None));
    assert_eq!(client.poll(), Ok(Some(Event::PingResp)));
}

#[test]
fn test_oversize_payload_is_drained() {
    let wire = MockConnection::new().idle_when_empty();
    let clock = SimClock::default();
    wire.push_inbound(&CONNACK_ACCEPTED);
    let mut client: Client<_, _, 128, 4> =
        Client::connect(wire.clone(), &clock, &Options::new("c")).unwrap();

    wire.push_inbound(&[0x30, 11, 0, 3, b'c', b'm', b'd', b'L', b'E', b'D', b'1', b'O', b'N']);
    wire.push_inbound(&[0xD0, 0x00]);

    assert_eq!(client.poll(), Ok(Some(Event::PayloadTooLarge { len: 6 })));
    assert_eq!(client.poll(), Ok(Some(Event::PingResp)));
}

#[test]
fn test_poll_reports_closed_stream() {
    let wire = MockConnection::new();
    let clock = SimClock::default();
    let mut client = connected(&wire, &clock);

    assert_eq!(client.poll(), Err(Error::ConnectionClosed));
}

#[test]
fn test_subscribe_waits_for_suback() {
    let wire = MockConnection::new().idle_when_empty();
    let clock = SimClock::default();
    let mut client = connected(&wire, &clock);

    // A stray QoS 0 publish arrives before the SUBACK.
    wire.push_inbound(&[0x30, 0x04, 0x00, 0x01, b't', b'x']);
    wire.push_inbound(&[0x90, 0x03, 0x04, 0xD2, 0x01]);

    assert_eq!(
        client.subscribe("led", QoS::AtLeastOnce, 1234),
        Ok(SubscribeResult::Granted(QoS::AtLeastOnce))
    );
    assert_eq!(
        wire.take_outbound(),
        vec![0x82, 8, 0x04, 0xD2, 0, 3, b'l', b'e', b'd', 0x01]
    );
}

#[test]
fn test_subscribe_refused_or_mismatched() {
    let wire = MockConnection::new().idle_when_empty();
    let clock = SimClock::default();
    let mut client = connected(&wire, &clock);

    wire.push_inbound(&[0x90, 0x03, 0x00, 0x01, 0x80]);
    assert_eq!(
        client.subscribe("led", QoS::AtLeastOnce, 1),
        Ok(SubscribeResult::Failure)
    );

    wire.push_inbound(&[0x90, 0x03, 0x00, 0x09, 0x00]);
    assert_eq!(
        client.subscribe("led", QoS::AtMostOnce, 2),
        Err(Error::ProtocolError)
    );
}

#[test]
fn test_live_pings_after_keepalive() {
    let wire = MockConnection::new().idle_when_empty();
    let clock = SimClock::at(1_000);
    let mut client = connected(&wire, &clock);

    assert_eq!(client.keepalive_time_left(), 60_000);
    clock.advance(59_999);
    assert_eq!(client.live(), Ok(false));
    assert_eq!(client.keepalive_time_left(), 1);

    clock.advance(1);
    assert_eq!(client.live(), Ok(true));
    assert_eq!(wire.take_outbound(), vec![0xC0, 0x00]);
    assert_eq!(client.keepalive_time_left(), 60_000);
}

#[test]
fn test_publish_defers_ping() {
    let wire = MockConnection::new().idle_when_empty();
    let clock = SimClock::default();
    let mut client = connected(&wire, &clock);

    clock.advance(50_000);
    client.publish("t", b"x", QoS::AtMostOnce).unwrap();
    clock.advance(50_000);
    assert_eq!(client.live(), Ok(false));
    assert_eq!(client.keepalive_time_left(), 10_000);
}

#[test]
fn test_keepalive_disabled() {
    let wire = MockConnection::new();
    wire.push_inbound(&CONNACK_ACCEPTED);
    let clock = SimClock::default();
    let options = Options {
        keep_alive_seconds: 0,
        ..Options::new("c")
    };
    let mut client: Client<_, _> = Client::connect(wire, &clock, &options).unwrap();

    clock.advance(u32::MAX as u64);
    assert_eq!(client.keepalive_time_left(), u64::MAX);
    assert_eq!(client.live(), Ok(false));
}

#[test]
fn test_disconnect_closes_connection() {
    let wire = MockConnection::new();
    let clock = SimClock::default();
    let client = connected(&wire, &clock);

    client.disconnect().unwrap();
    assert_eq!(wire.take_outbound(), vec![0xE0, 0x00]);
    assert!(wire.is_closed());
}

#[test]
fn test_reconnect_sleeps_between_attempts() {
    let mut delay = MockDelay::default();
    let mut reconnect = ReconnectLoop::new(Duration::from_secs(60));

    let last = reconnect.run(&mut delay, |attempt| {
        if attempt < 3 {
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(attempt)
        }
    });

    assert_eq!(last, 3);
    assert_eq!(reconnect.attempts(), 3);
    assert_eq!(delay.slept, vec![Duration::from_secs(60); 2]);
}

#[test]
fn test_led_commands() {
    assert_eq!(LedCommand::parse(b"LED2ON"), Some(LedCommand::Led2On));
    assert_eq!(LedCommand::parse(b"LED1OFF\r\n"), Some(LedCommand::Led1Off));
    assert_eq!(LedCommand::parse(b"LED3ON"), None);
    assert_eq!(LedCommand::parse(b""), None);

    assert_eq!(LedCommand::Led2Off.led(), Led::Led2);
    assert!(!LedCommand::Led2Off.turns_on());
}

#[cfg(feature = "std")]
#[test]
#[ignore = "needs a reachable MQTT broker"]
fn test_public_broker_round_trip() {
    use celliot::network::Read;
    use celliot::network::std_net::TcpConnection;
    use celliot::system::StdClock;
    use dotenvy::dotenv;
    use std::env;
    use std::net::TcpStream;

    dotenv().ok();
    let address =
        env::var("TEST_MQTT_ADDRESS").unwrap_or("test.mosquitto.org:1883".to_string());
    let stream = TcpStream::connect(address).expect("Failed to connect to broker");
    let mut connection = TcpConnection::new(stream);
    connection
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let options = Options {
        keep_alive_seconds: 10,
        ..Options::new("celliot-test-client-4711")
    };
    let mut client: Client<_, _> =
        Client::connect(connection, StdClock::new(), &options).expect("Failed to connect");

    let topic = "celliot/test-topic";
    assert_eq!(
        client.subscribe(topic, QoS::AtLeastOnce, 1),
        Ok(SubscribeResult::Granted(QoS::AtLeastOnce))
    );
    client
        .publish(topic, b"LED1ON", QoS::AtLeastOnce)
        .expect("Failed to publish");

    let mut delivered = false;
    for _ in 0..10 {
        if let Some(Event::Publish(message)) = client.poll().expect("Failed to poll") {
            assert_eq!(message.topic, topic);
            assert_eq!(message.payload, b"LED1ON");
            delivered = true;
            break;
        }
    }
    assert!(delivered);
    client.disconnect().unwrap();
}
