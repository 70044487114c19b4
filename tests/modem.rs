use celliot::modem::at::{client_id, parse_cereg, read_imei, send_command, wait_for_registration};
use celliot::modem::{
    modem_configure, Error, LinkSettings, LteEvent, LteHandler, LteMonitor, RegistrationStatus,
    RrcMode,
};
use celliot::sync::{Latest, Signal};

mod common;
use common::{leak, registered_home, MockAt, MockLink};

fn deliver(monitor: &LteMonitor, events: &[LteEvent]) {
    for event in events {
        monitor.on_event(event);
    }
}

#[test]
fn test_monitor_signals_on_registration_only() {
    let monitor = LteMonitor::new();

    deliver(&monitor, &[
        LteEvent::NwRegStatus(RegistrationStatus::Searching),
        LteEvent::RrcUpdate(RrcMode::Connected),
        LteEvent::CellUpdate { id: 0x1234, tac: 0x0A0B },
    ]);
    assert!(!monitor.registered().is_given());
    assert_eq!(monitor.status(), Some(RegistrationStatus::Searching));

    deliver(&monitor, &[LteEvent::NwRegStatus(RegistrationStatus::RegisteredRoaming)]);
    assert!(monitor.registered().try_take());
    assert_eq!(monitor.status(), Some(RegistrationStatus::RegisteredRoaming));

    deliver(&monitor, &[LteEvent::NwRegStatus(RegistrationStatus::RegistrationDenied)]);
    assert!(!monitor.registered().is_given());
}

#[test]
fn test_monitor_active_time() {
    let monitor = LteMonitor::new();
    assert_eq!(monitor.status(), None);

    deliver(&monitor, &[LteEvent::PsmUpdate { tau: 3240, active_time: -1 }]);
    assert!(!monitor.active_time().is_given());

    deliver(&monitor, &[
        LteEvent::EdrxUpdate { edrx: 5.12, ptw: 1.28 },
        LteEvent::PsmUpdate { tau: 3240, active_time: 20 },
    ]);
    assert!(monitor.active_time().try_take());
}

#[test]
fn test_modem_configure_requests_power_saving() {
    let monitor = leak(LteMonitor::new());
    let mut link = MockLink {
        events: registered_home(),
        ..Default::default()
    };

    modem_configure(&mut link, monitor, &LinkSettings { psm: true, edrx: true }).unwrap();
    assert!(link.psm_requested);
    assert!(link.edrx_requested);

    // Registration was reported while attaching.
    monitor.wait_registered();
    assert_eq!(monitor.status(), Some(RegistrationStatus::RegisteredHome));
}

#[test]
fn test_modem_configure_tolerates_psm_failure() {
    let monitor = leak(LteMonitor::new());
    let mut link = MockLink {
        fail_psm: true,
        ..Default::default()
    };

    assert_eq!(
        modem_configure(&mut link, monitor, &LinkSettings { psm: true, edrx: false }),
        Ok(())
    );
    assert!(!link.edrx_requested);
}

#[test]
fn test_modem_configure_failures() {
    let monitor = leak(LteMonitor::new());

    let mut link = MockLink {
        fail_init: true,
        ..Default::default()
    };
    assert_eq!(
        modem_configure(&mut link, monitor, &LinkSettings::default()),
        Err(Error::Init)
    );

    let mut link = MockLink {
        fail_connect: true,
        ..Default::default()
    };
    assert_eq!(
        modem_configure(&mut link, monitor, &LinkSettings::default()),
        Err(Error::Link)
    );
}

#[test]
fn test_parse_cereg_forms() {
    assert_eq!(parse_cereg("+CEREG: 1"), Some(RegistrationStatus::RegisteredHome));
    assert_eq!(
        parse_cereg("+CEREG: 5,\"0A0B\",\"01234567\",7"),
        Some(RegistrationStatus::RegisteredRoaming)
    );
    assert_eq!(
        parse_cereg("+CEREG: 2,90,\"FFFE\""),
        Some(RegistrationStatus::UiccFail)
    );
    assert_eq!(parse_cereg("+CEREG: 2,7"), None);
    assert_eq!(parse_cereg("+CEREG:"), None);
    assert_eq!(parse_cereg("OK"), None);
}

#[test]
fn test_send_command_collects_lines() {
    let mut at = MockAt::default().reply("AT+CGMR", &["\r\nmfw_nrf9160_1.3.5\r\n", "OK\r\n"]);

    let mut lines = Vec::new();
    send_command(&mut at, "AT+CGMR", |line| lines.push(line.to_string())).unwrap();
    assert_eq!(lines, vec!["mfw_nrf9160_1.3.5".to_string()]);
    assert_eq!(at.sent, vec!["AT+CGMR".to_string()]);
}

#[test]
fn test_send_command_final_responses() {
    let mut at = MockAt::default()
        .reply("AT+CFUN=1", &["OK\r\n"])
        .reply("AT+CPIN?", &["+CME ERROR: 10\r\n"])
        .reply("AT+CMGS", &["+CMS ERROR: 302\r\n"]);

    assert_eq!(send_command(&mut at, "AT+CFUN=1", |_| {}), Ok(()));
    assert_eq!(send_command(&mut at, "AT+CPIN?", |_| {}), Err(Error::CmeError(10)));
    assert_eq!(send_command(&mut at, "AT+CMGS", |_| {}), Err(Error::CmsError(302)));
    assert_eq!(send_command(&mut at, "AT+UNKNOWN", |_| {}), Err(Error::AtError));
}

#[test]
fn test_send_command_transport_failures() {
    let mut at = MockAt {
        fail_send: true,
        ..Default::default()
    };
    assert_eq!(send_command(&mut at, "AT", |_| {}), Err(Error::Transport));

    // The modem never answers.
    let mut at = MockAt::default().reply("AT", &[]);
    assert_eq!(send_command(&mut at, "AT", |_| {}), Err(Error::Transport));
}

#[test]
fn test_wait_for_registration_reads_notifications() {
    let mut at = MockAt::default().reply(
        "AT+CEREG=2",
        &[
            "OK\r\n",
            "+CEREG: 2,\"0A0B\",\"01234567\",7\r\n",
            "+CEREG: 1,\"0A0B\",\"01234567\",7\r\n",
        ],
    );
    assert_eq!(
        wait_for_registration(&mut at),
        Ok(RegistrationStatus::RegisteredHome)
    );
}

#[test]
fn test_read_imei_and_client_id() {
    let reply = ["352656100367872\r\nOK\r\n"];
    let mut at = MockAt::default().reply("AT+CGSN", &reply);
    assert_eq!(read_imei(&mut at).unwrap().as_str(), "352656100367872");

    let mut at = MockAt::default().reply("AT+CGSN", &reply);
    let id = client_id::<_, 32>("", &mut at).unwrap();
    assert_eq!(id.as_str(), "nrf-352656100367872");

    let mut at = MockAt::default();
    let id = client_id::<_, 32>("my-device", &mut at).unwrap();
    assert_eq!(id.as_str(), "my-device");
    assert!(at.sent.is_empty());
}

#[test]
fn test_client_id_too_long() {
    let mut at = MockAt::default().reply("AT+CGSN", &["352656100367872\r\nOK\r\n"]);
    assert_eq!(
        client_id::<_, 8>("", &mut at).unwrap_err(),
        Error::MessageTooLarge
    );
    assert_eq!(
        client_id::<_, 4>("configured", &mut at).unwrap_err(),
        Error::MessageTooLarge
    );
}

#[test]
fn test_lines_split_across_reads() {
    let mut at = MockAt::default().reply("AT+CGSN", &["352656100367872\r\nO", "K\r\n"]);
    assert_eq!(read_imei(&mut at).unwrap().as_str(), "352656100367872");

    let mut at = MockAt::default().reply("AT+CGSN", &["3526561003", "67872\r\nOK\r\n"]);
    assert_eq!(read_imei(&mut at).unwrap().as_str(), "352656100367872");

    // A final response without its line ending is not complete yet.
    let mut at = MockAt::default().reply("AT+CFUN=1", &["OK"]);
    assert_eq!(send_command(&mut at, "AT+CFUN=1", |_| {}), Err(Error::Transport));
}

#[test]
fn test_multibyte_character_split_across_reads() {
    let text = "+CGMR: caf\u{e9}\r\nOK\r\n".as_bytes();
    let split = text.iter().position(|&b| b == 0xC3).unwrap() + 1;
    let mut at = MockAt::default().reply_bytes("AT+CGMR", &[&text[..split], &text[split..]]);

    let mut lines = Vec::new();
    send_command(&mut at, "AT+CGMR", |line| lines.push(line.to_string())).unwrap();
    assert_eq!(lines, vec!["+CGMR: caf\u{e9}".to_string()]);

    let mut at = MockAt::default().reply_bytes("AT+CGMR", &[b"\xFF\xFE\r\n", b"OK\r\n"]);
    assert_eq!(send_command(&mut at, "AT+CGMR", |_| {}), Err(Error::InvalidResponse));
}

#[test]
fn test_overlong_line_rejected() {
    let half = "A".repeat(200);
    let mut at = MockAt::default().reply("AT+CGMR", &[half.as_str(), half.as_str(), "\r\nOK\r\n"]);
    assert_eq!(send_command(&mut at, "AT+CGMR", |_| {}), Err(Error::MessageTooLarge));
}

#[test]
fn test_notification_in_same_read_as_final_response() {
    let mut at = MockAt::default().reply(
        "AT+CEREG=2",
        &["OK\r\n+CEREG: 5,\"0A0B\",\"01234567\",7\r\n"],
    );
    assert_eq!(
        wait_for_registration(&mut at),
        Ok(RegistrationStatus::RegisteredRoaming)
    );
}

#[test]
fn test_read_imei_without_digits() {
    let mut at = MockAt::default().reply("AT+CGSN", &["OK\r\n"]);
    assert_eq!(read_imei(&mut at).unwrap_err(), Error::InvalidResponse);
}

#[test]
fn test_signal_is_binary() {
    let signal = Signal::new();
    signal.give();
    signal.give();
    assert!(signal.try_take());
    assert!(!signal.try_take());
}

#[test]
fn test_latest_keeps_newest() {
    let latest = Latest::new();
    assert_eq!(latest.get(), None);
    latest.publish(1u32);
    latest.publish(2u32);
    assert_eq!(latest.get(), Some(2));
    assert_eq!(latest.take(), Some(2));
    assert_eq!(latest.get(), None);
}
