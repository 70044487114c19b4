#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use celliot::board::{ButtonEvent, Buttons, Led, Leds};
use celliot::gnss::{Gnss, GnssEvent, GnssHandler};
use celliot::modem::at::AtTransport;
use celliot::modem::{FunctionalMode, LinkController, LteEvent, LteHandler};
use celliot::network::error::Error;
use celliot::network::security::{
    CredentialStore, CredentialType, Error as SecurityError, SecTag, SecureSocketOptions,
};
use celliot::network::*;
use celliot::system::{Clock, Delay};

pub const SERVER_IP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);

/// Both directions of a stream connection, shared with the test.
#[derive(Debug, Default)]
pub struct Wire {
    pub inbound: VecDeque<u8>,
    pub outbound: Vec<u8>,
    pub closed: bool,
    /// Returned by `read` once `inbound` is empty. `None` reads as end of stream.
    pub when_empty: Option<Error>,
    /// Every timeout set on the connection, in order.
    pub timeouts: Vec<Option<Duration>>,
    /// Set by `blocking`: an empty read waits out the receive timeout on this
    /// clock instead of returning at once.
    pub clock: Option<&'static SimClock>,
    /// Timed-out reads left before the stream ends.
    pub idle_reads: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    pub wire: Rc<RefCell<Wire>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idle_when_empty(self) -> Self {
        self.wire.borrow_mut().when_empty = Some(Error::WouldBlock);
        self
    }

    /// A socket whose empty reads block: for the receive timeout on `clock`
    /// when one is set, forever otherwise. The stream ends after `idle_reads`
    /// timeouts.
    pub fn blocking(clock: &'static SimClock, idle_reads: usize) -> Self {
        let connection = Self::new();
        {
            let mut wire = connection.wire.borrow_mut();
            wire.clock = Some(clock);
            wire.idle_reads = idle_reads;
        }
        connection
    }

    pub fn timeouts(&self) -> Vec<Option<Duration>> {
        self.wire.borrow().timeouts.clone()
    }

    pub fn push_inbound(&self, data: &[u8]) {
        self.wire.borrow_mut().inbound.extend(data);
    }

    pub fn take_outbound(&self) -> Vec<u8> {
        std::mem::take(&mut self.wire.borrow_mut().outbound)
    }

    pub fn is_closed(&self) -> bool {
        self.wire.borrow().closed
    }
}

impl Read for MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut wire = self.wire.borrow_mut();
        if wire.closed {
            return Err(Error::NotOpen);
        }
        if wire.inbound.is_empty() {
            if let Some(clock) = wire.clock {
                let Some(timeout) = wire.timeouts.last().copied().flatten() else {
                    panic!("read blocks forever: no receive timeout set");
                };
                if wire.idle_reads == 0 {
                    return Ok(0);
                }
                wire.idle_reads -= 1;
                clock.advance(timeout.as_millis() as u64);
                return Err(Error::Timeout);
            }
            return match wire.when_empty {
                Some(e) => Err(e),
                None => Ok(0),
            };
        }
        let len = buf.len().min(wire.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(wire.inbound.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Self::Error> {
        self.wire.borrow_mut().timeouts.push(timeout);
        Ok(())
    }
}

impl Write for MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut wire = self.wire.borrow_mut();
        if wire.closed {
            return Err(Error::NotOpen);
        }
        wire.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        self.wire.borrow_mut().closed = true;
        Ok(())
    }
}

impl Connection for MockConnection {}

type Responder = Box<dyn FnMut(&[u8]) -> Option<Result<Vec<u8>, Error>>>;

/// Datagrams in both directions, shared with the test.
#[derive(Default)]
pub struct Mailbox {
    pub inbound: VecDeque<Result<Vec<u8>, Error>>,
    pub sent: Vec<Vec<u8>>,
    pub closed: bool,
    /// Called with every sent datagram; may queue an answer.
    pub responder: Option<Responder>,
    pub timeouts: Vec<Option<Duration>>,
}

#[derive(Clone, Default)]
pub struct MockSocket {
    pub mailbox: Rc<RefCell<Mailbox>>,
}

impl MockSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_inbound(&self, datagram: Result<Vec<u8>, Error>) {
        self.mailbox.borrow_mut().inbound.push_back(datagram);
    }

    pub fn respond_with(
        &self,
        responder: impl FnMut(&[u8]) -> Option<Result<Vec<u8>, Error>> + 'static,
    ) {
        self.mailbox.borrow_mut().responder = Some(Box::new(responder));
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.mailbox.borrow().sent.clone()
    }
}

impl Datagram for MockSocket {
    fn send(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let mut mailbox = self.mailbox.borrow_mut();
        mailbox.sent.push(buf.to_vec());
        if let Some(responder) = mailbox.responder.as_mut() {
            if let Some(answer) = responder(buf) {
                mailbox.inbound.push_back(answer);
            }
        }
        Ok(buf.len())
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, Error> {
        let mut mailbox = self.mailbox.borrow_mut();
        mailbox.timeouts.push(timeout);
        match mailbox.inbound.pop_front() {
            Some(Ok(datagram)) => {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                Ok(len)
            }
            Some(Err(e)) => Err(e),
            None if timeout.is_some() => Err(Error::Timeout),
            None => Err(Error::ConnectionClosed),
        }
    }

    fn close(self) -> Result<(), Error> {
        self.mailbox.borrow_mut().closed = true;
        Ok(())
    }
}

/// What a socket was opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub remote: SocketAddrV4,
    pub hostname: Option<String>,
    pub sec_tags: Vec<SecTag>,
}

fn opened(remote: SocketAddrV4, security: Option<&SecureSocketOptions<'_>>) -> Opened {
    Opened {
        remote,
        hostname: security.and_then(|s| s.hostname).map(str::to_owned),
        sec_tags: security.map(|s| s.sec_tags.to_vec()).unwrap_or_default(),
    }
}

/// Resolver, stream and datagram stack in one.
#[derive(Default)]
pub struct MockStack {
    pub connections: VecDeque<MockConnection>,
    pub sockets: VecDeque<MockSocket>,
    pub opened: Vec<Opened>,
    pub resolved: Vec<String>,
    pub unresolvable: bool,
}

impl Resolve for MockStack {
    fn resolve(&mut self, hostname: &str, port: u16) -> Result<SocketAddrV4, Error> {
        if self.unresolvable {
            return Err(Error::ResolveFailed);
        }
        self.resolved.push(hostname.to_owned());
        Ok(SocketAddrV4::new(SERVER_IP, port))
    }
}

impl Connect for MockStack {
    type Connection = MockConnection;

    fn connect(
        &mut self,
        remote: SocketAddrV4,
        security: Option<&SecureSocketOptions<'_>>,
    ) -> Result<Self::Connection, Error> {
        self.opened.push(opened(remote, security));
        self.connections.pop_front().ok_or(Error::ConnectionRefused)
    }
}

impl DatagramStack for MockStack {
    type Socket = MockSocket;

    fn open(
        &mut self,
        remote: SocketAddrV4,
        security: Option<&SecureSocketOptions<'_>>,
    ) -> Result<Self::Socket, Error> {
        self.opened.push(opened(remote, security));
        self.sockets.pop_front().ok_or(Error::SocketOption)
    }
}

/// Link controller that reports scripted events on connect.
#[derive(Debug, Default)]
pub struct MockLink {
    pub events: Vec<LteEvent>,
    pub fail_init: bool,
    pub fail_psm: bool,
    pub fail_connect: bool,
    pub psm_requested: bool,
    pub edrx_requested: bool,
    pub modes: Vec<FunctionalMode>,
}

impl LinkController for MockLink {
    type Error = i32;

    fn init(&mut self) -> Result<(), i32> {
        if self.fail_init { Err(-5) } else { Ok(()) }
    }

    fn psm_req(&mut self, enable: bool) -> Result<(), i32> {
        if self.fail_psm {
            return Err(-22);
        }
        self.psm_requested = enable;
        Ok(())
    }

    fn edrx_req(&mut self, enable: bool) -> Result<(), i32> {
        self.edrx_requested = enable;
        Ok(())
    }

    fn connect_async(&mut self, handler: &'static dyn LteHandler) -> Result<(), i32> {
        if self.fail_connect {
            return Err(-116);
        }
        for event in &self.events {
            handler.on_event(event);
        }
        Ok(())
    }

    fn func_mode_set(&mut self, mode: FunctionalMode) -> Result<(), i32> {
        self.modes.push(mode);
        Ok(())
    }
}

pub fn registered_home() -> Vec<LteEvent> {
    vec![LteEvent::NwRegStatus(celliot::modem::RegistrationStatus::RegisteredHome)]
}

/// GNSS receiver that reports scripted events on start.
#[derive(Default)]
pub struct MockGnss {
    pub events: Vec<GnssEvent>,
    pub handler: Option<&'static dyn GnssHandler>,
    pub fix_interval: Option<u16>,
    pub fix_retry: Option<u16>,
    pub started: bool,
    pub fail_start: bool,
}

impl Gnss for MockGnss {
    type Error = i32;

    fn set_event_handler(&mut self, handler: &'static dyn GnssHandler) -> Result<(), i32> {
        self.handler = Some(handler);
        Ok(())
    }

    fn fix_interval_set(&mut self, seconds: u16) -> Result<(), i32> {
        self.fix_interval = Some(seconds);
        Ok(())
    }

    fn fix_retry_set(&mut self, seconds: u16) -> Result<(), i32> {
        self.fix_retry = Some(seconds);
        Ok(())
    }

    fn start(&mut self) -> Result<(), i32> {
        if self.fail_start {
            return Err(-1);
        }
        self.started = true;
        if let Some(handler) = self.handler {
            for event in &self.events {
                handler.on_event(event);
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), i32> {
        self.started = false;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MockLeds {
    pub on: [bool; 3],
}

impl MockLeds {
    pub fn is_on(&self, led: Led) -> bool {
        self.on[led as usize]
    }
}

impl Leds for MockLeds {
    type Error = ();

    fn set_on(&mut self, led: Led) -> Result<(), ()> {
        self.on[led as usize] = true;
        Ok(())
    }

    fn set_off(&mut self, led: Led) -> Result<(), ()> {
        self.on[led as usize] = false;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockButtons {
    pub pending: VecDeque<ButtonEvent>,
}

impl MockButtons {
    pub fn pressing(events: impl IntoIterator<Item = ButtonEvent>) -> Self {
        Self {
            pending: events.into_iter().collect(),
        }
    }
}

impl Buttons for MockButtons {
    fn poll_event(&mut self) -> Option<ButtonEvent> {
        self.pending.pop_front()
    }
}

#[derive(Debug, Default)]
pub struct MockDelay {
    pub slept: Vec<Duration>,
}

impl Delay for MockDelay {
    fn sleep(&mut self, duration: Duration) {
        self.slept.push(duration);
    }
}

/// Simulated uptime.
#[derive(Debug, Default)]
pub struct SimClock {
    now: AtomicU64,
}

impl SimClock {
    pub fn at(ms: u64) -> Self {
        Self {
            now: AtomicU64::new(ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for SimClock {
    fn uptime_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Credential storage in memory.
#[derive(Debug, Default)]
pub struct MockStore {
    pub credentials: HashMap<(u32, CredentialType), Vec<u8>>,
    pub writes: usize,
    pub broken: bool,
}

impl CredentialStore for MockStore {
    fn exists(&mut self, tag: SecTag, kind: CredentialType) -> Result<bool, SecurityError> {
        if self.broken {
            return Err(SecurityError::Store);
        }
        Ok(self.credentials.contains_key(&(tag.0, kind)))
    }

    fn matches(
        &mut self,
        tag: SecTag,
        kind: CredentialType,
        data: &[u8],
    ) -> Result<bool, SecurityError> {
        Ok(self.credentials.get(&(tag.0, kind)).is_some_and(|stored| stored == data))
    }

    fn write(
        &mut self,
        tag: SecTag,
        kind: CredentialType,
        data: &[u8],
    ) -> Result<(), SecurityError> {
        if self.broken {
            return Err(SecurityError::Store);
        }
        self.writes += 1;
        self.credentials.insert((tag.0, kind), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, tag: SecTag, kind: CredentialType) -> Result<(), SecurityError> {
        self.credentials.remove(&(tag.0, kind));
        Ok(())
    }
}

/// AT channel answering each command with a scripted reply.
#[derive(Debug, Default)]
pub struct MockAt {
    pub replies: HashMap<String, Vec<Vec<u8>>>,
    pub sent: Vec<String>,
    pub pending: VecDeque<Vec<u8>>,
    pub fail_send: bool,
}

impl MockAt {
    pub fn reply(self, command: &str, chunks: &[&str]) -> Self {
        let chunks: Vec<&[u8]> = chunks.iter().map(|c| c.as_bytes()).collect();
        self.reply_bytes(command, &chunks)
    }

    /// Reply with raw chunks, which need not split on character boundaries.
    pub fn reply_bytes(mut self, command: &str, chunks: &[&[u8]]) -> Self {
        self.replies
            .insert(command.to_owned(), chunks.iter().map(|c| c.to_vec()).collect());
        self
    }
}

impl AtTransport for MockAt {
    type Error = i32;

    fn send(&mut self, command: &str) -> Result<(), i32> {
        if self.fail_send {
            return Err(-9);
        }
        self.sent.push(command.to_owned());
        let reply = self
            .replies
            .get(command)
            .cloned()
            .unwrap_or_else(|| vec![b"ERROR\r\n".to_vec()]);
        self.pending.extend(reply);
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, i32> {
        match self.pending.pop_front() {
            Some(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(Some(chunk.len()))
            }
            None => Err(-11),
        }
    }
}

/// Leak a value to get the `'static` reference handlers need.
pub fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}
