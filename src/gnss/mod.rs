//! GNSS position fixes.
//!
//! The GNSS receiver shares the radio with LTE and runs in periodic mode: it
//! wakes every fix interval, searches for at most the fix retry time, reports
//! position/velocity/time (PVT) frames while searching and sleeps again. The
//! receiver delivers [`GnssEvent`]s to a [`GnssHandler`] from its own
//! context; [`FixTracker`] is the handler the samples use.

use core::sync::atomic::{AtomicU8, Ordering};

use log::{error, info, warn};

use crate::modem::{FunctionalMode, LinkController};
use crate::sync::{Latest, Signal};
use crate::system::Clock;

mod format;

pub use format::{format_position, format_tracker_payload, POSITION_LEN, TRACKER_PAYLOAD_LEN};

/// Errors raised while configuring the receiver. Each names the step that
/// failed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The modem could not be put in a mode with GNSS active.
    FunctionalMode,
    /// The event handler was rejected.
    EventHandler,
    /// The fix interval was rejected.
    FixInterval,
    /// The fix retry time was rejected.
    FixRetry,
    /// The receiver did not start.
    Start,
    /// The receiver did not stop.
    Stop,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Error::FunctionalMode => "Failed to activate GNSS functional mode",
            Error::EventHandler => "Failed to set GNSS event handler",
            Error::FixInterval => "Failed to set GNSS fix interval",
            Error::FixRetry => "Failed to set GNSS fix retry",
            Error::Start => "Failed to start GNSS",
            Error::Stop => "Failed to stop GNSS",
        };
        f.write_str(text)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::FunctionalMode => defmt::write!(f, "FunctionalMode"),
            Error::EventHandler => defmt::write!(f, "EventHandler"),
            Error::FixInterval => defmt::write!(f, "FixInterval"),
            Error::FixRetry => defmt::write!(f, "FixRetry"),
            Error::Start => defmt::write!(f, "Start"),
            Error::Stop => defmt::write!(f, "Stop"),
        }
    }
}

/// Status flags of a PVT frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PvtFlags(u8);

impl PvtFlags {
    /// The position is a valid fix.
    pub const FIX_VALID: PvtFlags = PvtFlags(1 << 0);
    /// The leap second is known.
    pub const LEAP_SECOND_VALID: PvtFlags = PvtFlags(1 << 1);
    /// The receiver sleeps between PVT notifications.
    pub const SLEEP_BETWEEN_PVT: PvtFlags = PvtFlags(1 << 2);
    /// The notification deadline was missed because LTE held the radio.
    pub const DEADLINE_MISSED: PvtFlags = PvtFlags(1 << 3);
    /// LTE left too little time for GNSS.
    pub const NOT_ENOUGH_WINDOW_TIME: PvtFlags = PvtFlags(1 << 4);

    /// Flags from their raw bits. Unknown bits are kept.
    pub const fn from_bits(bits: u8) -> Self {
        PvtFlags(bits)
    }

    /// Raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag in `other` is set.
    pub const fn contains(self, other: PvtFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for PvtFlags {
    type Output = PvtFlags;

    fn bitor(self, rhs: Self) -> Self {
        PvtFlags(self.0 | rhs.0)
    }
}

/// UTC date and time of a PVT frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Datetime {
    /// Four-digit year.
    pub year: u16,
    /// Month, 1..=12.
    pub month: u8,
    /// Day of month, 1..=31.
    pub day: u8,
    /// Hour, 0..=23.
    pub hour: u8,
    /// Minute, 0..=59.
    pub minute: u8,
    /// Second, 0..=59.
    pub seconds: u8,
    /// Millisecond, 0..=999.
    pub ms: u16,
}

/// One position/velocity/time report.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PvtFrame {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude above WGS-84 ellipsoid in meters.
    pub altitude: f32,
    /// Horizontal accuracy in meters.
    pub accuracy: f32,
    /// Horizontal speed in meters per second.
    pub speed: f32,
    /// Heading of movement in degrees.
    pub heading: f32,
    /// UTC time of the report.
    pub datetime: Datetime,
    /// Status flags.
    pub flags: PvtFlags,
    /// Satellites with a signal.
    pub satellites: u8,
}

impl PvtFrame {
    /// Whether the frame carries a valid fix.
    pub fn has_fix(&self) -> bool {
        self.flags.contains(PvtFlags::FIX_VALID)
    }
}

/// An event reported by the GNSS receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GnssEvent {
    /// A PVT frame is available.
    Pvt(PvtFrame),
    /// A valid fix is available.
    Fix,
    /// An NMEA sentence is available.
    Nmea,
    /// The receiver needs assistance data.
    AgpsRequest,
    /// LTE activity blocks the receiver.
    Blocked,
    /// The receiver is no longer blocked.
    Unblocked,
    /// The receiver woke up for the next periodic fix.
    PeriodicWakeup,
    /// The receiver went to sleep after the retry time ran out.
    SleepAfterTimeout,
    /// The receiver went to sleep after a fix.
    SleepAfterFix,
}

/// Receives [`GnssEvent`]s from the receiver's context.
pub trait GnssHandler: Sync {
    /// Called for every event. Must not block.
    fn on_event(&self, event: &GnssEvent);
}

/// The GNSS receiver.
pub trait Gnss {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Deliver events to `handler` from now on.
    fn set_event_handler(&mut self, handler: &'static dyn GnssHandler) -> Result<(), Self::Error>;
    /// Seconds between periodic fixes.
    fn fix_interval_set(&mut self, seconds: u16) -> Result<(), Self::Error>;
    /// Seconds to search for a fix before giving up until the next interval.
    fn fix_retry_set(&mut self, seconds: u16) -> Result<(), Self::Error>;
    /// Start the receiver.
    fn start(&mut self) -> Result<(), Self::Error>;
    /// Stop the receiver.
    fn stop(&mut self) -> Result<(), Self::Error>;
}

/// Periodic fix timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct GnssSettings {
    /// Seconds between fixes.
    pub fix_interval: u16,
    /// Seconds to search before giving up.
    pub fix_retry: u16,
}

impl Default for GnssSettings {
    fn default() -> Self {
        Self {
            fix_interval: 120,
            fix_retry: 120,
        }
    }
}

/// Search state of the receiver as seen through PVT frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixStatus {
    /// No PVT frame yet.
    Idle = 0,
    /// Searching, no fix obtained yet.
    Searching = 1,
    /// At least one fix was obtained.
    Fixed = 2,
}

impl FixStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => FixStatus::Searching,
            2 => FixStatus::Fixed,
            _ => FixStatus::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Timing {
    start_ms: Option<u64>,
    ttff_ms: Option<u64>,
}

/// Keeps the last PVT frame and the current fix, and measures the time to
/// first fix.
///
/// Every PVT frame replaces the last frame. A frame with a valid fix also
/// replaces the current fix and gives the fix signal. Once a fix was seen the
/// status stays [`FixStatus::Fixed`].
#[derive(Debug)]
pub struct FixTracker<K: Clock> {
    clock: K,
    last: Latest<PvtFrame>,
    current: Latest<PvtFrame>,
    timing: Latest<Timing>,
    status: AtomicU8,
    fix: Signal,
}

impl<K: Clock> FixTracker<K> {
    /// A tracker timing fixes with `clock`.
    pub fn new(clock: K) -> Self {
        Self {
            clock,
            last: Latest::new(),
            current: Latest::new(),
            timing: Latest::new(),
            status: AtomicU8::new(FixStatus::Idle as u8),
            fix: Signal::new(),
        }
    }

    /// Record that the receiver was started now.
    pub fn mark_started(&self) {
        let mut timing = self.timing.get().unwrap_or_default();
        timing.start_ms = Some(self.clock.uptime_ms());
        self.timing.publish(timing);
    }

    /// The most recent PVT frame.
    pub fn last(&self) -> Option<PvtFrame> {
        self.last.get()
    }

    /// The most recent frame with a valid fix.
    pub fn current_fix(&self) -> Option<PvtFrame> {
        self.current.get()
    }

    /// Given for every valid fix.
    pub fn fix_signal(&self) -> &Signal {
        &self.fix
    }

    /// Block until a fix arrives and return it.
    pub fn wait_fix(&self) -> Option<PvtFrame> {
        self.fix.take();
        self.current_fix()
    }

    /// Current search state.
    pub fn status(&self) -> FixStatus {
        FixStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Milliseconds from start to the first fix, once there was one.
    pub fn time_to_first_fix_ms(&self) -> Option<u64> {
        self.timing.get().and_then(|t| t.ttff_ms)
    }

    fn handle_pvt(&self, frame: &PvtFrame) {
        info!("Searching. Current satellites: {}", frame.satellites);
        self.last.publish(*frame);

        if frame.has_fix() {
            self.status.store(FixStatus::Fixed as u8, Ordering::Release);
            self.current.publish(*frame);
            print_fix_data(frame);
            self.record_first_fix();
            self.fix.give();
            return;
        }

        // Searching, unless a fix was already seen.
        let _ = self.status.compare_exchange(
            FixStatus::Idle as u8,
            FixStatus::Searching as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if frame.flags.contains(PvtFlags::DEADLINE_MISSED) {
            info!("GNSS blocked by LTE activity");
        } else if frame.flags.contains(PvtFlags::NOT_ENOUGH_WINDOW_TIME) {
            info!("Insufficient GNSS time windows");
        }
    }

    fn record_first_fix(&self) {
        let mut timing = self.timing.get().unwrap_or_default();
        if timing.ttff_ms.is_some() {
            return;
        }
        let now = self.clock.uptime_ms();
        let ttff = now.saturating_sub(timing.start_ms.unwrap_or(now));
        timing.ttff_ms = Some(ttff);
        self.timing.publish(timing);
        info!("Time to first fix: {} s", ttff / 1000);
    }
}

impl<K: Clock + Sync> GnssHandler for FixTracker<K> {
    fn on_event(&self, event: &GnssEvent) {
        match event {
            GnssEvent::Pvt(frame) => self.handle_pvt(frame),
            GnssEvent::Blocked => info!("GNSS is blocked by LTE event"),
            GnssEvent::Unblocked => info!("GNSS is unblocked"),
            GnssEvent::PeriodicWakeup => info!("GNSS has woken up"),
            GnssEvent::SleepAfterTimeout => info!("GNSS enter sleep after timeout"),
            GnssEvent::SleepAfterFix => info!("GNSS enter sleep after fix"),
            GnssEvent::AgpsRequest => warn!("GNSS requested assistance data"),
            GnssEvent::Fix | GnssEvent::Nmea => {}
        }
    }
}

fn print_fix_data(frame: &PvtFrame) {
    info!("Latitude:       {:.6}", frame.latitude);
    info!("Longitude:      {:.6}", frame.longitude);
    info!("Altitude:       {:.1} m", frame.altitude);
    info!(
        "Time (UTC):     {:02}:{:02}:{:02}.{:03}",
        frame.datetime.hour, frame.datetime.minute, frame.datetime.seconds, frame.datetime.ms
    );
}

/// Activate GNSS, install `handler`, set the periodic timing and start the
/// receiver. The first failing step aborts with its error.
pub fn gnss_init_and_start<L, G, K>(
    link: &mut L,
    gnss: &mut G,
    tracker: &'static FixTracker<K>,
    settings: &GnssSettings,
) -> Result<(), Error>
where
    L: LinkController,
    G: Gnss,
    K: Clock + Sync,
{
    link.func_mode_set(FunctionalMode::Normal)
        .map_err(|_| Error::FunctionalMode)
        .inspect_err(|e| error!("{}", e))?;
    gnss.set_event_handler(tracker)
        .map_err(|_| Error::EventHandler)
        .inspect_err(|e| error!("{}", e))?;
    gnss.fix_interval_set(settings.fix_interval)
        .map_err(|_| Error::FixInterval)
        .inspect_err(|e| error!("{}", e))?;
    gnss.fix_retry_set(settings.fix_retry)
        .map_err(|_| Error::FixRetry)
        .inspect_err(|e| error!("{}", e))?;

    info!("Starting GNSS");
    gnss.start()
        .map_err(|_| Error::Start)
        .inspect_err(|e| error!("{}", e))?;
    tracker.mark_started();
    Ok(())
}
