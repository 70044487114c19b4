//! System utilities: time and bounded formatting.
//!
//! The samples sleep between attempts (the MQTT reconnect delay, the tracker's
//! send period), measure uptime (time to first fix, MQTT keepalive) and format
//! text into fixed buffers. Time is abstracted behind [`Clock`] and [`Delay`]
//! so the same loops run on the device, on a host with `std`, and in tests
//! with a simulated clock.

use core::time::Duration;

/// Bounded text formatting into fixed-capacity buffers.
pub mod fmt;

/// Monotonic uptime source.
pub trait Clock {
    /// Milliseconds since boot.
    fn uptime_ms(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn uptime_ms(&self) -> u64 {
        (**self).uptime_ms()
    }
}

/// Blocking sleep.
pub trait Delay {
    /// Suspend the calling thread for `duration`.
    fn sleep(&mut self, duration: Duration);
}

impl<T: Delay + ?Sized> Delay for &mut T {
    fn sleep(&mut self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// [`Clock`] and [`Delay`] backed by `std::time` and `std::thread`.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    boot: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    /// Start counting uptime now.
    pub fn new() -> Self {
        Self {
            boot: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn uptime_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }
}

#[cfg(feature = "std")]
impl Delay for StdClock {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
