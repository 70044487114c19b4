//! Unconditional reconnection with a fixed delay.

use core::ops::ControlFlow;
use core::time::Duration;

use log::info;

use crate::system::Delay;

/// Retries a session forever, sleeping a fixed delay before every attempt
/// except the first.
///
/// There is no backoff and no attempt limit. The session decides when to stop
/// by returning [`ControlFlow::Break`].
///
/// ```rust
/// use core::ops::ControlFlow;
/// use core::time::Duration;
/// use celliot::network::application::mqtt::ReconnectLoop;
/// use celliot::system::Delay;
///
/// struct Slept(Duration);
/// impl Delay for Slept {
///     fn sleep(&mut self, d: Duration) { self.0 += d; }
/// }
///
/// let mut delay = Slept(Duration::ZERO);
/// let mut reconnect = ReconnectLoop::new(Duration::from_secs(10));
/// let attempts = reconnect.run(&mut delay, |attempt| {
///     if attempt < 3 { ControlFlow::Continue(()) } else { ControlFlow::Break(attempt) }
/// });
///
/// assert_eq!(attempts, 3);
/// assert_eq!(delay.0, Duration::from_secs(20));
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectLoop {
    delay: Duration,
    attempt: u32,
}

impl ReconnectLoop {
    /// A loop that waits `delay` between attempts.
    pub fn new(delay: Duration) -> Self {
        Self { delay, attempt: 0 }
    }

    /// Number of attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Start the next attempt, sleeping first unless it is the first one.
    /// Returns the attempt number, counting from 1.
    pub fn next_attempt<D: Delay>(&mut self, delay: &mut D) -> u32 {
        if self.attempt > 0 {
            info!("Reconnecting in {} seconds...", self.delay.as_secs());
            delay.sleep(self.delay);
        }
        self.attempt = self.attempt.saturating_add(1);
        self.attempt
    }

    /// Run `session` until it breaks, returning its break value.
    pub fn run<D, F, T>(&mut self, delay: &mut D, mut session: F) -> T
    where
        D: Delay,
        F: FnMut(u32) -> ControlFlow<T>,
    {
        loop {
            let attempt = self.next_attempt(delay);
            if let ControlFlow::Break(value) = session(attempt) {
                return value;
            }
        }
    }
}
