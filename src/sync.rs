//! Synchronization between event handlers and the main flow.
//!
//! The modem library delivers LTE and GNSS events from its own context. The
//! application hands information over with two primitives:
//!
//! - [`Signal`]: a binary semaphore. Giving it twice before a take leaves it
//!   given once; taking blocks until it is given.
//! - [`Latest`]: a cell holding the most recent value of a `Copy` type, read
//!   and written inside a critical section so a reader never observes a torn
//!   value.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

/// A binary semaphore with a maximum count of one.
#[derive(Debug)]
pub struct Signal {
    given: AtomicBool,
}

impl Signal {
    /// A signal that has not been given.
    pub const fn new() -> Self {
        Self {
            given: AtomicBool::new(false),
        }
    }

    /// Give the signal. Extra gives before a take are absorbed.
    pub fn give(&self) {
        self.given.store(true, Ordering::Release);
    }

    /// Consume the signal if it is given.
    pub fn try_take(&self) -> bool {
        self.given
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Block until the signal is given, then consume it.
    pub fn take(&self) {
        while !self.try_take() {
            #[cfg(feature = "std")]
            std::thread::yield_now();
            #[cfg(not(feature = "std"))]
            core::hint::spin_loop();
        }
    }

    /// Whether the signal is currently given, without consuming it.
    pub fn is_given(&self) -> bool {
        self.given.load(Ordering::Acquire)
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

/// The most recent value published by an event handler.
#[derive(Debug)]
pub struct Latest<T: Copy> {
    value: Mutex<Cell<Option<T>>>,
}

impl<T: Copy> Latest<T> {
    /// An empty cell.
    pub const fn new() -> Self {
        Self {
            value: Mutex::new(Cell::new(None)),
        }
    }

    /// Replace the stored value.
    pub fn publish(&self, value: T) {
        critical_section::with(|cs| self.value.borrow(cs).set(Some(value)));
    }

    /// Copy of the stored value, if any.
    pub fn get(&self) -> Option<T> {
        critical_section::with(|cs| self.value.borrow(cs).get())
    }

    /// Remove and return the stored value.
    pub fn take(&self) -> Option<T> {
        critical_section::with(|cs| self.value.borrow(cs).take())
    }
}

impl<T: Copy> Default for Latest<T> {
    fn default() -> Self {
        Self::new()
    }
}
