//! Formatting into fixed-capacity strings without overflow.
//!
//! `heapless::String` refuses a write that does not fit, and `core::fmt`
//! aborts the whole format on the first refusal. The writer here instead keeps
//! every character that fits and drops the rest, which is the behavior of
//! `snprintf` into a fixed array.

use core::fmt::{self, Write};

use heapless::String;

/// A `core::fmt::Write` sink that truncates at its capacity.
#[derive(Debug, Default)]
pub struct Truncating<const N: usize> {
    text: String<N>,
    truncated: bool,
}

impl<const N: usize> Truncating<N> {
    /// An empty sink.
    pub fn new() -> Self {
        Self {
            text: String::new(),
            truncated: false,
        }
    }

    /// Whether any output was dropped.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// The text written so far.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Take the text out.
    pub fn into_string(self) -> String<N> {
        self.text
    }
}

impl<const N: usize> Write for Truncating<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.text.push(c).is_err() {
                self.truncated = true;
                break;
            }
        }
        // Never report an error: that would abort the remaining arguments.
        Ok(())
    }
}

/// Format `args` into at most `N` bytes, truncating on a character boundary.
pub fn format_truncated<const N: usize>(args: fmt::Arguments<'_>) -> String<N> {
    let mut sink = Truncating::<N>::new();
    // `Truncating` never fails, and a failing `Display` impl only shortens the text.
    let _ = sink.write_fmt(args);
    sink.into_string()
}

/// Copy the longest valid UTF-8 prefix of `bytes` that fits in `N` bytes.
pub fn printable<const N: usize>(bytes: &[u8]) -> String<N> {
    let valid = match core::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            // `valid_up_to` marks a char boundary, so this cannot fail.
            core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default()
        }
    };
    let mut sink = Truncating::<N>::new();
    let _ = sink.write_str(valid);
    sink.into_string()
}
