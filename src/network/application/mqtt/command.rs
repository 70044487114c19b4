//! LED control commands received over MQTT.

use crate::board::Led;

/// A command to switch one of the first two LEDs.
///
/// A payload matches a command when it starts with the command text, so
/// trailing bytes such as a newline are ignored.
///
/// ```rust
/// use celliot::network::application::mqtt::LedCommand;
///
/// assert_eq!(LedCommand::parse(b"LED1ON"), Some(LedCommand::Led1On));
/// assert_eq!(LedCommand::parse(b"LED2OFF\n"), Some(LedCommand::Led2Off));
/// assert_eq!(LedCommand::parse(b"led1on"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedCommand {
    /// `LED1ON`
    Led1On,
    /// `LED1OFF`
    Led1Off,
    /// `LED2ON`
    Led2On,
    /// `LED2OFF`
    Led2Off,
}

impl LedCommand {
    const ALL: [(&'static [u8], LedCommand); 4] = [
        (b"LED1ON", LedCommand::Led1On),
        (b"LED1OFF", LedCommand::Led1Off),
        (b"LED2ON", LedCommand::Led2On),
        (b"LED2OFF", LedCommand::Led2Off),
    ];

    /// Match the start of `payload` against the known commands.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(text, _)| payload.starts_with(text))
            .map(|&(_, command)| command)
    }

    /// The LED the command addresses.
    pub fn led(self) -> Led {
        match self {
            LedCommand::Led1On | LedCommand::Led1Off => Led::Led1,
            LedCommand::Led2On | LedCommand::Led2Off => Led::Led2,
        }
    }

    /// Whether the command switches the LED on.
    pub fn turns_on(self) -> bool {
        matches!(self, LedCommand::Led1On | LedCommand::Led2On)
    }
}
