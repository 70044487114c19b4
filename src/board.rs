//! LEDs and buttons of the development kits.
//!
//! The button library reports two bit masks per interrupt: the current state
//! of every button and which of them changed. The samples act on presses only,
//! so [`ButtonEvent::pressed`] checks both masks.

/// One of the board's LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    /// LED 1
    Led1,
    /// LED 2
    Led2,
    /// LED 3
    Led3,
}

impl Led {
    /// All LEDs in board order.
    pub const ALL: [Led; 3] = [Led::Led1, Led::Led2, Led::Led3];
}

/// LED driver.
pub trait Leds {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Switch `led` on.
    fn set_on(&mut self, led: Led) -> Result<(), Self::Error>;
    /// Switch `led` off.
    fn set_off(&mut self, led: Led) -> Result<(), Self::Error>;

    /// Switch `led` on or off.
    fn set(&mut self, led: Led, on: bool) -> Result<(), Self::Error> {
        if on { self.set_on(led) } else { self.set_off(led) }
    }

    /// Switch every LED off.
    fn all_off(&mut self) -> Result<(), Self::Error> {
        Led::ALL.iter().try_for_each(|&led| self.set_off(led))
    }
}

/// One of the board's buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Button 1
    Button1,
    /// Button 2
    Button2,
}

impl Button {
    /// Bit of this button in state and change masks.
    pub const fn mask(self) -> u32 {
        match self {
            Button::Button1 => 1 << 0,
            Button::Button2 => 1 << 1,
        }
    }
}

/// A button interrupt: the state of all buttons and which ones changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonEvent {
    /// Pressed buttons.
    pub state: u32,
    /// Buttons whose state changed.
    pub changed: u32,
}

impl ButtonEvent {
    /// An event for a single press of `button`.
    pub const fn press(button: Button) -> Self {
        Self {
            state: button.mask(),
            changed: button.mask(),
        }
    }

    /// Whether this event is `button` going down.
    pub fn pressed(&self, button: Button) -> bool {
        self.changed & button.mask() != 0 && self.state & button.mask() != 0
    }
}

/// Source of button events.
pub trait Buttons {
    /// Next pending event, without blocking.
    fn poll_event(&mut self) -> Option<ButtonEvent>;
}

/// Which board the application runs on. It decides the button mapping of the
/// CoAP sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardKind {
    /// nRF9160 DK: two buttons.
    #[default]
    Dk,
    /// Thingy:91: one button.
    Thingy91,
}

/// A CoAP request chosen by a button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoapAction {
    /// Send a GET.
    Get,
    /// Send a PUT.
    Put,
}

/// Maps button presses to CoAP requests.
///
/// On the DK, button 1 sends GET and button 2 sends PUT. The Thingy:91 has
/// one button, which alternates between GET and PUT starting with GET.
///
/// ```rust
/// use celliot::board::{BoardKind, Button, ButtonEvent, CoapAction, CoapButtons};
///
/// let mut thingy = CoapButtons::new(BoardKind::Thingy91);
/// let press = ButtonEvent::press(Button::Button1);
/// assert_eq!(thingy.action(press), Some(CoapAction::Get));
/// assert_eq!(thingy.action(press), Some(CoapAction::Put));
/// ```
#[derive(Debug, Clone)]
pub struct CoapButtons {
    board: BoardKind,
    send_put: bool,
}

impl CoapButtons {
    /// Mapping for `board`.
    pub fn new(board: BoardKind) -> Self {
        Self {
            board,
            send_put: false,
        }
    }

    /// The request to send for `event`, if any.
    pub fn action(&mut self, event: ButtonEvent) -> Option<CoapAction> {
        match self.board {
            BoardKind::Dk => {
                if event.pressed(Button::Button1) {
                    Some(CoapAction::Get)
                } else if event.pressed(Button::Button2) {
                    Some(CoapAction::Put)
                } else {
                    None
                }
            }
            BoardKind::Thingy91 => {
                if !event.pressed(Button::Button1) {
                    return None;
                }
                let action = if self.send_put {
                    CoapAction::Put
                } else {
                    CoapAction::Get
                };
                self.send_put = !self.send_put;
                Some(action)
            }
        }
    }
}

/// State of the tracker, shown on one LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    /// Registered, PSM not yet granted.
    ConnectedNoPsm,
    /// GNSS running without a fix.
    Searching,
    /// A valid fix was obtained.
    Fixed,
}

impl TrackerStatus {
    /// The LED that shows this status.
    pub fn led(self) -> Led {
        match self {
            TrackerStatus::ConnectedNoPsm => Led::Led1,
            TrackerStatus::Searching => Led::Led2,
            TrackerStatus::Fixed => Led::Led3,
        }
    }
}

/// Button 1 alternates between lighting the status LED and switching all LEDs
/// off. The first press lights the LED.
#[derive(Debug, Clone)]
pub struct StatusDisplay {
    show: bool,
}

impl StatusDisplay {
    /// The next press shows the status.
    pub fn new() -> Self {
        Self { show: true }
    }

    /// Apply `event` to `leds` given the current `status`.
    pub fn handle<L: Leds>(
        &mut self,
        event: ButtonEvent,
        status: TrackerStatus,
        leds: &mut L,
    ) -> Result<(), L::Error> {
        if !event.pressed(Button::Button1) {
            return Ok(());
        }
        if self.show {
            leds.set_on(status.led())?;
        } else {
            leds.all_off()?;
        }
        self.show = !self.show;
        Ok(())
    }
}

impl Default for StatusDisplay {
    fn default() -> Self {
        Self::new()
    }
}
