//! LTE link control.
//!
//! Attaching to the network is asynchronous. The application asks the link
//! controller to connect and hands it an [`LteHandler`]; the modem library
//! calls the handler from its own context with [`LteEvent`]s as registration,
//! power saving and cell parameters change. [`LteMonitor`] is the handler the
//! samples use: it turns the interesting events into [`Signal`]s the main flow
//! blocks on.

use core::sync::atomic::{AtomicU8, Ordering};

use log::{error, info, warn};

use crate::sync::Signal;

/// AT command exchange and response parsing
pub mod at;

/// Errors raised while bringing up the modem and the LTE link.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The modem library failed to initialize.
    Init,
    /// The link controller rejected the connect request.
    Link,
    /// The functional mode could not be changed.
    FunctionalMode,
    /// The AT channel failed.
    Transport,
    /// The modem answered `ERROR`.
    AtError,
    /// The modem answered `+CME ERROR: <n>`.
    CmeError(u16),
    /// The modem answered `+CMS ERROR: <n>`.
    CmsError(u16),
    /// The modem output could not be understood.
    InvalidResponse,
    /// A result did not fit in its fixed-size buffer.
    MessageTooLarge,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Init => f.write_str("modem library initialization failed"),
            Error::Link => f.write_str("LTE connect request failed"),
            Error::FunctionalMode => f.write_str("functional mode change failed"),
            Error::Transport => f.write_str("AT channel failed"),
            Error::AtError => f.write_str("ERROR"),
            Error::CmeError(n) => write!(f, "+CME ERROR: {}", n),
            Error::CmsError(n) => write!(f, "+CMS ERROR: {}", n),
            Error::InvalidResponse => f.write_str("invalid modem response"),
            Error::MessageTooLarge => f.write_str("result too large"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Init => defmt::write!(f, "Init"),
            Error::Link => defmt::write!(f, "Link"),
            Error::FunctionalMode => defmt::write!(f, "FunctionalMode"),
            Error::Transport => defmt::write!(f, "Transport"),
            Error::AtError => defmt::write!(f, "AtError"),
            Error::CmeError(n) => defmt::write!(f, "CmeError({})", n),
            Error::CmsError(n) => defmt::write!(f, "CmsError({})", n),
            Error::InvalidResponse => defmt::write!(f, "InvalidResponse"),
            Error::MessageTooLarge => defmt::write!(f, "MessageTooLarge"),
        }
    }
}

/// Network registration status, as the `<stat>` field of `+CEREG`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RegistrationStatus {
    /// Not registered and not searching.
    NotRegistered = 0,
    /// Registered on the home network.
    RegisteredHome = 1,
    /// Searching for an operator.
    Searching = 2,
    /// Registration denied.
    RegistrationDenied = 3,
    /// Unknown, for example out of coverage.
    Unknown = 4,
    /// Registered, roaming.
    RegisteredRoaming = 5,
    /// UICC failure.
    UiccFail = 90,
}

impl RegistrationStatus {
    /// Decode a `<stat>` value.
    pub fn from_stat(stat: u8) -> Option<Self> {
        match stat {
            0 => Some(Self::NotRegistered),
            1 => Some(Self::RegisteredHome),
            2 => Some(Self::Searching),
            3 => Some(Self::RegistrationDenied),
            4 => Some(Self::Unknown),
            5 => Some(Self::RegisteredRoaming),
            90 => Some(Self::UiccFail),
            _ => None,
        }
    }

    /// Registered on the home network or roaming.
    pub fn is_registered(self) -> bool {
        matches!(self, Self::RegisteredHome | Self::RegisteredRoaming)
    }
}

/// Radio resource control state.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RrcMode {
    /// No active radio connection.
    Idle,
    /// Radio connection active.
    Connected,
}

/// Modem functional mode, as set with `AT+CFUN`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FunctionalMode {
    /// Modem powered off.
    PowerOff = 0,
    /// LTE and GNSS active.
    Normal = 1,
    /// Flight mode.
    Offline = 4,
    /// Deactivate LTE, leave GNSS as is.
    DeactivateLte = 20,
    /// Activate LTE, leave GNSS as is.
    ActivateLte = 21,
    /// Deactivate GNSS, leave LTE as is.
    DeactivateGnss = 30,
    /// Activate GNSS, leave LTE as is.
    ActivateGnss = 31,
}

/// An event reported by the link controller.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum LteEvent {
    /// Registration status changed.
    NwRegStatus(RegistrationStatus),
    /// The network answered a PSM request.
    PsmUpdate {
        /// Periodic tracking area update interval in seconds.
        tau: i32,
        /// Active time in seconds; -1 when the network rejected PSM.
        active_time: i32,
    },
    /// The network answered an eDRX request.
    EdrxUpdate {
        /// eDRX cycle in seconds.
        edrx: f32,
        /// Paging time window in seconds.
        ptw: f32,
    },
    /// Radio resource control state changed.
    RrcUpdate(RrcMode),
    /// The serving cell changed.
    CellUpdate {
        /// E-UTRAN cell identifier.
        id: u32,
        /// Tracking area code.
        tac: u32,
    },
}

/// Receives [`LteEvent`]s from the link controller's context.
pub trait LteHandler: Sync {
    /// Called for every event. Must not block.
    fn on_event(&self, event: &LteEvent);
}

/// The modem's LTE link controller.
pub trait LinkController {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Initialize the modem library.
    fn init(&mut self) -> Result<(), Self::Error>;
    /// Request or release power saving mode.
    fn psm_req(&mut self, enable: bool) -> Result<(), Self::Error>;
    /// Request or release extended discontinuous reception.
    fn edrx_req(&mut self, enable: bool) -> Result<(), Self::Error>;
    /// Start attaching and deliver events to `handler` from now on.
    fn connect_async(&mut self, handler: &'static dyn LteHandler) -> Result<(), Self::Error>;
    /// Change the modem functional mode.
    fn func_mode_set(&mut self, mode: FunctionalMode) -> Result<(), Self::Error>;
}

/// Power saving features to request before attaching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
pub struct LinkSettings {
    /// Request power saving mode.
    #[serde(default)]
    pub psm: bool,
    /// Request extended discontinuous reception.
    #[serde(default)]
    pub edrx: bool,
}

const NO_STATUS: u8 = u8::MAX;

/// Turns LTE events into signals for the main flow.
///
/// - the registration signal is given on every home or roaming registration
/// - the active-time signal is given when the network grants PSM
#[derive(Debug)]
pub struct LteMonitor {
    registered: Signal,
    active_time: Signal,
    status: AtomicU8,
}

impl LteMonitor {
    /// A monitor that has seen no events.
    pub const fn new() -> Self {
        Self {
            registered: Signal::new(),
            active_time: Signal::new(),
            status: AtomicU8::new(NO_STATUS),
        }
    }

    /// Given on home or roaming registration.
    pub fn registered(&self) -> &Signal {
        &self.registered
    }

    /// Given when PSM is granted with an active time.
    pub fn active_time(&self) -> &Signal {
        &self.active_time
    }

    /// The most recent registration status reported.
    pub fn status(&self) -> Option<RegistrationStatus> {
        RegistrationStatus::from_stat(self.status.load(Ordering::Acquire))
    }

    /// Block until the device is registered.
    pub fn wait_registered(&self) {
        self.registered.take();
    }
}

impl Default for LteMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl LteHandler for LteMonitor {
    fn on_event(&self, event: &LteEvent) {
        match *event {
            LteEvent::NwRegStatus(status) => {
                self.status.store(status as u8, Ordering::Release);
                if !status.is_registered() {
                    return;
                }
                info!(
                    "Network registration status: {}",
                    if status == RegistrationStatus::RegisteredHome {
                        "Connected - home network"
                    } else {
                        "Connected - roaming"
                    }
                );
                self.registered.give();
            }
            LteEvent::PsmUpdate { tau, active_time } => {
                info!("PSM parameter update: TAU: {}, Active time: {}", tau, active_time);
                if active_time == -1 {
                    warn!("Network rejected PSM parameters. Failed to setup network...");
                } else {
                    self.active_time.give();
                }
            }
            LteEvent::EdrxUpdate { edrx, ptw } => {
                info!("eDRX parameter update: eDRX: {:.6}, PTW: {:.6}", edrx, ptw);
            }
            LteEvent::RrcUpdate(mode) => {
                info!(
                    "RRC mode: {}",
                    if mode == RrcMode::Connected { "Connected" } else { "Idle" }
                );
            }
            LteEvent::CellUpdate { id, tac } => {
                info!("LTE cell changed: Cell ID: {}, Tracking area: {}", id, tac);
            }
        }
    }
}

/// Initialize the modem, request the configured power saving features and
/// start attaching.
///
/// A failed PSM or eDRX request is logged and attaching continues. Failing to
/// initialize or to start the attach is fatal.
pub fn modem_configure<L: LinkController>(
    link: &mut L,
    handler: &'static dyn LteHandler,
    settings: &LinkSettings,
) -> Result<(), Error> {
    info!("Initializing modem library");
    link.init()
        .inspect_err(|e| error!("Failed to initialize the modem library, error: {:?}", e))
        .map_err(|_| Error::Init)?;

    if settings.psm {
        if let Err(e) = link.psm_req(true) {
            error!("lte_lc_psm_req, error: {:?}", e);
        }
    }
    if settings.edrx {
        if let Err(e) = link.edrx_req(true) {
            error!("lte_lc_edrx_req, error: {:?}", e);
        }
    }

    info!("Connecting to LTE network");
    link.connect_async(handler)
        .inspect_err(|e| error!("Modem could not be configured, error: {:?}", e))
        .map_err(|_| Error::Link)
}
