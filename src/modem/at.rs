//! AT commands.
//!
//! A command is written to the modem and its output is read back until a
//! final response: `OK`, `ERROR`, `+CME ERROR: <n>` or `+CMS ERROR: <n>`.
//! Every other line is an indication or an information response and is handed
//! to the caller, trimmed of whitespace.

use core::fmt::Write as _;

use heapless::{String, Vec};
use log::{debug, error};

use super::{Error, RegistrationStatus};

/// Length of an IMEI.
pub const IMEI_LEN: usize = 15;

/// Raw AT channel to the modem.
pub trait AtTransport {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write a command.
    fn send(&mut self, command: &str) -> Result<(), Self::Error>;
    /// Read modem output. `Ok(None)` means nothing is available yet.
    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error>;
}

/// How a line of modem output ends a command, if it does.
fn final_response(line: &str) -> Option<Result<(), Error>> {
    if line == "OK" {
        Some(Ok(()))
    } else if line == "ERROR" {
        Some(Err(Error::AtError))
    } else if let Some(code) = line.strip_prefix("+CME ERROR") {
        Some(Err(Error::CmeError(error_code(code))))
    } else if let Some(code) = line.strip_prefix("+CMS ERROR") {
        Some(Err(Error::CmsError(error_code(code))))
    } else {
        None
    }
}

fn error_code(rest: &str) -> u16 {
    rest.trim_start_matches(':').trim().parse().unwrap_or(0)
}

/// Size of one read from the AT channel.
const CHUNK_LEN: usize = 256;
/// Longest line of modem output.
const LINE_LEN: usize = 256;

/// Splits modem output into lines however `recv` chunks it.
///
/// A line is handed out only once its `\n` has arrived, so a line or a
/// multi-byte character split over two reads is joined first. Bytes read past
/// a final response stay buffered for the next call.
struct LineReader {
    chunk: [u8; CHUNK_LEN],
    start: usize,
    end: usize,
    line: Vec<u8, LINE_LEN>,
}

impl LineReader {
    fn new() -> Self {
        Self {
            chunk: [0; CHUNK_LEN],
            start: 0,
            end: 0,
            line: Vec::new(),
        }
    }

    /// The next trimmed, non-empty line.
    fn next_line<T: AtTransport>(&mut self, at: &mut T) -> Result<&str, Error> {
        self.line.clear();
        loop {
            while self.start < self.end {
                let byte = self.chunk[self.start];
                self.start += 1;
                if byte != b'\n' {
                    self.line.push(byte).map_err(|_| {
                        error!("AT response line longer than {} bytes", LINE_LEN);
                        Error::MessageTooLarge
                    })?;
                    continue;
                }
                if self.line.iter().all(|b| b.is_ascii_whitespace() || *b == 0) {
                    self.line.clear();
                    continue;
                }
                return core::str::from_utf8(&self.line)
                    .map(|line| line.trim_matches(|c: char| c.is_whitespace() || c == '\0'))
                    .map_err(|_| Error::InvalidResponse);
            }
            self.fill(at)?;
        }
    }

    fn fill<T: AtTransport>(&mut self, at: &mut T) -> Result<(), Error> {
        loop {
            match at.recv(&mut self.chunk) {
                Ok(None) => {
                    // EAGAIN
                    core::hint::spin_loop();
                }
                Ok(Some(n)) => {
                    self.start = 0;
                    self.end = n.min(CHUNK_LEN);
                    return Ok(());
                }
                Err(e) => {
                    error!("AT channel read failed: {:?}", e);
                    return Err(Error::Transport);
                }
            }
        }
    }
}

/// Pass each line to `on_line` until it returns `true`.
fn read_lines<T, F>(lines: &mut LineReader, at: &mut T, mut on_line: F) -> Result<(), Error>
where
    T: AtTransport,
    F: FnMut(&str) -> bool,
{
    loop {
        if on_line(lines.next_line(at)?) {
            return Ok(());
        }
    }
}

/// Send `command` and call `on_line` with every line before the final
/// response.
pub fn send_command<T, F>(at: &mut T, command: &str, on_line: F) -> Result<(), Error>
where
    T: AtTransport,
    F: FnMut(&str),
{
    execute(&mut LineReader::new(), at, command, on_line)
}

fn execute<T, F>(lines: &mut LineReader, at: &mut T, command: &str, mut on_line: F) -> Result<(), Error>
where
    T: AtTransport,
    F: FnMut(&str),
{
    debug!("AT> {}", command);
    at.send(command).map_err(|_| Error::Transport)?;

    let mut result = Ok(());
    read_lines(lines, at, |line| match final_response(line) {
        Some(r) => {
            result = r;
            true
        }
        None => {
            debug!("AT< {}", line);
            on_line(line);
            false
        }
    })?;
    result
}

/// Extract the registration status from a `+CEREG` line.
///
/// Accepts the unsolicited form `+CEREG: <stat>[,<tac>,<ci>,...]` and the
/// read response `+CEREG: <n>,<stat>[,...]`. The two are told apart by the
/// second field: a read response carries a bare number there, a notification
/// a quoted tracking area code.
///
/// ```rust
/// use celliot::modem::RegistrationStatus;
/// use celliot::modem::at::parse_cereg;
///
/// assert_eq!(parse_cereg("+CEREG: 5"), Some(RegistrationStatus::RegisteredRoaming));
/// assert_eq!(parse_cereg("+CEREG: 1,\"0A0B\",\"01234567\",7"), Some(RegistrationStatus::RegisteredHome));
/// assert_eq!(parse_cereg("+CEREG: 2,1,\"0A0B\""), Some(RegistrationStatus::RegisteredHome));
/// assert_eq!(parse_cereg("+CGEV: ME PDN ACT 0"), None);
/// ```
pub fn parse_cereg(line: &str) -> Option<RegistrationStatus> {
    let fields = line.trim().strip_prefix("+CEREG:")?;
    let mut fields = fields.split(',').map(str::trim);
    let first = fields.next()?;
    let stat = match fields.next() {
        Some(second) if !second.is_empty() && second.bytes().all(|b| b.is_ascii_digit()) => second,
        _ => first,
    };
    RegistrationStatus::from_stat(stat.parse().ok()?)
}

/// Enable registration notifications and block until the device is
/// registered on its home network or roaming.
pub fn wait_for_registration<T: AtTransport>(at: &mut T) -> Result<RegistrationStatus, Error> {
    let mut lines = LineReader::new();
    let mut registered = None;
    execute(&mut lines, at, "AT+CEREG=2", |line| {
        if let Some(status) = parse_cereg(line).filter(|s| s.is_registered()) {
            registered = Some(status);
        }
    })?;
    if let Some(status) = registered {
        return Ok(status);
    }

    read_lines(&mut lines, at, |line| {
        registered = parse_cereg(line).filter(|s| s.is_registered());
        registered.is_some()
    })?;
    registered.ok_or(Error::InvalidResponse)
}

/// Read the modem's IMEI with `AT+CGSN`.
pub fn read_imei<T: AtTransport>(at: &mut T) -> Result<String<IMEI_LEN>, Error> {
    let mut imei: String<IMEI_LEN> = String::new();
    send_command(at, "AT+CGSN", |line| {
        if imei.is_empty() && line.len() >= IMEI_LEN {
            let digits = &line[..IMEI_LEN];
            if digits.bytes().all(|b| b.is_ascii_digit()) {
                // `digits` is exactly the capacity.
                let _ = imei.push_str(digits);
            }
        }
    })
    .inspect_err(|e| error!("Failed to obtain IMEI, error: {}", e))?;

    if imei.is_empty() {
        error!("Failed to obtain IMEI, no IMEI in response");
        return Err(Error::InvalidResponse);
    }
    Ok(imei)
}

/// The MQTT client identifier: `configured` when it is not empty, otherwise
/// `nrf-<IMEI>`.
pub fn client_id<T: AtTransport, const N: usize>(
    configured: &str,
    at: &mut T,
) -> Result<String<N>, Error> {
    let mut id = String::new();
    if !configured.is_empty() {
        id.push_str(configured)
            .map_err(|_| Error::MessageTooLarge)
            .inspect_err(|_| error!("Failed to format client ID from config"))?;
    } else {
        let imei = read_imei(at)?;
        write!(id, "nrf-{}", imei)
            .map_err(|_| Error::MessageTooLarge)
            .inspect_err(|_| error!("Failed to format client ID from IMEI"))?;
    }
    debug!("client_id = {}", id);
    Ok(id)
}
