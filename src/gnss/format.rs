//! Text renderings of a fix for sending to a server.

use heapless::String;

use super::PvtFrame;
use crate::system::fmt::format_truncated;

/// Buffer size for [`format_position`] in the GNSS + UDP sample.
pub const POSITION_LEN: usize = 256;

/// Buffer size for [`format_tracker_payload`] in the tracker.
pub const TRACKER_PAYLOAD_LEN: usize = 64;

/// `Latitude: <lat>, Longitude: <lon>` with six decimals, truncated to `N`
/// bytes.
///
/// ```rust
/// use celliot::gnss::{format_position, PvtFrame};
///
/// let fix = PvtFrame { latitude: 63.421, longitude: 10.437, ..Default::default() };
/// let text = format_position::<64>(&fix);
/// assert_eq!(text.as_str(), "Latitude: 63.421000, Longitude: 10.437000");
/// ```
pub fn format_position<const N: usize>(pvt: &PvtFrame) -> String<N> {
    format_truncated(format_args!(
        "Latitude: {:.6}, Longitude: {:.6}",
        pvt.latitude, pvt.longitude
    ))
}

/// Position, accuracy and UTC timestamp on three lines, truncated to `N`
/// bytes:
///
/// ```text
/// <lat>,<lon>
/// <accuracy> m
/// YYYY-MM-DD hh:mm:ss
/// ```
pub fn format_tracker_payload<const N: usize>(pvt: &PvtFrame) -> String<N> {
    let t = &pvt.datetime;
    format_truncated(format_args!(
        "{:.6},{:.6}\n{:.1} m\n{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        pvt.latitude, pvt.longitude, pvt.accuracy, t.year, t.month, t.day, t.hour, t.minute, t.seconds
    ))
}
