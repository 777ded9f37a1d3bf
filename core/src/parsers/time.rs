//! `node_time` from the hardware clock, a persisted timestamp, or `date`.

use chrono::NaiveDateTime;

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind, Value};
use crate::reader::Source;

use super::parse_number;

pub const RTC_PATH: &str = "/proc/driver/rtc";
pub const SYSTEM_TIME_PATH: &str = "/etc/storage/system_time";
pub const DATE_COMMAND: &str = "date +%s";

const RTC_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const METRIC: &str = "node_time";
const HELP: &str = "System time in seconds since epoch (1970)";

/// Wall-clock date and time from `/proc/driver/rtc` (`key : value` lines).
pub fn parse_rtc(text: &str) -> Option<NaiveDateTime> {
    let mut date = None;
    let mut time = None;
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "rtc_date" => date = Some(value.trim()),
            "rtc_time" => time = Some(value.trim()),
            _ => {}
        }
    }
    NaiveDateTime::parse_from_str(&format!("{} {}", date?, time?), RTC_FORMAT).ok()
}

/// Seconds since the epoch for a remote wall time `offset_minutes` east of UTC.
pub fn rtc_epoch(wall: NaiveDateTime, offset_minutes: i64) -> i64 {
    wall.and_utc().timestamp() - offset_minutes * 60
}

pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let value = match parse_rtc(&src.read(RTC_PATH)) {
        Some(wall) => Value::Int(rtc_epoch(wall, src.timezone_offset_minutes())),
        None => parse_number(&src.read(SYSTEM_TIME_PATH))
            .or_else(|| parse_number(&src.exec(DATE_COMMAND)))
            .ok_or_else(|| ParseError::Unavailable(DATE_COMMAND.to_string()))?,
    };

    out.declare(METRIC, MetricKind::Counter, Some(HELP));
    out.emit(value);
    Ok(())
}
