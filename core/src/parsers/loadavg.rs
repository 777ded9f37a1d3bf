//! `node_load1` from `/proc/loadavg`.

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind};
use crate::reader::Source;

use super::read_required;

pub const LOADAVG_PATH: &str = "/proc/loadavg";

pub fn parse_load1(text: &str) -> Result<f64, ParseError> {
    let field = text
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::Unavailable(LOADAVG_PATH.to_string()))?;
    field
        .parse()
        .map_err(|_| ParseError::malformed(LOADAVG_PATH, format!("bad load average {field:?}")))
}

pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let load1 = parse_load1(&read_required(src, LOADAVG_PATH)?)?;
    out.declare("node_load1", MetricKind::Gauge, Some("1m load average"));
    out.emit(load1);
    Ok(())
}
