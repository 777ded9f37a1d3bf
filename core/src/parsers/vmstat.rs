//! `node_vmstat_*` gauges from `/proc/vmstat`.

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind};
use crate::reader::Source;

use super::read_required;

pub const VMSTAT_PATH: &str = "/proc/vmstat";

/// `key value` pairs; lines that are not exactly that are skipped.
pub fn parse_vmstat(text: &str) -> Vec<(&str, i64)> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let key = fields.next()?;
            let value = fields.next()?.parse().ok()?;
            fields.next().is_none().then_some((key, value))
        })
        .collect()
}

pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let text = read_required(src, VMSTAT_PATH)?;
    for (key, value) in parse_vmstat(&text) {
        out.declare(format!("node_vmstat_{key}"), MetricKind::Gauge, None);
        out.emit(value);
    }
    Ok(())
}
