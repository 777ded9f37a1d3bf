//! `node_memory_*` gauges from `/proc/meminfo`.

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind};
use crate::reader::Source;

use super::read_required;

pub const MEMINFO_PATH: &str = "/proc/meminfo";

/// Metric-safe key: `Active(anon):` becomes `Active_anon`.
fn normalise_key(key: &str) -> String {
    key.replace('(', "_").replace([')', ':'], "")
}

/// `(key, bytes)` per line. A trailing unit means the value is in kB.
pub fn parse_meminfo(text: &str) -> Vec<(String, i64)> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let key = normalise_key(fields.first()?);
            let value: i64 = fields.get(1)?.parse().ok()?;
            let value = if fields.len() >= 3 { value * 1024 } else { value };
            (!key.is_empty()).then_some((key, value))
        })
        .collect()
}

pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let text = read_required(src, MEMINFO_PATH)?;
    for (key, value) in parse_meminfo(&text) {
        out.declare(format!("node_memory_{key}"), MetricKind::Gauge, None);
        out.emit(value);
    }
    Ok(())
}
