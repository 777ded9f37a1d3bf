//! Netfilter connection tracking table usage.

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind};
use crate::reader::Source;

use super::parse_int;

pub const COUNT_PATH: &str = "/proc/sys/net/netfilter/nf_conntrack_count";
pub const MAX_PATH: &str = "/proc/sys/net/netfilter/nf_conntrack_max";

const METRICS: [(&str, &str, &str); 2] = [
    (
        COUNT_PATH,
        "node_nf_conntrack_entries",
        "Number of currently allocated flow entries for connection tracking",
    ),
    (
        MAX_PATH,
        "node_nf_conntrack_entries_limit",
        "Maximum size of connection tracking table",
    ),
];

/// Each metric is emitted only when its source file is non-empty.
pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let mut values = Vec::with_capacity(METRICS.len());
    for (path, metric, help) in METRICS {
        let text = src.read(path);
        let text = text.trim();
        if !text.is_empty() {
            values.push((metric, help, parse_int(path, text)?));
        }
    }
    if values.is_empty() {
        return Err(ParseError::Unavailable(COUNT_PATH.to_string()));
    }

    for (metric, help, value) in values {
        out.declare(metric, MetricKind::Gauge, Some(help));
        out.emit(value);
    }
    Ok(())
}
