//! `node_netstat_*` from `/proc/net/netstat` and `/proc/net/snmp`.
//!
//! Both files hold pairs of lines sharing a `Prefix:`; the first names the
//! fields, the second carries their values.

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind};
use crate::reader::Source;

pub const NETSTAT_PATH: &str = "/proc/net/netstat";
pub const SNMP_PATH: &str = "/proc/net/snmp";

/// `(Prefix_Field, value)` for every header/value pair.
///
/// Pairs whose prefixes disagree are skipped, as are values that are not
/// integers.
pub fn parse_netstat<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<(String, i64)> {
    let lines: Vec<&str> = lines.into_iter().filter(|l| !l.trim().is_empty()).collect();
    let mut stats = Vec::new();
    for pair in lines.chunks_exact(2) {
        let (Some((prefix, fields)), Some((value_prefix, values))) =
            (pair[0].split_once(':'), pair[1].split_once(':'))
        else {
            continue;
        };
        let prefix = prefix.trim();
        if prefix != value_prefix.trim() {
            continue;
        }
        for (field, value) in fields.split_whitespace().zip(values.split_whitespace()) {
            if let Ok(value) = value.parse() {
                stats.push((format!("{prefix}_{field}"), value));
            }
        }
    }
    stats
}

pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let netstat = src.read(NETSTAT_PATH);
    let snmp = src.read(SNMP_PATH);
    if netstat.trim().is_empty() && snmp.trim().is_empty() {
        return Err(ParseError::Unavailable(NETSTAT_PATH.to_string()));
    }

    for (name, value) in parse_netstat(netstat.lines().chain(snmp.lines())) {
        out.declare(format!("node_netstat_{name}"), MetricKind::Gauge, None);
        out.emit(value);
    }
    Ok(())
}
