//! ARP table size per interface from `/proc/net/arp`.

use std::collections::BTreeMap;

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind};
use crate::reader::Source;

use super::read_required;

pub const ARP_PATH: &str = "/proc/net/arp";

/// Entry count per device (last column), header line dropped.
pub fn parse_arp(text: &str) -> BTreeMap<String, i64> {
    let mut devices = BTreeMap::new();
    for line in text.lines().skip(1) {
        if let Some(device) = line.split_whitespace().last() {
            *devices.entry(device.to_string()).or_insert(0) += 1;
        }
    }
    devices
}

pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let devices = parse_arp(&read_required(src, ARP_PATH)?);
    out.declare(
        "node_arp_entries",
        MetricKind::Gauge,
        Some("ARP entries by device"),
    );
    for (device, count) in &devices {
        out.emit_labeled(&[("device", device.as_str())], *count);
    }
    Ok(())
}
