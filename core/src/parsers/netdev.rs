//! Per-interface counters from `/proc/net/dev`.

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind};
use crate::reader::Source;

use super::{parse_int, read_required};

pub const NETDEV_PATH: &str = "/proc/net/dev";

/// Line holding the column names; the first line is a group banner.
const HEADER_LINE: usize = 1;

#[derive(Debug, PartialEq, Eq)]
pub struct NetDev {
    /// Column names, receive half first.
    pub columns: Vec<String>,
    /// `(device, values)` in file order.
    pub devices: Vec<(String, Vec<i64>)>,
}

impl NetDev {
    /// `node_network_<direction>_<column>` for column `index`.
    pub fn metric_name(&self, index: usize) -> String {
        let direction = if 2 * index < self.columns.len() {
            "receive"
        } else {
            "transmit"
        };
        format!("node_network_{direction}_{}", self.columns[index])
    }
}

pub fn parse_netdev(text: &str) -> Result<NetDev, ParseError> {
    let lines: Vec<&str> = text.lines().collect();
    let header = lines
        .get(HEADER_LINE)
        .ok_or_else(|| ParseError::malformed(NETDEV_PATH, "missing column header"))?;
    let columns: Vec<String> = header
        .replace('|', " ")
        .split_whitespace()
        .skip(1)
        .map(str::to_string)
        .collect();

    let mut devices = Vec::new();
    for line in lines.iter().skip(HEADER_LINE + 1) {
        let row = line.replace(['|', ':'], " ");
        let mut fields = row.split_whitespace();
        let Some(device) = fields.next() else {
            continue;
        };
        let values = fields
            .map(|f| parse_int(NETDEV_PATH, f))
            .collect::<Result<Vec<_>, _>>()?;
        devices.push((device.to_string(), values));
    }
    Ok(NetDev { columns, devices })
}

pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let netdev = parse_netdev(&read_required(src, NETDEV_PATH)?)?;
    for index in 0..netdev.columns.len() {
        out.declare(netdev.metric_name(index), MetricKind::Gauge, None);
        for (device, values) in &netdev.devices {
            if let Some(&value) = values.get(index) {
                out.emit_labeled(&[("device", device.as_str())], value);
            }
        }
    }
    Ok(())
}
