//! `node_disk_*` from `/proc/diskstats`.

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind};
use crate::reader::Source;

use super::read_required;

pub const DISKSTATS_PATH: &str = "/proc/diskstats";

const DEVICE_COLUMN: usize = 2;

/// Counters in columns 3..=13, in order.
pub const COUNTERS: [&str; 11] = [
    "reads_completed",
    "reads_merged",
    "sectors_read",
    "read_time_ms",
    "writes_completed",
    "writes_merged",
    "sectors_written",
    "write_time_ms",
    "io_now",
    "io_time_ms",
    "io_time_weighted",
];

/// `(device, counters)` in file order. Short or non-numeric lines are
/// skipped.
pub fn parse_diskstats(text: &str) -> Vec<(String, [i64; 11])> {
    let mut devices = Vec::new();
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < DEVICE_COLUMN + 1 + COUNTERS.len() {
            continue;
        }
        let mut counters = [0i64; 11];
        let start = DEVICE_COLUMN + 1;
        let parsed = fields[start..start + COUNTERS.len()]
            .iter()
            .zip(counters.iter_mut())
            .all(|(field, slot)| match field.parse() {
                Ok(v) => {
                    *slot = v;
                    true
                }
                Err(_) => false,
            });
        if parsed {
            devices.push((fields[DEVICE_COLUMN].to_string(), counters));
        }
    }
    devices
}

pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let devices = parse_diskstats(&read_required(src, DISKSTATS_PATH)?);
    for (index, counter) in COUNTERS.iter().enumerate() {
        out.declare(format!("node_disk_{counter}"), MetricKind::Gauge, None);
        for (device, counters) in &devices {
            out.emit_labeled(&[("device", device.as_str())], counters[index]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::{run, type_headers, FixtureSource};
    use crate::parsers::Parser;

    const DISKSTATS: &str = "\
  31       0 mtdblock0 12 0 96 40 0 0 0 0 0 40 40
   8       0 sda 1200 30 98000 4500 800 20 64000 9000 1 7000 13500 0 0 0 0
   8       1 sda1 short line
";

    #[test]
    fn metric_major_in_file_order() {
        let mut src = FixtureSource::new().file(DISKSTATS_PATH, DISKSTATS);
        let (result, text) = run(Parser::Diskstats, &mut src);
        result.unwrap();

        let headers = type_headers(&text);
        assert_eq!(headers.len(), 11);
        assert_eq!(headers[0], "node_disk_reads_completed");
        assert_eq!(headers[10], "node_disk_io_time_weighted");
        assert!(text.contains(
            "# TYPE node_disk_reads_completed gauge\n\
             node_disk_reads_completed{device=\"mtdblock0\"} 12\n\
             node_disk_reads_completed{device=\"sda\"} 1200\n"
        ));
        assert!(text.contains("node_disk_io_now{device=\"sda\"} 1\n"));
        assert!(text.contains("node_disk_io_time_weighted{device=\"sda\"} 13500\n"));
        assert!(!text.contains("sda1"));
    }
}
