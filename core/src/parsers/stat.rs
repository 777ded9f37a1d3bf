//! Kernel/process counters and per-CPU times from `/proc/stat`.

use std::collections::HashMap;

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind};
use crate::reader::Source;

use super::read_required;

pub const STAT_PATH: &str = "/proc/stat";

/// Kernel clock ticks per second (`USER_HZ`).
const USER_HZ: f64 = 100.0;

/// `(line token, metric, kind, help)`.
const SCALARS: [(&str, &str, MetricKind, &str); 6] = [
    (
        "btime",
        "node_boot_time",
        MetricKind::Gauge,
        "Node boot time, in unixtime",
    ),
    (
        "ctxt",
        "node_context_switches",
        MetricKind::Counter,
        "Total number of context switches",
    ),
    (
        "processes",
        "node_forks",
        MetricKind::Counter,
        "Total number of forks",
    ),
    (
        "intr",
        "node_intr",
        MetricKind::Counter,
        "Total number of interrupts serviced",
    ),
    (
        "procs_blocked",
        "node_procs_blocked",
        MetricKind::Gauge,
        "Number of processes blocked waiting for I/O to complete",
    ),
    (
        "procs_running",
        "node_procs_running",
        MetricKind::Gauge,
        "Number of processes in runnable state",
    ),
];

pub const CPU_MODES: [&str; 10] = [
    "user",
    "nice",
    "system",
    "idle",
    "iowait",
    "irq",
    "softirq",
    "steal",
    "guest",
    "guest_nice",
];

/// Tick counters of one `cpuN` line, in [`CPU_MODES`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuTimes {
    pub cpu: String,
    pub ticks: Vec<u64>,
}

impl CpuTimes {
    /// `(mode, seconds)` for every mode present on the line.
    pub fn seconds(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        CPU_MODES
            .iter()
            .zip(&self.ticks)
            .map(|(mode, ticks)| (*mode, *ticks as f64 / USER_HZ))
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProcStat {
    /// First value of each recognised scalar line, keyed by line token.
    pub scalars: HashMap<&'static str, i64>,
    pub cpus: Vec<CpuTimes>,
}

/// `cpu0`, `cpu12`; not the aggregate `cpu`.
fn is_core_label(token: &str) -> bool {
    token
        .strip_prefix("cpu")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

pub fn parse_stat(text: &str) -> Result<ProcStat, ParseError> {
    let mut stat = ProcStat::default();
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let Some(token) = fields.next() else {
            continue;
        };

        if is_core_label(token) {
            let ticks = fields
                .map(|f| {
                    f.parse::<u64>().map_err(|_| {
                        ParseError::malformed(STAT_PATH, format!("{token}: bad tick count {f:?}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            stat.cpus.push(CpuTimes {
                cpu: token.to_string(),
                ticks,
            });
            continue;
        }

        let Some(&(key, ..)) = SCALARS.iter().find(|(key, ..)| *key == token) else {
            continue;
        };
        if stat.scalars.contains_key(key) {
            continue;
        }
        if let Some(value) = fields.next().and_then(|f| f.parse().ok()) {
            stat.scalars.insert(key, value);
        }
    }
    Ok(stat)
}

pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let stat = parse_stat(&read_required(src, STAT_PATH)?)?;

    for (key, metric, kind, help) in SCALARS {
        if let Some(&value) = stat.scalars.get(key) {
            out.declare(metric, kind, Some(help));
            out.emit(value);
        }
    }

    out.declare(
        "node_cpu",
        MetricKind::Counter,
        Some("Seconds the cpus spent in each mode"),
    );
    for cpu in &stat.cpus {
        for (mode, seconds) in cpu.seconds() {
            out.emit_labeled(&[("cpu", cpu.cpu.as_str()), ("mode", mode)], seconds);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::{run, type_headers, FixtureSource};
    use crate::parsers::Parser;

    const STAT: &str = "\
cpu  10132 290 3084 46828 166 0 251 0 0 0
cpu0 5066 145 1542 23414 83 0 125 0 0 0
cpu1 5066 145 1542 23414 83 0 126 0
intr 1543210 23 0 0 0
ctxt 2837465
btime 1704067200
processes 48211
procs_running 2
procs_blocked 0
softirq 982345 0 1 2
";

    #[test]
    fn parses_scalars_and_cores() {
        let stat = parse_stat(STAT).unwrap();
        assert_eq!(stat.scalars["btime"], 1_704_067_200);
        assert_eq!(stat.scalars["intr"], 1_543_210);
        assert_eq!(stat.scalars["procs_blocked"], 0);
        assert_eq!(stat.cpus.len(), 2);
        assert_eq!(stat.cpus[0].cpu, "cpu0");
        assert_eq!(stat.cpus[1].ticks.len(), 8);
    }

    #[test]
    fn emits_catalog() {
        let mut src = FixtureSource::new().file(STAT_PATH, STAT);
        let (result, text) = run(Parser::Stat, &mut src);
        result.unwrap();

        assert_eq!(
            type_headers(&text),
            [
                "node_boot_time",
                "node_context_switches",
                "node_forks",
                "node_intr",
                "node_procs_blocked",
                "node_procs_running",
                "node_cpu"
            ]
        );
        assert!(text.contains("# TYPE node_boot_time gauge\nnode_boot_time 1.704067e+09\n"));
        assert!(text.contains("node_forks 48211\n"));
        assert!(text.contains("node_cpu{cpu=\"cpu0\",mode=\"user\"} 50.66\n"));
        assert!(text.contains("node_cpu{cpu=\"cpu0\",mode=\"guest_nice\"} 0\n"));
        assert!(text.contains("node_cpu{cpu=\"cpu1\",mode=\"softirq\"} 1.26\n"));
        assert!(!text.contains("node_cpu{cpu=\"cpu1\",mode=\"guest\"}"));
        // Aggregate line is not a core.
        assert_eq!(text.matches("mode=\"idle\"").count(), 2);
    }

    #[test]
    fn missing_scalar_is_omitted() {
        let mut src = FixtureSource::new().file(STAT_PATH, "cpu0 1 2 3 4\nctxt 99\n");
        let (result, text) = run(Parser::Stat, &mut src);
        result.unwrap();
        assert_eq!(type_headers(&text), ["node_context_switches", "node_cpu"]);
        assert!(text.contains("node_cpu{cpu=\"cpu0\",mode=\"idle\"} 0.04\n"));
    }

    #[test]
    fn bad_tick_is_malformed() {
        assert!(matches!(
            parse_stat("cpu0 1 x 3\n"),
            Err(ParseError::Malformed { .. })
        ));
    }
}
