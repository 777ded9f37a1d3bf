//! Prometheus text exposition, built as structured records.
//!
//! Parsers [`declare`](Exposition::declare) a family and then
//! [`emit`](Exposition::emit) samples into it. Nothing is formatted until
//! [`render`](Exposition::render), so a family declared twice in one cycle
//! still gets a single `# TYPE` header.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use tracing::debug;

/// Values at or above this magnitude render in scientific notation.
const SCIENTIFIC_THRESHOLD: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sample value, kept in the type the source produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Self::Float(v as f64), Self::Int)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::from(v as u64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(*self))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: Vec<(String, String)>,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub kind: MetricKind,
    pub help: Option<String>,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Family(MetricFamily),
    /// Pre-rendered exposition text, written out unchanged.
    Verbatim(String),
}

/// Per-cycle metric accumulator.
#[derive(Debug, Default)]
pub struct Exposition {
    records: Vec<Record>,
    families: HashMap<String, usize>,
    current: Option<usize>,
}

impl Exposition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything collected so far.
    pub fn reset(&mut self) {
        self.records.clear();
        self.families.clear();
        self.current = None;
    }

    /// Select the family `name`, creating it on first use.
    ///
    /// Kind and help of an existing family are left untouched.
    pub fn declare(&mut self, name: impl Into<String>, kind: MetricKind, help: Option<&str>) {
        let name = name.into();
        if let Some(&index) = self.families.get(&name) {
            self.current = Some(index);
            return;
        }
        let index = self.records.len();
        self.records.push(Record::Family(MetricFamily {
            name: name.clone(),
            kind,
            help: help.map(str::to_string),
            samples: Vec::new(),
        }));
        self.families.insert(name, index);
        self.current = Some(index);
    }

    /// Append an unlabelled sample to the current family.
    pub fn emit(&mut self, value: impl Into<Value>) {
        self.push_sample(Vec::new(), value.into());
    }

    /// Append a labelled sample to the current family.
    pub fn emit_labeled(&mut self, labels: &[(&str, &str)], value: impl Into<Value>) {
        let labels = labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self.push_sample(labels, value.into());
    }

    pub fn append_verbatim(&mut self, text: impl Into<String>) {
        self.records.push(Record::Verbatim(text.into()));
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn family(&self, name: &str) -> Option<&MetricFamily> {
        match self.records.get(*self.families.get(name)?) {
            Some(Record::Family(family)) => Some(family),
            _ => None,
        }
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            match record {
                Record::Family(family) => render_family(&mut out, family),
                Record::Verbatim(text) => out.push_str(text),
            }
        }
        out
    }

    fn push_sample(&mut self, labels: Vec<(String, String)>, value: Value) {
        let Some(index) = self.current else {
            debug!("Dropping sample {value} emitted before any declare");
            return;
        };
        if let Some(Record::Family(family)) = self.records.get_mut(index) {
            family.samples.push(Sample { labels, value });
        }
    }
}

fn render_family(out: &mut String, family: &MetricFamily) {
    // Writing into a String cannot fail.
    if let Some(help) = &family.help {
        let _ = writeln!(out, "# HELP {} {}.", family.name, help);
    }
    let _ = writeln!(out, "# TYPE {} {}", family.name, family.kind);
    for sample in &family.samples {
        out.push_str(&family.name);
        if !sample.labels.is_empty() {
            out.push('{');
            for (i, (key, value)) in sample.labels.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{key}=\"{}\"", escape_label_value(value));
            }
            out.push('}');
        }
        let _ = writeln!(out, " {}", sample.value);
    }
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Format a sample value.
///
/// Magnitudes below one million print as plain decimals. Larger ones use
/// six mantissa digits and a signed two-digit exponent (`1.000000e+06`).
pub fn format_value(value: Value) -> String {
    match value {
        Value::Int(v) if (v.unsigned_abs() as f64) < SCIENTIFIC_THRESHOLD => v.to_string(),
        Value::Int(v) => scientific(v as f64),
        Value::Float(v) if v.is_nan() => "NaN".to_string(),
        Value::Float(v) if v.is_infinite() && v > 0.0 => "+Inf".to_string(),
        Value::Float(v) if v.is_infinite() => "-Inf".to_string(),
        Value::Float(v) if v.abs() < SCIENTIFIC_THRESHOLD => v.to_string(),
        Value::Float(v) => scientific(v),
    }
}

fn scientific(v: f64) -> String {
    let raw = format!("{v:.6e}");
    match raw.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.abs())
        }
        None => raw,
    }
}
