//! `node_sockstat_*` from `/proc/net/sockstat`.

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind};
use crate::reader::Source;

use super::read_required;

pub const SOCKSTAT_PATH: &str = "/proc/net/sockstat";

fn is_word(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// `(prefix_stat, count)` for every `word number` pair after `prefix:`.
pub fn parse_sockstat(text: &str) -> Vec<(String, i64)> {
    let mut stats = Vec::new();
    for line in text.lines() {
        let Some((prefix, rest)) = line.split_once(':') else {
            continue;
        };
        let prefix = prefix.trim();
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let mut i = 0;
        while i + 1 < tokens.len() {
            match tokens[i + 1].parse::<i64>() {
                Ok(count) if is_word(tokens[i]) && count >= 0 => {
                    stats.push((format!("{prefix}_{}", tokens[i]), count));
                    i += 2;
                }
                _ => i += 1,
            }
        }
    }
    stats
}

pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let text = read_required(src, SOCKSTAT_PATH)?;
    for (name, count) in parse_sockstat(&text) {
        out.declare(format!("node_sockstat_{name}"), MetricKind::Gauge, None);
        out.emit(count);
    }
    Ok(())
}
