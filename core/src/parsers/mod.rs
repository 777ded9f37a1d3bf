//! Parsers turning remote `/proc` text into metric families.
//!
//! Every parser reads through a [`Source`] and writes into an
//! [`Exposition`]. A parser that cannot make sense of its input returns a
//! [`ParseError`] and emits nothing; the collector logs it and moves on.

pub mod arp;
pub mod conntrack;
pub mod diskstats;
pub mod entropy;
pub mod filefd;
pub mod filesystem;
pub mod loadavg;
pub mod meminfo;
pub mod netdev;
pub mod netstat;
pub mod sockstat;
pub mod stat;
pub mod textfile;
pub mod time;
pub mod vmstat;

use std::fmt;

use crate::errors::ParseError;
use crate::exposition::{Exposition, Value};
use crate::reader::Source;

/// One metric collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parser {
    Time,
    Loadavg,
    Stat,
    Vmstat,
    Meminfo,
    Filefd,
    Conntrack,
    Netstat,
    Sockstat,
    Netdev,
    Diskstats,
    Textfile,
    Arp,
    Entropy,
    Filesystem,
}

impl Parser {
    /// Parsers run on every scrape, in this order.
    pub const DEFAULT_ORDER: [Parser; 14] = [
        Parser::Time,
        Parser::Loadavg,
        Parser::Stat,
        Parser::Vmstat,
        Parser::Meminfo,
        Parser::Filefd,
        Parser::Conntrack,
        Parser::Netstat,
        Parser::Sockstat,
        Parser::Netdev,
        Parser::Diskstats,
        Parser::Textfile,
        Parser::Arp,
        Parser::Entropy,
    ];

    pub const ALL: [Parser; 15] = [
        Parser::Time,
        Parser::Loadavg,
        Parser::Stat,
        Parser::Vmstat,
        Parser::Meminfo,
        Parser::Filefd,
        Parser::Conntrack,
        Parser::Netstat,
        Parser::Sockstat,
        Parser::Netdev,
        Parser::Diskstats,
        Parser::Textfile,
        Parser::Arp,
        Parser::Entropy,
        Parser::Filesystem,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Loadavg => "loadavg",
            Self::Stat => "stat",
            Self::Vmstat => "vmstat",
            Self::Meminfo => "meminfo",
            Self::Filefd => "filefd",
            Self::Conntrack => "conntrack",
            Self::Netstat => "netstat",
            Self::Sockstat => "sockstat",
            Self::Netdev => "netdev",
            Self::Diskstats => "diskstats",
            Self::Textfile => "textfile",
            Self::Arp => "arp",
            Self::Entropy => "entropy",
            Self::Filesystem => "filesystem",
        }
    }

    /// Case-insensitive lookup by [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|parser| parser.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn run(self, src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
        match self {
            Self::Time => time::collect(src, out),
            Self::Loadavg => loadavg::collect(src, out),
            Self::Stat => stat::collect(src, out),
            Self::Vmstat => vmstat::collect(src, out),
            Self::Meminfo => meminfo::collect(src, out),
            Self::Filefd => filefd::collect(src, out),
            Self::Conntrack => conntrack::collect(src, out),
            Self::Netstat => netstat::collect(src, out),
            Self::Sockstat => sockstat::collect(src, out),
            Self::Netdev => netdev::collect(src, out),
            Self::Diskstats => diskstats::collect(src, out),
            Self::Textfile => textfile::collect(src, out),
            Self::Arp => arp::collect(src, out),
            Self::Entropy => entropy::collect(src, out),
            Self::Filesystem => filesystem::collect(src, out),
        }
    }
}

impl fmt::Display for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read `path`, treating blank content as unavailable.
pub(crate) fn read_required(src: &mut dyn Source, path: &str) -> Result<String, ParseError> {
    let text = src.read(path);
    if text.trim().is_empty() {
        Err(ParseError::Unavailable(path.to_string()))
    } else {
        Ok(text)
    }
}

pub(crate) fn parse_int(path: &str, token: &str) -> Result<i64, ParseError> {
    token
        .trim()
        .parse()
        .map_err(|_| ParseError::malformed(path, format!("expected an integer, got {token:?}")))
}

/// Integer when the token is one, float otherwise.
pub(crate) fn parse_number(token: &str) -> Option<Value> {
    let token = token.trim();
    token
        .parse::<i64>()
        .map(Value::Int)
        .or_else(|_| token.parse::<f64>().map(Value::Float))
        .ok()
}
