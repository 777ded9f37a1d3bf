//! Batched single-round-trip read of every well-known statistics source.
//!
//! `grep -F -H "" <files...>` prints every line of every readable file
//! prefixed with `<path>:`; [`PrereadCache::load`] splits that back into
//! per-file contents.

use std::collections::BTreeMap;

use tracing::debug;

use crate::channel::CommandChannel;

/// Remote files fetched by the batched read, in command order.
pub const PREREAD_SOURCES: [&str; 17] = [
    "/etc/storage/system_time",
    "/proc/diskstats",
    "/proc/driver/rtc",
    "/proc/loadavg",
    "/proc/meminfo",
    "/proc/mounts",
    "/proc/net/arp",
    "/proc/net/dev",
    "/proc/net/netstat",
    "/proc/net/snmp",
    "/proc/net/sockstat",
    "/proc/stat",
    "/proc/sys/fs/file-nr",
    "/proc/sys/kernel/random/entropy_avail",
    "/proc/sys/net/netfilter/nf_conntrack_count",
    "/proc/sys/net/netfilter/nf_conntrack_max",
    "/proc/vmstat",
];

const PREREAD_PROGRAM: &str = "grep -F -H \"\"";
const TEXTFILE_GLOB: &str = "*.prom";

/// The well-known sources plus the optional remote textfile directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRegistry {
    textfile_dir: Option<String>,
}

impl SourceRegistry {
    /// Trailing slashes are trimmed; an empty directory means none.
    pub fn new(textfile_dir: Option<&str>) -> Self {
        let textfile_dir = textfile_dir
            .map(|dir| dir.trim().trim_end_matches('/'))
            .filter(|dir| !dir.is_empty())
            .map(str::to_string);
        Self { textfile_dir }
    }

    pub fn paths(&self) -> &'static [&'static str] {
        &PREREAD_SOURCES
    }

    pub fn is_known(&self, path: &str) -> bool {
        PREREAD_SOURCES.contains(&path)
    }

    pub fn textfile_dir(&self) -> Option<&str> {
        self.textfile_dir.as_deref()
    }

    pub fn preread_command(&self) -> String {
        let mut command = format!("{PREREAD_PROGRAM} {}", PREREAD_SOURCES.join(" "));
        if let Some(dir) = &self.textfile_dir {
            command.push_str(&format!(" {dir}/{TEXTFILE_GLOB}"));
        }
        command
    }
}

/// Per-cycle contents of the well-known sources and textfiles.
#[derive(Debug, Default)]
pub struct PrereadCache {
    registry: SourceRegistry,
    entries: BTreeMap<String, String>,
}

impl PrereadCache {
    pub fn new(registry: SourceRegistry) -> Self {
        let mut cache = Self {
            registry,
            entries: BTreeMap::new(),
        };
        cache.load("");
        cache
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Refresh every entry with one remote command.
    pub fn build(&mut self, channel: &mut CommandChannel) {
        let output = channel.exec(&self.registry.preread_command());
        self.load(&output);
        debug!(
            "Preread {} bytes into {} sources",
            output.len(),
            self.entries.len()
        );
    }

    /// Replace the cache with the demultiplexed `output`.
    pub fn load(&mut self, output: &str) {
        let mut entries: BTreeMap<String, String> = PREREAD_SOURCES
            .iter()
            .map(|path| ((*path).to_string(), String::new()))
            .collect();
        for line in output.split_inclusive('\n') {
            let Some((path, rest)) = line.split_once(':') else {
                continue;
            };
            entries.entry(path.to_string()).or_default().push_str(rest);
        }
        self.entries = entries;
    }

    /// Cached content of `path`, empty when the file was not read.
    pub fn get(&self, path: &str) -> &str {
        self.entries.get(path).map_or("", String::as_str)
    }

    pub fn is_known(&self, path: &str) -> bool {
        self.registry.is_known(path)
    }

    /// Cached textfile snippets, in path order.
    pub fn textfiles(&self) -> Vec<(&str, &str)> {
        let Some(dir) = self.registry.textfile_dir() else {
            return Vec::new();
        };
        let prefix = format!("{dir}/");
        self.entries
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(path, text)| (path.as_str(), text.as_str()))
            .collect()
    }
}
