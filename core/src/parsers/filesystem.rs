//! Mounted filesystem sizes from `/proc/mounts` joined with `df -P`.
//!
//! Not part of the default parser set; enable it with
//! `EXTRA_COLLECTORS=filesystem`.

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind};
use crate::reader::Source;

use super::read_required;

pub const MOUNTS_PATH: &str = "/proc/mounts";
pub const DF_COMMAND: &str = "df -P";

const IGNORED_MOUNTPOINTS: [&str; 3] = ["/sys", "/dev", "/proc"];
const IGNORED_FSTYPES: [&str; 3] = ["autofs", "procfs", "sysfs"];
const BLOCK_SIZE: i64 = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filesystem {
    pub device: String,
    pub fstype: String,
    pub mountpoint: String,
    pub avail: i64,
    pub free: i64,
    pub size: i64,
}

impl Filesystem {
    fn value(&self, suffix: &str) -> i64 {
        match suffix {
            "avail" => self.avail,
            "free" => self.free,
            _ => self.size,
        }
    }
}

fn is_ignored_mountpoint(mountpoint: &str) -> bool {
    IGNORED_MOUNTPOINTS.iter().any(|ignored| {
        mountpoint == *ignored
            || mountpoint
                .strip_prefix(ignored)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Real mounts in `/proc/mounts` order, sizes zeroed.
pub fn parse_mounts(text: &str) -> Vec<Filesystem> {
    let mut mounts: Vec<Filesystem> = Vec::new();
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let &[device, mountpoint, fstype, ..] = fields.as_slice() else {
            continue;
        };
        if is_ignored_mountpoint(mountpoint) || IGNORED_FSTYPES.contains(&fstype) {
            continue;
        }
        let mount = Filesystem {
            device: device.to_string(),
            fstype: fstype.to_string(),
            mountpoint: mountpoint.to_string(),
            avail: 0,
            free: 0,
            size: 0,
        };
        // A later mount over the same point wins, keeping its position.
        match mounts.iter_mut().find(|m| m.mountpoint == mountpoint) {
            Some(existing) => *existing = mount,
            None => mounts.push(mount),
        }
    }
    mounts
}

/// Fill in sizes from POSIX `df` output (header line first, 1024-byte
/// blocks).
pub fn apply_df(mounts: &mut [Filesystem], df: &str) {
    for line in df.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            continue;
        }
        let mountpoint = fields[5..].join(" ");
        let Some(mount) = mounts.iter_mut().find(|m| m.mountpoint == mountpoint) else {
            continue;
        };
        let (Ok(blocks), Ok(used), Ok(available)) = (
            fields[1].parse::<i64>(),
            fields[2].parse::<i64>(),
            fields[3].parse::<i64>(),
        ) else {
            continue;
        };
        mount.size = blocks * BLOCK_SIZE;
        mount.free = (blocks - used) * BLOCK_SIZE;
        mount.avail = available * BLOCK_SIZE;
    }
}

pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let mounts = read_required(src, MOUNTS_PATH)?;
    let df = src.exec(DF_COMMAND);
    if df.trim().is_empty() {
        return Err(ParseError::Unavailable(DF_COMMAND.to_string()));
    }

    let mut filesystems = parse_mounts(&mounts);
    apply_df(&mut filesystems, &df);

    for suffix in ["avail", "free", "size"] {
        out.declare(format!("node_filesystem_{suffix}"), MetricKind::Gauge, None);
        for fs in &filesystems {
            out.emit_labeled(
                &[
                    ("device", fs.device.as_str()),
                    ("fstype", fs.fstype.as_str()),
                    ("mountpoint", fs.mountpoint.as_str()),
                ],
                fs.value(suffix),
            );
        }
    }
    Ok(())
}
