//! Allocated and maximum file handles from `/proc/sys/fs/file-nr`.

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind};
use crate::reader::Source;

use super::{parse_int, read_required};

pub const FILE_NR_PATH: &str = "/proc/sys/fs/file-nr";

/// `(allocated, maximum)`: fields 0 and 2. Field 1 is always zero on
/// modern kernels.
pub fn parse_file_nr(text: &str) -> Result<(i64, i64), ParseError> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(ParseError::malformed(
            FILE_NR_PATH,
            format!("expected 3 fields, got {}", fields.len()),
        ));
    }
    Ok((
        parse_int(FILE_NR_PATH, fields[0])?,
        parse_int(FILE_NR_PATH, fields[2])?,
    ))
}

pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let (allocated, maximum) = parse_file_nr(&read_required(src, FILE_NR_PATH)?)?;
    out.declare(
        "node_filefd_allocated",
        MetricKind::Gauge,
        Some("File descriptor statistics: allocated"),
    );
    out.emit(allocated);
    out.declare(
        "node_filefd_maximum",
        MetricKind::Gauge,
        Some("File descriptor statistics: maximum"),
    );
    out.emit(maximum);
    Ok(())
}
