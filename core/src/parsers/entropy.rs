//! `node_entropy_available_bits`.

use crate::errors::ParseError;
use crate::exposition::{Exposition, MetricKind};
use crate::reader::Source;

use super::{parse_int, read_required};

pub const ENTROPY_PATH: &str = "/proc/sys/kernel/random/entropy_avail";

pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    let bits = parse_int(ENTROPY_PATH, &read_required(src, ENTROPY_PATH)?)?;
    out.declare(
        "node_entropy_available_bits",
        MetricKind::Gauge,
        Some("Bits of available entropy"),
    );
    out.emit(bits);
    Ok(())
}
