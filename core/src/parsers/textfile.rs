//! Pre-rendered `*.prom` snippets from the remote textfile directory.

use crate::errors::ParseError;
use crate::exposition::Exposition;
use crate::reader::Source;

/// Append each snippet as-is, with surrounding blank lines collapsed to a
/// single trailing newline. Empty files contribute nothing.
pub fn collect(src: &mut dyn Source, out: &mut Exposition) -> Result<(), ParseError> {
    for (_, text) in src.textfiles() {
        let text = text.trim_matches('\n');
        if !text.is_empty() {
            out.append_verbatim(format!("{text}\n"));
        }
    }
    Ok(())
}
