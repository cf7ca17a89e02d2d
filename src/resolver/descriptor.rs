//! Section descriptor builder: turns a parsed triple into a
//! [`MemorySection`] positioned in live-module space.

use tracing::{debug, info, warn};

use crate::core::layout::Offset;
use crate::core::section::MemorySection;
use crate::parse::source::ParsedSection;
use crate::resolver::diagnostics::{BuildDiagnostics, SoftIssue};

/// Build the section for `parsed`, moving its start by `offset`.
///
/// Symbols are expected to already carry live addresses. Symbols outside
/// the section's range are kept and reported, never dropped.
pub fn build_section(
    parsed: ParsedSection,
    name: &str,
    offset: Offset,
    diagnostics: &mut BuildDiagnostics,
) -> MemorySection {
    let kind = parsed.kind;
    let live_start = offset.to_live(parsed.start);

    info!(
        section = name,
        start = format_args!("{:#x}", parsed.start),
        live_start = format_args!("{:#x}", live_start),
        size = parsed.size,
        symbols = parsed.symbols.len(),
        "Resolved section"
    );

    if parsed.symbols.is_empty() {
        warn!(section = name, "Symbol parsing found no symbols");
        diagnostics.record(SoftIssue::NoSymbols { section: kind });
    }

    let section = MemorySection::new(name, live_start, parsed.size, parsed.symbols);

    let foreign = section.foreign_symbols().count();
    if foreign > 0 {
        debug!(section = name, count = foreign, "Symbols listed outside section range");
        diagnostics.record(SoftIssue::SymbolOutOfRange {
            section: kind,
            count: foreign,
        });
    }

    section
}
