//! Reference offset resolution.
//!
//! The loader may place a module anywhere. The module stores the address of
//! its own reference variable inside that variable; comparing the stored
//! value with the address the external tool reported gives the relocation
//! offset for every other address.

use tracing::{debug, info};

use crate::comm::CoreCommunicator;
use crate::core::layout::{MemoryLayout, Offset};
use crate::core::section::SectionKind;
use crate::error::{MoteError, Result};
use crate::resolver::builder::{assemble, SectionSources};
use crate::resolver::mediator::MemoryCopyMediator;

const CALIBRATION_SECTIONS: [SectionKind; 2] = [SectionKind::Data, SectionKind::Bss];

/// Resolve the offset mapping external-tool addresses to live addresses.
///
/// A temporary memory of the data and bss sections is built in raw
/// coordinates and filled from the module; the word held by
/// `reference_symbol` is its live address.
pub fn resolve_reference_offset<C>(
    sources: &SectionSources<'_>,
    comm: &mut C,
    reference_symbol: &str,
    layout: MemoryLayout,
) -> Result<Offset>
where
    C: CoreCommunicator + ?Sized,
{
    let zero = Offset::zero(&layout);
    let (mut calibration, diagnostics) =
        assemble(sources, &CALIBRATION_SECTIONS, "tmp", zero, layout)?;
    if !diagnostics.is_empty() {
        debug!(issues = diagnostics.issues().len(), "Calibration memory incomplete");
    }

    let raw_address = calibration
        .symbol(reference_symbol)
        .map(|sym| sym.address)
        .ok_or_else(|| MoteError::ReferenceSymbolNotFound {
            symbol: reference_symbol.to_string(),
        })?;

    comm.set_reference_address(raw_address);
    MemoryCopyMediator::new(zero).pull(comm, &mut calibration)?;
    let live_address = calibration.word_value_of(reference_symbol)?;

    let offset = Offset::between(raw_address, live_address, &layout);
    info!(
        symbol = reference_symbol,
        raw = format_args!("{:#x}", raw_address),
        live = format_args!("{:#x}", live_address),
        offset = %offset,
        "Resolved reference offset"
    );
    Ok(offset)
}
