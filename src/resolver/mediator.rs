//! Memory copy mediator: moves section bytes between a [`MoteMemory`] and a
//! live module.
//!
//! Sections hold live-module addresses; the communicator takes raw ones.
//! Every transfer translates with the mediator's fixed [`Offset`]. Callers
//! must hold exclusive access to the live module for the duration of a call.

use tracing::trace;

use crate::comm::CoreCommunicator;
use crate::core::layout::Offset;
use crate::core::memory::MoteMemory;
use crate::error::{MoteError, Result};

/// Copies whole snapshots in and out of a live module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCopyMediator {
    offset: Offset,
}

impl MemoryCopyMediator {
    pub fn new(offset: Offset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    /// Overwrite every section of `memory` with the live module's bytes.
    ///
    /// All sections are fetched before any is written, so a failed transfer
    /// leaves `memory` untouched.
    pub fn pull<C>(&self, comm: &C, memory: &mut MoteMemory) -> Result<()>
    where
        C: CoreCommunicator + ?Sized,
    {
        let mut fetched = Vec::with_capacity(memory.sections().len());
        for section in memory.sections() {
            let raw = self.offset.to_raw(section.start_address());
            let size = section.size();
            let bytes = comm.get(raw, size)?;
            if bytes.len() != size as usize {
                return Err(MoteError::Transfer {
                    address: raw,
                    length: size,
                    message: format!("communicator returned {} bytes", bytes.len()),
                });
            }
            trace!(section = section.name(), raw = raw, size = size, "Pulled section");
            fetched.push(bytes);
        }

        for (section, bytes) in memory.sections_mut().iter_mut().zip(fetched) {
            // Lengths were checked above
            section.fill_from(&bytes);
        }
        Ok(())
    }

    /// Write every section of `memory` into the live module.
    pub fn push<C>(&self, comm: &mut C, memory: &MoteMemory) -> Result<()>
    where
        C: CoreCommunicator + ?Sized,
    {
        for section in memory.sections() {
            let raw = self.offset.to_raw(section.start_address());
            comm.set(raw, section.size(), section.data())?;
            trace!(section = section.name(), raw = raw, size = section.size(), "Pushed section");
        }
        Ok(())
    }
}
