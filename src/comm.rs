//! Core communicator: raw byte access into a live loaded module.
//!
//! The host owns the actual loading mechanism; motemem only needs the narrow
//! contract below. Addresses passed to a communicator are raw addresses,
//! i.e. external-tool coordinates.

use crate::error::{MoteError, Result};

/// Raw access to a live native module.
pub trait CoreCommunicator {
    /// Read `length` bytes starting at `raw_address`.
    fn get(&self, raw_address: u64, length: u32) -> Result<Vec<u8>>;

    /// Write `bytes` (exactly `length` of them) starting at `raw_address`.
    fn set(&mut self, raw_address: u64, length: u32, bytes: &[u8]) -> Result<()>;

    /// Advance the module by one step.
    fn tick(&mut self);

    /// Tell the module where the reference symbol lives, before its content
    /// is read back. Hosts that do not need the hint ignore it.
    fn set_reference_address(&mut self, _raw_address: u64) {}
}

type TickHook = Box<dyn FnMut(&mut [u8]) + Send>;

/// In-memory stand-in for a loaded module: one byte buffer mapped at a raw
/// base address.
pub struct BufferCommunicator {
    base: u64,
    memory: Vec<u8>,
    ticks: u64,
    reference_address: Option<u64>,
    on_tick: Option<TickHook>,
}

impl std::fmt::Debug for BufferCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferCommunicator")
            .field("base", &self.base)
            .field("len", &self.memory.len())
            .field("ticks", &self.ticks)
            .field("reference_address", &self.reference_address)
            .finish()
    }
}

impl BufferCommunicator {
    pub fn new(base: u64, memory: Vec<u8>) -> Self {
        Self {
            base,
            memory,
            ticks: 0,
            reference_address: None,
            on_tick: None,
        }
    }

    /// Zero-filled buffer of `len` bytes at `base`.
    pub fn zeroed(base: u64, len: usize) -> Self {
        Self::new(base, vec![0u8; len])
    }

    /// Run `hook` over the whole buffer on every tick.
    pub fn with_tick<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut [u8]) + Send + 'static,
    {
        self.on_tick = Some(Box::new(hook));
        self
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn reference_address(&self) -> Option<u64> {
        self.reference_address
    }

    /// Copy `bytes` into the buffer at `raw_address`, outside the
    /// communicator contract. Used to stage a module's initialised state.
    pub fn poke(&mut self, raw_address: u64, bytes: &[u8]) -> Result<()> {
        let range = self.range(raw_address, bytes.len())?;
        self.memory[range].copy_from_slice(bytes);
        Ok(())
    }

    fn range(&self, raw_address: u64, len: usize) -> Result<std::ops::Range<usize>> {
        let out_of_range = || MoteError::Transfer {
            address: raw_address,
            length: len as u32,
            message: format!(
                "outside module buffer [{:#x}, {:#x})",
                self.base,
                self.base.wrapping_add(self.memory.len() as u64)
            ),
        };
        let start = raw_address
            .checked_sub(self.base)
            .ok_or_else(out_of_range)? as usize;
        let end = start.checked_add(len).ok_or_else(out_of_range)?;
        if end > self.memory.len() {
            return Err(out_of_range());
        }
        Ok(start..end)
    }
}

impl CoreCommunicator for BufferCommunicator {
    fn get(&self, raw_address: u64, length: u32) -> Result<Vec<u8>> {
        let range = self.range(raw_address, length as usize)?;
        Ok(self.memory[range].to_vec())
    }

    fn set(&mut self, raw_address: u64, length: u32, bytes: &[u8]) -> Result<()> {
        if bytes.len() != length as usize {
            return Err(MoteError::Transfer {
                address: raw_address,
                length,
                message: format!("{} bytes supplied", bytes.len()),
            });
        }
        let range = self.range(raw_address, bytes.len())?;
        self.memory[range].copy_from_slice(bytes);
        Ok(())
    }

    fn tick(&mut self) {
        self.ticks += 1;
        if let Some(hook) = self.on_tick.as_mut() {
            hook(&mut self.memory);
        }
    }

    fn set_reference_address(&mut self, raw_address: u64) {
        self.reference_address = Some(raw_address);
    }
}
