//! Sectioned mote memory and the initial-memory template.
//!
//! A [`MoteMemory`] is an ordered set of non-overlapping [`MemorySection`]s
//! in live-module coordinates. The [`InitialMemory`] wraps the one memory
//! captured right after a module initialised itself; it is only ever cloned.

use crate::core::layout::MemoryLayout;
use crate::core::section::MemorySection;
use crate::core::symbol::Symbol;
use crate::error::{MoteError, Result};

/// Ordered collection of memory sections with disjoint address ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoteMemory {
    layout: MemoryLayout,
    sections: Vec<MemorySection>,
}

impl MoteMemory {
    pub fn new(layout: MemoryLayout) -> Self {
        Self {
            layout,
            sections: Vec::new(),
        }
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Append a section, rejecting it if it overlaps one already present.
    pub fn add_section(&mut self, section: MemorySection) -> Result<()> {
        if let Some(existing) = self.sections.iter().find(|s| s.overlaps(&section)) {
            return Err(MoteError::AddressRangeOverlap {
                first: existing.name().to_string(),
                first_start: existing.start_address(),
                first_end: existing.end_address(),
                second: section.name().to_string(),
                second_start: section.start_address(),
                second_end: section.end_address(),
            });
        }
        self.sections.push(section);
        Ok(())
    }

    pub fn sections(&self) -> &[MemorySection] {
        &self.sections
    }

    pub fn sections_mut(&mut self) -> &mut [MemorySection] {
        &mut self.sections
    }

    pub fn section(&self, name: &str) -> Option<&MemorySection> {
        self.sections.iter().find(|s| s.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sum of all section sizes
    pub fn total_size(&self) -> u64 {
        self.sections.iter().map(|s| u64::from(s.size())).sum()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.sections.iter().flat_map(|s| s.symbols().iter())
    }

    /// Look a symbol up by name.
    ///
    /// Some tools list the same symbol under several sections; a listing from
    /// the section that actually contains the address wins.
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        let mut fallback = None;
        for section in &self.sections {
            if let Some(sym) = section.symbol(name) {
                if section.contains(sym.address) {
                    return Some(sym);
                }
                fallback.get_or_insert(sym);
            }
        }
        fallback
    }

    pub fn variable_address(&self, name: &str) -> Result<u64> {
        self.symbol(name)
            .map(|s| s.address)
            .ok_or_else(|| MoteError::UnknownVariable(name.to_string()))
    }

    fn section_for(&self, address: u64, len: usize) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.contains_range(address, len))
    }

    /// Read `len` bytes at live address `address`.
    pub fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        self.section_for(address, len)
            .and_then(|i| self.sections[i].read(address, len))
            .map(<[u8]>::to_vec)
            .ok_or(MoteError::AddressOutOfRange {
                address,
                length: len,
            })
    }

    /// Write `bytes` at live address `address`.
    pub fn write_bytes(&mut self, address: u64, bytes: &[u8]) -> Result<()> {
        let index = self
            .section_for(address, bytes.len())
            .ok_or(MoteError::AddressOutOfRange {
                address,
                length: bytes.len(),
            })?;
        self.sections[index].write(address, bytes);
        Ok(())
    }

    /// Read a native word stored in variable `name`.
    pub fn word_value_of(&self, name: &str) -> Result<u64> {
        let address = self.variable_address(name)?;
        let bytes = self.read_bytes(address, self.layout.word_bytes())?;
        self.layout
            .decode_word(&bytes)
            .ok_or(MoteError::AddressOutOfRange {
                address,
                length: self.layout.word_bytes(),
            })
    }

    /// Store a native word into variable `name`.
    pub fn set_word_value_of(&mut self, name: &str, value: u64) -> Result<()> {
        let address = self.variable_address(name)?;
        let bytes = self.layout.encode_word(value);
        self.write_bytes(address, &bytes)
    }

    /// Read `len` bytes starting at variable `name`.
    pub fn byte_array_of(&self, name: &str, len: usize) -> Result<Vec<u8>> {
        let address = self.variable_address(name)?;
        self.read_bytes(address, len)
    }
}

/// Template memory captured right after a module ran its own initialisation.
#[derive(Debug)]
pub struct InitialMemory {
    template: MoteMemory,
}

impl InitialMemory {
    pub(crate) fn new(template: MoteMemory) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &MoteMemory {
        &self.template
    }

    /// Fresh, independent memory for a new mote instance.
    pub fn instantiate(&self) -> MoteMemory {
        self.template.clone()
    }
}
