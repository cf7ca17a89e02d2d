//! Memory section: one contiguous byte range of a module plus its symbols.
//!
//! Cloning a section deep-copies its byte buffer while the symbol list is
//! shared, since symbols are immutable once parsed.

use std::fmt;
use std::sync::Arc;

use crate::core::symbol::Symbol;

/// The logical sections a module snapshot is built from, in build order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Data,
    Bss,
    Common,
    Readonly,
}

impl SectionKind {
    pub const ALL: [SectionKind; 4] = [
        SectionKind::Data,
        SectionKind::Bss,
        SectionKind::Common,
        SectionKind::Readonly,
    ];

    /// Name the section carries inside a snapshot
    pub fn section_name(self) -> &'static str {
        match self {
            SectionKind::Data => ".data",
            SectionKind::Bss => ".bss",
            SectionKind::Common => "common",
            SectionKind::Readonly => "readonly",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section_name())
    }
}

/// A contiguous region of module memory in live-module coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySection {
    name: String,
    start: u64,
    data: Vec<u8>,
    symbols: Arc<[Symbol]>,
}

impl MemorySection {
    /// Create a zero-filled section of `size` bytes at `start`.
    pub fn new(name: impl Into<String>, start: u64, size: u32, symbols: Vec<Symbol>) -> Self {
        Self {
            name: name.into(),
            start,
            data: vec![0u8; size as usize],
            symbols: symbols.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_address(&self) -> u64 {
        self.start
    }

    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    /// End address (exclusive)
    pub fn end_address(&self) -> u64 {
        self.start.saturating_add(self.data.len() as u64)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Find a listed symbol by name
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// Whether two sections share the same symbol storage
    pub fn shares_symbols_with(&self, other: &MemorySection) -> bool {
        Arc::ptr_eq(&self.symbols, &other.symbols)
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end_address()
    }

    /// Whether `[address, address + len)` lies entirely inside this section
    pub fn contains_range(&self, address: u64, len: usize) -> bool {
        match address.checked_add(len as u64) {
            Some(end) => address >= self.start && end <= self.end_address(),
            None => false,
        }
    }

    pub fn overlaps(&self, other: &MemorySection) -> bool {
        self.start < other.end_address() && other.start < self.end_address()
    }

    /// Borrow `len` bytes at live address `address`
    pub fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
        if !self.contains_range(address, len) {
            return None;
        }
        let from = (address - self.start) as usize;
        self.data.get(from..from + len)
    }

    /// Overwrite bytes at live address `address`; returns false if the write
    /// would leave the section.
    pub fn write(&mut self, address: u64, bytes: &[u8]) -> bool {
        if !self.contains_range(address, bytes.len()) {
            return false;
        }
        let from = (address - self.start) as usize;
        self.data[from..from + bytes.len()].copy_from_slice(bytes);
        true
    }

    /// Replace the whole buffer. The length must match the section size.
    pub(crate) fn fill_from(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() != self.data.len() {
            return false;
        }
        self.data.copy_from_slice(bytes);
        true
    }

    /// Symbols whose address falls outside the section's range
    pub fn foreign_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(move |s| !self.contains(s.address))
    }
}

impl fmt::Display for MemorySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:#x}, {:#x}) {} bytes, {} symbols",
            self.name,
            self.start,
            self.end_address(),
            self.data.len(),
            self.symbols.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemorySection {
        MemorySection::new(
            ".data",
            0x1000,
            0x10,
            vec![
                Symbol::variable("a", 0x1000, 4),
                Symbol::variable("b", 0x1004, 4),
                Symbol::variable("elsewhere", 0x9000, 4),
            ],
        )
    }

    #[test]
    fn test_section_creation() {
        let section = sample();
        assert_eq!(section.size(), 0x10);
        assert_eq!(section.data().len(), 0x10);
        assert_eq!(section.end_address(), 0x1010);
        assert_eq!(section.symbol("b").unwrap().address, 0x1004);
        assert_eq!(section.foreign_symbols().count(), 1);
        assert_eq!(
            format!("{}", section),
            ".data [0x1000, 0x1010) 16 bytes, 3 symbols"
        );
    }

    #[test]
    fn test_read_write_bounds() {
        let mut section = sample();
        assert!(section.write(0x1004, &[1, 2, 3, 4]));
        assert_eq!(section.read(0x1004, 4).unwrap(), &[1, 2, 3, 4]);
        assert!(!section.write(0x100e, &[0; 4]));
        assert!(section.read(0x0fff, 2).is_none());
        assert!(section.read(u64::MAX, 2).is_none());
    }

    #[test]
    fn test_clone_is_deep_for_bytes_shared_for_symbols() {
        let original = sample();
        let mut copy = original.clone();
        copy.data_mut()[0] = 0xAA;
        assert_eq!(original.data()[0], 0);
        assert!(copy.shares_symbols_with(&original));
    }

    #[test]
    fn test_overlap() {
        let a = MemorySection::new("a", 0x1000, 0x10, vec![]);
        let b = MemorySection::new("b", 0x1010, 0x10, vec![]);
        let c = MemorySection::new("c", 0x100f, 0x2, vec![]);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }
}
