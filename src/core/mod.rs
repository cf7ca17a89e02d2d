//! Core data types for motemem.
//!
//! Symbols, memory sections, the sectioned mote memory, and the layout and
//! offset types that relate external-tool addresses to live-module ones.

pub mod layout;
pub mod memory;
pub mod section;
pub mod symbol;

pub use layout::{Endianness, MemoryLayout, Offset, WordSize};
pub use memory::{InitialMemory, MoteMemory};
pub use section::{MemorySection, SectionKind};
pub use symbol::{Symbol, SymbolKind};
