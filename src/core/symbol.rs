//! Symbol type for named entities inside a loaded module.
//!
//! Symbols are produced while parsing an external artifact and are owned by
//! the memory section that lists them. They are never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of symbols a section can list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    /// Data object symbol
    Variable,
    /// Function symbol
    Function,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Variable => write!(f, "Variable"),
            SymbolKind::Function => write!(f, "Function"),
        }
    }
}

/// Named location in a module's memory.
///
/// `address` is expressed in live-module space once the module offset has
/// been applied. A `size` of 0 means the artifact did not report one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub address: u64,
    pub size: u32,
}

impl Symbol {
    /// Create a new Symbol instance
    pub fn new(kind: SymbolKind, name: impl Into<String>, address: u64, size: u32) -> Self {
        Self {
            kind,
            name: name.into(),
            address,
            size,
        }
    }

    /// Shorthand for a variable symbol
    pub fn variable(name: impl Into<String>, address: u64, size: u32) -> Self {
        Self::new(SymbolKind::Variable, name, address, size)
    }

    /// Check if this is a data object symbol
    pub fn is_variable(&self) -> bool {
        self.kind == SymbolKind::Variable
    }

    /// End address (exclusive) of the symbol's extent
    pub fn end_address(&self) -> u64 {
        self.address.wrapping_add(u64::from(self.size))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ {:#x} ({} bytes)",
            self.kind, self.name, self.address, self.size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_creation() {
        let sym = Symbol::variable("counter", 0x1008, 4);
        assert!(sym.is_variable());
        assert_eq!(sym.end_address(), 0x100c);
        assert_eq!(format!("{}", sym), "Variable counter @ 0x1008 (4 bytes)");
    }

    #[test]
    fn test_symbol_serialization() {
        let sym = Symbol::new(SymbolKind::Function, "main", 0x400, 0);
        let json = serde_json::to_string(&sym).unwrap();
        let back: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(sym, back);
    }
}
