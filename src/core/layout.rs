//! Memory layout of a loaded module and the offset between address spaces.
//!
//! External tools report addresses relative to their own idea of the module
//! base ("raw" addresses). The loaded module sees itself at "live"
//! addresses. The two differ by one constant [`Offset`], truncated to the
//! module's native word width.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The byte order of a module's words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    /// Little-endian byte order
    Little,
    /// Big-endian byte order
    Big,
}

/// Native word width of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WordSize {
    W32,
    W64,
}

impl WordSize {
    pub fn bytes(self) -> usize {
        match self {
            WordSize::W32 => 4,
            WordSize::W64 => 8,
        }
    }

    /// Mask selecting the bits an address of this width can hold.
    pub fn mask(self) -> u64 {
        match self {
            WordSize::W32 => 0xFFFF_FFFF,
            WordSize::W64 => u64::MAX,
        }
    }
}

/// Word width plus byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryLayout {
    pub word_size: WordSize,
    pub endianness: Endianness,
}

impl MemoryLayout {
    pub fn new(word_size: WordSize, endianness: Endianness) -> Self {
        Self {
            word_size,
            endianness,
        }
    }

    /// Layout of the host process, which is also the layout of any module it
    /// loads natively.
    pub fn native() -> Self {
        let word_size = if cfg!(target_pointer_width = "64") {
            WordSize::W64
        } else {
            WordSize::W32
        };
        let endianness = if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        };
        Self::new(word_size, endianness)
    }

    pub fn word_bytes(&self) -> usize {
        self.word_size.bytes()
    }

    pub fn mask(&self) -> u64 {
        self.word_size.mask()
    }

    /// Decode one word from the front of `bytes`. Returns `None` when fewer
    /// than a word's worth of bytes are available.
    pub fn decode_word(&self, bytes: &[u8]) -> Option<u64> {
        let n = self.word_bytes();
        let word = bytes.get(..n)?;
        let mut buf = [0u8; 8];
        Some(match self.endianness {
            Endianness::Little => {
                buf[..n].copy_from_slice(word);
                u64::from_le_bytes(buf)
            }
            Endianness::Big => {
                buf[8 - n..].copy_from_slice(word);
                u64::from_be_bytes(buf)
            }
        })
    }

    /// Encode `value` (truncated to the word width) into word-sized bytes.
    pub fn encode_word(&self, value: u64) -> Vec<u8> {
        let n = self.word_bytes();
        let value = value & self.mask();
        match self.endianness {
            Endianness::Little => value.to_le_bytes()[..n].to_vec(),
            Endianness::Big => value.to_be_bytes()[8 - n..].to_vec(),
        }
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self::native()
    }
}

/// Constant correction from raw (external-tool) addresses to live-module
/// addresses: `live = raw + offset`, wrapping at the word width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Offset {
    value: i64,
    mask: u64,
}

impl Offset {
    /// Identity offset, used while still working in raw coordinates.
    pub fn zero(layout: &MemoryLayout) -> Self {
        Self {
            value: 0,
            mask: layout.mask(),
        }
    }

    pub fn new(value: i64, layout: &MemoryLayout) -> Self {
        let mask = layout.mask();
        Self {
            value: ((value as u64) & mask) as i64,
            mask,
        }
    }

    /// Offset such that `raw` maps onto `live`.
    pub fn between(raw: u64, live: u64, layout: &MemoryLayout) -> Self {
        Self::new(live.wrapping_sub(raw) as i64, layout)
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Translate an external-tool address into live-module space.
    pub fn to_live(&self, raw: u64) -> u64 {
        raw.wrapping_add(self.value as u64) & self.mask
    }

    /// Translate a live-module address back into the raw space the core
    /// communicator addresses.
    pub fn to_raw(&self, live: u64) -> u64 {
        live.wrapping_sub(self.value as u64) & self.mask
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.value as u64 & self.mask)
    }
}
