//! motemem: address-space resolution and initial memory capture for native
//! mote modules.
//!
//! A module compiled from sensor-node firmware is loaded into the host
//! process at an unpredictable address. Its linker map file (or the output
//! of a symbol-listing command) tells where `.data`, `.bss`, common and
//! readonly storage sit relative to the file; a reference variable that
//! stores its own address tells how far the loader moved them. With that
//! offset the module's writable state can be copied out as an initial
//! snapshot, cloned per simulated mote, and swapped in and out on every
//! step.

/// Core communicator contract and an in-memory implementation
pub mod comm;
/// External-tool configuration
pub mod config;
/// Core data types module
pub mod core;
pub mod error;
pub mod hashing;
pub mod logging;
pub mod module;
/// Artifact loading and section extraction
pub mod parse;
/// Offset resolution, snapshot building and memory transfer
pub mod resolver;
pub mod timeout;

pub use comm::{BufferCommunicator, CoreCommunicator};
pub use config::{ExternalToolsConfig, SettingKey};
pub use crate::core::{
    Endianness, InitialMemory, MemoryLayout, MemorySection, MoteMemory, Offset, SectionKind,
    Symbol, SymbolKind, WordSize,
};
pub use error::{MoteError, Result};
pub use module::NativeModule;
pub use parse::{Artifact, SectionSource};
pub use resolver::{BuildDiagnostics, InitialMemoryBuilder, MemoryCopyMediator, SoftIssue};
