//! # Parse Module
//!
//! Reading external artifacts (linker map files, parse-command output) and
//! extracting section triples from them with configurable pattern rules.

pub mod artifact;
pub mod patterns;
pub mod source;

pub use artifact::{Artifact, ArtifactOrigin};
pub use patterns::{CompiledRules, NameTemplate};
pub use source::{command_symbols, CommandSymbols, ParsedSection, SectionSource, Unresolved};
