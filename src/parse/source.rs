//! Section sources: extracting one section's start, size and symbols from
//! an external artifact.
//!
//! Two strategies exist. Map files report a section's size directly and
//! list symbols with addresses that are range-checked against the section.
//! Command output reports start and end markers; the size is their
//! difference, and symbols are collected once per artifact from every line,
//! deduplicated by name, and shared by all sections.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::core::layout::Offset;
use crate::core::section::SectionKind;
use crate::core::symbol::Symbol;
use crate::parse::artifact::Artifact;
use crate::parse::patterns::{
    first_hex, first_match_group, parse_decoded, parse_hex, CompiledRules, MapSymbolPatterns,
    SectionPatterns,
};

/// Raw triple extracted for one section, before the section descriptor is
/// built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSection {
    pub kind: SectionKind,
    /// Start in external-tool coordinates
    pub start: u64,
    pub size: u32,
    /// Symbols, already expressed in live-module coordinates
    pub symbols: Vec<Symbol>,
}

/// Why a section could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    NoStartRule,
    NoExtentRule,
    StartNotFound,
    ExtentNotFound,
    /// End marker at or before the start marker
    NegativeSize,
    EmptySection,
    /// Size does not fit the 32-bit section size
    Oversized,
}

impl std::fmt::Display for Unresolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Unresolved::NoStartRule => "no start rule configured",
            Unresolved::NoExtentRule => "no size/end rule configured",
            Unresolved::StartNotFound => "start rule matched nothing",
            Unresolved::ExtentNotFound => "size/end rule matched nothing",
            Unresolved::NegativeSize => "end precedes start",
            Unresolved::EmptySection => "section is empty",
            Unresolved::Oversized => "section size exceeds 32 bits",
        };
        f.write_str(text)
    }
}

/// Outcome of deduplicating command symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSymbols {
    /// One symbol per name, in order of first sighting
    pub symbols: Vec<Symbol>,
    /// Repeat sightings with the same address
    pub duplicates: usize,
    /// Repeat sightings with a different address; those are discarded
    pub mismatches: usize,
}

/// Map-file strategy.
#[derive(Debug, Clone)]
pub struct MapSectionSource<'a> {
    artifact: &'a Artifact,
    patterns: &'a SectionPatterns,
    symbols: &'a MapSymbolPatterns,
}

/// Command-output strategy.
#[derive(Debug, Clone)]
pub struct CommandSectionSource<'a> {
    artifact: &'a Artifact,
    patterns: &'a SectionPatterns,
    symbols: Option<Arc<CommandSymbols>>,
}

/// One logical section's extraction strategy.
#[derive(Debug, Clone)]
pub enum SectionSource<'a> {
    Map(MapSectionSource<'a>),
    Command(CommandSectionSource<'a>),
}

impl<'a> SectionSource<'a> {
    pub fn map(
        artifact: &'a Artifact,
        patterns: &'a SectionPatterns,
        symbols: &'a MapSymbolPatterns,
    ) -> Self {
        SectionSource::Map(MapSectionSource {
            artifact,
            patterns,
            symbols,
        })
    }

    /// `symbols` is the artifact's deduplicated symbol table, shared by
    /// every command section of the same artifact.
    pub fn command(
        artifact: &'a Artifact,
        patterns: &'a SectionPatterns,
        symbols: Option<Arc<CommandSymbols>>,
    ) -> Self {
        SectionSource::Command(CommandSectionSource {
            artifact,
            patterns,
            symbols,
        })
    }

    /// Source for `kind` under the parsing mode the rules were compiled for.
    /// Command sources take the shared table from `symbols`.
    pub fn for_kind(
        artifact: &'a Artifact,
        rules: &'a CompiledRules,
        kind: SectionKind,
        symbols: Option<&Arc<CommandSymbols>>,
        command: bool,
    ) -> Self {
        let patterns = rules.section(kind);
        if command {
            Self::command(artifact, patterns, symbols.cloned())
        } else {
            Self::map(artifact, patterns, &rules.map_symbols)
        }
    }

    /// Shared command symbol table, if this is a command source that has one.
    pub fn command_symbols(&self) -> Option<&Arc<CommandSymbols>> {
        match self {
            SectionSource::Map(_) => None,
            SectionSource::Command(s) => s.symbols.as_ref(),
        }
    }

    fn lines(&self) -> &'a [String] {
        match self {
            SectionSource::Map(s) => s.artifact.lines(),
            SectionSource::Command(s) => s.artifact.lines(),
        }
    }

    fn patterns(&self) -> &'a SectionPatterns {
        match self {
            SectionSource::Map(s) => s.patterns,
            SectionSource::Command(s) => s.patterns,
        }
    }

    /// Section start in external-tool coordinates.
    pub fn start_address(&self) -> Result<u64, Unresolved> {
        let rule = self.patterns().start.as_ref().ok_or(Unresolved::NoStartRule)?;
        first_hex(self.lines(), rule).ok_or(Unresolved::StartNotFound)
    }

    /// Section size in bytes.
    pub fn size(&self) -> Result<u32, Unresolved> {
        let rule = self.patterns().extent.as_ref().ok_or(Unresolved::NoExtentRule)?;
        let size = match self {
            SectionSource::Map(_) => {
                first_hex(self.lines(), rule).ok_or(Unresolved::ExtentNotFound)?
            }
            SectionSource::Command(_) => {
                let start = self.start_address()?;
                let end = first_hex(self.lines(), rule).ok_or(Unresolved::ExtentNotFound)?;
                if end < start {
                    return Err(Unresolved::NegativeSize);
                }
                end - start
            }
        };
        if size == 0 {
            return Err(Unresolved::EmptySection);
        }
        u32::try_from(size).map_err(|_| Unresolved::Oversized)
    }

    /// Extract the section triple, with symbols moved into live coordinates
    /// by `offset`.
    pub fn parse(&self, kind: SectionKind, offset: Offset) -> Result<ParsedSection, Unresolved> {
        let start = self.start_address()?;
        let size = self.size()?;

        let symbols = match self {
            SectionSource::Map(s) => map_symbols_in_range(
                s.artifact.lines(),
                s.symbols,
                start,
                start.saturating_add(u64::from(size)),
                offset,
            ),
            SectionSource::Command(s) => match &s.symbols {
                Some(found) => found
                    .symbols
                    .iter()
                    .map(|sym| Symbol {
                        address: offset.to_live(sym.address),
                        ..sym.clone()
                    })
                    .collect(),
                None => {
                    debug!(section = %kind, "No symbol rule configured for command output");
                    Vec::new()
                }
            },
        };

        Ok(ParsedSection {
            kind,
            start,
            size,
            symbols,
        })
    }
}

/// Scan map-file lines for symbol records whose address lies within
/// `[start, end]` (external coordinates, end inclusive).
pub fn map_symbols_in_range(
    lines: &[String],
    patterns: &MapSymbolPatterns,
    start: u64,
    end: u64,
    offset: Offset,
) -> Vec<Symbol> {
    let Some(record) = patterns.record.as_ref() else {
        debug!("No symbol record rule configured for map file");
        return Vec::new();
    };

    let mut symbols = Vec::new();
    for line in lines {
        let Some(caps) = record.captures(line) else {
            continue;
        };
        let (Some(addr), Some(name)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(record_address) = parse_hex(addr.as_str()) else {
            continue;
        };
        if record_address < start || record_address > end {
            continue;
        }

        let name = name.as_str();
        let address = patterns
            .address
            .as_ref()
            .and_then(|tpl| tpl.for_symbol(name))
            .and_then(|re| first_hex(lines, &re))
            .unwrap_or(record_address);
        let size = patterns
            .size
            .as_ref()
            .and_then(|tpl| tpl.for_symbol(name))
            .and_then(|re| first_match_group(lines, &re, 1).and_then(parse_decoded))
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(0);

        symbols.push(Symbol::variable(name, offset.to_live(address), size));
    }
    symbols
}

/// Collect `(address, name)` records from command output, keeping the first
/// sighting of every name.
pub fn command_symbols(lines: &[String], rule: &Regex) -> CommandSymbols {
    let mut result = CommandSymbols::default();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for line in lines {
        let Some(caps) = rule.captures(line) else {
            continue;
        };
        let (Some(addr), Some(name)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(address) = parse_hex(addr.as_str()) else {
            continue;
        };
        let name = name.as_str();

        match seen.get(name) {
            None => {
                seen.insert(name.to_string(), result.symbols.len());
                result.symbols.push(Symbol::variable(name, address, 1));
            }
            Some(&index) => {
                if result.symbols[index].address == address {
                    result.duplicates += 1;
                } else {
                    result.mismatches += 1;
                }
            }
        }
    }

    if result.mismatches > 0 {
        warn!(
            symbols = result.symbols.len(),
            duplicates = result.duplicates,
            mismatches = result.mismatches,
            "Command output lists symbols at conflicting addresses"
        );
    } else {
        debug!(
            symbols = result.symbols.len(),
            duplicates = result.duplicates,
            "Parsed command symbols"
        );
    }
    result
}
