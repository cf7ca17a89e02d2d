//! Compiled pattern rules and token extraction helpers.
//!
//! Rule text comes from [`ExternalToolsConfig`]; it is compiled exactly once
//! per module into [`CompiledRules`]. Extraction is always "first line whose
//! rule matches, capture group N".

use regex::Regex;
use tracing::debug;

use crate::config::{ExternalToolsConfig, SectionRule, SettingKey};
use crate::core::section::SectionKind;
use crate::error::{MoteError, Result};

/// A compiled start/extent pair for one section.
#[derive(Debug, Clone, Default)]
pub struct SectionPatterns {
    pub start: Option<Regex>,
    pub extent: Option<Regex>,
}

/// Rule text that is completed with a symbol name before compiling.
#[derive(Debug, Clone)]
pub struct NameTemplate {
    prefix: String,
    suffix: String,
}

impl NameTemplate {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    fn from_parts(prefix: &Option<String>, suffix: &Option<String>) -> Option<Self> {
        match (prefix, suffix) {
            (None, None) => None,
            (p, s) => Some(Self::new(
                p.clone().unwrap_or_default(),
                s.clone().unwrap_or_default(),
            )),
        }
    }

    /// Compile the template for `name`. The name is matched literally.
    pub fn for_symbol(&self, name: &str) -> Option<Regex> {
        let text = format!("{}{}{}", self.prefix, regex::escape(name), self.suffix);
        match Regex::new(&text) {
            Ok(re) => Some(re),
            Err(e) => {
                debug!(symbol = name, error = %e, "Symbol template does not compile");
                None
            }
        }
    }
}

/// Symbol rules for map files.
#[derive(Debug, Clone, Default)]
pub struct MapSymbolPatterns {
    pub record: Option<Regex>,
    pub address: Option<NameTemplate>,
    pub size: Option<NameTemplate>,
}

/// Every rule one module needs, compiled.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub sections: [SectionPatterns; 4],
    pub map_symbols: MapSymbolPatterns,
    pub command_symbols: Option<Regex>,
}

fn compile(key: SettingKey, text: &Option<String>) -> Result<Option<Regex>> {
    text.as_deref()
        .map(|t| {
            Regex::new(t).map_err(|source| MoteError::InvalidPattern {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
}

fn section_keys(kind: SectionKind, command: bool) -> (SettingKey, SettingKey) {
    use SettingKey::*;
    match (kind, command) {
        (SectionKind::Data, false) => (MapfileDataStart, MapfileDataSize),
        (SectionKind::Bss, false) => (MapfileBssStart, MapfileBssSize),
        (SectionKind::Common, false) => (MapfileCommonStart, MapfileCommonSize),
        (SectionKind::Readonly, false) => (MapfileReadonlyStart, MapfileReadonlySize),
        (SectionKind::Data, true) => (CommandDataStart, CommandDataEnd),
        (SectionKind::Bss, true) => (CommandBssStart, CommandBssEnd),
        (SectionKind::Common, true) => (CommandCommonStart, CommandCommonEnd),
        (SectionKind::Readonly, true) => (CommandReadonlyStart, CommandReadonlyEnd),
    }
}

fn compile_section(
    kind: SectionKind,
    rule: &SectionRule,
    command: bool,
) -> Result<SectionPatterns> {
    let (start_key, extent_key) = section_keys(kind, command);
    Ok(SectionPatterns {
        start: compile(start_key, &rule.start)?,
        extent: compile(extent_key, &rule.extent)?,
    })
}

impl CompiledRules {
    /// Compile the rules of the active parsing mode.
    pub fn compile(config: &ExternalToolsConfig) -> Result<Self> {
        let command = config.parse_with_command;
        let sections = [
            compile_section(SectionKind::Data, config.section_rule(SectionKind::Data), command)?,
            compile_section(SectionKind::Bss, config.section_rule(SectionKind::Bss), command)?,
            compile_section(SectionKind::Common, config.section_rule(SectionKind::Common), command)?,
            compile_section(
                SectionKind::Readonly,
                config.section_rule(SectionKind::Readonly),
                command,
            )?,
        ];

        let (map_symbols, command_symbols) = if command {
            (
                MapSymbolPatterns::default(),
                compile(
                    SettingKey::CommandVarNameAddress,
                    &config.command.var_name_address,
                )?,
            )
        } else {
            let map = &config.map;
            let patterns = MapSymbolPatterns {
                record: compile(SettingKey::MapfileVarName, &map.var_name)?,
                address: NameTemplate::from_parts(
                    &map.var_address_prefix,
                    &map.var_address_suffix,
                ),
                size: NameTemplate::from_parts(&map.var_size_prefix, &map.var_size_suffix),
            };
            (patterns, None)
        };

        Ok(Self {
            sections,
            map_symbols,
            command_symbols,
        })
    }

    pub fn section(&self, kind: SectionKind) -> &SectionPatterns {
        let index = match kind {
            SectionKind::Data => 0,
            SectionKind::Bss => 1,
            SectionKind::Common => 2,
            SectionKind::Readonly => 3,
        };
        &self.sections[index]
    }
}

/// Capture group `group` of the first line `pattern` matches.
pub fn first_match_group<'a>(
    lines: &'a [String],
    pattern: &Regex,
    group: usize,
) -> Option<&'a str> {
    lines
        .iter()
        .find_map(|line| pattern.captures(line))
        .and_then(|caps| caps.get(group))
        .map(|m| m.as_str())
}

/// Parse a hex token, with or without a `0x` prefix. Empty tokens are
/// unresolved.
pub fn parse_hex(token: &str) -> Option<u64> {
    let token = token.trim();
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Parse a number written either as `0x` hex or as decimal.
pub fn parse_decoded(token: &str) -> Option<u64> {
    let token = token.trim();
    if token.starts_with("0x") || token.starts_with("0X") {
        parse_hex(token)
    } else {
        token.parse().ok()
    }
}

/// First hex value captured by `pattern` across `lines`.
pub fn first_hex(lines: &[String], pattern: &Regex) -> Option<u64> {
    first_match_group(lines, pattern, 1).and_then(parse_hex)
}
