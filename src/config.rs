//! External-tool configuration.
//!
//! All pattern rules used to read map files and parse-command output live in
//! one [`ExternalToolsConfig`] value that is passed explicitly to whatever
//! needs it. Every recognised setting has a [`SettingKey`]; keyed access is
//! provided for hosts that store settings as flat key/value pairs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::core::layout::MemoryLayout;
use crate::core::section::SectionKind;
use crate::error::{MoteError, Result};
use crate::timeout::DEFAULT_COMMAND_TIMEOUT_SECONDS;

// KEY = VALUE; the value runs to the end of the line and may contain '='
static SETTING_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9_]+)\s*=\s*(.*)$").expect("valid setting line regex"));

/// Placeholder in the parse command replaced by the module's file name
pub const LIBFILE_PLACEHOLDER: &str = "$(LIBFILE)";

/// Conventional name of the calibration variable
pub const DEFAULT_REFERENCE_SYMBOL: &str = "referenceVar";

/// Pair of rules locating one section.
///
/// For map files `extent` captures the section size; for command output it
/// captures the section's end address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRule {
    pub start: Option<String>,
    pub extent: Option<String>,
}

impl SectionRule {
    fn new(start: &str, extent: &str) -> Self {
        Self {
            start: Some(start.to_string()),
            extent: Some(extent.to_string()),
        }
    }
}

/// Rules for linker map files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapFileRules {
    pub data: SectionRule,
    pub bss: SectionRule,
    pub common: SectionRule,
    pub readonly: SectionRule,
    /// Symbol record: group 1 address, group 2 name
    pub var_name: Option<String>,
    /// Text placed before/after the escaped symbol name to re-resolve its
    /// address (group 1, hex)
    pub var_address_prefix: Option<String>,
    pub var_address_suffix: Option<String>,
    /// Text placed before/after the escaped symbol name to resolve its size
    /// (group 1, `0x` hex or decimal)
    pub var_size_prefix: Option<String>,
    pub var_size_suffix: Option<String>,
}

impl Default for MapFileRules {
    fn default() -> Self {
        Self {
            data: SectionRule::new(
                r"^\.data[ \t]+0x([0-9A-Fa-f]+)[ \t]+0x[0-9A-Fa-f]+",
                r"^\.data[ \t]+0x[0-9A-Fa-f]+[ \t]+0x([0-9A-Fa-f]+)",
            ),
            bss: SectionRule::new(
                r"^\.bss[ \t]+0x([0-9A-Fa-f]+)[ \t]+0x[0-9A-Fa-f]+",
                r"^\.bss[ \t]+0x[0-9A-Fa-f]+[ \t]+0x([0-9A-Fa-f]+)",
            ),
            // COMMON blocks are folded into .bss by GNU ld
            common: SectionRule::default(),
            readonly: SectionRule::default(),
            var_name: Some(
                r"^[ \t]+(0x[0-9A-Fa-f]+)[ \t]+([A-Za-z_][A-Za-z0-9_.$]*)[ \t]*$".to_string(),
            ),
            var_address_prefix: Some(r"^[ \t]+0x([0-9A-Fa-f]+)[ \t]+".to_string()),
            var_address_suffix: Some(r"[ \t]*$".to_string()),
            var_size_prefix: Some(r"^[ \t]*\.(?:data|bss|rodata)\.".to_string()),
            var_size_suffix: Some(r"[ \t]+0x[0-9A-Fa-f]+[ \t]+(0x[0-9A-Fa-f]+)".to_string()),
        }
    }
}

/// Rules for the output of the configured parse command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandRules {
    pub data: SectionRule,
    pub bss: SectionRule,
    pub common: SectionRule,
    pub readonly: SectionRule,
    /// Symbol record: group 1 address, group 2 name
    pub var_name_address: Option<String>,
}

impl Default for CommandRules {
    fn default() -> Self {
        Self {
            data: SectionRule::new(
                r"^([0-9A-Fa-f]+)[ \t]d[ \t]\.data$",
                r"^([0-9A-Fa-f]+)[ \t]D[ \t]_edata$",
            ),
            bss: SectionRule::new(
                r"^([0-9A-Fa-f]+)[ \t][Bb][ \t]__bss_start$",
                r"^([0-9A-Fa-f]+)[ \t][Bb][ \t]_end$",
            ),
            common: SectionRule::default(),
            readonly: SectionRule::new(
                r"^([0-9A-Fa-f]+)[ \t]r[ \t]\.rodata$",
                r"^([0-9A-Fa-f]+)[ \t]r[ \t]\.eh_frame_hdr$",
            ),
            var_name_address: Some(
                r"^([0-9A-Fa-f]+)[ \t][DdBbCcRr][ \t]([^ .][^ ]*)$".to_string(),
            ),
        }
    }
}

/// Complete configuration for resolving one module's memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalToolsConfig {
    /// Parse command output instead of a linker map file
    pub parse_with_command: bool,
    /// Command template; `$(LIBFILE)` is replaced by the module file name
    pub parse_command: Option<String>,
    /// Upper bound on the parse command's run time
    pub command_timeout_secs: u64,
    /// Variable used to calibrate the offset
    pub reference_symbol: String,
    pub layout: MemoryLayout,
    pub map: MapFileRules,
    pub command: CommandRules,
}

impl Default for ExternalToolsConfig {
    fn default() -> Self {
        Self {
            parse_with_command: false,
            parse_command: Some(format!("nm -a {}", LIBFILE_PLACEHOLDER)),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECONDS,
            reference_symbol: DEFAULT_REFERENCE_SYMBOL.to_string(),
            layout: MemoryLayout::native(),
            map: MapFileRules::default(),
            command: CommandRules::default(),
        }
    }
}

/// Every setting [`ExternalToolsConfig`] recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    ParseWithCommand,
    ParseCommand,
    CommandTimeout,
    ReferenceSymbol,
    MapfileDataStart,
    MapfileDataSize,
    MapfileBssStart,
    MapfileBssSize,
    MapfileCommonStart,
    MapfileCommonSize,
    MapfileReadonlyStart,
    MapfileReadonlySize,
    MapfileVarName,
    MapfileVarAddress1,
    MapfileVarAddress2,
    MapfileVarSize1,
    MapfileVarSize2,
    CommandDataStart,
    CommandDataEnd,
    CommandBssStart,
    CommandBssEnd,
    CommandCommonStart,
    CommandCommonEnd,
    CommandReadonlyStart,
    CommandReadonlyEnd,
    CommandVarNameAddress,
}

impl SettingKey {
    pub const ALL: [SettingKey; 26] = [
        SettingKey::ParseWithCommand,
        SettingKey::ParseCommand,
        SettingKey::CommandTimeout,
        SettingKey::ReferenceSymbol,
        SettingKey::MapfileDataStart,
        SettingKey::MapfileDataSize,
        SettingKey::MapfileBssStart,
        SettingKey::MapfileBssSize,
        SettingKey::MapfileCommonStart,
        SettingKey::MapfileCommonSize,
        SettingKey::MapfileReadonlyStart,
        SettingKey::MapfileReadonlySize,
        SettingKey::MapfileVarName,
        SettingKey::MapfileVarAddress1,
        SettingKey::MapfileVarAddress2,
        SettingKey::MapfileVarSize1,
        SettingKey::MapfileVarSize2,
        SettingKey::CommandDataStart,
        SettingKey::CommandDataEnd,
        SettingKey::CommandBssStart,
        SettingKey::CommandBssEnd,
        SettingKey::CommandCommonStart,
        SettingKey::CommandCommonEnd,
        SettingKey::CommandReadonlyStart,
        SettingKey::CommandReadonlyEnd,
        SettingKey::CommandVarNameAddress,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::ParseWithCommand => "PARSE_WITH_COMMAND",
            SettingKey::ParseCommand => "PARSE_COMMAND",
            SettingKey::CommandTimeout => "COMMAND_TIMEOUT",
            SettingKey::ReferenceSymbol => "REFERENCE_SYMBOL",
            SettingKey::MapfileDataStart => "MAPFILE_DATA_START",
            SettingKey::MapfileDataSize => "MAPFILE_DATA_SIZE",
            SettingKey::MapfileBssStart => "MAPFILE_BSS_START",
            SettingKey::MapfileBssSize => "MAPFILE_BSS_SIZE",
            SettingKey::MapfileCommonStart => "MAPFILE_COMMON_START",
            SettingKey::MapfileCommonSize => "MAPFILE_COMMON_SIZE",
            SettingKey::MapfileReadonlyStart => "MAPFILE_READONLY_START",
            SettingKey::MapfileReadonlySize => "MAPFILE_READONLY_SIZE",
            SettingKey::MapfileVarName => "MAPFILE_VAR_NAME",
            SettingKey::MapfileVarAddress1 => "MAPFILE_VAR_ADDRESS_1",
            SettingKey::MapfileVarAddress2 => "MAPFILE_VAR_ADDRESS_2",
            SettingKey::MapfileVarSize1 => "MAPFILE_VAR_SIZE_1",
            SettingKey::MapfileVarSize2 => "MAPFILE_VAR_SIZE_2",
            SettingKey::CommandDataStart => "COMMAND_DATA_START",
            SettingKey::CommandDataEnd => "COMMAND_DATA_END",
            SettingKey::CommandBssStart => "COMMAND_BSS_START",
            SettingKey::CommandBssEnd => "COMMAND_BSS_END",
            SettingKey::CommandCommonStart => "COMMAND_COMMON_START",
            SettingKey::CommandCommonEnd => "COMMAND_COMMON_END",
            SettingKey::CommandReadonlyStart => "COMMAND_READONLY_START",
            SettingKey::CommandReadonlyEnd => "COMMAND_READONLY_END",
            SettingKey::CommandVarNameAddress => "COMMAND_VAR_NAME_ADDRESS",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = MoteError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim();
        // Older settings files name the command end markers *_SIZE
        let alias = match key {
            "COMMAND_DATA_SIZE" => Some(SettingKey::CommandDataEnd),
            "COMMAND_BSS_SIZE" => Some(SettingKey::CommandBssEnd),
            "COMMAND_COMMON_SIZE" => Some(SettingKey::CommandCommonEnd),
            "COMMAND_READONLY_SIZE" => Some(SettingKey::CommandReadonlyEnd),
            _ => None,
        };
        alias
            .or_else(|| SettingKey::ALL.iter().copied().find(|k| k.as_str() == key))
            .ok_or_else(|| MoteError::InvalidConfig(format!("unknown setting key '{}'", key)))
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl ExternalToolsConfig {
    /// Load a configuration from a JSON document. Missing fields keep their
    /// defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no setting could have produced: a zero command timeout
    /// or an empty reference symbol.
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(MoteError::InvalidConfig(format!(
                "{} must be at least one second",
                SettingKey::CommandTimeout
            )));
        }
        if self.reference_symbol.trim().is_empty() {
            return Err(MoteError::InvalidConfig(format!(
                "{} cannot be empty",
                SettingKey::ReferenceSymbol
            )));
        }
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rule pair for `kind` under the active parsing mode.
    pub fn section_rule(&self, kind: SectionKind) -> &SectionRule {
        let rules = if self.parse_with_command {
            [
                &self.command.data,
                &self.command.bss,
                &self.command.common,
                &self.command.readonly,
            ]
        } else {
            [
                &self.map.data,
                &self.map.bss,
                &self.map.common,
                &self.map.readonly,
            ]
        };
        match kind {
            SectionKind::Data => rules[0],
            SectionKind::Bss => rules[1],
            SectionKind::Common => rules[2],
            SectionKind::Readonly => rules[3],
        }
    }

    fn rule_slot(&mut self, key: SettingKey) -> Option<&mut Option<String>> {
        use SettingKey::*;
        Some(match key {
            ParseCommand => &mut self.parse_command,
            MapfileDataStart => &mut self.map.data.start,
            MapfileDataSize => &mut self.map.data.extent,
            MapfileBssStart => &mut self.map.bss.start,
            MapfileBssSize => &mut self.map.bss.extent,
            MapfileCommonStart => &mut self.map.common.start,
            MapfileCommonSize => &mut self.map.common.extent,
            MapfileReadonlyStart => &mut self.map.readonly.start,
            MapfileReadonlySize => &mut self.map.readonly.extent,
            MapfileVarName => &mut self.map.var_name,
            MapfileVarAddress1 => &mut self.map.var_address_prefix,
            MapfileVarAddress2 => &mut self.map.var_address_suffix,
            MapfileVarSize1 => &mut self.map.var_size_prefix,
            MapfileVarSize2 => &mut self.map.var_size_suffix,
            CommandDataStart => &mut self.command.data.start,
            CommandDataEnd => &mut self.command.data.extent,
            CommandBssStart => &mut self.command.bss.start,
            CommandBssEnd => &mut self.command.bss.extent,
            CommandCommonStart => &mut self.command.common.start,
            CommandCommonEnd => &mut self.command.common.extent,
            CommandReadonlyStart => &mut self.command.readonly.start,
            CommandReadonlyEnd => &mut self.command.readonly.extent,
            CommandVarNameAddress => &mut self.command.var_name_address,
            ParseWithCommand | CommandTimeout | ReferenceSymbol => return None,
        })
    }

    /// Current value of `key`, rendered as text. `None` when unset.
    pub fn get(&self, key: SettingKey) -> Option<String> {
        match key {
            SettingKey::ParseWithCommand => Some(self.parse_with_command.to_string()),
            SettingKey::CommandTimeout => Some(self.command_timeout_secs.to_string()),
            SettingKey::ReferenceSymbol => Some(self.reference_symbol.clone()),
            _ => self.rule_value(key).map(str::to_string),
        }
    }

    fn rule_value(&self, key: SettingKey) -> Option<&str> {
        use SettingKey::*;
        let slot = match key {
            ParseCommand => &self.parse_command,
            MapfileDataStart => &self.map.data.start,
            MapfileDataSize => &self.map.data.extent,
            MapfileBssStart => &self.map.bss.start,
            MapfileBssSize => &self.map.bss.extent,
            MapfileCommonStart => &self.map.common.start,
            MapfileCommonSize => &self.map.common.extent,
            MapfileReadonlyStart => &self.map.readonly.start,
            MapfileReadonlySize => &self.map.readonly.extent,
            MapfileVarName => &self.map.var_name,
            MapfileVarAddress1 => &self.map.var_address_prefix,
            MapfileVarAddress2 => &self.map.var_address_suffix,
            MapfileVarSize1 => &self.map.var_size_prefix,
            MapfileVarSize2 => &self.map.var_size_suffix,
            CommandDataStart => &self.command.data.start,
            CommandDataEnd => &self.command.data.extent,
            CommandBssStart => &self.command.bss.start,
            CommandBssEnd => &self.command.bss.extent,
            CommandCommonStart => &self.command.common.start,
            CommandCommonEnd => &self.command.common.extent,
            CommandReadonlyStart => &self.command.readonly.start,
            CommandReadonlyEnd => &self.command.readonly.extent,
            CommandVarNameAddress => &self.command.var_name_address,
            ParseWithCommand | CommandTimeout | ReferenceSymbol => return None,
        };
        slot.as_deref()
    }

    /// Set `key` from text. An empty value clears a rule.
    pub fn set(&mut self, key: SettingKey, value: &str) -> Result<()> {
        match key {
            SettingKey::ParseWithCommand => {
                self.parse_with_command = value.trim().parse().map_err(|_| {
                    MoteError::InvalidConfig(format!("{} expects true/false, got '{}'", key, value))
                })?;
            }
            SettingKey::CommandTimeout => {
                let seconds: u64 = value.trim().parse().map_err(|_| {
                    MoteError::InvalidConfig(format!("{} expects seconds, got '{}'", key, value))
                })?;
                if seconds == 0 {
                    return Err(MoteError::InvalidConfig(format!(
                        "{} must be at least one second",
                        key
                    )));
                }
                self.command_timeout_secs = seconds;
            }
            SettingKey::ReferenceSymbol => {
                let name = value.trim();
                if name.is_empty() {
                    return Err(MoteError::InvalidConfig(format!("{} cannot be empty", key)));
                }
                self.reference_symbol = name.to_string();
            }
            _ => {
                if let Some(slot) = self.rule_slot(key) {
                    *slot = non_empty(value);
                }
            }
        }
        Ok(())
    }

    /// Apply `KEY = VALUE` lines; blank lines and `#` comments are skipped.
    pub fn apply_settings(&mut self, text: &str) -> Result<()> {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let caps = SETTING_LINE.captures(line).ok_or_else(|| {
                MoteError::InvalidConfig(format!("expected KEY = VALUE, got '{}'", line))
            })?;
            self.set(caps[1].parse()?, &caps[2])?;
        }
        Ok(())
    }
}
