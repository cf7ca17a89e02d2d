//! Initial memory builder.
//!
//! Assembles a [`MoteMemory`] from the four canonical section sources, then
//! fills it from the live module. Sections that cannot be located are left
//! out; overlapping sections abort the build.

use std::sync::Arc;

use tracing::{debug, info};

use crate::comm::CoreCommunicator;
use crate::core::layout::{MemoryLayout, Offset};
use crate::core::memory::{InitialMemory, MoteMemory};
use crate::core::section::SectionKind;
use crate::error::Result;
use crate::parse::artifact::Artifact;
use crate::parse::patterns::CompiledRules;
use crate::parse::source::{command_symbols, CommandSymbols, SectionSource};
use crate::resolver::descriptor::build_section;
use crate::resolver::diagnostics::{BuildDiagnostics, SoftIssue};
use crate::resolver::mediator::MemoryCopyMediator;

/// The section sources of one module, in canonical order.
#[derive(Debug, Clone)]
pub struct SectionSources<'a> {
    sources: Vec<(SectionKind, SectionSource<'a>)>,
    command_symbols: Option<Arc<CommandSymbols>>,
}

impl<'a> SectionSources<'a> {
    /// One source per canonical section, all using the active strategy.
    ///
    /// In command mode the symbol table is extracted once here and shared by
    /// every section.
    pub fn new(artifact: &'a Artifact, rules: &'a CompiledRules, command: bool) -> Self {
        let table = match (&rules.command_symbols, command) {
            (Some(rule), true) => Some(Arc::new(command_symbols(artifact.lines(), rule))),
            _ => None,
        };
        let sources = SectionKind::ALL
            .iter()
            .map(|&kind| {
                let source = SectionSource::for_kind(artifact, rules, kind, table.as_ref(), command);
                (kind, source)
            })
            .collect();
        Self {
            sources,
            command_symbols: table,
        }
    }

    /// Explicit sources. Kinds that are not listed are never built.
    pub fn from_sources(sources: impl IntoIterator<Item = (SectionKind, SectionSource<'a>)>) -> Self {
        let sources: Vec<_> = sources.into_iter().collect();
        let command_symbols = sources
            .iter()
            .find_map(|(_, source)| source.command_symbols().cloned());
        Self {
            sources,
            command_symbols,
        }
    }

    /// The deduplicated command symbol table, in command mode.
    pub fn command_symbols(&self) -> Option<&CommandSymbols> {
        self.command_symbols.as_deref()
    }

    pub fn get(&self, kind: SectionKind) -> Option<&SectionSource<'a>> {
        self.sources
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, source)| source)
    }
}

/// Build an unfilled memory holding the requested sections, in the order
/// given. Section names are prefixed with `name_prefix`.
pub fn assemble(
    sources: &SectionSources<'_>,
    kinds: &[SectionKind],
    name_prefix: &str,
    offset: Offset,
    layout: MemoryLayout,
) -> Result<(MoteMemory, BuildDiagnostics)> {
    let mut memory = MoteMemory::new(layout);
    let mut diagnostics = BuildDiagnostics::new();

    if let Some(table) = sources.command_symbols() {
        if table.mismatches > 0 {
            diagnostics.record(SoftIssue::AddressMismatch {
                count: table.mismatches,
            });
        }
    }

    for &kind in kinds {
        let Some(source) = sources.get(kind) else {
            continue;
        };
        match source.parse(kind, offset) {
            Ok(parsed) => {
                let name = format!("{}{}", name_prefix, kind.section_name());
                let section = build_section(parsed, &name, offset, &mut diagnostics);
                memory.add_section(section)?;
            }
            Err(reason) => {
                info!(section = %kind, reason = %reason, "Section absent from memory");
                diagnostics.record(SoftIssue::SectionUnparseable {
                    section: kind,
                    reason,
                });
            }
        }
    }

    Ok((memory, diagnostics))
}

/// Builds the initial memory of a module once its offset is known.
#[derive(Debug, Clone)]
pub struct InitialMemoryBuilder<'s, 'a> {
    sources: &'s SectionSources<'a>,
    layout: MemoryLayout,
}

impl<'s, 'a> InitialMemoryBuilder<'s, 'a> {
    pub fn new(sources: &'s SectionSources<'a>, layout: MemoryLayout) -> Self {
        Self { sources, layout }
    }

    /// Lay out data, bss, common and readonly without reading any bytes.
    pub fn layout_sections(&self, offset: Offset) -> Result<(MoteMemory, BuildDiagnostics)> {
        assemble(self.sources, &SectionKind::ALL, "", offset, self.layout)
    }

    /// Lay out the sections and fill them with the module's current content.
    pub fn build<C>(&self, comm: &C, offset: Offset) -> Result<(InitialMemory, BuildDiagnostics)>
    where
        C: CoreCommunicator + ?Sized,
    {
        let (mut memory, diagnostics) = self.layout_sections(offset)?;
        MemoryCopyMediator::new(offset).pull(comm, &mut memory)?;

        debug!(
            sections = memory.sections().len(),
            bytes = memory.total_size(),
            soft_issues = diagnostics.issues().len(),
            "Initial memory captured"
        );
        Ok((InitialMemory::new(memory), diagnostics))
    }
}
