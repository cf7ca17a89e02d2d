//! Soft conditions met while building a snapshot.
//!
//! None of these stop a build. They are kept so a host can show why a
//! section is missing or why a symbol lookup may be unreliable.

use std::fmt;

use crate::core::section::SectionKind;
use crate::parse::source::Unresolved;

/// A non-fatal finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftIssue {
    /// The section could not be located; it is left out of the snapshot
    SectionUnparseable {
        section: SectionKind,
        reason: Unresolved,
    },
    /// The section was located but lists no symbols
    NoSymbols { section: SectionKind },
    /// Command output named the same symbol at different addresses; counted
    /// once per artifact, not per section
    AddressMismatch { count: usize },
    /// Symbols whose address lies outside the section that lists them
    SymbolOutOfRange { section: SectionKind, count: usize },
}

impl fmt::Display for SoftIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoftIssue::SectionUnparseable { section, reason } => {
                write!(f, "{}: section absent ({})", section, reason)
            }
            SoftIssue::NoSymbols { section } => write!(f, "{}: no symbols found", section),
            SoftIssue::AddressMismatch { count } => {
                write!(f, "{} conflicting symbol addresses", count)
            }
            SoftIssue::SymbolOutOfRange { section, count } => {
                write!(f, "{}: {} symbols outside section range", section, count)
            }
        }
    }
}

/// Ledger of soft issues for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildDiagnostics {
    issues: Vec<SoftIssue>,
}

impl BuildDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, issue: SoftIssue) {
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[SoftIssue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Sections left out of the snapshot
    pub fn absent_sections(&self) -> Vec<SectionKind> {
        self.issues
            .iter()
            .filter_map(|i| match i {
                SoftIssue::SectionUnparseable { section, .. } => Some(*section),
                _ => None,
            })
            .collect()
    }

    pub fn mismatch_count(&self) -> usize {
        self.issues
            .iter()
            .map(|i| match i {
                SoftIssue::AddressMismatch { count } => *count,
                _ => 0,
            })
            .sum()
    }
}
