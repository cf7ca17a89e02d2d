//! Native module lifecycle.
//!
//! A [`NativeModule`] owns the communicator of one loaded module. It is
//! created by resolving the module's address space and capturing its
//! initial memory; afterwards it only moves snapshots in and out and ticks
//! the module.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::comm::CoreCommunicator;
use crate::config::ExternalToolsConfig;
use crate::core::layout::Offset;
use crate::core::memory::{InitialMemory, MoteMemory};
use crate::error::{MoteError, Result};
use crate::hashing::file_checksum;
use crate::parse::artifact::Artifact;
use crate::parse::patterns::CompiledRules;
use crate::resolver::builder::{InitialMemoryBuilder, SectionSources};
use crate::resolver::diagnostics::BuildDiagnostics;
use crate::resolver::mediator::MemoryCopyMediator;
use crate::resolver::offset::resolve_reference_offset;
use crate::{log_error, span_trace};

/// A loaded native module with a resolved address space.
#[derive(Debug)]
pub struct NativeModule<C: CoreCommunicator> {
    comm: C,
    path: Option<PathBuf>,
    checksum: Option<String>,
    mediator: MemoryCopyMediator,
    initial: InitialMemory,
    diagnostics: BuildDiagnostics,
}

impl<C: CoreCommunicator> NativeModule<C> {
    /// Resolve the module at `module_path` and capture its initial memory.
    ///
    /// In map mode `map_file` must name the linker map; in command mode the
    /// configured parse command is run against the module instead.
    pub fn initialize(
        comm: C,
        module_path: &Path,
        map_file: Option<&Path>,
        config: &ExternalToolsConfig,
    ) -> Result<Self> {
        let span = span_trace!("initialize_module", module = %module_path.display());
        let _guard = span.enter();

        let (checksum, artifact) = load_artifact(module_path, map_file, config)
            .map_err(|e| log_error!(e, "loading module artifact"))?;

        let mut module = Self::from_artifact(comm, &artifact, config)?;
        info!(checksum = %checksum, "Module initialised");
        module.path = Some(module_path.to_path_buf());
        module.checksum = Some(checksum);
        Ok(module)
    }

    /// Resolve the module described by an already loaded artifact.
    pub fn from_artifact(
        mut comm: C,
        artifact: &Artifact,
        config: &ExternalToolsConfig,
    ) -> Result<Self> {
        let (offset, initial, diagnostics) = resolve(&mut comm, artifact, config)
            .map_err(|e| log_error!(e, "resolving module memory"))?;

        for issue in diagnostics.issues() {
            info!(issue = %issue, "Soft issue");
        }

        Ok(Self {
            comm,
            path: None,
            checksum: None,
            mediator: MemoryCopyMediator::new(offset),
            initial,
            diagnostics,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// SHA-256 of the module file, when the module was loaded from disk
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn offset(&self) -> Offset {
        self.mediator.offset()
    }

    pub fn diagnostics(&self) -> &BuildDiagnostics {
        &self.diagnostics
    }

    pub fn initial_memory(&self) -> &InitialMemory {
        &self.initial
    }

    /// Independent copy of the initial memory for a new mote.
    pub fn create_initial_memory(&self) -> MoteMemory {
        self.initial.instantiate()
    }

    /// Copy the module's current state into `memory`.
    pub fn pull(&self, memory: &mut MoteMemory) -> Result<()> {
        self.mediator.pull(&self.comm, memory)
    }

    /// Copy `memory` into the module.
    pub fn push(&mut self, memory: &MoteMemory) -> Result<()> {
        self.mediator.push(&mut self.comm, memory)
    }

    pub fn tick(&mut self) {
        self.comm.tick();
    }

    pub fn communicator(&self) -> &C {
        &self.comm
    }

    pub fn communicator_mut(&mut self) -> &mut C {
        &mut self.comm
    }

    /// Give the communicator back, ending the module's lifetime.
    pub fn into_communicator(self) -> C {
        self.comm
    }
}

fn load_artifact(
    module_path: &Path,
    map_file: Option<&Path>,
    config: &ExternalToolsConfig,
) -> Result<(String, Artifact)> {
    if !module_path.is_file() {
        return Err(MoteError::NoArtifactData {
            source_name: format!("module file {} does not exist", module_path.display()),
        });
    }
    let checksum = file_checksum(module_path)?;

    let artifact = if config.parse_with_command {
        Artifact::from_command_output(config, module_path)?
    } else {
        let map_file = map_file.ok_or_else(|| {
            MoteError::InvalidConfig("map file parsing selected but no map file given".into())
        })?;
        Artifact::load_map_file(map_file)?
    };
    Ok((checksum, artifact))
}

fn resolve<C: CoreCommunicator>(
    comm: &mut C,
    artifact: &Artifact,
    config: &ExternalToolsConfig,
) -> Result<(Offset, InitialMemory, BuildDiagnostics)> {
    let rules = CompiledRules::compile(config)?;
    let sources = SectionSources::new(artifact, &rules, config.parse_with_command);
    let offset = resolve_reference_offset(&sources, comm, &config.reference_symbol, config.layout)?;
    let (initial, diagnostics) =
        InitialMemoryBuilder::new(&sources, config.layout).build(&*comm, offset)?;
    Ok((offset, initial, diagnostics))
}
