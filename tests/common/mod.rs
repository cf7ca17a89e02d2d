//! Shared fixtures: a small module image described by a GNU ld style map
//! file and by `nm` style command output, plus a communicator staged with
//! the module's initialised state.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use motemem::{BufferCommunicator, Endianness, ExternalToolsConfig, MemoryLayout, WordSize};
use tempfile::TempDir;

/// Raw address the external tools report for the start of `.data`
pub const RAW_BASE: u64 = 0x1000;
/// Distance the loader moved the module
pub const LOAD_OFFSET: u64 = 0x5555_0000_0000;
/// Initial value of `counter`
pub const COUNTER_INIT: u32 = 42;

pub const COUNTER_RAW: u64 = 0x1008;
pub const BUFFER_RAW: u64 = 0x1020;

pub const MAP_FILE: &str = "\
Linker script and memory map

.data           0x0000000000001000       0x20
 .data.referenceVar 0x0000000000001000        0x8 main.o
                0x0000000000001000                referenceVar
 .data.counter  0x0000000000001008        0x4 main.o
                0x0000000000001008                counter
.bss            0x0000000000001020       0x20
 .bss.buffer    0x0000000000001020       0x10 main.o
                0x0000000000001020                buffer
";

pub const NM_OUTPUT: &str = "\
0000000000001000 d .data
0000000000001000 D referenceVar
0000000000001008 D counter
0000000000001008 D counter
0000000000001020 D _edata
0000000000001020 B __bss_start
0000000000001020 B buffer
0000000000001040 B _end
";

pub fn layout() -> MemoryLayout {
    MemoryLayout::new(WordSize::W64, Endianness::Little)
}

pub fn map_config() -> ExternalToolsConfig {
    ExternalToolsConfig {
        layout: layout(),
        ..Default::default()
    }
}

pub fn command_config() -> ExternalToolsConfig {
    ExternalToolsConfig {
        parse_with_command: true,
        parse_command: Some("cat $(LIBFILE)".to_string()),
        layout: layout(),
        ..Default::default()
    }
}

pub fn live(raw: u64) -> u64 {
    raw + LOAD_OFFSET
}

/// A module whose reference variable holds its own live address and whose
/// `counter` holds [`COUNTER_INIT`].
pub fn staged_comm() -> BufferCommunicator {
    let mut comm = BufferCommunicator::zeroed(RAW_BASE, 0x40);
    comm.poke(RAW_BASE, &live(RAW_BASE).to_le_bytes()).unwrap();
    comm.poke(COUNTER_RAW, &COUNTER_INIT.to_le_bytes()).unwrap();
    comm
}

/// Module file and map file written to a fresh directory.
pub struct ModuleFiles {
    pub dir: TempDir,
    pub module: PathBuf,
    pub map: PathBuf,
}

pub fn write_module(module_contents: &str, map_contents: &str) -> ModuleFiles {
    let dir = tempfile::tempdir().unwrap();
    let module = dir.path().join("mtype1.cooja");
    let map = dir.path().join("mtype1.map");
    std::fs::File::create(&module)
        .unwrap()
        .write_all(module_contents.as_bytes())
        .unwrap();
    std::fs::File::create(&map)
        .unwrap()
        .write_all(map_contents.as_bytes())
        .unwrap();
    ModuleFiles { dir, module, map }
}
