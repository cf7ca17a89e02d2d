use motemem::hashing::sha256_digest;
use motemem::{Artifact, BufferCommunicator, MoteError, NativeModule};

use crate::common::*;

fn ticking_module() -> NativeModule<BufferCommunicator> {
    let offset_of_counter = (COUNTER_RAW - RAW_BASE) as usize;
    let comm = staged_comm().with_tick(move |mem| mem[offset_of_counter] += 1);
    let artifact = Artifact::from_lines(MAP_FILE.lines());
    NativeModule::from_artifact(comm, &artifact, &map_config()).unwrap()
}

#[test]
fn test_push_tick_pull_cycle() {
    let mut module = ticking_module();
    let mut mote = module.create_initial_memory();
    let counter = live(COUNTER_RAW);

    mote.write_bytes(counter, &7u32.to_le_bytes()).unwrap();
    module.push(&mote).unwrap();
    module.tick();
    module.pull(&mut mote).unwrap();

    assert_eq!(mote.read_bytes(counter, 4).unwrap(), 8u32.to_le_bytes().to_vec());
    assert_eq!(module.communicator().ticks(), 1);
}

#[test]
fn test_pull_then_push_is_identity() {
    let mut module = ticking_module();
    let before = module.communicator().memory().to_vec();

    let mut mote = module.create_initial_memory();
    module.pull(&mut mote).unwrap();
    module.push(&mote).unwrap();

    assert_eq!(module.communicator().memory(), &before[..]);
}

#[test]
fn test_motes_do_not_share_state() {
    let mut module = ticking_module();
    let mut first = module.create_initial_memory();
    let second = module.create_initial_memory();
    let buffer = live(BUFFER_RAW);

    first.write_bytes(buffer, &[0xaa; 16]).unwrap();
    assert_eq!(second.read_bytes(buffer, 16).unwrap(), vec![0; 16]);

    // Interleave two motes through the one module
    module.push(&first).unwrap();
    module.tick();
    module.pull(&mut first).unwrap();
    module.push(&second).unwrap();

    assert_eq!(
        &module.communicator().memory()[0x20..0x30],
        &[0u8; 16][..],
        "second mote's state must replace the first"
    );
    assert_eq!(first.read_bytes(buffer, 16).unwrap(), vec![0xaa; 16]);
    assert_eq!(
        module.initial_memory().template().read_bytes(buffer, 16).unwrap(),
        vec![0; 16]
    );
}

#[test]
fn test_initialize_from_files() {
    let files = write_module("\x7fELF fake module", MAP_FILE);
    let module = NativeModule::initialize(
        staged_comm(),
        &files.module,
        Some(files.map.as_path()),
        &map_config(),
    )
    .unwrap();

    assert_eq!(module.checksum(), Some(sha256_digest(b"\x7fELF fake module").as_str()));
    assert_eq!(module.path(), Some(files.module.as_path()));
    assert_eq!(module.offset().value() as u64, LOAD_OFFSET);
}

#[test]
fn test_initialize_requires_module_file() {
    let files = write_module("", MAP_FILE);
    let missing = files.dir.path().join("absent.cooja");
    let err = NativeModule::initialize(
        staged_comm(),
        &missing,
        Some(files.map.as_path()),
        &map_config(),
    )
    .unwrap_err();
    assert!(matches!(err, MoteError::NoArtifactData { .. }));
}

#[test]
fn test_initialize_requires_map_in_map_mode() {
    let files = write_module("module", MAP_FILE);
    let err =
        NativeModule::initialize(staged_comm(), &files.module, None, &map_config()).unwrap_err();
    assert!(matches!(err, MoteError::InvalidConfig(_)));

    let empty_map = files.dir.path().join("empty.map");
    std::fs::write(&empty_map, "").unwrap();
    let err = NativeModule::initialize(
        staged_comm(),
        &files.module,
        Some(empty_map.as_path()),
        &map_config(),
    )
    .unwrap_err();
    assert!(matches!(err, MoteError::NoArtifactData { .. }));
}

#[test]
fn test_communicator_returned() {
    let module = ticking_module();
    let comm = module.into_communicator();
    assert_eq!(comm.reference_address(), Some(RAW_BASE));
}
