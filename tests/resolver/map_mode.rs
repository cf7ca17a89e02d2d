use motemem::parse::CompiledRules;
use motemem::resolver::{resolve_reference_offset, SectionSources};
use motemem::{
    Artifact, BufferCommunicator, MoteError, NativeModule, SectionKind, SoftIssue, Symbol,
};

use crate::common::*;

fn module() -> NativeModule<BufferCommunicator> {
    let artifact = Artifact::from_lines(MAP_FILE.lines());
    NativeModule::from_artifact(staged_comm(), &artifact, &map_config()).unwrap()
}

#[test]
fn test_offset_resolved_from_reference_variable() {
    let module = module();
    assert_eq!(module.offset().value() as u64, LOAD_OFFSET);
    assert_eq!(module.communicator().reference_address(), Some(RAW_BASE));
}

#[test]
fn test_sections_placed_in_live_space() {
    let module = module();
    let template = module.initial_memory().template();

    let data = template.section(".data").unwrap();
    assert_eq!(data.start_address(), live(0x1000));
    assert_eq!(data.size(), 0x20);
    let bss = template.section(".bss").unwrap();
    assert_eq!(bss.start_address(), live(0x1020));
    assert_eq!(bss.size(), 0x20);

    assert_eq!(
        module.diagnostics().absent_sections(),
        vec![SectionKind::Common, SectionKind::Readonly]
    );
}

#[test]
fn test_symbols_carry_live_addresses_and_sizes() {
    let module = module();
    let template = module.initial_memory().template();

    assert_eq!(
        template.symbol("counter"),
        Some(&Symbol::variable("counter", live(COUNTER_RAW), 4))
    );
    assert_eq!(template.symbol("referenceVar").unwrap().size, 8);
    // `buffer` sits on the inclusive end of .data's range; the bss listing wins
    assert_eq!(template.symbol("buffer").unwrap().size, 0x10);
    assert!(module.diagnostics().issues().contains(&SoftIssue::SymbolOutOfRange {
        section: SectionKind::Data,
        count: 1,
    }));
}

#[test]
fn test_initial_memory_holds_initialised_state() {
    let module = module();
    let template = module.initial_memory().template();
    assert_eq!(
        template.byte_array_of("counter", 4).unwrap(),
        COUNTER_INIT.to_le_bytes().to_vec()
    );
    assert_eq!(template.word_value_of("referenceVar").unwrap(), live(RAW_BASE));
}

#[test]
fn test_missing_reference_symbol_is_fatal() {
    let map = MAP_FILE.replace("referenceVar", "otherVar");
    let artifact = Artifact::from_lines(map.lines());
    let err = NativeModule::from_artifact(staged_comm(), &artifact, &map_config()).unwrap_err();
    assert!(matches!(err, MoteError::ReferenceSymbolNotFound { ref symbol } if symbol == "referenceVar"));
}

#[test]
fn test_custom_reference_symbol() {
    let map = MAP_FILE.replace("referenceVar", "calibration");
    let artifact = Artifact::from_lines(map.lines());
    let mut config = map_config();
    config.reference_symbol = "calibration".to_string();
    let module = NativeModule::from_artifact(staged_comm(), &artifact, &config).unwrap();
    assert_eq!(module.offset().value() as u64, LOAD_OFFSET);
}

#[test]
fn test_overlapping_sections_are_fatal() {
    let map = MAP_FILE.replace(
        ".bss            0x0000000000001020",
        ".bss            0x0000000000001010",
    );
    let artifact = Artifact::from_lines(map.lines());
    let err = NativeModule::from_artifact(staged_comm(), &artifact, &map_config()).unwrap_err();
    assert!(matches!(err, MoteError::AddressRangeOverlap { .. }));
}

#[test]
fn test_reference_offset_without_module() {
    let config = map_config();
    let artifact = Artifact::from_lines(MAP_FILE.lines());
    let rules = CompiledRules::compile(&config).unwrap();
    let sources = SectionSources::new(&artifact, &rules, false);
    let mut comm: BufferCommunicator = staged_comm();

    let offset =
        resolve_reference_offset(&sources, &mut comm, &config.reference_symbol, config.layout)
            .unwrap();

    assert_eq!(offset.to_live(COUNTER_RAW), live(COUNTER_RAW));
    assert_eq!(offset.to_raw(live(BUFFER_RAW)), BUFFER_RAW);
}

#[test]
fn test_zero_offset_when_module_not_moved() {
    let mut comm = staged_comm();
    comm.poke(RAW_BASE, &RAW_BASE.to_le_bytes()).unwrap();
    let artifact = Artifact::from_lines(MAP_FILE.lines());
    let module = NativeModule::from_artifact(comm, &artifact, &map_config()).unwrap();
    assert!(module.offset().is_zero());
    assert_eq!(
        module.initial_memory().template().section(".data").unwrap().start_address(),
        RAW_BASE
    );
}
