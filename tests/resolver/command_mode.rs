use motemem::parse::Unresolved;
use motemem::{Artifact, NativeModule, SectionKind, SoftIssue, Symbol};

use crate::common::*;

#[test]
fn test_sections_from_start_and_end_markers() {
    let artifact = Artifact::from_lines(NM_OUTPUT.lines());
    let module = NativeModule::from_artifact(staged_comm(), &artifact, &command_config()).unwrap();
    let template = module.initial_memory().template();

    assert_eq!(module.offset().value() as u64, LOAD_OFFSET);
    let names: Vec<_> = template.sections().iter().map(|s| s.name()).collect();
    assert_eq!(names, vec![".data", ".bss"]);
    assert_eq!(template.section(".bss").unwrap().start_address(), live(0x1020));
    assert_eq!(template.section(".bss").unwrap().size(), 0x20);

    let issues = module.diagnostics().issues();
    assert!(issues.contains(&SoftIssue::SectionUnparseable {
        section: SectionKind::Common,
        reason: Unresolved::NoStartRule,
    }));
    assert!(issues.contains(&SoftIssue::SectionUnparseable {
        section: SectionKind::Readonly,
        reason: Unresolved::StartNotFound,
    }));
}

#[test]
fn test_command_symbols_deduplicated_and_relocated() {
    let artifact = Artifact::from_lines(NM_OUTPUT.lines());
    let module = NativeModule::from_artifact(staged_comm(), &artifact, &command_config()).unwrap();
    let data = module.initial_memory().template().section(".data").unwrap();

    let counters: Vec<_> = data.symbols().iter().filter(|s| s.name == "counter").collect();
    assert_eq!(counters, vec![&Symbol::variable("counter", live(COUNTER_RAW), 1)]);
    assert!(data.symbol(".data").is_none());
    assert_eq!(module.diagnostics().mismatch_count(), 0);
    assert_eq!(
        module
            .initial_memory()
            .template()
            .byte_array_of("counter", 4)
            .unwrap(),
        COUNTER_INIT.to_le_bytes().to_vec()
    );
}

#[test]
fn test_conflicting_addresses_reported() {
    let output = format!("{}0000000000001010 D counter\n", NM_OUTPUT);
    let artifact = Artifact::from_lines(output.lines());
    let module = NativeModule::from_artifact(staged_comm(), &artifact, &command_config()).unwrap();

    // Counted once for the artifact, however many sections list the symbol
    assert_eq!(module.diagnostics().mismatch_count(), 1);
    let mismatches = module
        .diagnostics()
        .issues()
        .iter()
        .filter(|i| matches!(i, SoftIssue::AddressMismatch { .. }))
        .count();
    assert_eq!(mismatches, 1);
    assert_eq!(
        module.initial_memory().template().symbol("counter").unwrap().address,
        live(COUNTER_RAW)
    );
}

#[test]
fn test_end_before_start_leaves_section_out() {
    let output = NM_OUTPUT.replace("0000000000001040 B _end", "0000000000001010 B _end");
    let artifact = Artifact::from_lines(output.lines());
    let module = NativeModule::from_artifact(staged_comm(), &artifact, &command_config()).unwrap();

    assert!(module.initial_memory().template().section(".bss").is_none());
    assert!(module.diagnostics().issues().contains(&SoftIssue::SectionUnparseable {
        section: SectionKind::Bss,
        reason: Unresolved::NegativeSize,
    }));
}

#[cfg(unix)]
#[test]
fn test_initialize_runs_parse_command() {
    // The "module" is a text file, so `cat` stands in for `nm`
    let files = write_module(NM_OUTPUT, "");
    let module =
        NativeModule::initialize(staged_comm(), &files.module, None, &command_config()).unwrap();

    assert_eq!(module.offset().value() as u64, LOAD_OFFSET);
    assert_eq!(module.initial_memory().template().sections().len(), 2);
}

#[cfg(unix)]
#[test]
fn test_silent_command_means_no_data() {
    let files = write_module(NM_OUTPUT, "");
    let mut config = command_config();
    config.parse_command = Some("true $(LIBFILE)".to_string());
    let err = NativeModule::initialize(staged_comm(), &files.module, None, &config).unwrap_err();
    assert!(matches!(err, motemem::MoteError::NoArtifactData { .. }));
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_initialize_from_async_host() {
    let files = write_module(NM_OUTPUT, "");
    let module =
        NativeModule::initialize(staged_comm(), &files.module, None, &command_config()).unwrap();

    assert_eq!(module.offset().value() as u64, LOAD_OFFSET);
    assert_eq!(module.initial_memory().template().sections().len(), 2);
}
