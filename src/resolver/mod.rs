//! Address-space resolution and the memory built on top of it.

pub mod builder;
pub mod descriptor;
pub mod diagnostics;
pub mod mediator;
pub mod offset;

pub use builder::{assemble, InitialMemoryBuilder, SectionSources};
pub use descriptor::build_section;
pub use diagnostics::{BuildDiagnostics, SoftIssue};
pub use mediator::MemoryCopyMediator;
pub use offset::resolve_reference_offset;
