//! Deployment subsystem: archive spec, working directory, extraction.
//!
//! # Data Flow
//! ```text
//! `wars` property
//!     → spec.rs (parse & validate → ArchiveSpecMap)
//!     → extract.rs (should_extract? → recreate dir, expand archives + conf files)
//!          reads resources.rs (embedded / directory / memory bundle)
//!          writes layout.rs (conf/ logs/ webapps/ work/ temp/)
//!     → ArchiveSpecMap handed to the orchestrator
//! ```

pub mod extract;
pub mod layout;
pub mod resources;
pub mod spec;

pub use extract::{should_extract, DestinationNaming, ExtractError, ExtractionEngine};
pub use layout::WorkingDirectory;
pub use resources::{BundledResources, DirectoryBundle, EmbeddedBundle, MemoryBundle};
pub use spec::{parse_archive_spec, ArchiveName, ArchiveSpecMap, ContextPath, SpecError};
