//! hdlsrc-core: source ingestion for a hardware-description-language
//! compiler.
//!
//! Expands file patterns and library maps into a deduplicated registry of
//! files with library ownership, parses them (optionally on a thread pool)
//! and then loads further files from search directories until every
//! referenced module, package, interface or class that can be found has
//! been.
//!
//! # Public API
//!
//! - [`SourceLoader`] -- registration calls plus [`SourceLoader::load_and_parse_sources`]
//! - [`SourceOptions`] -- parse-time switches
//! - [`LoaderConfig`] -- TOML project description applied to a loader
//! - [`LoadError`] -- recorded pattern and read failures
//! - [`SyntaxTree`] -- one parsed compilation unit and its metadata

pub mod closure;
pub mod config;
pub mod error;
pub mod glob;
pub mod libmap;
pub mod library;
pub mod loader;
pub mod options;
pub mod pipeline;
pub mod registry;
pub mod source;
pub mod syntax;

// ── Convenience re-exports ───────────────────────────────────────────

pub use closure::ClosureStats;
pub use config::{ConfigError, LoaderConfig};
pub use error::{LoadError, LoadErrorKind, SyntaxDiagnostic};
pub use glob::{GlobError, GlobRank};
pub use libmap::LibraryMap;
pub use library::{Library, LibraryId};
pub use loader::{LibraryTie, SourceLoader};
pub use options::SourceOptions;
pub use registry::FileEntry;
pub use source::{FileSystemProvider, InMemoryProvider, SourceBuffer, SourceManager, SourceProvider};
pub use syntax::{MacroDef, SyntaxTree, TreeMetadata};
