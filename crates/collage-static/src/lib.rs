//! Static page assembler for collage.
//!
//! Builds an output directory from a template with `{{name}}` placeholders,
//! a directory of HTML fragments, a directory of stylesheets and a directory
//! of static assets.

pub mod builder;
pub mod config;
pub mod error;
pub mod fs;
pub mod listing;
pub mod mirror;
pub mod styles;
pub mod template;

pub use builder::{BuildResult, StaticBuilder};
pub use config::{BuildConfig, BuildOptions, ConfigError};
pub use error::{BuildError, FsError, FsResult, Stage};
pub use fs::{DirEntry, EntryKind, FileSystem, LocalFs, MemoryFs};
pub use listing::FileSummary;
pub use mirror::MirrorStats;
