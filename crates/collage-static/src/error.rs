//! Error types for the build pipeline.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Result type for filesystem adapter operations.
pub type FsResult<T> = Result<T, FsError>;

/// Errors reported by a [`FileSystem`](crate::fs::FileSystem) adapter.
///
/// Every variant carries the path the failed operation was applied to.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    /// Classify an `io::Error` raised while operating on `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }

    /// The path the failed operation was applied to.
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(path) | Self::Io { path, .. } => path,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Creating and clearing the output directory
    Prepare,
    /// Template substitution
    Assemble,
    /// Stylesheet concatenation
    Bundle,
    /// Asset tree copy
    Mirror,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::Assemble => "assemble",
            Stage::Bundle => "bundle",
            Stage::Mirror => "mirror",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{stage} failed at {}: {source}", .path.display())]
    Stage {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: FsError,
    },

    #[error("assemble failed at {}: duplicate fragment '{name}'", .path.display())]
    DuplicateFragment { name: String, path: PathBuf },
}

impl BuildError {
    /// Wrap an adapter failure with the stage it occurred in.
    pub fn new(stage: Stage, source: FsError) -> Self {
        Self::Stage {
            stage,
            path: source.path().to_path_buf(),
            source,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Stage { stage, .. } => *stage,
            Self::DuplicateFragment { .. } => Stage::Assemble,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Stage { path, .. } | Self::DuplicateFragment { path, .. } => path,
        }
    }

    /// The underlying adapter error, if any.
    pub fn fs_error(&self) -> Option<&FsError> {
        match self {
            Self::Stage { source, .. } => Some(source),
            Self::DuplicateFragment { .. } => None,
        }
    }
}

/// Attach a stage to adapter results.
pub(crate) trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T, BuildError>;
}

impl<T> StageExt<T> for FsResult<T> {
    fn stage(self, stage: Stage) -> Result<T, BuildError> {
        self.map_err(|e| BuildError::new(stage, e))
    }
}
