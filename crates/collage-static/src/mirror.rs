//! Recursive directory mirroring.
//!
//! [`mirror`] makes a destination tree an exact copy of a source tree. The
//! destination is treated as disposable: it is cleared before anything is
//! written into it, at every level of the recursion.

use std::path::Path;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{BuildError, FsResult, Stage, StageExt};
use crate::fs::{sorted_entries, EntryKind, FileSystem};

/// Totals for one mirror run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    /// Files copied
    pub files: usize,

    /// Directories created below the destination root
    pub dirs: usize,

    /// Bytes copied
    pub bytes: u64,
}

impl MirrorStats {
    fn merge(self, other: Self) -> Self {
        Self {
            files: self.files + other.files,
            dirs: self.dirs + other.dirs,
            bytes: self.bytes + other.bytes,
        }
    }
}

/// Remove every file and directory directly inside `dir`.
///
/// Entries that are neither files nor directories are left in place.
/// Returns the number of entries removed.
pub fn clear_dir(fs: &dyn FileSystem, dir: &Path) -> FsResult<usize> {
    let entries = sorted_entries(fs, dir)?;

    entries
        .par_iter()
        .map(|entry| {
            let path = dir.join(&entry.name);
            match entry.kind {
                EntryKind::File => fs.remove_file(&path).map(|()| 1),
                EntryKind::Directory => fs.remove_dir_all(&path).map(|()| 1),
                EntryKind::Other => {
                    debug!(path = %path.display(), "leaving non-regular entry");
                    Ok(0)
                }
            }
        })
        .try_reduce(|| 0, |a, b| Ok(a + b))
}

/// Unlink `path` if it is a symlink or other non-regular entry.
///
/// Output paths are written through, so a leftover link at one of them would
/// redirect the write outside the destination tree. Returns whether anything
/// was removed.
pub fn unlink_other(fs: &dyn FileSystem, path: &Path) -> FsResult<bool> {
    if fs.entry_kind(path)? != Some(EntryKind::Other) {
        return Ok(false);
    }

    fs.remove_file(path)?;
    debug!(path = %path.display(), "unlinked non-regular entry in the way of output");
    Ok(true)
}

/// Make `dest` contain exactly what `source` contains, recursively.
///
/// Failures abort the affected subtree and surface as a [`Stage::Mirror`]
/// error. Files already written are not rolled back.
pub fn mirror(fs: &dyn FileSystem, source: &Path, dest: &Path) -> Result<MirrorStats, BuildError> {
    let stats = mirror_tree(fs, source, dest).stage(Stage::Mirror)?;

    debug!(
        source = %source.display(),
        dest = %dest.display(),
        files = stats.files,
        dirs = stats.dirs,
        "mirrored directory"
    );

    Ok(stats)
}

fn mirror_tree(fs: &dyn FileSystem, source: &Path, dest: &Path) -> FsResult<MirrorStats> {
    unlink_other(fs, dest)?;
    fs.create_dir_all(dest)?;
    // Cleared before the first write so stale and fresh entries never mix
    clear_dir(fs, dest)?;

    let entries = sorted_entries(fs, source)?;

    entries
        .par_iter()
        .map(|entry| {
            let from = source.join(&entry.name);
            let to = dest.join(&entry.name);

            match entry.kind {
                EntryKind::File => {
                    // Clearing leaves links in place; never copy through one
                    unlink_other(fs, &to)?;
                    let bytes = fs.copy_file(&from, &to)?;
                    debug!(src = %from.display(), dest = %to.display(), "copied file");
                    Ok(MirrorStats {
                        files: 1,
                        dirs: 0,
                        bytes,
                    })
                }
                EntryKind::Directory => {
                    let nested = mirror_tree(fs, &from, &to)?;
                    Ok(nested.merge(MirrorStats {
                        dirs: 1,
                        ..Default::default()
                    }))
                }
                EntryKind::Other => {
                    debug!(path = %from.display(), "skipping non-regular entry");
                    Ok(MirrorStats::default())
                }
            }
        })
        .try_reduce(MirrorStats::default, |a, b| Ok(a.merge(b)))
}
