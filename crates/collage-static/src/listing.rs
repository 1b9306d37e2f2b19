//! Per-file summaries of a single directory.

use std::fmt;
use std::path::Path;

use crate::error::FsResult;
use crate::fs::{sorted_entries, FileSystem};

/// Name, extension and size of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    /// File name without its last extension
    pub name: String,

    /// Last extension without the dot, empty if there is none
    pub extension: String,

    /// Size in bytes
    pub size: u64,
}

impl fmt::Display for FileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} - {}", self.name, self.extension, self.size)
    }
}

/// Summarize the files directly inside `dir`, in name order.
///
/// Subdirectories and non-regular entries are left out.
pub fn summarize(fs: &dyn FileSystem, dir: &Path) -> FsResult<Vec<FileSummary>> {
    sorted_entries(fs, dir)?
        .into_iter()
        .filter(|entry| entry.is_file())
        .map(|entry| -> FsResult<FileSummary> {
            let path = dir.join(&entry.name);
            let name = Path::new(&entry.name);

            Ok(FileSummary {
                name: name
                    .file_stem()
                    .unwrap_or(entry.name.as_os_str())
                    .to_string_lossy()
                    .into_owned(),
                extension: name
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                size: fs.file_size(&path)?,
            })
        })
        .collect()
}
