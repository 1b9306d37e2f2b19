//! Standalone directory copy.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use collage_static::{mirror, LocalFs};

use crate::config::resolve_path;

/// Run the mirror command.
///
/// `dest` defaults to a sibling of `source` named `<source>-copy`. Its
/// previous contents are replaced.
pub async fn run(root: &Path, source: &Path, dest: Option<&Path>) -> Result<()> {
    let source = resolve_path(root, source)?;
    let dest = match dest {
        Some(dest) => resolve_path(root, dest)?,
        None => default_dest(&source)?,
    };

    if dest.starts_with(&source) || source.starts_with(&dest) {
        anyhow::bail!(
            "Source {} and destination {} overlap",
            source.display(),
            dest.display()
        );
    }

    tracing::info!("Copying {} to {}...", source.display(), dest.display());

    let stats = mirror::mirror(&LocalFs::new(), &source, &dest)?;

    tracing::info!(
        "Copied {} files in {} directories ({} bytes)",
        stats.files,
        stats.dirs,
        stats.bytes
    );

    Ok(())
}

fn default_dest(source: &Path) -> Result<PathBuf> {
    let name = source
        .file_name()
        .with_context(|| format!("Cannot derive a copy name for {}", source.display()))?;

    let mut copy = name.to_os_string();
    copy.push("-copy");
    Ok(source.with_file_name(copy))
}
