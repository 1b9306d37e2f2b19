//! List the files of a directory.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use collage_static::{listing, LocalFs};

use crate::config::resolve_path;

/// Run the ls command, writing one `name - extension - size` line per file.
pub async fn run(root: &Path, dir: &Path, out: &mut impl Write) -> Result<()> {
    let dir = resolve_path(root, dir)?;

    let summaries = listing::summarize(&LocalFs::new(), &dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?;

    for summary in &summaries {
        writeln!(out, "{}", summary)?;
    }

    Ok(())
}
