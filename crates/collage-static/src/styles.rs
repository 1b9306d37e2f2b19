//! Stylesheet bundling.

use std::path::Path;

use tracing::debug;

use crate::error::{BuildError, Stage, StageExt};
use crate::fs::{sorted_entries, FileSystem};

/// Concatenate every `.css` file directly inside `styles_dir` into `output`.
///
/// Files are appended in name order with nothing inserted between them.
/// Subdirectories are not descended into. `output` is truncated before the
/// first append, so it exists (possibly empty) even when the source listing
/// fails. A failed read leaves the already written prefix in place.
///
/// Returns the number of stylesheets bundled.
pub fn bundle(fs: &dyn FileSystem, styles_dir: &Path, output: &Path) -> Result<usize, BuildError> {
    fs.write(output, b"").stage(Stage::Bundle)?;

    let stylesheets: Vec<_> = sorted_entries(fs, styles_dir)
        .stage(Stage::Bundle)?
        .into_iter()
        .filter(|entry| entry.is_file_with_suffix(".css"))
        .collect();

    let mut bytes = 0;
    for entry in &stylesheets {
        let path = styles_dir.join(&entry.name);
        let css = fs.read(&path).stage(Stage::Bundle)?;
        fs.append(output, &css).stage(Stage::Bundle)?;
        bytes += css.len();
        debug!(path = %path.display(), bytes = css.len(), "bundled stylesheet");
    }

    debug!(
        output = %output.display(),
        files = stylesheets.len(),
        bytes,
        "wrote style bundle"
    );

    Ok(stylesheets.len())
}
