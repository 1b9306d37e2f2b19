//! Standalone stylesheet bundle.

use std::path::Path;

use anyhow::{Context, Result};
use collage_static::{styles, FileSystem, LocalFs};

use crate::config::resolve_path;

/// Run the bundle command.
pub async fn run(root: &Path, styles_dir: &Path, output: &Path) -> Result<()> {
    let styles_dir = resolve_path(root, styles_dir)?;
    let output = resolve_path(root, output)?;

    if output.starts_with(&styles_dir) {
        anyhow::bail!(
            "Bundle {} must not be written inside {}",
            output.display(),
            styles_dir.display()
        );
    }

    let fs = LocalFs::new();
    if let Some(parent) = output.parent() {
        fs.create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let count = styles::bundle(&fs, &styles_dir, &output)?;

    tracing::info!("Bundled {} stylesheets into {}", count, output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn bundles_into_fresh_output_dir() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("styles/nested")).unwrap();
        fs::write(temp.path().join("styles/b.css"), "b{}").unwrap();
        fs::write(temp.path().join("styles/a.css"), "a{}").unwrap();
        fs::write(temp.path().join("styles/readme.txt"), "skip").unwrap();
        fs::write(temp.path().join("styles/nested/c.css"), "skip").unwrap();

        run(
            temp.path(),
            Path::new("styles"),
            Path::new("project-dist/bundle.css"),
        )
        .await
        .unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("project-dist/bundle.css")).unwrap(),
            "a{}b{}"
        );
    }

    #[tokio::test]
    async fn rejects_output_inside_styles() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("styles")).unwrap();
        fs::write(temp.path().join("styles/a.css"), "a{}").unwrap();

        let result = run(temp.path(), Path::new("styles"), Path::new("styles/all.css")).await;

        assert!(result.is_err());
        assert!(!temp.path().join("styles/all.css").exists());
    }
}
