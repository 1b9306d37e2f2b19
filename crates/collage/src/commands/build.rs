//! One-shot build command.

use std::path::Path;

use anyhow::Result;
use collage_static::StaticBuilder;

use crate::config::{self, Overrides};

/// Run the build command.
pub async fn run(root: &Path, config_path: Option<&Path>, overrides: Overrides) -> Result<()> {
    tracing::info!("Building page...");

    let config = config::resolve(root, config_path, overrides)?;

    let result = StaticBuilder::new(config).build().await?;

    tracing::info!(
        "Built page from {} fragments, {} stylesheets and {} assets in {}ms",
        result.fragments,
        result.stylesheets,
        result.assets,
        result.duration_ms
    );

    if !result.unresolved.is_empty() {
        tracing::info!(
            "Placeholders without a fragment: {}",
            result.unresolved.join(", ")
        );
    }

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
