//! Static page builder.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, info_span, warn};

use crate::config::BuildConfig;
use crate::error::{BuildError, Stage, StageExt};
use crate::fs::{FileSystem, LocalFs};
use crate::mirror::{self, MirrorStats};
use crate::styles;
use crate::template::{self, Assembly};

/// Result of a build operation.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Number of fragments loaded
    pub fragments: usize,

    /// Placeholder occurrences filled from fragments
    pub placeholders: usize,

    /// Placeholder names with no fragment (removed from the output)
    pub unresolved: Vec<String>,

    /// Number of stylesheets bundled
    pub stylesheets: usize,

    /// Number of asset files copied
    pub assets: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Static page builder.
///
/// Runs one build per call: prepare the output directory, then assemble the
/// template, bundle styles and mirror assets. The last three write to
/// disjoint destinations and run concurrently.
pub struct StaticBuilder {
    config: BuildConfig,
    fs: Arc<dyn FileSystem>,
}

impl StaticBuilder {
    /// Create a builder that works on the local disk.
    pub fn new(config: BuildConfig) -> Self {
        Self::with_fs(config, Arc::new(LocalFs::new()))
    }

    /// Create a builder on top of a custom filesystem.
    pub fn with_fs(config: BuildConfig, fs: Arc<dyn FileSystem>) -> Self {
        Self { config, fs }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build the page.
    ///
    /// A failing step aborts the build. Whatever earlier or concurrent steps
    /// wrote stays in the output directory.
    pub async fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        info!(
            root = %self.config.root.display(),
            output = %self.config.output_dir.display(),
            "starting build"
        );

        info_span!("prepare").in_scope(|| self.prepare())?;

        let (assembled, (bundled, mirrored)) = rayon::join(
            || info_span!("assemble").in_scope(|| self.assemble()),
            || {
                rayon::join(
                    || info_span!("bundle").in_scope(|| self.bundle()),
                    || info_span!("mirror").in_scope(|| self.mirror()),
                )
            },
        );

        let (assembly, stylesheets, assets) = collect_steps(assembled, bundled, mirrored)?;

        let result = BuildResult {
            fragments: assembly.fragments,
            placeholders: assembly.resolved,
            unresolved: assembly.unresolved,
            stylesheets,
            assets: assets.files,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        };

        info!(
            fragments = result.fragments,
            placeholders = result.placeholders,
            stylesheets = result.stylesheets,
            assets = result.assets,
            duration_ms = result.duration_ms,
            "build complete"
        );

        Ok(result)
    }

    /// Ensure the output directory exists and is empty.
    fn prepare(&self) -> Result<(), BuildError> {
        let output = &self.config.output_dir;

        self.fs.create_dir_all(output).stage(Stage::Prepare)?;
        let removed = mirror::clear_dir(self.fs.as_ref(), output).stage(Stage::Prepare)?;

        for path in [
            &self.config.output_html,
            &self.config.output_css,
            &self.config.output_assets,
        ] {
            mirror::unlink_other(self.fs.as_ref(), path).stage(Stage::Prepare)?;
        }

        debug!(dir = %output.display(), removed, "cleared output directory");
        Ok(())
    }

    fn assemble(&self) -> Result<Assembly, BuildError> {
        template::assemble(
            self.fs.as_ref(),
            &self.config.template_file,
            &self.config.fragments_dir,
            &self.config.output_html,
        )
    }

    fn bundle(&self) -> Result<usize, BuildError> {
        styles::bundle(
            self.fs.as_ref(),
            &self.config.styles_dir,
            &self.config.output_css,
        )
    }

    fn mirror(&self) -> Result<MirrorStats, BuildError> {
        mirror::mirror(
            self.fs.as_ref(),
            &self.config.assets_dir,
            &self.config.output_assets,
        )
    }
}

/// Combine the concurrent step results. The first failure in step order
/// is returned; any further failures are logged.
fn collect_steps(
    assembled: Result<Assembly, BuildError>,
    bundled: Result<usize, BuildError>,
    mirrored: Result<MirrorStats, BuildError>,
) -> Result<(Assembly, usize, MirrorStats), BuildError> {
    match (assembled, bundled, mirrored) {
        (Ok(assembly), Ok(stylesheets), Ok(assets)) => Ok((assembly, stylesheets, assets)),
        (Err(first), bundled, mirrored) => Err(log_others(first, [bundled.err(), mirrored.err()])),
        (Ok(_), Err(first), mirrored) => Err(log_others(first, [mirrored.err()])),
        (Ok(_), Ok(_), Err(first)) => Err(first),
    }
}

fn log_others<const N: usize>(first: BuildError, others: [Option<BuildError>; N]) -> BuildError {
    for other in others.into_iter().flatten() {
        warn!(stage = %other.stage(), "{}", other);
    }
    first
}
