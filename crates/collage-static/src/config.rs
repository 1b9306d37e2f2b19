//! Build configuration.
//!
//! [`BuildOptions`] holds the user-facing options as written (relative to a
//! project root). [`BuildConfig::resolve`] turns them into absolute paths in
//! a single step; the resulting value is never modified afterwards.

use std::path::{Component, Path, PathBuf};

/// Raw build options, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Template document containing `{{name}}` placeholders
    pub template: String,

    /// Directory of `.html` fragments
    pub components: String,

    /// Directory of `.css` files to bundle
    pub styles: String,

    /// Directory of static assets copied verbatim
    pub assets: String,

    /// Output directory, cleared on every build
    pub output: String,

    /// Output HTML file name inside the output directory
    pub html_file: String,

    /// Output CSS bundle name inside the output directory
    pub css_file: String,

    /// Assets subdirectory name inside the output directory
    pub assets_dir: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            template: "template.html".to_string(),
            components: "components".to_string(),
            styles: "styles".to_string(),
            assets: "assets".to_string(),
            output: "project-dist".to_string(),
            html_file: "index.html".to_string(),
            css_file: "style.css".to_string(),
            assets_dir: "assets".to_string(),
        }
    }
}

/// Fully resolved, immutable build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub root: PathBuf,
    pub template_file: PathBuf,
    pub fragments_dir: PathBuf,
    pub styles_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_html: PathBuf,
    pub output_css: PathBuf,
    pub output_assets: PathBuf,
}

/// Errors raised while resolving options.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to resolve project root {}: {source}", .path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {option}: '{value}' must be a single file or directory name")]
    InvalidName { option: &'static str, value: String },

    #[error("Output names collide: '{0}' is used more than once")]
    OutputCollision(String),

    #[error("Output directory {} overlaps source path {}", .output.display(), .source_path.display())]
    OutputOverlapsSource { output: PathBuf, source_path: PathBuf },
}

impl BuildConfig {
    /// Resolve `options` against `root`.
    ///
    /// Absolute option values are kept as they are. Fails without touching
    /// the filesystem if the output names collide or the output directory
    /// would swallow the project root or a source path.
    pub fn resolve(root: impl AsRef<Path>, options: &BuildOptions) -> Result<Self, ConfigError> {
        let root = root.as_ref();
        let root = normalize(&std::path::absolute(root).map_err(|source| ConfigError::Root {
            path: root.to_path_buf(),
            source,
        })?);

        let html_name = single_component("html_file", &options.html_file)?;
        let css_name = single_component("css_file", &options.css_file)?;
        let assets_name = single_component("assets_dir", &options.assets_dir)?;

        for (i, a) in [html_name, css_name, assets_name].iter().enumerate() {
            for b in [html_name, css_name, assets_name].iter().skip(i + 1) {
                if a == b {
                    return Err(ConfigError::OutputCollision(a.to_string()));
                }
            }
        }

        let resolve = |value: &str| normalize(&root.join(value));

        let output_dir = resolve(&options.output);
        let config = Self {
            template_file: resolve(&options.template),
            fragments_dir: resolve(&options.components),
            styles_dir: resolve(&options.styles),
            assets_dir: resolve(&options.assets),
            output_html: output_dir.join(html_name),
            output_css: output_dir.join(css_name),
            output_assets: output_dir.join(assets_name),
            output_dir,
            root,
        };

        config.check_output_overlap()?;

        Ok(config)
    }

    /// Resolve the default options against `root`.
    pub fn with_defaults(root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::resolve(root, &BuildOptions::default())
    }

    /// Source paths read by a build.
    pub fn sources(&self) -> [&Path; 4] {
        [
            &self.template_file,
            &self.fragments_dir,
            &self.styles_dir,
            &self.assets_dir,
        ]
    }

    fn check_output_overlap(&self) -> Result<(), ConfigError> {
        if self.root.starts_with(&self.output_dir) {
            return Err(ConfigError::OutputOverlapsSource {
                output: self.output_dir.clone(),
                source_path: self.root.clone(),
            });
        }

        for source in self.sources() {
            if source.starts_with(&self.output_dir) || self.output_dir.starts_with(source) {
                return Err(ConfigError::OutputOverlapsSource {
                    output: self.output_dir.clone(),
                    source_path: source.to_path_buf(),
                });
            }
        }

        Ok(())
    }
}

fn single_component<'a>(option: &'static str, value: &'a str) -> Result<&'a str, ConfigError> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(value),
        _ => Err(ConfigError::InvalidName {
            option,
            value: value.to_string(),
        }),
    }
}

/// Lexically drop `.` and fold `..` so overlap checks compare like with like.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_defaults_against_root() {
        let config = BuildConfig::with_defaults("/site").unwrap();

        assert_eq!(config.template_file, PathBuf::from("/site/template.html"));
        assert_eq!(config.fragments_dir, PathBuf::from("/site/components"));
        assert_eq!(config.styles_dir, PathBuf::from("/site/styles"));
        assert_eq!(config.assets_dir, PathBuf::from("/site/assets"));
        assert_eq!(config.output_dir, PathBuf::from("/site/project-dist"));
        assert_eq!(config.output_html, PathBuf::from("/site/project-dist/index.html"));
        assert_eq!(config.output_css, PathBuf::from("/site/project-dist/style.css"));
        assert_eq!(config.output_assets, PathBuf::from("/site/project-dist/assets"));
    }

    #[test]
    fn output_paths_follow_overridden_output_dir() {
        let options = BuildOptions {
            output: "build/web".to_string(),
            css_file: "bundle.css".to_string(),
            ..Default::default()
        };

        let config = BuildConfig::resolve("/site", &options).unwrap();

        assert_eq!(config.output_css, PathBuf::from("/site/build/web/bundle.css"));
        assert_eq!(config.output_assets, PathBuf::from("/site/build/web/assets"));
    }

    #[test]
    fn relative_root_becomes_absolute() {
        let config = BuildConfig::with_defaults("site/./docs/..").unwrap();

        assert!(config.root.is_absolute());
        assert!(config.root.ends_with("site"));
        assert!(config.template_file.is_absolute());
    }

    #[test]
    fn absolute_options_are_kept() {
        let options = BuildOptions {
            assets: "/shared/assets".to_string(),
            ..Default::default()
        };

        let config = BuildConfig::resolve("/site", &options).unwrap();

        assert_eq!(config.assets_dir, PathBuf::from("/shared/assets"));
    }

    #[test]
    fn rejects_colliding_output_names() {
        let options = BuildOptions {
            css_file: "assets".to_string(),
            ..Default::default()
        };

        let err = BuildConfig::resolve("/site", &options).unwrap_err();

        assert!(matches!(err, ConfigError::OutputCollision(name) if name == "assets"));
    }

    #[test]
    fn rejects_nested_output_names() {
        let options = BuildOptions {
            html_file: "pages/index.html".to_string(),
            ..Default::default()
        };

        let err = BuildConfig::resolve("/site", &options).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidName { option: "html_file", .. }));
    }

    #[test]
    fn rejects_output_at_project_root() {
        let options = BuildOptions {
            output: ".".to_string(),
            ..Default::default()
        };

        let err = BuildConfig::resolve("/site", &options).unwrap_err();

        assert!(matches!(err, ConfigError::OutputOverlapsSource { .. }));
    }

    #[test]
    fn rejects_output_inside_source() {
        let options = BuildOptions {
            output: "assets/dist".to_string(),
            ..Default::default()
        };

        let err = BuildConfig::resolve("/site", &options).unwrap_err();

        match err {
            ConfigError::OutputOverlapsSource { source_path, .. } => {
                assert_eq!(source_path, PathBuf::from("/site/assets"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
