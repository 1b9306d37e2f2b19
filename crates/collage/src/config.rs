//! Project configuration file (collage.toml).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use collage_static::config::normalize;
use collage_static::{BuildConfig, BuildOptions};
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "collage.toml";

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub build: BuildSection,
}

/// `[build]` table. Unset keys fall back to the conventional layout.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    pub template: Option<String>,
    pub components: Option<String>,
    pub styles: Option<String>,
    pub assets: Option<String>,
    pub output: Option<String>,
    pub html_file: Option<String>,
    pub css_file: Option<String>,
    pub assets_dir: Option<String>,
}

/// Source path overrides given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub template: Option<String>,
    pub components: Option<String>,
    pub styles: Option<String>,
    pub assets: Option<String>,
    pub output: Option<String>,
}

impl ConfigFile {
    /// Merge defaults, file values and command line overrides, in that order.
    pub fn into_options(self, overrides: Overrides) -> BuildOptions {
        let defaults = BuildOptions::default();
        let file = self.build;

        BuildOptions {
            template: overrides.template.or(file.template).unwrap_or(defaults.template),
            components: overrides
                .components
                .or(file.components)
                .unwrap_or(defaults.components),
            styles: overrides.styles.or(file.styles).unwrap_or(defaults.styles),
            assets: overrides.assets.or(file.assets).unwrap_or(defaults.assets),
            output: overrides.output.or(file.output).unwrap_or(defaults.output),
            html_file: file.html_file.unwrap_or(defaults.html_file),
            css_file: file.css_file.unwrap_or(defaults.css_file),
            assets_dir: file.assets_dir.unwrap_or(defaults.assets_dir),
        }
    }
}

/// Load the configuration file.
///
/// With no explicit path, `collage.toml` under `root` is used if present.
/// An explicit path must exist. A malformed file is always an error.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<ConfigFile> {
    let path: PathBuf = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = root.join(CONFIG_FILE_NAME);
            if !default.exists() {
                return Ok(ConfigFile::default());
            }
            default
        }
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Resolve a path argument against `root` into an absolute, normalized path.
pub fn resolve_path(root: &Path, path: &Path) -> Result<PathBuf> {
    let joined = root.join(path);
    let absolute = std::path::absolute(&joined)
        .with_context(|| format!("Failed to resolve {}", joined.display()))?;
    Ok(normalize(&absolute))
}

/// Load the configuration and resolve it against `root`.
pub fn resolve(root: &Path, explicit: Option<&Path>, overrides: Overrides) -> Result<BuildConfig> {
    let options = load_config(root, explicit)?.into_options(overrides);
    BuildConfig::resolve(root, &options).context("Invalid build configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_default_file_means_defaults() {
        let temp = tempdir().unwrap();

        let options = load_config(temp.path(), None)
            .unwrap()
            .into_options(Overrides::default());

        assert_eq!(options, BuildOptions::default());
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let temp = tempdir().unwrap();
        let result = load_config(temp.path(), Some(&temp.path().join("other.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn overrides_beat_file_values() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[build]\noutput = \"public\"\nstyles = \"css\"\ncss_file = \"bundle.css\"\n",
        )
        .unwrap();

        let options = load_config(temp.path(), None).unwrap().into_options(Overrides {
            output: Some("dist".to_string()),
            ..Default::default()
        });

        assert_eq!(options.output, "dist");
        assert_eq!(options.styles, "css");
        assert_eq!(options.css_file, "bundle.css");
        assert_eq!(options.template, "template.html");
    }

    #[test]
    fn resolves_path_arguments_against_root() {
        let resolved = resolve_path(Path::new("/site"), Path::new("./files/../assets")).unwrap();
        assert_eq!(resolved, PathBuf::from("/site/assets"));

        let absolute = resolve_path(Path::new("/site"), Path::new("/elsewhere")).unwrap();
        assert_eq!(absolute, PathBuf::from("/elsewhere"));
    }

    #[test]
    fn explicit_config_paths_resolve_against_root() {
        let temp = tempdir().unwrap();
        let conf_dir = temp.path().join("conf");
        let site = temp.path().join("site");
        fs::create_dir_all(&conf_dir).unwrap();
        fs::write(conf_dir.join("other.toml"), "[build]\noutput = \"public\"\n").unwrap();

        let config = resolve(&site, Some(&conf_dir.join("other.toml")), Overrides::default()).unwrap();

        assert_eq!(config.output_dir, config.root.join("public"));
        assert!(config.root.ends_with("site"));
    }

    #[test]
    fn malformed_file_is_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join(CONFIG_FILE_NAME), "[build]\nunknown = 1\n").unwrap();

        assert!(load_config(temp.path(), None).is_err());
    }
}
