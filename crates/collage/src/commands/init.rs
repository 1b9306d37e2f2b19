//! Scaffold a new collage project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::CONFIG_FILE_NAME;

/// Files written by `init`, relative to the project root.
const SCAFFOLD: &[(&str, &str)] = &[
    (CONFIG_FILE_NAME, DEFAULT_CONFIG),
    ("template.html", DEFAULT_TEMPLATE),
    ("components/header.html", DEFAULT_HEADER),
    ("components/footer.html", DEFAULT_FOOTER),
    ("styles/main.css", DEFAULT_STYLES),
];

/// Run the init command.
pub async fn run(root: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing collage project in {}...", root.display());

    if root.join("template.html").exists() && !yes {
        tracing::warn!("template.html already exists. Use --yes to overwrite.");
        return Ok(());
    }

    for dir in ["components", "styles", "assets"] {
        fs::create_dir_all(root.join(dir))
            .with_context(|| format!("Failed to create {} directory", dir))?;
    }

    for (relative, content) in SCAFFOLD {
        let path = root.join(relative);
        if !path.exists() || yes {
            fs::write(&path, content).with_context(|| format!("Failed to write {}", relative))?;
            tracing::info!("Created {}", relative);
        }
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'collage dev' to start the development server.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# collage configuration
# Paths are relative to the project root (--root, default ".").

[build]
# Template with {{name}} placeholders
template = "template.html"

# One <name>.html file per placeholder
components = "components"

# Every .css file here is concatenated into css_file
styles = "styles"

# Copied verbatim into <output>/<assets_dir>
assets = "assets"

# Cleared on every build
output = "project-dist"

html_file = "index.html"
css_file = "style.css"
assets_dir = "assets"
"#;

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>My Page</title>
  <link rel="stylesheet" href="style.css">
</head>
<body>
  {{header}}
  <main>
    <p>Edit template.html and the files in components/.</p>
  </main>
  {{footer}}
</body>
</html>
"#;

const DEFAULT_HEADER: &str = r#"<header class="site-header">
  <h1>My Page</h1>
</header>
"#;

const DEFAULT_FOOTER: &str = r#"<footer class="site-footer">
  <p>Built with collage</p>
</footer>
"#;

const DEFAULT_STYLES: &str = r#"* {
  box-sizing: border-box;
}

body {
  font-family: system-ui, -apple-system, sans-serif;
  margin: 0;
  line-height: 1.6;
}

.site-header,
.site-footer {
  padding: 1rem 2rem;
}

main {
  padding: 2rem;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use collage_static::{BuildConfig, StaticBuilder};
    use tempfile::tempdir;

    #[tokio::test]
    async fn scaffold_builds() {
        let temp = tempdir().unwrap();

        run(temp.path(), false).await.unwrap();

        let config = BuildConfig::with_defaults(temp.path()).unwrap();
        let result = StaticBuilder::new(config).build().await.unwrap();

        assert_eq!(result.fragments, 2);
        assert!(result.unresolved.is_empty());
        let html = fs::read_to_string(temp.path().join("project-dist/index.html")).unwrap();
        assert!(html.contains("<h1>My Page</h1>"));
        assert!(!html.contains("{{"));
    }

    #[tokio::test]
    async fn does_not_overwrite_without_yes() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("template.html"), "mine").unwrap();

        run(temp.path(), false).await.unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("template.html")).unwrap(),
            "mine"
        );
        assert!(!temp.path().join("components").exists());
    }

    #[test]
    fn default_config_parses() {
        let config: crate::config::ConfigFile = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.build.output.as_deref(), Some("project-dist"));
        assert!(DEFAULT_CONFIG.contains("relative to the project root"));
    }
}
