//! Development server command.

use std::path::Path;

use anyhow::Result;
use collage_server::{DevServer, DevServerConfig};

use crate::config::{self, Overrides};

/// Run the dev server.
pub async fn run(root: &Path, config_path: Option<&Path>, port: u16, open: bool) -> Result<()> {
    tracing::info!("Starting development server on port {}", port);

    let build = config::resolve(root, config_path, Overrides::default())?;

    let config = DevServerConfig {
        port,
        open,
        ..DevServerConfig::new(build)
    };

    DevServer::new(config).start().await?;

    Ok(())
}
