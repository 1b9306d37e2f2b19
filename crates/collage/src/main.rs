//! collage CLI - assemble a static page from a template and fragments.

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use config::Overrides;

#[derive(Parser)]
#[command(name = "collage")]
#[command(about = "Assemble a static page from a template, HTML fragments, styles and assets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root all paths are resolved against
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Path to collage.toml (defaults to <root>/collage.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new project in the root directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Build the page once
    Build {
        /// Output directory (defaults to config or "project-dist")
        #[arg(short, long)]
        output: Option<String>,

        /// Template file
        #[arg(long)]
        template: Option<String>,

        /// Fragments directory
        #[arg(long)]
        components: Option<String>,

        /// Stylesheets directory
        #[arg(long)]
        styles: Option<String>,

        /// Assets directory
        #[arg(long)]
        assets: Option<String>,
    },

    /// Rebuild on change and serve with live reload
    Dev {
        /// Port to listen on
        #[arg(short, long, default_value = "7777")]
        port: u16,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Copy a directory tree, replacing the destination's contents
    Mirror {
        /// Source directory
        source: PathBuf,

        /// Destination directory (defaults to "<source>-copy")
        #[arg(short, long)]
        dest: Option<PathBuf>,
    },

    /// Concatenate the .css files of a directory into one file
    Bundle {
        /// Stylesheets directory
        #[arg(default_value = "styles")]
        styles: PathBuf,

        /// Bundle file to write
        #[arg(short, long, default_value = "project-dist/bundle.css")]
        output: PathBuf,
    },

    /// List the files of a directory with their extension and size
    Ls {
        /// Directory to list
        dir: PathBuf,
    },

    /// Preview a built output directory
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Directory to serve (defaults to the configured output directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(&cli.root, yes).await?;
        }
        Commands::Build {
            output,
            template,
            components,
            styles,
            assets,
        } => {
            let overrides = Overrides {
                template,
                components,
                styles,
                assets,
                output,
            };
            commands::build::run(&cli.root, config_path, overrides).await?;
        }
        Commands::Dev { port, no_open } => {
            commands::dev::run(&cli.root, config_path, port, !no_open).await?;
        }
        Commands::Mirror { source, dest } => {
            commands::mirror::run(&cli.root, &source, dest.as_deref()).await?;
        }
        Commands::Bundle { styles, output } => {
            commands::bundle::run(&cli.root, &styles, &output).await?;
        }
        Commands::Ls { dir } => {
            commands::ls::run(&cli.root, &dir, &mut io::stdout().lock()).await?;
        }
        Commands::Serve { port, dir } => {
            commands::serve::run(&cli.root, config_path, port, dir).await?;
        }
    }

    Ok(())
}
