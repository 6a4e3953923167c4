//! Blinc reconcile CLI
//!
//! Replay scene scripts through the reconciler and print host events.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blinc_reconcile::{BuildConfig, Reconciler};

mod kinds;
mod scene;

use scene::Scene;

#[derive(Parser)]
#[command(name = "blinc-reconcile")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Replay Blinc component scenes through the reconciler", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every generation of a scene and print the host events
    Run {
        /// Scene file
        scene: PathBuf,

        /// Build configuration overriding the scene's `[config]` table
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check that a scene parses and only uses known kinds
    Check {
        /// Scene file
        scene: PathBuf,
    },

    /// List the component kinds scenes can use
    Kinds,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { scene, config } => cmd_run(&scene, config.as_deref()),
        Commands::Check { scene } => cmd_check(&scene),
        Commands::Kinds => cmd_kinds(),
    }
}

fn load_config(path: &Path) -> Result<BuildConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    BuildConfig::from_toml_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn cmd_run(path: &Path, config: Option<&Path>) -> Result<()> {
    let scene = Scene::load(path)?;
    let config = match config {
        Some(config) => load_config(config)?,
        None => scene.config.clone(),
    };

    info!(
        "Replaying {} generation(s) from {}",
        scene.generations.len(),
        path.display()
    );

    let reconciler = Reconciler::new(kinds::registry()).with_config(config);
    for line in scene.replay(&reconciler)? {
        println!("{line}");
    }

    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    let scene = Scene::load(path)?;
    let registry = kinds::registry();

    for (index, generation) in scene.generations.iter().enumerate() {
        if let Some(root) = &generation.root {
            root.to_descriptor(&registry)
                .with_context(|| format!("generation {index}"))?;
        }
    }

    println!("{}: {} generation(s) OK", path.display(), scene.generations.len());
    Ok(())
}

fn cmd_kinds() -> Result<()> {
    let registry = kinds::registry();

    println!("Component kinds");
    println!("===============");
    for name in registry.names() {
        let Some(kind) = registry.kind_by_name(name) else {
            continue;
        };
        println!(
            "  {:<8} props: {}  state: {}",
            name,
            registry.props_type_name(kind).unwrap_or("?"),
            registry.state_type_name(kind).unwrap_or("?")
        );
    }

    Ok(())
}
