use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use addon_dist::addon::TomlAddonLoader;
use addon_dist::pipeline::{self, load_layout};

/// Compile addon modules into JSON artifacts and a metadata index.
#[derive(Parser)]
#[command(name = "addon-dist", version, about, long_about = None)]
struct Cli {
    /// Project root that configured directories are resolved against.
    #[arg(long, global = true, env = "ADDON_DIST_ROOT")]
    root: Option<PathBuf>,

    /// Build config file (default: <root>/addon-dist.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the output directory from scratch.
    Build {
        /// Override the configured output directory.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Load every addon module and print where its artifact would go.
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("resolving current directory")?,
    };
    let mut layout = load_layout(&root, cli.config.as_deref())?;

    match cli.command {
        Commands::Build { out } => {
            if let Some(out) = out {
                layout
                    .set_out_dir(&out)
                    .with_context(|| format!("invalid --out '{}'", out.display()))?;
            }
            let report = pipeline::build(&layout, &TomlAddonLoader)
                .with_context(|| format!("building addons into '{}'", layout.out_dir.display()))?;
            if !cli.quiet {
                println!(
                    "Built {} addons into {} ({} static files copied, {} collisions)",
                    report.addons.len(),
                    layout.out_dir.display(),
                    report.overlay.copied,
                    report.overlay.collisions.len()
                );
            }
        }
        Commands::List => {
            for addon in pipeline::check_addons(&layout, &TomlAddonLoader)? {
                println!("{}\t{}", addon.source.relative, addon.path);
            }
        }
    }
    Ok(())
}

fn init_tracing(quiet: bool, verbose: u8) {
    let default = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
