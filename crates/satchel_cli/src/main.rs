use clap::{Parser, Subcommand};
use satchel_client::RemoteProvider;
use satchel_core::prelude::*;
use satchel_fs::LocalProvider;
use satchel_runtime::{Bundles, HandleState};
use std::path::PathBuf;

mod config;
mod pack;

use config::{CliConfig, Source};

#[derive(Parser)]
#[command(name = "satchel")]
#[command(about = "CLI for Satchel asset bundles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Bundle source and project settings
    #[arg(short, long, env = "SATCHEL_CONFIG", default_value = "satchel.json")]
    config: PathBuf,

    /// Overrides the token of a remote source
    #[arg(short, long, env = "SATCHEL_TOKEN")]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the bundles and report what was found
    Init,
    /// List every asset key in the catalog
    Keys,
    /// Bytes still to download for a label set
    DownloadSize {
        #[arg(long, value_delimiter = ',', required = true)]
        labels: Vec<String>,
    },
    /// Download everything referenced by a label set
    Download {
        #[arg(long, value_delimiter = ',', required = true)]
        labels: Vec<String>,
    },
    /// Load an asset and print it or write it to a file
    LoadAsset {
        key: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load a scene
    LoadScene {
        key: String,
        #[arg(long)]
        additive: bool,
        /// Unload the scene again once it is loaded
        #[arg(long)]
        unload: bool,
    },
    /// Instantiate a prefab
    Instantiate {
        key: String,
        #[arg(long)]
        log: bool,
    },
    /// Build a local bundle directory from a folder of assets
    Pack {
        /// The directory containing assets (e.g., "./assets")
        #[arg(long)]
        dir: PathBuf,

        /// Output bundle directory
        #[arg(long, default_value = "bundles")]
        out: PathBuf,

        /// The catalog version (e.g., "0.1.0" or git sha)
        #[arg(long)]
        version: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Pack { dir, out, version } = &cli.command {
        println!("Packing version '{version}' from {dir:?} into {out:?}...");
        let catalog = pack::pack(dir, out, version, whoami::username()?).await?;
        println!(
            "Packed version {version} with {} assets.",
            catalog.assets.len()
        );
        return Ok(());
    }

    let config = CliConfig::load(&cli.config).await?;
    match config.source {
        Source::Local { root } => {
            run(LocalProvider::new(root), config.settings, cli.command).await
        }
        Source::Remote {
            url,
            version,
            cache_dir,
            token,
        } => {
            let provider = RemoteProvider::new(url, cache_dir)
                .with_version(version)
                .with_token(cli.token.or(token));
            run(provider, config.settings, cli.command).await
        }
    }
}

async fn run<P: ResourceProvider>(
    provider: P,
    settings: ProjectSettings,
    command: Commands,
) -> anyhow::Result<()> {
    let mut bundles = Bundles::new(provider, settings);
    let report = bundles.initialize().await?;
    for error in &report.errors {
        eprintln!("Warning: {error}");
    }

    match command {
        Commands::Init => {
            println!("Initialized with {} asset keys.", report.asset_keys);
            if !report.updated_catalogs.is_empty() {
                println!("Updated catalogs: {}", report.updated_catalogs.join(", "));
            }
            match report.preloaded {
                Some(true) => println!("Preload labels downloaded."),
                Some(false) => println!("Preload labels already available."),
                None => {}
            }
        }
        Commands::Keys => {
            for key in bundles.asset_keys().iter() {
                println!("{key}");
            }
        }
        Commands::DownloadSize { labels } => {
            let size = bundles.download_size(labels).await?;
            println!("{size}");
        }
        Commands::Download { labels } => {
            let handler = bundles
                .download_dependencies(labels)
                .on_before_download(|size| println!("Downloading {size} bytes..."))
                .on_progress(|p| {
                    println!(
                        "{:>5.1}% ({}/{})",
                        p.completed_percent() * 100.0,
                        p.current_value,
                        p.total_value
                    )
                });
            finish(handler.wait().await, handler.error())?;
            match handler.result().map(|downloaded| *downloaded) {
                Some(true) => println!("Download complete."),
                _ => println!("Nothing to download."),
            }
        }
        Commands::LoadAsset { key, output } => {
            let handler = bundles.load_asset::<bytes::Bytes>(&key);
            finish(handler.wait().await, handler.error())?;
            if let Some(data) = handler.result() {
                match output {
                    Some(output) => {
                        if let Some(parent) = output.parent() {
                            tokio::fs::create_dir_all(parent).await?;
                        }
                        tokio::fs::write(&output, data.as_ref()).await?;
                        println!("Saved {key} to {output:?}");
                    }
                    None => println!("{}", String::from_utf8_lossy(&data)),
                }
            }
        }
        Commands::LoadScene {
            key,
            additive,
            unload,
        } => {
            let mode = if additive {
                LoadSceneMode::Additive
            } else {
                LoadSceneMode::Single
            };
            let handler = bundles
                .load_scene(&key, mode)
                .on_progress(|p| println!("{:>5.1}%", p.completed_percent() * 100.0));
            finish(handler.wait().await, handler.error())?;
            if let Some(scene) = handler.result() {
                println!("Loaded scene '{}' ({}) as #{}", scene.name, scene.mode, scene.id);
                if unload {
                    let unloader = bundles.unload_scene(scene.as_ref().clone());
                    finish(unloader.wait().await, unloader.error())?;
                    println!("Unloaded scene '{}'", scene.name);
                }
            }
        }
        Commands::Instantiate { key, log } => {
            let handler = bundles.instantiate(&key, log);
            finish(handler.wait().await, handler.error())?;
            if let Some(instance) = handler.result() {
                println!("Instantiated '{}' as #{}", instance.name, instance.id);
            }
        }
        Commands::Pack { .. } => anyhow::bail!("pack does not read from a bundle source"),
    }

    Ok(())
}

fn finish(state: HandleState, error: Option<ErrorMessage>) -> anyhow::Result<()> {
    match (state, error) {
        (HandleState::Succeeded, _) => Ok(()),
        (state, Some(error)) => anyhow::bail!("{state:?}: {error}"),
        (state, None) => anyhow::bail!("request ended as {state:?}"),
    }
}
