//! `ev3explorer`: browse and manage the file system of a LEGO EV3 brick.

#![allow(clippy::print_stdout)]

mod compiler;
mod config;
mod link;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ev3explorer_file_ops::{BrickPath, Explorer};
use ev3explorer_transfer::{DirectoryEntry, checksum_bytes, verify_checksum};
use tracing_subscriber::EnvFilter;

use crate::compiler::ExternalCompiler;
use crate::config::Config;
use crate::link::{LinkConnector, LinkTarget};

#[derive(Parser)]
#[command(name = "ev3explorer", version, about = "File explorer for LEGO EV3 bricks")]
struct Cli {
    /// Configuration file (defaults to the per-user location).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial or RFCOMM device node of the brick.
    #[arg(long, global = true, conflicts_with = "address")]
    device: Option<String>,

    /// `host:port` of a TCP bridge to the brick.
    #[arg(long, global = true)]
    address: Option<String>,

    /// Brick directory to work in.
    #[arg(long, global = true)]
    dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the directory.
    Ls {
        /// Print entries as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Copy a file from the brick.
    Get {
        /// File name in the brick directory.
        name: String,
        /// Local destination (defaults to the same name).
        dest: Option<PathBuf>,
    },

    /// Copy a local file onto the brick.
    Put {
        /// Local file.
        file: PathBuf,
        /// Read the file back and compare digests.
        #[arg(long)]
        verify: bool,
    },

    /// Create a sub-directory.
    Mkdir { name: String },

    /// Delete a file.
    Rm { name: String },

    /// Delete the directory itself; it must be empty.
    Rmdir,

    /// Start a program image.
    Run { name: String },

    /// Compile a `.sb` or `.lms` source, download the image and optionally
    /// start it.
    Deploy {
        /// Local source file.
        source: PathBuf,
        /// Start the program after downloading.
        #[arg(long)]
        run: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(device) = cli.device {
        config.device = device;
        config.address = None;
    }
    if let Some(address) = cli.address {
        config.address = Some(address);
    }
    if let Some(dir) = cli.dir {
        config.start_directory = dir;
    }

    let target = LinkTarget::from_config(&config);
    tracing::debug!(?target, dir = %config.start_directory, "starting");
    let connector = LinkConnector::new(target, Duration::from_secs(config.timeout_secs));
    let mut explorer = Explorer::new(
        connector,
        BrickPath::new(config.root_prefix.clone(), &config.start_directory),
        config.transfer_options(),
    );

    run(&mut explorer, &config, cli.command)
}

fn run(explorer: &mut Explorer<LinkConnector>, config: &Config, command: Command) -> Result<()> {
    let dir = explorer.path().directory();
    match command {
        Command::Ls { json } => {
            let entries = explorer
                .refresh()
                .with_context(|| format!("listing {dir}"))?;
            print_entries(entries, json)?;
        }
        Command::Get { name, dest } => {
            explorer.refresh().with_context(|| format!("listing {dir}"))?;
            let data = explorer
                .download(&name)
                .with_context(|| format!("reading {name} from the brick"))?;
            let dest = dest.unwrap_or_else(|| PathBuf::from(&name));
            std::fs::write(&dest, &data)
                .with_context(|| format!("writing {}", dest.display()))?;
            tracing::info!(
                file = %dest.display(),
                bytes = data.len(),
                sha256 = %checksum_bytes(&data),
                "file received"
            );
        }
        Command::Put { file, verify } => {
            let name = file_name(&file)?;
            let data =
                std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let digest = checksum_bytes(&data);
            explorer
                .upload(&name, &data)
                .with_context(|| format!("writing {name} to the brick"))?;
            tracing::info!(%name, bytes = data.len(), sha256 = %digest, "file sent");
            if verify {
                let back = explorer
                    .download(&name)
                    .with_context(|| format!("reading {name} back"))?;
                verify_checksum(&back, &digest).context("verification failed")?;
                tracing::info!(%name, "verified");
            }
        }
        Command::Mkdir { name } => {
            explorer
                .create_directory(&name)
                .with_context(|| format!("creating {name} in {dir}"))?;
        }
        Command::Rm { name } => {
            explorer.refresh().with_context(|| format!("listing {dir}"))?;
            explorer
                .delete_file(&name)
                .with_context(|| format!("deleting {name}"))?;
        }
        Command::Rmdir => {
            explorer.refresh().with_context(|| format!("listing {dir}"))?;
            explorer
                .delete_current_directory()
                .with_context(|| format!("deleting {dir}"))?;
        }
        Command::Run { name } => {
            explorer
                .run(&name)
                .with_context(|| format!("starting {name}"))?;
        }
        Command::Deploy { source, run } => {
            let Some(compiler) = &config.compiler else {
                bail!("no compiler configured; add a [compiler] section to the configuration");
            };
            let source_name = file_name(&source)?;
            let text = std::fs::read(&source)
                .with_context(|| format!("reading {}", source.display()))?;
            match explorer.deploy(&source_name, &text, ExternalCompiler::new(compiler), run) {
                Ok(image) => tracing::info!(%image, started = run, "deployed"),
                Err(ev3explorer_file_ops::ExplorerError::Compile(errors)) => {
                    for e in &errors {
                        eprintln!("{}: {e}", source.display());
                    }
                    bail!("{} failed to compile", source.display());
                }
                Err(e) => return Err(e).with_context(|| format!("deploying {source_name}")),
            }
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(String::from)
        .with_context(|| format!("{} has no usable file name", path.display()))
}

fn print_entries(entries: &[DirectoryEntry], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }
    for entry in entries {
        if entry.is_directory() {
            println!("{:>10}  {}/", "", entry.name());
        } else {
            println!("{:>10}  {}", entry.size_bytes(), entry.name());
        }
    }
    Ok(())
}
