//! # drop-cli
//!
//! Command-line sender and receiver for 0k-Drop.
//!
//! ## Commands
//!
//! - `upload`: Encrypt a file locally and print its share link
//! - `download`: Fetch and decrypt a share link
//! - `inspect`: Show what a link contains, offline
//! - `config`: Show or change the relay URL and default expiration
//!
//! ## Example
//!
//! ```bash
//! # Point at a relay
//! drop-cli config --relay https://drop.example
//!
//! # Send a file that can be downloaded once
//! drop-cli upload report.pdf --one-time
//!
//! # Receive it
//! drop-cli download 'https://drop.example/Xy3k9QzL0aB7mN2p#<key>' --output ~/Downloads
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{configure, download, inspect, upload};

/// Zero-knowledge file transfer from the command line.
#[derive(Parser, Debug)]
#[command(name = "drop-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory for stored settings
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file and upload it
    Upload {
        /// File to send
        file: PathBuf,

        /// Minutes until the link expires (default from config)
        #[arg(long, short)]
        expires: Option<u32>,

        /// Protect the link with a password (prompted, not echoed)
        #[arg(long, short)]
        password: bool,

        /// Maximum number of downloads
        #[arg(long, conflicts_with = "one_time")]
        limit: Option<u32>,

        /// Delete the file after the first download
        #[arg(long)]
        one_time: bool,

        /// MIME type (guessed from the extension if omitted)
        #[arg(long)]
        mime_type: Option<String>,
    },

    /// Download and decrypt a shared file
    Download {
        /// Share link
        link: String,

        /// Key, if the link was shared without its '#' part. Prefer DROP_KEY
        /// or the interactive prompt: arguments end up in shell history and
        /// the process list
        #[arg(long, env = "DROP_KEY", hide_env_values = true)]
        key: Option<String>,

        /// Ask for the password up front (prompted, not echoed)
        #[arg(long, short)]
        password: bool,

        /// Directory to save into
        #[arg(long, short, default_value = ".")]
        output: PathBuf,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show what a share link contains without contacting the relay
    Inspect {
        /// Share link
        link: String,
    },

    /// Show or change settings
    Config {
        /// Relay URL
        #[arg(long)]
        relay: Option<String>,

        /// Default expiration in minutes
        #[arg(long)]
        expires: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Upload {
            file,
            expires,
            password,
            limit,
            one_time,
            mime_type,
        } => {
            let data_dir = data_dir(cli.data_dir).await?;
            let password = if password {
                Some(read_new_password()?)
            } else {
                None
            };
            let args = upload::UploadArgs {
                file,
                expires,
                password,
                download_limit: limit,
                one_time,
                mime_type,
            };
            upload::run(&data_dir, args).await?;
        }
        Commands::Download {
            link,
            key,
            password,
            output,
            force,
        } => {
            let password = if password {
                Some(rpassword::prompt_password("Password: ").context("Failed to read password")?)
            } else {
                None
            };
            let args = download::DownloadArgs {
                link,
                key,
                password,
                output_dir: output,
                force,
            };
            download::run(args).await?;
        }
        Commands::Inspect { link } => {
            inspect::run(&link)?;
        }
        Commands::Config { relay, expires } => {
            let data_dir = data_dir(cli.data_dir).await?;
            configure::run(&data_dir, relay, expires).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve and create the data directory.
async fn data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let data_dir = match explicit {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    config::set_dir_permissions_0700(&data_dir).await?;
    Ok(data_dir)
}

/// Get the default data directory for drop-cli.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "zerok", "drop-cli")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

fn read_new_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    let confirm = rpassword::prompt_password("Confirm password: ")
        .context("Failed to read password")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}
