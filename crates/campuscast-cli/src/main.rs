//! CampusCast CLI - Source resolution and headless playback tool
//!
//! Features:
//! - Resolve a content id to its HLS manifest and poster
//! - Wait for a transcode to settle
//! - Drive the playback controller against a simulated engine
//! - Print effective player options

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

mod commands;
mod output;

/// CampusCast CLI - Lecture playback toolkit
#[derive(Parser)]
#[command(name = "campuscast")]
#[command(author = "CampusCast Developers")]
#[command(version)]
#[command(about = "Playback controller toolkit for CampusCast", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Player options as a JSON file; missing fields use defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a content id to a playback source
    Resolve {
        /// Content id
        content_id: String,

        /// Backend base URL
        #[arg(short, long, default_value = "http://localhost:4000")]
        api_base: String,

        /// Poll until the transcode completes or fails
        #[arg(short, long)]
        wait: bool,

        /// Poll interval in seconds
        #[arg(short, long, default_value = "3")]
        interval: u64,

        /// Retries on 502/503/504 before giving up
        #[arg(short, long, default_value = "2")]
        retries: u32,
    },

    /// Run the controller against a simulated engine and media element
    Simulate {
        /// Rendition heights, comma separated
        #[arg(short, long, default_value = "1080,720,480")]
        levels: String,

        /// Seconds buffered ahead of the playhead
        #[arg(short, long, default_value = "10")]
        buffer: f64,

        /// Playhead position in seconds
        #[arg(short, long, default_value = "30")]
        position: f64,

        /// Quality to select: auto, a height (720), or a level index (#1)
        #[arg(short, long, default_value = "auto")]
        select: String,

        /// Simulate a platform that plays HLS natively
        #[arg(long)]
        native: bool,
    },

    /// Show the effective player options
    Options,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    let options = commands::load_options(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve { content_id, api_base, wait, interval, retries } => {
            let request = commands::ResolveRequest {
                content_id,
                api_base,
                wait,
                interval: Duration::from_secs(interval),
                retries,
            };
            commands::resolve(request, &cli.format).await?;
        }
        Commands::Simulate { levels, buffer, position, select, native } => {
            let scenario = commands::Scenario {
                heights: commands::parse_heights(&levels)?,
                buffer_sec: buffer,
                position_sec: position,
                preference: commands::parse_preference(&select)?,
                native,
            };
            commands::simulate(scenario, options, &cli.format).await?;
        }
        Commands::Options => {
            println!("{}", output::format_output(&options, "json"));
        }
    }

    Ok(())
}
