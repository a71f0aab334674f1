// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canvass - SMS outreach and follow-up orchestration engine.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod serve;

use clap::{Parser, Subcommand};

/// Canvass - SMS outreach and follow-up orchestration engine.
#[derive(Parser, Debug)]
#[command(name = "canvass", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the engine: periodic follow-up sweeps until shut down.
    Serve,
    /// Run a single follow-up sweep pass and exit.
    Sweep,
    /// Manage campaigns.
    Campaign {
        #[command(subcommand)]
        command: CampaignCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CampaignCommands {
    /// Start a draft campaign and wait for it to finish.
    Start { campaign_id: String },
    /// Pause a running campaign.
    Stop { campaign_id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match canvass_config::load_and_validate() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("canvass: {e}");
            std::process::exit(1);
        }
    };
    serve::init_tracing(&config.engine.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Sweep => serve::run_sweep(config).await,
        Commands::Campaign { command } => match command {
            CampaignCommands::Start { campaign_id } => {
                serve::run_campaign_start(config, &campaign_id).await
            }
            CampaignCommands::Stop { campaign_id } => {
                serve::run_campaign_stop(config, &campaign_id).await
            }
        },
    };

    if let Err(e) = result {
        eprintln!("canvass: {e}");
        std::process::exit(1);
    }
}
