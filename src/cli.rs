// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "conduit",
    about = "Multi-provider LLM routing and orchestration server (MCP over stdio)",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Increase log verbosity (-v debug, -vv trace).  Logs go to stderr;
    /// stdout belongs to the MCP transport.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve MCP on stdin/stdout (the default when no subcommand is given).
    Serve,
    /// List models available from the configured providers.
    ListModels {
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
        /// Ignore allow-list restrictions in the listing.
        #[arg(long)]
        all: bool,
    },
    /// List the supported provider kinds and their configuration status.
    ListProviders {
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration.
    ShowConfig,
}
