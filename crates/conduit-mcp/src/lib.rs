// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `conduit-mcp` — MCP (Model Context Protocol) server for conduit.
//!
//! Exposes the routing tools to any MCP-compatible host over **stdio**
//! transport using line-delimited JSON-RPC with the standard four-message
//! handshake (`initialize`, `notifications/initialized`, `tools/list`,
//! `tools/call`).
//!
//! # Architecture
//!
//! ```text
//! MCP host (editor, CLI agent, …)
//!       │  stdin/stdout (line-delimited JSON-RPC)
//!       ▼
//! ConduitMcpServer (rmcp ServerHandler)
//!       │
//!       ▼
//! ToolRegistry ──► ToolDriver::execute() ──► provider registry
//! ```

pub mod bridge;
pub mod server;

pub use server::ConduitMcpServer;

use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;

use conduit_tools::{ToolDriver, ToolRegistry};

/// Serve the given tools on stdin/stdout until the client disconnects.
///
/// Designed to be the sole operation of the `conduit serve` subcommand.
pub async fn serve_stdio(registry: Arc<ToolRegistry>, driver: Arc<ToolDriver>) -> Result<()> {
    let server = ConduitMcpServer::new(registry, driver);
    let running = server
        .serve((tokio::io::stdin(), tokio::io::stdout()))
        .await
        .map_err(|e| anyhow::anyhow!("MCP server init error: {e}"))?;
    running
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;
    Ok(())
}
