// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use conduit_model::{registry, restrictions, ProviderKind};
use conduit_tools::{register_builtin_tools, ToolDriver, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = conduit_config::load()?;
    init_logging(cli.verbose, &config.log_level);

    // Register providers before anything consults the registry.  Registry
    // configuration errors (malformed custom-models JSON, duplicate aliases)
    // are fatal here, at startup, rather than surfacing mid-call.
    {
        let mut reg = registry::global()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        reg.register_from_env(config.custom_models_path.clone())?;

        // Construct whatever has credentials, then warn about allow-list
        // entries no provider recognises.
        let available = reg.available_providers();
        if available.is_empty() {
            tracing::warn!(
                "no provider credentials configured — every tool call will fail; \
                 set at least one of GEMINI_API_KEY, OPENAI_API_KEY, XAI_API_KEY, \
                 OPENROUTER_API_KEY, CUSTOM_API_URL, DIAL_API_KEY"
            );
        } else {
            tracing::info!(providers = ?available, "providers configured");
        }
        let service = restrictions::service();
        service.validate_against_known(&reg.registered_instances());
        let summary = service.summary();
        if !summary.is_empty() {
            tracing::info!(restrictions = ?summary, "model allow-lists active");
        }
    }

    match cli.command {
        None | Some(Commands::Serve) => serve(config).await,
        Some(Commands::ListModels { json, all }) => list_models(json, !all),
        Some(Commands::ListProviders { json }) => list_providers(json),
        Some(Commands::ShowConfig) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn serve(config: conduit_config::Config) -> anyhow::Result<()> {
    let mut tools = ToolRegistry::new();
    register_builtin_tools(&mut tools);
    let driver = Arc::new(ToolDriver::new(config));

    tracing::info!(
        tools = ?tools.names(),
        workspace_root = %driver.config().workspace_root.display(),
        auto_mode = driver.config().is_auto_mode(),
        "conduit MCP server starting on stdio"
    );

    conduit_mcp::serve_stdio(Arc::new(tools), driver).await
}

fn list_models(as_json: bool, respect_restrictions: bool) -> anyhow::Result<()> {
    let models = {
        let mut reg = registry::global()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        reg.available_models(respect_restrictions)
    };

    if as_json {
        let rows: Vec<serde_json::Value> = models
            .iter()
            .map(|(name, kind)| {
                serde_json::json!({ "model": name, "provider": kind.as_str() })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if models.is_empty() {
        println!("No models available (no provider credentials configured).");
        return Ok(());
    }

    let name_w = models.keys().map(|m| m.len()).max().unwrap_or(10).max(10);
    println!("{:<name_w$}  PROVIDER", "MODEL", name_w = name_w);
    println!("{}", "-".repeat(name_w + 12));
    for (name, kind) in &models {
        println!("{:<name_w$}  {}", name, kind.as_str(), name_w = name_w);
    }
    println!("\nTotal: {} model(s)", models.len());
    Ok(())
}

fn list_providers(as_json: bool) -> anyhow::Result<()> {
    let configured: Vec<ProviderKind> = {
        let mut reg = registry::global()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        reg.available_providers()
    };

    let rows: Vec<(ProviderKind, &str, bool)> = ProviderKind::priority_order()
        .into_iter()
        .map(|kind| {
            let credential = match kind {
                ProviderKind::Google => "GEMINI_API_KEY",
                ProviderKind::OpenAi => "OPENAI_API_KEY",
                ProviderKind::XAi => "XAI_API_KEY",
                ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
                ProviderKind::Custom => "CUSTOM_API_URL",
                ProviderKind::Dial => "DIAL_API_KEY",
            };
            (kind, credential, configured.contains(&kind))
        })
        .collect();

    if as_json {
        let json_rows: Vec<serde_json::Value> = rows
            .iter()
            .map(|(kind, credential, active)| {
                serde_json::json!({
                    "provider": kind.as_str(),
                    "credential_env": credential,
                    "configured": active,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json_rows)?);
        return Ok(());
    }

    println!("{:<12}  {:<20}  CONFIGURED", "PROVIDER", "CREDENTIAL ENV");
    println!("{}", "-".repeat(46));
    for (kind, credential, active) in rows {
        println!(
            "{:<12}  {:<20}  {}",
            kind.as_str(),
            credential,
            if active { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn init_logging(verbosity: u8, config_level: &str) {
    // stdout carries the MCP transport; all logging goes to stderr.
    let level = match verbosity {
        0 => config_level.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
