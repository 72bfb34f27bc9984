//! Altary MCP server: exposes Altary error tracking to an AI assistant over
//! stdio, with a browser-based login that hands the token back through a
//! loopback callback.
//!
//! stdout carries the protocol, so all logging goes to stderr.

mod altary;
mod app;
mod auth;
mod config;
mod constants;
mod error;
mod mcp;
#[cfg(test)]
mod test_support;
mod util;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::ServiceExt;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::mcp::AltaryServer;
use crate::util::{env_first, env_flag};

// ── Entry point ──────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let app = Arc::new(App::load().context("load Altary configuration")?);
    tracing::info!(config = %app.config_path().display(), "starting Altary MCP server");

    let service = AltaryServer::new(Arc::clone(&app))
        .serve(rmcp::transport::stdio())
        .await
        .context("start MCP stdio transport")?;

    if env_flag("ALTARY_STARTUP_AUTH", true) {
        spawn_startup_check(app);
    }

    service.waiting().await.context("MCP server stopped")?;
    Ok(())
}

// ── Logging ──────────────────────────────────────────────────────────

/// `RUST_LOG` filters (default `info`); `RUST_LOG_FORMAT=json` emits JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    let json = env_first(&["RUST_LOG_FORMAT"]).is_some_and(|format| format.trim() == "json");
    if json {
        builder.json().init();
    } else {
        builder.with_ansi(false).init();
    }
}

// ── Startup login ────────────────────────────────────────────────────

fn spawn_startup_check(app: Arc<App>) {
    tokio::spawn(async move {
        match app.startup_check().await {
            Ok(status) => tracing::debug!(?status, "startup login check finished"),
            Err(err) => tracing::warn!(%err, "startup login check failed"),
        }
    });
}
