//! oas-fake CLI
//!
//! Serves an OpenAPI contract as a fake upstream. Point an application at
//! the listener as its HTTP proxy or API base URL.
//!
//! Usage:
//!   oas-fake --contract openapi.yaml [--mode replay] [--port 8089]

use anyhow::Context;
use clap::Parser;
use oas_fake::config::Config;
use oas_fake::vcr::{HttpInterceptor, Mode, ModeManager};
use std::path::PathBuf;
use tracing::info;

/// Fake an HTTP API from its OpenAPI contract
#[derive(Parser, Debug)]
#[command(name = "oas-fake")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// OpenAPI contract (YAML or JSON)
    #[arg(long)]
    contract: Option<PathBuf>,

    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// record, replay or passthrough (default: OAS_FAKE_MODE, then replay)
    #[arg(short, long)]
    mode: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Real target for origin-form requests in record/passthrough modes
    #[arg(long)]
    upstream: Option<String>,

    #[arg(long)]
    no_request_validation: bool,

    #[arg(long)]
    no_response_validation: bool,
}

impl Args {
    /// Config file values with command-line flags on top.
    fn into_config(self) -> Result<Config, anyhow::Error> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(contract) = self.contract {
            config.contract = Some(contract);
        }
        if let Some(mode) = self.mode {
            config.mode = Some(mode);
        }
        if let Some(host) = self.host {
            config.listen.host = host;
        }
        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if self.upstream.is_some() {
            config.upstream = self.upstream;
        }
        if self.no_request_validation {
            config.validation.requests = false;
        }
        if self.no_response_validation {
            config.validation.responses = false;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config()?;
    let settings = config.to_settings().context("Failed to resolve settings")?;
    if settings.contract.is_none() {
        anyhow::bail!("No contract given. Use --contract or set 'contract' in the config file");
    }
    let mode = settings.mode;

    let mut interceptor = HttpInterceptor::new(config.listen_addr()?);
    if let Some(upstream) = &config.upstream {
        interceptor = interceptor.with_upstream(upstream.clone());
    }
    let manager = ModeManager::new(interceptor, settings);
    manager.start()?;

    if let Some(addr) = manager.interceptor().local_addr() {
        info!("oas-fake ready on http://{} ({} mode)", addr, mode);
    }
    if mode != Mode::Replay && config.upstream.is_none() {
        info!("No upstream configured; origin-form requests are forwarded by Host header");
    }

    tokio::signal::ctrl_c().await.ok();
    info!("Shutting down");
    manager.stop()?;
    Ok(())
}
