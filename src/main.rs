// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use chatrelay::config::{self, ConfigSource};
use chatrelay::proxy;
use chatrelay::upstream;

use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "chatrelay", about = "Streaming chat completion relay")]
struct Cli {
    /// Path to the chatrelay.yaml config file
    #[arg(long, default_value = "chatrelay.yaml", env = "CHATRELAY_CONFIG")]
    config: String,

    /// Port to listen on
    #[arg(long, default_value_t = 9800, env = "CHATRELAY_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    tracing::info!(%addr, "chatrelay starting");

    let source = config::FileSource {
        path: std::path::PathBuf::from(cli.config),
    };
    let config = match config::load_config(&source) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(origin = %source.origin(), "failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        origin = %source.origin(),
        version = %config.version,
        environment = %config.environment,
        model = %config.upstream.model,
        upstream = %config.upstream.completions_url(),
        credential = config.upstream.api_key.is_some(),
        config_hash = %config.config_hash,
        "config loaded"
    );

    let http: Arc<dyn upstream::HttpSender> = Arc::new(upstream::ReqwestHttpSender::default());
    let state = match proxy::AppState::from_config(&config, http) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("invalid upstream configuration: {e}");
            std::process::exit(1);
        }
    };

    let app = proxy::build_router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, "failed to bind: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "chatrelay listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
