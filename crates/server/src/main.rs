// crates/server/src/main.rs
//! Ragline server binary.
//!
//! Starts the Axum HTTP server with placeholder collaborators and a
//! periodic garbage-collection loop for terminal job records.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ragline_server::collaborators::UnconfiguredBackend;
use ragline_server::{create_app, AppState};

/// How often terminal job records are swept.
const GC_INTERVAL: Duration = Duration::from_secs(3600);

/// How long terminal job records are retained for late observers.
const JOB_RETENTION: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Parser)]
#[command(name = "ragline", about = "RAG chat backend with tracked background jobs")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8000, env = "RAGLINE_PORT")]
    port: u16,

    /// Bind address.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let backend = Arc::new(UnconfiguredBackend);
    let state = AppState::new(backend.clone(), backend.clone(), backend);

    // Old terminal records are only useful until the client has observed
    // them; sweep periodically.
    let jobs = Arc::clone(&state.jobs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(GC_INTERVAL);
        loop {
            interval.tick().await;
            jobs.remove_older_than(JOB_RETENTION);
        }
    });

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "ragline server listening");

    axum::serve(listener, create_app(state)).await?;
    Ok(())
}
