//! wireq CLI: run the local wireq server, consume one over HTTP, or drain a
//! seeded queue in-process.

mod config;
mod demo;
mod fixtures;
mod http;
mod receive;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wireq_core::QueueEngine;

use crate::config::QueueArgs;
use crate::receive::{Mode, Receiver};

#[derive(Parser)]
#[command(name = "wireq", about = "Local simulation of the wireq delivery queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the queue over HTTP
    Serve {
        #[command(flatten)]
        queue: QueueArgs,
        /// Port to listen on (localhost only)
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
        /// Synthetic articles to enqueue at startup
        #[arg(long, env = "NUMBER_OF_FILES", default_value_t = 0)]
        seed: usize,
    },
    /// Seed an in-process queue and drain it with get/delete
    Demo {
        #[command(flatten)]
        queue: QueueArgs,
        /// Synthetic articles to enqueue
        #[arg(long, env = "NUMBER_OF_FILES", default_value_t = 100)]
        seed: usize,
        /// Factor applied to retry-after hints before sleeping
        #[arg(long, default_value_t = 0.001)]
        time_scale: f64,
    },
    /// Poll a running wireq and store every entry on disk
    Receive {
        /// Base URL of the wireq, e.g. http://127.0.0.1:8080/
        #[arg(long, env = "BASE_URL")]
        base_url: String,
        #[arg(long, value_enum, default_value_t = Mode::Get)]
        mode: Mode,
        /// Directory entries are written to
        #[arg(long, env = "OUTPUT_DIR", default_value = "wireq-output")]
        out: PathBuf,
        /// Stop after a poll that returns no entries
        #[arg(long)]
        until_drained: bool,
        /// Factor applied to retry-after hints before sleeping
        #[arg(long, default_value_t = 1.0)]
        time_scale: f64,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn seeded_engine(queue: &QueueArgs, seed: usize) -> anyhow::Result<QueueEngine> {
    let config = queue.to_config().context("invalid queue configuration")?;
    let engine = QueueEngine::new(config);
    let articles = fixtures::generate_articles(seed, Utc::now(), &mut rand::thread_rng());
    engine.enqueue(articles);
    Ok(engine)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    match Cli::parse().command {
        Command::Serve { queue, port, seed } => {
            let engine = Arc::new(seeded_engine(&queue, seed)?);
            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!(%addr, seeded = seed, "local wireq serving");
            axum::serve(listener, http::create_router(engine))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("HTTP server error")?;
        }
        Command::Demo {
            queue,
            seed,
            time_scale,
        } => {
            let engine = seeded_engine(&queue, seed)?;
            let report = demo::drain(&engine, time_scale).await;
            info!(
                received = report.received.len(),
                polls = report.polls,
                throttled = report.throttled,
                rejected_deletes = report.rejected_deletes,
                "drained"
            );
            println!("{}", serde_json::to_string_pretty(&engine.stats())?);
        }
        Command::Receive {
            base_url,
            mode,
            out,
            until_drained,
            time_scale,
        } => {
            info!(%base_url, ?mode, out = %out.display(), "receiving");
            let summary = Receiver::new(&base_url, mode, out)?
                .run(until_drained, time_scale)
                .await?;
            info!(
                polls = summary.polls,
                throttled = summary.throttled,
                written = summary.written,
                deleted = summary.deleted,
                rejected_deletes = summary.rejected_deletes,
                failed_writes = summary.failed_writes,
                missing_receipts = summary.missing_receipts,
                "receive finished"
            );
        }
    }
    Ok(())
}
