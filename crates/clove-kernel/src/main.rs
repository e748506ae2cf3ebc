//! The clove-kernel daemon binary.

use anyhow::Context;
use clap::Parser;
use clove_kernel::{Kernel, KernelConfig, logging};
use std::path::PathBuf;
use tracing::info;

/// User-space agent kernel: mediates every privileged operation of
/// connected agent processes over a local socket.
#[derive(Debug, Parser)]
#[command(name = "clove-kernel", version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, short, default_value = "clove.toml")]
    config: PathBuf,

    /// Override the socket path from the config.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Override the LLM worker command (whitespace-separated).
    #[arg(long)]
    llm_worker: Option<String>,

    /// Default log directive when CLOVE_LOG is unset.
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log);

    let mut config = if cli.config.exists() {
        KernelConfig::load(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        KernelConfig::default()
    };
    if let Some(socket) = cli.socket {
        config.socket_path = socket;
    }
    if let Some(worker) = cli.llm_worker {
        config.llm.worker_command = worker.split_whitespace().map(ToString::to_string).collect();
    }

    let kernel = Kernel::new(config);
    let listener = kernel.bind().context("binding kernel socket")?;

    info!("clove-kernel ready");
    tokio::select! {
        () = kernel.serve(listener) => {},
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for shutdown signal")?;
            info!("Shutting down");
        },
    }
    Ok(())
}
