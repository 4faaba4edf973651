//! `telefsd` — serve an in-memory telefs volume over TCP.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use telefs_server::{MemoryVfs, VfsServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "telefsd", about = "In-memory telefs VFS server", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:10001", env = "TELEFSD_LISTEN")]
    listen: String,

    /// Start with an empty volume instead of the sample tree.
    #[arg(long)]
    empty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let vfs = if args.empty {
        Arc::new(MemoryVfs::new())
    } else {
        Arc::new(MemoryVfs::with_sample_tree())
    };

    let server = VfsServer::bind(&args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!(addr = %server.local_addr()?, "telefsd listening");

    server.run(vfs).await.context("server failed")
}
