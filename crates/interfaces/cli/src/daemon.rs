use std::io;
use std::path::Path;

use anyhow::{Result, bail};
use tracing::info;

use callisto_memory::MemoryManager;
use callisto_runtime::{DaemonClient, run_socket_server, serve_stdio};

/// Serve on `socket_path`, refusing to take over a socket that a live
/// server still answers on. A socket nobody answers is stale and gets
/// replaced.
pub(crate) async fn run_socket(memory: MemoryManager, socket_path: &str) -> Result<()> {
    if Path::new(socket_path).exists() && DaemonClient::new(socket_path).ping().await.is_ok() {
        bail!("a callisto server is already listening on {socket_path}");
    }
    run_socket_server(memory, socket_path).await
}

pub(crate) async fn run_stdio(memory: MemoryManager) -> Result<()> {
    let handled = tokio::task::spawn_blocking(move || {
        let stdin = io::stdin();
        let stdout = io::stdout();
        serve_stdio(&memory, stdin.lock(), stdout.lock())
    })
    .await??;
    info!(handled, "stdio session ended");
    Ok(())
}
