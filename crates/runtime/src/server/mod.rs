//! Unix domain socket server exposing the memory operations to a host
//! assistant process.

mod connection;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::net::UnixListener;
use tokio::sync::{Mutex, watch};
use tracing::{error, info, warn};

use callisto_memory::MemoryManager;

/// Removes the bound socket file when the server stops, however it stops.
struct BoundSocket(PathBuf);

impl Drop for BoundSocket {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.0) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.0.display(), ?err, "could not remove socket file");
            }
        }
    }
}

struct ServerState {
    memory: MemoryManager,
    requests_served: u64,
}

/// Serve requests on `socket_path` until a `shutdown` request or Ctrl-C.
///
/// Each connection carries one request line and receives one response line.
/// Requests run one at a time on the blocking pool; the store assumes a
/// single writer.
pub async fn run_socket_server(memory: MemoryManager, socket_path: impl AsRef<Path>) -> Result<()> {
    let socket_path = socket_path.as_ref().to_path_buf();
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if socket_path.exists() {
        warn!(path = %socket_path.display(), "removing stale socket");
        std::fs::remove_file(&socket_path)?;
    }

    let listener = UnixListener::bind(&socket_path)?;
    let _bound = BoundSocket(socket_path.clone());
    info!(
        path = %socket_path.display(),
        data_dir = %memory.data_dir().display(),
        "memory server listening"
    );

    let state = Arc::new(Mutex::new(ServerState {
        memory,
        requests_served: 0,
    }));
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupt received");
                break;
            }
            changed = shutdown_rx.changed() => {
                if changed.is_ok() && *shutdown_rx.borrow() {
                    break;
                }
            }
            accept = listener.accept() => {
                let stream = match accept {
                    Ok((stream, _)) => stream,
                    Err(err) => {
                        warn!(?err, "accept failed");
                        continue;
                    }
                };
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = connection::handle_connection(stream, state, shutdown_tx).await {
                        error!(?err, "memory connection handler failed");
                    }
                });
            }
        }
    }

    let served = state.lock().await.requests_served;
    info!(served, "memory server shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn bound_socket_is_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("callisto.sock");
        std::fs::write(&path, "").unwrap();
        drop(BoundSocket(path.clone()));
        assert!(!path.exists());
        // Already gone: dropping again is quiet.
        drop(BoundSocket(path));
    }

    #[tokio::test]
    async fn dropping_the_server_future_cleans_up() {
        let dir = TempDir::new().unwrap();
        let memory = MemoryManager::open(dir.path().join("data")).unwrap();
        let socket = dir.path().join("callisto.sock");
        let server = tokio::spawn(run_socket_server(memory, socket.clone()));
        crate::DaemonClient::new(&socket).connect_with_backoff(20).await.unwrap();
        assert!(socket.exists());

        server.abort();
        let _ = server.await;
        assert!(!socket.exists());
    }
}
