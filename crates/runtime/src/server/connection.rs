//! Per-connection request handling.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use crate::commands::MemoryResponse;
use crate::dispatch::handle_line;

use super::ServerState;

pub(super) async fn handle_connection(
    stream: UnixStream,
    state: Arc<Mutex<ServerState>>,
    shutdown_tx: watch::Sender<bool>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(());
    }
    let line = line.trim().to_string();
    if line.is_empty() {
        return Ok(());
    }

    // The guard is held until the blocking call returns so requests never
    // interleave on disk.
    let (response, shutdown) = {
        let mut guard = state.lock().await;
        let memory = guard.memory.clone();
        let outcome = tokio::task::spawn_blocking(move || handle_line(&memory, &line)).await?;
        guard.requests_served += 1;
        outcome
    };
    debug!(ok = response.is_ok(), "memory request answered");

    send_response(&mut write_half, &response).await?;

    if shutdown {
        info!("shutdown requested by client");
        let _ = shutdown_tx.send(true);
    }
    Ok(())
}

async fn send_response(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    response: &MemoryResponse,
) -> Result<()> {
    let encoded = serde_json::to_string(response)?;
    writer.write_all(encoded.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
