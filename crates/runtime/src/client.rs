use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::warn;

use crate::commands::{MemoryRequest, MemoryResponse};

#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    pub async fn connect_with_backoff(&self, max_attempts: usize) -> Result<()> {
        let mut delay = Duration::from_millis(100);
        for attempt in 0..max_attempts.max(1) {
            match UnixStream::connect(&self.socket_path).await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    if attempt + 1 == max_attempts.max(1) {
                        return Err(err.into());
                    }
                    warn!(attempt, ?err, "memory server connect failed; retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(2));
                }
            }
        }
        Ok(())
    }

    pub async fn request(&self, request: &MemoryRequest) -> Result<MemoryResponse> {
        let encoded = serde_json::to_string(request)?;
        let line = self.send_raw(&encoded).await?;
        Ok(serde_json::from_str(&line)?)
    }

    /// Send one already-encoded request line and return the raw response line.
    pub async fn send_raw(&self, line: &str) -> Result<String> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (read_half, mut write_half) = stream.into_split();

        write_half.write_all(line.trim().as_bytes()).await?;
        write_half.write_all(b"\n").await?;
        write_half.flush().await?;

        let mut reader = BufReader::new(read_half);
        let mut response = String::new();
        if reader.read_line(&mut response).await? == 0 {
            bail!("memory server closed the connection without a response");
        }
        Ok(response.trim().to_string())
    }

    pub async fn ping(&self) -> Result<()> {
        match self.request(&MemoryRequest::Ping).await? {
            MemoryResponse::Ok { .. } => Ok(()),
            MemoryResponse::Error { error } => bail!("ping failed: {}", error.message),
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.request(&MemoryRequest::Shutdown).await?;
        Ok(())
    }
}
