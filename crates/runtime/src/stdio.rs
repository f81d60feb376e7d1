//! Line-oriented request loop over arbitrary reader/writer pairs, used when
//! the host assistant spawns the store as a child process.

use std::io::{BufRead, Write};

use anyhow::Result;
use tracing::info;

use callisto_memory::MemoryManager;

use crate::dispatch::handle_line;

/// Answer each request line with one response line. Returns the number of
/// requests handled once the input ends or a `shutdown` request arrives.
pub fn serve_stdio<R: BufRead, W: Write>(
    memory: &MemoryManager,
    reader: R,
    mut writer: W,
) -> Result<usize> {
    let mut handled = 0;
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (response, shutdown) = handle_line(memory, trimmed);
        serde_json::to_writer(&mut writer, &response)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        handled += 1;
        if shutdown {
            info!(handled, "stdio session stopped by shutdown request");
            break;
        }
    }
    Ok(handled)
}
