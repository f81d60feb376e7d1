mod client;
mod commands;
mod dispatch;
mod server;
mod stdio;

pub use client::DaemonClient;
pub use commands::{ErrorDescriptor, MemoryRequest, MemoryResponse, ParticipantOutcome};
pub use dispatch::{dispatch, handle_line};
pub use server::run_socket_server;
pub use stdio::serve_stdio;
