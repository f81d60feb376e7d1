pub mod conversation;
pub mod error;
mod fs_util;
pub mod manager;
pub mod merge;
pub mod paths;
pub mod profile;

pub use conversation::{ConversationStore, PruneFilter, PruneReport};
pub use error::{ErrorKind, MemoryError, Result};
pub use manager::{MemoryManager, MemoryStats, MergeOutcome};
pub use profile::{ProfileDocument, ProfileStore};
