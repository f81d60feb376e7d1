use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::conversation::ConversationStore;
use crate::error::{MemoryError, Result};
use crate::paths::{DataLayout, validate_uuid};
use crate::profile::{ProfileDocument, ProfileStore};

mod conversations;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub users: usize,
    /// Conversation logs across all known users.
    pub conversations: usize,
}

/// Result of folding one user into another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub document: ProfileDocument,
    /// Names of the moved logs as they now appear under the target.
    pub moved_logs: Vec<String>,
}

/// Entry point for the host assistant: both stores rooted at one data dir.
#[derive(Debug, Clone)]
pub struct MemoryManager {
    layout: DataLayout,
    profiles: ProfileStore,
    conversations: ConversationStore,
}

impl MemoryManager {
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        const OP: &str = "open";
        let layout = DataLayout::new(data_dir);
        for dir in [layout.users_dir(), layout.logs_dir()] {
            fs::create_dir_all(&dir).map_err(|err| MemoryError::io(OP, &dir, err))?;
        }
        info!(path = %layout.root().display(), "opened callisto data directory");

        Ok(Self {
            profiles: ProfileStore::new(layout.clone()),
            conversations: ConversationStore::new(layout.clone()),
            layout,
        })
    }

    pub fn data_dir(&self) -> &Path {
        self.layout.root()
    }

    pub fn stats(&self) -> Result<MemoryStats> {
        let users = self.profiles.list_all()?;
        let mut conversations = 0;
        for uuid in &users {
            conversations += self.conversations.list(uuid)?.len();
        }
        Ok(MemoryStats {
            users: users.len(),
            conversations,
        })
    }

    // ── Profiles ───────────────────────────────────────────────────────────

    pub fn user_exists(&self, uuid: &str) -> bool {
        self.profiles.exists(uuid)
    }

    pub fn get_user_data(&self, uuid: &str) -> Result<Option<ProfileDocument>> {
        self.profiles.get(uuid)
    }

    pub fn create_user(&self, uuid: &str, initial: Option<ProfileDocument>) -> Result<ProfileDocument> {
        self.profiles.create(uuid, initial)
    }

    pub fn update_user(&self, uuid: &str, patch: ProfileDocument) -> Result<ProfileDocument> {
        self.profiles.update(uuid, patch)
    }

    pub fn update_user_field(
        &self,
        uuid: &str,
        category: &str,
        field: &str,
        value: Value,
    ) -> Result<ProfileDocument> {
        self.profiles.update_field(uuid, category, field, value)
    }

    pub fn add_to_user_list(&self, uuid: &str, list_name: &str, value: Value) -> Result<ProfileDocument> {
        self.profiles.add_to_list(uuid, list_name, value)
    }

    /// Remove a user's profile. Their conversation logs are left in place.
    pub fn delete_user(&self, uuid: &str) -> Result<bool> {
        self.profiles.delete(uuid)
    }

    pub fn list_users(&self) -> Result<Vec<String>> {
        self.profiles.list_all()
    }

    /// Fold `source` into `target`.
    ///
    /// Logs move before the profiles merge, so a failure leaves both users
    /// in place and the call can be retried: logs already moved stay under
    /// `target` and the rest follow on the next attempt.
    pub fn merge_users(&self, source: &str, target: &str) -> Result<MergeOutcome> {
        const OP: &str = "merge_users";
        let source = validate_uuid(OP, source)?;
        let target = validate_uuid(OP, target)?;
        if source == target {
            return Err(MemoryError::invalid(
                OP,
                format!("cannot merge user {source} into itself"),
            ));
        }
        // Reading both documents also surfaces a corrupt profile before
        // anything moves.
        for uuid in [&source, &target] {
            if self.profiles.get(uuid)?.is_none() {
                return Err(MemoryError::not_found(OP, format!("user {uuid}")));
            }
        }

        let moved_logs = self.conversations.move_all(&source, &target).inspect_err(|err| {
            warn!(source = %source, target = %target, %err, "moving logs failed; profiles untouched");
        })?;
        let document = self.profiles.merge(&source, &target)?;
        info!(source = %source, target = %target, moved = moved_logs.len(), "merged users");
        Ok(MergeOutcome {
            document,
            moved_logs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn manager() -> (TempDir, MemoryManager) {
        let dir = TempDir::new().unwrap();
        let manager = MemoryManager::open(dir.path().join("data")).unwrap();
        (dir, manager)
    }

    fn id() -> String {
        Uuid::new_v4().to_string()
    }

    #[test]
    fn open_creates_layout() {
        let (dir, manager) = manager();
        assert!(dir.path().join("data/users").is_dir());
        assert!(dir.path().join("data/logs").is_dir());
        assert_eq!(manager.data_dir(), dir.path().join("data").as_path());
        assert_eq!(manager.stats().unwrap(), MemoryStats::default());
    }

    #[test]
    fn merge_users_moves_profile_and_logs() {
        let (_dir, manager) = manager();
        let (a, b) = (id(), id());
        manager
            .create_user(&a, Some(json!({"pets": ["cat"]}).as_object().unwrap().clone()))
            .unwrap();
        manager.create_user(&b, None).unwrap();
        manager.store_conversation(&a, "chat", "hi from a\n").unwrap();

        let outcome = manager.merge_users(&a, &b).unwrap();
        assert_eq!(outcome.document["pets"], json!(["cat"]));
        assert_eq!(outcome.moved_logs, vec!["chat"]);
        assert!(!manager.user_exists(&a));
        assert!(manager.user_exists(&b));
        assert_eq!(manager.get_conversation(&b, "chat").unwrap().as_deref(), Some("hi from a\n"));
        assert!(manager.list_conversations(&a).unwrap().is_empty());
    }

    #[test]
    fn failed_log_move_leaves_both_users_intact() {
        let (dir, manager) = manager();
        let (a, b) = (id(), id());
        manager
            .create_user(&a, Some(json!({"x": 1}).as_object().unwrap().clone()))
            .unwrap();
        manager.create_user(&b, None).unwrap();
        manager.store_conversation(&a, "chat", "hi\n").unwrap();
        // A plain file where the target's log directory should be.
        let blocker = dir.path().join("data/logs").join(&b);
        fs::write(&blocker, "").unwrap();

        let err = manager.merge_users(&a, &b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(manager.user_exists(&a));
        assert_eq!(manager.get_user_data(&b).unwrap(), Some(serde_json::Map::new()));
        assert_eq!(manager.get_conversation(&a, "chat").unwrap().as_deref(), Some("hi\n"));

        fs::remove_file(&blocker).unwrap();
        let outcome = manager.merge_users(&a, &b).unwrap();
        assert_eq!(outcome.document["x"], json!(1));
        assert_eq!(outcome.moved_logs, vec!["chat"]);
        assert!(!manager.user_exists(&a));
    }

    #[test]
    fn merge_with_missing_target_moves_nothing() {
        let (_dir, manager) = manager();
        let (a, b) = (id(), id());
        manager.create_user(&a, None).unwrap();
        manager.store_conversation(&a, "chat", "x").unwrap();
        let err = manager.merge_users(&a, &b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(manager.list_conversations(&a).unwrap(), vec!["chat"]);
    }

    #[test]
    fn merge_users_with_itself_is_rejected() {
        let (_dir, manager) = manager();
        let a = id();
        manager.create_user(&a, None).unwrap();
        manager.store_conversation(&a, "chat", "x").unwrap();
        let err = manager.merge_users(&a, &a).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(manager.user_exists(&a));
        assert_eq!(manager.list_conversations(&a).unwrap(), vec!["chat"]);
    }

    #[test]
    fn stats_counts_users_and_logs() {
        let (_dir, manager) = manager();
        let (a, b) = (id(), id());
        manager.create_user(&a, None).unwrap();
        manager.create_user(&b, None).unwrap();
        manager.store_conversation(&a, "one", "").unwrap();
        manager.store_conversation(&a, "two", "").unwrap();
        manager.store_conversation(&b, "one", "").unwrap();
        assert_eq!(manager.stats().unwrap(), MemoryStats { users: 2, conversations: 3 });
    }
}
