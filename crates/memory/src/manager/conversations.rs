//! Conversation-log operations for [`MemoryManager`].

use std::path::PathBuf;

use tracing::warn;

use crate::conversation::PruneFilter;
use crate::error::{ErrorKind, MemoryError, Result};
use crate::paths::{is_valid_uuid, normalize_log_name};

use super::MemoryManager;

impl MemoryManager {
    pub fn get_conversation(&self, uuid: &str, log_name: &str) -> Result<Option<String>> {
        self.conversations.get(uuid, log_name)
    }

    pub fn store_conversation(&self, uuid: &str, log_name: &str, content: &str) -> Result<PathBuf> {
        self.conversations.store(uuid, log_name, content)
    }

    pub fn append_to_conversation(
        &self,
        uuid: &str,
        log_name: &str,
        message: &str,
        with_timestamp: bool,
    ) -> Result<PathBuf> {
        self.conversations.append(uuid, log_name, message, with_timestamp)
    }

    /// Fan a conversation out to every participant.
    ///
    /// Participants without a profile get an empty one first. A failure to
    /// create that profile is logged and does not block their copy of the log.
    pub fn store_multi_user_conversation(
        &self,
        uuids: &[String],
        log_name: &str,
        content: &str,
    ) -> Result<Vec<Result<PathBuf>>> {
        const OP: &str = "store_multi_user_conversation";
        if uuids.is_empty() {
            return Err(MemoryError::invalid(OP, "at least one uuid is required"));
        }
        normalize_log_name(OP, log_name)?;

        for uuid in uuids.iter().filter(|uuid| is_valid_uuid(uuid)) {
            if self.profiles.exists(uuid) {
                continue;
            }
            match self.profiles.create(uuid, None) {
                Ok(_) => {}
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                Err(err) => warn!(uuid = %uuid, %err, "could not create profile for participant"),
            }
        }

        self.conversations.store_multi(uuids, log_name, content)
    }

    pub fn conversation_exists(&self, uuid: &str, log_name: &str) -> Result<bool> {
        self.conversations.exists(uuid, log_name)
    }

    pub fn list_conversations(&self, uuid: &str) -> Result<Vec<String>> {
        self.conversations.list(uuid)
    }

    pub fn delete_conversation(&self, uuid: &str, log_name: &str) -> Result<bool> {
        self.conversations.delete(uuid, log_name)
    }

    /// Prune a log; `Ok(false)` means there was no such log.
    pub fn prune_conversation(
        &self,
        uuid: &str,
        log_name: &str,
        keep_lines: Option<usize>,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<bool> {
        let filter = PruneFilter::parse(keep_lines, start_date, end_date)?;
        match self.conversations.prune(uuid, log_name, &filter) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::manager::MemoryManager;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn manager() -> (TempDir, MemoryManager) {
        let dir = TempDir::new().unwrap();
        let manager = MemoryManager::open(dir.path()).unwrap();
        (dir, manager)
    }

    fn id() -> String {
        Uuid::new_v4().to_string()
    }

    #[test]
    fn multi_user_store_creates_missing_profiles() {
        let (_dir, manager) = manager();
        let (a, b) = (id(), id());
        manager.create_user(&a, None).unwrap();

        let results = manager
            .store_multi_user_conversation(&[a.clone(), b.clone()], "group", "hello\n")
            .unwrap();
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(manager.user_exists(&b));
        assert_eq!(manager.get_conversation(&b, "group").unwrap().as_deref(), Some("hello\n"));
    }

    #[test]
    fn multi_user_store_validates_before_creating_profiles() {
        let (_dir, manager) = manager();
        let a = id();
        let err = manager
            .store_multi_user_conversation(&[a.clone()], "../escape", "x")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!manager.user_exists(&a));
    }

    #[test]
    fn prune_conversation_reports_missing_log_as_false() {
        let (_dir, manager) = manager();
        let user = id();
        assert!(!manager.prune_conversation(&user, "chat", Some(1), None, None).unwrap());
        manager.store_conversation(&user, "chat", "a\nb\n").unwrap();
        assert!(manager.prune_conversation(&user, "chat", Some(1), None, None).unwrap());
        assert_eq!(manager.get_conversation(&user, "chat").unwrap().as_deref(), Some("b\n"));
    }

    #[test]
    fn prune_conversation_rejects_bad_dates() {
        let (_dir, manager) = manager();
        let user = id();
        manager.store_conversation(&user, "chat", "a\n").unwrap();
        let err = manager
            .prune_conversation(&user, "chat", None, Some("last tuesday"), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
