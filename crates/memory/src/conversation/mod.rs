//! Named plain-text conversation logs, one namespace directory per user.
//!
//! A log is either absent or present; there are no open handles between
//! calls. Full-file rewrites (`store`, `prune`) go through an atomic
//! temp-file rename, `append` writes once at end-of-file.

mod prune;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{MemoryError, Result};
use crate::fs_util::{append_line, read_optional, remove_if_exists, write_atomic};
use crate::paths::{DataLayout, LOG_EXT, normalize_log_name, validate_uuid};

pub use prune::{PruneFilter, TIMESTAMP_FORMAT, line_date};

/// Outcome of a prune that found its log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub kept: usize,
    pub removed: usize,
}

#[derive(Debug, Clone)]
pub struct ConversationStore {
    layout: DataLayout,
}

impl ConversationStore {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    pub fn exists(&self, uuid: &str, log_name: &str) -> Result<bool> {
        Ok(self.layout.log_path("conversation_exists", uuid, log_name)?.is_file())
    }

    /// Replace (or create) a log with exactly `content`.
    pub fn store(&self, uuid: &str, log_name: &str, content: &str) -> Result<PathBuf> {
        const OP: &str = "store_conversation";
        let path = self.layout.log_path(OP, uuid, log_name)?;
        write_atomic(&path, content.as_bytes()).map_err(|err| MemoryError::io(OP, &path, err))?;
        info!(uuid = %uuid, log = %log_name, bytes = content.len(), "stored conversation");
        Ok(path)
    }

    /// Add one newline-terminated line, creating the log if needed.
    pub fn append(
        &self,
        uuid: &str,
        log_name: &str,
        message: &str,
        with_timestamp: bool,
    ) -> Result<PathBuf> {
        const OP: &str = "append_to_conversation";
        let path = self.layout.log_path(OP, uuid, log_name)?;
        let line = if with_timestamp {
            format!("[{}] {message}\n", Local::now().format(TIMESTAMP_FORMAT))
        } else {
            format!("{message}\n")
        };
        append_line(&path, &line).map_err(|err| MemoryError::io(OP, &path, err))?;
        debug!(uuid = %uuid, log = %log_name, with_timestamp, "appended to conversation");
        Ok(path)
    }

    /// Store the same content independently for every user in `uuids`.
    ///
    /// Each result lines up with its input position; a failure for one user
    /// neither stops nor rolls back the others.
    pub fn store_multi(
        &self,
        uuids: &[String],
        log_name: &str,
        content: &str,
    ) -> Result<Vec<Result<PathBuf>>> {
        if uuids.is_empty() {
            return Err(MemoryError::invalid(
                "store_multi_user_conversation",
                "at least one uuid is required",
            ));
        }
        normalize_log_name("store_multi_user_conversation", log_name)?;

        let results = uuids
            .iter()
            .map(|uuid| {
                self.store(uuid, log_name, content).inspect_err(|err| {
                    warn!(uuid = %uuid, log = %log_name, %err, "fan-out store failed for participant");
                })
            })
            .collect::<Vec<_>>();
        Ok(results)
    }

    pub fn get(&self, uuid: &str, log_name: &str) -> Result<Option<String>> {
        const OP: &str = "get_conversation";
        let path = self.layout.log_path(OP, uuid, log_name)?;
        read_optional(&path).map_err(|err| MemoryError::io(OP, &path, err))
    }

    /// Log names for a user, sorted. Unknown users have none.
    pub fn list(&self, uuid: &str) -> Result<Vec<String>> {
        const OP: &str = "list_conversations";
        let dir = self.layout.user_logs_dir(OP, uuid)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(MemoryError::io(OP, dir, err)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| MemoryError::io(OP, &dir, err))?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some(LOG_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn delete(&self, uuid: &str, log_name: &str) -> Result<bool> {
        const OP: &str = "delete_conversation";
        let path = self.layout.log_path(OP, uuid, log_name)?;
        let removed = remove_if_exists(&path).map_err(|err| MemoryError::io(OP, &path, err))?;
        if removed {
            info!(uuid = %uuid, log = %log_name, "deleted conversation");
        }
        Ok(removed)
    }

    /// Rewrite a log keeping only the lines `filter` selects.
    ///
    /// A filter with no criteria leaves the file untouched. An empty result
    /// is legitimate and empties the log.
    pub fn prune(&self, uuid: &str, log_name: &str, filter: &PruneFilter) -> Result<PruneReport> {
        const OP: &str = "prune_conversation";
        let path = self.layout.log_path(OP, uuid, log_name)?;
        let Some(content) = read_optional(&path).map_err(|err| MemoryError::io(OP, &path, err))?
        else {
            return Err(MemoryError::not_found(
                OP,
                format!("log '{log_name}' for user {uuid}"),
            ));
        };

        let filtered = filter.apply(&content);
        let report = PruneReport {
            kept: filtered.kept.len(),
            removed: filtered.removed(),
        };
        if filter.is_noop() || report.removed == 0 {
            debug!(uuid = %uuid, log = %log_name, "prune left log unchanged");
            return Ok(report);
        }

        write_atomic(&path, filtered.into_text().as_bytes())
            .map_err(|err| MemoryError::io(OP, &path, err))?;
        info!(
            uuid = %uuid, log = %log_name,
            kept = report.kept, removed = report.removed,
            "pruned conversation"
        );
        Ok(report)
    }

    /// Move every log of `source` into `target`'s namespace.
    ///
    /// A name already taken in the target is stored as
    /// `<name>_merged_<YYYYmmddHHMMSS>` instead, with a `_<n>` counter when
    /// that is taken too. Existing target logs are never replaced. Returns
    /// the names the logs now have under `target`.
    pub fn move_all(&self, source: &str, target: &str) -> Result<Vec<String>> {
        const OP: &str = "move_conversations";
        let source = validate_uuid(OP, source)?;
        let target = validate_uuid(OP, target)?;
        if source == target {
            return Err(MemoryError::invalid(OP, "source and target must differ"));
        }

        let source_dir = self.layout.user_logs_dir(OP, &source)?;
        let target_dir = self.layout.user_logs_dir(OP, &target)?;
        let names = self.list(&source)?;
        if names.is_empty() {
            return Ok(Vec::new());
        }
        fs::create_dir_all(&target_dir).map_err(|err| MemoryError::io(OP, &target_dir, err))?;

        // Every destination is chosen before the first rename.
        let stamp = Local::now().format("%Y%m%d%H%M%S").to_string();
        let mut claimed = HashSet::new();
        let mut plan = Vec::with_capacity(names.len());
        for name in names {
            let new_name = free_name(&target_dir, &name, &stamp, &claimed);
            claimed.insert(new_name.clone());
            plan.push((name, new_name));
        }

        let mut moved = Vec::with_capacity(plan.len());
        for (name, new_name) in plan {
            let from = source_dir.join(format!("{name}.{LOG_EXT}"));
            let to = target_dir.join(format!("{new_name}.{LOG_EXT}"));
            if to.exists() {
                return Err(MemoryError::already_exists(OP, to.display().to_string()));
            }
            fs::rename(&from, &to).map_err(|err| MemoryError::io(OP, &from, err))?;
            debug!(source = %source, target = %target, from = %name, to = %new_name, "moved conversation");
            moved.push(new_name);
        }

        // Only succeeds when nothing else (e.g. a stray `.tmp`) is left behind.
        if let Err(err) = fs::remove_dir(&source_dir) {
            debug!(path = %source_dir.display(), %err, "source log directory not removed");
        }
        info!(source = %source, target = %target, count = moved.len(), "moved conversations");
        Ok(moved)
    }
}

/// First of `name`, `name_merged_<stamp>`, `name_merged_<stamp>_1`, ... that
/// has no file in `dir` and is not already claimed.
fn free_name(dir: &Path, name: &str, stamp: &str, claimed: &HashSet<String>) -> String {
    let taken = |candidate: &str| {
        claimed.contains(candidate) || dir.join(format!("{candidate}.{LOG_EXT}")).exists()
    };
    if !taken(name) {
        return name.to_string();
    }
    let base = format!("{name}_merged_{stamp}");
    let mut candidate = base.clone();
    let mut counter = 0;
    while taken(&candidate) {
        counter += 1;
        candidate = format!("{base}_{counter}");
    }
    candidate
}
