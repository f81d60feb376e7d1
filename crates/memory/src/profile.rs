//! Per-user profile documents.
//!
//! One pretty-printed JSON object per user at `users/<uuid>.json`. Every
//! call round-trips through the filesystem; nothing is cached.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{MemoryError, Result};
use crate::fs_util::{read_optional, remove_if_exists, write_atomic};
use crate::merge::{deep_update, merge_documents};
use crate::paths::{DataLayout, PROFILE_EXT, is_valid_uuid, validate_uuid};

/// A user's profile: category name -> arbitrary JSON.
pub type ProfileDocument = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct ProfileStore {
    layout: DataLayout,
}

impl ProfileStore {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    /// Whether a document is present. Malformed ids simply do not exist.
    pub fn exists(&self, uuid: &str) -> bool {
        is_valid_uuid(uuid)
            && self
                .layout
                .profile_path("exists", uuid)
                .map(|path| path.is_file())
                .unwrap_or(false)
    }

    pub fn get(&self, uuid: &str) -> Result<Option<ProfileDocument>> {
        let path = self.layout.profile_path("get_user", uuid)?;
        self.read_at("get_user", path)
    }

    pub fn create(&self, uuid: &str, initial: Option<ProfileDocument>) -> Result<ProfileDocument> {
        const OP: &str = "create_user";
        let path = self.layout.profile_path(OP, uuid)?;
        if path.exists() {
            return Err(MemoryError::already_exists(OP, format!("user {uuid}")));
        }

        let document = initial.unwrap_or_default();
        self.write_at(OP, path, &document)?;
        info!(uuid = %uuid, fields = document.len(), "created user profile");
        Ok(document)
    }

    pub fn update(&self, uuid: &str, patch: ProfileDocument) -> Result<ProfileDocument> {
        const OP: &str = "update_user";
        let (path, document) = self.load_existing(OP, uuid)?;
        let merged = into_document(deep_update(Value::Object(document), Value::Object(patch)));
        self.write_at(OP, path, &merged)?;
        debug!(uuid = %uuid, "updated user profile");
        Ok(merged)
    }

    pub fn update_field(
        &self,
        uuid: &str,
        category: &str,
        field: &str,
        value: Value,
    ) -> Result<ProfileDocument> {
        const OP: &str = "update_user_field";
        let (path, mut document) = self.load_existing(OP, uuid)?;

        let slot = document
            .entry(category.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(fields) = slot else {
            return Err(MemoryError::TypeMismatch {
                op: OP,
                what: format!("category '{category}' of user {uuid}"),
                expected: "an object",
            });
        };
        fields.insert(field.to_string(), value);

        self.write_at(OP, path, &document)?;
        debug!(uuid = %uuid, category, field, "set profile field");
        Ok(document)
    }

    pub fn add_to_list(&self, uuid: &str, list_name: &str, value: Value) -> Result<ProfileDocument> {
        const OP: &str = "add_to_user_list";
        let (path, mut document) = self.load_existing(OP, uuid)?;

        let slot = document.entry(list_name.to_string()).or_insert(Value::Null);
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        let Value::Array(items) = slot else {
            return Err(MemoryError::TypeMismatch {
                op: OP,
                what: format!("'{list_name}' of user {uuid}"),
                expected: "a list",
            });
        };
        items.push(value);

        self.write_at(OP, path, &document)?;
        debug!(uuid = %uuid, list = list_name, "appended to profile list");
        Ok(document)
    }

    pub fn delete(&self, uuid: &str) -> Result<bool> {
        const OP: &str = "delete_user";
        let path = self.layout.profile_path(OP, uuid)?;
        let removed = remove_if_exists(&path).map_err(|err| MemoryError::io(OP, &path, err))?;
        if removed {
            info!(uuid = %uuid, "deleted user profile");
        }
        Ok(removed)
    }

    /// Known user ids, sorted.
    pub fn list_all(&self) -> Result<Vec<String>> {
        const OP: &str = "list_users";
        let dir = self.layout.users_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(MemoryError::io(OP, dir, err)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| MemoryError::io(OP, &dir, err))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(PROFILE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                // Documents are only ever written under the lowercase id.
                if is_valid_uuid(stem) && !stem.bytes().any(|b| b.is_ascii_uppercase()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Fold `source` into `target`, persist the result on `target` and delete
    /// `source`. Irreversible.
    pub fn merge(&self, source: &str, target: &str) -> Result<ProfileDocument> {
        const OP: &str = "merge_users";
        let source = validate_uuid(OP, source)?;
        let target = validate_uuid(OP, target)?;
        if source == target {
            return Err(MemoryError::invalid(
                OP,
                format!("cannot merge user {source} into itself"),
            ));
        }

        let (source_path, source_doc) = self.load_existing(OP, &source)?;
        let (target_path, target_doc) = self.load_existing(OP, &target)?;

        let merged = into_document(merge_documents(
            Value::Object(source_doc),
            Value::Object(target_doc),
        ));
        self.write_at(OP, target_path, &merged)?;
        remove_if_exists(&source_path).map_err(|err| MemoryError::io(OP, &source_path, err))?;

        info!(source = %source, target = %target, "merged user profiles");
        Ok(merged)
    }

    fn load_existing(&self, op: &'static str, uuid: &str) -> Result<(PathBuf, ProfileDocument)> {
        let path = self.layout.profile_path(op, uuid)?;
        match self.read_at(op, path.clone())? {
            Some(document) => Ok((path, document)),
            None => Err(MemoryError::not_found(op, format!("user {uuid}"))),
        }
    }

    fn read_at(&self, op: &'static str, path: PathBuf) -> Result<Option<ProfileDocument>> {
        let Some(raw) = read_optional(&path).map_err(|err| MemoryError::io(op, &path, err))? else {
            return Ok(None);
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(document)) => Ok(Some(document)),
            Ok(_) => Err(MemoryError::Corrupt {
                op,
                path,
                reason: "top-level value is not an object".to_string(),
            }),
            Err(err) => Err(MemoryError::Corrupt {
                op,
                path,
                reason: err.to_string(),
            }),
        }
    }

    fn write_at(&self, op: &'static str, path: PathBuf, document: &ProfileDocument) -> Result<()> {
        let mut rendered = serde_json::to_string_pretty(document).map_err(|err| {
            MemoryError::Corrupt {
                op,
                path: path.clone(),
                reason: err.to_string(),
            }
        })?;
        rendered.push('\n');
        write_atomic(&path, rendered.as_bytes()).map_err(|err| MemoryError::io(op, path, err))
    }
}

fn into_document(value: Value) -> ProfileDocument {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
