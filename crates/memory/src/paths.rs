//! On-disk layout and identifier validation.
//!
//! Every path handed to the filesystem is built here, so a user id or log
//! name can never address anything outside the data root.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{MemoryError, Result};

pub const USERS_DIR: &str = "users";
pub const LOGS_DIR: &str = "logs";
pub const PROFILE_EXT: &str = "json";
pub const LOG_EXT: &str = "txt";

const MAX_LOG_NAME_BYTES: usize = 200;

fn uuid_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
            .expect("uuid pattern is valid")
    })
}

pub fn is_valid_uuid(candidate: &str) -> bool {
    uuid_pattern().is_match(candidate)
}

/// Accept only canonical hyphenated UUIDs, returned lowercased so each id
/// maps to exactly one file name.
pub fn validate_uuid(op: &'static str, candidate: &str) -> Result<String> {
    if is_valid_uuid(candidate) {
        Ok(candidate.to_ascii_lowercase())
    } else {
        Err(MemoryError::invalid(op, format!("malformed uuid '{candidate}'")))
    }
}

/// Strip a caller-supplied `.txt` suffix and check the bare log name.
pub fn normalize_log_name(op: &'static str, name: &str) -> Result<String> {
    let bare = name.strip_suffix(".txt").unwrap_or(name);
    let reject = |reason: &str| MemoryError::invalid(op, format!("log name '{name}' {reason}"));

    if bare.is_empty() {
        return Err(reject("is empty"));
    }
    if bare == "." || bare == ".." || bare.starts_with('.') {
        return Err(reject("must not start with '.'"));
    }
    if bare.len() > MAX_LOG_NAME_BYTES {
        return Err(reject("is too long"));
    }
    if bare.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err(reject("contains a path separator or control character"));
    }
    Ok(bare.to_string())
}

/// File name backing a log, e.g. `chat` -> `chat.txt`.
pub fn log_file_name(op: &'static str, name: &str) -> Result<String> {
    Ok(format!("{}.{LOG_EXT}", normalize_log_name(op, name)?))
}

#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn users_dir(&self) -> PathBuf {
        self.root.join(USERS_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    pub fn profile_path(&self, op: &'static str, uuid: &str) -> Result<PathBuf> {
        let uuid = validate_uuid(op, uuid)?;
        Ok(self.users_dir().join(format!("{uuid}.{PROFILE_EXT}")))
    }

    pub fn user_logs_dir(&self, op: &'static str, uuid: &str) -> Result<PathBuf> {
        Ok(self.logs_dir().join(validate_uuid(op, uuid)?))
    }

    pub fn log_path(&self, op: &'static str, uuid: &str, name: &str) -> Result<PathBuf> {
        Ok(self.user_logs_dir(op, uuid)?.join(log_file_name(op, name)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const ID: &str = "123e4567-e89b-12d3-a456-426614174000";

    #[test]
    fn accepts_canonical_uuids_in_either_case() {
        assert!(is_valid_uuid(ID));
        assert!(is_valid_uuid(&ID.to_uppercase()));
    }

    #[test]
    fn rejects_non_canonical_uuids() {
        for bad in [
            "",
            "not-a-uuid",
            "123e4567e89b12d3a456426614174000",
            "{123e4567-e89b-12d3-a456-426614174000}",
            "../123e4567-e89b-12d3-a456-426614174000",
            "123e4567-e89b-12d3-a456-42661417400g",
        ] {
            assert!(!is_valid_uuid(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn log_names_map_to_txt_files() {
        assert_eq!(log_file_name("t", "chat").unwrap(), "chat.txt");
        assert_eq!(log_file_name("t", "chat.txt").unwrap(), "chat.txt");
        assert_eq!(log_file_name("t", "daily notes 2024").unwrap(), "daily notes 2024.txt");
    }

    #[test]
    fn traversal_and_hidden_names_are_rejected() {
        for bad in ["", ".", "..", "../etc/passwd", "a/b", "a\\b", ".hidden", "nul\0byte", ".txt"] {
            let err = log_file_name("t", bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{bad:?}");
        }
    }

    #[test]
    fn overlong_names_are_rejected() {
        let long = "x".repeat(MAX_LOG_NAME_BYTES + 1);
        assert!(log_file_name("t", &long).is_err());
        let fits = "x".repeat(MAX_LOG_NAME_BYTES);
        assert!(log_file_name("t", &fits).is_ok());
    }

    #[test]
    fn layout_paths() {
        let layout = DataLayout::new("/data");
        assert_eq!(
            layout.profile_path("t", ID).unwrap(),
            PathBuf::from(format!("/data/users/{ID}.json"))
        );
        assert_eq!(
            layout.log_path("t", ID, "chat").unwrap(),
            PathBuf::from(format!("/data/logs/{ID}/chat.txt"))
        );
        assert!(layout.profile_path("t", "../../etc").is_err());
    }

    #[test]
    fn paths_use_the_lowercase_uuid() {
        let layout = DataLayout::new("/data");
        let upper = ID.to_uppercase();
        assert_eq!(validate_uuid("t", &upper).unwrap(), ID);
        assert_eq!(
            layout.profile_path("t", &upper).unwrap(),
            layout.profile_path("t", ID).unwrap()
        );
        assert_eq!(
            layout.user_logs_dir("t", &upper).unwrap(),
            PathBuf::from(format!("/data/logs/{ID}"))
        );
    }
}
