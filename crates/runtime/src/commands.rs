use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use callisto_memory::{ErrorKind, MemoryError};

fn default_with_timestamp() -> bool {
    true
}

/// One memory operation requested by the host assistant.
///
/// Encoded as a JSON object tagged by `op`, e.g.
/// `{"op":"append_to_conversation","uuid":"…","log_name":"chat","message":"hi"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MemoryRequest {
    UserExists {
        uuid: String,
    },
    GetUserData {
        uuid: String,
    },
    CreateUser {
        uuid: String,
        #[serde(default)]
        initial: Option<Map<String, Value>>,
    },
    UpdateUser {
        uuid: String,
        data: Map<String, Value>,
    },
    UpdateUserField {
        uuid: String,
        category: String,
        field: String,
        value: Value,
    },
    AddToUserList {
        uuid: String,
        list_name: String,
        value: Value,
    },
    DeleteUser {
        uuid: String,
    },
    ListUsers,
    MergeUsers {
        source_uuid: String,
        target_uuid: String,
    },
    GetConversation {
        uuid: String,
        log_name: String,
    },
    StoreConversation {
        uuid: String,
        log_name: String,
        content: String,
    },
    AppendToConversation {
        uuid: String,
        log_name: String,
        message: String,
        #[serde(default = "default_with_timestamp")]
        with_timestamp: bool,
    },
    StoreMultiUserConversation {
        uuids: Vec<String>,
        log_name: String,
        content: String,
    },
    ConversationExists {
        uuid: String,
        log_name: String,
    },
    ListConversations {
        uuid: String,
    },
    DeleteConversation {
        uuid: String,
        log_name: String,
    },
    PruneConversation {
        uuid: String,
        log_name: String,
        #[serde(default)]
        keep_lines: Option<usize>,
        #[serde(default)]
        start_date: Option<String>,
        #[serde(default)]
        end_date: Option<String>,
    },
    Stats,
    Ping,
    /// Stop the serving loop after answering.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&MemoryError> for ErrorDescriptor {
    fn from(err: &MemoryError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MemoryResponse {
    Ok { result: Value },
    Error { error: ErrorDescriptor },
}

impl MemoryResponse {
    pub fn ok(result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(result) => Self::Ok { result },
            Err(err) => Self::invalid(format!("response not serializable: {err}")),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorDescriptor {
                kind: ErrorKind::InvalidArgument,
                message: message.into(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn into_result(self) -> Result<Value, ErrorDescriptor> {
        match self {
            Self::Ok { result } => Ok(result),
            Self::Error { error } => Err(error),
        }
    }
}

impl From<MemoryError> for MemoryResponse {
    fn from(err: MemoryError) -> Self {
        Self::Error {
            error: ErrorDescriptor::from(&err),
        }
    }
}

/// Per-participant outcome of a multi-user store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParticipantOutcome {
    Stored { uuid: String, path: String },
    Failed { uuid: String, error: ErrorDescriptor },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_are_tagged_by_op() {
        let request: MemoryRequest = serde_json::from_value(json!({
            "op": "append_to_conversation",
            "uuid": "u",
            "log_name": "chat",
            "message": "hi"
        }))
        .unwrap();
        assert_eq!(
            request,
            MemoryRequest::AppendToConversation {
                uuid: "u".into(),
                log_name: "chat".into(),
                message: "hi".into(),
                with_timestamp: true,
            }
        );

        let request: MemoryRequest = serde_json::from_str(r#"{"op":"list_users"}"#).unwrap();
        assert_eq!(request, MemoryRequest::ListUsers);
    }

    #[test]
    fn prune_arguments_are_optional() {
        let request: MemoryRequest = serde_json::from_value(json!({
            "op": "prune_conversation", "uuid": "u", "log_name": "chat", "keep_lines": 5
        }))
        .unwrap();
        assert_eq!(
            request,
            MemoryRequest::PruneConversation {
                uuid: "u".into(),
                log_name: "chat".into(),
                keep_lines: Some(5),
                start_date: None,
                end_date: None,
            }
        );
    }

    #[test]
    fn unknown_op_fails_to_parse() {
        assert!(serde_json::from_str::<MemoryRequest>(r#"{"op":"drop_tables"}"#).is_err());
    }

    #[test]
    fn response_wire_shape() {
        let ok = serde_json::to_value(MemoryResponse::ok(true)).unwrap();
        assert_eq!(ok, json!({"status": "ok", "result": true}));

        let err = serde_json::to_value(MemoryResponse::invalid("bad")).unwrap();
        assert_eq!(
            err,
            json!({"status": "error", "error": {"kind": "invalid_argument", "message": "bad"}})
        );
    }

    #[test]
    fn participant_outcomes_serialize_flat() {
        let stored = ParticipantOutcome::Stored { uuid: "a".into(), path: "/p".into() };
        assert_eq!(serde_json::to_value(&stored).unwrap(), json!({"uuid": "a", "path": "/p"}));
    }
}
