use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;

use anyhow::{Result, bail};
use serde_json::{Map, Value};

use callisto_memory::MemoryManager;
use callisto_runtime::{MemoryRequest, MemoryResponse, dispatch};

use crate::{LogCommands, UserCommands};

/// JSON when it parses, otherwise the raw text as a JSON string.
pub(crate) fn parse_json_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_object_arg(flag: &str, raw: &str) -> Result<Map<String, Value>> {
    match parse_json_arg(raw) {
        Value::Object(map) => Ok(map),
        other => bail!("--{flag} must be a JSON object, got {other}"),
    }
}

fn content_or_stdin(content: Option<String>) -> Result<String> {
    if let Some(content) = content {
        return Ok(content);
    }
    if io::stdin().is_terminal() {
        bail!("no --content given and stdin is a terminal");
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

pub(crate) fn user_request(command: UserCommands) -> Result<MemoryRequest> {
    Ok(match command {
        UserCommands::Exists { uuid } => MemoryRequest::UserExists { uuid },
        UserCommands::Get { uuid } => MemoryRequest::GetUserData { uuid },
        UserCommands::Create { uuid, data } => MemoryRequest::CreateUser {
            uuid,
            initial: data.as_deref().map(|raw| parse_object_arg("data", raw)).transpose()?,
        },
        UserCommands::Update { uuid, data } => MemoryRequest::UpdateUser {
            uuid,
            data: parse_object_arg("data", &data)?,
        },
        UserCommands::SetField {
            uuid,
            category,
            field,
            value,
        } => MemoryRequest::UpdateUserField {
            uuid,
            category,
            field,
            value: parse_json_arg(&value),
        },
        UserCommands::AddToList {
            uuid,
            list_name,
            value,
        } => MemoryRequest::AddToUserList {
            uuid,
            list_name,
            value: parse_json_arg(&value),
        },
        UserCommands::Delete { uuid } => MemoryRequest::DeleteUser { uuid },
        UserCommands::List => MemoryRequest::ListUsers,
        UserCommands::Merge { source, target } => MemoryRequest::MergeUsers {
            source_uuid: source,
            target_uuid: target,
        },
    })
}

pub(crate) fn log_request(command: LogCommands) -> Result<MemoryRequest> {
    Ok(match command {
        LogCommands::Store {
            uuid,
            name,
            content,
        } => MemoryRequest::StoreConversation {
            uuid,
            log_name: name,
            content: content_or_stdin(content)?,
        },
        LogCommands::Append {
            uuid,
            name,
            message,
            no_timestamp,
        } => MemoryRequest::AppendToConversation {
            uuid,
            log_name: name,
            message,
            with_timestamp: !no_timestamp,
        },
        LogCommands::StoreMulti {
            name,
            uuids,
            content,
        } => MemoryRequest::StoreMultiUserConversation {
            uuids,
            log_name: name,
            content: content_or_stdin(content)?,
        },
        LogCommands::Get { uuid, name } => MemoryRequest::GetConversation {
            uuid,
            log_name: name,
        },
        LogCommands::Exists { uuid, name } => MemoryRequest::ConversationExists {
            uuid,
            log_name: name,
        },
        LogCommands::List { uuid } => MemoryRequest::ListConversations { uuid },
        LogCommands::Delete { uuid, name } => MemoryRequest::DeleteConversation {
            uuid,
            log_name: name,
        },
        LogCommands::Prune {
            uuid,
            name,
            keep_lines,
            start_date,
            end_date,
        } => MemoryRequest::PruneConversation {
            uuid,
            log_name: name,
            keep_lines,
            start_date,
            end_date,
        },
    })
}

pub(crate) fn run_local(memory: &MemoryManager, request: MemoryRequest) -> Result<ExitCode> {
    print_response(&dispatch(memory, request))
}

/// Pretty-print the result (or the error descriptor) on stdout. Error
/// responses map to a failing exit code.
pub(crate) fn print_response(response: &MemoryResponse) -> Result<ExitCode> {
    match response {
        MemoryResponse::Ok { result } => {
            println!("{}", serde_json::to_string_pretty(result)?);
            Ok(ExitCode::SUCCESS)
        }
        MemoryResponse::Error { error } => {
            println!("{}", serde_json::to_string_pretty(error)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_args_fall_back_to_strings() {
        assert_eq!(parse_json_arg("42"), json!(42));
        assert_eq!(parse_json_arg("{\"a\":[1]}"), json!({"a": [1]}));
        assert_eq!(parse_json_arg("London"), json!("London"));
        assert_eq!(parse_json_arg("\"quoted\""), json!("quoted"));
    }

    #[test]
    fn data_must_be_an_object() {
        assert!(parse_object_arg("data", "[1,2]").is_err());
        assert!(parse_object_arg("data", "plain").is_err());
        assert_eq!(parse_object_arg("data", "{}").unwrap(), Map::new());
    }

    #[test]
    fn append_timestamps_by_default() {
        let request = log_request(LogCommands::Append {
            uuid: "u".into(),
            name: "chat".into(),
            message: "hi".into(),
            no_timestamp: false,
        })
        .unwrap();
        assert!(matches!(
            request,
            MemoryRequest::AppendToConversation { with_timestamp: true, .. }
        ));
    }

    #[test]
    fn set_field_parses_the_value() {
        let request = user_request(UserCommands::SetField {
            uuid: "u".into(),
            category: "personal".into(),
            field: "age".into(),
            value: "30".into(),
        })
        .unwrap();
        match request {
            MemoryRequest::UpdateUserField { value, .. } => assert_eq!(value, json!(30)),
            other => panic!("unexpected request: {other:?}"),
        }
    }
}
