//! Maps protocol requests onto [`MemoryManager`] operations.

use tracing::{debug, warn};

use callisto_memory::MemoryManager;

use crate::commands::{ErrorDescriptor, MemoryRequest, MemoryResponse, ParticipantOutcome};

/// Execute one request. Never panics on bad input: every failure becomes an
/// error response.
pub fn dispatch(memory: &MemoryManager, request: MemoryRequest) -> MemoryResponse {
    use MemoryRequest as R;

    let response = match request {
        R::UserExists { uuid } => MemoryResponse::ok(memory.user_exists(&uuid)),
        R::GetUserData { uuid } => respond(memory.get_user_data(&uuid)),
        R::CreateUser { uuid, initial } => respond(memory.create_user(&uuid, initial)),
        R::UpdateUser { uuid, data } => respond(memory.update_user(&uuid, data)),
        R::UpdateUserField {
            uuid,
            category,
            field,
            value,
        } => respond(memory.update_user_field(&uuid, &category, &field, value)),
        R::AddToUserList {
            uuid,
            list_name,
            value,
        } => respond(memory.add_to_user_list(&uuid, &list_name, value)),
        R::DeleteUser { uuid } => respond(memory.delete_user(&uuid)),
        R::ListUsers => respond(memory.list_users()),
        R::MergeUsers {
            source_uuid,
            target_uuid,
        } => respond(memory.merge_users(&source_uuid, &target_uuid)),
        R::GetConversation { uuid, log_name } => respond(memory.get_conversation(&uuid, &log_name)),
        R::StoreConversation {
            uuid,
            log_name,
            content,
        } => respond(
            memory
                .store_conversation(&uuid, &log_name, &content)
                .map(|path| path.display().to_string()),
        ),
        R::AppendToConversation {
            uuid,
            log_name,
            message,
            with_timestamp,
        } => respond(
            memory
                .append_to_conversation(&uuid, &log_name, &message, with_timestamp)
                .map(|path| path.display().to_string()),
        ),
        R::StoreMultiUserConversation {
            uuids,
            log_name,
            content,
        } => respond(
            memory
                .store_multi_user_conversation(&uuids, &log_name, &content)
                .map(|results| {
                    uuids
                        .iter()
                        .zip(results)
                        .map(|(uuid, result)| match result {
                            Ok(path) => ParticipantOutcome::Stored {
                                uuid: uuid.clone(),
                                path: path.display().to_string(),
                            },
                            Err(err) => ParticipantOutcome::Failed {
                                uuid: uuid.clone(),
                                error: ErrorDescriptor::from(&err),
                            },
                        })
                        .collect::<Vec<_>>()
                }),
        ),
        R::ConversationExists { uuid, log_name } => {
            respond(memory.conversation_exists(&uuid, &log_name))
        }
        R::ListConversations { uuid } => respond(memory.list_conversations(&uuid)),
        R::DeleteConversation { uuid, log_name } => {
            respond(memory.delete_conversation(&uuid, &log_name))
        }
        R::PruneConversation {
            uuid,
            log_name,
            keep_lines,
            start_date,
            end_date,
        } => respond(memory.prune_conversation(
            &uuid,
            &log_name,
            keep_lines,
            start_date.as_deref(),
            end_date.as_deref(),
        )),
        R::Stats => respond(memory.stats()),
        R::Ping => MemoryResponse::ok("pong"),
        R::Shutdown => MemoryResponse::ok("shutting down"),
    };

    if let MemoryResponse::Error { error } = &response {
        warn!(kind = ?error.kind, message = %error.message, "memory request failed");
    }
    response
}

fn respond<T: serde::Serialize>(result: callisto_memory::Result<T>) -> MemoryResponse {
    match result {
        Ok(value) => MemoryResponse::ok(value),
        Err(err) => MemoryResponse::from(err),
    }
}

/// Parse and execute one JSON line. The flag is `true` when the request
/// asked the serving loop to stop.
pub fn handle_line(memory: &MemoryManager, line: &str) -> (MemoryResponse, bool) {
    match serde_json::from_str::<MemoryRequest>(line) {
        Ok(request) => {
            debug!(?request, "dispatching memory request");
            let shutdown = matches!(request, MemoryRequest::Shutdown);
            (dispatch(memory, request), shutdown)
        }
        Err(err) => (MemoryResponse::invalid(format!("malformed request: {err}")), false),
    }
}
