//! Queued actions
//!
//! The payload is a closed tagged union over the write kinds the backend
//! accepts. Malformed payloads are rejected at enqueue time and never
//! enter the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::errors::{QueueError, QueueResult};

/// Failure reported by an action's executor
///
/// Caught inside `drain`; never propagates to the caller of `enqueue`.
#[derive(Debug, Clone, Error)]
#[error("Executor failure: {0}")]
pub struct ExecutorError(pub String);

impl ExecutorError {
    /// Create an executor error with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A pending write operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    /// Create a record
    Create {
        entity: String,
        record_id: String,
        fields: Value,
    },
    /// Replace a record's fields
    Update {
        entity: String,
        record_id: String,
        fields: Value,
    },
    /// Delete a record
    Delete { entity: String, record_id: String },
}

impl ActionPayload {
    /// Entity the action targets
    pub fn entity(&self) -> &str {
        match self {
            ActionPayload::Create { entity, .. }
            | ActionPayload::Update { entity, .. }
            | ActionPayload::Delete { entity, .. } => entity,
        }
    }

    /// Record the action targets
    pub fn record_id(&self) -> &str {
        match self {
            ActionPayload::Create { record_id, .. }
            | ActionPayload::Update { record_id, .. }
            | ActionPayload::Delete { record_id, .. } => record_id,
        }
    }

    /// Short name of the action kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ActionPayload::Create { .. } => "create",
            ActionPayload::Update { .. } => "update",
            ActionPayload::Delete { .. } => "delete",
        }
    }

    /// Validate the payload before it enters the queue
    pub fn validate(&self) -> QueueResult<()> {
        if self.entity().is_empty() {
            return Err(QueueError::Validation("entity must not be empty".into()));
        }
        if self.record_id().is_empty() {
            return Err(QueueError::Validation("record_id must not be empty".into()));
        }

        match self {
            ActionPayload::Create { fields, .. } | ActionPayload::Update { fields, .. } => {
                if !fields.is_object() {
                    return Err(QueueError::Validation("fields must be an object".into()));
                }
                Ok(())
            }
            ActionPayload::Delete { .. } => Ok(()),
        }
    }
}

/// A durable queue entry
///
/// `attempts` is runtime bookkeeping for logs and drain reports; it is
/// not re-persisted on failure, so it resets across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Unique action ID
    pub id: Uuid,

    /// The write to perform
    pub payload: ActionPayload,

    /// When the action was enqueued
    pub created_at: DateTime<Utc>,

    /// Executions attempted this session
    #[serde(skip)]
    pub attempts: u32,

    /// Cache key whose speculative entry this action confirms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
}

impl QueuedAction {
    /// Create a new action pending execution
    pub fn new(payload: ActionPayload, cache_key: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            created_at: Utc::now(),
            attempts: 0,
            cache_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_accessors() {
        let payload = ActionPayload::Update {
            entity: "scores".to_string(),
            record_id: "s-1".to_string(),
            fields: json!({"points": 100}),
        };

        assert_eq!(payload.entity(), "scores");
        assert_eq!(payload.record_id(), "s-1");
        assert_eq!(payload.kind(), "update");
    }

    #[test]
    fn test_validation_rejects_empty_entity() {
        let payload = ActionPayload::Delete {
            entity: String::new(),
            record_id: "r-1".to_string(),
        };

        assert!(matches!(
            payload.validate(),
            Err(QueueError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_rejects_non_object_fields() {
        let payload = ActionPayload::Create {
            entity: "scores".to_string(),
            record_id: "s-1".to_string(),
            fields: json!("not an object"),
        };

        assert!(matches!(
            payload.validate(),
            Err(QueueError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_accepts_well_formed_payloads() {
        let create = ActionPayload::Create {
            entity: "scores".to_string(),
            record_id: "s-1".to_string(),
            fields: json!({"points": 10}),
        };
        let delete = ActionPayload::Delete {
            entity: "scores".to_string(),
            record_id: "s-1".to_string(),
        };

        assert!(create.validate().is_ok());
        assert!(delete.validate().is_ok());
    }

    #[test]
    fn test_payload_json_tag() {
        let payload = ActionPayload::Delete {
            entity: "scores".to_string(),
            record_id: "s-1".to_string(),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], "delete");
    }

    #[test]
    fn test_action_roundtrips_without_attempts() {
        let mut action = QueuedAction::new(
            ActionPayload::Create {
                entity: "scores".to_string(),
                record_id: "s-1".to_string(),
                fields: json!({"points": 10}),
            },
            Some("scores/s-1".to_string()),
        );
        action.attempts = 3;

        let text = serde_json::to_string(&action).unwrap();
        let back: QueuedAction = serde_json::from_str(&text).unwrap();

        assert_eq!(back.id, action.id);
        assert_eq!(back.payload, action.payload);
        assert_eq!(back.cache_key, action.cache_key);
        // attempts is session-local
        assert_eq!(back.attempts, 0);
    }
}
