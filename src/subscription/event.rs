//! Change events
//!
//! The wire unit of the backend change feed. Delivery is at-least-once;
//! consumers must tolerate duplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of change an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    /// New record created
    Create,
    /// Existing record updated
    Update,
    /// Record deleted
    Delete,
}

impl std::fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeOperation::Create => write!(f, "CREATE"),
            ChangeOperation::Update => write!(f, "UPDATE"),
            ChangeOperation::Delete => write!(f, "DELETE"),
        }
    }
}

/// A change event pushed by the backend feed
///
/// `new_value` carries the post-operation record state for CREATE and
/// UPDATE; it is absent for DELETE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Entity (collection) the change belongs to
    pub entity: String,

    /// Operation kind
    pub operation: ChangeOperation,

    /// Record identity within the entity
    pub record_id: String,

    /// Post-operation record state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,

    /// Server timestamp of the change
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create a CREATE event
    pub fn create(entity: impl Into<String>, record_id: impl Into<String>, value: Value) -> Self {
        Self {
            entity: entity.into(),
            operation: ChangeOperation::Create,
            record_id: record_id.into(),
            new_value: Some(value),
            timestamp: Utc::now(),
        }
    }

    /// Create an UPDATE event
    pub fn update(entity: impl Into<String>, record_id: impl Into<String>, value: Value) -> Self {
        Self {
            entity: entity.into(),
            operation: ChangeOperation::Update,
            record_id: record_id.into(),
            new_value: Some(value),
            timestamp: Utc::now(),
        }
    }

    /// Create a DELETE event
    pub fn delete(entity: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            operation: ChangeOperation::Delete,
            record_id: record_id.into(),
            new_value: None,
            timestamp: Utc::now(),
        }
    }

    /// The feed topic this event is published under
    pub fn topic(&self) -> String {
        format!("changes:{}", self.entity)
    }
}
