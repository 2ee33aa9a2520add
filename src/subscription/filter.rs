//! Subscription filters
//!
//! A channel sees every event on its entity's topic; the filter decides
//! which events reach the callback.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event::{ChangeEvent, ChangeOperation};

/// Filter operator for field predicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

/// A predicate over one field of the event's new value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldPredicate {
    /// Field to filter on
    pub field: String,
    /// Operator
    pub op: FilterOp,
    /// Value to compare
    pub value: Value,
}

impl FieldPredicate {
    /// Check if an event matches this predicate
    ///
    /// Events without a new value (deletes) never match a field predicate.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        let Some(data) = event.new_value.as_ref() else {
            return false;
        };

        let Some(field_value) = data.get(&self.field) else {
            return false;
        };

        match self.op {
            FilterOp::Eq => field_value == &self.value,
            FilterOp::Neq => field_value != &self.value,
            FilterOp::Gt => {
                if let (Some(a), Some(b)) = (field_value.as_f64(), self.value.as_f64()) {
                    a > b
                } else {
                    false
                }
            }
            FilterOp::Gte => {
                if let (Some(a), Some(b)) = (field_value.as_f64(), self.value.as_f64()) {
                    a >= b
                } else {
                    false
                }
            }
            FilterOp::Lt => {
                if let (Some(a), Some(b)) = (field_value.as_f64(), self.value.as_f64()) {
                    a < b
                } else {
                    false
                }
            }
            FilterOp::Lte => {
                if let (Some(a), Some(b)) = (field_value.as_f64(), self.value.as_f64()) {
                    a <= b
                } else {
                    false
                }
            }
            FilterOp::In => {
                if let Some(arr) = self.value.as_array() {
                    arr.contains(field_value)
                } else {
                    false
                }
            }
        }
    }
}

/// Filter attached to one channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFilter {
    /// Entity the channel watches
    pub entity: String,

    /// Operation kinds to deliver (None = all)
    pub operations: Option<HashSet<ChangeOperation>>,

    /// Field predicates, all of which must match
    pub predicates: Vec<FieldPredicate>,
}

impl EventFilter {
    /// Filter that delivers every event on an entity
    pub fn entity(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            operations: None,
            predicates: Vec::new(),
        }
    }

    /// Restrict to a set of operation kinds
    pub fn with_operations(mut self, operations: HashSet<ChangeOperation>) -> Self {
        self.operations = Some(operations);
        self
    }

    /// Add a field predicate
    pub fn with_predicate(mut self, predicate: FieldPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// The feed topic this filter subscribes to
    pub fn topic(&self) -> String {
        format!("changes:{}", self.entity)
    }

    /// Check if an event matches this filter
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.entity != self.entity {
            return false;
        }

        if let Some(ref operations) = self.operations {
            if !operations.contains(&event.operation) {
                return false;
            }
        }

        for predicate in &self.predicates {
            if !predicate.matches(event) {
                return false;
            }
        }

        true
    }
}
