//! Observability subsystem for the sync layer
//!
//! Provides:
//! - Structured logging (JSON)
//! - Typed lifecycle events
//! - Counters-only metrics
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. No async or background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use aerosync::observability::{Event, Logger, MetricsRegistry};
//!
//! Logger::event(Event::ActionEnqueued, &[("action_id", "abc")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_actions_enqueued();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
