//! # Change Subscriptions
//!
//! Named channels onto the backend change feed.
//!
//! ## Architecture
//!
//! - **Events**: the feed's wire unit (entity, operation, new value)
//! - **Filters**: entity + operation set + field predicates
//! - **Transport**: the seam hiding the hosted push API
//! - **Manager**: channel registry, delivery tasks, backoff re-establishment
//!
//! Delivery is at-least-once and ordered per channel only.

pub mod backoff;
pub mod errors;
pub mod event;
pub mod filter;
pub mod manager;
pub mod transport;

pub use backoff::Backoff;
pub use errors::{SubscriptionError, SubscriptionResult};
pub use event::{ChangeEvent, ChangeOperation};
pub use filter::{EventFilter, FieldPredicate, FilterOp};
pub use manager::{
    ChangeSubscriptionManager, ChannelHandle, ChannelStatus, ErrorCallback, EventCallback,
};
pub use transport::{ChangeTransport, EventSink, EventStream, InMemoryTransport};
