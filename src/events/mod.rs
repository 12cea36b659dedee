//! Client-side data-change events
//!
//! This module provides:
//! - `DataEvent` / `EventKind`: typed events emitted after confirmed mutations
//! - `EventBus`: synchronous in-process publish/subscribe registry
//! - `DataResource` / `Watch`: component-scoped subscriptions that refetch
//! - `Alerts`: auto-dismissed notifications

mod alerts;
mod bus;
mod hooks;
mod types;

pub use alerts::{Alert, AlertLevel, Alerts, DEFAULT_ALERT_TTL};
pub use bus::{EventBus, ListenerId, Subscription, Watch};
pub use hooks::{DataResource, ResourceState};
pub use types::{CrudAction, DataEvent, EventKind};
