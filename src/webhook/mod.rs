//! Inbound Messenger webhook events and their routing.

pub mod dispatch;
pub mod events;

pub use dispatch::{DispatchSummary, Dispatcher, MessageAction};
pub use events::{EventKind, InboundEvent, WebhookBatch};
