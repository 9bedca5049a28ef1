//! Sender → backend conversation id persistence.
//!
//! The backend assigns a `custid` on the first turn of a conversation. Sending
//! it back on later turns keeps the bot's memory of the user; losing it just
//! starts a fresh conversation.

pub mod sqlite;

pub use sqlite::SqliteIdentityStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Link between a platform sender and a backend conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityMapping {
    pub platform_sender_id: String,
    pub backend_conversation_id: String,
    pub created_at: DateTime<Utc>,
}

/// Storage for identity mappings. Mappings are write-once.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    fn name(&self) -> &str;

    async fn find(&self, platform_sender_id: &str) -> Result<Option<IdentityMapping>>;

    /// Store a mapping unless one already exists for the sender.
    ///
    /// Returns `true` when a new mapping was written. An existing mapping is
    /// never overwritten; the first writer wins.
    async fn insert(&self, platform_sender_id: &str, backend_conversation_id: &str)
        -> Result<bool>;

    async fn list(&self) -> Result<Vec<IdentityMapping>>;
}
