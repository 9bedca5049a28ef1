pub mod pandorabots;

pub use pandorabots::PandorabotsProvider;

use anyhow::Result;
use async_trait::async_trait;

/// One turn's worth of backend output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReply {
    /// Raw reply text, still escaped and carrying backend markup.
    pub text: String,
    /// Conversation id the backend assigned or echoed back, if any.
    pub conversation_id: Option<String>,
}

/// Conversational backend the relay forwards user text to.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Run one conversation turn. `conversation_id` continues an earlier
    /// conversation; `None` starts a new one.
    async fn converse(&self, input: &str, conversation_id: Option<&str>) -> Result<ProviderReply>;
}
