//! The conversation turn: user text → backend → user.

use crate::channels::{Channel, SendMessage};
use crate::identity::IdentityStore;
use crate::providers::Provider;
use crate::transform::TextPipeline;
use crate::util::truncate_with_ellipsis;
use anyhow::{Context, Result};
use std::sync::Arc;

/// What a relayed turn ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Reply delivered to the user.
    Delivered { text: String },
    /// Backend answered with nothing printable after cleanup; nothing sent.
    EmptyReply,
}

/// Relays user text through the backend and sends the answer back.
pub struct Relay {
    provider: Arc<dyn Provider>,
    channel: Arc<dyn Channel>,
    identities: Arc<dyn IdentityStore>,
    pipeline: TextPipeline,
}

impl Relay {
    pub fn new(
        provider: Arc<dyn Provider>,
        channel: Arc<dyn Channel>,
        identities: Arc<dyn IdentityStore>,
        pipeline: TextPipeline,
    ) -> Self {
        Self {
            provider,
            channel,
            identities,
            pipeline,
        }
    }

    /// Run one conversation turn for `sender_id`.
    ///
    /// Backend and platform failures propagate; a failure to record a new
    /// conversation id is logged and the reply still goes out.
    pub async fn relay_text(&self, sender_id: &str, text: &str) -> Result<TurnOutcome> {
        let input = self.pipeline.prepare_request(text);

        let existing = self
            .identities
            .find(sender_id)
            .await
            .with_context(|| format!("Identity lookup failed for sender {sender_id}"))?;
        let conversation_id = existing
            .as_ref()
            .map(|mapping| mapping.backend_conversation_id.as_str());

        let reply = self
            .provider
            .converse(&input, conversation_id)
            .await
            .with_context(|| format!("{} turn failed for sender {sender_id}", self.provider.name()))?;

        if existing.is_none() {
            self.remember_conversation(sender_id, reply.conversation_id.as_deref())
                .await;
        }

        let outbound = self.pipeline.finish_reply(&reply.text);
        if outbound.trim().is_empty() {
            tracing::warn!(
                "Backend reply for {sender_id} was empty after cleanup (raw: {})",
                truncate_with_ellipsis(&reply.text, 80)
            );
            return Ok(TurnOutcome::EmptyReply);
        }

        self.channel
            .send(&SendMessage::new(outbound.clone(), sender_id))
            .await
            .with_context(|| format!("{} send failed for {sender_id}", self.channel.name()))?;
        Ok(TurnOutcome::Delivered { text: outbound })
    }

    /// Send fixed text straight to the user, bypassing the backend.
    pub async fn acknowledge(&self, recipient_id: &str, text: &str) -> Result<()> {
        self.channel
            .send(&SendMessage::new(text, recipient_id))
            .await
            .with_context(|| format!("{} send failed for {recipient_id}", self.channel.name()))
    }

    async fn remember_conversation(&self, sender_id: &str, conversation_id: Option<&str>) {
        let Some(conversation_id) = conversation_id else {
            tracing::warn!("Backend assigned no conversation id for new sender {sender_id}");
            return;
        };
        match self.identities.insert(sender_id, conversation_id).await {
            Ok(true) => tracing::info!("Linked sender {sender_id} to conversation {conversation_id}"),
            Ok(false) => tracing::debug!("Sender {sender_id} was linked concurrently; keeping first"),
            Err(e) => tracing::error!(
                "Failed to store conversation id for {sender_id} in {}: {e:#}",
                self.identities.name()
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::channels::{Channel, SendMessage};
    use crate::providers::{Provider, ProviderReply};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Provider that echoes scripted replies and records its inputs.
    #[derive(Default)]
    pub struct ScriptedProvider {
        pub reply: Mutex<String>,
        pub assign_id: Mutex<Option<String>>,
        pub fail: Mutex<bool>,
        pub calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedProvider {
        pub fn replying(reply: &str, assign_id: Option<&str>) -> Self {
            Self {
                reply: Mutex::new(reply.to_string()),
                assign_id: Mutex::new(assign_id.map(ToOwned::to_owned)),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn converse(
            &self,
            input: &str,
            conversation_id: Option<&str>,
        ) -> anyhow::Result<ProviderReply> {
            self.calls
                .lock()
                .push((input.to_string(), conversation_id.map(ToOwned::to_owned)));
            if *self.fail.lock() {
                anyhow::bail!("backend unavailable");
            }
            Ok(ProviderReply {
                text: self.reply.lock().clone(),
                conversation_id: self.assign_id.lock().clone(),
            })
        }
    }

    /// Channel that records every message instead of sending it.
    #[derive(Default)]
    pub struct RecordingChannel {
        pub sent: Mutex<Vec<SendMessage>>,
        pub fail: Mutex<bool>,
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, message: &SendMessage) -> anyhow::Result<()> {
            if *self.fail.lock() {
                anyhow::bail!("platform unavailable");
            }
            self.sent.lock().push(message.clone());
            Ok(())
        }
    }
}
