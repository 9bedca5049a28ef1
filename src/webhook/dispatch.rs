use super::events::{EventKind, InboundEvent, MessagePayload, WebhookBatch};
use crate::relay::Relay;
use crate::util::truncate_with_ellipsis;
use anyhow::Result;
use std::sync::Arc;

pub const QUICK_REPLY_ACK: &str = "Quick reply tapped";
pub const ATTACHMENT_ACK: &str = "Message with attachment received";
pub const AUTHENTICATION_ACK: &str = "Authentication successful";
pub const POSTBACK_ACK: &str = "Postback called";

/// What to do with an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageAction {
    /// Nothing to answer.
    Ignore(&'static str),
    /// Send fixed text without touching the backend.
    Reply(&'static str),
    /// Run a conversation turn with this text.
    Relay(String),
}

/// Decide how a message is answered. Echo beats quick reply beats text beats
/// attachments.
pub fn plan_message(message: &MessagePayload) -> MessageAction {
    if message.is_echo {
        return MessageAction::Ignore("echo");
    }
    if message.quick_reply.is_some() {
        return MessageAction::Reply(QUICK_REPLY_ACK);
    }
    if let Some(text) = message.text.as_deref().filter(|t| !t.is_empty()) {
        return MessageAction::Relay(text.to_string());
    }
    if !message.attachments.is_empty() {
        return MessageAction::Reply(ATTACHMENT_ACK);
    }
    MessageAction::Ignore("empty message")
}

/// Per-batch counters, logged once the batch finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub handled: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    relay: Arc<Relay>,
}

impl Dispatcher {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self { relay }
    }

    /// Process every event of a page batch in order. A bad event never stops
    /// the rest of the batch.
    pub async fn dispatch_batch(&self, batch: WebhookBatch) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        for entry in batch.entry {
            for raw in entry.messaging {
                let event = match InboundEvent::from_value(&raw) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(
                            "Skipping webhook event from page {}: {e} ({})",
                            entry.id.as_deref().unwrap_or("?"),
                            truncate_with_ellipsis(&raw.to_string(), 120)
                        );
                        summary.skipped += 1;
                        continue;
                    }
                };
                match self.dispatch_event(event).await {
                    Ok(()) => summary.handled += 1,
                    Err(e) => {
                        tracing::error!("Webhook event failed: {e:#}");
                        summary.failed += 1;
                    }
                }
            }
        }
        summary
    }

    pub async fn dispatch_event(&self, event: InboundEvent) -> Result<()> {
        let InboundEvent {
            sender_id,
            recipient_id,
            timestamp,
            kind,
        } = event;
        let at = timestamp.unwrap_or_default();

        match kind {
            EventKind::Authentication(optin) => {
                tracing::info!(
                    "Received authentication for user {sender_id} and page {recipient_id} with pass through param '{}' at {at}",
                    optin.pass_through.as_deref().unwrap_or("")
                );
                self.relay.acknowledge(&sender_id, AUTHENTICATION_ACK).await
            }
            EventKind::Message(message) => {
                tracing::info!(
                    "Received message for user {sender_id} and page {recipient_id} at {at} (mid {})",
                    message.mid.as_deref().unwrap_or("?")
                );
                match plan_message(&message) {
                    MessageAction::Ignore(reason) => {
                        tracing::debug!("Ignoring message from {sender_id}: {reason}");
                        Ok(())
                    }
                    MessageAction::Reply(text) => self.relay.acknowledge(&sender_id, text).await,
                    MessageAction::Relay(text) => {
                        tracing::debug!(
                            "Relaying text from {sender_id}: {}",
                            truncate_with_ellipsis(&text, 80)
                        );
                        self.relay.relay_text(&sender_id, &text).await.map(|_| ())
                    }
                }
            }
            EventKind::DeliveryConfirmation(delivery) => {
                for mid in &delivery.mids {
                    tracing::info!("Received delivery confirmation for message ID: {mid}");
                }
                tracing::info!(
                    "All messages before {} were delivered",
                    delivery.watermark.unwrap_or_default()
                );
                Ok(())
            }
            EventKind::Postback(postback) => {
                tracing::info!(
                    "Received postback for user {sender_id} and page {recipient_id} with payload '{}' at {at}",
                    postback.payload.as_deref().unwrap_or("")
                );
                self.relay.acknowledge(&sender_id, POSTBACK_ACK).await
            }
            EventKind::ReadReceipt(read) => {
                tracing::info!(
                    "Received message read event for watermark {} and sequence number {}",
                    read.watermark.unwrap_or_default(),
                    read.seq.unwrap_or_default()
                );
                Ok(())
            }
            EventKind::AccountLink(linking) => {
                tracing::info!(
                    "Received account link event for user {sender_id} with status {} and auth code {}",
                    linking.status.as_deref().unwrap_or("?"),
                    linking.authorization_code.as_deref().unwrap_or("-")
                );
                Ok(())
            }
        }
    }
}
