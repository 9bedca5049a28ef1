//! Messenger Platform Send API client.
//! See: <https://developers.facebook.com/docs/messenger-platform/reference/send-api>

use super::traits::{Channel, SendMessage};
use crate::config::MessengerConfig;
use crate::util::truncate_with_ellipsis;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    recipient: Recipient<'a>,
    message: TextMessage<'a>,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SendResponse {
    recipient_id: Option<String>,
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: serde_json::Value,
}

#[derive(Clone)]
pub struct MessengerChannel {
    client: reqwest::Client,
    send_api_url: String,
    page_access_token: String,
}

impl MessengerChannel {
    pub fn new(config: &MessengerConfig) -> Result<Self> {
        let send_api_url = config.send_api_url.trim().to_string();
        if send_api_url.is_empty() {
            anyhow::bail!("Messenger Send API URL is empty");
        }
        let page_access_token = config.page_access_token.trim().to_string();
        if page_access_token.is_empty() {
            anyhow::bail!("Messenger page access token is empty");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("Failed to build Send API HTTP client")?;
        Ok(Self {
            client,
            send_api_url,
            page_access_token,
        })
    }
}

#[async_trait]
impl Channel for MessengerChannel {
    fn name(&self) -> &str {
        "messenger"
    }

    async fn send(&self, message: &SendMessage) -> anyhow::Result<()> {
        let payload = SendRequest {
            recipient: Recipient {
                id: &message.recipient,
            },
            message: TextMessage {
                text: &message.content,
            },
        };

        let resp = self
            .client
            .post(&self.send_api_url)
            .query(&[("access_token", self.page_access_token.as_str())])
            .json(&payload)
            .send()
            .await
            .context("Send API request failed")?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.to_string())
                .unwrap_or_else(|_| truncate_with_ellipsis(body.trim(), 200));
            tracing::error!("Failed calling Send API ({status}): {detail}");
            anyhow::bail!("Send API returned {status}: {detail}");
        }

        let parsed = serde_json::from_str::<SendResponse>(&body).unwrap_or_default();
        let recipient = parsed
            .recipient_id
            .as_deref()
            .unwrap_or(message.recipient.as_str());
        match parsed.message_id {
            Some(message_id) => tracing::info!(
                "Successfully sent message with id {message_id} to recipient {recipient}"
            ),
            None => tracing::info!("Successfully called Send API for recipient {recipient}"),
        }
        Ok(())
    }
}
