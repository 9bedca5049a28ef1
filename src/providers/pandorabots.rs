//! Pandorabots `talk-xml` client.
//!
//! The endpoint takes a form POST (`input`, `botid`, optional `custid`) and
//! answers with a small XML document:
//!
//! ```text
//! <result status="0" botid="..." custid="d4a4c1e3ce0b3f7d"><input>hi</input><that>Hi there!</that></result>
//! ```

use super::{Provider, ProviderReply};
use crate::config::BackendConfig;
use crate::util::truncate_with_ellipsis;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

const THAT_OPEN: &str = "<that>";
const THAT_CLOSE: &str = "</that>";
const CUSTID_ATTR: &str = "custid=\"";

pub struct PandorabotsProvider {
    client: reqwest::Client,
    url: String,
    bot_id: String,
}

impl PandorabotsProvider {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let url = config.url.trim().to_string();
        if url.is_empty() {
            anyhow::bail!("Backend URL is empty");
        }
        let bot_id = config.bot_id.trim().to_string();
        if bot_id.is_empty() {
            anyhow::bail!("Backend bot id is empty");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("Failed to build backend HTTP client")?;
        Ok(Self {
            client,
            url,
            bot_id,
        })
    }
}

/// Text between the first `<that>` and the first `</that>` after it.
pub fn extract_that(body: &str) -> Option<&str> {
    let start = body.find(THAT_OPEN)? + THAT_OPEN.len();
    let len = body[start..].find(THAT_CLOSE)?;
    Some(&body[start..start + len])
}

/// Value of the first `custid="..."` attribute, if present and non-empty.
pub fn extract_custid(body: &str) -> Option<&str> {
    let start = body.find(CUSTID_ATTR)? + CUSTID_ATTR.len();
    let len = body[start..].find('"')?;
    Some(&body[start..start + len]).filter(|id| !id.trim().is_empty())
}

#[async_trait]
impl Provider for PandorabotsProvider {
    fn name(&self) -> &str {
        "pandorabots"
    }

    async fn converse(&self, input: &str, conversation_id: Option<&str>) -> Result<ProviderReply> {
        let mut form: Vec<(&str, &str)> = vec![("input", input), ("botid", self.bot_id.as_str())];
        if let Some(custid) = conversation_id {
            form.push(("custid", custid));
        }

        let resp = self
            .client
            .post(&self.url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .form(&form)
            .send()
            .await
            .context("Backend request failed")?;

        let status = resp.status();
        let body = resp.text().await.context("Backend response read failed")?;
        if status != StatusCode::OK {
            anyhow::bail!(
                "Backend returned {status}: {}",
                truncate_with_ellipsis(body.trim(), 200)
            );
        }
        tracing::debug!("Backend response: {}", truncate_with_ellipsis(&body, 200));

        let text = extract_that(&body)
            .with_context(|| {
                format!(
                    "Backend response has no <that> element: {}",
                    truncate_with_ellipsis(body.trim(), 200)
                )
            })?
            .to_string();

        Ok(ProviderReply {
            text,
            conversation_id: extract_custid(&body).map(ToOwned::to_owned),
        })
    }
}
