//! Messenger webhook payloads.
//!
//! A delivery is a batch: `{ "object": "page", "entry": [ { "id", "time",
//! "messaging": [ event, ... ] } ] }`. Events stay as raw JSON until they are
//! classified so one odd event cannot sink the whole batch.

use serde::Deserialize;

pub const PAGE_OBJECT: &str = "page";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBatch {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<PageEntry>,
}

impl WebhookBatch {
    pub fn is_page_subscription(&self) -> bool {
        self.object == PAGE_OBJECT
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub messaging: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Participant {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Optin {
    #[serde(rename = "ref")]
    pub pass_through: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuickReply {
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessagePayload {
    pub mid: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
    pub app_id: Option<serde_json::Value>,
    pub metadata: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub quick_reply: Option<QuickReply>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Delivery {
    #[serde(default)]
    pub mids: Vec<String>,
    pub watermark: Option<i64>,
    pub seq: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Postback {
    pub title: Option<String>,
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReadReceipt {
    pub watermark: Option<i64>,
    pub seq: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AccountLinking {
    pub status: Option<String>,
    pub authorization_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Authentication(Optin),
    Message(MessagePayload),
    DeliveryConfirmation(Delivery),
    Postback(Postback),
    ReadReceipt(ReadReceipt),
    AccountLink(AccountLinking),
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Authentication(_) => "authentication",
            EventKind::Message(_) => "message",
            EventKind::DeliveryConfirmation(_) => "delivery",
            EventKind::Postback(_) => "postback",
            EventKind::ReadReceipt(_) => "read",
            EventKind::AccountLink(_) => "account_linking",
        }
    }
}

/// One classified messaging event.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub sender_id: String,
    pub recipient_id: String,
    pub timestamp: Option<i64>,
    pub kind: EventKind,
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("malformed messaging event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("messaging event has no known kind")]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    sender: Participant,
    recipient: Participant,
    timestamp: Option<i64>,
    optin: Option<Optin>,
    message: Option<MessagePayload>,
    delivery: Option<Delivery>,
    postback: Option<Postback>,
    read: Option<ReadReceipt>,
    account_linking: Option<AccountLinking>,
}

impl InboundEvent {
    /// Classify a raw event by the first kind field present, checked in the
    /// order `optin`, `message`, `delivery`, `postback`, `read`, `account_linking`.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, EventError> {
        let raw = RawEvent::deserialize(value)?;

        let kind = if let Some(optin) = raw.optin {
            EventKind::Authentication(optin)
        } else if let Some(message) = raw.message {
            EventKind::Message(message)
        } else if let Some(delivery) = raw.delivery {
            EventKind::DeliveryConfirmation(delivery)
        } else if let Some(postback) = raw.postback {
            EventKind::Postback(postback)
        } else if let Some(read) = raw.read {
            EventKind::ReadReceipt(read)
        } else if let Some(linking) = raw.account_linking {
            EventKind::AccountLink(linking)
        } else {
            return Err(EventError::Unknown);
        };

        Ok(Self {
            sender_id: raw.sender.id,
            recipient_id: raw.recipient.id,
            timestamp: raw.timestamp,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(extra: serde_json::Value) -> serde_json::Value {
        let mut event = json!({
            "sender": {"id": "USER_ID"},
            "recipient": {"id": "PAGE_ID"},
            "timestamp": 1_458_692_752_478_i64
        });
        if let (Some(target), Some(fields)) = (event.as_object_mut(), extra.as_object()) {
            for (k, v) in fields {
                target.insert(k.clone(), v.clone());
            }
        }
        event
    }

    #[test]
    fn parses_batch_shape() {
        let batch: WebhookBatch = serde_json::from_value(json!({
            "object": "page",
            "entry": [{"id": "PAGE_ID", "time": 1_458_692_752_478_i64, "messaging": [
                envelope(json!({"message": {"mid": "mid.1", "text": "hello"}}))
            ]}]
        }))
        .unwrap();
        assert!(batch.is_page_subscription());
        assert_eq!(batch.entry.len(), 1);
        assert_eq!(batch.entry[0].messaging.len(), 1);
    }

    #[test]
    fn batch_without_entries_is_empty() {
        let batch: WebhookBatch = serde_json::from_value(json!({"object": "user"})).unwrap();
        assert!(!batch.is_page_subscription());
        assert!(batch.entry.is_empty());
    }

    #[test]
    fn classifies_text_message() {
        let event = InboundEvent::from_value(&envelope(json!({
            "message": {"mid": "mid.1", "text": "hello keiko"}
        })))
        .unwrap();
        assert_eq!(event.sender_id, "USER_ID");
        assert_eq!(event.recipient_id, "PAGE_ID");
        assert_eq!(event.timestamp, Some(1_458_692_752_478));
        let EventKind::Message(message) = event.kind else {
            panic!("expected message");
        };
        assert_eq!(message.text.as_deref(), Some("hello keiko"));
        assert!(!message.is_echo);
    }

    #[test]
    fn classifies_every_kind() {
        let cases = [
            (json!({"optin": {"ref": "PASS_THROUGH"}}), "authentication"),
            (json!({"delivery": {"mids": ["mid.1"], "watermark": 1, "seq": 37}}), "delivery"),
            (json!({"postback": {"payload": "GET_STARTED"}}), "postback"),
            (json!({"read": {"watermark": 1, "seq": 38}}), "read"),
            (
                json!({"account_linking": {"status": "linked", "authorization_code": "1234567890"}}),
                "account_linking",
            ),
            (json!({"message": {"attachments": [{"type": "image"}]}}), "message"),
        ];
        for (extra, label) in cases {
            let event = InboundEvent::from_value(&envelope(extra)).unwrap();
            assert_eq!(event.kind.label(), label);
        }
    }

    #[test]
    fn optin_wins_over_message() {
        let event = InboundEvent::from_value(&envelope(json!({
            "optin": {"ref": "x"},
            "message": {"text": "hi"}
        })))
        .unwrap();
        assert!(matches!(event.kind, EventKind::Authentication(_)));
    }

    #[test]
    fn unknown_event_is_reported() {
        let err = InboundEvent::from_value(&envelope(json!({"reaction": {"emoji": "👍"}})))
            .unwrap_err();
        assert!(matches!(err, EventError::Unknown));
    }

    #[test]
    fn event_without_sender_is_malformed() {
        let err = InboundEvent::from_value(&json!({"message": {"text": "hi"}})).unwrap_err();
        assert!(matches!(err, EventError::Malformed(_)));
    }

    #[test]
    fn quick_reply_and_echo_fields_parse() {
        let event = InboundEvent::from_value(&envelope(json!({
            "message": {
                "mid": "mid.2",
                "is_echo": true,
                "app_id": 1_517_776_481_860_111_i64,
                "metadata": "DEVELOPER_DEFINED",
                "text": "hi",
                "quick_reply": {"payload": "PICK_ACTION"}
            }
        })))
        .unwrap();
        let EventKind::Message(message) = event.kind else {
            panic!("expected message");
        };
        assert!(message.is_echo);
        assert_eq!(message.quick_reply.unwrap().payload, "PICK_ACTION");
        assert_eq!(message.metadata.as_deref(), Some("DEVELOPER_DEFINED"));
    }
}
