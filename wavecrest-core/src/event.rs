//! Synthetic event wire format
//!
//! Events are published as the JSON object the messaging backend forwards to
//! a user's socket unchanged. The monotonic send time rides inside
//! `messageContent` behind [`BENCH_NANO_PREFIX`], and `messageId` carries the
//! sequence number.
use crate::clock::monotonic_nanos;
use crate::constants::*;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    pub message_id: u64,
    /// Routing target. A leading `U` routes to a single user.
    pub contact_id: String,
    pub contact_type: u8,
    pub send_user_id: String,
    pub send_user_nick_name: String,
    pub message_content: String,
    pub message_type: u8,
    /// Wall-clock milliseconds; informational only.
    pub send_time: u64,
}

/// A timestamped probe message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticEvent {
    pub sequence: u64,
    pub target: String,
    pub sender: String,
    pub sent_at_nanos: u64,
}

impl SyntheticEvent {
    /// Stamp a new event with the current monotonic time.
    pub fn new(sequence: u64, target: &str, sender: &str) -> Self {
        Self::with_timestamp(sequence, target, sender, monotonic_nanos())
    }

    pub fn with_timestamp(sequence: u64, target: &str, sender: &str, sent_at_nanos: u64) -> Self {
        Self {
            sequence,
            target: target.to_string(),
            sender: sender.to_string(),
            sent_at_nanos,
        }
    }

    pub fn to_envelope(&self) -> MessageEnvelope {
        MessageEnvelope {
            message_id: self.sequence,
            contact_id: self.target.clone(),
            contact_type: USER_CONTACT_TYPE,
            send_user_id: self.sender.clone(),
            send_user_nick_name: DEFAULT_SENDER_NICKNAME.to_string(),
            message_content: format!("{BENCH_NANO_PREFIX}{}", self.sent_at_nanos),
            message_type: CHAT_MESSAGE_TYPE,
            send_time: wall_clock_millis(),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_envelope())
    }

    /// Parse an inbound frame. Anything that is not a benchmark event yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let inbound: InboundEnvelope = serde_json::from_str(text).ok()?;
        let sent_at_nanos = inbound
            .message_content?
            .strip_prefix(BENCH_NANO_PREFIX)?
            .trim()
            .parse()
            .ok()?;

        Some(Self {
            sequence: inbound.message_id?,
            target: inbound.contact_id.unwrap_or_default(),
            sender: inbound.send_user_id.unwrap_or_default(),
            sent_at_nanos,
        })
    }
}

// NOTE: The backend may decorate forwarded objects with extra fields, so the
// inbound side only looks at what it needs and tolerates everything else.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundEnvelope {
    message_id: Option<u64>,
    contact_id: Option<String>,
    send_user_id: Option<String>,
    message_content: Option<String>,
}

fn wall_clock_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
