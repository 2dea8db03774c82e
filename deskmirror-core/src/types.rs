//! Core domain types for deskmirror
//!
//! These types are the typed projection of Chatwoot API payloads that the
//! mirror stores next to the lossless `raw_data` JSON.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Account** | A Chatwoot tenant; everything below belongs to one |
//! | **Inbox** | A channel (WhatsApp number, web widget, email) receiving conversations |
//! | **Conversation** | A thread between a contact and the team inside an inbox |
//! | **Message** | A single entry in a conversation, written by a contact or an agent |
//!
//! Payload parsing is forgiving: a mistyped field becomes `None` instead of
//! failing the whole record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================
// Payload helpers
// ============================================

/// Read an integer that may be encoded as a JSON number or numeric string.
pub(crate) fn as_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Read any scalar as text.
pub(crate) fn as_str(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Array(_) | Value::Object(_) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Read a string field and return it trimmed, or `None` if blank.
fn non_blank(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ============================================
// Account
// ============================================

/// A Chatwoot account (tenant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub locale: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<String>,
}

impl Account {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            id: as_int(payload.get("id")),
            name: as_str(payload.get("name")),
            locale: as_str(payload.get("locale")),
            status: as_str(payload.get("status")),
            created_at: as_str(payload.get("created_at")),
        }
    }
}

// ============================================
// Inbox
// ============================================

/// A channel receiving conversations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inbox {
    pub id: Option<i64>,
    pub account_id: Option<i64>,
    pub name: Option<String>,
    pub channel_type: Option<String>,
    /// Phone number, email, bot name or website the channel is reachable at
    pub address: Option<String>,
}

impl Inbox {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            id: as_int(payload.get("id")),
            account_id: as_int(payload.get("account_id")),
            name: as_str(payload.get("name")),
            channel_type: as_str(payload.get("channel_type")),
            address: pick_address(payload),
        }
    }
}

fn pick_address(payload: &Value) -> Option<String> {
    for key in ["phone_number", "email", "bot_name"] {
        if let Some(value) = non_blank(payload, key) {
            return Some(value);
        }
    }

    let is_widget = payload
        .get("channel_type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.ends_with("WebWidget"));
    if is_widget {
        return non_blank(payload, "website_url");
    }

    None
}

// ============================================
// Conversation
// ============================================

/// A conversation inside an inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Option<i64>,
    pub account_id: Option<i64>,
    pub inbox_id: Option<i64>,
    pub status: Option<String>,
    /// Epoch seconds
    pub created_at: Option<i64>,
    /// Epoch seconds
    pub last_activity_at: Option<i64>,
}

impl Conversation {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            id: as_int(payload.get("id")),
            account_id: as_int(payload.get("account_id")),
            inbox_id: as_int(payload.get("inbox_id")),
            status: as_str(payload.get("status")),
            created_at: as_int(payload.get("created_at")),
            last_activity_at: as_int(payload.get("last_activity_at")),
        }
    }
}

// ============================================
// Message
// ============================================

/// Who wrote a message, derived from sender type and message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    /// A team member (Chatwoot "User")
    Agent,
    /// The customer
    Contact,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Agent => "agent",
            SenderRole::Contact => "contact",
        }
    }

    /// Derive the role the way Chatwoot encodes it: `sender_type` wins,
    /// then `message_type` (0 = incoming, 1 = outgoing).
    pub fn derive(sender_type: Option<&str>, message_type: Option<i64>) -> Option<Self> {
        match sender_type.map(str::to_lowercase).as_deref() {
            Some("user") => return Some(SenderRole::Agent),
            Some("contact") => return Some(SenderRole::Contact),
            _ => {}
        }
        match message_type {
            Some(1) => Some(SenderRole::Agent),
            Some(0) => Some(SenderRole::Contact),
            _ => None,
        }
    }
}

impl std::str::FromStr for SenderRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(SenderRole::Agent),
            "contact" => Ok(SenderRole::Contact),
            _ => Err(format!("unknown sender role: {}", s)),
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Option<i64>,
    pub conversation_id: Option<i64>,
    pub inbox_id: Option<i64>,
    pub message_type: Option<i64>,
    pub sender_type: Option<String>,
    pub sender_id: Option<i64>,
    pub sender_role: Option<SenderRole>,
    pub content: Option<String>,
    /// Epoch seconds
    pub created_at: Option<i64>,
}

impl Message {
    pub fn from_payload(payload: &Value) -> Self {
        let sender_type = as_str(payload.get("sender_type"));
        let message_type = as_int(payload.get("message_type"));
        Self {
            id: as_int(payload.get("id")),
            conversation_id: as_int(payload.get("conversation_id")),
            inbox_id: as_int(payload.get("inbox_id")),
            message_type,
            sender_role: SenderRole::derive(sender_type.as_deref(), message_type),
            sender_type,
            sender_id: as_int(payload.get("sender_id")),
            content: as_str(payload.get("content")),
            created_at: as_int(payload.get("created_at")),
        }
    }
}

// ============================================
// Intent coverage input
// ============================================

/// Minimal message data needed for intent coverage analysis.
///
/// Produced by a message source (usually the mirror database); read-only to
/// the coverage engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub text: Option<String>,
    pub conversation_id: Option<i64>,
    /// Epoch seconds
    pub created_at: Option<i64>,
}

impl MessageRecord {
    pub fn new(
        text: impl Into<String>,
        conversation_id: Option<i64>,
        created_at: Option<i64>,
    ) -> Self {
        Self {
            text: Some(text.into()),
            conversation_id,
            created_at,
        }
    }
}
