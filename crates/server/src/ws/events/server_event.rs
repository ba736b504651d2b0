use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ConvType, Deliver};

/// Wire-visible error codes. Errors are frames; the connection stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RateLimit,
    NotFriend,
    NotGroupMember,
    SendFailed,
    StreamStartFailed,
    StreamError,
    WebrtcDisabled,
    CallFailed,
}

// ── Server → Client frames ──

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Send acknowledgment on the originating connection.
    Ack(Box<Deliver>),
    /// A delivered message, relayed from the delivery bus.
    Message(Box<Deliver>),
    Error {
        code: ErrorCode,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    ReadAck {
        #[serde(rename = "convId")]
        conv_id: String,
        seq: i64,
    },
    Recalled {
        #[serde(rename = "convId")]
        conv_id: String,
        seq: i64,
    },
    Typing {
        #[serde(rename = "convId")]
        conv_id: String,
        #[serde(rename = "convType")]
        conv_type: ConvType,
        from: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        #[serde(rename = "groupId", skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
        typing: bool,
        ts: i64,
    },
    Mention {
        #[serde(rename = "groupId")]
        group_id: String,
        #[serde(rename = "convId")]
        conv_id: String,
        from: String,
        seq: i64,
    },
    StreamStarted(Box<Deliver>),
    StreamEnded {
        #[serde(rename = "streamId")]
        stream_id: String,
    },
    CallStarted(Value),
    CallAnswered(Value),
    CallRejected(Value),
    CallEnded(Value),
    CallIncoming(Value),
}

impl ServerEvent {
    pub fn error(code: ErrorCode) -> Self {
        ServerEvent::Error {
            code,
            message: None,
        }
    }

    pub fn error_with(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code,
            message: Some(message.into()),
        }
    }
}
