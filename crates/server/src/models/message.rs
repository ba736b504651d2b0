use serde::{Deserialize, Serialize};
use sqlx::types::Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ConvType {
    C2c,
    Group,
}

impl ConvType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConvType::C2c => "c2c",
            ConvType::Group => "group",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum StreamStatus {
    Start,
    Chunk,
    End,
    Error,
}

/// A persisted message row. Immutable after insert except for the
/// `recalled` flag, which only ever goes false -> true.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub server_msg_id: String,
    pub client_msg_id: String,
    pub conv_id: String,
    pub conv_type: ConvType,
    pub from_user_id: String,
    pub to_user_id: Option<String>,
    pub group_id: Option<String>,
    pub seq: i64,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub msg_type: String,
    pub payload: Json<serde_json::Value>,
    pub recalled: bool,
    /// Unix milliseconds; None means the message never expires.
    pub expire_at: Option<i64>,
    pub burn_after_read: bool,
    pub stream_id: Option<String>,
    pub stream_seq: Option<i64>,
    pub stream_status: Option<StreamStatus>,
    pub is_streaming: bool,
}

/// The envelope published to delivery topics and echoed in acks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deliver {
    pub server_msg_id: String,
    pub client_msg_id: String,
    pub conv_id: String,
    pub conv_type: ConvType,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub seq: i64,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_seq: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_status: Option<StreamStatus>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<i64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub burn_after_read: bool,
}

impl From<Message> for Deliver {
    fn from(m: Message) -> Self {
        Deliver {
            server_msg_id: m.server_msg_id,
            client_msg_id: m.client_msg_id,
            conv_id: m.conv_id,
            conv_type: m.conv_type,
            from: m.from_user_id,
            to: m.to_user_id,
            group_id: m.group_id,
            seq: m.seq,
            timestamp: m.timestamp,
            msg_type: m.msg_type,
            payload: m.payload.0,
            stream_id: m.stream_id,
            stream_seq: m.stream_seq,
            stream_status: m.stream_status,
            is_streaming: m.is_streaming,
            expire_at: m.expire_at,
            burn_after_read: m.burn_after_read,
        }
    }
}
