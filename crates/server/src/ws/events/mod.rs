mod server_event;

pub use server_event::{ErrorCode, ServerEvent};

use serde::Deserialize;
use serde_json::Value;

use crate::models::ConvType;

// ── Client → Server actions ──
//
// Wire shape: {"action": "<name>", "data": {...}}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum ClientAction {
    Send(SendFrame),
    Recall {
        #[serde(rename = "convId")]
        conv_id: String,
        #[serde(rename = "serverMsgId")]
        server_msg_id: String,
    },
    Read {
        #[serde(rename = "convId")]
        conv_id: String,
        seq: i64,
    },
    SubscribeGroup {
        #[serde(rename = "groupId")]
        group_id: String,
    },
    StartStream(StartStreamFrame),
    StreamChunk {
        #[serde(rename = "streamId")]
        stream_id: String,
        delta: String,
        #[serde(default)]
        metadata: Option<Value>,
    },
    EndStream {
        #[serde(rename = "streamId")]
        stream_id: String,
        #[serde(default, rename = "finalText")]
        final_text: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    Typing(TypingFrame),
    CallStart {
        to: String,
        #[serde(rename = "type")]
        kind: String,
    },
    CallAnswer {
        #[serde(rename = "callId")]
        call_id: String,
    },
    CallReject {
        #[serde(rename = "callId")]
        call_id: String,
    },
    CallEnd {
        #[serde(rename = "callId")]
        call_id: String,
    },
    WebrtcSignaling(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFrame {
    pub conv_id: String,
    pub conv_type: ConvType,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub client_msg_id: String,
    pub payload: Value,
    /// Absolute expiry, Unix milliseconds.
    #[serde(default)]
    pub expire_at_ms: Option<i64>,
    #[serde(default)]
    pub burn_after_read: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStreamFrame {
    pub conv_id: String,
    pub conv_type: ConvType,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub client_msg_id: String,
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingFrame {
    pub conv_id: String,
    pub conv_type: ConvType,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    pub typing: bool,
}
