use async_trait::async_trait;
use serde_json::Value;

use crate::bus::DeliveryBus;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CallError(pub String);

/// Call control lives outside the core. An implementation is injected at
/// startup; it owns call state and publishes its own peer notifications
/// (call_incoming and friends) on the delivery bus. When no implementation
/// is present the gateway answers `WEBRTC_DISABLED`.
#[async_trait]
pub trait CallService: Send + Sync {
    /// Returns the call object echoed to the caller as `call_started`.
    async fn start_call(
        &self,
        bus: &DeliveryBus,
        from: &str,
        to: &str,
        kind: &str,
    ) -> Result<Value, CallError>;

    async fn answer_call(
        &self,
        bus: &DeliveryBus,
        call_id: &str,
        user_id: &str,
    ) -> Result<Value, CallError>;

    async fn reject_call(
        &self,
        bus: &DeliveryBus,
        call_id: &str,
        user_id: &str,
    ) -> Result<Value, CallError>;

    async fn end_call(
        &self,
        bus: &DeliveryBus,
        call_id: &str,
        user_id: &str,
    ) -> Result<Value, CallError>;

    /// Fire-and-forget relay of an SDP/candidate payload.
    async fn forward_signaling(&self, bus: &DeliveryBus, from: &str, payload: Value);
}
