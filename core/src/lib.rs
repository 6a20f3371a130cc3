// BLE Bridge Core — call correlation between a native BLE layer and a scripting runtime
//
// Only serializable envelopes cross the boundary. Live callbacks stay on the
// native side, keyed by an opaque CallId that travels with the envelope.

pub mod bridge;
pub mod platform;
pub mod protocol;

use thiserror::Error;

pub use bridge::{BridgeFacade, BridgeStats, CallId, CallbackRegistry};
pub use platform::{
    BridgeConfig, CharacteristicTarget, ConnectionOptions, DescriptorTarget, JsonChannel, ScanOptions,
    ScriptBridge, ScriptChannel, Subscription, TransactionMonitor,
};
pub use protocol::{
    BleError, BleErrorCode, MethodCall, MethodName, Payload, Response, ReturnCall,
};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),
    #[error("Malformed payload for {method}: {reason}")]
    MalformedPayload { method: String, reason: String },
    #[error("Script channel closed")]
    ChannelClosed,
    #[error("Failed to emit method call: {0}")]
    Emit(String),
    #[error("{method} timed out after {after_ms}ms")]
    Timeout { method: String, after_ms: u64 },
    #[error("Request cancelled")]
    Cancelled,
    #[error("BLE error: {0}")]
    Ble(BleError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::InvalidEnvelope(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
