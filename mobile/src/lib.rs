// blebridge-mobile — Native mobile bindings for iOS and Android
// This crate exports the bridge facade via UniFFI. Payloads cross the FFI
// boundary as JSON strings; callbacks stay on the Rust side keyed by call id.

use blebridge_core::{
    BridgeConfig, BridgeError, BridgeFacade, BridgeStats, JsonChannel, MethodName, Payload,
    ReturnCall, ScriptBridge,
};
use std::sync::Arc;

pub use blebridge_core;

uniffi::setup_scaffolding!();

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum MobileBridgeError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Unknown method: {0}")]
    UnknownMethod(String),
    #[error("Bridge error: {0}")]
    Bridge(String),
}

impl From<BridgeError> for MobileBridgeError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::InvalidEnvelope(msg) => MobileBridgeError::InvalidJson(msg),
            other => MobileBridgeError::Bridge(other.to_string()),
        }
    }
}

// ============================================================================
// CALLBACK INTERFACES
// ============================================================================

/// Implemented by platform code: forwards a serialized `MethodCall` to the
/// scripting runtime under `event`.
#[uniffi::export(callback_interface)]
pub trait ScriptEmitter: Send + Sync {
    fn emit(&self, event: String, method_call_json: String);
}

/// Implemented by platform code: receives the JSON payload of a delivery.
#[uniffi::export(callback_interface)]
pub trait ResultCallback: Send + Sync {
    fn on_result(&self, payload_json: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Record)]
pub struct BridgeStatsRecord {
    pub registered: u64,
    pub delivered: u64,
    pub missed: u64,
    pub cancelled: u64,
    pub pending: u64,
}

impl From<BridgeStats> for BridgeStatsRecord {
    fn from(stats: BridgeStats) -> Self {
        Self {
            registered: stats.registered,
            delivered: stats.delivered,
            missed: stats.missed,
            cancelled: stats.cancelled,
            pending: stats.pending,
        }
    }
}

// ============================================================================
// MOBILE BRIDGE
// ============================================================================

#[derive(uniffi::Object)]
pub struct MobileBridge {
    bridge: ScriptBridge,
}

#[uniffi::export]
impl MobileBridge {
    /// `config_json` is an optional `BridgeConfig` object; missing keys use defaults.
    #[uniffi::constructor]
    pub fn new(
        emitter: Box<dyn ScriptEmitter>,
        config_json: Option<String>,
    ) -> Result<Arc<Self>, MobileBridgeError> {
        let config = match config_json {
            Some(raw) => serde_json::from_str::<BridgeConfig>(&raw)
                .map_err(|e| MobileBridgeError::InvalidJson(e.to_string()))?,
            None => BridgeConfig::default(),
        };

        let channel = JsonChannel::new(move |event: &str, json: String| {
            emitter.emit(event.to_string(), json);
            Ok(())
        });
        let bridge =
            ScriptBridge::with_facade(Arc::new(BridgeFacade::new()), Arc::new(channel), config)?;

        tracing::info!("Mobile bridge created");
        Ok(Arc::new(Self { bridge }))
    }

    /// Emit `method_name` and deliver its single reply to `callback`.
    /// Returns the call id.
    pub fn call_method(
        &self,
        method_name: String,
        arguments_json: Option<String>,
        callback: Box<dyn ResultCallback>,
    ) -> Result<String, MobileBridgeError> {
        let method = parse_method(&method_name)?;
        let arguments = arguments_json.as_deref().map(parse_payload).transpose()?;
        let id = self.bridge.call_method(method, arguments, move |payload| {
            callback.on_result(payload_to_json(payload));
        })?;
        Ok(id.into_string())
    }

    /// Emit `method_name` and deliver every reply to `callback` until the
    /// call is retired.
    pub fn call_streaming(
        &self,
        method_name: String,
        arguments_json: Option<String>,
        callback: Box<dyn ResultCallback>,
    ) -> Result<String, MobileBridgeError> {
        let method = parse_method(&method_name)?;
        let arguments = arguments_json.as_deref().map(parse_payload).transpose()?;
        let id = self.bridge.call_streaming(method, arguments, move |payload| {
            callback.on_result(payload_to_json(payload));
        })?;
        Ok(id.into_string())
    }

    /// Route a full `ReturnCall` JSON envelope from the scripting runtime.
    pub fn on_message(&self, return_call_json: String) -> Result<(), MobileBridgeError> {
        self.bridge.on_message(&return_call_json)?;
        Ok(())
    }

    /// Deliver `arguments_json` to `call_id`. Unknown ids are ignored;
    /// `null` arguments arrive as an empty payload.
    pub fn handle_return_call(
        &self,
        call_id: String,
        arguments_json: String,
        is_final: bool,
    ) -> Result<(), MobileBridgeError> {
        let arguments = serde_json::from_str::<Option<Payload>>(&arguments_json)
            .map_err(|e| MobileBridgeError::InvalidJson(e.to_string()))?
            .unwrap_or_default();
        let mut envelope = ReturnCall::new(call_id, arguments);
        envelope.is_final = is_final;
        self.bridge.facade().handle_return_envelope(envelope);
        Ok(())
    }

    pub fn cancel_callback(&self, call_id: String) -> bool {
        self.bridge.facade().cancel_callback(&call_id)
    }

    pub fn cancel_transaction(&self, transaction_id: String) -> Result<bool, MobileBridgeError> {
        Ok(self.bridge.cancel_transaction(&transaction_id)?)
    }

    pub fn is_pending(&self, call_id: String) -> bool {
        self.bridge.facade().is_pending(&call_id)
    }

    pub fn pending_count(&self) -> u64 {
        self.bridge.facade().pending_count() as u64
    }

    pub fn stats(&self) -> BridgeStatsRecord {
        self.bridge.facade().stats().into()
    }

    /// Drop every pending callback without running it.
    pub fn shutdown(&self) -> u64 {
        self.bridge.transactions().clear();
        self.bridge.facade().shutdown() as u64
    }
}

fn parse_method(name: &str) -> Result<MethodName, MobileBridgeError> {
    name.parse()
        .map_err(|_| MobileBridgeError::UnknownMethod(name.to_string()))
}

fn parse_payload(raw: &str) -> Result<Payload, MobileBridgeError> {
    serde_json::from_str(raw).map_err(|e| MobileBridgeError::InvalidJson(e.to_string()))
}

fn payload_to_json(payload: Payload) -> String {
    serde_json::Value::Object(payload).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blebridge_core::MethodCall;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock())
        }
    }

    impl ScriptEmitter for Recorder {
        fn emit(&self, event: String, method_call_json: String) {
            assert_eq!(event, "MethodCall");
            self.0.lock().push(method_call_json);
        }
    }

    impl ResultCallback for Recorder {
        fn on_result(&self, payload_json: String) {
            self.0.lock().push(payload_json);
        }
    }

    fn bridge() -> (Arc<MobileBridge>, Recorder) {
        let emitted = Recorder::default();
        let bridge = MobileBridge::new(Box::new(emitted.clone()), None).unwrap();
        (bridge, emitted)
    }

    #[test]
    fn test_call_and_reply_round_trip() {
        let (bridge, emitted) = bridge();
        let results = Recorder::default();

        let id = bridge
            .call_method(
                "connect".to_string(),
                Some(r#"{"identifier":"AA"}"#.to_string()),
                Box::new(results.clone()),
            )
            .unwrap();

        let sent = emitted.take();
        let call = MethodCall::from_json(&sent[0]).unwrap();
        assert_eq!(call.method_name, MethodName::Connect);
        assert_eq!(call.callback_id.as_str(), id);

        bridge
            .on_message(format!(r#"{{"callbackId":"{}","arguments":{{"id":"AA"}}}}"#, id))
            .unwrap();
        assert_eq!(results.take(), vec![r#"{"id":"AA"}"#.to_string()]);
        assert!(!bridge.is_pending(id));
    }

    #[test]
    fn test_streaming_until_final() {
        let (bridge, _emitted) = bridge();
        let results = Recorder::default();

        let id = bridge
            .call_streaming(
                "monitorCharacteristic".to_string(),
                Some(r#"{"characteristicId":2,"transactionId":"m"}"#.to_string()),
                Box::new(results.clone()),
            )
            .unwrap();

        bridge
            .handle_return_call(id.clone(), r#"{"value":"AQ=="}"#.to_string(), false)
            .unwrap();
        bridge
            .handle_return_call(id.clone(), r#"{"value":"Ag=="}"#.to_string(), true)
            .unwrap();
        bridge
            .handle_return_call(id.clone(), r#"{"value":"Aw=="}"#.to_string(), false)
            .unwrap();

        assert_eq!(results.take().len(), 2);
        let stats = bridge.stats();
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.missed, 1);
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn test_null_arguments_deliver_empty_payload() {
        let (bridge, _emitted) = bridge();
        let results = Recorder::default();

        let id = bridge
            .call_method("destroyClient".to_string(), None, Box::new(results.clone()))
            .unwrap();
        bridge
            .handle_return_call(id.clone(), "null".to_string(), false)
            .unwrap();

        assert_eq!(results.take(), vec!["{}".to_string()]);
        assert!(!bridge.is_pending(id));

        assert!(matches!(
            bridge.handle_return_call("other".to_string(), "[1]".to_string(), false),
            Err(MobileBridgeError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_rejects_bad_input() {
        let (bridge, _emitted) = bridge();

        let err = bridge
            .call_method("teleport".to_string(), None, Box::new(Recorder::default()))
            .unwrap_err();
        assert!(matches!(err, MobileBridgeError::UnknownMethod(_)));

        let err = bridge
            .call_method(
                "connect".to_string(),
                Some("[1, 2]".to_string()),
                Box::new(Recorder::default()),
            )
            .unwrap_err();
        assert!(matches!(err, MobileBridgeError::InvalidJson(_)));

        assert!(matches!(
            bridge.on_message("{".to_string()),
            Err(MobileBridgeError::InvalidJson(_))
        ));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[test]
    fn test_config_json_and_shutdown() {
        let emitted = Recorder::default();
        let bridge = MobileBridge::new(
            Box::new(emitted),
            Some(r#"{"request_timeout_ms": 500}"#.to_string()),
        )
        .unwrap();

        let results = Recorder::default();
        let id = bridge
            .call_method("createClient".to_string(), None, Box::new(results.clone()))
            .unwrap();

        assert_eq!(bridge.shutdown(), 1);
        bridge
            .handle_return_call(id, "{}".to_string(), false)
            .unwrap();
        assert!(results.take().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = MobileBridge::new(
            Box::new(Recorder::default()),
            Some(r#"{"request_timeout_ms": 0}"#.to_string()),
        );
        assert!(matches!(result, Err(MobileBridgeError::Bridge(_))));
    }
}
