use crate::protocol::METHOD_CALL_EVENT;
use crate::BridgeError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default upper bound on how long a one-shot request may stay pending.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Event name method calls are emitted under
    pub method_call_event: String,

    /// Timeout for awaited one-shot requests, in milliseconds
    pub request_timeout_ms: u64,

    /// Log full envelopes at debug level
    pub log_payloads: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            method_call_event: METHOD_CALL_EVENT.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            log_payloads: false,
        }
    }
}

impl BridgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.method_call_event.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "method_call_event must not be empty".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(BridgeError::InvalidConfig(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
