use super::method::MethodName;
use super::payload::Payload;
use crate::bridge::CallId;
use serde::{Deserialize, Serialize};

/// Default event name under which method calls are emitted to the scripting side.
pub const METHOD_CALL_EVENT: &str = "MethodCall";

/// Native -> script: "run this method, answer under this callback id".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCall {
    pub method_name: MethodName,
    pub callback_id: CallId,
    pub arguments: Option<Payload>,
}

impl MethodCall {
    pub fn new(method_name: MethodName, callback_id: CallId, arguments: Option<Payload>) -> Self {
        Self {
            method_name,
            callback_id,
            arguments,
        }
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Script -> native: the answer for a previously emitted call.
///
/// `final` is only meaningful for streaming calls: it retires the
/// subscription after this delivery. One-shot calls retire on any delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnCall {
    pub callback_id: CallId,
    #[serde(default)]
    pub arguments: Option<Payload>,
    #[serde(rename = "final", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_final: bool,
}

impl ReturnCall {
    pub fn new(callback_id: impl Into<CallId>, arguments: Payload) -> Self {
        Self {
            callback_id: callback_id.into(),
            arguments: Some(arguments),
            is_final: false,
        }
    }

    /// Mark this delivery as the last one for its callback.
    pub fn finished(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
