// Typed payload shapes
//
// Payloads travel as JSON objects. Each method has one expected success
// shape; `Response::parse` checks the payload against it at the boundary so
// callers work with typed values. Fields nobody models (vendor extras) are
// kept in a flattened `extras` map.

use super::args::native;
use super::error::BleError;
use super::method::MethodName;
use crate::BridgeError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The keyed mapping carried by every envelope.
pub type Payload = serde_json::Map<String, Value>;

/// Base64-encoded attribute value, passed through untouched.
pub type Base64 = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResultPayload {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub rssi: i32,
    #[serde(default)]
    pub tx_power_level: Option<i32>,
    #[serde(default)]
    pub is_connectable: Option<bool>,
    #[serde(default)]
    pub overflow_service_uuids: Option<Vec<String>>,
    #[serde(default)]
    pub manufacturer_data: Option<Base64>,
    #[serde(default)]
    pub service_data: Option<HashMap<String, Base64>>,
    #[serde(default)]
    pub service_uuids: Option<Vec<String>>,
    #[serde(default)]
    pub solicited_service_uuids: Option<Vec<String>>,
    #[serde(default)]
    pub local_name: Option<String>,
    #[serde(flatten)]
    pub extras: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePayload {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rssi: Option<i32>,
    #[serde(default)]
    pub mtu: Option<u16>,
    #[serde(flatten)]
    pub extras: Payload,
}

impl DevicePayload {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            rssi: None,
            mtu: None,
            extras: Payload::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferService {
    pub peripheral_id: String,
    pub id: i64,
    pub uuid: String,
    #[serde(default)]
    pub characteristics: Vec<TransferCharacteristic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCharacteristic {
    pub peripheral_id: String,
    pub id: i64,
    pub uuid: String,
    pub service_id: i64,
    pub service_uuid: String,
    #[serde(default)]
    pub is_readable: bool,
    #[serde(default)]
    pub is_writable_with_response: bool,
    #[serde(default)]
    pub is_writable_without_response: bool,
    #[serde(default)]
    pub is_notifiable: bool,
    #[serde(default)]
    pub is_indicatable: bool,
    #[serde(default)]
    pub is_notifying: bool,
    #[serde(default)]
    pub value: Option<Base64>,
    #[serde(default)]
    pub descriptors: Option<Vec<TransferDescriptor>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDescriptor {
    pub peripheral_id: String,
    pub id: i64,
    pub uuid: String,
    pub characteristic_id: i64,
    pub characteristic_uuid: String,
    pub service_id: i64,
    pub service_uuid: String,
    #[serde(default)]
    pub value: Option<Base64>,
}

/// A delivery decoded against the shape its method promises.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Success with nothing to report.
    Ack,
    /// The payload carried a non-null `error`.
    Failed(BleError),
    ScanResult(ScanResultPayload),
    Device(DevicePayload),
    Devices(Vec<DevicePayload>),
    Connected(bool),
    Services(Vec<TransferService>),
    Characteristic(TransferCharacteristic),
    Descriptor(TransferDescriptor),
}

impl Response {
    /// Decode `payload` as the answer to `method`.
    ///
    /// An `error` entry always wins over the success shape. An empty payload
    /// is an acknowledgement for every method.
    pub fn parse(method: MethodName, payload: Payload) -> Result<Response, BridgeError> {
        if let Some(error) = payload.get(native::ERROR).filter(|e| !e.is_null()) {
            return Ok(Response::Failed(BleError::from_value(error)));
        }
        if payload.values().all(Value::is_null) {
            return Ok(Response::Ack);
        }

        match method {
            MethodName::CreateClient
            | MethodName::DestroyClient
            | MethodName::Enable
            | MethodName::Disable
            | MethodName::StopScan
            | MethodName::CancelTransaction => Ok(Response::Ack),

            MethodName::StartScan => decode(method, payload).map(Response::ScanResult),

            MethodName::Connect
            | MethodName::CancelConnectionOrDisconnect
            | MethodName::ReadRssi
            | MethodName::RequestConnectionPriority
            | MethodName::RequestMtu => decode(method, payload).map(Response::Device),

            MethodName::IsDeviceConnected => {
                decode_value::<bool>(method, payload).map(Response::Connected)
            }

            MethodName::GetKnownDevices | MethodName::GetConnectedDevices => {
                decode_value(method, payload).map(Response::Devices)
            }

            MethodName::Discovery => decode_value(method, payload).map(Response::Services),

            m if m.is_characteristic_op() => {
                decode(method, payload).map(Response::Characteristic)
            }
            m if m.is_descriptor_op() => decode(method, payload).map(Response::Descriptor),

            _ => Ok(Response::Ack),
        }
    }

    /// Turn a `Failed` response into an `Err`.
    pub fn into_result(self) -> Result<Response, BleError> {
        match self {
            Response::Failed(error) => Err(error),
            other => Ok(other),
        }
    }
}

fn decode<T: DeserializeOwned>(method: MethodName, payload: Payload) -> Result<T, BridgeError> {
    serde_json::from_value(Value::Object(payload)).map_err(|e| malformed(method, e))
}

/// Decode the list or scalar stored under the `value` key.
fn decode_value<T: DeserializeOwned>(
    method: MethodName,
    mut payload: Payload,
) -> Result<T, BridgeError> {
    let value = payload.remove(native::VALUE).ok_or_else(|| BridgeError::MalformedPayload {
        method: method.to_string(),
        reason: format!("missing `{}`", native::VALUE),
    })?;
    serde_json::from_value(value).map_err(|e| malformed(method, e))
}

fn malformed(method: MethodName, err: serde_json::Error) -> BridgeError {
    BridgeError::MalformedPayload {
        method: method.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::BleErrorCode;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_error_wins() {
        let response = Response::parse(
            MethodName::Connect,
            payload(json!({"error": {"errorCode": 203, "message": "already connected"}, "id": "AA"})),
        )
        .unwrap();
        match response {
            Response::Failed(err) => assert_eq!(err.code, BleErrorCode::DeviceAlreadyConnected),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_null_error_is_ack() {
        let response = Response::parse(MethodName::StartScan, payload(json!({"error": null})));
        assert_eq!(response.unwrap(), Response::Ack);
    }

    #[test]
    fn test_scan_result_keeps_extras() {
        let response = Response::parse(
            MethodName::StartScan,
            payload(json!({
                "id": "AA:BB",
                "name": "Heart Rate",
                "rssi": -54,
                "serviceUuids": ["180d"],
                "vendorFlag": true
            })),
        )
        .unwrap();
        match response {
            Response::ScanResult(scan) => {
                assert_eq!(scan.rssi, -54);
                assert_eq!(scan.service_uuids, Some(vec!["180d".to_string()]));
                assert_eq!(scan.extras.get("vendorFlag"), Some(&json!(true)));
            }
            other => panic!("expected scan result, got {:?}", other),
        }
    }

    #[test]
    fn test_discovery_services() {
        let response = Response::parse(
            MethodName::Discovery,
            payload(json!({"value": [{
                "peripheralId": "AA",
                "id": 1,
                "uuid": "180d",
                "characteristics": [{
                    "peripheralId": "AA",
                    "id": 2,
                    "uuid": "2a37",
                    "serviceId": 1,
                    "serviceUuid": "180d",
                    "isNotifiable": true,
                    "value": null,
                    "descriptors": null
                }]
            }]})),
        )
        .unwrap();
        match response {
            Response::Services(services) => {
                assert_eq!(services.len(), 1);
                assert!(services[0].characteristics[0].is_notifiable);
                assert!(!services[0].characteristics[0].is_readable);
            }
            other => panic!("expected services, got {:?}", other),
        }
    }

    #[test]
    fn test_is_connected_scalar() {
        let response =
            Response::parse(MethodName::IsDeviceConnected, payload(json!({"value": true})));
        assert_eq!(response.unwrap(), Response::Connected(true));
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let err = Response::parse(MethodName::ReadCharacteristic, payload(json!({"id": "x"})))
            .unwrap_err();
        match err {
            BridgeError::MalformedPayload { method, .. } => {
                assert_eq!(method, "readCharacteristic")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_value_key() {
        let err =
            Response::parse(MethodName::GetKnownDevices, payload(json!({"id": "x"}))).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedPayload { .. }));
    }
}
