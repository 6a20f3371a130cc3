use super::args::native;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

macro_rules! error_codes {
    ($($variant:ident = $code:literal),+ $(,)?) => {
        /// Numeric error codes understood by the BLE adapter on the native side.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[repr(i32)]
        pub enum BleErrorCode {
            #[default]
            $($variant = $code,)+
        }

        impl BleErrorCode {
            pub const ALL: &'static [BleErrorCode] = &[$(BleErrorCode::$variant),+];

            /// Unrecognised codes collapse to `UnknownError`.
            pub fn from_code(code: i64) -> Self {
                match code {
                    $($code => BleErrorCode::$variant,)+
                    _ => BleErrorCode::UnknownError,
                }
            }
        }
    };
}

error_codes! {
    UnknownError = 0,
    BluetoothManagerDestroyed = 1,
    OperationCancelled = 2,
    OperationTimedOut = 3,
    OperationStartFailed = 4,
    InvalidIdentifiers = 5,

    BluetoothUnsupported = 100,
    BluetoothUnauthorized = 101,
    BluetoothPoweredOff = 102,
    BluetoothInUnknownState = 103,
    BluetoothResetting = 104,
    BluetoothStateChangeFailed = 105,

    DeviceConnectionFailed = 200,
    DeviceDisconnected = 201,
    DeviceRSSIReadFailed = 202,
    DeviceAlreadyConnected = 203,
    DeviceNotFound = 204,
    DeviceNotConnected = 205,
    DeviceMTUChangeFailed = 206,

    ServicesDiscoveryFailed = 300,
    IncludedServicesDiscoveryFailed = 301,
    ServiceNotFound = 302,
    ServicesNotDiscovered = 303,

    CharacteristicsDiscoveryFailed = 400,
    CharacteristicWriteFailed = 401,
    CharacteristicReadFailed = 402,
    CharacteristicNotifyChangeFailed = 403,
    CharacteristicNotFound = 404,
    CharacteristicsNotDiscovered = 405,
    CharacteristicInvalidDataFormat = 406,

    DescriptorsDiscoveryFailed = 500,
    DescriptorWriteFailed = 501,
    DescriptorReadFailed = 502,
    DescriptorNotFound = 503,
    DescriptorsNotDiscovered = 504,
    DescriptorInvalidDataFormat = 505,
    DescriptorWriteNotAllowed = 506,

    ScanStartFailed = 600,
    LocationServicesDisabled = 601,
}

impl BleErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

impl Serialize for BleErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for BleErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Ok(BleErrorCode::from_code(code))
    }
}

/// A BLE failure reported by the scripting side inside a delivery payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BleError {
    #[serde(rename = "errorCode", default)]
    pub code: BleErrorCode,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "deviceID", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(rename = "serviceUUID", default, skip_serializing_if = "Option::is_none")]
    pub service_uuid: Option<String>,
    #[serde(rename = "characteristicUUID", default, skip_serializing_if = "Option::is_none")]
    pub characteristic_uuid: Option<String>,
    #[serde(rename = "descriptorUUID", default, skip_serializing_if = "Option::is_none")]
    pub descriptor_uuid: Option<String>,
}

impl BleError {
    pub fn new(code: BleErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn for_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Decode the value found under the `error` key of a payload.
    ///
    /// Anything that is not an object becomes an `UnknownError` carrying the
    /// raw value as its message, so a sloppy error report is still an error.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(_) => serde_json::from_value(value.clone()).unwrap_or_else(|_| {
                let message = value
                    .get(native::ERROR_MESSAGE)
                    .and_then(Value::as_str)
                    .map(str::to_string);
                BleError {
                    message,
                    ..BleError::default()
                }
            }),
            Value::String(message) => BleError {
                message: Some(message.clone()),
                ..BleError::default()
            },
            other => BleError {
                message: Some(other.to_string()),
                ..BleError::default()
            },
        }
    }
}

impl fmt::Display for BleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self.code, self.code.code())?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        if let Some(device_id) = &self.device_id {
            write!(f, " [device {}]", device_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for BleError {}
