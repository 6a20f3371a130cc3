// Argument and result key vocabulary
//
// These strings are a stable contract with the scripting side. Do not rename.

use super::payload::Payload;
use serde::Serialize;
use serde_json::Value;

/// Keys of the `arguments` object in outbound method calls.
pub mod call {
    pub const TRANSACTION_ID: &str = "transactionId";

    pub const FILTERED_UUIDS: &str = "filteredUuids";
    pub const SCAN_MODE: &str = "scanMode";
    pub const CALLBACK_TYPE: &str = "callbackType";

    pub const IDENTIFIER: &str = "identifier";
    pub const IDENTIFIERS: &str = "identifiers";
    pub const IS_AUTO_CONNECT: &str = "isAutoConnect";
    pub const REQUEST_MTU: &str = "requestMtu";
    pub const REFRESH_GATT: &str = "refreshGatt";
    pub const TIMEOUT: &str = "timeout";
    pub const MTU: &str = "mtu";
    pub const CONNECTION_PRIORITY: &str = "connectionPriority";

    pub const SERVICE_ID: &str = "serviceId";
    pub const SERVICE_UUID: &str = "serviceUuid";
    pub const SERVICE_UUIDS: &str = "serviceUuids";
    pub const CHARACTERISTIC_ID: &str = "characteristicId";
    pub const CHARACTERISTIC_UUID: &str = "characteristicUuid";
    pub const DESCRIPTOR_ID: &str = "descriptorId";
    pub const DESCRIPTOR_UUID: &str = "descriptorUuid";

    pub const VALUE: &str = "value";
    pub const WITH_RESPONSE: &str = "withResponse";
}

/// Keys of the payloads the scripting side sends back.
pub mod native {
    // universal
    pub const ERROR: &str = "error";
    pub const ID: &str = "id";
    pub const VALUE: &str = "value";

    // error
    pub const ERROR_CODE: &str = "errorCode";
    pub const ERROR_MESSAGE: &str = "message";
    pub const ERROR_DEVICE_ID: &str = "deviceID";
    pub const ERROR_SERVICE_UUID: &str = "serviceUUID";
    pub const ERROR_CHARACTERISTIC_UUID: &str = "characteristicUUID";
    pub const ERROR_DESCRIPTOR_UUID: &str = "descriptorUUID";

    // scan result
    pub const NAME: &str = "name";
    pub const RSSI: &str = "rssi";
    pub const TX_POWER_LEVEL: &str = "txPowerLevel";
    pub const IS_CONNECTABLE: &str = "isConnectable";
    pub const OVERFLOW_SERVICE_UUIDS: &str = "overflowServiceUuids";
    pub const SERVICE_DATA: &str = "serviceData";
    pub const SERVICE_UUIDS: &str = "serviceUuids";
    pub const SOLICITED_SERVICE_UUIDS: &str = "solicitedServiceUuids";
    pub const MANUFACTURER_DATA: &str = "manufacturerData";
    pub const LOCAL_NAME: &str = "localName";

    // discovery
    pub const DEVICE_ID: &str = "peripheralId";
    pub const UUID: &str = "uuid";
    pub const CHARACTERISTICS: &str = "characteristics";
    pub const SERVICE_ID: &str = "serviceId";
    pub const SERVICE_UUID: &str = "serviceUuid";
    pub const IS_READABLE: &str = "isReadable";
    pub const IS_WRITABLE_WITHOUT_RESPONSE: &str = "isWritableWithoutResponse";
    pub const IS_WRITABLE_WITH_RESPONSE: &str = "isWritableWithResponse";
    pub const IS_NOTIFIABLE: &str = "isNotifiable";
    pub const IS_INDICATABLE: &str = "isIndicatable";
    pub const IS_NOTIFYING: &str = "isNotifying";
    pub const DESCRIPTORS: &str = "descriptors";
    pub const CHARACTERISTIC_ID: &str = "characteristicId";
    pub const CHARACTERISTIC_UUID: &str = "characteristicUuid";

    // request mtu
    pub const MTU: &str = "mtu";
}

/// Builds an outbound `arguments` object.
///
/// `None` values are skipped rather than sent as `null`, except through
/// [`ArgsBuilder::null`] where the scripting side expects an explicit null.
#[derive(Debug, Default, Clone)]
pub struct ArgsBuilder {
    args: Payload,
}

impl ArgsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<V: Serialize>(mut self, key: &str, value: V) -> Self {
        // Plain data only; a failing Serialize impl degrades to null.
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.args.insert(key.to_string(), value);
        self
    }

    pub fn opt<V: Serialize>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    pub fn build(self) -> Payload {
        self.args
    }
}
