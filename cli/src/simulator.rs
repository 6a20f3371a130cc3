// In-process stand-in for the scripting runtime
//
// Answers emitted method calls from a JSON description of virtual
// peripherals, the way a scripted BLE simulation would. Replies go back
// through `ScriptBridge::on_message` as JSON, exercising the same path a
// real runtime uses.

use anyhow::{Context, Result};
use blebridge_core::protocol::args::{call, native};
use blebridge_core::protocol::{DevicePayload, TransferCharacteristic, TransferDescriptor, TransferService};
use blebridge_core::{BleError, BleErrorCode, MethodCall, MethodName, Payload, ReturnCall, ScriptBridge};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Weak;
use std::thread::{self, JoinHandle};

fn default_rssi() -> i32 {
    -60
}

fn default_mtu() -> u16 {
    23
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeripheralFile {
    pub peripherals: Vec<PeripheralSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeripheralSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_rssi")]
    pub rssi: i32,
    #[serde(default = "default_mtu")]
    pub mtu: u16,
    #[serde(default)]
    pub services: Vec<ServiceSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSpec {
    pub uuid: String,
    #[serde(default)]
    pub characteristics: Vec<CharacteristicSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CharacteristicSpec {
    pub uuid: String,
    /// Base64 value
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub readable: bool,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub notifiable: bool,
    /// Base64 values sent in turn while monitored
    #[serde(default)]
    pub notifications: Vec<String>,
    #[serde(default)]
    pub descriptors: Vec<DescriptorSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescriptorSpec {
    pub uuid: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl PeripheralFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Built-in fixture: one heart-rate sensor.
    pub fn demo() -> Self {
        PeripheralFile {
            peripherals: vec![PeripheralSpec {
                id: "D0:5F:B8:00:00:01".to_string(),
                name: Some("Heart Rate Sensor".to_string()),
                rssi: -48,
                mtu: 23,
                services: vec![ServiceSpec {
                    uuid: "0000180d-0000-1000-8000-00805f9b34fb".to_string(),
                    characteristics: vec![
                        CharacteristicSpec {
                            uuid: "00002a37-0000-1000-8000-00805f9b34fb".to_string(),
                            value: Some("AEg=".to_string()),
                            readable: false,
                            writable: false,
                            notifiable: true,
                            notifications: vec!["AEg=".to_string(), "AEk=".to_string(), "AEo=".to_string()],
                            descriptors: vec![DescriptorSpec {
                                uuid: "00002902-0000-1000-8000-00805f9b34fb".to_string(),
                                value: Some("AAA=".to_string()),
                            }],
                        },
                        CharacteristicSpec {
                            uuid: "00002a38-0000-1000-8000-00805f9b34fb".to_string(),
                            value: Some("AQ==".to_string()),
                            readable: true,
                            writable: false,
                            notifiable: false,
                            notifications: Vec::new(),
                            descriptors: Vec::new(),
                        },
                        CharacteristicSpec {
                            uuid: "00002a39-0000-1000-8000-00805f9b34fb".to_string(),
                            value: None,
                            readable: false,
                            writable: true,
                            notifiable: false,
                            notifications: Vec::new(),
                            descriptors: Vec::new(),
                        },
                    ],
                }],
            }],
        }
    }
}

/// The simulated scripting side. Ids are assigned in declaration order.
pub struct Simulator {
    peripherals: Vec<PeripheralSpec>,
    services: BTreeMap<i64, TransferService>,
    characteristics: BTreeMap<i64, TransferCharacteristic>,
    descriptors: BTreeMap<i64, TransferDescriptor>,
    notifications: HashMap<i64, Vec<String>>,
    connected: HashSet<String>,
    mtus: HashMap<String, u16>,
    notifications_per_monitor: usize,
}

impl Simulator {
    pub fn new(file: PeripheralFile, notifications_per_monitor: usize) -> Self {
        let mut next_id = 0i64;
        let mut next = || {
            next_id += 1;
            next_id
        };

        let mut services = BTreeMap::new();
        let mut characteristics = BTreeMap::new();
        let mut descriptors = BTreeMap::new();
        let mut notifications = HashMap::new();

        for peripheral in &file.peripherals {
            for service in &peripheral.services {
                let service_id = next();
                services.insert(
                    service_id,
                    TransferService {
                        peripheral_id: peripheral.id.clone(),
                        id: service_id,
                        uuid: service.uuid.clone(),
                        characteristics: Vec::new(),
                    },
                );

                for spec in &service.characteristics {
                    let characteristic_id = next();
                    characteristics.insert(
                        characteristic_id,
                        TransferCharacteristic {
                            peripheral_id: peripheral.id.clone(),
                            id: characteristic_id,
                            uuid: spec.uuid.clone(),
                            service_id,
                            service_uuid: service.uuid.clone(),
                            is_readable: spec.readable,
                            is_writable_with_response: spec.writable,
                            is_writable_without_response: spec.writable,
                            is_notifiable: spec.notifiable,
                            is_indicatable: false,
                            is_notifying: false,
                            value: spec.value.clone(),
                            descriptors: None,
                        },
                    );
                    notifications.insert(characteristic_id, spec.notifications.clone());

                    for descriptor in &spec.descriptors {
                        let descriptor_id = next();
                        descriptors.insert(
                            descriptor_id,
                            TransferDescriptor {
                                peripheral_id: peripheral.id.clone(),
                                id: descriptor_id,
                                uuid: descriptor.uuid.clone(),
                                characteristic_id,
                                characteristic_uuid: spec.uuid.clone(),
                                service_id,
                                service_uuid: service.uuid.clone(),
                                value: descriptor.value.clone(),
                            },
                        );
                    }
                }
            }
        }

        Self {
            peripherals: file.peripherals,
            services,
            characteristics,
            descriptors,
            notifications,
            connected: HashSet::new(),
            mtus: HashMap::new(),
            notifications_per_monitor,
        }
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.connected.contains(id)
    }

    /// Produce the replies for one emitted call.
    pub fn handle(&mut self, method_call: &MethodCall) -> Vec<ReturnCall> {
        let args = method_call.arguments.clone().unwrap_or_default();
        let id = method_call.callback_id.clone();
        let method = method_call.method_name;

        if method == MethodName::CancelTransaction {
            return Vec::new();
        }
        if method == MethodName::StartScan {
            return self
                .scan_results(&args)
                .into_iter()
                .map(|result| ReturnCall::new(id.clone(), result))
                .collect();
        }
        if method.is_streaming() {
            return match self.monitor(method, &args) {
                Ok(updates) => {
                    let last = updates.len().saturating_sub(1);
                    updates
                        .into_iter()
                        .enumerate()
                        .map(|(n, payload)| {
                            let reply = ReturnCall::new(id.clone(), payload);
                            if n == last {
                                reply.finished()
                            } else {
                                reply
                            }
                        })
                        .collect()
                }
                Err(err) => vec![ReturnCall::new(id, failure(err))],
            };
        }

        let payload = match self.answer(method, &args) {
            Ok(value) => success(value),
            Err(err) => failure(err),
        };
        vec![ReturnCall::new(id, payload)]
    }

    fn answer(&mut self, method: MethodName, args: &Payload) -> Result<Value, BleError> {
        match method {
            MethodName::CreateClient
            | MethodName::Enable
            | MethodName::Disable
            | MethodName::StopScan => Ok(json!({})),

            MethodName::DestroyClient => {
                self.connected.clear();
                self.mtus.clear();
                Ok(json!({}))
            }

            MethodName::Connect => {
                let identifier = required_str(args, call::IDENTIFIER)?;
                self.peripheral(identifier)?;
                if self.connected.contains(identifier) {
                    return Err(BleError::new(
                        BleErrorCode::DeviceAlreadyConnected,
                        "Device already connected",
                    )
                    .for_device(identifier));
                }
                if let Some(mtu) = args.get(call::REQUEST_MTU).and_then(Value::as_u64) {
                    self.mtus.insert(identifier.to_string(), mtu as u16);
                }
                self.connected.insert(identifier.to_string());
                tracing::debug!("Simulator connected {}", identifier);
                self.device(identifier)
            }

            MethodName::CancelConnectionOrDisconnect => {
                let identifier = required_str(args, call::IDENTIFIER)?;
                self.ensure_connected(identifier)?;
                let device = self.device(identifier)?;
                self.connected.remove(identifier);
                self.mtus.remove(identifier);
                Ok(device)
            }

            MethodName::IsDeviceConnected => {
                let identifier = required_str(args, call::IDENTIFIER)?;
                Ok(json!({ "value": self.connected.contains(identifier) }))
            }

            MethodName::ReadRssi | MethodName::RequestConnectionPriority => {
                let identifier = required_str(args, call::IDENTIFIER)?;
                self.ensure_connected(identifier)?;
                self.device(identifier)
            }

            MethodName::RequestMtu => {
                let identifier = required_str(args, call::IDENTIFIER)?;
                self.ensure_connected(identifier)?;
                let mtu = args
                    .get(call::MTU)
                    .and_then(Value::as_u64)
                    .ok_or_else(|| missing(call::MTU))?;
                self.mtus.insert(identifier.to_string(), mtu as u16);
                self.device(identifier)
            }

            MethodName::GetKnownDevices => {
                let wanted = string_list(args, call::IDENTIFIERS);
                let devices = self
                    .peripherals
                    .iter()
                    .filter(|p| wanted.contains(&p.id))
                    .map(|p| self.device(&p.id))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(json!({ "value": devices }))
            }

            MethodName::GetConnectedDevices => {
                let uuids = string_list(args, call::SERVICE_UUIDS);
                let devices = self
                    .peripherals
                    .iter()
                    .filter(|p| self.connected.contains(&p.id))
                    .filter(|p| uuids.is_empty() || p.services.iter().any(|s| uuids.contains(&s.uuid)))
                    .map(|p| self.device(&p.id))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(json!({ "value": devices }))
            }

            MethodName::Discovery => {
                let identifier = required_str(args, call::IDENTIFIER)?;
                self.ensure_connected(identifier)?;
                let services: Vec<TransferService> = self
                    .services
                    .values()
                    .filter(|s| s.peripheral_id == identifier)
                    .map(|service| {
                        let mut service = service.clone();
                        service.characteristics = self
                            .characteristics
                            .values()
                            .filter(|c| c.service_id == service.id)
                            .cloned()
                            .collect();
                        service
                    })
                    .collect();
                Ok(json!({ "value": services }))
            }

            m if m.is_characteristic_op() => {
                let characteristic_id = self.find_characteristic(m, args)?;
                let writing = matches!(
                    m,
                    MethodName::WriteCharacteristic
                        | MethodName::WriteCharacteristicForService
                        | MethodName::WriteCharacteristicForDevice
                );
                let characteristic = self
                    .characteristics
                    .get_mut(&characteristic_id)
                    .ok_or_else(|| not_found(BleErrorCode::CharacteristicNotFound))?;
                if !self.connected.contains(&characteristic.peripheral_id) {
                    return Err(not_connected(&characteristic.peripheral_id));
                }

                if writing {
                    if !characteristic.is_writable_with_response {
                        return Err(BleError::new(
                            BleErrorCode::CharacteristicWriteFailed,
                            "Characteristic is not writable",
                        ));
                    }
                    characteristic.value = args
                        .get(call::VALUE)
                        .and_then(Value::as_str)
                        .map(str::to_string);
                } else if !characteristic.is_readable {
                    return Err(BleError::new(
                        BleErrorCode::CharacteristicReadFailed,
                        "Characteristic is not readable",
                    ));
                }
                to_value(&*characteristic)
            }

            m if m.is_descriptor_op() => {
                let descriptor_id = self.find_descriptor(m, args)?;
                let writing = matches!(
                    m,
                    MethodName::WriteDescriptor
                        | MethodName::WriteDescriptorForCharacteristic
                        | MethodName::WriteDescriptorForService
                        | MethodName::WriteDescriptorForDevice
                );
                let descriptor = self
                    .descriptors
                    .get_mut(&descriptor_id)
                    .ok_or_else(|| not_found(BleErrorCode::DescriptorNotFound))?;
                if !self.connected.contains(&descriptor.peripheral_id) {
                    return Err(not_connected(&descriptor.peripheral_id));
                }
                if writing {
                    descriptor.value = args
                        .get(call::VALUE)
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
                to_value(&*descriptor)
            }

            _ => Ok(json!({})),
        }
    }

    fn scan_results(&self, args: &Payload) -> Vec<Payload> {
        let filter = string_list(args, call::FILTERED_UUIDS);
        self.peripherals
            .iter()
            .filter(|p| filter.is_empty() || p.services.iter().any(|s| filter.contains(&s.uuid)))
            .map(|p| {
                let uuids: Vec<&str> = p.services.iter().map(|s| s.uuid.as_str()).collect();
                success(json!({
                    "id": p.id,
                    "name": p.name,
                    "localName": p.name,
                    "rssi": p.rssi,
                    "serviceUuids": uuids,
                    "isConnectable": true
                }))
            })
            .collect()
    }

    /// Notifications for a monitor call; the last one is sent as final.
    fn monitor(&self, method: MethodName, args: &Payload) -> Result<Vec<Payload>, BleError> {
        let characteristic_id = self.find_characteristic(method, args)?;
        let characteristic = self
            .characteristics
            .get(&characteristic_id)
            .ok_or_else(|| not_found(BleErrorCode::CharacteristicNotFound))?;
        if !self.connected.contains(&characteristic.peripheral_id) {
            return Err(not_connected(&characteristic.peripheral_id));
        }
        if !characteristic.is_notifiable {
            return Err(BleError::new(
                BleErrorCode::CharacteristicNotifyChangeFailed,
                "Characteristic does not support notifications",
            ));
        }

        let values = self
            .notifications
            .get(&characteristic_id)
            .filter(|values| !values.is_empty())
            .cloned()
            .unwrap_or_else(|| characteristic.value.clone().into_iter().collect());

        let mut updates = Vec::new();
        for n in 0..self.notifications_per_monitor {
            let mut update = characteristic.clone();
            update.is_notifying = true;
            if !values.is_empty() {
                update.value = Some(values[n % values.len()].clone());
            }
            if let Some(last) = &update.value {
                tracing::trace!("Simulator notify {} = {}", characteristic_id, last);
            }
            updates.push(success(to_value(&update)?));
        }
        Ok(updates)
    }

    fn peripheral(&self, identifier: &str) -> Result<&PeripheralSpec, BleError> {
        self.peripherals
            .iter()
            .find(|p| p.id == identifier)
            .ok_or_else(|| {
                BleError::new(BleErrorCode::DeviceNotFound, "Device not found").for_device(identifier)
            })
    }

    fn device(&self, identifier: &str) -> Result<Value, BleError> {
        let peripheral = self.peripheral(identifier)?;
        let mut device = DevicePayload::new(peripheral.id.clone());
        device.name = peripheral.name.clone();
        device.rssi = Some(peripheral.rssi);
        device.mtu = Some(
            self.mtus
                .get(identifier)
                .copied()
                .unwrap_or(peripheral.mtu),
        );
        to_value(&device)
    }

    fn ensure_connected(&self, identifier: &str) -> Result<(), BleError> {
        self.peripheral(identifier)?;
        if self.connected.contains(identifier) {
            Ok(())
        } else {
            Err(not_connected(identifier))
        }
    }

    fn find_service_by_uuid(&self, identifier: &str, service_uuid: &str) -> Result<i64, BleError> {
        self.services
            .values()
            .find(|s| s.peripheral_id == identifier && s.uuid == service_uuid)
            .map(|s| s.id)
            .ok_or_else(|| not_found(BleErrorCode::ServiceNotFound))
    }

    fn find_characteristic(&self, method: MethodName, args: &Payload) -> Result<i64, BleError> {
        let (service_id, characteristic_uuid) = match method {
            MethodName::ReadCharacteristic
            | MethodName::WriteCharacteristic
            | MethodName::MonitorCharacteristic => {
                return required_i64(args, call::CHARACTERISTIC_ID);
            }
            MethodName::ReadCharacteristicForService
            | MethodName::WriteCharacteristicForService
            | MethodName::MonitorCharacteristicForService => (
                required_i64(args, call::SERVICE_ID)?,
                required_str(args, call::CHARACTERISTIC_UUID)?,
            ),
            _ => {
                let identifier = required_str(args, call::IDENTIFIER)?;
                let service_uuid = required_str(args, call::SERVICE_UUID)?;
                (
                    self.find_service_by_uuid(identifier, service_uuid)?,
                    required_str(args, call::CHARACTERISTIC_UUID)?,
                )
            }
        };
        self.characteristics
            .values()
            .find(|c| c.service_id == service_id && c.uuid == characteristic_uuid)
            .map(|c| c.id)
            .ok_or_else(|| not_found(BleErrorCode::CharacteristicNotFound))
    }

    fn find_descriptor(&self, method: MethodName, args: &Payload) -> Result<i64, BleError> {
        let characteristic_id = match method {
            MethodName::ReadDescriptor | MethodName::WriteDescriptor => {
                return required_i64(args, call::DESCRIPTOR_ID);
            }
            MethodName::ReadDescriptorForCharacteristic
            | MethodName::WriteDescriptorForCharacteristic => {
                required_i64(args, call::CHARACTERISTIC_ID)?
            }
            MethodName::ReadDescriptorForService | MethodName::WriteDescriptorForService => {
                self.find_characteristic(MethodName::ReadCharacteristicForService, args)?
            }
            _ => self.find_characteristic(MethodName::ReadCharacteristicForDevice, args)?,
        };
        let descriptor_uuid = required_str(args, call::DESCRIPTOR_UUID)?;
        self.descriptors
            .values()
            .find(|d| d.characteristic_id == characteristic_id && d.uuid == descriptor_uuid)
            .map(|d| d.id)
            .ok_or_else(|| not_found(BleErrorCode::DescriptorNotFound))
    }
}

/// Run `simulator` on its own thread, answering calls until the bridge is gone.
pub fn spawn(
    simulator: Simulator,
    calls: Receiver<MethodCall>,
    bridge: Weak<ScriptBridge>,
) -> JoinHandle<()> {
    let mut simulator = simulator;
    thread::spawn(move || {
        for method_call in calls {
            let replies = simulator.handle(&method_call);
            let Some(bridge) = bridge.upgrade() else {
                break;
            };
            for reply in replies {
                let delivered = reply.to_json().and_then(|json| bridge.on_message(&json));
                if let Err(e) = delivered {
                    tracing::warn!("Simulator reply for {} dropped: {}", method_call.method_name, e);
                }
            }
        }
        tracing::debug!("Simulator stopped");
    })
}

fn success(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => {
            let mut payload = Payload::new();
            payload.insert(call::VALUE.to_string(), other);
            payload
        }
    }
}

fn failure(err: BleError) -> Payload {
    let mut payload = Payload::new();
    payload.insert(
        native::ERROR.to_string(),
        serde_json::to_value(&err).unwrap_or(Value::Null),
    );
    payload
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, BleError> {
    serde_json::to_value(value)
        .map_err(|e| BleError::new(BleErrorCode::UnknownError, e.to_string()))
}

fn required_str<'a>(args: &'a Payload, key: &str) -> Result<&'a str, BleError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(key))
}

fn required_i64(args: &Payload, key: &str) -> Result<i64, BleError> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| missing(key))
}

fn string_list(args: &Payload, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

fn missing(key: &str) -> BleError {
    BleError::new(BleErrorCode::InvalidIdentifiers, format!("Missing argument {}", key))
}

fn not_found(code: BleErrorCode) -> BleError {
    BleError::new(code, format!("{:?}", code))
}

fn not_connected(identifier: &str) -> BleError {
    BleError::new(BleErrorCode::DeviceNotConnected, "Device is not connected").for_device(identifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blebridge_core::{BridgeConfig, CallId, CharacteristicTarget, Response};
    use std::sync::Arc;

    fn call(method: MethodName, args: Value) -> MethodCall {
        MethodCall::new(method, CallId::from("cb-1"), args.as_object().cloned())
    }

    fn error_code(reply: &ReturnCall) -> Option<i64> {
        reply
            .arguments
            .as_ref()?
            .get(native::ERROR)?
            .get(native::ERROR_CODE)?
            .as_i64()
    }

    fn connected_demo(notifications: usize) -> Simulator {
        let mut sim = Simulator::new(PeripheralFile::demo(), notifications);
        let replies = sim.handle(&call(
            MethodName::Connect,
            json!({"identifier": "D0:5F:B8:00:00:01"}),
        ));
        assert_eq!(error_code(&replies[0]), None);
        sim
    }

    #[test]
    fn test_connect_unknown_device() {
        let mut sim = Simulator::new(PeripheralFile::demo(), 0);
        let replies = sim.handle(&call(MethodName::Connect, json!({"identifier": "nope"})));
        assert_eq!(error_code(&replies[0]), Some(204));
    }

    #[test]
    fn test_read_requires_connection_and_permission() {
        let mut sim = Simulator::new(PeripheralFile::demo(), 0);
        // Ids: service 1, characteristics 2 (notify), 4 (read), 5 (write); descriptor 3.
        let replies = sim.handle(&call(MethodName::ReadCharacteristic, json!({"characteristicId": 4})));
        assert_eq!(error_code(&replies[0]), Some(205));

        let mut sim = connected_demo(0);
        let replies = sim.handle(&call(MethodName::ReadCharacteristic, json!({"characteristicId": 4})));
        let value = replies[0].arguments.as_ref().unwrap().get("value").cloned();
        assert_eq!(value, Some(json!("AQ==")));

        let replies = sim.handle(&call(MethodName::ReadCharacteristic, json!({"characteristicId": 2})));
        assert_eq!(error_code(&replies[0]), Some(402));
    }

    #[test]
    fn test_cancel_transaction_is_not_answered() {
        let mut sim = connected_demo(0);
        let replies = sim.handle(&call(MethodName::CancelTransaction, json!({"transactionId": "m"})));
        assert!(replies.is_empty());
    }

    #[test]
    fn test_monitor_marks_last_final() {
        let mut sim = connected_demo(4);
        let replies = sim.handle(&call(
            MethodName::MonitorCharacteristic,
            json!({"characteristicId": 2, "transactionId": "m"}),
        ));
        assert_eq!(replies.len(), 4);
        assert!(replies[..3].iter().all(|r| !r.is_final));
        assert!(replies[3].is_final);
        // Values cycle through the configured notifications.
        let value = replies[3].arguments.as_ref().unwrap().get("value").cloned();
        assert_eq!(value, Some(json!("AEg=")));
    }

    #[test]
    fn test_descriptor_by_device_path() {
        let mut sim = connected_demo(0);
        let replies = sim.handle(&call(
            MethodName::WriteDescriptorForDevice,
            json!({
                "identifier": "D0:5F:B8:00:00:01",
                "serviceUuid": "0000180d-0000-1000-8000-00805f9b34fb",
                "characteristicUuid": "00002a37-0000-1000-8000-00805f9b34fb",
                "descriptorUuid": "00002902-0000-1000-8000-00805f9b34fb",
                "value": "AQA="
            }),
        ));
        let args = replies[0].arguments.as_ref().unwrap();
        assert_eq!(args.get("id"), Some(&json!(3)));
        assert_eq!(args.get("value"), Some(&json!("AQA=")));
    }

    #[test]
    fn test_scan_filter() {
        let mut sim = Simulator::new(PeripheralFile::demo(), 0);
        let replies = sim.handle(&call(MethodName::StartScan, json!({"filteredUuids": ["ffff"]})));
        assert!(replies.is_empty());

        let replies = sim.handle(&call(MethodName::StartScan, json!({})));
        assert_eq!(replies.len(), 1);
        assert!(!replies[0].is_final);
    }

    #[tokio::test]
    async fn test_bridge_against_simulator() {
        let (tx, rx) = std::sync::mpsc::channel::<MethodCall>();
        let bridge = Arc::new(ScriptBridge::new(Arc::new(tx), BridgeConfig::default()).unwrap());
        let handle = spawn(Simulator::new(PeripheralFile::demo(), 2), rx, Arc::downgrade(&bridge));

        bridge.create_client().await.unwrap();
        bridge
            .connect("D0:5F:B8:00:00:01", Default::default())
            .await
            .unwrap();
        assert!(bridge.is_device_connected("D0:5F:B8:00:00:01").await.unwrap());

        let mut monitor = bridge
            .monitor_characteristic(&CharacteristicTarget::Id(2), "hr")
            .unwrap();
        let mut seen = 0;
        while let Some(item) = monitor.next_response().await {
            assert!(matches!(item.unwrap(), Response::Characteristic(_)));
            seen += 1;
        }
        assert_eq!(seen, 2);

        bridge.destroy_client().await.unwrap();
        drop(monitor);
        drop(bridge);
        handle.join().unwrap();
    }
}
