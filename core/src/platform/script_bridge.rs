//! Native-side BLE client that runs every operation through the scripting runtime
//!
//! Each operation registers a callback with the [`BridgeFacade`], emits a
//! [`MethodCall`] carrying the new [`CallId`], and turns the eventual reply
//! into a typed value. One-shot operations are awaited with a timeout;
//! streaming operations (scan, monitor) hand back a [`Subscription`].

use super::channel::ScriptChannel;
use super::config::BridgeConfig;
use super::subscription::Subscription;
use super::targets::{CharacteristicOp, CharacteristicTarget, DescriptorTarget};
use super::transactions::TransactionMonitor;
use crate::bridge::{BridgeFacade, CallId};
use crate::protocol::args::call;
use crate::protocol::{
    ArgsBuilder, BleError, BleErrorCode, DevicePayload, MethodCall, MethodName, Payload,
    Response, ReturnCall, TransferCharacteristic, TransferDescriptor, TransferService,
};
use crate::BridgeError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Options for [`ScriptBridge::start_scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    pub filtered_uuids: Option<Vec<String>>,
    pub scan_mode: Option<i32>,
    pub callback_type: Option<i32>,
}

/// Options for [`ScriptBridge::connect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub auto_connect: bool,
    pub request_mtu: Option<u16>,
    pub refresh_gatt: Option<String>,
    pub timeout_ms: Option<u64>,
}

pub struct ScriptBridge {
    facade: Arc<BridgeFacade>,
    channel: Arc<dyn ScriptChannel>,
    config: BridgeConfig,
    transactions: Arc<TransactionMonitor>,
    active_scan: Mutex<Option<CallId>>,
}

impl ScriptBridge {
    pub fn new(channel: Arc<dyn ScriptChannel>, config: BridgeConfig) -> crate::Result<Self> {
        Self::with_facade(Arc::new(BridgeFacade::new()), channel, config)
    }

    /// Build on an existing facade, e.g. one shared with a mobile binding.
    pub fn with_facade(
        facade: Arc<BridgeFacade>,
        channel: Arc<dyn ScriptChannel>,
        config: BridgeConfig,
    ) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            facade,
            channel,
            config,
            transactions: Arc::new(TransactionMonitor::new()),
            active_scan: Mutex::new(None),
        })
    }

    pub fn facade(&self) -> &Arc<BridgeFacade> {
        &self.facade
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn transactions(&self) -> &TransactionMonitor {
        &self.transactions
    }

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    /// Route a raw JSON `ReturnCall` from the scripting runtime.
    pub fn on_message(&self, raw: &str) -> crate::Result<()> {
        let envelope = ReturnCall::from_json(raw).map_err(|e| {
            tracing::warn!("Dropping unreadable return call: {}", e);
            e
        })?;
        self.facade.handle_return_envelope(envelope);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Raw dispatch
    // ------------------------------------------------------------------------

    /// Register `callback` and emit `method`. The callback runs at most once.
    pub fn call_method<F>(
        &self,
        method: MethodName,
        arguments: Option<Payload>,
        callback: F,
    ) -> crate::Result<CallId>
    where
        F: FnOnce(Payload) + Send + 'static,
    {
        let id = self.facade.add_callback(callback);
        self.emit(method, &id, arguments)?;
        Ok(id)
    }

    /// Register a streaming `callback` and emit `method`.
    pub fn call_streaming<F>(
        &self,
        method: MethodName,
        arguments: Option<Payload>,
        callback: F,
    ) -> crate::Result<CallId>
    where
        F: Fn(Payload) + Send + Sync + 'static,
    {
        let id = self.facade.add_stream_callback(callback);
        self.emit(method, &id, arguments)?;
        Ok(id)
    }

    /// Emit `method` and wait for its single reply.
    pub async fn request(
        &self,
        method: MethodName,
        arguments: Option<Payload>,
    ) -> crate::Result<Response> {
        self.request_tracked(method, arguments, None).await
    }

    /// Emit a streaming `method` and return the live subscription.
    pub fn subscribe(
        &self,
        method: MethodName,
        arguments: Option<Payload>,
        transaction_id: Option<&str>,
    ) -> crate::Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.facade.add_stream_callback(move |payload| {
            let _ = tx.send(payload);
        });

        if let Some(transaction_id) = transaction_id {
            self.bind_transaction(transaction_id, &id);
        }
        if let Err(e) = self.emit(method, &id, arguments) {
            if let Some(transaction_id) = transaction_id {
                self.transactions.clear_transaction(transaction_id, &id);
            }
            return Err(e);
        }

        let subscription = Subscription::new(method, id, rx, Arc::downgrade(&self.facade));
        Ok(match transaction_id {
            Some(transaction_id) => subscription
                .with_transaction(transaction_id.to_string(), Arc::downgrade(&self.transactions)),
            None => subscription,
        })
    }

    /// Cancel whatever operation owns `transaction_id`, locally and on the
    /// scripting side. Returns whether a pending call was retired here.
    ///
    /// The scripting side never answers `cancelTransaction`, so the
    /// emission carries a fresh id with nothing registered behind it.
    pub fn cancel_transaction(&self, transaction_id: &str) -> crate::Result<bool> {
        let cancelled = match self.transactions.take(transaction_id) {
            Some(id) => self.facade.cancel_callback(id.as_str()),
            None => false,
        };
        let args = ArgsBuilder::new()
            .set(call::TRANSACTION_ID, transaction_id)
            .build();
        self.emit(MethodName::CancelTransaction, &CallId::generate(), Some(args))?;
        tracing::debug!("Transaction {} cancelled (local: {})", transaction_id, cancelled);
        Ok(cancelled)
    }

    // ------------------------------------------------------------------------
    // Client lifecycle
    // ------------------------------------------------------------------------

    pub async fn create_client(&self) -> crate::Result<()> {
        let response = self.request(MethodName::CreateClient, None).await?;
        expect_ack(response)?;
        tracing::info!("BLE client created");
        Ok(())
    }

    /// Tear the client down. Every pending call is dropped without delivery,
    /// whether or not the scripting side acknowledged.
    pub async fn destroy_client(&self) -> crate::Result<()> {
        let outcome = self.request(MethodName::DestroyClient, None).await;

        *self.active_scan.lock() = None;
        self.transactions.clear();
        let dropped = self.facade.shutdown();
        tracing::info!("BLE client destroyed ({} pending calls dropped)", dropped);

        outcome.and_then(expect_ack)
    }

    pub async fn enable(&self, transaction_id: &str) -> crate::Result<()> {
        let args = transaction_args(transaction_id).build();
        self.request_tracked(MethodName::Enable, Some(args), Some(transaction_id))
            .await
            .and_then(expect_ack)
    }

    pub async fn disable(&self, transaction_id: &str) -> crate::Result<()> {
        let args = transaction_args(transaction_id).build();
        self.request_tracked(MethodName::Disable, Some(args), Some(transaction_id))
            .await
            .and_then(expect_ack)
    }

    // ------------------------------------------------------------------------
    // Scanning
    // ------------------------------------------------------------------------

    /// Start scanning. Only one scan may run at a time.
    pub fn start_scan(&self, options: ScanOptions) -> crate::Result<Subscription> {
        // Held across the emission so concurrent callers cannot both start.
        let mut active_scan = self.active_scan.lock();
        if let Some(id) = active_scan.as_ref() {
            if self.facade.is_pending(id.as_str()) {
                return Err(BridgeError::Ble(BleError::new(
                    BleErrorCode::ScanStartFailed,
                    "Scan already in progress",
                )));
            }
        }

        let args = ArgsBuilder::new()
            .opt(call::FILTERED_UUIDS, options.filtered_uuids)
            .opt(call::SCAN_MODE, options.scan_mode)
            .opt(call::CALLBACK_TYPE, options.callback_type)
            .build();
        let subscription = self.subscribe(MethodName::StartScan, Some(args), None)?;
        *active_scan = Some(subscription.call_id().clone());
        tracing::info!("Scan started");
        Ok(subscription)
    }

    pub async fn stop_scan(&self) -> crate::Result<()> {
        let scan = self.active_scan.lock().take();
        if let Some(id) = scan {
            self.facade.cancel_callback(id.as_str());
        }
        let response = self.request(MethodName::StopScan, None).await?;
        tracing::info!("Scan stopped");
        expect_ack(response)
    }

    // ------------------------------------------------------------------------
    // Connection management
    // ------------------------------------------------------------------------

    pub async fn connect(
        &self,
        identifier: &str,
        options: ConnectionOptions,
    ) -> crate::Result<DevicePayload> {
        let args = ArgsBuilder::new()
            .set(call::IDENTIFIER, identifier)
            .set(call::IS_AUTO_CONNECT, options.auto_connect)
            .opt(call::REQUEST_MTU, options.request_mtu)
            .opt(call::REFRESH_GATT, options.refresh_gatt)
            .opt(call::TIMEOUT, options.timeout_ms)
            .build();
        let method = MethodName::Connect;
        let response = self.request(method, Some(args)).await?;
        let device = into_device(method, response, identifier)?;
        tracing::info!("Connected to {}", device.id);
        Ok(device)
    }

    pub async fn disconnect(&self, identifier: &str) -> crate::Result<DevicePayload> {
        let args = ArgsBuilder::new().set(call::IDENTIFIER, identifier).build();
        let method = MethodName::CancelConnectionOrDisconnect;
        let response = self.request(method, Some(args)).await?;
        into_device(method, response, identifier)
    }

    pub async fn is_device_connected(&self, identifier: &str) -> crate::Result<bool> {
        let args = ArgsBuilder::new().set(call::IDENTIFIER, identifier).build();
        let method = MethodName::IsDeviceConnected;
        let response = self.request(method, Some(args)).await?;
        unpack(method, response, |r| match r {
            Response::Connected(connected) => Ok(connected),
            other => Err(other),
        })
    }

    pub async fn read_rssi(
        &self,
        identifier: &str,
        transaction_id: &str,
    ) -> crate::Result<DevicePayload> {
        let args = transaction_args(transaction_id)
            .set(call::IDENTIFIER, identifier)
            .build();
        let method = MethodName::ReadRssi;
        let response = self
            .request_tracked(method, Some(args), Some(transaction_id))
            .await?;
        into_device(method, response, identifier)
    }

    pub async fn request_mtu(
        &self,
        identifier: &str,
        mtu: u16,
        transaction_id: &str,
    ) -> crate::Result<DevicePayload> {
        let args = transaction_args(transaction_id)
            .set(call::IDENTIFIER, identifier)
            .set(call::MTU, mtu)
            .build();
        let method = MethodName::RequestMtu;
        let response = self
            .request_tracked(method, Some(args), Some(transaction_id))
            .await?;
        into_device(method, response, identifier)
    }

    pub async fn request_connection_priority(
        &self,
        identifier: &str,
        priority: i32,
        transaction_id: &str,
    ) -> crate::Result<DevicePayload> {
        let args = transaction_args(transaction_id)
            .set(call::IDENTIFIER, identifier)
            .set(call::CONNECTION_PRIORITY, priority)
            .build();
        let method = MethodName::RequestConnectionPriority;
        let response = self
            .request_tracked(method, Some(args), Some(transaction_id))
            .await?;
        into_device(method, response, identifier)
    }

    pub async fn known_devices(&self, identifiers: &[String]) -> crate::Result<Vec<DevicePayload>> {
        let args = ArgsBuilder::new().set(call::IDENTIFIERS, identifiers).build();
        self.devices(MethodName::GetKnownDevices, args).await
    }

    pub async fn connected_devices(
        &self,
        service_uuids: &[String],
    ) -> crate::Result<Vec<DevicePayload>> {
        let args = ArgsBuilder::new().set(call::SERVICE_UUIDS, service_uuids).build();
        self.devices(MethodName::GetConnectedDevices, args).await
    }

    async fn devices(&self, method: MethodName, args: Payload) -> crate::Result<Vec<DevicePayload>> {
        let response = self.request(method, Some(args)).await?;
        unpack(method, response, |r| match r {
            Response::Devices(devices) => Ok(devices),
            Response::Ack => Ok(Vec::new()),
            other => Err(other),
        })
    }

    // ------------------------------------------------------------------------
    // GATT
    // ------------------------------------------------------------------------

    pub async fn discover(
        &self,
        identifier: &str,
        transaction_id: &str,
    ) -> crate::Result<Vec<TransferService>> {
        let args = transaction_args(transaction_id)
            .set(call::IDENTIFIER, identifier)
            .build();
        let method = MethodName::Discovery;
        let response = self
            .request_tracked(method, Some(args), Some(transaction_id))
            .await?;
        unpack(method, response, |r| match r {
            Response::Services(services) => Ok(services),
            other => Err(other),
        })
    }

    pub async fn read_characteristic(
        &self,
        target: &CharacteristicTarget,
        transaction_id: &str,
    ) -> crate::Result<TransferCharacteristic> {
        let method = target.method(CharacteristicOp::Read);
        let args = target
            .args()
            .set(call::TRANSACTION_ID, transaction_id)
            .build();
        let response = self
            .request_tracked(method, Some(args), Some(transaction_id))
            .await?;
        into_characteristic(method, response)
    }

    pub async fn write_characteristic(
        &self,
        target: &CharacteristicTarget,
        value: &str,
        with_response: bool,
        transaction_id: &str,
    ) -> crate::Result<TransferCharacteristic> {
        let method = target.method(CharacteristicOp::Write);
        let args = target
            .args()
            .set(call::VALUE, value)
            .set(call::WITH_RESPONSE, with_response)
            .set(call::TRANSACTION_ID, transaction_id)
            .build();
        let response = self
            .request_tracked(method, Some(args), Some(transaction_id))
            .await?;
        into_characteristic(method, response)
    }

    /// Subscribe to value changes. The stream ends on the first error
    /// delivery, on cancel, or when the subscription is dropped.
    pub fn monitor_characteristic(
        &self,
        target: &CharacteristicTarget,
        transaction_id: &str,
    ) -> crate::Result<Subscription> {
        let method = target.method(CharacteristicOp::Monitor);
        let args = target
            .args()
            .set(call::TRANSACTION_ID, transaction_id)
            .build();
        self.subscribe(method, Some(args), Some(transaction_id))
    }

    pub async fn read_descriptor(
        &self,
        target: &DescriptorTarget,
        transaction_id: &str,
    ) -> crate::Result<TransferDescriptor> {
        let method = target.method(false);
        let args = target
            .args()
            .set(call::TRANSACTION_ID, transaction_id)
            .build();
        let response = self
            .request_tracked(method, Some(args), Some(transaction_id))
            .await?;
        into_descriptor(method, response)
    }

    pub async fn write_descriptor(
        &self,
        target: &DescriptorTarget,
        value: &str,
        transaction_id: &str,
    ) -> crate::Result<TransferDescriptor> {
        let method = target.method(true);
        let args = target
            .args()
            .set(call::VALUE, value)
            .set(call::TRANSACTION_ID, transaction_id)
            .build();
        let response = self
            .request_tracked(method, Some(args), Some(transaction_id))
            .await?;
        into_descriptor(method, response)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn emit(&self, method: MethodName, id: &CallId, arguments: Option<Payload>) -> crate::Result<()> {
        let call = MethodCall::new(method, id.clone(), arguments);
        if self.config.log_payloads {
            tracing::debug!("Emitting {} ({}): {:?}", method, id, call.arguments);
        } else {
            tracing::debug!("Emitting {} ({})", method, id);
        }

        if let Err(e) = self.channel.emit(&self.config.method_call_event, call) {
            self.facade.cancel_callback(id.as_str());
            tracing::error!("Failed to emit {} ({}): {}", method, id, e);
            return Err(e);
        }
        Ok(())
    }

    async fn request_tracked(
        &self,
        method: MethodName,
        arguments: Option<Payload>,
        transaction_id: Option<&str>,
    ) -> crate::Result<Response> {
        let (tx, rx) = oneshot::channel();
        let id = self.facade.add_callback(move |payload| {
            let _ = tx.send(payload);
        });
        if let Some(transaction_id) = transaction_id {
            self.bind_transaction(transaction_id, &id);
        }

        // Retires the call however this future ends, including being dropped.
        let _in_flight = InFlight {
            bridge: self,
            id: id.clone(),
            transaction_id,
        };

        self.emit(method, &id, arguments)?;

        match tokio::time::timeout(self.config.request_timeout(), rx).await {
            Ok(Ok(payload)) => Response::parse(method, payload),
            Ok(Err(_)) => {
                tracing::debug!("{} ({}) cancelled before reply", method, id);
                Err(BridgeError::Cancelled)
            }
            Err(_) => {
                tracing::warn!(
                    "{} ({}) timed out after {}ms",
                    method,
                    id,
                    self.config.request_timeout_ms
                );
                Err(BridgeError::Timeout {
                    method: method.to_string(),
                    after_ms: self.config.request_timeout_ms,
                })
            }
        }
    }

    fn bind_transaction(&self, transaction_id: &str, id: &CallId) {
        if let Some(previous) = self.transactions.register(transaction_id, id.clone()) {
            if self.facade.cancel_callback(previous.as_str()) {
                tracing::debug!("Transaction {} superseded call {}", transaction_id, previous);
            }
        }
    }
}

impl std::fmt::Debug for ScriptBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptBridge")
            .field("config", &self.config)
            .field("pending", &self.facade.pending_count())
            .field("transactions", &self.transactions.len())
            .finish()
    }
}

struct InFlight<'a> {
    bridge: &'a ScriptBridge,
    id: CallId,
    transaction_id: Option<&'a str>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.bridge.facade.cancel_callback(self.id.as_str());
        if let Some(transaction_id) = self.transaction_id {
            self.bridge
                .transactions
                .clear_transaction(transaction_id, &self.id);
        }
    }
}

fn transaction_args(transaction_id: &str) -> ArgsBuilder {
    ArgsBuilder::new().set(call::TRANSACTION_ID, transaction_id)
}

fn unexpected(method: MethodName, response: &Response) -> BridgeError {
    BridgeError::MalformedPayload {
        method: method.to_string(),
        reason: format!("unexpected response {:?}", response),
    }
}

fn unpack<T>(
    method: MethodName,
    response: Response,
    pick: impl FnOnce(Response) -> std::result::Result<T, Response>,
) -> crate::Result<T> {
    let response = response.into_result().map_err(BridgeError::Ble)?;
    pick(response).map_err(|other| unexpected(method, &other))
}

fn expect_ack(response: Response) -> crate::Result<()> {
    response.into_result().map(|_| ()).map_err(BridgeError::Ble)
}

fn into_device(
    method: MethodName,
    response: Response,
    identifier: &str,
) -> crate::Result<DevicePayload> {
    unpack(method, response, |r| match r {
        Response::Device(device) => Ok(device),
        Response::Ack => Ok(DevicePayload::new(identifier)),
        other => Err(other),
    })
}

fn into_characteristic(
    method: MethodName,
    response: Response,
) -> crate::Result<TransferCharacteristic> {
    unpack(method, response, |r| match r {
        Response::Characteristic(characteristic) => Ok(characteristic),
        other => Err(other),
    })
}

fn into_descriptor(method: MethodName, response: Response) -> crate::Result<TransferDescriptor> {
    unpack(method, response, |r| match r {
        Response::Descriptor(descriptor) => Ok(descriptor),
        other => Err(other),
    })
}
