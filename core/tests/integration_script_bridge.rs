//! ScriptBridge tests against an in-process scripting runtime
//!
//! A spawned task plays the scripting side: it reads emitted `MethodCall`s,
//! decides on replies, and feeds them back as JSON through `on_message`.
//!
//! Run with: cargo test --test integration_script_bridge

use blebridge_core::protocol::{ReturnCall, TransferService};
use blebridge_core::{
    BleErrorCode, BridgeConfig, BridgeError, CharacteristicTarget, ConnectionOptions, MethodCall,
    MethodName, Payload, Response, ScanOptions, ScriptBridge, ScriptChannel,
};
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

type CallLog = Arc<Mutex<Vec<MethodCall>>>;

fn payload(value: Value) -> Payload {
    value.as_object().cloned().expect("payload must be an object")
}

fn reply(call: &MethodCall, value: Value) -> ReturnCall {
    ReturnCall::new(call.callback_id.clone(), payload(value))
}

fn characteristic(id: i64, value: &str) -> Value {
    json!({
        "peripheralId": "AA",
        "id": id,
        "uuid": "2a37",
        "serviceId": 1,
        "serviceUuid": "180d",
        "isReadable": true,
        "isNotifiable": true,
        "value": value
    })
}

fn start_script<F>(config: BridgeConfig, script: F) -> (Arc<ScriptBridge>, CallLog)
where
    F: Fn(&MethodCall) -> Vec<ReturnCall> + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<MethodCall>();
    let bridge = Arc::new(ScriptBridge::new(Arc::new(tx), config).unwrap());
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));

    // Weak, so dropping the bridge closes the channel and ends the task.
    let responder = Arc::downgrade(&bridge);
    let seen = log.clone();
    tokio::spawn(async move {
        while let Some(call) = rx.recv().await {
            let replies = script(&call);
            seen.lock().unwrap().push(call);
            let Some(bridge) = responder.upgrade() else {
                break;
            };
            for envelope in replies {
                bridge.on_message(&envelope.to_json().unwrap()).unwrap();
            }
        }
    });

    (bridge, log)
}

/// Records every call and never answers. Emission takes `delay`.
struct SilentChannel {
    delay: Duration,
    log: CallLog,
}

impl SilentChannel {
    fn new(delay: Duration) -> (Arc<Self>, CallLog) {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let channel = Arc::new(Self {
            delay,
            log: log.clone(),
        });
        (channel, log)
    }
}

impl ScriptChannel for SilentChannel {
    fn emit(&self, _event: &str, call: MethodCall) -> blebridge_core::Result<()> {
        thread::sleep(self.delay);
        self.log.lock().unwrap().push(call);
        Ok(())
    }
}

fn config() -> BridgeConfig {
    BridgeConfig::default().with_request_timeout(Duration::from_secs(2))
}

fn methods(log: &CallLog) -> Vec<MethodName> {
    log.lock().unwrap().iter().map(|c| c.method_name).collect()
}

#[tokio::test]
async fn test_connect_discover_read_flow() {
    let (bridge, log) = start_script(config(), |call| match call.method_name {
        MethodName::Connect => vec![reply(call, json!({"id": "AA", "name": "HR", "mtu": 23}))],
        MethodName::Discovery => vec![reply(
            call,
            json!({"value": [{
                "peripheralId": "AA",
                "id": 1,
                "uuid": "180d",
                "characteristics": [characteristic(2, "AA==")]
            }]}),
        )],
        MethodName::ReadCharacteristic => vec![reply(call, characteristic(2, "AQ=="))],
        _ => vec![reply(call, json!({}))],
    });

    bridge.create_client().await.unwrap();

    let device = bridge
        .connect("AA", ConnectionOptions::default())
        .await
        .unwrap();
    assert_eq!(device.name.as_deref(), Some("HR"));
    assert_eq!(device.mtu, Some(23));

    let services: Vec<TransferService> = bridge.discover("AA", "discover-AA").await.unwrap();
    assert_eq!(services[0].characteristics.len(), 1);

    let value = bridge
        .read_characteristic(&CharacteristicTarget::Id(2), "read-2")
        .await
        .unwrap();
    assert_eq!(value.value.as_deref(), Some("AQ=="));

    assert_eq!(
        methods(&log),
        vec![
            MethodName::CreateClient,
            MethodName::Connect,
            MethodName::Discovery,
            MethodName::ReadCharacteristic
        ]
    );
    let connect_args = log.lock().unwrap()[1].arguments.clone().unwrap();
    assert_eq!(connect_args.get("identifier"), Some(&json!("AA")));
    assert_eq!(connect_args.get("isAutoConnect"), Some(&json!(false)));

    assert_eq!(bridge.facade().pending_count(), 0);
    assert!(bridge.transactions().is_empty());
}

#[tokio::test]
async fn test_monitor_stream_ends_on_error() {
    let (bridge, _log) = start_script(config(), |call| match call.method_name {
        MethodName::MonitorCharacteristic => vec![
            reply(call, characteristic(2, "AQ==")),
            reply(call, characteristic(2, "Ag==")),
            reply(call, characteristic(2, "Aw==")),
            reply(call, json!({"error": {"errorCode": 201, "message": "Device disconnected"}})),
        ],
        _ => vec![reply(call, json!({}))],
    });

    let subscription = bridge
        .monitor_characteristic(&CharacteristicTarget::Id(2), "monitor-2")
        .unwrap();
    let items: Vec<_> = subscription.collect().await;

    assert_eq!(items.len(), 4);
    for item in &items[..3] {
        assert!(matches!(item, Ok(Response::Characteristic(_))));
    }
    match &items[3] {
        Ok(Response::Failed(err)) => assert_eq!(err.code, BleErrorCode::DeviceDisconnected),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(bridge.facade().pending_count(), 0);
}

#[tokio::test]
async fn test_cancel_transaction_interrupts_read() {
    // Reads are never answered; everything else is acknowledged.
    let (bridge, log) = start_script(config(), |call| match call.method_name {
        MethodName::ReadCharacteristic => Vec::new(),
        _ => vec![reply(call, json!({}))],
    });

    let reader = bridge.clone();
    let read = tokio::spawn(async move {
        reader
            .read_characteristic(&CharacteristicTarget::Id(3), "read-3")
            .await
    });

    while bridge.transactions().lookup("read-3").is_none() {
        tokio::task::yield_now().await;
    }

    assert!(bridge.cancel_transaction("read-3").unwrap());
    assert_eq!(read.await.unwrap().unwrap_err(), BridgeError::Cancelled);

    // The scripting side is told too.
    while !methods(&log).contains(&MethodName::CancelTransaction) {
        tokio::task::yield_now().await;
    }
    let cancel = log
        .lock()
        .unwrap()
        .iter()
        .find(|c| c.method_name == MethodName::CancelTransaction)
        .cloned()
        .unwrap();
    assert_eq!(
        cancel.arguments.unwrap().get("transactionId"),
        Some(&json!("read-3"))
    );
    assert_eq!(bridge.facade().pending_count(), 0);
}

#[test]
fn test_unanswered_cancel_transaction_leaves_nothing_pending() {
    let (channel, log) = SilentChannel::new(Duration::ZERO);
    let quick = BridgeConfig::default().with_request_timeout(Duration::from_millis(20));
    let bridge = ScriptBridge::new(channel, quick).unwrap();

    for n in 0..5 {
        assert!(!bridge.cancel_transaction(&format!("tx-{}", n)).unwrap());
    }

    assert_eq!(methods(&log), vec![MethodName::CancelTransaction; 5]);
    assert_eq!(bridge.facade().pending_count(), 0);
    assert_eq!(bridge.facade().stats().registered, 0);
}

#[test]
fn test_concurrent_start_scan_admits_one() {
    let (channel, log) = SilentChannel::new(Duration::from_millis(100));
    let bridge = Arc::new(ScriptBridge::new(channel, config()).unwrap());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let bridge = bridge.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                bridge.start_scan(ScanOptions::default())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let started: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(started.len(), 1);
    for result in &results {
        if let Err(err) = result {
            match err {
                BridgeError::Ble(err) => assert_eq!(err.code, BleErrorCode::ScanStartFailed),
                other => panic!("expected scan start failure, got {:?}", other),
            }
        }
    }

    assert_eq!(methods(&log), vec![MethodName::StartScan]);
    assert_eq!(bridge.facade().pending_count(), 1);
    assert!(bridge.facade().is_pending(started[0].call_id().as_str()));
}

#[tokio::test]
async fn test_reused_transaction_supersedes_monitor() {
    let (bridge, _log) = start_script(config(), |_| Vec::new());
    let target = CharacteristicTarget::ForService {
        service_id: 1,
        characteristic_uuid: "2a37".to_string(),
    };

    let mut first = bridge.monitor_characteristic(&target, "hr").unwrap();
    let second = bridge.monitor_characteristic(&target, "hr").unwrap();

    assert!(!first.is_active());
    assert!(second.is_active());
    assert!(first.next_response().await.is_none());

    drop(first);
    assert_eq!(bridge.transactions().lookup("hr").as_ref(), Some(second.call_id()));
}

#[tokio::test]
async fn test_scan_stream_and_stop() {
    let (bridge, log) = start_script(config(), |call| match call.method_name {
        MethodName::StartScan => vec![
            reply(call, json!({"id": "AA", "rssi": -40, "name": "HR"})),
            reply(call, json!({"id": "BB", "rssi": -70})),
        ],
        _ => vec![reply(call, json!({}))],
    });

    let mut scan = bridge
        .start_scan(ScanOptions {
            filtered_uuids: Some(vec!["180d".to_string()]),
            ..ScanOptions::default()
        })
        .unwrap();

    match scan.next_response().await {
        Some(Ok(Response::ScanResult(result))) => assert_eq!(result.id, "AA"),
        other => panic!("expected scan result, got {:?}", other),
    }

    bridge.stop_scan().await.unwrap();

    // Already-buffered results still drain, then the stream ends.
    match scan.next_response().await {
        Some(Ok(Response::ScanResult(result))) => assert_eq!(result.rssi, -70),
        other => panic!("expected scan result, got {:?}", other),
    }
    assert!(scan.next_response().await.is_none());

    let start = log.lock().unwrap()[0].arguments.clone().unwrap();
    assert_eq!(start.get("filteredUuids"), Some(&json!(["180d"])));
}

#[tokio::test]
async fn test_destroy_client_retires_everything() {
    let (bridge, _log) = start_script(config(), |call| match call.method_name {
        MethodName::StartScan => Vec::new(),
        _ => vec![reply(call, json!({}))],
    });

    let mut scan = bridge.start_scan(ScanOptions::default()).unwrap();
    let _monitor = bridge
        .monitor_characteristic(&CharacteristicTarget::Id(4), "monitor-4")
        .unwrap();
    assert_eq!(bridge.facade().pending_count(), 2);

    bridge.destroy_client().await.unwrap();

    assert_eq!(bridge.facade().pending_count(), 0);
    assert!(bridge.transactions().is_empty());
    assert!(scan.next_response().await.is_none());

    // A fresh scan is allowed after teardown.
    assert!(bridge.start_scan(ScanOptions::default()).is_ok());
}

#[tokio::test]
async fn test_unanswered_request_times_out() {
    let quick = BridgeConfig::default().with_request_timeout(Duration::from_millis(30));
    let (bridge, _log) = start_script(quick, |_| Vec::new());

    let err = bridge.is_device_connected("AA").await.unwrap_err();
    assert!(matches!(err, BridgeError::Timeout { after_ms: 30, .. }));
    assert_eq!(bridge.facade().pending_count(), 0);
}

#[tokio::test]
async fn test_closed_channel_fails_fast() {
    let (tx, rx) = mpsc::unbounded_channel::<MethodCall>();
    drop(rx);
    let bridge = ScriptBridge::new(Arc::new(tx), config()).unwrap();

    assert_eq!(
        bridge.create_client().await.unwrap_err(),
        BridgeError::ChannelClosed
    );
    assert_eq!(bridge.facade().pending_count(), 0);
}
