//! Native-side platform layer on top of the bridge core
//!
//! - **channel**: the outbound [`ScriptChannel`] seam towards the scripting runtime
//! - **script_bridge**: [`ScriptBridge`], typed BLE operations over call correlation
//! - **subscription**: [`Subscription`], the consumer side of streaming calls
//! - **transactions**: [`TransactionMonitor`], caller-named cancellable operations
//! - **config**: [`BridgeConfig`]

pub mod channel;
pub mod config;
pub mod script_bridge;
pub mod subscription;
pub mod targets;
pub mod transactions;

pub use channel::{JsonChannel, ScriptChannel};
pub use config::{BridgeConfig, DEFAULT_REQUEST_TIMEOUT_MS};
pub use script_bridge::{ConnectionOptions, ScanOptions, ScriptBridge};
pub use subscription::Subscription;
pub use targets::{CharacteristicTarget, DescriptorTarget};
pub use transactions::TransactionMonitor;
