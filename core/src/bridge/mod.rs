//! Call-correlation bridge
//!
//! This module is the boundary between code that starts an asynchronous BLE
//! operation and code that later learns its outcome:
//!
//! - **call_id**: opaque, randomly generated correlation tokens
//! - **registry**: the CallId -> pending callback map with at-most-once delivery
//! - **facade**: the single entry point the rest of the native layer holds
//!
//! Nothing here interprets payloads. A BLE failure is just another delivery
//! whose payload happens to carry an `error` key.

pub mod call_id;
pub mod facade;
pub mod registry;

pub use call_id::CallId;
pub use facade::{BridgeFacade, BridgeStats};
pub use registry::{CallbackRegistry, EntryKind};
