//! Wire vocabulary shared with the scripting side
//!
//! - **method**: the closed catalogue of method names
//! - **args**: argument keys for outbound calls and result keys for inbound payloads
//! - **envelope**: `MethodCall` (native -> script) and `ReturnCall` (script -> native)
//! - **payload**: typed result shapes validated at the boundary
//! - **error**: BLE error codes and decoded error payloads
//!
//! The bridge core treats all of this as opaque; only the platform layer
//! interprets it.

pub mod args;
pub mod envelope;
pub mod error;
pub mod method;
pub mod payload;

pub use args::ArgsBuilder;
pub use envelope::{MethodCall, ReturnCall, METHOD_CALL_EVENT};
pub use error::{BleError, BleErrorCode};
pub use method::MethodName;
pub use payload::{
    DevicePayload, Payload, Response, ScanResultPayload, TransferCharacteristic,
    TransferDescriptor, TransferService,
};
