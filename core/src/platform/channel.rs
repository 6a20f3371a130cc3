use crate::protocol::MethodCall;
use crate::BridgeError;

/// Outbound edge towards the scripting runtime.
///
/// Implementations hand the envelope over and return immediately; the answer
/// comes back later through [`super::ScriptBridge::on_message`] or the
/// facade's `handle_return_*` entry points.
#[cfg_attr(test, mockall::automock)]
pub trait ScriptChannel: Send + Sync {
    fn emit(&self, event: &str, call: MethodCall) -> crate::Result<()>;
}

impl ScriptChannel for tokio::sync::mpsc::UnboundedSender<MethodCall> {
    fn emit(&self, _event: &str, call: MethodCall) -> crate::Result<()> {
        self.send(call).map_err(|_| BridgeError::ChannelClosed)
    }
}

impl ScriptChannel for std::sync::mpsc::Sender<MethodCall> {
    fn emit(&self, _event: &str, call: MethodCall) -> crate::Result<()> {
        self.send(call).map_err(|_| BridgeError::ChannelClosed)
    }
}

/// Adapts a closure taking `(event, json)` into a [`ScriptChannel`].
///
/// For hosts whose scripting runtime only accepts strings.
pub struct JsonChannel<F> {
    sink: F,
}

impl<F> JsonChannel<F>
where
    F: Fn(&str, String) -> crate::Result<()> + Send + Sync,
{
    pub fn new(sink: F) -> Self {
        Self { sink }
    }
}

impl<F> ScriptChannel for JsonChannel<F>
where
    F: Fn(&str, String) -> crate::Result<()> + Send + Sync,
{
    fn emit(&self, event: &str, call: MethodCall) -> crate::Result<()> {
        let json = call.to_json()?;
        (self.sink)(event, json)
    }
}
