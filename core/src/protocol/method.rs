use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown method name: {0}")]
pub struct UnknownMethod(pub String);

/// Declares the method catalogue together with its wire strings.
macro_rules! method_names {
    ($($variant:ident => $wire:literal),+ $(,)?) => {
        /// Every method the native layer may ask the scripting side to run.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MethodName {
            $($variant,)+
        }

        impl MethodName {
            pub const ALL: &'static [MethodName] = &[$(MethodName::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(MethodName::$variant => $wire,)+
                }
            }
        }

        impl FromStr for MethodName {
            type Err = UnknownMethod;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(MethodName::$variant),)+
                    other => Err(UnknownMethod(other.to_string())),
                }
            }
        }
    };
}

method_names! {
    CreateClient => "createClient",
    DestroyClient => "destroyClient",

    Enable => "enable",
    Disable => "disable",

    StartScan => "startScan",
    StopScan => "stopScan",

    Connect => "connect",
    CancelConnectionOrDisconnect => "disconnect",
    IsDeviceConnected => "isDeviceConnected",

    ReadRssi => "readRssi",
    RequestConnectionPriority => "requestConnectionPriority",
    RequestMtu => "requestMtu",

    GetKnownDevices => "getKnownDevices",
    GetConnectedDevices => "getConnectedDevices",

    Discovery => "discovery",

    ReadCharacteristic => "readCharacteristic",
    ReadCharacteristicForService => "readCharacteristicForService",
    ReadCharacteristicForDevice => "readCharacteristicForDevice",

    WriteCharacteristic => "writeCharacteristic",
    WriteCharacteristicForService => "writeCharacteristicForService",
    WriteCharacteristicForDevice => "writeCharacteristicForDevice",

    MonitorCharacteristic => "monitorCharacteristic",
    MonitorCharacteristicForService => "monitorCharacteristicForService",
    MonitorCharacteristicForDevice => "monitorCharacteristicForDevice",

    ReadDescriptor => "readDescriptor",
    ReadDescriptorForCharacteristic => "readDescriptorForCharacteristic",
    ReadDescriptorForService => "readDescriptorForService",
    ReadDescriptorForDevice => "readDescriptorForDevice",

    WriteDescriptor => "writeDescriptor",
    WriteDescriptorForCharacteristic => "writeDescriptorForCharacteristic",
    WriteDescriptorForService => "writeDescriptorForService",
    WriteDescriptorForDevice => "writeDescriptorForDevice",

    CancelTransaction => "cancelTransaction",
}

impl MethodName {
    /// Methods whose callback outlives the first delivery.
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            MethodName::StartScan
                | MethodName::MonitorCharacteristic
                | MethodName::MonitorCharacteristicForService
                | MethodName::MonitorCharacteristicForDevice
        )
    }

    pub fn is_characteristic_op(&self) -> bool {
        matches!(
            self,
            MethodName::ReadCharacteristic
                | MethodName::ReadCharacteristicForService
                | MethodName::ReadCharacteristicForDevice
                | MethodName::WriteCharacteristic
                | MethodName::WriteCharacteristicForService
                | MethodName::WriteCharacteristicForDevice
                | MethodName::MonitorCharacteristic
                | MethodName::MonitorCharacteristicForService
                | MethodName::MonitorCharacteristicForDevice
        )
    }

    pub fn is_descriptor_op(&self) -> bool {
        matches!(
            self,
            MethodName::ReadDescriptor
                | MethodName::ReadDescriptorForCharacteristic
                | MethodName::ReadDescriptorForService
                | MethodName::ReadDescriptorForDevice
                | MethodName::WriteDescriptor
                | MethodName::WriteDescriptorForCharacteristic
                | MethodName::WriteDescriptorForService
                | MethodName::WriteDescriptorForDevice
        )
    }
}

impl fmt::Display for MethodName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MethodName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MethodName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
