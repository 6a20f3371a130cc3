// Attribute addressing
//
// Characteristics and descriptors can be addressed by their numeric id, or by
// UUID path relative to a service or device. Each addressing mode maps to its
// own method name on the wire.

use crate::protocol::args::call;
use crate::protocol::{ArgsBuilder, MethodName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacteristicTarget {
    Id(i64),
    ForService {
        service_id: i64,
        characteristic_uuid: String,
    },
    ForDevice {
        device_id: String,
        service_uuid: String,
        characteristic_uuid: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CharacteristicOp {
    Read,
    Write,
    Monitor,
}

impl CharacteristicTarget {
    pub(crate) fn method(&self, op: CharacteristicOp) -> MethodName {
        use CharacteristicOp::*;
        match (self, op) {
            (Self::Id(_), Read) => MethodName::ReadCharacteristic,
            (Self::Id(_), Write) => MethodName::WriteCharacteristic,
            (Self::Id(_), Monitor) => MethodName::MonitorCharacteristic,
            (Self::ForService { .. }, Read) => MethodName::ReadCharacteristicForService,
            (Self::ForService { .. }, Write) => MethodName::WriteCharacteristicForService,
            (Self::ForService { .. }, Monitor) => MethodName::MonitorCharacteristicForService,
            (Self::ForDevice { .. }, Read) => MethodName::ReadCharacteristicForDevice,
            (Self::ForDevice { .. }, Write) => MethodName::WriteCharacteristicForDevice,
            (Self::ForDevice { .. }, Monitor) => MethodName::MonitorCharacteristicForDevice,
        }
    }

    pub(crate) fn args(&self) -> ArgsBuilder {
        let builder = ArgsBuilder::new();
        match self {
            Self::Id(id) => builder.set(call::CHARACTERISTIC_ID, id),
            Self::ForService {
                service_id,
                characteristic_uuid,
            } => builder
                .set(call::SERVICE_ID, service_id)
                .set(call::CHARACTERISTIC_UUID, characteristic_uuid),
            Self::ForDevice {
                device_id,
                service_uuid,
                characteristic_uuid,
            } => builder
                .set(call::IDENTIFIER, device_id)
                .set(call::SERVICE_UUID, service_uuid)
                .set(call::CHARACTERISTIC_UUID, characteristic_uuid),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorTarget {
    Id(i64),
    ForCharacteristic {
        characteristic_id: i64,
        descriptor_uuid: String,
    },
    ForService {
        service_id: i64,
        characteristic_uuid: String,
        descriptor_uuid: String,
    },
    ForDevice {
        device_id: String,
        service_uuid: String,
        characteristic_uuid: String,
        descriptor_uuid: String,
    },
}

impl DescriptorTarget {
    pub(crate) fn method(&self, write: bool) -> MethodName {
        match (self, write) {
            (Self::Id(_), false) => MethodName::ReadDescriptor,
            (Self::Id(_), true) => MethodName::WriteDescriptor,
            (Self::ForCharacteristic { .. }, false) => MethodName::ReadDescriptorForCharacteristic,
            (Self::ForCharacteristic { .. }, true) => MethodName::WriteDescriptorForCharacteristic,
            (Self::ForService { .. }, false) => MethodName::ReadDescriptorForService,
            (Self::ForService { .. }, true) => MethodName::WriteDescriptorForService,
            (Self::ForDevice { .. }, false) => MethodName::ReadDescriptorForDevice,
            (Self::ForDevice { .. }, true) => MethodName::WriteDescriptorForDevice,
        }
    }

    pub(crate) fn args(&self) -> ArgsBuilder {
        let builder = ArgsBuilder::new();
        match self {
            Self::Id(id) => builder.set(call::DESCRIPTOR_ID, id),
            Self::ForCharacteristic {
                characteristic_id,
                descriptor_uuid,
            } => builder
                .set(call::CHARACTERISTIC_ID, characteristic_id)
                .set(call::DESCRIPTOR_UUID, descriptor_uuid),
            Self::ForService {
                service_id,
                characteristic_uuid,
                descriptor_uuid,
            } => builder
                .set(call::SERVICE_ID, service_id)
                .set(call::CHARACTERISTIC_UUID, characteristic_uuid)
                .set(call::DESCRIPTOR_UUID, descriptor_uuid),
            Self::ForDevice {
                device_id,
                service_uuid,
                characteristic_uuid,
                descriptor_uuid,
            } => builder
                .set(call::IDENTIFIER, device_id)
                .set(call::SERVICE_UUID, service_uuid)
                .set(call::CHARACTERISTIC_UUID, characteristic_uuid)
                .set(call::DESCRIPTOR_UUID, descriptor_uuid),
        }
    }
}
