//! Static registry of recognized BLE dive computers.
//!
//! Pure identifying metadata: GATT service UUIDs and vendor/product names
//! used to match an advertising peripheral to a known model. Connecting,
//! pairing, and characteristic discovery belong to the platform BLE layer.

/// One BLE advertisement seen during a scan.
#[derive(Clone, Debug)]
pub struct BleDeviceInfo {
    pub id: String,
    pub name: String,
    pub rssi: i16,
}

/// A dive-computer family this subsystem knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownDevice {
    /// Shearwater Petrel / Perdix / Teric family.
    Shearwater,
    /// Suunto EON Steel / EON Core.
    SuuntoEon,
    /// Mares computers with a BlueLink Pro dongle.
    MaresBlueLink,
}

impl KnownDevice {
    pub fn vendor(&self) -> &'static str {
        match self {
            KnownDevice::Shearwater => "Shearwater",
            KnownDevice::SuuntoEon => "Suunto",
            KnownDevice::MaresBlueLink => "Mares",
        }
    }

    pub fn product(&self) -> &'static str {
        match self {
            KnownDevice::Shearwater => "Petrel / Perdix / Teric",
            KnownDevice::SuuntoEon => "EON Steel / EON Core",
            KnownDevice::MaresBlueLink => "BlueLink Pro",
        }
    }

    /// Canonical (uppercase) GATT service UUID advertised by the device.
    pub fn service_uuid(&self) -> &'static str {
        match self {
            KnownDevice::Shearwater => "FE25C237-0ECE-443C-B0AA-E02033E7029D",
            KnownDevice::SuuntoEon => "0000FEFB-0000-1000-8000-00805F9B34FB",
            KnownDevice::MaresBlueLink => "544E326B-5B72-C6B0-1C46-41C1BC448118",
        }
    }

    fn all() -> &'static [KnownDevice] {
        &[
            KnownDevice::Shearwater,
            KnownDevice::SuuntoEon,
            KnownDevice::MaresBlueLink,
        ]
    }
}

/// Match an advertised service identifier against the registry,
/// case-insensitively.
pub fn identify(advertised: &str) -> Option<KnownDevice> {
    KnownDevice::all()
        .iter()
        .copied()
        .find(|d| d.service_uuid().eq_ignore_ascii_case(advertised))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_case_insensitive() {
        let lower = identify("fe25c237-0ece-443c-b0aa-e02033e7029d");
        let upper = identify("FE25C237-0ECE-443C-B0AA-E02033E7029D");
        assert_eq!(lower, Some(KnownDevice::Shearwater));
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_identify_unknown() {
        assert_eq!(identify("00000000-0000-0000-0000-000000000000"), None);
        assert_eq!(identify(""), None);
    }

    #[test]
    fn test_registry_metadata() {
        let device = identify("0000fefb-0000-1000-8000-00805f9b34fb").unwrap();
        assert_eq!(device.vendor(), "Suunto");
        assert_eq!(device.product(), "EON Steel / EON Core");
    }
}
