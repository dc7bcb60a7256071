//! Mock device synthesis, §4.9: "if no real devices found and mock mode
//! enabled, synthesizes one mock device".

use super::DeviceRecord;
use std::collections::BTreeMap;

/// Builds a deterministic mock device record for `service_name`, used when
/// discovery's scan window finds nothing real and mock mode is enabled.
pub fn mock_device_record(service_name: &str) -> DeviceRecord {
    let mut device_info = BTreeMap::new();
    device_info.insert("model".to_string(), "mock".to_string());
    device_info.insert("service".to_string(), service_name.to_string());

    DeviceRecord {
        id: "mock-device-0".to_string(),
        name: "Mock Device".to_string(),
        address: "127.0.0.1".to_string(),
        port: 8080,
        capabilities: vec!["gaze".to_string(), "video".to_string()],
        device_info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_record_is_stable() {
        let a = mock_device_record("_pupil-mobile._tcp");
        let b = mock_device_record("_pupil-mobile._tcp");
        assert_eq!(a, b);
    }
}
