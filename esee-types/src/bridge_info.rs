//! Bridge identity snapshot

use std::fmt;

use serde::{Deserialize, Serialize};

/// Network identity of the bridge and the channel the device should dial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeInfo {
    /// Host name of the machine running the bridge
    pub machine_name: String,

    /// First IPv4 address the host name resolves to
    pub ip_address: Option<String>,

    /// HTTP port of the bridge service
    pub bridge_service_port: u16,

    /// Serial channel assigned to the listening endpoint
    pub listener_port: u16,
}

impl fmt::Display for BridgeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bridge[{} ({}), HTTP: {}, channel: {}]",
            self.machine_name,
            self.ip_address.as_deref().unwrap_or("no IPv4"),
            self.bridge_service_port,
            self.listener_port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_info_json_shape() {
        let info = BridgeInfo {
            machine_name: "clinic-pc".into(),
            ip_address: None,
            bridge_service_port: 5200,
            listener_port: 4,
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "machineName": "clinic-pc",
                "ipAddress": null,
                "bridgeServicePort": 5200,
                "listenerPort": 4
            })
        );
    }
}
