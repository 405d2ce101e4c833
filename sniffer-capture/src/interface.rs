//! Network interface enumeration and lookup

use pcap::Device;
use pnet_datalink::{self, NetworkInterface};
use sniffer_core::{Error, MacAddr, Result};
use std::net::IpAddr;
use tracing::debug;

/// Information about a network interface
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    /// Interface name (e.g., "eth0", "wlan0")
    pub name: String,
    /// Human-readable description
    pub description: String,
    pub mac: Option<MacAddr>,
    /// Addresses assigned to this interface
    pub ips: Vec<IpAddr>,
    pub is_up: bool,
    pub is_loopback: bool,
}

impl From<&NetworkInterface> for InterfaceInfo {
    fn from(iface: &NetworkInterface) -> Self {
        let mac = iface
            .mac
            .map(|mac| MacAddr([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]));

        InterfaceInfo {
            name: iface.name.clone(),
            description: iface.description.clone(),
            mac,
            ips: iface.ips.iter().map(|network| network.ip()).collect(),
            is_up: iface.is_up(),
            is_loopback: iface.is_loopback(),
        }
    }
}

impl From<&Device> for InterfaceInfo {
    fn from(device: &Device) -> Self {
        InterfaceInfo {
            name: device.name.clone(),
            description: device.desc.clone().unwrap_or_default(),
            mac: None,
            ips: device.addresses.iter().map(|address| address.addr).collect(),
            is_up: device.flags.is_up(),
            is_loopback: device.flags.is_loopback(),
        }
    }
}

/// List all network interfaces visible to this process
pub fn list_interfaces() -> Vec<InterfaceInfo> {
    pnet_datalink::interfaces()
        .iter()
        .map(InterfaceInfo::from)
        .collect()
}

/// Get information about a specific interface by name
pub fn get_interface(name: &str) -> Result<InterfaceInfo> {
    pnet_datalink::interfaces()
        .iter()
        .find(|iface| iface.name == name)
        .map(InterfaceInfo::from)
        .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
}

/// Look up an interface that can be opened for capture
///
/// Names the OS lists must be up, otherwise [`Error::Capture`]. Names only
/// pcap knows (pseudo-devices such as `any`) are left to pcap to open. A name
/// neither knows is [`Error::InterfaceNotFound`].
pub fn resolve_interface(name: &str) -> Result<InterfaceInfo> {
    let devices: Vec<InterfaceInfo> = match Device::list() {
        Ok(devices) => devices.iter().map(InterfaceInfo::from).collect(),
        Err(e) => {
            debug!(error = %e, "pcap device list unavailable");
            Vec::new()
        }
    };
    select_interface(name, &list_interfaces(), &devices)
}

fn select_interface(
    name: &str,
    system: &[InterfaceInfo],
    pcap_devices: &[InterfaceInfo],
) -> Result<InterfaceInfo> {
    if let Some(info) = system.iter().find(|iface| iface.name == name) {
        if !info.is_up {
            return Err(Error::capture(format!("Interface '{}' is not up", name)));
        }
        return Ok(info.clone());
    }

    match pcap_devices.iter().find(|device| device.name == name) {
        Some(device) => {
            debug!(interface = name, "Interface known only to pcap");
            Ok(device.clone())
        }
        None => Err(Error::InterfaceNotFound(name.to_string())),
    }
}
