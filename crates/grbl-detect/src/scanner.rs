//! Serial port scanner
//!
//! This module enumerates serial ports and picks the first one whose
//! description looks like the USB serial bridge of a GRBL board.

use serde::Serialize;
use serialport::{available_ports, SerialPortType};
use tracing::{debug, info};

use crate::error::DetectError;

/// Description of a serial endpoint as reported by the operating system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// Free-text description used for matching
    pub description: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
}

impl DeviceDescriptor {
    /// Create a descriptor from a port name and description
    pub fn new(port: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            description: description.into(),
            vid: None,
            pid: None,
        }
    }

    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => {
                let description = match (usb.manufacturer.as_deref(), usb.product.as_deref()) {
                    (Some(manufacturer), Some(product)) => format!("{} {}", manufacturer, product),
                    (Some(text), None) | (None, Some(text)) => text.to_string(),
                    (None, None) => name.clone(),
                };
                Self {
                    port: name,
                    description,
                    vid: Some(usb.vid),
                    pid: Some(usb.pid),
                }
            }
            // No strings to go on; Bluetooth SPP modules only identify in the name
            SerialPortType::PciPort | SerialPortType::BluetoothPort | SerialPortType::Unknown => {
                Self::new(name.clone(), name)
            }
        }
    }
}

/// Returns true if the descriptor looks like a GRBL-class board
///
/// Matching is on the lowercased description, except for `CDC`, which is
/// matched case-sensitively against the description as reported.
pub fn is_grbl_candidate(descriptor: &DeviceDescriptor) -> bool {
    let desc = descriptor.description.to_lowercase();

    let is_usb_serial = desc.contains("usb") && desc.contains("serial");
    let is_arduino = desc.contains("arduino");
    let is_cdc = descriptor.description.contains("CDC");
    let is_linvor = desc.contains("linvor");

    is_usb_serial || is_arduino || is_cdc || is_linvor
}

/// Source of serial port descriptors
pub trait PortSource {
    /// List ports in enumeration order
    fn list_ports(&self) -> Result<Vec<DeviceDescriptor>, DetectError>;
}

/// Ports reported by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl PortSource for SystemPorts {
    fn list_ports(&self) -> Result<Vec<DeviceDescriptor>, DetectError> {
        let ports = available_ports().map_err(DetectError::EnumerationFailed)?;

        Ok(ports
            .into_iter()
            .map(|p| DeviceDescriptor::from_serialport(p.port_name, &p.port_type))
            .collect())
    }
}

impl PortSource for Vec<DeviceDescriptor> {
    fn list_ports(&self) -> Result<Vec<DeviceDescriptor>, DetectError> {
        Ok(self.clone())
    }
}

/// Serial port scanner
pub struct PortScanner<S = SystemPorts> {
    source: S,
}

impl PortScanner {
    /// Create a scanner over the system's serial ports
    pub fn new() -> Self {
        Self {
            source: SystemPorts,
        }
    }
}

impl<S: PortSource> PortScanner<S> {
    /// Create a scanner over a custom port source
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    /// Enumerate all available serial ports
    pub fn enumerate_ports(&self) -> Result<Vec<DeviceDescriptor>, DetectError> {
        info!("Enumerating serial ports...");
        let ports = self.source.list_ports()?;

        if ports.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", ports.len());
            for port in &ports {
                info!("  {} - {}", port.port, port.description);
            }
        }

        Ok(ports)
    }

    /// Find the first port that looks like a GRBL board
    ///
    /// Enumeration failure is treated the same as finding nothing.
    pub fn find_port(&self) -> Option<String> {
        let ports = match self.enumerate_ports() {
            Ok(ports) => ports,
            Err(e) => {
                debug!("Port enumeration unavailable: {}", e);
                return None;
            }
        };

        let found = ports.into_iter().find(is_grbl_candidate).map(|p| p.port);
        match &found {
            Some(port) => info!("Candidate GRBL port: {}", port),
            None => info!("No GRBL candidate among serial ports"),
        }
        found
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}
