//! # Port Locator
//!
//! Best-effort discovery of the sensor node among enumerated serial
//! devices. The match is a case-sensitive substring check of USB
//! descriptor strings; when several devices match, the first one in
//! enumeration order wins, and that order is host-OS-dependent. This is
//! a documented policy, not a bug.

use tokio_serial::{SerialPortInfo, SerialPortType};
use tracing::{debug, info};

use crate::error::{Result, VaultError};

/// Device-description substrings that identify the sensor node, in
/// priority order (case-sensitive)
pub const DEVICE_HINTS: &[&str] = &["Arduino", "USB-SERIAL"];

/// Enumerate serial devices and pick the best candidate.
///
/// Returns `Ok(None)` when the host has no serial ports at all.
///
/// # Errors
///
/// Returns error if enumeration itself fails
pub fn select_port() -> Result<Option<String>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| VaultError::Serial(format!("Failed to enumerate ports: {}", e)))?;

    let selected = pick(&ports).map(|p| p.port_name.clone());
    match &selected {
        Some(name) => info!("Selected serial port {}", name),
        None => debug!("No serial ports present"),
    }
    Ok(selected)
}

/// Pure selection policy over an enumeration snapshot.
///
/// The first port whose USB descriptor matches a hint wins; with no match
/// the first enumerated port is the fallback; an empty snapshot yields
/// `None`.
pub fn pick(ports: &[SerialPortInfo]) -> Option<&SerialPortInfo> {
    ports
        .iter()
        .find(|port| match &port.port_type {
            SerialPortType::UsbPort(info) => {
                DEVICE_HINTS.iter().any(|hint| {
                    info.product.as_deref().is_some_and(|p| p.contains(hint))
                        || info.manufacturer.as_deref().is_some_and(|m| m.contains(hint))
                })
            }
            _ => false,
        })
        .or_else(|| ports.first())
}
