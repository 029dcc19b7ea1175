//! Safe seam over the vendor LJM driver.
//!
//! Everything the toolkit asks of the vendor library goes through the
//! [`Ljm`] trait so the register, UART, interval, and stream helpers can be
//! exercised against simulated hardware. Two implementations are provided:
//!
//! - [`runtime::LjmRuntime`] calls the real driver through `ljm-sys`
//!   (requires the `hardware` feature to link the vendor runtime),
//! - [`mock::MockLjm`] keeps an in-memory register map with enough device
//!   behavior (DAC/AIN loopback, UART buffers, interval timing) for the
//!   test suite.
//!
//! All methods take `&self` so the trait stays object-safe behind
//! `Arc<dyn Ljm>`; implementations use internal mutability.

pub mod mock;
#[allow(unsafe_code)]
pub mod runtime;

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Handle to an opened LabJack device.
///
/// Wraps the raw `i32` handle from `ljm-sys` for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub i32);

/// Handle naming a vendor interval timer.
///
/// The driver keys its interval state on a caller-chosen integer;
/// [`IntervalHandle::next`] hands out process-unique values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalHandle(pub i32);

static NEXT_INTERVAL_HANDLE: AtomicI32 = AtomicI32::new(1);

impl IntervalHandle {
    /// Allocate a fresh interval handle, unique within this process.
    pub fn next() -> Self {
        IntervalHandle(NEXT_INTERVAL_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

/// LabJack device family selector, the `DeviceType` argument of
/// `LJM_OpenS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    /// Any supported device.
    #[default]
    Any,
    /// LabJack T4.
    T4,
    /// LabJack T7.
    T7,
    /// LabJack T8.
    T8,
    /// LabJack Digit logger.
    Digit,
}

impl DeviceType {
    /// Vendor string form ("ANY", "T4", ...).
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Any => "ANY",
            DeviceType::T4 => "T4",
            DeviceType::T7 => "T7",
            DeviceType::T8 => "T8",
            DeviceType::Digit => "DIGIT",
        }
    }

    /// Map the numeric device type reported by `LJM_GetHandleInfo`.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            ljm_sys::LJM_dtANY => Some(DeviceType::Any),
            ljm_sys::LJM_dtT4 => Some(DeviceType::T4),
            ljm_sys::LJM_dtT7 => Some(DeviceType::T7),
            ljm_sys::LJM_dtT8 => Some(DeviceType::T8),
            ljm_sys::LJM_dtDIGIT => Some(DeviceType::Digit),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport selector, the `ConnectionType` argument of `LJM_OpenS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionType {
    /// Any available transport.
    #[default]
    Any,
    /// USB.
    Usb,
    /// TCP (either wired or wireless).
    Tcp,
    /// Wired Ethernet.
    Ethernet,
    /// WiFi.
    Wifi,
}

impl ConnectionType {
    /// Vendor string form ("ANY", "USB", ...).
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionType::Any => "ANY",
            ConnectionType::Usb => "USB",
            ConnectionType::Tcp => "TCP",
            ConnectionType::Ethernet => "ETHERNET",
            ConnectionType::Wifi => "WIFI",
        }
    }

    /// Map the numeric connection type reported by `LJM_GetHandleInfo`.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            ljm_sys::LJM_ctANY => Some(ConnectionType::Any),
            ljm_sys::LJM_ctUSB => Some(ConnectionType::Usb),
            ljm_sys::LJM_ctTCP => Some(ConnectionType::Tcp),
            ljm_sys::LJM_ctETHERNET => Some(ConnectionType::Ethernet),
            ljm_sys::LJM_ctWIFI => Some(ConnectionType::Wifi),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection details reported for an open device.
#[derive(Debug, Clone)]
pub struct HandleInfo {
    /// Device family (raw vendor code, mapped where known).
    pub device_type: Option<DeviceType>,
    /// Transport in use.
    pub connection_type: Option<ConnectionType>,
    /// Device serial number.
    pub serial_number: i32,
    /// Device IP address (0.0.0.0 for USB connections).
    pub ip_address: Ipv4Addr,
    /// TCP port (0 for USB connections).
    pub port: i32,
    /// Maximum bytes per Modbus packet for this connection.
    pub max_bytes_per_packet: i32,
}

impl fmt::Display for HandleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "device type: {}, connection: {}, serial: {}, IP: {}, port: {}, max {} bytes per packet",
            self.device_type.map_or("unknown", DeviceType::as_str),
            self.connection_type.map_or("unknown", ConnectionType::as_str),
            self.serial_number,
            self.ip_address,
            self.port,
            self.max_bytes_per_packet,
        )
    }
}

/// Resolved Modbus location of a named register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterAddress {
    /// Modbus starting address.
    pub address: i32,
    /// Vendor data-type code for the register.
    pub data_type: i32,
}

/// The subset of the vendor driver the toolkit uses.
///
/// Register access is by name throughout, mirroring the LJM `eReadName`/
/// `eWriteName` surface; name-to-address resolution is only needed to build
/// stream scan lists.
pub trait Ljm: Send + Sync {
    /// Open (or claim) a device.
    fn open(
        &self,
        device_type: DeviceType,
        connection_type: ConnectionType,
        identifier: &str,
    ) -> Result<DeviceHandle>;

    /// Release a device handle.
    fn close(&self, handle: DeviceHandle) -> Result<()>;

    /// Connection details for an open handle.
    fn handle_info(&self, handle: DeviceHandle) -> Result<HandleInfo>;

    /// Read a single named register.
    fn read_name(&self, handle: DeviceHandle, name: &str) -> Result<f64>;

    /// Write a single named register.
    fn write_name(&self, handle: DeviceHandle, name: &str, value: f64) -> Result<()>;

    /// Read a batch of named registers in one transaction.
    fn read_names(&self, handle: DeviceHandle, names: &[String]) -> Result<Vec<f64>>;

    /// Write a batch of named registers in one transaction.
    ///
    /// `names` and `values` must be the same length.
    fn write_names(&self, handle: DeviceHandle, names: &[String], values: &[f64]) -> Result<()>;

    /// Read `count` consecutive values from a buffer register.
    fn read_name_array(&self, handle: DeviceHandle, name: &str, count: usize) -> Result<Vec<f64>>;

    /// Write consecutive values to a buffer register.
    fn write_name_array(&self, handle: DeviceHandle, name: &str, values: &[f64]) -> Result<()>;

    /// Resolve a register name to its Modbus address.
    fn name_to_address(&self, name: &str) -> Result<RegisterAddress>;

    /// Start a hardware stream over `scan_list` at `scan_rate_hz`.
    ///
    /// Returns the actual scan rate chosen by the device, which may differ
    /// from the requested rate.
    fn stream_start(
        &self,
        handle: DeviceHandle,
        scans_per_read: i32,
        scan_list: &[i32],
        scan_rate_hz: f64,
    ) -> Result<f64>;

    /// Stop a running stream.
    fn stream_stop(&self, handle: DeviceHandle) -> Result<()>;

    /// Begin a repeating interval timer with the given period.
    fn start_interval(&self, interval: IntervalHandle, period: Duration) -> Result<()>;

    /// Block until the next interval boundary; returns the number of
    /// boundaries that were missed since the last wait.
    fn wait_for_next_interval(&self, interval: IntervalHandle) -> Result<u32>;

    /// Release interval timer state.
    fn clean_interval(&self, interval: IntervalHandle) -> Result<()>;

    /// Host clock in microseconds (vendor `LJM_GetHostTick`).
    fn host_tick_us(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_handles_are_unique() {
        let a = IntervalHandle::next();
        let b = IntervalHandle::next();
        assert_ne!(a, b);
    }

    #[test]
    fn device_type_round_trips_through_raw() {
        for dt in [
            DeviceType::Any,
            DeviceType::T4,
            DeviceType::T7,
            DeviceType::T8,
            DeviceType::Digit,
        ] {
            let raw = match dt {
                DeviceType::Any => ljm_sys::LJM_dtANY,
                DeviceType::T4 => ljm_sys::LJM_dtT4,
                DeviceType::T7 => ljm_sys::LJM_dtT7,
                DeviceType::T8 => ljm_sys::LJM_dtT8,
                DeviceType::Digit => ljm_sys::LJM_dtDIGIT,
            };
            assert_eq!(DeviceType::from_raw(raw), Some(dt));
        }
    }

    #[test]
    fn handle_info_display_mentions_serial() {
        let info = HandleInfo {
            device_type: Some(DeviceType::T7),
            connection_type: Some(ConnectionType::Usb),
            serial_number: 470010123,
            ip_address: Ipv4Addr::UNSPECIFIED,
            port: 0,
            max_bytes_per_packet: 64,
        };
        let text = info.to_string();
        assert!(text.contains("T7"));
        assert!(text.contains("470010123"));
    }
}
