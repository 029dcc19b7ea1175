//! Vendor-backed implementation of the [`Ljm`] trait.
//!
//! Thin translation layer: every method converts Rust arguments to the C
//! forms `ljm-sys` expects, makes one driver call, and checks the returned
//! error code. Without the `hardware` feature the underlying symbols are
//! the `ljm-sys` panic stubs, so this type is only usable on machines with
//! the vendor runtime installed; tests run against
//! [`MockLjm`](super::mock::MockLjm) instead.

use std::ffi::{CStr, CString};
use std::net::Ipv4Addr;
use std::os::raw::c_char;
use std::time::Duration;

use crate::error::{DaqError, Result};

use super::{
    ConnectionType, DeviceHandle, DeviceType, HandleInfo, IntervalHandle, Ljm, RegisterAddress,
};

/// `Ljm` implementation calling the real LabJackM library.
#[derive(Debug, Default)]
pub struct LjmRuntime;

impl LjmRuntime {
    /// Create a new vendor-backed driver handle.
    pub fn new() -> Self {
        LjmRuntime
    }
}

/// Translate an LJM return code into a `Result`.
fn check(code: i32) -> Result<()> {
    if code == ljm_sys::LJME_NOERROR {
        Ok(())
    } else {
        Err(DaqError::Ljm {
            code,
            name: error_name(code),
        })
    }
}

/// Look up the vendor's symbolic name for an error code.
fn error_name(code: i32) -> String {
    let mut buf = [0 as c_char; ljm_sys::LJM_MAX_NAME_SIZE];
    unsafe {
        ljm_sys::LJM_ErrorToString(code, buf.as_mut_ptr());
        CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned()
    }
}

/// Register names cross the FFI boundary as C strings; interior NULs can
/// only come from a caller bug, surfaced as a configuration error.
fn cstring(name: &str) -> Result<CString> {
    CString::new(name)
        .map_err(|_| DaqError::Configuration(format!("register name {name:?} contains NUL")))
}

impl Ljm for LjmRuntime {
    fn open(
        &self,
        device_type: DeviceType,
        connection_type: ConnectionType,
        identifier: &str,
    ) -> Result<DeviceHandle> {
        let device_type = cstring(device_type.as_str())?;
        let connection_type = cstring(connection_type.as_str())?;
        let identifier = cstring(identifier)?;
        let mut handle = 0i32;
        check(unsafe {
            ljm_sys::LJM_OpenS(
                device_type.as_ptr(),
                connection_type.as_ptr(),
                identifier.as_ptr(),
                &mut handle,
            )
        })?;
        Ok(DeviceHandle(handle))
    }

    fn close(&self, handle: DeviceHandle) -> Result<()> {
        check(unsafe { ljm_sys::LJM_Close(handle.0) })
    }

    fn handle_info(&self, handle: DeviceHandle) -> Result<HandleInfo> {
        let mut device_type = 0i32;
        let mut connection_type = 0i32;
        let mut serial_number = 0i32;
        let mut ip_address = 0i32;
        let mut port = 0i32;
        let mut max_bytes = 0i32;
        check(unsafe {
            ljm_sys::LJM_GetHandleInfo(
                handle.0,
                &mut device_type,
                &mut connection_type,
                &mut serial_number,
                &mut ip_address,
                &mut port,
                &mut max_bytes,
            )
        })?;
        Ok(HandleInfo {
            device_type: DeviceType::from_raw(device_type),
            connection_type: ConnectionType::from_raw(connection_type),
            serial_number,
            ip_address: Ipv4Addr::from(ip_address as u32),
            port,
            max_bytes_per_packet: max_bytes,
        })
    }

    fn read_name(&self, handle: DeviceHandle, name: &str) -> Result<f64> {
        let name = cstring(name)?;
        let mut value = 0f64;
        check(unsafe { ljm_sys::LJM_eReadName(handle.0, name.as_ptr(), &mut value) })?;
        Ok(value)
    }

    fn write_name(&self, handle: DeviceHandle, name: &str, value: f64) -> Result<()> {
        let name = cstring(name)?;
        check(unsafe { ljm_sys::LJM_eWriteName(handle.0, name.as_ptr(), value) })
    }

    fn read_names(&self, handle: DeviceHandle, names: &[String]) -> Result<Vec<f64>> {
        let cstrings = names.iter().map(|n| cstring(n)).collect::<Result<Vec<_>>>()?;
        let ptrs: Vec<*const c_char> = cstrings.iter().map(|c| c.as_ptr()).collect();
        let mut values = vec![0f64; names.len()];
        let mut error_address = -1i32;
        check(unsafe {
            ljm_sys::LJM_eReadNames(
                handle.0,
                names.len() as i32,
                ptrs.as_ptr(),
                values.as_mut_ptr(),
                &mut error_address,
            )
        })?;
        Ok(values)
    }

    fn write_names(&self, handle: DeviceHandle, names: &[String], values: &[f64]) -> Result<()> {
        if names.len() != values.len() {
            return Err(DaqError::LengthMismatch {
                expected: names.len(),
                provided: values.len(),
            });
        }
        let cstrings = names.iter().map(|n| cstring(n)).collect::<Result<Vec<_>>>()?;
        let ptrs: Vec<*const c_char> = cstrings.iter().map(|c| c.as_ptr()).collect();
        let mut error_address = -1i32;
        check(unsafe {
            ljm_sys::LJM_eWriteNames(
                handle.0,
                names.len() as i32,
                ptrs.as_ptr(),
                values.as_ptr(),
                &mut error_address,
            )
        })
    }

    fn read_name_array(&self, handle: DeviceHandle, name: &str, count: usize) -> Result<Vec<f64>> {
        let name = cstring(name)?;
        let mut values = vec![0f64; count];
        let mut error_address = -1i32;
        check(unsafe {
            ljm_sys::LJM_eReadNameArray(
                handle.0,
                name.as_ptr(),
                count as i32,
                values.as_mut_ptr(),
                &mut error_address,
            )
        })?;
        Ok(values)
    }

    fn write_name_array(&self, handle: DeviceHandle, name: &str, values: &[f64]) -> Result<()> {
        let name = cstring(name)?;
        let mut error_address = -1i32;
        check(unsafe {
            ljm_sys::LJM_eWriteNameArray(
                handle.0,
                name.as_ptr(),
                values.len() as i32,
                values.as_ptr(),
                &mut error_address,
            )
        })
    }

    fn name_to_address(&self, name: &str) -> Result<RegisterAddress> {
        let name = cstring(name)?;
        let mut address = 0i32;
        let mut data_type = 0i32;
        check(unsafe { ljm_sys::LJM_NameToAddress(name.as_ptr(), &mut address, &mut data_type) })?;
        Ok(RegisterAddress { address, data_type })
    }

    fn stream_start(
        &self,
        handle: DeviceHandle,
        scans_per_read: i32,
        scan_list: &[i32],
        scan_rate_hz: f64,
    ) -> Result<f64> {
        let mut rate = scan_rate_hz;
        check(unsafe {
            ljm_sys::LJM_eStreamStart(
                handle.0,
                scans_per_read,
                scan_list.len() as i32,
                scan_list.as_ptr(),
                &mut rate,
            )
        })?;
        Ok(rate)
    }

    fn stream_stop(&self, handle: DeviceHandle) -> Result<()> {
        check(unsafe { ljm_sys::LJM_eStreamStop(handle.0) })
    }

    fn start_interval(&self, interval: IntervalHandle, period: Duration) -> Result<()> {
        let micros = i32::try_from(period.as_micros())
            .map_err(|_| DaqError::InvalidPeriod(period))?;
        if micros <= 0 {
            return Err(DaqError::InvalidPeriod(period));
        }
        check(unsafe { ljm_sys::LJM_StartInterval(interval.0, micros) })
    }

    fn wait_for_next_interval(&self, interval: IntervalHandle) -> Result<u32> {
        let mut skipped = 0i32;
        check(unsafe { ljm_sys::LJM_WaitForNextInterval(interval.0, &mut skipped) })?;
        Ok(skipped.max(0) as u32)
    }

    fn clean_interval(&self, interval: IntervalHandle) -> Result<()> {
        check(unsafe { ljm_sys::LJM_CleanInterval(interval.0) })
    }

    fn host_tick_us(&self) -> u64 {
        unsafe { ljm_sys::LJM_GetHostTick() }
    }
}
