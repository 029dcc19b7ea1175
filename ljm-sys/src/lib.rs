//! Low-level FFI bindings for the LabJack LJM driver library.
//!
//! This crate provides raw, unsafe bindings to LabJackM, the vendor
//! user-space driver for LabJack T-series devices (T4, T7, T8). LJM exposes
//! the device's Modbus register map by name (`"DAC0"`, `"AIN0"`,
//! `"STREAM_OUT0_BUFFER_U16"`, ...) together with timing and stream
//! primitives.
//!
//! # Safety
//!
//! All functions in this crate are `unsafe` as they are direct FFI bindings.
//! For a safe wrapper, use the `labjack-daq` crate instead.
//!
//! # Features
//!
//! - `ljm-sdk`: Link against the installed LabJackM shared library. Without
//!   this feature, panicking stubs with the same symbols are compiled so
//!   dependent crates build and run their mock-backed tests on machines
//!   without the vendor runtime.

#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

use std::os::raw::{c_char, c_double, c_int, c_ulonglong};

/// Buffer size expected by `LJM_ErrorToString` and the name-based calls.
pub const LJM_MAX_NAME_SIZE: usize = 256;

// Device types (LJM_OpenS "DeviceType" argument, numeric form)
pub const LJM_dtANY: c_int = 0;
pub const LJM_dtT4: c_int = 4;
pub const LJM_dtT7: c_int = 7;
pub const LJM_dtT8: c_int = 8;
pub const LJM_dtDIGIT: c_int = 200;

// Connection types
pub const LJM_ctANY: c_int = 0;
pub const LJM_ctUSB: c_int = 1;
pub const LJM_ctTCP: c_int = 2;
pub const LJM_ctETHERNET: c_int = 3;
pub const LJM_ctWIFI: c_int = 4;

// Library error codes inspected by the toolkit
pub const LJME_NOERROR: c_int = 0;
pub const LJME_UNKNOWN_ERROR: c_int = 1221;
pub const LJME_INVALID_DEVICE_TYPE: c_int = 1222;
pub const LJME_INVALID_HANDLE: c_int = 1223;
pub const LJME_DEVICE_NOT_OPEN: c_int = 1224;

// T-series device error codes surfaced through LJM
pub const LJME_STREAM_IS_ACTIVE: c_int = 2605;
pub const LJME_STREAM_NOT_RUNNING: c_int = 2620;

#[cfg(feature = "ljm-sdk")]
extern "C" {
    pub fn LJM_OpenS(
        DeviceType: *const c_char,
        ConnectionType: *const c_char,
        Identifier: *const c_char,
        Handle: *mut c_int,
    ) -> c_int;

    pub fn LJM_Open(
        DeviceType: c_int,
        ConnectionType: c_int,
        Identifier: *const c_char,
        Handle: *mut c_int,
    ) -> c_int;

    pub fn LJM_Close(Handle: c_int) -> c_int;

    pub fn LJM_CloseAll() -> c_int;

    pub fn LJM_GetHandleInfo(
        Handle: c_int,
        DeviceType: *mut c_int,
        ConnectionType: *mut c_int,
        SerialNumber: *mut c_int,
        IPAddress: *mut c_int,
        Port: *mut c_int,
        MaxBytesPerMB: *mut c_int,
    ) -> c_int;

    pub fn LJM_eReadName(Handle: c_int, Name: *const c_char, Value: *mut c_double) -> c_int;

    pub fn LJM_eWriteName(Handle: c_int, Name: *const c_char, Value: c_double) -> c_int;

    pub fn LJM_eReadNames(
        Handle: c_int,
        NumFrames: c_int,
        aNames: *const *const c_char,
        aValues: *mut c_double,
        ErrorAddress: *mut c_int,
    ) -> c_int;

    pub fn LJM_eWriteNames(
        Handle: c_int,
        NumFrames: c_int,
        aNames: *const *const c_char,
        aValues: *const c_double,
        ErrorAddress: *mut c_int,
    ) -> c_int;

    pub fn LJM_eReadNameArray(
        Handle: c_int,
        Name: *const c_char,
        NumValues: c_int,
        aValues: *mut c_double,
        ErrorAddress: *mut c_int,
    ) -> c_int;

    pub fn LJM_eWriteNameArray(
        Handle: c_int,
        Name: *const c_char,
        NumValues: c_int,
        aValues: *const c_double,
        ErrorAddress: *mut c_int,
    ) -> c_int;

    pub fn LJM_NameToAddress(Name: *const c_char, Address: *mut c_int, Type: *mut c_int) -> c_int;

    pub fn LJM_eStreamStart(
        Handle: c_int,
        ScansPerRead: c_int,
        NumAddresses: c_int,
        aScanList: *const c_int,
        ScanRate: *mut c_double,
    ) -> c_int;

    pub fn LJM_eStreamStop(Handle: c_int) -> c_int;

    pub fn LJM_StartInterval(IntervalHandle: c_int, Microseconds: c_int) -> c_int;

    pub fn LJM_WaitForNextInterval(IntervalHandle: c_int, SkippedIntervals: *mut c_int) -> c_int;

    pub fn LJM_CleanInterval(IntervalHandle: c_int) -> c_int;

    pub fn LJM_GetHostTick() -> c_ulonglong;

    pub fn LJM_ErrorToString(ErrorCode: c_int, ErrorString: *mut c_char);
}

// Panic stub implementations - these allow linking to succeed but will panic
// at runtime if called without the ljm-sdk feature enabled.
//
// This is intentional: it allows the workspace to build and test on systems
// without the vendor LJM runtime installed, while still catching any
// accidental usage at runtime.
#[cfg(not(feature = "ljm-sdk"))]
mod stubs {
    use super::*;

    const LJM_SDK_PANIC_MSG: &str = "LJM function called but the ljm-sdk feature is not enabled. \
        Enable the ljm-sdk feature (or `hardware` in labjack-daq) to use the vendor library.";

    pub unsafe extern "C" fn LJM_OpenS(
        _device_type: *const c_char,
        _connection_type: *const c_char,
        _identifier: *const c_char,
        _handle: *mut c_int,
    ) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_Open(
        _device_type: c_int,
        _connection_type: c_int,
        _identifier: *const c_char,
        _handle: *mut c_int,
    ) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_Close(_handle: c_int) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_CloseAll() -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_GetHandleInfo(
        _handle: c_int,
        _device_type: *mut c_int,
        _connection_type: *mut c_int,
        _serial_number: *mut c_int,
        _ip_address: *mut c_int,
        _port: *mut c_int,
        _max_bytes_per_mb: *mut c_int,
    ) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_eReadName(
        _handle: c_int,
        _name: *const c_char,
        _value: *mut c_double,
    ) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_eWriteName(
        _handle: c_int,
        _name: *const c_char,
        _value: c_double,
    ) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_eReadNames(
        _handle: c_int,
        _num_frames: c_int,
        _names: *const *const c_char,
        _values: *mut c_double,
        _error_address: *mut c_int,
    ) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_eWriteNames(
        _handle: c_int,
        _num_frames: c_int,
        _names: *const *const c_char,
        _values: *const c_double,
        _error_address: *mut c_int,
    ) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_eReadNameArray(
        _handle: c_int,
        _name: *const c_char,
        _num_values: c_int,
        _values: *mut c_double,
        _error_address: *mut c_int,
    ) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_eWriteNameArray(
        _handle: c_int,
        _name: *const c_char,
        _num_values: c_int,
        _values: *const c_double,
        _error_address: *mut c_int,
    ) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_NameToAddress(
        _name: *const c_char,
        _address: *mut c_int,
        _type: *mut c_int,
    ) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_eStreamStart(
        _handle: c_int,
        _scans_per_read: c_int,
        _num_addresses: c_int,
        _scan_list: *const c_int,
        _scan_rate: *mut c_double,
    ) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_eStreamStop(_handle: c_int) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_StartInterval(
        _interval_handle: c_int,
        _microseconds: c_int,
    ) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_WaitForNextInterval(
        _interval_handle: c_int,
        _skipped_intervals: *mut c_int,
    ) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_CleanInterval(_interval_handle: c_int) -> c_int {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_GetHostTick() -> c_ulonglong {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }

    pub unsafe extern "C" fn LJM_ErrorToString(_error_code: c_int, _error_string: *mut c_char) {
        panic!("{}", LJM_SDK_PANIC_MSG);
    }
}

#[cfg(not(feature = "ljm-sdk"))]
pub use stubs::*;
