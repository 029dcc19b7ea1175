//! Simulated LJM driver for testing without physical hardware.
//!
//! `MockLjm` keeps the whole device state in memory: a name-to-value
//! register map, array buffers for the UART and stream-out registers, and
//! software interval timing. It models just enough T-series behavior for
//! the toolkit's helpers to be exercised end to end:
//!
//! - writing `DACn_BINARY` updates `DACn`, and `AINn` mirrors `DACn`
//!   (the loopback wiring used by the calibration rig),
//! - `ASYNCH_TX_GO` latches the staged TX buffer into a transmit log,
//!   and queued RX frames are served through `ASYNCH_NUM_BYTES_RX` /
//!   `ASYNCH_DATA_RX`,
//! - intervals run on the host clock with skipped-boundary accounting,
//! - stream starts are recorded and echo back the requested scan rate.
//!
//! Every scalar register write is logged in order so tests can assert on
//! exact vendor call sequences.

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{DaqError, Result};

use super::{
    ConnectionType, DeviceHandle, DeviceType, HandleInfo, IntervalHandle, Ljm, RegisterAddress,
};

/// Parameters of a recorded `stream_start` call.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamStart {
    /// Scans per read requested.
    pub scans_per_read: i32,
    /// Scan-list addresses.
    pub scan_list: Vec<i32>,
    /// Requested scan rate in Hz.
    pub requested_rate_hz: f64,
}

#[derive(Debug)]
struct IntervalState {
    period: Duration,
    deadline: Instant,
}

#[derive(Debug, Default)]
struct MockState {
    next_handle: i32,
    open: HashMap<i32, DeviceType>,
    registers: HashMap<String, f64>,
    arrays: HashMap<String, Vec<f64>>,
    scalar_writes: Vec<(String, f64)>,
    tx_frames: Vec<Vec<u8>>,
    rx_frames: VecDeque<Vec<u8>>,
    intervals: HashMap<i32, IntervalState>,
    streaming: bool,
    stream_starts: Vec<StreamStart>,
}

/// In-memory stand-in for the vendor driver.
pub struct MockLjm {
    state: Mutex<MockState>,
    epoch: Instant,
}

impl Default for MockLjm {
    fn default() -> Self {
        MockLjm {
            state: Mutex::new(MockState::default()),
            epoch: Instant::now(),
        }
    }
}

fn ljm_err(code: i32, name: &str) -> DaqError {
    DaqError::Ljm {
        code,
        name: name.to_string(),
    }
}

/// Full-scale DAC output voltage on T-series devices.
const DAC_FULL_SCALE_VOLTS: f64 = 5.0;

impl MockLjm {
    /// Create a fresh simulated driver with no open devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset a register value.
    pub fn set_register(&self, name: &str, value: f64) {
        self.lock().registers.insert(name.to_string(), value);
    }

    /// Current value of a register, if it was ever written.
    pub fn register(&self, name: &str) -> Option<f64> {
        self.lock().registers.get(name).copied()
    }

    /// Contents of an array buffer register, if it was ever written.
    pub fn array(&self, name: &str) -> Option<Vec<f64>> {
        self.lock().arrays.get(name).cloned()
    }

    /// Every scalar register write, in call order.
    pub fn scalar_writes(&self) -> Vec<(String, f64)> {
        self.lock().scalar_writes.clone()
    }

    /// Frames latched by `ASYNCH_TX_GO`, in transmit order.
    pub fn transmitted_frames(&self) -> Vec<Vec<u8>> {
        self.lock().tx_frames.clone()
    }

    /// Queue a frame to be served by the next UART receive.
    pub fn push_rx_frame(&self, frame: &[u8]) {
        self.lock().rx_frames.push_back(frame.to_vec());
    }

    /// Whether a stream is currently running.
    pub fn stream_active(&self) -> bool {
        self.lock().streaming
    }

    /// Every `stream_start` call recorded so far.
    pub fn stream_starts(&self) -> Vec<StreamStart> {
        self.lock().stream_starts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // Mutex poisoning cannot happen in the single-threaded test usage
        // this mock is built for.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_open(state: &MockState, handle: DeviceHandle) -> Result<()> {
        if state.open.contains_key(&handle.0) {
            Ok(())
        } else {
            Err(ljm_err(ljm_sys::LJME_DEVICE_NOT_OPEN, "LJME_DEVICE_NOT_OPEN"))
        }
    }

    /// Apply the register side effects a real device would have.
    fn apply_write(state: &mut MockState, name: &str, value: f64) {
        state.scalar_writes.push((name.to_string(), value));
        state.registers.insert(name.to_string(), value);

        // DAC binary registers drive the float registers, and the
        // calibration rig wires each DAC back into the matching AIN.
        for n in 0..2 {
            if name == format!("DAC{n}_BINARY") {
                let volts = value / 65535.0 * DAC_FULL_SCALE_VOLTS;
                state.registers.insert(format!("DAC{n}"), volts);
                state.registers.insert(format!("AIN{n}"), volts);
            } else if name == format!("DAC{n}") {
                state.registers.insert(format!("AIN{n}"), value);
            }
        }

        if name == "ASYNCH_TX_GO" && value != 0.0 {
            let staged = state.arrays.get("ASYNCH_DATA_TX").cloned().unwrap_or_default();
            let count = state
                .registers
                .get("ASYNCH_NUM_BYTES_TX")
                .copied()
                .unwrap_or(0.0) as usize;
            let frame: Vec<u8> = staged
                .iter()
                .take(count)
                .map(|v| v.round().clamp(0.0, 255.0) as u8)
                .collect();
            state.tx_frames.push(frame);
        }
    }

    fn lookup(state: &mut MockState, name: &str) -> f64 {
        match name {
            "ASYNCH_NUM_BYTES_RX" => state
                .rx_frames
                .front()
                .map_or(0.0, |frame| frame.len() as f64),
            // Includes STREAM_OUT{n}_BUFFER_STATUS: 0 (fully consumed)
            // unless a test presets a backlog with set_register.
            _ => state.registers.get(name).copied().unwrap_or(0.0),
        }
    }
}

impl Ljm for MockLjm {
    fn open(
        &self,
        device_type: DeviceType,
        _connection_type: ConnectionType,
        _identifier: &str,
    ) -> Result<DeviceHandle> {
        let mut state = self.lock();
        state.next_handle += 1;
        let handle = state.next_handle;
        state.open.insert(handle, device_type);
        Ok(DeviceHandle(handle))
    }

    fn close(&self, handle: DeviceHandle) -> Result<()> {
        let mut state = self.lock();
        if state.open.remove(&handle.0).is_none() {
            return Err(ljm_err(ljm_sys::LJME_DEVICE_NOT_OPEN, "LJME_DEVICE_NOT_OPEN"));
        }
        Ok(())
    }

    fn handle_info(&self, handle: DeviceHandle) -> Result<HandleInfo> {
        let state = self.lock();
        Self::check_open(&state, handle)?;
        let device_type = state.open.get(&handle.0).copied();
        Ok(HandleInfo {
            device_type,
            connection_type: Some(ConnectionType::Usb),
            serial_number: 470_010_000 + handle.0,
            ip_address: Ipv4Addr::UNSPECIFIED,
            port: 0,
            max_bytes_per_packet: 64,
        })
    }

    fn read_name(&self, handle: DeviceHandle, name: &str) -> Result<f64> {
        let mut state = self.lock();
        Self::check_open(&state, handle)?;
        Ok(Self::lookup(&mut state, name))
    }

    fn write_name(&self, handle: DeviceHandle, name: &str, value: f64) -> Result<()> {
        let mut state = self.lock();
        Self::check_open(&state, handle)?;
        Self::apply_write(&mut state, name, value);
        Ok(())
    }

    fn read_names(&self, handle: DeviceHandle, names: &[String]) -> Result<Vec<f64>> {
        let mut state = self.lock();
        Self::check_open(&state, handle)?;
        Ok(names
            .iter()
            .map(|name| Self::lookup(&mut state, name))
            .collect())
    }

    fn write_names(&self, handle: DeviceHandle, names: &[String], values: &[f64]) -> Result<()> {
        if names.len() != values.len() {
            return Err(DaqError::LengthMismatch {
                expected: names.len(),
                provided: values.len(),
            });
        }
        let mut state = self.lock();
        Self::check_open(&state, handle)?;
        for (name, value) in names.iter().zip(values) {
            Self::apply_write(&mut state, name, *value);
        }
        Ok(())
    }

    fn read_name_array(&self, handle: DeviceHandle, name: &str, count: usize) -> Result<Vec<f64>> {
        let mut state = self.lock();
        Self::check_open(&state, handle)?;
        if name == "ASYNCH_DATA_RX" {
            let frame = state.rx_frames.pop_front().unwrap_or_default();
            let mut values: Vec<f64> = frame.iter().map(|b| f64::from(*b)).collect();
            values.resize(count, 0.0);
            return Ok(values);
        }
        let mut values = state.arrays.get(name).cloned().unwrap_or_default();
        values.resize(count, 0.0);
        Ok(values)
    }

    fn write_name_array(&self, handle: DeviceHandle, name: &str, values: &[f64]) -> Result<()> {
        let mut state = self.lock();
        Self::check_open(&state, handle)?;
        state.arrays.insert(name.to_string(), values.to_vec());
        Ok(())
    }

    fn name_to_address(&self, name: &str) -> Result<RegisterAddress> {
        // Addresses from the T-series Modbus map for the registers the
        // toolkit streams to; anything else gets a stable synthetic slot.
        let (address, data_type) = match name {
            "AIN0" => (0, 3),
            "AIN1" => (2, 3),
            "DAC0" => (1000, 3),
            "DAC1" => (1002, 3),
            "STREAM_OUT0" => (4800, 1),
            "STREAM_OUT1" => (4801, 1),
            "STREAM_OUT2" => (4802, 1),
            "STREAM_OUT3" => (4803, 1),
            other => {
                let sum: u32 = other.bytes().map(u32::from).sum();
                (50_000 + (sum % 10_000) as i32, 3)
            }
        };
        Ok(RegisterAddress { address, data_type })
    }

    fn stream_start(
        &self,
        handle: DeviceHandle,
        scans_per_read: i32,
        scan_list: &[i32],
        scan_rate_hz: f64,
    ) -> Result<f64> {
        let mut state = self.lock();
        Self::check_open(&state, handle)?;
        if state.streaming {
            return Err(ljm_err(ljm_sys::LJME_STREAM_IS_ACTIVE, "STREAM_IS_ACTIVE"));
        }
        state.streaming = true;
        state.stream_starts.push(StreamStart {
            scans_per_read,
            scan_list: scan_list.to_vec(),
            requested_rate_hz: scan_rate_hz,
        });
        Ok(scan_rate_hz)
    }

    fn stream_stop(&self, handle: DeviceHandle) -> Result<()> {
        let mut state = self.lock();
        Self::check_open(&state, handle)?;
        if !state.streaming {
            return Err(ljm_err(
                ljm_sys::LJME_STREAM_NOT_RUNNING,
                "STREAM_NOT_RUNNING",
            ));
        }
        state.streaming = false;
        Ok(())
    }

    fn start_interval(&self, interval: IntervalHandle, period: Duration) -> Result<()> {
        if period.is_zero() {
            return Err(DaqError::InvalidPeriod(period));
        }
        let mut state = self.lock();
        state.intervals.insert(
            interval.0,
            IntervalState {
                period,
                deadline: Instant::now() + period,
            },
        );
        Ok(())
    }

    fn wait_for_next_interval(&self, interval: IntervalHandle) -> Result<u32> {
        // Take the interval state out of the lock so the sleep does not
        // block other mock calls.
        let (period, deadline) = {
            let state = self.lock();
            let iv = state
                .intervals
                .get(&interval.0)
                .ok_or_else(|| ljm_err(ljm_sys::LJME_INVALID_HANDLE, "LJME_INVALID_HANDLE"))?;
            (iv.period, iv.deadline)
        };

        let now = Instant::now();
        let (skipped, next_deadline) = if now <= deadline {
            std::thread::sleep(deadline - now);
            (0u32, deadline + period)
        } else {
            let late = now - deadline;
            let skipped = (late.as_nanos() / period.as_nanos()) as u32;
            (skipped, deadline + period * (skipped + 1))
        };

        let mut state = self.lock();
        if let Some(iv) = state.intervals.get_mut(&interval.0) {
            iv.deadline = next_deadline;
        }
        Ok(skipped)
    }

    fn clean_interval(&self, interval: IntervalHandle) -> Result<()> {
        let mut state = self.lock();
        state
            .intervals
            .remove(&interval.0)
            .map(|_| ())
            .ok_or_else(|| ljm_err(ljm_sys::LJME_INVALID_HANDLE, "LJME_INVALID_HANDLE"))
    }

    fn host_tick_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn open_mock() -> (Arc<MockLjm>, DeviceHandle) {
        let ljm = Arc::new(MockLjm::new());
        let handle = ljm
            .open(DeviceType::T7, ConnectionType::Any, "ANY")
            .unwrap();
        (ljm, handle)
    }

    #[test]
    fn dac_binary_writes_reach_the_loopback_ain() {
        let (ljm, handle) = open_mock();
        ljm.write_name(handle, "DAC0_BINARY", 65535.0).unwrap();
        let volts = ljm.read_name(handle, "AIN0").unwrap();
        assert!((volts - 5.0).abs() < 1e-9);
    }

    #[test]
    fn closing_twice_reports_device_not_open() {
        let (ljm, handle) = open_mock();
        ljm.close(handle).unwrap();
        let err = ljm.close(handle).unwrap_err();
        assert!(err.is_device_not_open());
    }

    #[test]
    fn stream_stop_without_start_reports_not_running() {
        let (ljm, handle) = open_mock();
        let err = ljm.stream_stop(handle).unwrap_err();
        assert!(err.is_stream_not_running());
    }

    #[test]
    fn tx_go_latches_the_staged_frame() {
        let (ljm, handle) = open_mock();
        ljm.write_name(handle, "ASYNCH_NUM_BYTES_TX", 3.0).unwrap();
        ljm.write_name_array(handle, "ASYNCH_DATA_TX", &[1.0, 2.0, 3.0, 99.0])
            .unwrap();
        ljm.write_name(handle, "ASYNCH_TX_GO", 1.0).unwrap();
        assert_eq!(ljm.transmitted_frames(), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn interval_wait_blocks_until_the_deadline() {
        let (ljm, _) = open_mock();
        let interval = IntervalHandle::next();
        ljm.start_interval(interval, Duration::from_millis(20)).unwrap();
        let begin = Instant::now();
        ljm.wait_for_next_interval(interval).unwrap();
        assert!(begin.elapsed() >= Duration::from_millis(15));
        ljm.clean_interval(interval).unwrap();
    }

    #[test]
    fn late_wait_reports_skipped_boundaries() {
        let (ljm, _) = open_mock();
        let interval = IntervalHandle::next();
        ljm.start_interval(interval, Duration::from_millis(5)).unwrap();
        std::thread::sleep(Duration::from_millis(18));
        let skipped = ljm.wait_for_next_interval(interval).unwrap();
        assert!(skipped >= 1, "expected missed boundaries, got {skipped}");
        ljm.clean_interval(interval).unwrap();
    }
}
