//! Waveform playback through the hardware stream-out engine.
//!
//! Stream-out plays a buffered waveform to an output register (a DAC) at a
//! fixed scan rate. Each target gets one of the device's `STREAM_OUT{n}`
//! slots: a 2^14-byte buffer, a target address, and loop settings. The
//! scan list handed to `eStreamStart` contains the `STREAM_OUT{n}`
//! addresses, one value pulled per scan per target.
//!
//! Starting the stream does not block in hardware; [`StreamOut::start`]
//! sleeps out the computed playback time (plus a 2% margin) so it returns
//! once playback has finished.
//!
//! Stream-in is not supported; the rigs only play waveforms out.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{DaqError, Result};
use crate::ljm::{DeviceHandle, Ljm};

/// Size of each `STREAM_OUT{n}` buffer in bytes (the hardware maximum).
pub const MAX_BUFFER_BYTES: usize = 1 << 14;

/// Number of `STREAM_OUT{n}` slots on T-series devices.
pub const MAX_TARGETS: usize = 4;

/// On-buffer sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Raw 16-bit values via `STREAM_OUT{n}_BUFFER_U16`.
    U16,
    /// Floating-point values via `STREAM_OUT{n}_BUFFER_F32`.
    F32,
}

impl SampleFormat {
    fn buffer_register(self, target: usize) -> String {
        match self {
            SampleFormat::U16 => format!("STREAM_OUT{target}_BUFFER_U16"),
            SampleFormat::F32 => format!("STREAM_OUT{target}_BUFFER_F32"),
        }
    }

    /// Bytes one sample occupies in the buffer.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U16 => 2,
            SampleFormat::F32 => 4,
        }
    }

    /// Longest waveform the buffer can hold in this format.
    pub fn max_samples(self) -> usize {
        MAX_BUFFER_BYTES / self.bytes_per_sample()
    }
}

/// Buffer allocation for a waveform: the smallest power of two with one
/// doubling of headroom above the waveform's byte length, capped at the
/// hardware buffer size. Errors when the waveform cannot fit at all.
pub fn buffer_bytes_for(samples: usize, format: SampleFormat) -> Result<usize> {
    if samples == 0 {
        return Err(DaqError::Configuration(
            "stream-out waveform is empty".into(),
        ));
    }
    if samples > format.max_samples() {
        return Err(DaqError::WaveformTooLong {
            samples,
            max: format.max_samples(),
        });
    }
    let needed = samples * format.bytes_per_sample();
    Ok((needed.next_power_of_two() * 2).min(MAX_BUFFER_BYTES))
}

/// Stream-out over a fixed set of target registers.
pub struct StreamOut {
    ljm: Arc<dyn Ljm>,
    handle: DeviceHandle,
    out_names: Vec<String>,
    loaded_lengths: Vec<usize>,
}

impl StreamOut {
    /// Stream-out helper over `out_names`, one `STREAM_OUT{n}` slot each.
    pub fn new(ljm: Arc<dyn Ljm>, handle: DeviceHandle, out_names: &[&str]) -> Result<Self> {
        if out_names.is_empty() || out_names.len() > MAX_TARGETS {
            return Err(DaqError::Configuration(format!(
                "stream-out needs between 1 and {MAX_TARGETS} targets, got {}",
                out_names.len()
            )));
        }
        Ok(StreamOut {
            ljm,
            handle,
            out_names: out_names.iter().map(|s| s.to_string()).collect(),
            loaded_lengths: Vec::new(),
        })
    }

    /// Like [`StreamOut::new`], but also resets the stream configuration
    /// to the defaults this helper assumes.
    pub fn with_reset(ljm: Arc<dyn Ljm>, handle: DeviceHandle, out_names: &[&str]) -> Result<Self> {
        let stream = Self::new(ljm, handle, out_names)?;
        stream.reset()?;
        Ok(stream)
    }

    /// Target register names.
    pub fn out_names(&self) -> &[String] {
        &self.out_names
    }

    /// Modbus addresses of the target registers.
    pub fn target_addresses(&self) -> Result<Vec<i32>> {
        self.out_names
            .iter()
            .map(|name| Ok(self.ljm.name_to_address(name)?.address))
            .collect()
    }

    /// Addresses of the `STREAM_OUT{n}` slots, one per target; this is the
    /// scan list handed to `eStreamStart`.
    pub fn scan_list(&self) -> Result<Vec<i32>> {
        (0..self.out_names.len())
            .map(|n| {
                Ok(self
                    .ljm
                    .name_to_address(&format!("STREAM_OUT{n}"))?
                    .address)
            })
            .collect()
    }

    /// Reset stream configuration for plain internally-clocked stream-out:
    /// no settling, default resolution, internal clock, no trigger.
    pub fn reset(&self) -> Result<()> {
        self.ljm.write_name(self.handle, "STREAM_SETTLING_US", 0.0)?;
        self.ljm
            .write_name(self.handle, "STREAM_RESOLUTION_INDEX", 0.0)?;
        self.ljm.write_name(self.handle, "STREAM_CLOCK_SOURCE", 0.0)?;
        self.ljm.write_name(self.handle, "STREAM_TRIGGER_INDEX", 0.0)
    }

    /// Allocate buffers and point each `STREAM_OUT{n}` slot at its target.
    ///
    /// `loop_samples` is the number of values from the end of the loaded
    /// data to repeat once playback reaches the end of the buffer (0 plays
    /// the buffer once).
    pub fn configure(&self, loop_samples: usize) -> Result<()> {
        let targets = self.target_addresses()?;
        for (n, address) in targets.iter().enumerate() {
            self.ljm.write_name(
                self.handle,
                &format!("STREAM_OUT{n}_BUFFER_ALLOCATE_NUM_BYTES"),
                MAX_BUFFER_BYTES as f64,
            )?;
            self.ljm
                .write_name(self.handle, &format!("STREAM_OUT{n}_TARGET"), f64::from(*address))?;
            self.ljm
                .write_name(self.handle, &format!("STREAM_OUT{n}_ENABLE"), 1.0)?;
            self.ljm.write_name(
                self.handle,
                &format!("STREAM_OUT{n}_LOOP_SIZE"),
                loop_samples as f64,
            )?;
            // Latch the loop setting and any freshly loaded data.
            self.ljm
                .write_name(self.handle, &format!("STREAM_OUT{n}_SET_LOOP"), 1.0)?;
        }
        debug!(targets = ?self.out_names, loop_samples, "stream-out configured");
        Ok(())
    }

    /// Load one waveform per target into the stream-out buffers.
    pub fn load(&mut self, waveforms: &[Vec<f64>], format: SampleFormat) -> Result<()> {
        if waveforms.len() != self.out_names.len() {
            return Err(DaqError::LengthMismatch {
                expected: self.out_names.len(),
                provided: waveforms.len(),
            });
        }
        for waveform in waveforms {
            // Validates the fit; the allocation itself is fixed-size.
            buffer_bytes_for(waveform.len(), format)?;
        }
        for (n, waveform) in waveforms.iter().enumerate() {
            self.ljm
                .write_name_array(self.handle, &format.buffer_register(n), waveform)?;
        }
        self.loaded_lengths = waveforms.iter().map(Vec::len).collect();
        Ok(())
    }

    /// Play the loaded waveforms over `duration`.
    ///
    /// The scan rate is chosen so the longest loaded waveform spans
    /// `duration`. Blocks for 1.02 × the playback time implied by the scan
    /// rate the device actually chose, and returns that blocking time.
    pub fn start(&self, duration: Duration, scans_per_read: u32) -> Result<Duration> {
        let max_len = *self
            .loaded_lengths
            .iter()
            .max()
            .ok_or(DaqError::NothingLoaded)?;
        let seconds = duration.as_secs_f64();
        if seconds <= 0.0 {
            return Err(DaqError::Configuration(
                "stream duration must be positive".into(),
            ));
        }

        let scan_rate = max_len as f64 / seconds;
        let scan_list = self.scan_list()?;
        let actual_rate =
            self.ljm
                .stream_start(self.handle, scans_per_read as i32, &scan_list, scan_rate)?;

        // 2% margin over the nominal playback time.
        let playback = Duration::from_secs_f64(1.02 * max_len as f64 / actual_rate);
        debug!(
            requested_hz = scan_rate,
            actual_hz = actual_rate,
            ?playback,
            "stream-out running"
        );
        std::thread::sleep(playback);
        Ok(playback)
    }

    /// Disable every stream-out slot and stop the stream.
    ///
    /// Stopping a stream that is not running is not an error.
    pub fn stop(&self) -> Result<()> {
        for n in 0..self.out_names.len() {
            self.ljm
                .write_name(self.handle, &format!("STREAM_OUT{n}_ENABLE"), 0.0)?;
        }
        match self.ljm.stream_stop(self.handle) {
            Err(err) if err.is_stream_not_running() => Ok(()),
            other => other,
        }
    }

    /// Samples currently waiting in a slot's buffer.
    pub fn buffer_status(&self, target: usize) -> Result<f64> {
        self.ljm
            .read_name(self.handle, &format!("STREAM_OUT{target}_BUFFER_STATUS"))
    }
}

impl Drop for StreamOut {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            if !err.is_device_not_open() {
                warn!(%err, "failed to stop stream-out on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sizing_doubles_the_rounded_length() {
        // 1000 u16 samples = 2000 bytes -> 2048 rounded -> 4096 with headroom
        assert_eq!(buffer_bytes_for(1000, SampleFormat::U16).unwrap(), 4096);
        // 3 f32 samples = 12 bytes -> 16 rounded -> 32
        assert_eq!(buffer_bytes_for(3, SampleFormat::F32).unwrap(), 32);
    }

    #[test]
    fn buffer_sizing_caps_at_the_hardware_buffer() {
        let max = SampleFormat::U16.max_samples();
        assert_eq!(
            buffer_bytes_for(max, SampleFormat::U16).unwrap(),
            MAX_BUFFER_BYTES
        );
    }

    #[test]
    fn oversized_waveforms_are_rejected() {
        let max = SampleFormat::U16.max_samples();
        let err = buffer_bytes_for(max + 1, SampleFormat::U16).unwrap_err();
        assert!(matches!(err, DaqError::WaveformTooLong { .. }));
    }

    #[test]
    fn empty_waveforms_are_a_configuration_error() {
        let err = buffer_bytes_for(0, SampleFormat::U16).unwrap_err();
        assert!(matches!(err, DaqError::Configuration(_)));
        assert!(!err.to_string().contains("exceeds"));
    }

    #[test]
    fn format_capacities_follow_sample_width() {
        assert_eq!(SampleFormat::U16.max_samples(), 8192);
        assert_eq!(SampleFormat::F32.max_samples(), 4096);
    }
}
