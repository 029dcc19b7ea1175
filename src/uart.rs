//! UART serial communication through the device's ASYNCH registers.
//!
//! T-series devices expose a UART on two digital I/O lines. The timing and
//! protocol match RS-232, but the electrical levels are 0/3.3 V; talking
//! to true RS-232 equipment needs a level converter such as a MAX233.
//!
//! Consecutive UART actions on the same link are spaced at least 50 ms
//! apart (measured on the vendor host tick) so the far-side controller has
//! time to consume each frame before the next arrives.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::ljm::{DeviceHandle, Ljm};

/// Minimum spacing between two UART actions on one link.
pub const MIN_ACTION_SPACING: Duration = Duration::from_millis(50);

/// UART parity setting (`ASYNCH_PARITY` register values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

impl Parity {
    fn register_value(self) -> f64 {
        match self {
            Parity::None => 0.0,
            Parity::Odd => 1.0,
            Parity::Even => 2.0,
        }
    }
}

/// Wiring and framing for the device UART.
///
/// Register semantics: `data_bits` 0 means 8 bits per frame;
/// `rx_buffer_bytes` 0 means the device default of 200 (2048 max).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UartConfig {
    /// DIO line that transmits (`ASYNCH_TX_DIONUM`).
    pub tx_dio: u8,
    /// DIO line that receives (`ASYNCH_RX_DIONUM`).
    pub rx_dio: u8,
    /// Symbol rate (`ASYNCH_BAUD`); 9600 is typical, 38400 the maximum.
    pub baud: u32,
    /// Receive buffer size (`ASYNCH_RX_BUFFER_SIZE_BYTES`).
    pub rx_buffer_bytes: u16,
    /// Bits per frame (`ASYNCH_NUM_DATA_BITS`).
    pub data_bits: u8,
    /// Stop bits (`ASYNCH_NUM_STOP_BITS`).
    pub stop_bits: u8,
    /// Parity (`ASYNCH_PARITY`).
    pub parity: Parity,
}

impl Default for UartConfig {
    fn default() -> Self {
        UartConfig {
            tx_dio: 0,
            rx_dio: 0,
            baud: 9600,
            rx_buffer_bytes: 0,
            data_bits: 0,
            stop_bits: 1,
            parity: Parity::None,
        }
    }
}

impl UartConfig {
    /// Wiring of the microdisk reflow rig (T4, TX on DIO5, RX on DIO4).
    pub fn reflow() -> Self {
        UartConfig {
            tx_dio: 5,
            rx_dio: 4,
            rx_buffer_bytes: 6,
            ..Default::default()
        }
    }

    /// Wiring of the microrod machining rig (T7, TX on DIO1, RX on DIO0).
    pub fn machining() -> Self {
        UartConfig {
            tx_dio: 1,
            rx_dio: 0,
            rx_buffer_bytes: 6,
            ..Default::default()
        }
    }
}

/// A configured, enabled UART on an open device.
pub struct UartLink {
    ljm: Arc<dyn Ljm>,
    handle: DeviceHandle,
    last_action_tick_us: u64,
}

impl UartLink {
    /// Write the ASYNCH configuration registers and enable the UART.
    ///
    /// If the UART is already enabled it is disabled first; the device
    /// only latches configuration while disabled.
    pub fn configure(ljm: Arc<dyn Ljm>, handle: DeviceHandle, config: UartConfig) -> Result<Self> {
        if ljm.read_name(handle, "ASYNCH_ENABLE")? != 0.0 {
            ljm.write_name(handle, "ASYNCH_ENABLE", 0.0)?;
        }

        ljm.write_name(handle, "ASYNCH_TX_DIONUM", f64::from(config.tx_dio))?;
        ljm.write_name(handle, "ASYNCH_RX_DIONUM", f64::from(config.rx_dio))?;
        ljm.write_name(handle, "ASYNCH_BAUD", f64::from(config.baud))?;
        ljm.write_name(
            handle,
            "ASYNCH_RX_BUFFER_SIZE_BYTES",
            f64::from(config.rx_buffer_bytes),
        )?;
        ljm.write_name(handle, "ASYNCH_NUM_DATA_BITS", f64::from(config.data_bits))?;
        ljm.write_name(handle, "ASYNCH_NUM_STOP_BITS", f64::from(config.stop_bits))?;
        ljm.write_name(handle, "ASYNCH_PARITY", config.parity.register_value())?;
        ljm.write_name(handle, "ASYNCH_ENABLE", 1.0)?;

        debug!(?config, "UART configured and enabled");

        let last_action_tick_us = ljm.host_tick_us();
        Ok(UartLink {
            ljm,
            handle,
            last_action_tick_us,
        })
    }

    /// Whether the device UART is currently enabled.
    pub fn enabled(&self) -> Result<bool> {
        Ok(self.ljm.read_name(self.handle, "ASYNCH_ENABLE")? != 0.0)
    }

    /// Transmit a frame out the TX line.
    pub fn transmit(&mut self, data: &[u8]) -> Result<()> {
        self.pace();
        self.ljm
            .write_name(self.handle, "ASYNCH_NUM_BYTES_TX", data.len() as f64)?;
        let values: Vec<f64> = data.iter().map(|b| f64::from(*b)).collect();
        self.ljm
            .write_name_array(self.handle, "ASYNCH_DATA_TX", &values)?;
        self.ljm.write_name(self.handle, "ASYNCH_TX_GO", 1.0)?;
        self.last_action_tick_us = self.ljm.host_tick_us();
        Ok(())
    }

    /// Read whatever the RX line has buffered.
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        self.pace();
        let count = self.ljm.read_name(self.handle, "ASYNCH_NUM_BYTES_RX")? as usize;
        let values = if count == 0 {
            Vec::new()
        } else {
            self.ljm
                .read_name_array(self.handle, "ASYNCH_DATA_RX", count)?
        };
        self.last_action_tick_us = self.ljm.host_tick_us();
        Ok(values
            .iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect())
    }

    /// Disable the UART, releasing the DIO lines.
    pub fn disable(&mut self) -> Result<()> {
        self.ljm.write_name(self.handle, "ASYNCH_ENABLE", 0.0)
    }

    /// Sleep out the remainder of the 50 ms spacing window.
    fn pace(&self) {
        let elapsed_us = self
            .ljm
            .host_tick_us()
            .saturating_sub(self.last_action_tick_us);
        let min_us = MIN_ACTION_SPACING.as_micros() as u64;
        if elapsed_us < min_us {
            std::thread::sleep(Duration::from_micros(min_us - elapsed_us));
        }
    }
}
