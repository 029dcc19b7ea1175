//! Device lifecycle and experiment presets.
//!
//! [`LabJack`] owns an open device handle and hands out the helper objects
//! (register bank, UART link, interval loop, stream-out) that operate on
//! it. Closing tolerates the driver's "device not open" error so teardown
//! is idempotent; dropping an unclosed device closes it best-effort.
//!
//! The two lab rigs this toolkit was built for are captured as
//! [`Experiment`] presets: `Reflow` runs on a T4 with the UART on DIO5/4,
//! `Machining` on a T7 with the UART on DIO1/0 plus the DAC register bank
//! and a stream-out on both DACs.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::interval::IntervalLoop;
use crate::ljm::{ConnectionType, DeviceHandle, DeviceType, HandleInfo, Ljm};
use crate::registers::RegisterBank;
use crate::stream::StreamOut;
use crate::uart::{UartConfig, UartLink};

/// An open LabJack T-series device.
pub struct LabJack {
    ljm: Arc<dyn Ljm>,
    handle: DeviceHandle,
    closed: bool,
}

impl LabJack {
    /// Open a device and log its connection details.
    pub fn open(
        ljm: Arc<dyn Ljm>,
        device_type: DeviceType,
        connection_type: ConnectionType,
        identifier: &str,
    ) -> Result<Self> {
        let handle = ljm.open(device_type, connection_type, identifier)?;
        let info = ljm.handle_info(handle)?;
        info!(%info, "opened LabJack");
        Ok(LabJack {
            ljm,
            handle,
            closed: false,
        })
    }

    /// Open the first device found on any transport.
    pub fn open_any(ljm: Arc<dyn Ljm>) -> Result<Self> {
        Self::open(ljm, DeviceType::Any, ConnectionType::Any, "ANY")
    }

    /// Raw device handle.
    pub fn handle(&self) -> DeviceHandle {
        self.handle
    }

    /// Driver this device was opened through.
    pub fn ljm(&self) -> Arc<dyn Ljm> {
        Arc::clone(&self.ljm)
    }

    /// Connection details for this device.
    pub fn info(&self) -> Result<HandleInfo> {
        self.ljm.handle_info(self.handle)
    }

    /// Register bank with distinct write and read register sets.
    pub fn registers(&self, write_names: &[&str], read_names: &[&str]) -> RegisterBank {
        RegisterBank::new(self.ljm(), self.handle, write_names, read_names)
    }

    /// Configure the device's ASYNCH UART and return the link.
    pub fn uart(&self, config: UartConfig) -> Result<UartLink> {
        UartLink::configure(self.ljm(), self.handle, config)
    }

    /// Stream-out helper over the given target registers, with the stream
    /// configuration reset to defaults.
    pub fn stream_out(&self, out_names: &[&str]) -> Result<StreamOut> {
        StreamOut::with_reset(self.ljm(), self.handle, out_names)
    }

    /// Timed loop running `iterations` ticks at `period`.
    pub fn interval(&self, period: std::time::Duration, iterations: usize) -> IntervalLoop {
        IntervalLoop::new(self.ljm(), period, iterations)
    }

    /// Close the device. A device that is already gone is not an error.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        match self.ljm.close(self.handle) {
            Err(err) if err.is_device_not_open() => Ok(()),
            other => other,
        }
    }
}

impl Drop for LabJack {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.ljm.close(self.handle) {
            if !err.is_device_not_open() {
                warn!(%err, "failed to close LabJack on drop");
            }
        }
    }
}

/// Named lab setups with their device and wiring presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Experiment {
    /// Microdisk reflow rig: T4, UART to the reflow controller.
    Reflow,
    /// Microrod machining rig: T7, UART plus DAC drive and stream-out.
    Machining,
}

impl Experiment {
    /// Device family the rig is wired to.
    pub fn device_type(self) -> DeviceType {
        match self {
            Experiment::Reflow => DeviceType::T4,
            Experiment::Machining => DeviceType::T7,
        }
    }

    /// UART wiring for the rig.
    pub fn uart_config(self) -> UartConfig {
        match self {
            Experiment::Reflow => UartConfig::reflow(),
            Experiment::Machining => UartConfig::machining(),
        }
    }

    /// Open the rig's device and attach its helpers.
    pub fn connect(self, ljm: Arc<dyn Ljm>) -> Result<Rig> {
        let device = LabJack::open(ljm, self.device_type(), ConnectionType::Any, "ANY")?;
        let uart = device.uart(self.uart_config())?;
        let (dac_registers, stream) = match self {
            Experiment::Reflow => (None, None),
            Experiment::Machining => {
                let bank =
                    device.registers(&["DAC0_BINARY", "DAC1_BINARY"], &["DAC0", "DAC1"]);
                let stream = device.stream_out(&["DAC0", "DAC1"])?;
                (Some(bank), Some(stream))
            }
        };
        Ok(Rig {
            device,
            uart,
            dac_registers,
            stream,
        })
    }
}

/// A device with the helpers an [`Experiment`] preset attaches.
pub struct Rig {
    /// The open device.
    pub device: LabJack,
    /// Serial link to the rig's controller.
    pub uart: UartLink,
    /// DAC drive registers (machining rig only).
    pub dac_registers: Option<RegisterBank>,
    /// DAC stream-out (machining rig only).
    pub stream: Option<StreamOut>,
}
