//! # LabJack DAQ Toolkit
//!
//! Library for driving LabJack T-series devices through the vendor LJM
//! driver: named register I/O, interval-paced measurement loops, DAC
//! waveform playback via hardware stream-out, UART communication over the
//! ASYNCH registers, and a DAC calibration sweep with CSV output.
//!
//! ## Crate Structure
//!
//! - **`ljm`**: The driver seam. The [`ljm::Ljm`] trait covers the LJM
//!   calls the toolkit uses; [`ljm::runtime::LjmRuntime`] binds it to the
//!   vendor library (through the `ljm-sys` crate), and
//!   [`ljm::mock::MockLjm`] is an in-memory device for tests.
//! - **`device`**: Open/close lifecycle ([`device::LabJack`]) and the
//!   [`device::Experiment`] rig presets.
//! - **`registers`**: Batched named-register reads and writes
//!   ([`registers::RegisterBank`]).
//! - **`interval`**: Timed loops paced by the vendor interval primitive
//!   ([`interval::IntervalLoop`]).
//! - **`stream`**: Waveform playback through stream-out
//!   ([`stream::StreamOut`]).
//! - **`uart`**: Serial links over the ASYNCH registers
//!   ([`uart::UartLink`]).
//! - **`calibration`**: DAC binary-code sweep, CSV tables, and modal
//!   aggregation.
//! - **`config`** / **`logging`**: Figment configuration and tracing
//!   setup.
//! - **`error`**: [`error::DaqError`] and the crate [`error::Result`].
//!
//! All device-facing types take `Arc<dyn Ljm>`, so everything above the
//! driver seam runs unchanged against [`ljm::mock::MockLjm`].

pub mod calibration;
pub mod config;
pub mod device;
pub mod error;
pub mod interval;
pub mod ljm;
pub mod logging;
pub mod registers;
pub mod stream;
pub mod uart;

pub use device::{Experiment, LabJack, Rig};
pub use error::{DaqError, Result};
pub use interval::{IntervalLoop, IntervalReport};
pub use ljm::{ConnectionType, DeviceHandle, DeviceType, HandleInfo, Ljm};
pub use registers::RegisterBank;
pub use stream::{SampleFormat, StreamOut};
pub use uart::{UartConfig, UartLink};
