//! Smoke tests against a physical LabJack.
//!
//! Requires the vendor LJM runtime installed and a device attached:
//!
//! ```bash
//! cargo test --features hardware_tests -- --test-threads=1
//! ```

#![cfg(feature = "hardware_tests")]

use std::sync::Arc;
use std::time::Duration;

use labjack_daq::ljm::runtime::LjmRuntime;
use labjack_daq::ljm::Ljm;
use labjack_daq::LabJack;

fn open() -> LabJack {
    let ljm: Arc<dyn Ljm> = Arc::new(LjmRuntime::new());
    LabJack::open_any(ljm).expect("no LabJack attached")
}

#[test]
fn open_reports_handle_info() {
    let device = open();
    let info = device.info().unwrap();
    assert!(info.serial_number > 0);
    device.close().unwrap();
}

#[test]
fn dac_write_reads_back() {
    let device = open();
    let bank = device.registers(&["DAC0"], &["DAC0"]);
    let readings = bank.update(&[1.0]).unwrap();
    assert!((readings["DAC0"] - 1.0).abs() < 0.05);
    bank.write(&[0.0]).unwrap();
    device.close().unwrap();
}

#[test]
fn interval_loop_runs_on_the_vendor_timer() {
    let device = open();
    let report = device
        .interval(Duration::from_millis(20), 5)
        .run(|_| Ok(None::<()>))
        .unwrap();
    assert!(report.total >= Duration::from_millis(90));
    device.close().unwrap();
}
