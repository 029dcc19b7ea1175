//! Integration tests against the simulated driver.
//!
//! These exercise the device helpers end to end the way the lab scripts
//! use them, with `MockLjm` standing in for the vendor runtime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use labjack_daq::calibration::{self, DacSweep, SweepConfig};
use labjack_daq::ljm::mock::MockLjm;
use labjack_daq::ljm::{ConnectionType, DeviceType, Ljm};
use labjack_daq::stream::SampleFormat;
use labjack_daq::{Experiment, LabJack, UartConfig};

fn open_device() -> (Arc<MockLjm>, LabJack) {
    let ljm = Arc::new(MockLjm::new());
    let device = LabJack::open(
        Arc::clone(&ljm) as Arc<dyn Ljm>,
        DeviceType::T7,
        ConnectionType::Any,
        "ANY",
    )
    .unwrap();
    (ljm, device)
}

// =============================================================================
// Register bank
// =============================================================================

#[test]
fn register_update_round_trips_through_the_loopback() {
    let (_ljm, device) = open_device();
    let bank = device.registers(&["DAC0_BINARY", "DAC1_BINARY"], &["DAC0", "DAC1", "AIN0", "AIN1"]);

    // Half scale on DAC0, full scale on DAC1.
    let readings = bank.update(&[32767.0, 65535.0]).unwrap();

    assert!((readings["AIN0"] - 2.5).abs() < 0.01);
    assert!((readings["AIN1"] - 5.0).abs() < 0.01);
    assert_eq!(readings["DAC0"], readings["AIN0"]);
}

#[test]
fn shared_bank_reads_back_what_it_wrote() {
    let (_ljm, device) = open_device();
    let bank = device.registers(&["DAC0", "DAC1"], &["DAC0", "DAC1"]);

    let readings = bank.update(&[1.25, 3.75]).unwrap();
    assert_eq!(readings["DAC0"], 1.25);
    assert_eq!(readings["DAC1"], 3.75);
}

// =============================================================================
// UART link
// =============================================================================

#[test]
fn uart_configure_writes_the_asynch_registers_in_order() {
    let (ljm, device) = open_device();
    let _link = device.uart(UartConfig::machining()).unwrap();

    let writes = ljm.scalar_writes();
    let names: Vec<&str> = writes.iter().map(|(name, _)| name.as_str()).collect();
    let expected = [
        "ASYNCH_TX_DIONUM",
        "ASYNCH_RX_DIONUM",
        "ASYNCH_BAUD",
        "ASYNCH_RX_BUFFER_SIZE_BYTES",
        "ASYNCH_NUM_DATA_BITS",
        "ASYNCH_NUM_STOP_BITS",
        "ASYNCH_PARITY",
        "ASYNCH_ENABLE",
    ];
    let start = names.len() - expected.len();
    assert_eq!(&names[start..], &expected);
    assert_eq!(ljm.register("ASYNCH_ENABLE"), Some(1.0));
    assert_eq!(ljm.register("ASYNCH_BAUD"), Some(9600.0));
    assert_eq!(ljm.register("ASYNCH_TX_DIONUM"), Some(1.0));
}

#[test]
fn uart_transmit_and_receive_carry_frames() {
    let (ljm, device) = open_device();
    let mut link = device.uart(UartConfig::reflow()).unwrap();

    link.transmit(&[0x02, 0x30, 0x31, 0x03]).unwrap();
    assert_eq!(ljm.transmitted_frames(), vec![vec![0x02, 0x30, 0x31, 0x03]]);

    ljm.push_rx_frame(&[0x06, 0x30]);
    let reply = link.receive().unwrap();
    assert_eq!(reply, vec![0x06, 0x30]);

    // Nothing queued reads back empty.
    assert!(link.receive().unwrap().is_empty());
}

#[test]
fn uart_actions_are_spaced_at_least_fifty_ms_apart() {
    let (_ljm, device) = open_device();
    let mut link = device.uart(UartConfig::reflow()).unwrap();

    link.transmit(&[0x01]).unwrap();
    let begin = Instant::now();
    link.transmit(&[0x02]).unwrap();
    let gap = begin.elapsed();
    assert!(
        gap >= Duration::from_millis(40),
        "expected ~50ms spacing, got {gap:?}"
    );
}

// =============================================================================
// Interval loop
// =============================================================================

#[test]
fn interval_loop_paces_ticks_and_collects_responses() {
    let (ljm, device) = open_device();
    ljm.set_register("AIN0", 1.5);

    let bank = device.registers(&[], &["AIN0"]);
    let begin = Instant::now();
    let report = device
        .interval(Duration::from_millis(10), 5)
        .run(|_| Ok(Some(bank.read()?["AIN0"])))
        .unwrap();
    let elapsed = begin.elapsed();

    assert_eq!(report.responses, vec![1.5; 5]);
    assert_eq!(report.skipped, 0);
    assert!(
        elapsed >= Duration::from_millis(45),
        "expected ~50ms of pacing, got {elapsed:?}"
    );
    assert!(report.mean_period >= Duration::from_millis(8));
}

#[test]
fn followup_runs_each_iteration_after_the_boundary() {
    let (_ljm, device) = open_device();
    let report = device
        .interval(Duration::from_millis(5), 3)
        .run_with_followup(
            |i| Ok(Some(format!("tick{i}"))),
            |i| Ok(Some(format!("follow{i}"))),
        )
        .unwrap();

    // Tick and followup responses interleave in iteration order.
    assert_eq!(
        report.responses,
        vec!["tick0", "follow0", "tick1", "follow1", "tick2", "follow2"]
    );
}

#[test]
fn slow_ticks_show_up_as_skipped_boundaries() {
    let (_ljm, device) = open_device();
    let report = device
        .interval(Duration::from_millis(5), 3)
        .run(|_| {
            std::thread::sleep(Duration::from_millis(12));
            Ok(None::<()>)
        })
        .unwrap();
    assert!(report.skipped >= 3, "got {} skips", report.skipped);
}

// =============================================================================
// Stream-out
// =============================================================================

#[test]
fn stream_out_configures_targets_and_buffers() {
    let (ljm, device) = open_device();
    let mut stream = device.stream_out(&["DAC0", "DAC1"]).unwrap();

    let wave: Vec<f64> = (0..8).map(|i| f64::from(i) * 0.5).collect();
    stream.load(&[wave.clone(), wave], SampleFormat::F32).unwrap();
    stream.configure(0).unwrap();

    // Reset defaults from with_reset.
    assert_eq!(ljm.register("STREAM_SETTLING_US"), Some(0.0));
    assert_eq!(ljm.register("STREAM_CLOCK_SOURCE"), Some(0.0));

    // Slot 0 points at DAC0, slot 1 at DAC1.
    assert_eq!(ljm.register("STREAM_OUT0_TARGET"), Some(1000.0));
    assert_eq!(ljm.register("STREAM_OUT1_TARGET"), Some(1002.0));
    assert_eq!(
        ljm.register("STREAM_OUT0_BUFFER_ALLOCATE_NUM_BYTES"),
        Some(16384.0)
    );
    assert_eq!(ljm.register("STREAM_OUT0_ENABLE"), Some(1.0));
    assert_eq!(ljm.register("STREAM_OUT0_SET_LOOP"), Some(1.0));
    assert_eq!(ljm.array("STREAM_OUT1_BUFFER_F32").unwrap().len(), 8);
}

#[test]
fn stream_start_derives_the_scan_rate_from_the_duration() {
    let (ljm, device) = open_device();
    let mut stream = device.stream_out(&["DAC0", "DAC1"]).unwrap();

    let wave: Vec<f64> = vec![0.0; 8];
    stream.load(&[wave.clone(), wave], SampleFormat::F32).unwrap();
    stream.configure(0).unwrap();

    let played = stream.start(Duration::from_millis(50), 1).unwrap();
    stream.stop().unwrap();

    let starts = ljm.stream_starts();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].scan_list, vec![4800, 4801]);
    // 8 samples over 50 ms = 160 Hz.
    assert!((starts[0].requested_rate_hz - 160.0).abs() < 1e-9);
    // Blocks 2% past the nominal playback time.
    assert!(played >= Duration::from_millis(50));
    assert!(!ljm.stream_active());
}

#[test]
fn buffer_status_reads_the_slot_backlog() {
    let (ljm, device) = open_device();
    let stream = device.stream_out(&["DAC0", "DAC1"]).unwrap();

    // Drained by default; a preset backlog reads back per slot.
    assert_eq!(stream.buffer_status(0).unwrap(), 0.0);
    ljm.set_register("STREAM_OUT1_BUFFER_STATUS", 512.0);
    assert_eq!(stream.buffer_status(1).unwrap(), 512.0);
    assert_eq!(stream.buffer_status(0).unwrap(), 0.0);
}

#[test]
fn stopping_a_stopped_stream_is_not_an_error() {
    let (ljm, device) = open_device();
    let stream = device.stream_out(&["DAC0"]).unwrap();

    stream.stop().unwrap();
    stream.stop().unwrap();
    assert_eq!(ljm.register("STREAM_OUT0_ENABLE"), Some(0.0));
}

// =============================================================================
// Calibration sweep
// =============================================================================

#[test]
fn sweep_writes_raw_and_aggregate_csvs() {
    let (_ljm, device) = open_device();
    let config = SweepConfig {
        runs: 2,
        step: 4096,
        max_code: 1 << 16,
    };
    let table = DacSweep::new(device.ljm(), device.handle(), config)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(table.runs(), 2);

    let dir = tempfile::tempdir().unwrap();
    let raw_path = dir.path().join("sweep.csv");
    table.write_csv(&raw_path).unwrap();

    let raw = std::fs::read_to_string(&raw_path).unwrap();
    let mut lines = raw.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("binary_input,D0_set_output_0,D0_actual_output_0"));
    assert!(header.contains("D1_actual_output_1"));
    // 65536 / 4096 codes swept.
    assert_eq!(lines.count(), 16);

    let aggregated = table.aggregate();
    assert_eq!(aggregated.len(), 16);
    // The loopback is ideal, so set and measured voltages agree.
    let last = aggregated.last().unwrap();
    assert!((last.ain0 - last.dac0).abs() < 1e-9);

    let agg_path = dir.path().join("sweep_agg.csv");
    calibration::write_aggregate_csv(&aggregated, &agg_path).unwrap();
    let agg = std::fs::read_to_string(&agg_path).unwrap();
    assert!(agg.starts_with("binary_input,DAC0,DAC1,AIN0,AIN1"));
}

#[test]
fn sweep_resets_the_dacs_before_the_first_run() {
    let (ljm, device) = open_device();
    let config = SweepConfig {
        runs: 1,
        step: 1 << 15,
        max_code: 1 << 16,
    };
    DacSweep::new(device.ljm(), device.handle(), config)
        .unwrap()
        .run()
        .unwrap();

    let writes = ljm.scalar_writes();
    assert_eq!(writes[0], ("DAC0_BINARY".to_string(), 0.0));
    assert_eq!(writes[1], ("DAC1_BINARY".to_string(), 0.0));
}

// =============================================================================
// Experiment presets
// =============================================================================

#[test]
fn machining_preset_attaches_dac_bank_and_stream() {
    let ljm = Arc::new(MockLjm::new());
    let rig = Experiment::Machining
        .connect(Arc::clone(&ljm) as Arc<dyn Ljm>)
        .unwrap();

    assert_eq!(rig.device.info().unwrap().device_type, Some(DeviceType::T7));

    let bank = rig.dac_registers.as_ref().unwrap();
    assert_eq!(bank.write_names(), ["DAC0_BINARY", "DAC1_BINARY"]);
    assert_eq!(bank.read_names(), ["DAC0", "DAC1"]);

    let stream = rig.stream.as_ref().unwrap();
    assert_eq!(stream.out_names(), ["DAC0", "DAC1"]);

    // UART wired per the machining rig.
    assert_eq!(ljm.register("ASYNCH_TX_DIONUM"), Some(1.0));
    assert_eq!(ljm.register("ASYNCH_ENABLE"), Some(1.0));
}

#[test]
fn reflow_preset_attaches_only_the_uart() {
    let ljm = Arc::new(MockLjm::new());
    let rig = Experiment::Reflow
        .connect(Arc::clone(&ljm) as Arc<dyn Ljm>)
        .unwrap();

    assert_eq!(rig.device.info().unwrap().device_type, Some(DeviceType::T4));
    assert!(rig.dac_registers.is_none());
    assert!(rig.stream.is_none());
    assert_eq!(ljm.register("ASYNCH_TX_DIONUM"), Some(5.0));
    assert_eq!(ljm.register("ASYNCH_RX_DIONUM"), Some(4.0));
}

// =============================================================================
// Device lifecycle
// =============================================================================

#[test]
fn close_is_idempotent_through_the_helper() {
    let ljm = Arc::new(MockLjm::new());
    let device = LabJack::open_any(Arc::clone(&ljm) as Arc<dyn Ljm>).unwrap();
    let handle = device.handle();
    device.close().unwrap();

    // The handle is gone from the driver's point of view.
    let err = ljm.close(handle).unwrap_err();
    assert!(err.is_device_not_open());
}
