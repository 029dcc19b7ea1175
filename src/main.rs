//! CLI entry point for labjack-daq.
//!
//! Provides command-line access to the toolkit:
//! - `info`: open a device and print its connection details
//! - `monitor`: interval-paced register reads printed as CSV
//! - `sweep`: DAC calibration sweep written to CSV
//! - `stream`: play a voltage ramp out of both DACs
//!
//! # Usage
//!
//! ```bash
//! labjack-daq info
//! labjack-daq monitor AIN0 AIN1 --period-ms 100 --iterations 50
//! labjack-daq sweep --runs 3 --step 16
//! labjack-daq stream --duration-secs 2
//! ```
//!
//! All subcommands need the vendor LJM runtime installed (build with the
//! `hardware` feature).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::info;

use labjack_daq::calibration::{self, DacSweep, SweepConfig};
use labjack_daq::config::AppConfig;
use labjack_daq::ljm::runtime::LjmRuntime;
use labjack_daq::ljm::Ljm;
use labjack_daq::stream::SampleFormat;
use labjack_daq::{logging, LabJack};

#[derive(Parser)]
#[command(name = "labjack-daq")]
#[command(about = "LabJack T-series DAQ toolkit", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the configured device and print its connection details
    Info,

    /// Read registers on a fixed period and print them as CSV
    Monitor {
        /// Register names to read each tick
        #[arg(required = true)]
        names: Vec<String>,

        /// Tick period in milliseconds
        #[arg(long, default_value = "1000")]
        period_ms: u64,

        /// Number of ticks
        #[arg(long, default_value = "10")]
        iterations: usize,
    },

    /// Sweep the DAC binary code range and write calibration CSVs
    Sweep {
        /// Passes over the code range
        #[arg(long)]
        runs: Option<usize>,

        /// Binary code increment
        #[arg(long)]
        step: Option<u32>,
    },

    /// Play a full-scale ramp out of DAC0 and DAC1
    Stream {
        /// Playback time in seconds
        #[arg(long, default_value = "1")]
        duration_secs: u64,

        /// Samples in the ramp
        #[arg(long, default_value = "1024")]
        samples: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.validate().map_err(anyhow::Error::msg)?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    let ljm: Arc<dyn Ljm> = Arc::new(LjmRuntime::new());
    let device = LabJack::open(
        ljm,
        config.device.device_type,
        config.device.connection,
        &config.device.identifier,
    )?;

    match cli.command {
        Commands::Info => {
            println!("{}", device.info()?);
        }
        Commands::Monitor {
            names,
            period_ms,
            iterations,
        } => {
            monitor(&device, &names, Duration::from_millis(period_ms), iterations)?;
        }
        Commands::Sweep { runs, step } => {
            let sweep_config = SweepConfig {
                runs: runs.unwrap_or(config.calibration.runs),
                step: step.unwrap_or(config.calibration.step),
                ..Default::default()
            };
            sweep(&device, sweep_config, &config.calibration.output_dir)?;
        }
        Commands::Stream {
            duration_secs,
            samples,
        } => {
            ramp(&device, Duration::from_secs(duration_secs), samples, &config)?;
        }
    }

    device.close()?;
    Ok(())
}

/// Print interval-paced readings as CSV: timestamp, then one column per
/// register.
fn monitor(
    device: &LabJack,
    names: &[String],
    period: Duration,
    iterations: usize,
) -> Result<()> {
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let bank = device.registers(&[], &name_refs);

    println!("timestamp,{}", names.join(","));
    let report = device.interval(period, iterations).run(|_| {
        let readings = bank.read()?;
        let row: Vec<String> = names
            .iter()
            .map(|name| readings.get(name).copied().unwrap_or(f64::NAN).to_string())
            .collect();
        println!("{},{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"), row.join(","));
        Ok(None::<()>)
    })?;

    info!(
        mean_period_ms = report.mean_period.as_millis() as u64,
        total_ms = report.total.as_millis() as u64,
        skipped = report.skipped,
        "monitor finished"
    );
    Ok(())
}

/// Run the DAC sweep and write the raw, aggregated, and 12-bit CSVs.
fn sweep(device: &LabJack, sweep_config: SweepConfig, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S");

    let table = DacSweep::new(device.ljm(), device.handle(), sweep_config)?.run()?;
    let raw_path = output_dir.join(format!("dac_sweep_{stamp}.csv"));
    table.write_csv(&raw_path)?;

    let aggregated = table.aggregate();
    let agg_path = output_dir.join(format!("dac_sweep_{stamp}_agg.csv"));
    calibration::write_aggregate_csv(&aggregated, &agg_path)?;

    let folded = calibration::downsample_12bit(&aggregated);
    let folded_path = output_dir.join(format!("dac_sweep_{stamp}_12bit.csv"));
    calibration::write_aggregate_csv(&folded, &folded_path)?;

    info!(
        raw = %raw_path.display(),
        aggregated = %agg_path.display(),
        downsampled = %folded_path.display(),
        "sweep CSVs written"
    );
    Ok(())
}

/// Load a 0→5 V ramp into both DACs and play it over `duration`.
fn ramp(device: &LabJack, duration: Duration, samples: usize, config: &AppConfig) -> Result<()> {
    let wave: Vec<f64> = (0..samples)
        .map(|i| 5.0 * i as f64 / samples.max(1) as f64)
        .collect();

    let mut stream = device.stream_out(&["DAC0", "DAC1"])?;
    stream.load(&[wave.clone(), wave], SampleFormat::F32)?;
    stream.configure(0)?;
    let played = stream.start(duration, config.stream.scans_per_read)?;
    stream.stop()?;

    info!(played_ms = played.as_millis() as u64, "ramp played");
    Ok(())
}
