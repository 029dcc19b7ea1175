//! DAC level sweep: binary code in, measured voltage out.
//!
//! The sweep steps both DACs through their 16-bit binary code range while
//! AIN0/AIN1 are wired back to the DAC outputs, recording per-run set and
//! measured voltages for every code. The raw table goes to CSV; the
//! aggregation pass reduces the runs to one modal voltage per code, and
//! can further fold the 16-bit table down to the DACs' effective 12-bit
//! resolution.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{DaqError, Result};
use crate::ljm::{DeviceHandle, Ljm};

/// Sweep parameters.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Number of passes over the code range.
    pub runs: usize,
    /// Binary code increment between samples.
    pub step: u32,
    /// One past the last code swept (the full 16-bit range by default).
    pub max_code: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            runs: 10,
            step: 1,
            max_code: 1 << 16,
        }
    }
}

impl SweepConfig {
    /// Codes visited per run.
    pub fn codes(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.max_code).step_by(self.step as usize)
    }
}

/// Measurements for one binary code in one run.
#[derive(Debug, Clone, Copy)]
pub struct CodeSample {
    /// Voltage the device reports it set on DAC0.
    pub dac0_set: f64,
    /// Voltage measured on AIN0 (wired to DAC0).
    pub dac0_actual: f64,
    /// Voltage the device reports it set on DAC1.
    pub dac1_set: f64,
    /// Voltage measured on AIN1 (wired to DAC1).
    pub dac1_actual: f64,
}

/// Raw sweep results: per code, one [`CodeSample`] per run.
#[derive(Debug)]
pub struct SweepTable {
    codes: Vec<u32>,
    /// `samples[code_index][run]`
    samples: Vec<Vec<CodeSample>>,
}

/// One code's aggregated (modal across runs) voltages.
#[derive(Debug, Clone, Copy)]
pub struct AggregateRow {
    /// Binary input code.
    pub code: u32,
    /// Modal DAC0 set voltage.
    pub dac0: f64,
    /// Modal DAC1 set voltage.
    pub dac1: f64,
    /// Modal AIN0 measured voltage.
    pub ain0: f64,
    /// Modal AIN1 measured voltage.
    pub ain1: f64,
}

/// Runs the sweep over an open device.
pub struct DacSweep {
    ljm: Arc<dyn Ljm>,
    handle: DeviceHandle,
    config: SweepConfig,
}

impl DacSweep {
    /// Sweep over `handle` with the given parameters.
    pub fn new(ljm: Arc<dyn Ljm>, handle: DeviceHandle, config: SweepConfig) -> Result<Self> {
        if config.runs == 0 {
            return Err(DaqError::Configuration("sweep needs at least one run".into()));
        }
        if config.step == 0 {
            return Err(DaqError::Configuration("sweep step must be nonzero".into()));
        }
        Ok(DacSweep {
            ljm,
            handle,
            config,
        })
    }

    /// Execute the sweep.
    ///
    /// Both DACs are driven to code 0 before the first run so every run
    /// starts from the same output level.
    pub fn run(&self) -> Result<SweepTable> {
        self.ljm.write_name(self.handle, "DAC0_BINARY", 0.0)?;
        self.ljm.write_name(self.handle, "DAC1_BINARY", 0.0)?;

        let codes: Vec<u32> = self.config.codes().collect();
        let mut samples: Vec<Vec<CodeSample>> = vec![Vec::with_capacity(self.config.runs); codes.len()];

        let write_names = ["DAC0_BINARY".to_string(), "DAC1_BINARY".to_string()];
        let read_names = [
            "DAC0".to_string(),
            "DAC1".to_string(),
            "AIN0".to_string(),
            "AIN1".to_string(),
        ];

        for run in 0..self.config.runs {
            debug!(run, total = self.config.runs, "sweep run starting");
            for (i, code) in codes.iter().enumerate() {
                let value = f64::from(*code);
                self.ljm
                    .write_names(self.handle, &write_names, &[value, value])?;
                let readings = self.ljm.read_names(self.handle, &read_names)?;
                samples[i].push(CodeSample {
                    dac0_set: readings[0],
                    dac1_set: readings[1],
                    dac0_actual: readings[2],
                    dac1_actual: readings[3],
                });
            }
        }
        info!(
            codes = codes.len(),
            runs = self.config.runs,
            "DAC sweep complete"
        );
        Ok(SweepTable { codes, samples })
    }
}

impl SweepTable {
    /// Build a table from pre-collected samples. `samples[i]` holds one
    /// entry per run for `codes[i]`.
    pub fn from_samples(codes: Vec<u32>, samples: Vec<Vec<CodeSample>>) -> Result<Self> {
        if codes.len() != samples.len() {
            return Err(DaqError::LengthMismatch {
                expected: codes.len(),
                provided: samples.len(),
            });
        }
        Ok(SweepTable { codes, samples })
    }

    /// Number of runs recorded.
    pub fn runs(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    /// Write the raw table to CSV, one row per code with per-run columns.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        let runs = self.runs();

        let mut header = vec!["binary_input".to_string()];
        for run in 0..runs {
            header.push(format!("D0_set_output_{run}"));
            header.push(format!("D0_actual_output_{run}"));
            header.push(format!("D1_set_output_{run}"));
            header.push(format!("D1_actual_output_{run}"));
        }
        writer.write_record(&header)?;

        for (code, runs) in self.codes.iter().zip(&self.samples) {
            let mut record = vec![code.to_string()];
            for sample in runs {
                record.push(sample.dac0_set.to_string());
                record.push(sample.dac0_actual.to_string());
                record.push(sample.dac1_set.to_string());
                record.push(sample.dac1_actual.to_string());
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Collapse the runs to one row per code via the modal voltage.
    pub fn aggregate(&self) -> Vec<AggregateRow> {
        self.codes
            .iter()
            .zip(&self.samples)
            .map(|(code, runs)| AggregateRow {
                code: *code,
                dac0: modal(runs.iter().map(|s| s.dac0_set)),
                dac1: modal(runs.iter().map(|s| s.dac1_set)),
                ain0: modal(runs.iter().map(|s| s.dac0_actual)),
                ain1: modal(runs.iter().map(|s| s.dac1_actual)),
            })
            .collect()
    }
}

/// Modal value of a voltage series. Ties go to the value seen first,
/// matching the aggregation the lab has always used.
pub fn modal(values: impl Iterator<Item = f64>) -> f64 {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    let mut order: Vec<f64> = Vec::new();
    for value in values {
        let count = counts.entry(value.to_bits()).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }
    // max_by_key keeps the last maximum, so scan in reverse to land on the
    // first-seen value for ties.
    order
        .into_iter()
        .rev()
        .max_by_key(|v| counts[&v.to_bits()])
        .unwrap_or(0.0)
}

/// Fold an aggregated 16-bit table down to 12-bit resolution: each output
/// row takes the modal voltages of its 16-code block.
pub fn downsample_12bit(rows: &[AggregateRow]) -> Vec<AggregateRow> {
    rows.chunks(16)
        .enumerate()
        .map(|(block, chunk)| AggregateRow {
            code: block as u32,
            dac0: modal(chunk.iter().map(|r| r.dac0)),
            dac1: modal(chunk.iter().map(|r| r.dac1)),
            ain0: modal(chunk.iter().map(|r| r.ain0)),
            ain1: modal(chunk.iter().map(|r| r.ain1)),
        })
        .collect()
}

/// Write aggregated rows to CSV.
pub fn write_aggregate_csv(rows: &[AggregateRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["binary_input", "DAC0", "DAC1", "AIN0", "AIN1"])?;
    for row in rows {
        writer.write_record(&[
            row.code.to_string(),
            row.dac0.to_string(),
            row.dac1.to_string(),
            row.ain0.to_string(),
            row.ain1.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(v: f64) -> CodeSample {
        CodeSample {
            dac0_set: v,
            dac0_actual: v,
            dac1_set: v,
            dac1_actual: v,
        }
    }

    #[test]
    fn modal_picks_the_most_common_value() {
        assert_eq!(modal([1.0, 2.0, 2.0, 3.0].into_iter()), 2.0);
    }

    #[test]
    fn modal_breaks_ties_toward_the_first_seen() {
        assert_eq!(modal([4.0, 5.0, 5.0, 4.0].into_iter()), 4.0);
        assert_eq!(modal(std::iter::empty()), 0.0);
    }

    #[test]
    fn aggregate_reduces_runs_per_code() {
        let table = SweepTable::from_samples(
            vec![0, 1],
            vec![
                vec![sample(0.0), sample(0.0), sample(0.1)],
                vec![sample(0.2), sample(0.3), sample(0.3)],
            ],
        )
        .unwrap();
        let rows = table.aggregate();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].dac0, 0.0);
        assert_eq!(rows[1].ain1, 0.3);
    }

    #[test]
    fn downsampling_folds_sixteen_codes_per_row() {
        let rows: Vec<AggregateRow> = (0..64)
            .map(|code| AggregateRow {
                code,
                dac0: f64::from(code / 16),
                dac1: 0.0,
                ain0: 0.0,
                ain1: 0.0,
            })
            .collect();
        let folded = downsample_12bit(&rows);
        assert_eq!(folded.len(), 4);
        assert_eq!(folded[0].code, 0);
        assert_eq!(folded[3].dac0, 3.0);
    }

    #[test]
    fn mismatched_sample_rows_are_rejected() {
        let err = SweepTable::from_samples(vec![0, 1], vec![vec![sample(0.0)]]).unwrap_err();
        assert!(matches!(err, DaqError::LengthMismatch { .. }));
    }
}
