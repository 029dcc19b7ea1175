//! Batched register read/write helper.
//!
//! A [`RegisterBank`] pairs a list of write registers with a list of read
//! registers. The two lists may be identical (set a DAC, read it back) or
//! disjoint (set `DAC0_BINARY`, read the `AIN0` it is looped into); the
//! `update` round trip picks the read set accordingly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{DaqError, Result};
use crate::ljm::{DeviceHandle, Ljm};

/// Reader/writer over fixed sets of named registers.
pub struct RegisterBank {
    ljm: Arc<dyn Ljm>,
    handle: DeviceHandle,
    write_names: Vec<String>,
    read_names: Vec<String>,
}

impl RegisterBank {
    /// Bank with distinct write and read register sets.
    pub fn new(
        ljm: Arc<dyn Ljm>,
        handle: DeviceHandle,
        write_names: &[&str],
        read_names: &[&str],
    ) -> Self {
        RegisterBank {
            ljm,
            handle,
            write_names: write_names.iter().map(|s| s.to_string()).collect(),
            read_names: read_names.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Bank that reads back the same registers it writes.
    pub fn shared(ljm: Arc<dyn Ljm>, handle: DeviceHandle, names: &[&str]) -> Self {
        Self::new(ljm, handle, names, names)
    }

    /// Write register names, in write order.
    pub fn write_names(&self) -> &[String] {
        &self.write_names
    }

    /// Read register names, in read order.
    pub fn read_names(&self) -> &[String] {
        &self.read_names
    }

    /// Whether the write and read registers are the same set.
    pub fn same_registers(&self) -> bool {
        let writes: HashSet<&str> = self.write_names.iter().map(String::as_str).collect();
        let reads: HashSet<&str> = self.read_names.iter().map(String::as_str).collect();
        writes == reads
    }

    /// Read the read registers, returned as name → value.
    pub fn read(&self) -> Result<HashMap<String, f64>> {
        self.read_set(&self.read_names)
    }

    /// Write `values` to the write registers, one value per register.
    pub fn write(&self, values: &[f64]) -> Result<()> {
        if values.len() != self.write_names.len() {
            return Err(DaqError::LengthMismatch {
                expected: self.write_names.len(),
                provided: values.len(),
            });
        }
        self.ljm.write_names(self.handle, &self.write_names, values)
    }

    /// Write `values`, then read back.
    ///
    /// When write and read registers are the same set the write registers
    /// are read back directly; otherwise the configured read registers are
    /// used.
    pub fn update(&self, values: &[f64]) -> Result<HashMap<String, f64>> {
        self.write(values)?;
        if self.same_registers() {
            self.read_set(&self.write_names)
        } else {
            self.read()
        }
    }

    fn read_set(&self, names: &[String]) -> Result<HashMap<String, f64>> {
        let values = self.ljm.read_names(self.handle, names)?;
        Ok(names.iter().cloned().zip(values).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ljm::mock::MockLjm;
    use crate::ljm::{ConnectionType, DeviceType};

    fn bank(write: &[&str], read: &[&str]) -> (Arc<MockLjm>, RegisterBank) {
        let ljm = Arc::new(MockLjm::new());
        let handle = ljm
            .open(DeviceType::T7, ConnectionType::Any, "ANY")
            .unwrap();
        let bank = RegisterBank::new(Arc::clone(&ljm) as Arc<dyn Ljm>, handle, write, read);
        (ljm, bank)
    }

    #[test]
    fn same_registers_is_order_insensitive() {
        let (_ljm, bank) = bank(&["DAC0", "DAC1"], &["DAC1", "DAC0"]);
        assert!(bank.same_registers());
    }

    #[test]
    fn distinct_sets_are_detected() {
        let (_ljm, bank) = bank(&["DAC0_BINARY"], &["AIN0"]);
        assert!(!bank.same_registers());
    }

    #[test]
    fn write_rejects_wrong_value_count() {
        let (_ljm, bank) = bank(&["DAC0", "DAC1"], &["DAC0", "DAC1"]);
        let err = bank.write(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            DaqError::LengthMismatch {
                expected: 2,
                provided: 1
            }
        ));
    }

    #[test]
    fn update_reads_back_through_the_loopback() {
        let (_ljm, bank) = bank(&["DAC0_BINARY"], &["AIN0"]);
        let readings = bank.update(&[65535.0]).unwrap();
        let volts = readings["AIN0"];
        assert!((volts - 5.0).abs() < 1e-9);
    }
}
