//! Timed measurement loops paced by the vendor interval primitive.
//!
//! An [`IntervalLoop`] runs a tick closure once per period for a fixed
//! number of iterations. Work that fits inside the period is absorbed by
//! the wait at the interval boundary; work that overruns shows up as
//! skipped boundaries, which are logged per iteration and totalled in the
//! final [`IntervalReport`].
//!
//! `run_with_followup` additionally runs a second closure immediately
//! after each boundary, for actions that must happen right at the start
//! of a period (for example kicking a UART transmit while the next tick's
//! reads are still pending).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::Result;
use crate::ljm::{IntervalHandle, Ljm};

/// Metrics and collected responses from a finished loop.
#[derive(Debug)]
pub struct IntervalReport<T> {
    /// Mean measured period (tick plus wait), over all iterations.
    pub mean_period: Duration,
    /// Wall time of the whole loop.
    pub total: Duration,
    /// Total interval boundaries missed.
    pub skipped: u64,
    /// Responses the closures returned, in order.
    pub responses: Vec<T>,
}

/// A timed loop bound to one vendor interval timer.
pub struct IntervalLoop {
    ljm: Arc<dyn Ljm>,
    interval: IntervalHandle,
    period: Duration,
    iterations: usize,
    cleaned: bool,
}

impl IntervalLoop {
    /// Loop running `iterations` ticks at `period`.
    pub fn new(ljm: Arc<dyn Ljm>, period: Duration, iterations: usize) -> Self {
        IntervalLoop {
            ljm,
            interval: IntervalHandle::next(),
            period,
            iterations,
            cleaned: false,
        }
    }

    /// Configured period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Configured iteration count.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Run `tick` once per period.
    ///
    /// `tick` receives the iteration index; a `Some` return is collected
    /// into the report.
    pub fn run<T, F>(self, tick: F) -> Result<IntervalReport<T>>
    where
        F: FnMut(usize) -> Result<Option<T>>,
    {
        self.run_with_followup(tick, |_| Ok(None))
    }

    /// Run `tick` inside each period and `followup` immediately after each
    /// interval boundary.
    pub fn run_with_followup<T, F, G>(
        mut self,
        mut tick: F,
        mut followup: G,
    ) -> Result<IntervalReport<T>>
    where
        F: FnMut(usize) -> Result<Option<T>>,
        G: FnMut(usize) -> Result<Option<T>>,
    {
        self.ljm.start_interval(self.interval, self.period)?;
        let loop_start = Instant::now();
        let mut period_sum = Duration::ZERO;
        let mut responses = Vec::new();
        let mut skipped_total = 0u64;

        for iteration in 0..self.iterations {
            let period_start = Instant::now();
            let response = tick(iteration)?;
            let skipped = self.ljm.wait_for_next_interval(self.interval)?;
            period_sum += period_start.elapsed();

            if let Some(r) = response {
                responses.push(r);
            }
            if let Some(r) = followup(iteration)? {
                responses.push(r);
            }
            if skipped > 0 {
                warn!(iteration, skipped, "missed interval boundaries");
                skipped_total += u64::from(skipped);
            }
        }

        let total = loop_start.elapsed();
        self.cleaned = true;
        self.ljm.clean_interval(self.interval)?;

        let mean_period = if self.iterations == 0 {
            Duration::ZERO
        } else {
            period_sum / self.iterations as u32
        };
        Ok(IntervalReport {
            mean_period,
            total,
            skipped: skipped_total,
            responses,
        })
    }
}

impl Drop for IntervalLoop {
    fn drop(&mut self) {
        // Reached when a tick closure errors out mid-loop.
        if !self.cleaned {
            let _ = self.ljm.clean_interval(self.interval);
        }
    }
}
