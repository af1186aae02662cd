use hdrhistogram::{CreationError, Histogram};
use log::info;
use std::time::Duration;

/// Longest tick we bother to track, in microseconds.
const MAX_TRACKED_MICROS: u64 = 60_000_000;

/// Frame-time statistics for the run.
pub struct FrameStats {
    tick_micros: Histogram<u64>,
    overruns: u64,
}

impl FrameStats {
    pub fn new() -> Result<Self, CreationError> {
        let tick_micros = Histogram::new_with_bounds(1, MAX_TRACKED_MICROS, 3)?;
        Ok(Self { tick_micros, overruns: 0 })
    }

    pub fn record(&mut self, elapsed: Duration, overrun: bool) {
        self.tick_micros.saturating_record((elapsed.as_micros() as u64).max(1));
        if overrun {
            self.overruns += 1;
        }
    }

    pub fn frames(&self) -> u64 {
        self.tick_micros.len()
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn percentile(&self, quantile: f64) -> Duration {
        Duration::from_micros(self.tick_micros.value_at_quantile(quantile))
    }

    pub fn log_summary(&self) {
        if self.frames() == 0 {
            return;
        }
        info!(
            "{} frames: mean {:.0}us, p50 {:?}, p99 {:?}, max {:?}, {} over budget",
            self.frames(),
            self.tick_micros.mean(),
            self.percentile(0.5),
            self.percentile(0.99),
            Duration::from_micros(self.tick_micros.max()),
            self.overruns
        );
    }
}
