use std::time::Duration;

use crate::config::DispatchConfig;

/// Start offsets for every attempt of a run, derived from rate, batch size and repetitions.
///
/// One second is cut into `ceil(rps / batch)` ticks spaced `floor(1000 / ticks)` ms apart.
/// Attempts fill ticks `batch` at a time. When a full second's quota has been issued the
/// delay advances by one more tick, so a second boundary that coincides with a batch
/// boundary moves the next attempt two ticks out. When the tick count does not divide
/// 1000 the last tick of each second lands early; that drift is not redistributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPlan {
    requests_per_second: u32,
    batch_size: u32,
    repetitions: u32,
    batches_per_second: u32,
    tick_interval_ms: u64,
}

impl PacingPlan {
    #[must_use]
    pub fn new(config: &DispatchConfig) -> Self {
        let requests_per_second = config.requests_per_second();
        let batch_size = config.batch_size();
        let batches_per_second = requests_per_second.div_ceil(batch_size);
        Self {
            requests_per_second,
            batch_size,
            repetitions: config.repetitions(),
            batches_per_second,
            tick_interval_ms: 1000 / u64::from(batches_per_second),
        }
    }

    #[inline]
    #[must_use]
    pub fn batches_per_second(&self) -> u32 {
        self.batches_per_second
    }

    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[inline]
    #[must_use]
    pub fn total_attempts(&self) -> usize {
        self.requests_per_second as usize * self.repetitions as usize
    }

    #[must_use]
    pub fn offsets(&self) -> Offsets {
        Offsets {
            plan: *self,
            issued: 0,
            in_batch: 0,
            in_interval: 0,
            delay_ms: 0,
        }
    }
}

/// Iterator over attempt start offsets, in scheduling order.
#[derive(Debug, Clone)]
pub struct Offsets {
    plan: PacingPlan,
    issued: usize,
    in_batch: u32,
    in_interval: u32,
    delay_ms: u64,
}

impl Iterator for Offsets {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.issued >= self.plan.total_attempts() {
            return None;
        }
        let offset = Duration::from_millis(self.delay_ms);
        self.issued += 1;
        self.in_batch += 1;
        self.in_interval += 1;

        if self.in_batch >= self.plan.batch_size {
            self.delay_ms += self.plan.tick_interval_ms;
            self.in_batch = 0;
        }
        // Not an else: a second boundary on a batch boundary advances twice.
        if self.in_interval >= self.plan.requests_per_second {
            self.delay_ms += self.plan.tick_interval_ms;
            self.in_batch = 0;
            self.in_interval = 0;
        }
        Some(offset)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.plan.total_attempts() - self.issued;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Offsets {}
