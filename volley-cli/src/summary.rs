use std::collections::BTreeMap;

use chrono::Utc;
use tracing::info;
use volley::{AttemptState, OutcomeRecord, RequestDescriptor};

/// Counts and latency spread of one run, for the console.
#[derive(Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub requests: usize,
    pub status_counts: BTreeMap<u16, usize>,
    pub timed_out: usize,
    pub errored: usize,
    pub min_elapsed_ms: u64,
    pub max_elapsed_ms: u64,
    /// `(start, end, count)` for `start <= elapsed < end`, up to and including the slowest attempt.
    pub buckets: Vec<(u64, u64, usize)>,
}

impl RunSummary {
    #[must_use]
    pub fn from_records(records: &[OutcomeRecord], bucket_ms: u64) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        let bucket_ms = bucket_ms.max(1);
        let mut status_counts = BTreeMap::new();
        let (mut timed_out, mut errored) = (0, 0);
        let mut min = u64::MAX;
        let mut max = u64::MIN;
        for record in records {
            update_range(record.elapsed_millis, &mut min, &mut max);
            match record.state() {
                AttemptState::Succeeded => {
                    if let Some(status) = record.status() {
                        *status_counts.entry(status.as_u16()).or_insert(0) += 1;
                    }
                }
                AttemptState::TimedOut => timed_out += 1,
                AttemptState::Errored => errored += 1,
            }
        }

        let mut buckets = Vec::new();
        let mut start = 0;
        while start <= max {
            let Some(end) = start.checked_add(bucket_ms) else {
                break;
            };
            let count = records
                .iter()
                .filter(|r| r.elapsed_millis >= start && r.elapsed_millis < end)
                .count();
            buckets.push((start, end, count));
            start = end;
        }

        Some(Self {
            requests: records.len(),
            status_counts,
            timed_out,
            errored,
            min_elapsed_ms: min,
            max_elapsed_ms: max,
            buckets,
        })
    }

    pub fn log(&self, descriptor: &RequestDescriptor) {
        info!("{}", "#".repeat(100));
        info!("Time: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        info!("Uri: {}", descriptor.endpoint());
        info!("Method: {}", descriptor.method());
        info!("Requests: {}", self.requests);
        info!("STATUS CODES");
        for (status, count) in &self.status_counts {
            info!("{status}: {count}");
        }
        if self.timed_out + self.errored > 0 {
            info!(
                "Failures: {} (timed out: {}, errored: {})",
                self.timed_out + self.errored,
                self.timed_out,
                self.errored
            );
        }
        info!("RESPONSE TIMES");
        info!(
            "min: {}ms   max: {}ms",
            self.min_elapsed_ms, self.max_elapsed_ms
        );
        for (start, end, count) in &self.buckets {
            info!("{start} <= t < {end} : {count}");
        }
        info!("{}", "#".repeat(100));
    }
}

fn update_range(cur: u64, min: &mut u64, max: &mut u64) {
    if cur < *min {
        *min = cur;
    }
    if cur > *max {
        *max = cur;
    }
}
