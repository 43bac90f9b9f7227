//! Wall-clock frame profiler.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use conetrace_core::Profiler;

/// Accumulated samples for one label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileStats {
    pub count: u32,
    pub total: Duration,
    pub max: Duration,
}

impl ProfileStats {
    /// Mean sample duration.
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count
        }
    }
}

/// Times labelled sections with [`Instant`] and accumulates them per label.
///
/// Sections nest; [`Profiler::end_profile`] closes the innermost one.
#[derive(Debug, Default)]
pub struct FrameProfiler {
    open: Vec<(String, Instant)>,
    stats: BTreeMap<String, ProfileStats>,
}

impl FrameProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats recorded for `label`.
    pub fn stats(&self, label: &str) -> Option<ProfileStats> {
        self.stats.get(label).copied()
    }

    /// Every label with samples, sorted.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.stats.keys().map(String::as_str)
    }

    /// Writes one summary line per label.
    pub fn log_profile(&self) {
        if self.stats.is_empty() {
            log::info!("profile: no samples");
            return;
        }
        for (label, stats) in &self.stats {
            log::info!(
                "profile {label}: {} samples, avg {:.3} ms, max {:.3} ms",
                stats.count,
                stats.average().as_secs_f64() * 1000.0,
                stats.max.as_secs_f64() * 1000.0
            );
        }
    }

    /// Drops all samples and open sections.
    pub fn reset(&mut self) {
        self.open.clear();
        self.stats.clear();
    }
}

impl Profiler for FrameProfiler {
    fn start_profile(&mut self, label: &str) {
        self.open.push((label.to_string(), Instant::now()));
    }

    fn end_profile(&mut self) {
        let Some((label, start)) = self.open.pop() else {
            log::warn!("end_profile called with no open section");
            return;
        };
        let elapsed = start.elapsed();
        let stats = self.stats.entry(label).or_default();
        stats.count += 1;
        stats.total += elapsed;
        stats.max = stats.max.max(elapsed);
    }
}
