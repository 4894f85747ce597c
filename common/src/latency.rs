//! Latency results and the summary the monitor derives from them.

use std::collections::HashMap;
use std::time::Duration;

/// Host label (`ip:port` as handed to the scanner) to measured round-trip time.
///
/// Hosts that did not answer before the deadline are simply absent.
pub type LatencyMap = HashMap<String, Duration>;

/// Aggregate view over one scan.
///
/// `high`, `low` and `average` only consider hosts that replied. They are
/// zero when nobody replied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatencySummary {
    pub high: Duration,
    pub low: Duration,
    pub average: Duration,
    pub hosts_probed: usize,
    pub hosts_replied: usize,
}

impl LatencySummary {
    pub fn from_results(results: &LatencyMap, hosts_probed: usize) -> Self {
        let hosts_replied: usize = results.len();
        if hosts_replied == 0 {
            return Self {
                hosts_probed,
                ..Self::default()
            };
        }

        let high: Duration = results.values().copied().max().unwrap_or_default();
        let low: Duration = results.values().copied().min().unwrap_or_default();
        let total: Duration = results.values().sum();
        let average: Duration = total / hosts_replied as u32;

        Self {
            high,
            low,
            average,
            hosts_probed,
            hosts_replied,
        }
    }

    /// Replied / probed as a fraction in `[0, 1]`.
    pub fn response_rate(&self) -> f64 {
        if self.hosts_probed == 0 {
            return 0.0;
        }
        self.hosts_replied as f64 / self.hosts_probed as f64
    }

    pub fn has_replies(&self) -> bool {
        self.hosts_replied > 0
    }
}
