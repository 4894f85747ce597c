//! Alerts when a node goes too long without seeing a new block.
//!
//! Each alert level is a one-shot timer. A new block cancels every pending
//! timer and arms a fresh set, so each level fires at most once per block.
//!
//! Blocks are reported by [`BeaconEventHandler`](super::events::BeaconEventHandler),
//! the consumer of a node's event stream. Whoever owns the alert receiver
//! decides what an alert triggers beyond the warning logged here.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;

/// Default thresholds: one, two and three missed slots.
pub const DEFAULT_LEVELS: [Duration; 3] = [
    Duration::from_secs(12),
    Duration::from_secs(24),
    Duration::from_secs(36),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTimeAlert {
    pub level: Duration,
    /// When the block that started the timer arrived.
    pub since: Instant,
}

pub struct BlockTimeWatchdog {
    levels: Vec<Duration>,
    alerts: UnboundedSender<BlockTimeAlert>,
    timers: Vec<JoinHandle<()>>,
    last_block: Option<Instant>,
}

impl BlockTimeWatchdog {
    pub fn new(levels: Vec<Duration>, alerts: UnboundedSender<BlockTimeAlert>) -> Self {
        Self {
            levels,
            alerts,
            timers: Vec::new(),
            last_block: None,
        }
    }

    /// Starts the timers without a block, e.g. right after connecting.
    pub fn arm(&mut self) {
        self.rearm(Instant::now());
    }

    /// Registers a new block and returns the time since the previous one.
    pub fn on_block(&mut self) -> Option<Duration> {
        let now: Instant = Instant::now();
        let since_last: Option<Duration> = self.last_block.map(|last| now.duration_since(last));
        self.last_block = Some(now);
        self.rearm(now);
        since_last
    }

    pub fn pending(&self) -> usize {
        self.timers.iter().filter(|timer| !timer.is_finished()).count()
    }

    fn rearm(&mut self, since: Instant) {
        self.cancel();
        for &level in &self.levels {
            let alerts = self.alerts.clone();
            self.timers.push(tokio::spawn(async move {
                tokio::time::sleep_until(since + level).await;
                warn!("{level:?} since last block");
                let _ = alerts.send(BlockTimeAlert { level, since });
            }));
        }
    }

    fn cancel(&mut self) {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }
}

impl Drop for BlockTimeWatchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[tokio::test(start_paused = true)]
    async fn levels_fire_in_order_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watchdog = BlockTimeWatchdog::new(DEFAULT_LEVELS.to_vec(), tx);
        let start = Instant::now();
        watchdog.on_block();

        for expected in DEFAULT_LEVELS {
            let alert = rx.recv().await.unwrap();
            assert_eq!(alert.level, expected);
            assert_eq!(alert.since, start);
            assert!(start.elapsed() >= expected);
        }

        tokio::time::sleep(secs(120)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(watchdog.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn new_block_rearms_timers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watchdog = BlockTimeWatchdog::new(vec![secs(12)], tx);

        assert_eq!(watchdog.on_block(), None);
        tokio::time::sleep(secs(10)).await;
        let gap = watchdog.on_block().unwrap();
        assert!(gap >= secs(10) && gap < secs(11), "{gap:?}");

        // the first block's timer would have fired at 12s
        tokio::time::sleep(secs(11)).await;
        assert!(rx.try_recv().is_err());

        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.level, secs(12));
        assert!(alert.since.elapsed() >= secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_pending_timers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watchdog = BlockTimeWatchdog::new(vec![secs(12)], tx);
        watchdog.arm();
        drop(watchdog);

        assert!(rx.recv().await.is_none());
    }
}
