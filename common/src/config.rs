use std::time::Duration;

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(2);
pub const DEFAULT_ARP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Network device to scan from. Auto-selected when `None`.
    pub interface: Option<String>,
    /// How long a whole batch of probes may wait for replies.
    pub deadline: Duration,
    /// Bounded wait for the gateway's ARP reply.
    pub arp_timeout: Duration,
    /// Repeat the latency cycle at this period instead of running once.
    pub interval: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: None,
            deadline: DEFAULT_DEADLINE,
            arp_timeout: DEFAULT_ARP_TIMEOUT,
            interval: None,
        }
    }
}
