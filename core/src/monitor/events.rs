//! Beacon node event dispatch.
//!
//! Nothing in this crate subscribes to a beacon node. An event-stream client
//! (the node's `/eth/v1/events` SSE endpoint) is expected to decode each
//! message into a [`BeaconEvent`] and feed it to [`BeaconEventHandler::handle`].

use std::time::Duration;

use tracing::{info, warn};

use super::watchdog::BlockTimeWatchdog;

pub const SLOTS_PER_EPOCH: u64 = 32;

/// Events streamed by a beacon node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeaconEvent {
    Block { slot: u64, root: String },
    Checkpoint { epoch: u64, root: String },
    Reorg { slot: u64, depth: u64, old_head: String, new_head: String },
    /// A topic we do not handle.
    Unknown(String),
}

pub fn epoch_of(slot: u64) -> u64 {
    slot / SLOTS_PER_EPOCH
}

/// Routes beacon events to the watchdog and the log.
pub struct BeaconEventHandler {
    watchdog: BlockTimeWatchdog,
}

impl BeaconEventHandler {
    pub fn new(watchdog: BlockTimeWatchdog) -> Self {
        Self { watchdog }
    }

    pub fn handle(&mut self, event: &BeaconEvent) {
        match event {
            BeaconEvent::Block { slot, root } => {
                let last: Duration = self.watchdog.on_block().unwrap_or_default();
                info!(
                    epoch = epoch_of(*slot),
                    slot,
                    root = %root,
                    last = ?last,
                    "New beacon block"
                );
            }
            BeaconEvent::Checkpoint { epoch, root } => {
                info!(epoch, root = %root, "Finalized checkpoint");
            }
            BeaconEvent::Reorg {
                slot,
                depth,
                old_head,
                new_head,
            } => {
                warn!(slot, depth, old_head = %old_head, new_head = %new_head, "Chain reorg");
            }
            BeaconEvent::Unknown(topic) => {
                warn!(topic = %topic, "Unhandled beacon event");
            }
        }
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
