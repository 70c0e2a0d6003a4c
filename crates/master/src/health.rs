//! Node health state machine (§4.3, §9 Open Questions).
//!
//! Heartbeat cadence isn't fixed by spec.md; this implementation resolves it
//! as 5s heartbeats, 3 missed heartbeats (15s of silence) demoting a node
//! from Up to Questionable, and a further 15s of silence (30s total)
//! demoting Questionable to Down. A successful `Register` or probe at any
//! point promotes the node back to Up.

use loopcache_corelib::node::NodeStatus;
use std::time::{Duration, Instant};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
pub const MISSES_BEFORE_QUESTIONABLE: u32 = 3;
pub const QUESTIONABLE_SILENCE_TO_DOWN: Duration = Duration::from_secs(15);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Silence threshold before Up demotes to Questionable.
pub const UP_SILENCE_TO_QUESTIONABLE: Duration =
    Duration::from_secs(HEARTBEAT_INTERVAL.as_secs() * MISSES_BEFORE_QUESTIONABLE as u64);

#[derive(Debug, Clone)]
pub struct HealthEntry {
    pub status: NodeStatus,
    pub last_seen: Instant,
    pub questionable_since: Option<Instant>,
}

impl HealthEntry {
    pub fn new_up(now: Instant) -> Self {
        Self {
            status: NodeStatus::Up,
            last_seen: now,
            questionable_since: None,
        }
    }

    /// Record a successful contact (`Register`, heartbeat, or probe): always
    /// promotes straight back to Up.
    pub fn mark_contacted(&mut self, now: Instant) {
        self.status = NodeStatus::Up;
        self.last_seen = now;
        self.questionable_since = None;
    }

    /// Advisory demotion from a client's `NodeDown` report (§9: "advisory,
    /// not authoritative" — it only schedules a probe, it doesn't touch
    /// `last_seen`).
    pub fn mark_reported_down(&mut self, now: Instant) {
        if self.status == NodeStatus::Up {
            self.status = NodeStatus::Questionable;
            self.questionable_since = Some(now);
        }
    }

    /// Run one sweep tick against the wall clock, returning the new status
    /// if it changed.
    pub fn sweep(&mut self, now: Instant) -> Option<NodeStatus> {
        let elapsed = now.saturating_duration_since(self.last_seen);
        match self.status {
            NodeStatus::Up => {
                if elapsed >= UP_SILENCE_TO_QUESTIONABLE {
                    self.status = NodeStatus::Questionable;
                    self.questionable_since = Some(now);
                    Some(self.status)
                } else {
                    None
                }
            }
            NodeStatus::Questionable => {
                let since = self.questionable_since.unwrap_or(now);
                if now.saturating_duration_since(since) >= QUESTIONABLE_SILENCE_TO_DOWN {
                    self.status = NodeStatus::Down;
                    Some(self.status)
                } else {
                    None
                }
            }
            NodeStatus::Down => None,
        }
    }
}
