//! Liveness signal producer.
//!
//! Every period the producer logs the lifetime counters and then offers a
//! signal to the pinger. The queue is bounded; when the pinger is behind, the
//! signal is dropped rather than blocking the ticker.

use std::sync::Arc;
use std::time::Duration;

use dogebot_core::MetricsSink;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LivenessSignal;

pub type LivenessReceiver = mpsc::Receiver<LivenessSignal>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    pub capacity: usize,
}

pub struct Heartbeat {
    settings: HeartbeatSettings,
    metrics: Arc<dyn MetricsSink>,
    sender: mpsc::Sender<LivenessSignal>,
}

impl Heartbeat {
    pub fn new(settings: HeartbeatSettings, metrics: Arc<dyn MetricsSink>) -> (Self, LivenessReceiver) {
        let (sender, receiver) = mpsc::channel(settings.capacity.max(1));
        (Self { settings, metrics, sender }, receiver)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Returns once the receiving side is gone.
    pub async fn run(self) {
        let start = tokio::time::Instant::now() + self.settings.interval;
        let mut ticker = tokio::time::interval_at(start, self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !self.beat() {
                info!(event_name = "bot.heartbeat.stopped", "liveness receiver closed; heartbeat stopping");
                return;
            }
        }
    }

    fn beat(&self) -> bool {
        let counters = self.metrics.snapshot();
        info!(
            event_name = "bot.heartbeat.counters",
            ignored = counters.ignored,
            regular = counters.regular,
            changed = counters.changed,
            matched = counters.matched,
            "{counters}"
        );

        match self.sender.try_send(LivenessSignal) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    event_name = "bot.heartbeat.signal_dropped",
                    capacity = self.settings.capacity,
                    "liveness queue full; dropping signal"
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
