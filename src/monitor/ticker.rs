use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::monitor::actor::MonitorMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimerKind {
    /// Advances the timeline clock
    Clock,
    /// Ages nodes and evicts stale ones
    Aging,
}

impl std::fmt::Display for TimerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerKind::Clock => write!(f, "clock"),
            TimerKind::Aging => write!(f, "aging"),
        }
    }
}

/// Periodic task that feeds tick messages into the monitor mailbox
pub struct Ticker {
    kind: TimerKind,
    interval: Duration,
}

impl Ticker {
    pub fn new(kind: TimerKind, interval: Duration) -> Self {
        Self { kind, interval }
    }

    /// Run until cancelled or until the monitor goes away. The first tick is
    /// sent one full period after start.
    ///
    /// Only a weak sender is held between ticks, so a running timer never
    /// keeps the monitor alive once its last handle is dropped.
    pub async fn run(&self, tx: mpsc::WeakSender<MonitorMessage>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let Some(tx) = tx.upgrade() else {
                        break;
                    };
                    if tx.send(MonitorMessage::Tick(self.kind)).await.is_err() {
                        // Monitor dropped, stop ticking
                        break;
                    }
                }
            }
        }
    }
}
