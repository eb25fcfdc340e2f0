use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::feed::ingestor::{require_capacity, require_host};
use crate::feed::{EventIngestor, Ingested, SchedulerEvent};
use crate::job::JobRecord;
use crate::monitor::ticker::{Ticker, TimerKind};
use crate::registry::{AgingMonitor, RegistrySnapshot, SlotRegistry};
use crate::view::StatusView;

/// Everything that can mutate monitor state, funnelled through one mailbox
pub enum MonitorMessage {
    /// An event from the scheduler feed
    Event(SchedulerEvent),
    /// Manual node check, same effect as a `NodeStats` event
    CheckNode { host: String, max_kids: u32 },
    Tick(TimerKind),
    StartTimers,
    StopTimers,
    StartTimer(TimerKind),
    StopTimer(TimerKind),
    /// Attach a renderer; it is replayed every remembered job first
    AttachView(Box<dyn StatusView>),
    /// The feed adapter lost the scheduler connection
    ConnectionLost,
    /// Reply with the snapshot reflecting every earlier message
    Snapshot(oneshot::Sender<Arc<MonitorSnapshot>>),
}

/// What presentation layers see after each mutation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorSnapshot {
    /// Increases by one with every publication
    pub sequence: u64,
    pub registry: RegistrySnapshot,
    pub clock_running: bool,
    pub aging_running: bool,
    pub connected: bool,
    pub tracked_jobs: usize,
    pub malformed_events: u64,
}

impl MonitorSnapshot {
    pub fn running(&self) -> bool {
        self.clock_running || self.aging_running
    }
}

/// Messages applied back to back before a snapshot is forced out.
const PUBLISH_BATCH: usize = 256;

/// Single writer over the job store, the registry and the aging state.
///
/// Feed events, timer ticks and UI requests all arrive as [`MonitorMessage`]s
/// and are applied strictly in mailbox order, so slot assignment and aging
/// always see a consistent registry. A burst of messages is applied as one
/// batch and published once, when the mailbox runs dry or the batch is full.
pub struct Monitor {
    config: MonitorConfig,
    ingestor: EventIngestor,
    registry: SlotRegistry,
    aging: AgingMonitor,
    views: Vec<Box<dyn StatusView>>,
    rx: mpsc::Receiver<MonitorMessage>,
    tx: mpsc::WeakSender<MonitorMessage>,
    snapshot_tx: watch::Sender<Arc<MonitorSnapshot>>,
    clock_timer: Option<CancellationToken>,
    aging_timer: Option<CancellationToken>,
    shutdown: CancellationToken,
    connected: bool,
    malformed_events: u64,
    dirty: bool,
    published: u64,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> (Self, MonitorHandle) {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(MonitorSnapshot {
            connected: true,
            ..Default::default()
        }));
        let shutdown = CancellationToken::new();

        let max_slots_per_node = config.max_slots_per_node;
        let monitor = Self {
            ingestor: EventIngestor::new(config.max_jobs)
                .with_max_slots_per_node(max_slots_per_node),
            registry: SlotRegistry::new(config.window_ticks)
                .with_max_slots_per_node(max_slots_per_node),
            aging: AgingMonitor::new(config.stale_after_ticks),
            views: Vec::new(),
            rx,
            tx: tx.downgrade(),
            snapshot_tx,
            clock_timer: None,
            aging_timer: None,
            shutdown: shutdown.clone(),
            connected: true,
            malformed_events: 0,
            dirty: false,
            published: 0,
            config,
        };
        let handle = MonitorHandle {
            tx,
            snapshots: snapshot_rx,
            shutdown,
            max_slots_per_node,
        };

        (monitor, handle)
    }

    /// Create a monitor and run it on the current runtime.
    pub fn spawn(config: MonitorConfig) -> MonitorHandle {
        let (monitor, handle) = Self::new(config);
        tokio::spawn(monitor.run());
        handle
    }

    /// Main loop. Returns when shut down or when every handle is gone;
    /// running timers hold no handle of their own.
    pub async fn run(mut self) {
        if self.config.autostart {
            self.start_timer(TimerKind::Clock);
            self.start_timer(TimerKind::Aging);
        }
        self.publish();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                msg = self.rx.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle(msg);
                    for _ in 1..PUBLISH_BATCH {
                        match self.rx.try_recv() {
                            Ok(msg) => self.handle(msg),
                            Err(_) => break,
                        }
                    }
                    self.flush();
                }
            }
        }

        self.stop_timer(TimerKind::Clock);
        self.stop_timer(TimerKind::Aging);
        tracing::info!("Monitor stopped");
    }

    fn handle(&mut self, msg: MonitorMessage) {
        match msg {
            MonitorMessage::Event(event) => self.apply_event(event),
            MonitorMessage::CheckNode { host, max_kids } => self.check_node(&host, max_kids),
            MonitorMessage::Tick(TimerKind::Clock) => {
                self.registry.advance_clock();
            }
            MonitorMessage::Tick(TimerKind::Aging) => {
                let removed = self.aging.sweep(&mut self.registry);
                for node in removed {
                    let orphans = self.ingestor.orphan(&node.orphaned_jobs);
                    self.notify(&orphans);
                }
            }
            MonitorMessage::StartTimers => {
                self.start_timer(TimerKind::Clock);
                self.start_timer(TimerKind::Aging);
            }
            MonitorMessage::StopTimers => {
                self.stop_timer(TimerKind::Clock);
                self.stop_timer(TimerKind::Aging);
            }
            MonitorMessage::StartTimer(kind) => self.start_timer(kind),
            MonitorMessage::StopTimer(kind) => self.stop_timer(kind),
            MonitorMessage::AttachView(mut view) => {
                for job in self.ingestor.jobs().all_jobs() {
                    view.on_update(job);
                }
                self.views.push(view);
                tracing::debug!(views = self.views.len(), "View attached");
            }
            MonitorMessage::ConnectionLost => self.mark_disconnected(),
            MonitorMessage::Snapshot(reply) => {
                self.flush();
                let _ = reply.send(self.snapshot_tx.borrow().clone());
                return;
            }
        }
        self.dirty = true;
    }

    fn apply_event(&mut self, event: SchedulerEvent) {
        let kind = event.kind();
        if matches!(
            event,
            SchedulerEvent::AssignCompileServer { .. } | SchedulerEvent::LocalJobBegin { .. }
        ) {
            let registry = &self.registry;
            let evicted = self
                .ingestor
                .make_room(|job_id| registry.slot_of(job_id).is_some());
            self.notify(&evicted);
        }

        match self.ingestor.ingest(event) {
            Ok(Ingested::Job(job)) => {
                self.connected = true;
                self.registry.on_job_update(&job);
                for view in self.views.iter_mut() {
                    view.on_update(&job);
                }
            }
            Ok(Ingested::NodeStats { host, max_kids }) => {
                self.connected = true;
                self.check_node(&host, max_kids);
            }
            Ok(Ingested::Ignored) => {}
            Ok(Ingested::StreamEnd) => self.mark_disconnected(),
            Err(e) => {
                self.malformed_events += 1;
                tracing::warn!(event = kind, error = %e, "Malformed event discarded");
            }
        }
    }

    fn notify(&mut self, jobs: &[JobRecord]) {
        for job in jobs {
            for view in self.views.iter_mut() {
                view.on_update(job);
            }
        }
    }

    fn check_node(&mut self, host: &str, max_kids: u32) {
        self.registry.on_node_stats(host, max_kids);
        for view in self.views.iter_mut() {
            view.on_check_node(host, max_kids);
        }
    }

    fn mark_disconnected(&mut self) {
        if self.connected {
            self.connected = false;
            tracing::info!(
                nodes = self.registry.len(),
                jobs = self.ingestor.jobs().len(),
                "Scheduler connection lost, keeping last known state"
            );
        }
    }

    fn timer_slot(&mut self, kind: TimerKind) -> &mut Option<CancellationToken> {
        match kind {
            TimerKind::Clock => &mut self.clock_timer,
            TimerKind::Aging => &mut self.aging_timer,
        }
    }

    fn start_timer(&mut self, kind: TimerKind) {
        if self.timer_slot(kind).is_some() {
            return;
        }
        let tx = self.tx.clone();
        let interval = match kind {
            TimerKind::Clock => self.config.clock_interval(),
            TimerKind::Aging => self.config.aging_interval(),
        }
        .max(Duration::from_millis(1));

        let token = self.shutdown.child_token();
        let ticker = Ticker::new(kind, interval);
        let cancel = token.clone();
        tokio::spawn(async move {
            ticker.run(tx, cancel).await;
        });
        *self.timer_slot(kind) = Some(token);
        tracing::info!(timer = %kind, interval_ms = interval.as_millis() as u64, "Timer started");
    }

    fn stop_timer(&mut self, kind: TimerKind) {
        if let Some(token) = self.timer_slot(kind).take() {
            token.cancel();
            tracing::info!(timer = %kind, "Timer stopped");
        }
    }

    /// Publish if anything changed since the last snapshot.
    fn flush(&mut self) {
        if self.dirty {
            self.publish();
            self.dirty = false;
        }
    }

    fn publish(&mut self) {
        self.published += 1;
        let snapshot = MonitorSnapshot {
            sequence: self.published,
            registry: self.registry.snapshot(),
            clock_running: self.clock_timer.is_some(),
            aging_running: self.aging_timer.is_some(),
            connected: self.connected,
            tracked_jobs: self.ingestor.jobs().len(),
            malformed_events: self.malformed_events,
        };
        self.snapshot_tx.send_replace(Arc::new(snapshot));
    }
}

/// Cloneable front door to a running [`Monitor`].
#[derive(Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<MonitorMessage>,
    snapshots: watch::Receiver<Arc<MonitorSnapshot>>,
    shutdown: CancellationToken,
    max_slots_per_node: u32,
}

impl MonitorHandle {
    pub async fn send(&self, msg: MonitorMessage) -> Result<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| MonitorError::MonitorClosed)
    }

    pub async fn send_event(&self, event: SchedulerEvent) -> Result<()> {
        self.send(MonitorMessage::Event(event)).await
    }

    /// UI "check nodes" action. An empty host or a capacity above the lane
    /// limit is rejected with `MalformedEvent` before reaching the monitor.
    pub async fn request_node_check(&self, host: impl Into<String>, max_kids: u32) -> Result<()> {
        let host = host.into();
        require_host("host", &host)?;
        require_capacity(max_kids, self.max_slots_per_node)?;
        self.send(MonitorMessage::CheckNode { host, max_kids }).await
    }

    pub fn max_slots_per_node(&self) -> u32 {
        self.max_slots_per_node
    }

    /// Resume both timers against the accumulated state
    pub async fn start(&self) -> Result<()> {
        self.send(MonitorMessage::StartTimers).await
    }

    /// Pause both timers; nothing recorded so far is discarded
    pub async fn stop(&self) -> Result<()> {
        self.send(MonitorMessage::StopTimers).await
    }

    pub async fn start_timer(&self, kind: TimerKind) -> Result<()> {
        self.send(MonitorMessage::StartTimer(kind)).await
    }

    pub async fn stop_timer(&self, kind: TimerKind) -> Result<()> {
        self.send(MonitorMessage::StopTimer(kind)).await
    }

    /// Inject one tick, exactly as the timer would
    pub async fn tick(&self, kind: TimerKind) -> Result<()> {
        self.send(MonitorMessage::Tick(kind)).await
    }

    pub async fn attach_view<V: StatusView + 'static>(&self, view: V) -> Result<()> {
        self.send(MonitorMessage::AttachView(Box::new(view))).await
    }

    pub async fn connection_lost(&self) -> Result<()> {
        self.send(MonitorMessage::ConnectionLost).await
    }

    /// Live view of the monitor; the value changes after every applied batch.
    pub fn subscribe(&self) -> watch::Receiver<Arc<MonitorSnapshot>> {
        self.snapshots.clone()
    }

    /// Most recently published snapshot, without waiting.
    pub fn latest(&self) -> Arc<MonitorSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Snapshot taken after every message sent before this call was applied.
    pub async fn snapshot(&self) -> Result<Arc<MonitorSnapshot>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(MonitorMessage::Snapshot(reply_tx)).await?;
        reply_rx.await.map_err(|_| MonitorError::MonitorClosed)
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
