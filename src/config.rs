use std::net::SocketAddr;
use std::time::Duration;

/// Largest `max_kids` a host may report. Larger values are rejected as
/// malformed and never turn into lanes.
pub const DEFAULT_MAX_SLOTS_PER_NODE: u32 = 1024;

/// Configuration for the optional JSON dashboard.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub addr: SocketAddr,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            // SAFETY: This is a hardcoded valid address that will always parse
            addr: "127.0.0.1:8765"
                .parse()
                .expect("default dashboard address is valid"),
        }
    }
}

/// Timing and sizing knobs for the monitor core.
///
/// The clock tick is the unit of the timeline: every slot history is stamped
/// with the tick at which an entry was appended, and pruning keeps only the
/// last `window_ticks` ticks. The aging tick is coarser and drives stale-node
/// eviction.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Period of the logical clock tick
    pub clock_interval_ms: u64,
    /// Period of the aging sweep
    pub aging_interval_ms: u64,
    /// A node is removed once its age exceeds this many aging ticks
    pub stale_after_ticks: u32,
    /// Number of clock ticks of history kept per slot
    pub window_ticks: u64,
    /// Capacity of the actor mailbox
    pub channel_capacity: usize,
    /// Upper bound on remembered job records
    pub max_jobs: usize,
    /// Start the timers as soon as the monitor is spawned
    pub autostart: bool,
    /// Upper bound on lanes per host
    pub max_slots_per_node: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            clock_interval_ms: 200,
            aging_interval_ms: 1000,
            stale_after_ticks: 5,
            window_ticks: 600,
            channel_capacity: 256,
            max_jobs: 10_000,
            autostart: true,
            max_slots_per_node: DEFAULT_MAX_SLOTS_PER_NODE,
        }
    }
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock_interval_ms(mut self, ms: u64) -> Self {
        self.clock_interval_ms = ms;
        self
    }

    pub fn with_aging_interval_ms(mut self, ms: u64) -> Self {
        self.aging_interval_ms = ms;
        self
    }

    pub fn with_stale_after_ticks(mut self, ticks: u32) -> Self {
        self.stale_after_ticks = ticks;
        self
    }

    pub fn with_window_ticks(mut self, ticks: u64) -> Self {
        self.window_ticks = ticks;
        self
    }

    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    pub fn with_autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    pub fn with_max_slots_per_node(mut self, max_slots: u32) -> Self {
        self.max_slots_per_node = max_slots;
        self
    }

    pub fn clock_interval(&self) -> Duration {
        Duration::from_millis(self.clock_interval_ms)
    }

    pub fn aging_interval(&self) -> Duration {
        Duration::from_millis(self.aging_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_config_default() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.clock_interval_ms, 200);
        assert_eq!(cfg.aging_interval_ms, 1000);
        assert_eq!(cfg.stale_after_ticks, 5);
        assert_eq!(cfg.window_ticks, 600);
        assert_eq!(cfg.channel_capacity, 256);
        assert_eq!(cfg.max_jobs, 10_000);
        assert!(cfg.autostart);
        assert_eq!(cfg.max_slots_per_node, DEFAULT_MAX_SLOTS_PER_NODE);
    }

    #[test]
    fn aging_is_coarser_than_clock_by_default() {
        let cfg = MonitorConfig::default();
        assert!(cfg.aging_interval() > cfg.clock_interval());
    }

    #[test]
    fn builder_overrides_fields() {
        let cfg = MonitorConfig::new()
            .with_clock_interval_ms(10)
            .with_aging_interval_ms(50)
            .with_stale_after_ticks(2)
            .with_window_ticks(30)
            .with_max_jobs(4)
            .with_autostart(false)
            .with_max_slots_per_node(8);
        assert_eq!(cfg.clock_interval(), Duration::from_millis(10));
        assert_eq!(cfg.aging_interval(), Duration::from_millis(50));
        assert_eq!(cfg.stale_after_ticks, 2);
        assert_eq!(cfg.window_ticks, 30);
        assert_eq!(cfg.max_jobs, 4);
        assert!(!cfg.autostart);
        assert_eq!(cfg.max_slots_per_node, 8);
    }

    #[test]
    fn dashboard_config_default_is_loopback() {
        let cfg = DashboardConfig::default();
        assert!(cfg.addr.ip().is_loopback());
        assert_eq!(cfg.addr.port(), 8765);
    }
}
