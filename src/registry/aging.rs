use crate::registry::registry::{RemovedNode, SlotRegistry};

/// Evicts hosts that stopped reporting.
///
/// The feed has no "node left" message, so a host that was killed or
/// partitioned is only noticed by its age growing past the threshold.
#[derive(Debug, Clone, Copy)]
pub struct AgingMonitor {
    threshold: u32,
}

impl AgingMonitor {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// One aging tick: age every node and remove those past the threshold.
    pub fn sweep(&self, registry: &mut SlotRegistry) -> Vec<RemovedNode> {
        let stale: Vec<String> = registry
            .nodes_mut()
            .filter_map(|node| {
                let age = node.bump_age();
                (age > self.threshold).then(|| node.host().to_string())
            })
            .collect();

        stale
            .iter()
            .filter_map(|host| registry.remove_node(host))
            .inspect(|removed| {
                tracing::info!(
                    host = %removed.host,
                    threshold = self.threshold,
                    orphaned = removed.orphaned_jobs.len(),
                    "Stale node removed"
                );
            })
            .collect()
    }
}
