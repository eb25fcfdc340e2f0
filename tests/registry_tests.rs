use icemon_lite::job::{JobOutcome, JobRecord, JobState, Language};
use icemon_lite::registry::{color_for_host, Placement, SlotId, SlotRegistry};

fn waiting(id: u32, client: &str) -> JobRecord {
    JobRecord::waiting(
        id,
        client.to_string(),
        format!("file{}.cpp", id),
        String::new(),
        Language::Cxx,
    )
}

fn compiling(id: u32, client: &str, server: &str) -> JobRecord {
    let mut job = waiting(id, client);
    job.begin(server.to_string(), None).unwrap();
    job
}

fn finished(mut job: JobRecord) -> JobRecord {
    job.finish(0, JobOutcome::default()).unwrap();
    job
}

fn slot_ids(registry: &SlotRegistry, host: &str) -> Vec<SlotId> {
    registry
        .node_by_host(host)
        .map(|n| n.slots().iter().map(|s| s.id()).collect())
        .unwrap_or_default()
}

#[test]
fn test_node_stats_creates_idle_slots() {
    let mut registry = SlotRegistry::new(100);
    registry.on_node_stats("alpha", 3);

    let node = registry.node_by_host("alpha").unwrap();
    assert_eq!(node.capacity(), 3);
    assert!(node.capacity_reported());
    assert_eq!(node.slots().len(), 3);
    assert!(node.slots().iter().all(|s| s.fully_idle()));
    assert_eq!(node.color(), color_for_host("alpha"));
}

#[test]
fn test_capacity_two_scenario_reuses_slot_zero() {
    let mut registry = SlotRegistry::new(100);
    registry.on_node_stats("alpha", 2);
    let slots = slot_ids(&registry, "alpha");

    registry.on_job_update(&waiting(1, "alpha"));
    let job1 = compiling(1, "alpha", "alpha");
    let placement = registry.on_job_update(&job1);
    assert!(matches!(placement, Placement::Routed { .. }));
    assert_eq!(registry.slot_of(1).map(|(_, s)| s), Some(slots[0]));

    registry.on_job_update(&waiting(2, "alpha"));
    registry.on_job_update(&compiling(2, "alpha", "alpha"));
    assert_eq!(registry.slot_of(2).map(|(_, s)| s), Some(slots[1]));

    registry.on_job_update(&finished(job1));
    let node = registry.node_by_host("alpha").unwrap();
    assert!(node.slot(slots[0]).unwrap().is_free());
    assert!(!node.slot(slots[1]).unwrap().is_free());

    registry.on_job_update(&waiting(3, "alpha"));
    registry.on_job_update(&compiling(3, "alpha", "alpha"));
    assert_eq!(registry.slot_of(3).map(|(_, s)| s), Some(slots[0]));
    assert_eq!(slot_ids(&registry, "alpha"), slots);
}

#[test]
fn test_repeated_updates_route_to_same_slot() {
    let mut registry = SlotRegistry::new(100);
    registry.on_node_stats("alpha", 4);

    let first = registry.on_job_update(&compiling(7, "beta", "alpha"));
    let (node, slot) = first.slot().unwrap();

    for _ in 0..5 {
        let placement = registry.on_job_update(&compiling(7, "beta", "alpha"));
        assert_eq!(placement, Placement::Routed { node, slot });
    }
    assert_eq!(registry.indexed_jobs(), 1);

    // Identical updates collapse into one timeline entry
    let slot = registry.node(node).unwrap().slot(slot).unwrap();
    assert_eq!(slot.timeline().len(), 2);
}

#[test]
fn test_fully_idle_slot_is_last_resort() {
    let mut registry = SlotRegistry::new(100);
    registry.on_node_stats("alpha", 1);
    let idle = slot_ids(&registry, "alpha")[0];

    // No used lane exists; the idle one is taken
    registry.on_job_update(&compiling(1, "x", "alpha"));
    assert_eq!(registry.slot_of(1).map(|(_, s)| s), Some(idle));
}

#[test]
fn test_used_free_slot_preferred_over_earlier_fully_idle_slot() {
    let mut registry = SlotRegistry::new(2);
    registry.on_node_stats("alpha", 2);
    let slots = slot_ids(&registry, "alpha");

    // Job 1 holds A, job 2 holds B
    registry.on_job_update(&waiting(1, "alpha"));
    registry.on_job_update(&compiling(2, "x", "alpha"));
    assert_eq!(registry.slot_of(2).map(|(_, s)| s), Some(slots[1]));

    // Job 1 moves to another host and job 2 finishes
    registry.on_job_update(&compiling(1, "alpha", "beta"));
    registry.on_job_update(&finished(compiling(2, "x", "alpha")));

    // Once history ages out, A is back to a lone placeholder
    for _ in 0..5 {
        registry.advance_clock();
    }
    let node = registry.node_by_host("alpha").unwrap();
    assert!(node.slot(slots[0]).unwrap().fully_idle());
    assert!(node.slot(slots[1]).unwrap().is_free());
    assert!(!node.slot(slots[1]).unwrap().fully_idle());

    registry.on_job_update(&compiling(3, "x", "alpha"));
    assert_eq!(registry.slot_of(3).map(|(_, s)| s), Some(slots[1]));
}

#[test]
fn test_saturated_node_drops_updates() {
    let mut registry = SlotRegistry::new(100);
    registry.on_node_stats("alpha", 1);

    registry.on_job_update(&compiling(1, "x", "alpha"));
    let placement = registry.on_job_update(&compiling(2, "x", "alpha"));

    assert_eq!(placement, Placement::Dropped);
    assert_eq!(registry.dropped_updates(), 1);
    assert!(registry.slot_of(2).is_none());
    assert_eq!(registry.node_by_host("alpha").unwrap().slots().len(), 1);
}

#[test]
fn test_unreported_capacity_grows_with_concurrency() {
    let mut registry = SlotRegistry::new(100);

    registry.on_job_update(&compiling(1, "x", "beta"));
    registry.on_job_update(&compiling(2, "x", "beta"));
    let node = registry.node_by_host("beta").unwrap();
    assert!(!node.capacity_reported());
    assert_eq!(node.capacity(), 2);
    assert_eq!(node.slots().len(), 2);

    // A free lane is reused rather than growing further
    registry.on_job_update(&finished(compiling(1, "x", "beta")));
    let placement = registry.on_job_update(&compiling(3, "x", "beta"));
    assert!(matches!(placement, Placement::Reused { .. }));
    assert_eq!(registry.node_by_host("beta").unwrap().slots().len(), 2);
}

#[test]
fn test_shrinking_capacity_keeps_occupied_slots() {
    let mut registry = SlotRegistry::new(100);
    registry.on_node_stats("alpha", 4);
    registry.on_job_update(&compiling(1, "x", "alpha"));
    registry.on_job_update(&compiling(2, "x", "alpha"));
    registry.on_job_update(&compiling(3, "x", "alpha"));

    registry.on_node_stats("alpha", 1);
    let node = registry.node_by_host("alpha").unwrap();
    assert_eq!(node.capacity(), 1);
    assert_eq!(node.slots().len(), 3);
    assert_eq!(node.occupied_count(), 3);
    for id in 1..=3 {
        assert!(registry.slot_of(id).is_some());
    }

    // Lanes go away as their jobs finish, until capacity is met
    registry.on_job_update(&finished(compiling(3, "x", "alpha")));
    assert_eq!(registry.node_by_host("alpha").unwrap().slots().len(), 2);
    registry.on_job_update(&finished(compiling(1, "x", "alpha")));
    assert_eq!(registry.node_by_host("alpha").unwrap().slots().len(), 1);
    registry.on_job_update(&finished(compiling(2, "x", "alpha")));

    let node = registry.node_by_host("alpha").unwrap();
    assert_eq!(node.slots().len(), 1);
    assert!(node.slots().len() <= node.capacity() as usize);
}

#[test]
fn test_shrinking_capacity_drops_free_slots_from_the_end() {
    let mut registry = SlotRegistry::new(100);
    registry.on_node_stats("alpha", 4);
    let before = slot_ids(&registry, "alpha");
    registry.on_job_update(&compiling(1, "x", "alpha"));

    registry.on_node_stats("alpha", 2);
    assert_eq!(slot_ids(&registry, "alpha"), before[..2].to_vec());
    assert_eq!(registry.slot_of(1).map(|(_, s)| s), Some(before[0]));
}

#[test]
fn test_finished_job_releases_index_entry() {
    let mut registry = SlotRegistry::new(100);
    registry.on_job_update(&compiling(1, "x", "alpha"));
    assert_eq!(registry.indexed_jobs(), 1);

    registry.on_job_update(&finished(compiling(1, "x", "alpha")));
    assert_eq!(registry.indexed_jobs(), 0);

    // A terminal update for a job without a lane is not placed anywhere
    let placement = registry.on_job_update(&finished(compiling(2, "x", "alpha")));
    assert_eq!(placement, Placement::Untracked);
}

#[test]
fn test_job_moving_hosts_frees_old_slot() {
    let mut registry = SlotRegistry::new(100);
    registry.on_node_stats("client", 1);
    registry.on_node_stats("server", 1);

    registry.on_job_update(&waiting(1, "client"));
    let (client_id, client_slot) = registry.slot_of(1).unwrap();
    assert!(!registry.node(client_id).unwrap().slot(client_slot).unwrap().is_free());

    registry.on_job_update(&compiling(1, "client", "server"));
    let (server_id, _) = registry.slot_of(1).unwrap();
    assert_eq!(registry.node_id("server"), Some(server_id));

    let old = registry.node(client_id).unwrap().slot(client_slot).unwrap();
    assert!(old.is_free());
    assert!(!old.fully_idle());
    assert!(old.current_job().is_none());

    let (_, server_slot) = registry.slot_of(1).unwrap();
    let server = registry.node(server_id).unwrap().slot(server_slot).unwrap();
    assert_eq!(server.current_job().map(|j| j.state()), Some(JobState::Compiling));
}

#[test]
fn test_remove_node_forgets_slots_and_jobs() {
    let mut registry = SlotRegistry::new(100);
    registry.on_node_stats("alpha", 2);
    registry.on_job_update(&compiling(1, "x", "alpha"));
    let color = registry.color_of("alpha");

    registry.on_job_update(&compiling(2, "x", "alpha"));

    let removed = registry.remove_node("alpha").unwrap();
    assert_eq!(removed.host, "alpha");
    assert_eq!(removed.orphaned_jobs, vec![1, 2]);
    assert!(registry.node_by_host("alpha").is_none());
    assert!(registry.slot_of(1).is_none());
    assert!(registry.remove_node("alpha").is_none());

    // Color identity survives the removal
    assert_eq!(registry.color_of("alpha"), color);

    // A later finish for that job has nowhere to go
    let placement = registry.on_job_update(&finished(compiling(1, "x", "alpha")));
    assert_eq!(placement, Placement::Untracked);
    assert!(registry.node_by_host("alpha").is_none());
}

#[test]
fn test_clock_prunes_old_history() {
    let mut registry = SlotRegistry::new(3);
    registry.on_node_stats("alpha", 1);

    for id in 1..=5u32 {
        registry.on_job_update(&compiling(id, "x", "alpha"));
        registry.on_job_update(&finished(compiling(id, "x", "alpha")));
        registry.advance_clock();
    }
    assert_eq!(registry.clock(), 5);

    let node = registry.node_by_host("alpha").unwrap();
    let timeline = node.slots()[0].timeline();
    let cutoff = registry.clock() - registry.window_ticks();
    assert!(timeline.entries().all(|e| e.clock >= cutoff));

    // Long idle stretch: only the newest entry survives
    for _ in 0..20 {
        registry.advance_clock();
    }
    let node = registry.node_by_host("alpha").unwrap();
    let timeline = node.slots()[0].timeline();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline.last().unwrap().job.state(), JobState::Finished);
    assert!(node.slots()[0].is_free());
}

#[test]
fn test_entries_are_snapshots_not_live_records() {
    let mut registry = SlotRegistry::new(100);
    let mut job = waiting(1, "alpha");
    registry.on_job_update(&job);

    job.file_name = "renamed.cpp".to_string();

    let snapshot = registry.snapshot();
    let node = snapshot.node("alpha").unwrap();
    let entry = node.slots[0].entries.last().unwrap();
    assert_eq!(entry.job.file_name, "file1.cpp");
    assert_eq!(entry.clock, 0);
}

#[test]
fn test_snapshot_preserves_node_and_slot_order() {
    let mut registry = SlotRegistry::new(100);
    registry.on_node_stats("zeta", 2);
    registry.on_node_stats("alpha", 1);
    registry.on_job_update(&compiling(1, "x", "mid"));

    let snapshot = registry.snapshot();
    let hosts: Vec<&str> = snapshot.nodes.iter().map(|n| n.host.as_str()).collect();
    assert_eq!(hosts, vec!["zeta", "alpha", "mid"]);

    let zeta = snapshot.node("zeta").unwrap();
    assert!(zeta.slots[0].id < zeta.slots[1].id);
    assert_eq!(snapshot.node("mid").unwrap().busy_slots(), 1);
}

#[test]
fn test_reported_capacity_is_clamped_to_limit() {
    let mut registry = SlotRegistry::new(100).with_max_slots_per_node(4);
    registry.on_node_stats("alpha", u32::MAX);

    let node = registry.node_by_host("alpha").unwrap();
    assert_eq!(node.capacity(), 4);
    assert_eq!(node.slots().len(), 4);
}

#[test]
fn test_unreported_node_growth_stops_at_limit() {
    let mut registry = SlotRegistry::new(100).with_max_slots_per_node(2);
    assert_eq!(registry.max_slots_per_node(), 2);

    for id in 1..=2 {
        let placement = registry.on_job_update(&compiling(id, "x", "alpha"));
        assert!(matches!(placement, Placement::Created { .. }));
    }
    let placement = registry.on_job_update(&compiling(3, "x", "alpha"));

    assert_eq!(placement, Placement::Dropped);
    assert_eq!(registry.node_by_host("alpha").unwrap().slots().len(), 2);
    assert_eq!(registry.dropped_updates(), 1);
}
