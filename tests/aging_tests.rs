use icemon_lite::feed::{EventIngestor, Ingested, SchedulerEvent};
use icemon_lite::job::{JobOutcome, JobState, Language};
use icemon_lite::registry::{AgingMonitor, Placement, RemovedNode, SlotRegistry};

fn stats(host: &str, max_kids: u32) -> SchedulerEvent {
    SchedulerEvent::NodeStats {
        host: host.to_string(),
        max_kids,
    }
}

/// Feed one event through an ingestor and a registry the way the monitor does.
fn apply(ingestor: &mut EventIngestor, registry: &mut SlotRegistry, event: SchedulerEvent) -> Option<Placement> {
    match ingestor.ingest(event).unwrap() {
        Ingested::Job(job) => Some(registry.on_job_update(&job)),
        Ingested::NodeStats { host, max_kids } => {
            registry.on_node_stats(&host, max_kids);
            None
        }
        Ingested::Ignored | Ingested::StreamEnd => None,
    }
}

fn hosts(removed: Vec<RemovedNode>) -> Vec<String> {
    removed.into_iter().map(|node| node.host).collect()
}

fn local_begin(job_id: u32, host: &str) -> SchedulerEvent {
    SchedulerEvent::LocalJobBegin {
        job_id,
        host: host.to_string(),
        file_name: format!("{}.c", job_id),
    }
}

#[test]
fn test_silent_node_removed_after_threshold() {
    let mut registry = SlotRegistry::default();
    let aging = AgingMonitor::new(2);
    registry.on_node_stats("alpha", 2);

    assert!(aging.sweep(&mut registry).is_empty());
    assert!(aging.sweep(&mut registry).is_empty());
    assert_eq!(registry.node_by_host("alpha").unwrap().last_seen_age(), 2);

    assert_eq!(hosts(aging.sweep(&mut registry)), vec!["alpha".to_string()]);
    assert!(registry.node_by_host("alpha").is_none());
    assert!(registry.is_empty());
}

#[test]
fn test_activity_resets_age() {
    let mut registry = SlotRegistry::default();
    let aging = AgingMonitor::new(2);
    registry.on_node_stats("alpha", 1);
    registry.on_node_stats("beta", 1);

    for _ in 0..2 {
        aging.sweep(&mut registry);
    }
    // Only alpha keeps reporting
    registry.on_node_stats("alpha", 1);
    let removed = aging.sweep(&mut registry);

    assert_eq!(hosts(removed), vec!["beta".to_string()]);
    assert_eq!(registry.node_by_host("alpha").unwrap().last_seen_age(), 1);
}

#[test]
fn test_job_updates_count_as_activity() {
    let mut ingestor = EventIngestor::default();
    let mut registry = SlotRegistry::default();
    let aging = AgingMonitor::new(1);

    apply(&mut ingestor, &mut registry, stats("alpha", 2));
    apply(
        &mut ingestor,
        &mut registry,
        SchedulerEvent::LocalJobBegin {
            job_id: 1,
            host: "alpha".to_string(),
            file_name: "a.c".to_string(),
        },
    );
    aging.sweep(&mut registry);

    apply(
        &mut ingestor,
        &mut registry,
        SchedulerEvent::LocalJobDone {
            job_id: 1,
            exit_code: 0,
        },
    );
    assert!(aging.sweep(&mut registry).is_empty());
    assert!(registry.node_by_host("alpha").is_some());
}

#[test]
fn test_late_events_for_removed_node_are_harmless() {
    let mut ingestor = EventIngestor::default();
    let mut registry = SlotRegistry::default();
    let aging = AgingMonitor::new(0);

    apply(&mut ingestor, &mut registry, stats("alpha", 2));
    apply(
        &mut ingestor,
        &mut registry,
        SchedulerEvent::AssignCompileServer {
            job_id: 9,
            client: "beta".to_string(),
            file_name: "x.cpp".to_string(),
            version: String::new(),
            language: Language::Cxx,
        },
    );
    apply(
        &mut ingestor,
        &mut registry,
        SchedulerEvent::JobBegin {
            job_id: 9,
            host: "alpha".to_string(),
            start_time: None,
        },
    );
    assert!(registry.slot_of(9).is_some());

    let removed = aging.sweep(&mut registry);
    assert_eq!(hosts(removed), vec!["alpha".to_string()]);
    assert!(registry.slot_of(9).is_none());

    // The job still finishes in the store, but no lane is recreated for it
    let placement = apply(
        &mut ingestor,
        &mut registry,
        SchedulerEvent::JobDone {
            job_id: 9,
            exit_code: 0,
            outcome: JobOutcome::default(),
        },
    );
    assert_eq!(placement, Some(Placement::Untracked));
    assert!(registry.node_by_host("alpha").is_none());
    assert!(ingestor.jobs().get(9).unwrap().is_done());
}

#[test]
fn test_returning_node_gets_fresh_lanes_and_same_color() {
    let mut registry = SlotRegistry::default();
    let aging = AgingMonitor::new(0);

    registry.on_node_stats("alpha", 2);
    let first = registry.node_by_host("alpha").unwrap();
    let (first_id, first_color) = (first.id(), first.color());
    let first_slots: Vec<_> = first.slots().iter().map(|s| s.id()).collect();

    aging.sweep(&mut registry);
    registry.on_node_stats("alpha", 2);

    let second = registry.node_by_host("alpha").unwrap();
    assert_ne!(second.id(), first_id);
    assert_eq!(second.color(), first_color);
    assert!(second.slots().iter().all(|s| !first_slots.contains(&s.id())));
}

#[test]
fn test_removed_node_reports_its_live_jobs() {
    let mut ingestor = EventIngestor::default();
    let mut registry = SlotRegistry::default();
    let aging = AgingMonitor::new(0);

    apply(&mut ingestor, &mut registry, stats("alpha", 2));
    apply(&mut ingestor, &mut registry, local_begin(4, "alpha"));
    apply(&mut ingestor, &mut registry, local_begin(5, "alpha"));

    let removed = aging.sweep(&mut registry);
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].orphaned_jobs, vec![4, 5]);

    let orphans = ingestor.orphan(&removed[0].orphaned_jobs);
    assert_eq!(orphans.len(), 2);
    assert!(orphans.iter().all(|job| job.state() == JobState::Unknown));
    assert!(ingestor.jobs().is_empty());
}

#[test]
fn test_store_accepts_new_jobs_after_stale_host_is_removed() {
    let mut ingestor = EventIngestor::new(2);
    let mut registry = SlotRegistry::default();
    let aging = AgingMonitor::new(0);

    apply(&mut ingestor, &mut registry, stats("dead", 2));
    apply(&mut ingestor, &mut registry, local_begin(1, "dead"));
    apply(&mut ingestor, &mut registry, local_begin(2, "dead"));
    assert!(ingestor.jobs().is_full());

    for node in aging.sweep(&mut registry) {
        ingestor.orphan(&node.orphaned_jobs);
    }

    let placement = apply(&mut ingestor, &mut registry, local_begin(3, "alive"));
    assert!(matches!(placement, Some(Placement::Created { .. })));
    assert!(ingestor.jobs().get(3).is_some());
}

#[test]
fn test_full_store_evicts_jobs_without_a_lane() {
    let mut ingestor = EventIngestor::new(2);
    let mut registry = SlotRegistry::default();

    // Both jobs live on a node whose lanes are dropped without orphaning
    apply(&mut ingestor, &mut registry, stats("alpha", 2));
    apply(&mut ingestor, &mut registry, local_begin(1, "alpha"));
    apply(&mut ingestor, &mut registry, local_begin(2, "alpha"));
    registry.remove_node("alpha");

    // Nothing to evict while the store has room
    let mut roomy = EventIngestor::new(3);
    assert!(roomy.make_room(|_| false).is_empty());

    let evicted = ingestor.make_room(|job_id| registry.slot_of(job_id).is_some());
    let ids: Vec<u32> = evicted.iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(evicted.iter().all(|job| job.state() == JobState::Unknown));

    let placement = apply(&mut ingestor, &mut registry, local_begin(3, "beta"));
    assert!(matches!(placement, Some(Placement::Created { .. })));
}

#[test]
fn test_full_store_keeps_jobs_that_still_hold_a_lane() {
    let mut ingestor = EventIngestor::new(2);
    let mut registry = SlotRegistry::default();

    apply(&mut ingestor, &mut registry, stats("alpha", 2));
    apply(&mut ingestor, &mut registry, local_begin(1, "alpha"));
    apply(&mut ingestor, &mut registry, local_begin(2, "alpha"));

    let evicted = ingestor.make_room(|job_id| registry.slot_of(job_id).is_some());
    assert!(evicted.is_empty());
    assert_eq!(apply(&mut ingestor, &mut registry, local_begin(3, "alpha")), None);
    assert!(ingestor.jobs().get(3).is_none());
}
