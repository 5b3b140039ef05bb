//! End-to-end interval scenarios driven through the public engine API

use std::collections::{HashSet, VecDeque};

use fogsim_engine::{
    Bandwidth, Cluster, ContainerId, Decision, FirstFit, HostId, HostSpec, IoProfile, ResourceProfile,
    SchedulerPolicy, SimulationConfig, SimulationEngine, SimulationError, StaticFleet, TraceWorkload,
    WorkloadDemand, WorkloadSource,
};
use fogsim_engine::error::ReferenceKind;

/// Replays canned selections and placements, one per interval
#[derive(Default)]
struct Scripted {
    selections: VecDeque<Vec<ContainerId>>,
    placements: VecDeque<Vec<(ContainerId, HostId)>>,
}

impl Scripted {
    fn then(mut self, selection: Vec<ContainerId>, placement: Vec<(ContainerId, HostId)>) -> Self {
        self.selections.push_back(selection);
        self.placements.push_back(placement);
        self
    }
}

impl SchedulerPolicy for Scripted {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn selection(&mut self, _cluster: &Cluster) -> Vec<ContainerId> {
        self.selections.pop_front().unwrap_or_default()
    }

    fn placement(&mut self, _cluster: &Cluster, _containers: &[ContainerId]) -> Decision {
        self.placements.pop_front().unwrap_or_default().into_iter().collect()
    }
}

fn node(ips: f64, ram: f64, disk: f64) -> HostSpec {
    HostSpec::with_default_power(ResourceProfile::new(
        ips,
        IoProfile::new(ram, 1000.0, 1000.0),
        IoProfile::new(disk, 1000.0, 1000.0),
        Bandwidth::new(10.0, 10.0),
    ))
}

fn long_running(ips: f64, disk: f64) -> WorkloadDemand {
    WorkloadDemand::new(ips, 1e12, 100).with_disk(IoProfile::new(disk, 0.0, 0.0))
}

fn engine(hosts: Vec<HostSpec>, policy: Box<dyn SchedulerPolicy>) -> SimulationEngine {
    SimulationEngine::new(SimulationConfig::default(), &StaticFleet(hosts), policy).unwrap()
}

#[test]
fn test_empty_interval_changes_nothing() {
    let mut engine = engine(vec![node(1000.0, 1000.0, 100.0)], Box::new(FirstFit::new()));
    let mut source = TraceWorkload::new(vec![vec![long_running(100.0, 10.0)], vec![]]);

    engine.step(&mut source).unwrap();
    let queue_before = source.queue_len();

    let report = engine.step(&mut source).unwrap();
    assert!(report.migrations.is_empty());
    assert!(report.destroyed.is_empty());
    assert!(report.decision.is_empty());
    assert_eq!(report.queue_len, queue_before);
    assert_eq!(engine.cluster().num_active_containers(), 1);
}

#[test]
fn test_disk_bound_first_fit_leaves_one_queued() {
    let mut engine = engine(vec![node(1000.0, 1000.0, 100.0)], Box::new(FirstFit::new()));
    let mut source = TraceWorkload::single(vec![long_running(10.0, 60.0); 2]);

    let report = engine.step(&mut source).unwrap();
    assert_eq!(report.migrations.len(), 1);
    assert_eq!(report.queue_len, 1);
    assert_eq!(source.queue_len(), 1);

    let host = engine.cluster().host(0).unwrap();
    assert_eq!(host.current_disk().size, 60.0);
    assert!(host.current_disk().size <= host.capacity().disk.size);

    // Still infeasible next interval: backlog, not an error
    let report = engine.step(&mut source).unwrap();
    assert_eq!(report.queue_len, 1);
    assert!(report.migrations.is_empty());
}

#[test]
fn test_relocation_accrues_migration_time_and_moves_disk() {
    let demand = long_running(100.0, 40.0).with_ram(IoProfile::new(100.0, 0.0, 0.0));
    let policy = Scripted::default()
        .then(vec![], vec![(0, 0)])
        .then(vec![0], vec![(0, 1)]);
    let mut engine = engine(
        vec![node(1000.0, 1000.0, 100.0), node(1000.0, 1000.0, 100.0)],
        Box::new(policy),
    );
    let mut source = TraceWorkload::single(vec![demand]);

    let first = engine.step(&mut source).unwrap();
    assert_eq!(first.migrations[0].migration_time, 0.0);
    assert_eq!(engine.cluster().host(0).unwrap().current_disk().size, 40.0);

    let second = engine.step(&mut source).unwrap();
    assert_eq!(second.selected, vec![0]);
    assert_eq!(second.migrations.len(), 1);
    let moved = &second.migrations[0];
    assert_eq!((moved.from, moved.to), (Some(0), 1));
    // 100 MB over min(10 / 1, 10000 / 1)
    assert_eq!(moved.migration_time, 10.0);

    let cluster = engine.cluster();
    assert_eq!(cluster.container(0).unwrap().total_migration_time, 10.0);
    assert!(cluster.container(0).unwrap().total_migration_time > 0.0);
    assert_eq!(cluster.host(0).unwrap().current_disk().size, 0.0);
    assert_eq!(cluster.host(1).unwrap().current_disk().size, 40.0);
    assert_eq!(cluster.current_host(0).unwrap(), Some(1));
}

#[test]
fn test_migration_eats_into_execution() {
    let demand = long_running(100.0, 0.0).with_ram(IoProfile::new(500.0, 0.0, 0.0));
    let policy = Scripted::default()
        .then(vec![], vec![(0, 0)])
        .then(vec![0], vec![(0, 1)]);
    let mut engine = engine(
        vec![node(100.0, 1000.0, 100.0), node(100.0, 1000.0, 100.0)],
        Box::new(policy),
    );
    let mut source = TraceWorkload::single(vec![demand]);

    engine.step(&mut source).unwrap();
    engine.step(&mut source).unwrap();

    // 300s then 300 - 50s at 100 IPS
    let c = engine.cluster().container(0).unwrap();
    assert_eq!(c.total_exec_time, 550.0);
    assert_eq!(c.completed_instructions, 55_000.0);
}

#[test]
fn test_first_fit_decisions_are_reproducible() {
    let hosts = || (0..3).map(|_| node(1000.0, 1000.0, 150.0)).collect::<Vec<_>>();
    let trace = || {
        TraceWorkload::new(vec![
            (0..5).map(|i| long_running(100.0 * (i + 1) as f64, 20.0 * i as f64)).collect(),
            (0..4).map(|i| long_running(250.0, 35.0 + i as f64)).collect(),
        ])
    };

    let mut a = engine(hosts(), Box::new(FirstFit::new()));
    let mut b = engine(hosts(), Box::new(FirstFit::new()));
    let (mut sa, mut sb) = (trace(), trace());

    for _ in 0..3 {
        let ra = a.step(&mut sa).unwrap();
        let rb = b.step(&mut sb).unwrap();
        assert_eq!(ra.decision, rb.decision);
        assert_eq!(ra.migrations, rb.migrations);
    }
    assert_eq!(a.cluster().containers_in_hosts(), b.cluster().containers_in_hosts());
}

#[test]
fn test_ips_and_memory_overcommit_tolerated_disk_is_hard() {
    // Two 800 IPS / 700 MB containers on a 1000 IPS / 1000 MB host both
    // commit; a third that overflows disk is dropped.
    let demand = long_running(800.0, 40.0).with_ram(IoProfile::new(700.0, 0.0, 0.0));
    let policy = Scripted::default().then(vec![], vec![(0, 0), (1, 0), (2, 0)]);
    let mut engine = engine(vec![node(1000.0, 1000.0, 100.0)], Box::new(policy));
    let mut source = TraceWorkload::single(vec![demand; 3]);

    let report = engine.step(&mut source).unwrap();
    assert_eq!(report.migrations.len(), 2);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].placement.container, 2);
    assert!(matches!(
        report.rejected[0].error,
        SimulationError::CapacityExceeded { resource: "disk size", .. }
    ));

    let host = engine.cluster().host(0).unwrap();
    assert!(host.ips_available() < 0.0);
    assert!(host.ram_available().size < 0.0);
    assert!(host.current_disk().size <= host.capacity().disk.size);
    // Grants are scaled so the host never exceeds capacity
    assert!(host.apparent_ips() <= host.capacity().ips + 1e-9);
    assert_eq!(report.queue_len, 1);
}

#[test]
fn test_unknown_host_aborts_step() {
    let policy = Scripted::default().then(vec![], vec![(0, 7)]);
    let mut engine = engine(vec![node(1000.0, 1000.0, 100.0)], Box::new(policy));
    let mut source = TraceWorkload::single(vec![long_running(10.0, 10.0)]);

    let err = engine.step(&mut source).unwrap_err();
    assert!(matches!(err, SimulationError::InvalidReference { index: 7, .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_unknown_container_aborts_step() {
    let policy = Scripted::default().then(vec![], vec![(5, 0)]);
    let mut engine = engine(vec![node(1000.0, 1000.0, 100.0)], Box::new(policy));
    let mut source = TraceWorkload::single(vec![long_running(10.0, 10.0)]);

    let err = engine.step(&mut source).unwrap_err();
    assert!(matches!(
        err,
        SimulationError::InvalidReference {
            kind: ReferenceKind::Container,
            index: 5
        }
    ));
    assert!(err.is_fatal());
    assert_eq!(engine.cluster().host(0).unwrap().container_ids(), Vec::<ContainerId>::new());
}

#[test]
fn test_aborted_step_releases_its_arrivals() {
    let policy = Scripted::default()
        .then(vec![], vec![(0, 9)])
        .then(vec![], vec![(0, 0)]);
    let mut engine = engine(vec![node(1000.0, 1000.0, 100.0)], Box::new(policy));
    let mut source = TraceWorkload::single(vec![long_running(10.0, 10.0)]);

    assert!(engine.step(&mut source).is_err());
    assert_eq!(engine.cluster().num_active_containers(), 0);
    assert!(engine.cluster().containers().iter().all(Option::is_none));
    assert_eq!(source.queue_len(), 1);

    // The arrival is offered again and lands in the freed slot
    let report = engine.step(&mut source).unwrap();
    assert_eq!(report.acknowledged, vec![0]);
    assert_eq!(source.queue_len(), 0);

    for _ in 0..3 {
        engine.step(&mut source).unwrap();
        assert_eq!(engine.cluster().num_active_containers(), 1);
    }

    let creation_ids: Vec<_> = engine.cluster().containers().iter().flatten().map(|c| c.creation_id).collect();
    let unique: HashSet<_> = creation_ids.iter().collect();
    assert_eq!(creation_ids, vec![0]);
    assert_eq!(unique.len(), creation_ids.len());
}

#[test]
fn test_invalid_arrival_admits_nothing() {
    let mut engine = engine(vec![node(1000.0, 1000.0, 100.0)], Box::new(FirstFit::new()));
    let mut source = TraceWorkload::single(vec![long_running(10.0, 10.0), WorkloadDemand::new(10.0, 0.0, 5)]);

    let err = engine.step(&mut source).unwrap_err();
    assert!(matches!(err, SimulationError::InvalidSpec(_)));
    assert_eq!(engine.cluster().num_active_containers(), 0);
    assert!(engine.cluster().containers().iter().all(Option::is_none));
}

#[test]
fn test_placing_unoffered_container_is_contract_violation() {
    // Container 0 is placed in interval 1 but not selected in interval 2
    let policy = Scripted::default()
        .then(vec![], vec![(0, 0)])
        .then(vec![], vec![(0, 1)]);
    let mut engine = engine(
        vec![node(1000.0, 1000.0, 100.0), node(1000.0, 1000.0, 100.0)],
        Box::new(policy),
    );
    let mut source = TraceWorkload::single(vec![long_running(10.0, 10.0)]);

    engine.step(&mut source).unwrap();
    let err = engine.step(&mut source).unwrap_err();
    assert!(matches!(err, SimulationError::PolicyContractViolation(_)));
}

#[test]
fn test_selecting_unplaced_container_is_contract_violation() {
    let policy = Scripted::default().then(vec![0], vec![]);
    let mut engine = engine(vec![node(1000.0, 1000.0, 100.0)], Box::new(policy));
    let mut source = TraceWorkload::single(vec![long_running(10.0, 10.0)]);

    let err = engine.step(&mut source).unwrap_err();
    assert!(matches!(err, SimulationError::PolicyContractViolation(_)));
}

#[test]
fn test_duplicate_entries_are_contract_violation() {
    let policy = Scripted::default().then(vec![], vec![(0, 0), (0, 0)]);
    let mut engine = engine(vec![node(1000.0, 1000.0, 100.0)], Box::new(policy));
    let mut source = TraceWorkload::single(vec![long_running(10.0, 10.0)]);

    assert!(matches!(
        engine.step(&mut source),
        Err(SimulationError::PolicyContractViolation(_))
    ));
}

/// Filter that invents an entry the placement never proposed
struct Inventive(FirstFit);

impl SchedulerPolicy for Inventive {
    fn name(&self) -> &str {
        "Inventive"
    }

    fn selection(&mut self, cluster: &Cluster) -> Vec<ContainerId> {
        self.0.selection(cluster)
    }

    fn placement(&mut self, cluster: &Cluster, containers: &[ContainerId]) -> Decision {
        self.0.placement(cluster, containers)
    }

    fn filter_placement(&self, _cluster: &Cluster, mut decision: Decision) -> Decision {
        decision.push(0, 1);
        decision
    }
}

#[test]
fn test_filter_must_return_subsequence() {
    let mut engine = engine(
        vec![node(1000.0, 1000.0, 100.0), node(1000.0, 1000.0, 100.0)],
        Box::new(Inventive(FirstFit::new())),
    );
    let mut source = TraceWorkload::single(vec![long_running(10.0, 10.0)]);

    assert!(matches!(
        engine.step(&mut source),
        Err(SimulationError::PolicyContractViolation(_))
    ));
}

#[test]
fn test_retired_container_stays_queryable() {
    let mut engine = engine(vec![node(1000.0, 1000.0, 100.0)], Box::new(FirstFit::new()));
    let mut source = TraceWorkload::new(vec![
        vec![WorkloadDemand::new(100.0, 1000.0, 1)],
        vec![long_running(10.0, 10.0)],
    ]);

    engine.step(&mut source).unwrap();
    let report = engine.step(&mut source).unwrap();
    assert_eq!(report.destroyed.len(), 1);

    let cluster = engine.cluster();
    // The new arrival reuses the freed slot
    assert_eq!(cluster.container(0).unwrap().creation_id, 1);
    let retired = cluster.container_by_creation_id(0).unwrap();
    assert!(!retired.active);
    assert_eq!(retired.destroyed_at, Some(2));
    assert_eq!(cluster.retired().len(), 1);
}
