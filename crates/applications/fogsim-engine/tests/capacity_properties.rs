//! Property-based checks of the capacity invariants

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;

use fogsim_engine::{
    Bandwidth, Cluster, ContainerId, Decision, FirstFit, HostSpec, IoProfile, RandomPlacement,
    ResourceProfile, SchedulerPolicy, SimulationConfig, SimulationEngine, StaticFleet, TraceWorkload,
    WorkloadDemand,
};

// Generate arbitrary host capacities
prop_compose! {
    fn arb_host()(
        ips in 100.0..5000.0f64,
        ram in 100.0..4000.0f64,
        disk in 10.0..500.0f64,
        disk_rate in 50.0..500.0f64,
    ) -> HostSpec {
        HostSpec::with_default_power(ResourceProfile::new(
            ips,
            IoProfile::new(ram, 1000.0, 1000.0),
            IoProfile::new(disk, disk_rate, disk_rate),
            Bandwidth::new(10.0, 10.0),
        ))
    }
}

// Generate arbitrary container demands
prop_compose! {
    fn arb_demand()(
        ips in 10.0..2000.0f64,
        burst in 1.0..3.0f64,
        intervals in 0.2..4.0f64,
        ram in 0.0..1500.0f64,
        disk in 0.0..300.0f64,
        disk_rate in 0.0..100.0f64,
    ) -> WorkloadDemand {
        WorkloadDemand::new(ips, ips * 300.0 * intervals, 10)
            .with_burst(ips * burst)
            .with_ram(IoProfile::new(ram, 10.0, 10.0))
            .with_disk(IoProfile::new(disk, disk_rate, disk_rate))
    }
}

prop_compose! {
    fn arb_trace()(
        batches in prop::collection::vec(prop::collection::vec(arb_demand(), 0..6), 1..5)
    ) -> Vec<Vec<WorkloadDemand>> {
        batches
    }
}

/// Ignores capacity entirely: selects everything placed and sends every
/// candidate to a host picked from `targets`
struct Reckless {
    targets: Vec<usize>,
    cursor: usize,
}

impl SchedulerPolicy for Reckless {
    fn name(&self) -> &str {
        "Reckless"
    }

    fn selection(&mut self, cluster: &Cluster) -> Vec<ContainerId> {
        cluster.selectable_containers()
    }

    fn placement(&mut self, cluster: &Cluster, containers: &[ContainerId]) -> Decision {
        containers
            .iter()
            .map(|&id| {
                let host = self.targets[self.cursor % self.targets.len()] % cluster.num_hosts();
                self.cursor += 1;
                (id, host)
            })
            .collect()
    }
}

/// Random placement that cross-checks every proposal with the probe
struct Audited {
    inner: RandomPlacement,
    infeasible: Rc<Cell<usize>>,
    proposed: Rc<Cell<usize>>,
}

impl SchedulerPolicy for Audited {
    fn name(&self) -> &str {
        "Audited"
    }

    fn selection(&mut self, cluster: &Cluster) -> Vec<ContainerId> {
        // Everything placed is a candidate so the probe sees migrations too
        cluster.selectable_containers()
    }

    fn placement(&mut self, cluster: &Cluster, containers: &[ContainerId]) -> Decision {
        let decision = self.inner.placement(cluster, containers);
        for p in &decision {
            self.proposed.set(self.proposed.get() + 1);
            if !cluster.placement_possible(p.container, p.host).unwrap_or(false) {
                self.infeasible.set(self.infeasible.get() + 1);
            }
        }
        decision
    }
}

fn assert_disk_within_capacity(cluster: &Cluster) -> Result<(), TestCaseError> {
    for host in cluster.host_views() {
        let used = host.current_disk();
        let cap = host.capacity().disk;
        prop_assert!(used.size <= cap.size + 1e-9, "host {} disk size {} > {}", host.id(), used.size, cap.size);
        prop_assert!(used.read <= cap.read + 1e-9);
        prop_assert!(used.write <= cap.write + 1e-9);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_disk_never_exceeds_capacity_under_reckless_policy(
        hosts in prop::collection::vec(arb_host(), 1..5),
        trace in arb_trace(),
        targets in prop::collection::vec(0..8usize, 1..16),
    ) {
        let config = SimulationConfig::default().with_container_limit(12);
        let policy = Reckless { targets, cursor: 0 };
        let mut engine = SimulationEngine::new(config, &StaticFleet(hosts), Box::new(policy)).unwrap();
        let mut source = TraceWorkload::new(trace);

        for _ in 0..6 {
            engine.step(&mut source).unwrap();
            assert_disk_within_capacity(engine.cluster())?;
        }
    }

    #[test]
    fn test_disk_never_exceeds_capacity_under_first_fit(
        hosts in prop::collection::vec(arb_host(), 1..5),
        trace in arb_trace(),
    ) {
        let config = SimulationConfig::default().with_container_limit(12);
        let mut engine = SimulationEngine::new(config, &StaticFleet(hosts), Box::new(FirstFit::new())).unwrap();
        let mut source = TraceWorkload::new(trace);

        for _ in 0..6 {
            engine.step(&mut source).unwrap();
            assert_disk_within_capacity(engine.cluster())?;
        }
    }

    #[test]
    fn test_random_only_proposes_probe_feasible_pairs(
        hosts in prop::collection::vec(arb_host(), 1..5),
        trace in arb_trace(),
        seed in any::<u64>(),
    ) {
        let infeasible = Rc::new(Cell::new(0));
        let proposed = Rc::new(Cell::new(0));
        let policy = Audited {
            inner: RandomPlacement::new(seed),
            infeasible: Rc::clone(&infeasible),
            proposed: Rc::clone(&proposed),
        };
        let config = SimulationConfig::default().with_container_limit(12);
        let mut engine = SimulationEngine::new(config, &StaticFleet(hosts), Box::new(policy)).unwrap();
        let mut source = TraceWorkload::new(trace);

        for _ in 0..6 {
            engine.step(&mut source).unwrap();
        }
        prop_assert_eq!(infeasible.get(), 0, "{} proposals checked", proposed.get());
    }
}
