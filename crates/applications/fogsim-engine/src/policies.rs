//! Scheduling policies for container placement
//!
//! A policy answers three questions each interval, always against a
//! read-only view of the cluster:
//! - selection: which placed containers should be considered for migration
//! - placement: where the candidates (selected + newly arrived) should go
//! - filter_placement: a last pass that may drop entries
//!
//! Built-in policies:
//! - FirstFit: first host (registration order) with disk and IPS headroom
//! - RandomPlacement: uniform among hosts with headroom in every dimension
//! - RandomSelection: random migration candidates, placement delegated

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::{SliceRandom, index};

use crate::ContainerId;
use crate::cluster::Cluster;
use crate::container::Container;
use crate::decision::Decision;
use crate::host::HostView;
use crate::resources::IoProfile;

/// Scheduling policy trait
pub trait SchedulerPolicy {
    /// Get policy name
    fn name(&self) -> &str;

    /// Nominate placed, active containers as migration candidates
    fn selection(&mut self, cluster: &Cluster) -> Vec<ContainerId>;

    /// Propose targets for `containers` (each at most once, in any order)
    fn placement(&mut self, cluster: &Cluster, containers: &[ContainerId]) -> Decision;

    /// Drop entries the policy does not want committed. The default drops
    /// entries that would leave a container where it already is.
    fn filter_placement(&self, cluster: &Cluster, mut decision: Decision) -> Decision {
        decision.retain(|p| cluster.current_host(p.container).ok().flatten() != Some(p.host));
        decision
    }
}

/// Demand already promised to each host by earlier entries of the decision
/// being built
#[derive(Debug, Clone)]
struct Reservations {
    ips: Vec<f64>,
    ram: Vec<IoProfile>,
    disk: Vec<IoProfile>,
}

impl Reservations {
    fn new(num_hosts: usize) -> Self {
        Reservations {
            ips: vec![0.0; num_hosts],
            ram: vec![IoProfile::ZERO; num_hosts],
            disk: vec![IoProfile::ZERO; num_hosts],
        }
    }

    fn ips_fits(&self, host: &HostView<'_>, c: &Container) -> bool {
        host.ips_available() - self.ips[host.id()] >= c.base_ips()
    }

    fn ram_fits(&self, host: &HostView<'_>, c: &Container) -> bool {
        (host.ram_available() - self.ram[host.id()]).covers(&c.ram())
    }

    fn disk_fits(&self, host: &HostView<'_>, c: &Container) -> bool {
        (host.disk_available() - self.disk[host.id()]).covers(&c.disk())
    }

    fn reserve(&mut self, host: usize, c: &Container) {
        self.ips[host] += c.base_ips();
        self.ram[host] = self.ram[host] + c.ram();
        self.disk[host] = self.disk[host] + c.disk();
    }
}

/// First-fit placement: scan hosts in registration order and take the first
/// with room for the container's disk and guaranteed IPS.
///
/// Never nominates migration candidates on its own. Deterministic: the same
/// cluster and candidate list always produce the same decision.
#[derive(Debug, Clone, Default)]
pub struct FirstFit;

impl FirstFit {
    pub fn new() -> Self {
        FirstFit
    }
}

impl SchedulerPolicy for FirstFit {
    fn name(&self) -> &str {
        "FirstFit"
    }

    fn selection(&mut self, _cluster: &Cluster) -> Vec<ContainerId> {
        Vec::new()
    }

    fn placement(&mut self, cluster: &Cluster, containers: &[ContainerId]) -> Decision {
        let mut reserved = Reservations::new(cluster.num_hosts());
        let mut decision = Decision::new();

        for &id in containers {
            let Ok(container) = cluster.container(id) else {
                continue;
            };
            let current = cluster.current_host(id).ok().flatten();

            for host in cluster.host_views() {
                // Staying put always fits
                if current == Some(host.id()) {
                    decision.push(id, host.id());
                    break;
                }
                if reserved.disk_fits(&host, container) && reserved.ips_fits(&host, container) {
                    reserved.reserve(host.id(), container);
                    decision.push(id, host.id());
                    break;
                }
            }
        }

        decision
    }
}

/// Uniform random placement among feasible hosts
///
/// Feasible = headroom for guaranteed IPS, memory and disk after counting
/// earlier entries of the same decision. Containers with no feasible host
/// are left out.
#[derive(Debug, Clone)]
pub struct RandomPlacement {
    rng: StdRng,
}

impl RandomPlacement {
    pub fn new(seed: u64) -> Self {
        RandomPlacement {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SchedulerPolicy for RandomPlacement {
    fn name(&self) -> &str {
        "Random"
    }

    fn selection(&mut self, _cluster: &Cluster) -> Vec<ContainerId> {
        Vec::new()
    }

    fn placement(&mut self, cluster: &Cluster, containers: &[ContainerId]) -> Decision {
        let mut reserved = Reservations::new(cluster.num_hosts());
        let mut decision = Decision::new();

        for &id in containers {
            let Ok(container) = cluster.container(id) else {
                continue;
            };

            let feasible: Vec<usize> = cluster
                .host_views()
                .filter(|host| cluster.placement_possible(id, host.id()).unwrap_or(false))
                .filter(|host| {
                    reserved.ips_fits(host, container)
                        && reserved.ram_fits(host, container)
                        && reserved.disk_fits(host, container)
                })
                .map(|host| host.id())
                .collect();

            if let Some(&target) = feasible.choose(&mut self.rng) {
                reserved.reserve(target, container);
                decision.push(id, target);
            }
        }

        decision
    }
}

/// Random migration candidates on top of any placement policy.
///
/// `selection` draws up to `count` distinct containers uniformly from the
/// placed, active ones; `placement` and `filter_placement` are delegated.
/// `RandomSelection<FirstFit>` is the classic fog scheduler.
#[derive(Debug, Clone)]
pub struct RandomSelection<P> {
    inner: P,
    count: usize,
    rng: StdRng,
    name: String,
}

impl<P: SchedulerPolicy> RandomSelection<P> {
    pub fn new(inner: P, count: usize, seed: u64) -> Self {
        let name = format!("RandomSelection+{}", inner.name());
        RandomSelection {
            inner,
            count,
            rng: StdRng::seed_from_u64(seed),
            name,
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: SchedulerPolicy> SchedulerPolicy for RandomSelection<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn selection(&mut self, cluster: &Cluster) -> Vec<ContainerId> {
        let pool = cluster.selectable_containers();
        let amount = self.count.min(pool.len());
        index::sample(&mut self.rng, pool.len(), amount)
            .into_iter()
            .map(|i| pool[i])
            .collect()
    }

    fn placement(&mut self, cluster: &Cluster, containers: &[ContainerId]) -> Decision {
        self.inner.placement(cluster, containers)
    }

    fn filter_placement(&self, cluster: &Cluster, decision: Decision) -> Decision {
        self.inner.filter_placement(cluster, decision)
    }
}
