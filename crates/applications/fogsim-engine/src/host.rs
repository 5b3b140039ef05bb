//! Fog nodes
//!
//! A [`Host`] is the static record: capacity, power model, locality group and
//! link latency. It is registered once when the engine is built and lives for
//! the whole run.
//!
//! Everything that depends on placement (usage, headroom, utilization, power)
//! is answered by [`HostView`], a borrowed handle that recomputes from the
//! cluster's assignment table on every call. Nothing is cached, so a view can
//! never disagree with the latest commit.

use std::sync::Arc;

use crate::cluster::Cluster;
use crate::container::Container;
use crate::error::Result;
use crate::power::{PowerCurve, PowerModel};
use crate::resources::{IoProfile, ResourceProfile};
use crate::{ContainerId, HostId};

/// Host description handed over by the fleet bootstrap
#[derive(Debug, Clone)]
pub struct HostSpec {
    pub capacity: ResourceProfile,
    pub power: Arc<dyn PowerModel>,
    /// Locality/partition tag
    pub group: usize,
    /// Link latency in seconds
    pub latency: f64,
}

impl HostSpec {
    pub fn new(capacity: ResourceProfile, power: Arc<dyn PowerModel>) -> Self {
        HostSpec {
            capacity,
            power,
            group: 0,
            latency: 0.0,
        }
    }

    /// Host drawing power per the Jetson Xavier NX table
    pub fn with_default_power(capacity: ResourceProfile) -> Self {
        Self::new(capacity, Arc::new(PowerCurve::jetson_xavier_nx()))
    }

    pub fn with_group(mut self, group: usize) -> Self {
        self.group = group;
        self
    }

    pub fn with_latency(mut self, latency: f64) -> Self {
        self.latency = latency;
        self
    }
}

/// A registered fog node
#[derive(Debug, Clone)]
pub struct Host {
    pub id: HostId,
    pub capacity: ResourceProfile,
    pub power: Arc<dyn PowerModel>,
    pub group: usize,
    pub latency: f64,
}

impl Host {
    pub(crate) fn register(id: HostId, spec: HostSpec) -> Result<Self> {
        spec.capacity.validate_capacity()?;
        Ok(Host {
            id,
            capacity: spec.capacity,
            power: spec.power,
            group: spec.group,
            latency: spec.latency,
        })
    }
}

/// How spare throughput is handed out on one host
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BurstShare {
    /// Every container may add this much on top of its guaranteed IPS
    Slack(f64),
    /// Guaranteed demand exceeds capacity; every grant is scaled by this factor
    Overcommitted(f64),
}

impl BurstShare {
    pub(crate) fn grant(&self, container: &Container) -> f64 {
        let base = container.base_ips();
        match *self {
            BurstShare::Slack(extra) => container.burst_ips().min(base + extra),
            BurstShare::Overcommitted(scale) => base * scale,
        }
    }
}

/// Read-only handle onto a host and its current placement
#[derive(Debug, Clone, Copy)]
pub struct HostView<'a> {
    cluster: &'a Cluster,
    host: &'a Host,
}

impl<'a> HostView<'a> {
    pub(crate) fn new(cluster: &'a Cluster, host: &'a Host) -> Self {
        HostView { cluster, host }
    }

    pub fn host(&self) -> &'a Host {
        self.host
    }

    pub fn id(&self) -> HostId {
        self.host.id
    }

    pub fn capacity(&self) -> &'a ResourceProfile {
        &self.host.capacity
    }

    /// Containers currently assigned here
    pub fn containers(self) -> impl Iterator<Item = &'a Container> + 'a {
        self.cluster.assigned_to(self.host.id)
    }

    pub fn container_ids(&self) -> Vec<ContainerId> {
        self.containers().map(|c| c.id).collect()
    }

    /// Sum of guaranteed-minimum IPS of assigned containers
    pub fn base_ips(&self) -> f64 {
        self.containers().map(Container::base_ips).sum()
    }

    pub(crate) fn burst_share(&self) -> BurstShare {
        let (count, base) = self
            .containers()
            .fold((0usize, 0.0), |(n, sum), c| (n + 1, sum + c.base_ips()));
        let cap = self.host.capacity.ips;
        let slack = cap - base;

        if count == 0 || slack >= 0.0 {
            BurstShare::Slack(slack.max(0.0) / count.max(1) as f64)
        } else {
            BurstShare::Overcommitted(cap / base)
        }
    }

    /// Sum of IPS actually granted to assigned containers (bursting included)
    pub fn apparent_ips(&self) -> f64 {
        let share = self.burst_share();
        self.containers().map(|c| share.grant(c)).sum()
    }

    /// CPU utilization in percent
    pub fn cpu(&self) -> f64 {
        100.0 * self.apparent_ips() / self.host.capacity.ips
    }

    /// Capacity left after reserving every guaranteed minimum.
    ///
    /// Negative when the host is overcommitted.
    pub fn ips_available(&self) -> f64 {
        self.host.capacity.ips - self.base_ips()
    }

    pub fn current_ram(&self) -> IoProfile {
        self.containers().map(Container::ram).sum()
    }

    pub fn ram_available(&self) -> IoProfile {
        self.host.capacity.ram - self.current_ram()
    }

    pub fn current_disk(&self) -> IoProfile {
        self.containers().map(Container::disk).sum()
    }

    pub fn disk_available(&self) -> IoProfile {
        self.host.capacity.disk - self.current_disk()
    }

    /// Watts drawn at the current utilization
    pub fn power(&self) -> f64 {
        self.host.power.power_from_utilization(self.cpu())
    }

    /// Watts the host would draw if it ran `ips` in total
    pub fn power_from_ips(&self, ips: f64) -> f64 {
        let utilization = (100.0 * ips / self.host.capacity.ips).min(100.0);
        self.host.power.power_from_utilization(utilization)
    }
}
