//! Workloads (containers)
//!
//! A [`Container`] holds its demand, lifecycle timestamps and the execution
//! and migration accumulators. It does not know where it runs: the host
//! assignment lives only in the cluster's table and is read back through
//! [`ContainerView`].

use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;
use crate::host::HostView;
use crate::resources::{IoProfile, WorkloadDemand};
use crate::workload::WorkloadSpec;
use crate::{ContainerId, CreationId, HostId};

/// A workload admitted into the cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// Slot index in the cluster
    pub id: ContainerId,
    /// Identifier assigned by the arrival source
    pub creation_id: CreationId,
    pub demand: WorkloadDemand,

    // Lifecycle (interval numbers)
    pub created_at: u64,
    pub started_at: u64,
    pub destroyed_at: Option<u64>,

    // Accumulators (seconds)
    pub total_exec_time: f64,
    pub total_migration_time: f64,
    pub completed_instructions: f64,

    pub active: bool,
}

impl Container {
    pub(crate) fn new(id: ContainerId, spec: &WorkloadSpec, interval: u64) -> Self {
        Container {
            id,
            creation_id: spec.creation_id,
            demand: spec.demand,
            created_at: spec.creation_interval,
            started_at: interval,
            destroyed_at: None,
            total_exec_time: 0.0,
            total_migration_time: 0.0,
            completed_instructions: 0.0,
            active: true,
        }
    }

    /// Guaranteed-minimum IPS
    pub fn base_ips(&self) -> f64 {
        self.demand.guaranteed.ips
    }

    /// Burst ceiling
    pub fn burst_ips(&self) -> f64 {
        self.demand.burst_ips
    }

    pub fn ram(&self) -> IoProfile {
        self.demand.guaranteed.ram
    }

    pub fn disk(&self) -> IoProfile {
        self.demand.guaranteed.disk
    }

    /// Bytes moved when this container migrates (its memory footprint)
    pub fn migration_size(&self) -> f64 {
        self.demand.guaranteed.ram.size
    }

    pub fn sla(&self) -> u64 {
        self.demand.sla
    }

    pub fn remaining_instructions(&self) -> f64 {
        (self.demand.instructions - self.completed_instructions).max(0.0)
    }

    pub fn is_complete(&self) -> bool {
        self.completed_instructions >= self.demand.instructions
    }

    /// Execution plus migration time
    pub fn response_time(&self) -> f64 {
        self.total_exec_time + self.total_migration_time
    }

    /// Intervals spent queued before being admitted
    pub fn wait_time(&self) -> u64 {
        self.started_at.saturating_sub(self.created_at)
    }

    /// Whether the container was destroyed after its SLA deadline
    pub fn violated_sla(&self) -> bool {
        self.destroyed_at.is_some_and(|at| at > self.demand.sla)
    }

    /// Record the transfer cost of a committed relocation
    pub(crate) fn charge_migration(&mut self, migration_time: f64) {
        self.total_migration_time += migration_time;
    }

    /// Run for one interval at `apparent_ips`.
    ///
    /// Migration time already charged at commit eats into the interval;
    /// only the rest is spent executing. Returns the instructions completed.
    pub(crate) fn execute(&mut self, apparent_ips: f64, migration_time: f64, interval_secs: f64) -> f64 {
        let exec_window = (interval_secs - migration_time).max(0.0);
        if apparent_ips <= 0.0 || exec_window == 0.0 {
            return 0.0;
        }

        let required = self.remaining_instructions() / apparent_ips;
        if required <= exec_window {
            let done = self.remaining_instructions();
            self.total_exec_time += required;
            self.completed_instructions = self.demand.instructions;
            done
        } else {
            let done = apparent_ips * exec_window;
            self.total_exec_time += exec_window;
            self.completed_instructions += done;
            done
        }
    }

    pub(crate) fn destroy(&mut self, interval: u64) {
        self.destroyed_at = Some(interval);
        self.active = false;
    }
}

/// Read-only handle onto a container and its current host
#[derive(Debug, Clone, Copy)]
pub struct ContainerView<'a> {
    cluster: &'a Cluster,
    container: &'a Container,
}

impl<'a> ContainerView<'a> {
    pub(crate) fn new(cluster: &'a Cluster, container: &'a Container) -> Self {
        ContainerView { cluster, container }
    }

    pub fn container(&self) -> &'a Container {
        self.container
    }

    pub fn id(&self) -> ContainerId {
        self.container.id
    }

    /// Current host, `None` when unplaced or destroyed
    pub fn current_host(&self) -> Option<HostId> {
        if !self.container.active {
            return None;
        }
        self.cluster.host_of(self.container.id)
    }

    pub fn host(&self) -> Option<HostView<'a>> {
        self.current_host()
            .and_then(|id| self.cluster.host(id).ok())
    }

    pub fn base_ips(&self) -> f64 {
        self.container.base_ips()
    }

    /// IPS currently granted by the host, capped at the burst ceiling.
    ///
    /// Zero while unplaced.
    pub fn apparent_ips(&self) -> f64 {
        self.host()
            .map(|host| host.burst_share().grant(self.container))
            .unwrap_or(0.0)
    }
}
