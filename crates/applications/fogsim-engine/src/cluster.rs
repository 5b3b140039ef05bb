//! Cluster state and its read-only query surface
//!
//! The cluster owns the only copy of the container → host assignment table.
//! Hosts and containers carry no placement of their own; [`HostView`] and
//! [`ContainerView`] read this table on every call.
//!
//! Only the simulation engine mutates a cluster (all writers are
//! `pub(crate)`). Schedulers, statistics and drivers get `&Cluster`.
//!
//! ## Layout
//!
//! ```text
//! hosts:      [h0, h1, h2]                       fixed at construction
//! slots:      [Some(c0), None, Some(c2), ...]    sparse, vacant slots reused
//! placements: [Some(h1), None, None, ...]        parallel to slots
//! retired:    [c7, c3, ...]                      destroyed containers, in order
//! ```

use crate::container::{Container, ContainerView};
use crate::decision::Migration;
use crate::error::{Result, SimulationError};
use crate::host::{Host, HostSpec, HostView};
use crate::resources::IoProfile;
use crate::workload::WorkloadSpec;
use crate::{ContainerId, CreationId, HostId};

/// Hosts, containers and the assignment table between them
#[derive(Debug, Default)]
pub struct Cluster {
    hosts: Vec<Host>,
    slots: Vec<Option<Container>>,
    placements: Vec<Option<HostId>>,
    retired: Vec<Container>,
    interval: u64,
    elapsed_secs: f64,
}

impl Cluster {
    /// Build a cluster from an ordered host list. Host indices follow the
    /// list order and are never reused.
    pub fn new(hosts: Vec<HostSpec>) -> Result<Self> {
        let mut cluster = Cluster::default();
        for spec in hosts {
            cluster.register_host(spec)?;
        }
        Ok(cluster)
    }

    fn register_host(&mut self, spec: HostSpec) -> Result<HostId> {
        let id = self.hosts.len();
        self.hosts.push(Host::register(id, spec)?);
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Current interval number (0 before the first step)
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Simulated seconds since the start of the run
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn num_hosts(&self) -> usize {
        self.hosts.len()
    }

    pub fn host(&self, id: HostId) -> Result<HostView<'_>> {
        self.hosts
            .get(id)
            .map(|h| HostView::new(self, h))
            .ok_or_else(|| SimulationError::unknown_host(id))
    }

    /// Views over every host, in registration order
    pub fn host_views(&self) -> impl Iterator<Item = HostView<'_>> {
        self.hosts.iter().map(move |h| HostView::new(self, h))
    }

    /// Sparse container list; vacant slots are `None`
    pub fn containers(&self) -> &[Option<Container>] {
        &self.slots
    }

    /// Containers destroyed so far, in retirement order
    pub fn retired(&self) -> &[Container] {
        &self.retired
    }

    pub fn container(&self, id: ContainerId) -> Result<&Container> {
        self.slots
            .get(id)
            .and_then(Option::as_ref)
            .ok_or_else(|| SimulationError::unknown_container(id))
    }

    pub fn container_view(&self, id: ContainerId) -> Result<ContainerView<'_>> {
        self.container(id).map(|c| ContainerView::new(self, c))
    }

    /// Look a container up by creation ID, including retired ones
    pub fn container_by_creation_id(&self, creation_id: CreationId) -> Option<&Container> {
        self.slots
            .iter()
            .flatten()
            .chain(self.retired.iter())
            .find(|c| c.creation_id == creation_id)
    }

    /// Current host of a container, `None` when unplaced
    pub fn current_host(&self, id: ContainerId) -> Result<Option<HostId>> {
        self.container(id)?;
        Ok(self.host_of(id))
    }

    pub(crate) fn host_of(&self, id: ContainerId) -> Option<HostId> {
        self.placements.get(id).copied().flatten()
    }

    pub(crate) fn assigned_to(&self, host: HostId) -> impl Iterator<Item = &Container> {
        self.slots
            .iter()
            .zip(self.placements.iter())
            .filter_map(move |(slot, placed)| match (slot, placed) {
                (Some(c), Some(h)) if *h == host && c.active => Some(c),
                _ => None,
            })
    }

    pub fn containers_of_host(&self, host: HostId) -> Result<Vec<ContainerId>> {
        Ok(self.host(host)?.container_ids())
    }

    /// Number of containers per host, in host order
    pub fn containers_in_hosts(&self) -> Vec<usize> {
        self.host_views().map(|h| h.containers().count()).collect()
    }

    pub fn num_active_containers(&self) -> usize {
        self.slots.iter().flatten().filter(|c| c.active).count()
    }

    /// Host per slot, `None` for vacant, inactive or unplaced slots
    pub fn active_container_list(&self) -> Vec<Option<HostId>> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| match slot {
                Some(c) if c.active => self.host_of(i),
                _ => None,
            })
            .collect()
    }

    /// Active containers that are already placed (migration candidates)
    pub fn selectable_containers(&self) -> Vec<ContainerId> {
        self.slots
            .iter()
            .flatten()
            .filter(|c| c.active && self.host_of(c.id).is_some())
            .map(|c| c.id)
            .collect()
    }

    /// Creation IDs of the containers in `deployed` that `migrations` placed
    pub fn creation_ids(&self, migrations: &[Migration], deployed: &[ContainerId]) -> Vec<CreationId> {
        migrations
            .iter()
            .filter(|m| deployed.contains(&m.container))
            .filter_map(|m| self.container(m.container).ok())
            .map(|c| c.creation_id)
            .collect()
    }

    /// Whether `host` has headroom for every guaranteed demand of `container`
    /// (IPS, memory and disk). Pure probe; never changes state.
    pub fn placement_possible(&self, container: ContainerId, host: HostId) -> Result<bool> {
        let c = self.container(container)?;
        let h = self.host(host)?;

        Ok(c.base_ips() <= h.ips_available()
            && h.ram_available().covers(&c.ram())
            && h.disk_available().covers(&c.disk()))
    }

    /// Disk headroom check for the commit pass, reported as the soft error
    /// the entry would be dropped with.
    pub(crate) fn disk_shortfall(&self, container: ContainerId, host: HostId) -> Result<Option<SimulationError>> {
        let need = self.container(container)?.disk();
        let have: IoProfile = self.host(host)?.disk_available();

        Ok(have.first_shortfall(&need).map(|(field, need, have)| {
            SimulationError::CapacityExceeded {
                container,
                host,
                resource: match field {
                    "size" => "disk size",
                    "read" => "disk read",
                    _ => "disk write",
                },
                need,
                have,
            }
        }))
    }

    // ------------------------------------------------------------------
    // Engine-side writers
    // ------------------------------------------------------------------

    pub(crate) fn begin_interval(&mut self) -> u64 {
        self.interval += 1;
        self.interval
    }

    pub(crate) fn advance_clock(&mut self, secs: f64) {
        self.elapsed_secs += secs;
    }

    /// Put a new container into the first vacant slot (or a fresh one)
    pub(crate) fn admit(&mut self, spec: &WorkloadSpec) -> ContainerId {
        let id = match self.slots.iter().position(Option::is_none) {
            Some(id) => id,
            None => {
                self.slots.push(None);
                self.placements.push(None);
                self.slots.len() - 1
            }
        };
        self.slots[id] = Some(Container::new(id, spec, self.interval));
        self.placements[id] = None;
        id
    }

    pub(crate) fn container_mut(&mut self, id: ContainerId) -> Result<&mut Container> {
        self.slots
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or_else(|| SimulationError::unknown_container(id))
    }

    pub(crate) fn assign(&mut self, container: ContainerId, host: HostId) -> Result<()> {
        self.container(container)?;
        self.host(host)?;
        self.placements[container] = Some(host);
        Ok(())
    }

    /// Vacate a slot without keeping its container (unplaced arrival)
    pub(crate) fn release(&mut self, id: ContainerId) {
        if let Some(slot) = self.slots.get_mut(id) {
            *slot = None;
            self.placements[id] = None;
        }
    }

    /// Destroy a container, vacate its slot and keep it in the retired list
    pub(crate) fn retire(&mut self, id: ContainerId) -> Result<Container> {
        let interval = self.interval;
        let mut container = self
            .slots
            .get_mut(id)
            .and_then(Option::take)
            .ok_or_else(|| SimulationError::unknown_container(id))?;
        self.placements[id] = None;

        container.destroy(interval);
        self.retired.push(container.clone());
        Ok(container)
    }
}
