//! Interval-stepped simulation engine
//!
//! One call to [`SimulationEngine::step`] runs one interval, strictly in
//! this order:
//!
//! 1. Retire containers whose instruction budget ran out last interval
//! 2. Pull arrivals from the workload source and admit them (up to the
//!    container limit)
//! 3. Ask the policy for migration candidates, a placement decision and a
//!    filtered decision, checking the policy contract after each call
//! 4. Commit the filtered decision front to back against live host state.
//!    Disk overflow drops the entry; IPS and memory overcommit are tolerated
//! 5. Acknowledge placed arrivals to the source, release the rest
//! 6. Execute every placed container for the interval, minus its migration
//!    time
//! 7. Advance the clock
//!
//! There is no rollback and no retry within a step. A dropped entry leaves
//! the container where it was (or queued, if it just arrived) until the next
//! interval.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cluster::Cluster;
use crate::config::SimulationConfig;
use crate::container::Container;
use crate::decision::{Decision, Migration, Placement};
use crate::error::{Result, SimulationError};
use crate::fleet::FleetBuilder;
use crate::migration::{BandwidthMigration, MigrationContext, MigrationModel};
use crate::policies::SchedulerPolicy;
use crate::summary::RunSummary;
use crate::workload::{WorkloadSource, WorkloadSpec};
use crate::{ContainerId, CreationId};

/// A decision entry dropped during commit
#[derive(Debug)]
pub struct Rejection {
    pub placement: Placement,
    /// Always a soft error (`CapacityExceeded`)
    pub error: SimulationError,
}

/// Outcome of one commit pass
#[derive(Debug, Default)]
pub struct CommitReport {
    /// Applied entries, in decision order
    pub migrations: Vec<Migration>,
    pub rejected: Vec<Rejection>,
    /// Entries that targeted the container's current host
    pub unchanged: usize,
}

/// Everything that happened during one interval
#[derive(Debug)]
pub struct StepReport {
    pub interval: u64,
    /// Containers admitted from the source this interval
    pub deployed: Vec<ContainerId>,
    /// Creation IDs acknowledged back to the source (placed arrivals)
    pub acknowledged: Vec<CreationId>,
    /// Containers retired at the start of the interval
    pub destroyed: Vec<Container>,
    /// Migration candidates returned by the policy
    pub selected: Vec<ContainerId>,
    pub decision: Decision,
    pub filtered: Decision,
    pub migrations: Vec<Migration>,
    pub rejected: Vec<Rejection>,
    /// Wall time spent inside the policy
    pub scheduling_time: Duration,
    /// Source backlog after acknowledgement
    pub queue_len: usize,
    /// Joules drawn by the whole fleet over the interval
    pub energy: f64,
}

impl StepReport {
    /// Applied moves of already-placed containers
    pub fn relocations(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.iter().filter(|m| m.is_relocation())
    }
}

/// Policy output for one interval, contract-checked
struct Schedule {
    selected: Vec<ContainerId>,
    decision: Decision,
    filtered: Decision,
    elapsed: Duration,
}

/// Placement simulator over a fixed fleet
pub struct SimulationEngine {
    config: SimulationConfig,
    cluster: Cluster,
    policy: Box<dyn SchedulerPolicy>,
    migration: Box<dyn MigrationModel>,
}

impl SimulationEngine {
    /// Create an engine. The fleet is generated once, here.
    pub fn new(
        config: SimulationConfig,
        fleet: &dyn FleetBuilder,
        policy: Box<dyn SchedulerPolicy>,
    ) -> Result<Self> {
        config.validate()?;

        let hosts = fleet.generate_hosts()?;
        if hosts.is_empty() {
            return Err(SimulationError::spec("fleet has no hosts"));
        }
        let cluster = Cluster::new(hosts)?;
        let migration = Box::new(BandwidthMigration::new(config.router_bandwidth));

        info!(
            hosts = cluster.num_hosts(),
            policy = policy.name(),
            interval_secs = config.interval_secs,
            "Simulation engine ready"
        );

        Ok(SimulationEngine {
            config,
            cluster,
            policy,
            migration,
        })
    }

    /// Replace the default bandwidth-based migration model
    pub fn with_migration_model(mut self, model: Box<dyn MigrationModel>) -> Self {
        self.migration = model;
        self
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// Run `config.steps` intervals and aggregate them
    pub fn run(&mut self, source: &mut dyn WorkloadSource) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.policy.name());
        for _ in 0..self.config.steps {
            let report = self.step(source)?;
            summary.record(&report);
        }
        summary.finish(&self.cluster);
        Ok(summary)
    }

    /// Run one interval
    pub fn step(&mut self, source: &mut dyn WorkloadSource) -> Result<StepReport> {
        let interval = self.cluster.begin_interval();

        let destroyed = self.retire_completed()?;
        let specs = source.generate_new_containers(interval);
        let deployed = self.ingest(&specs)?;

        let outcome = self
            .schedule(&deployed)
            .and_then(|schedule| self.commit(&schedule.filtered).map(|commit| (schedule, commit)));
        let (schedule, commit) = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                // Nothing was committed, so this interval's arrivals go back to the source
                for &id in &deployed {
                    self.cluster.release(id);
                }
                warn!(interval, released = deployed.len(), error = %e, "Interval aborted");
                return Err(e);
            }
        };

        let acknowledged = self.cluster.creation_ids(&commit.migrations, &deployed);
        source.update_deployed_containers(&acknowledged);
        for &id in &deployed {
            if self.cluster.host_of(id).is_none() {
                self.cluster.release(id);
            }
        }

        self.execute(&commit.migrations)?;

        let energy: f64 = self
            .cluster
            .host_views()
            .map(|h| h.power() * self.config.interval_secs)
            .sum();
        self.cluster.advance_clock(self.config.interval_secs);

        let queue_len = source.queue_len();
        info!(
            interval,
            deployed = acknowledged.len(),
            destroyed = destroyed.len(),
            migrations = commit.migrations.iter().filter(|m| m.is_relocation()).count(),
            rejected = commit.rejected.len(),
            queue_len,
            active = self.cluster.num_active_containers(),
            "Interval complete"
        );

        Ok(StepReport {
            interval,
            deployed,
            acknowledged,
            destroyed,
            selected: schedule.selected,
            decision: schedule.decision,
            filtered: schedule.filtered,
            migrations: commit.migrations,
            rejected: commit.rejected,
            scheduling_time: schedule.elapsed,
            queue_len,
            energy,
        })
    }

    /// Retire every active container whose work is done
    fn retire_completed(&mut self) -> Result<Vec<Container>> {
        let done: Vec<ContainerId> = self
            .cluster
            .containers()
            .iter()
            .flatten()
            .filter(|c| c.active && c.is_complete())
            .map(|c| c.id)
            .collect();

        let mut destroyed = Vec::with_capacity(done.len());
        for id in done {
            let container = self.cluster.retire(id)?;
            debug!(
                container = id,
                creation_id = container.creation_id,
                response_time = container.response_time(),
                "Container retired"
            );
            destroyed.push(container);
        }
        Ok(destroyed)
    }

    /// Admit queued arrivals up to the container limit, oldest first
    fn ingest(&mut self, specs: &[WorkloadSpec]) -> Result<Vec<ContainerId>> {
        let room = self
            .config
            .container_limit
            .saturating_sub(self.cluster.num_active_containers());

        let batch = &specs[..room.min(specs.len())];
        for spec in batch {
            spec.demand.validate().map_err(|e| {
                SimulationError::spec(format!("arrival {}: {e}", spec.creation_id))
            })?;
        }
        let admitted: Vec<ContainerId> = batch.iter().map(|spec| self.cluster.admit(spec)).collect();

        if specs.len() > admitted.len() {
            debug!(
                offered = specs.len(),
                admitted = admitted.len(),
                limit = self.config.container_limit,
                "Container limit reached, arrivals stay queued"
            );
        }
        Ok(admitted)
    }

    /// Drive the policy through selection, placement and filtering
    fn schedule(&mut self, deployed: &[ContainerId]) -> Result<Schedule> {
        let start = Instant::now();

        let selected = self.policy.selection(&self.cluster);
        self.check_selection(&selected)?;

        let mut seen = HashSet::with_capacity(selected.len() + deployed.len());
        let candidates: Vec<ContainerId> = selected
            .iter()
            .chain(deployed)
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let decision = self.policy.placement(&self.cluster, &candidates);
        self.check_references(&decision)?;
        decision.validate_against(&candidates)?;

        let filtered = self.policy.filter_placement(&self.cluster, decision.clone());
        self.check_references(&filtered)?;
        filtered.validate_subsequence_of(&decision)?;

        Ok(Schedule {
            selected,
            decision,
            filtered,
            elapsed: start.elapsed(),
        })
    }

    fn check_selection(&self, selected: &[ContainerId]) -> Result<()> {
        let mut seen = HashSet::with_capacity(selected.len());
        for &id in selected {
            let container = self.cluster.container(id)?;
            if !container.active || self.cluster.host_of(id).is_none() {
                return Err(SimulationError::contract(format!(
                    "selected container {id} is not an active, placed container"
                )));
            }
            if !seen.insert(id) {
                return Err(SimulationError::contract(format!("container {id} selected twice")));
            }
        }
        Ok(())
    }

    fn check_references(&self, decision: &Decision) -> Result<()> {
        for p in decision {
            self.cluster.container(p.container)?;
            self.cluster.host(p.host)?;
        }
        Ok(())
    }

    /// Apply `decision` front to back against live host state.
    ///
    /// Every entry sees the effects of the entries before it. An entry that
    /// would overflow its target's disk is dropped and recorded; IPS and
    /// memory overcommit are tolerated. Unknown indices abort the pass before
    /// anything is applied.
    pub fn commit(&mut self, decision: &Decision) -> Result<CommitReport> {
        self.check_references(decision)?;

        let mut report = CommitReport::default();
        for p in decision {
            let current = self.cluster.host_of(p.container);
            if current == Some(p.host) {
                report.unchanged += 1;
                continue;
            }

            if let Some(error) = self.cluster.disk_shortfall(p.container, p.host)? {
                warn!(
                    container = p.container,
                    host = p.host,
                    reason = %error,
                    "Placement rejected"
                );
                report.rejected.push(Rejection {
                    placement: *p,
                    error,
                });
                continue;
            }

            self.note_soft_overcommit(p)?;

            let migration_time = match current {
                Some(source) => {
                    let hosts = self.cluster.hosts();
                    let ctx = MigrationContext {
                        container: self.cluster.container(p.container)?,
                        source: &hosts[source],
                        target: &hosts[p.host],
                        moves_into_target: decision.moves_to(p.host),
                        decision_len: decision.len(),
                    };
                    self.migration.migration_time(&ctx)
                }
                None => 0.0,
            };

            self.cluster.assign(p.container, p.host)?;
            if current.is_some() {
                self.cluster.container_mut(p.container)?.charge_migration(migration_time);
                debug!(
                    container = p.container,
                    from = current,
                    to = p.host,
                    migration_time,
                    "Container migrated"
                );
            }
            report.migrations.push(Migration {
                container: p.container,
                from: current,
                to: p.host,
                migration_time,
            });
        }

        Ok(report)
    }

    fn note_soft_overcommit(&self, p: &Placement) -> Result<()> {
        let container = self.cluster.container(p.container)?;
        let host = self.cluster.host(p.host)?;

        if host.ips_available() < container.base_ips() {
            debug!(
                container = p.container,
                host = p.host,
                need = container.base_ips(),
                have = host.ips_available(),
                "IPS overcommit tolerated"
            );
        }
        if !host.ram_available().covers(&container.ram()) {
            debug!(
                container = p.container,
                host = p.host,
                need = container.ram().size,
                have = host.ram_available().size,
                "Memory overcommit tolerated"
            );
        }
        Ok(())
    }

    /// Run every placed container for one interval
    fn execute(&mut self, migrations: &[Migration]) -> Result<()> {
        let charged: HashMap<ContainerId, f64> = migrations
            .iter()
            .filter(|m| m.is_relocation())
            .map(|m| (m.container, m.migration_time))
            .collect();

        // Grants depend on placement only, so read them all before running
        let grants: Vec<(ContainerId, f64)> = self
            .cluster
            .containers()
            .iter()
            .flatten()
            .filter(|c| c.active && self.cluster.host_of(c.id).is_some())
            .map(|c| -> Result<(ContainerId, f64)> {
                Ok((c.id, self.cluster.container_view(c.id)?.apparent_ips()))
            })
            .collect::<Result<_>>()?;

        let interval_secs = self.config.interval_secs;
        for (id, apparent_ips) in grants {
            let migration_time = charged.get(&id).copied().unwrap_or(0.0);
            self.cluster
                .container_mut(id)?
                .execute(apparent_ips, migration_time, interval_secs);
        }
        Ok(())
    }
}
