//! Workload arrival sources
//!
//! The engine pulls arrivals from a [`WorkloadSource`] at the start of every
//! interval and acknowledges which of them it managed to place. Anything not
//! acknowledged stays queued in the source and is offered again next time;
//! the queue length is the only backpressure signal the simulation has.
//!
//! Two sources ship with the crate:
//! - [`TraceWorkload`]: replays fixed per-interval batches (tests, what-if runs)
//! - [`SyntheticWorkload`]: Poisson arrivals with randomized demand

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};

use crate::CreationId;
use crate::error::{Result, SimulationError};
use crate::resources::{IoProfile, ResourceProfile, WorkloadDemand};

/// One arrival as produced by a source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub creation_id: CreationId,
    /// Interval in which the source created the workload
    pub creation_interval: u64,
    pub demand: WorkloadDemand,
}

impl WorkloadSpec {
    pub fn new(creation_id: CreationId, creation_interval: u64, demand: WorkloadDemand) -> Self {
        WorkloadSpec {
            creation_id,
            creation_interval,
            demand,
        }
    }
}

/// Workload-arrival collaborator
pub trait WorkloadSource {
    /// Create this interval's arrivals and return every spec still waiting
    /// for placement (new and previously queued), oldest first.
    fn generate_new_containers(&mut self, interval: u64) -> Vec<WorkloadSpec>;

    /// Specs created but not yet placed
    fn undeployed_containers(&self) -> Vec<WorkloadSpec>;

    /// Acknowledge the specs that went live this interval
    fn update_deployed_containers(&mut self, creation_ids: &[CreationId]);

    /// Backlog length
    fn queue_len(&self) -> usize {
        self.undeployed_containers().len()
    }

    /// Total specs created so far
    fn total_created(&self) -> usize;
}

/// Created/deployed bookkeeping shared by the built-in sources.
/// Creation IDs are dense, so they double as indices.
#[derive(Debug, Clone, Default)]
struct ArrivalLedger {
    created: Vec<WorkloadSpec>,
    deployed: Vec<bool>,
}

impl ArrivalLedger {
    fn create(&mut self, interval: u64, demand: WorkloadDemand) {
        let id = self.created.len() as CreationId;
        self.created.push(WorkloadSpec::new(id, interval, demand));
        self.deployed.push(false);
    }

    fn undeployed(&self) -> Vec<WorkloadSpec> {
        self.created
            .iter()
            .zip(&self.deployed)
            .filter(|(_, deployed)| !**deployed)
            .map(|(spec, _)| *spec)
            .collect()
    }

    fn mark_deployed(&mut self, creation_ids: &[CreationId]) {
        for &id in creation_ids {
            if let Some(flag) = self.deployed.get_mut(id as usize) {
                *flag = true;
            }
        }
    }
}

/// Replays a fixed batch of demands per interval.
///
/// Batch `k` (0-based) arrives in interval `k + 1`; intervals past the end
/// of the trace bring nothing.
#[derive(Debug, Clone, Default)]
pub struct TraceWorkload {
    batches: Vec<Vec<WorkloadDemand>>,
    ledger: ArrivalLedger,
}

impl TraceWorkload {
    pub fn new(batches: Vec<Vec<WorkloadDemand>>) -> Self {
        TraceWorkload {
            batches,
            ledger: ArrivalLedger::default(),
        }
    }

    /// A single batch arriving in the first interval
    pub fn single(batch: Vec<WorkloadDemand>) -> Self {
        Self::new(vec![batch])
    }
}

impl WorkloadSource for TraceWorkload {
    fn generate_new_containers(&mut self, interval: u64) -> Vec<WorkloadSpec> {
        let batch = interval
            .checked_sub(1)
            .and_then(|k| self.batches.get(k as usize))
            .cloned()
            .unwrap_or_default();
        for demand in batch {
            self.ledger.create(interval, demand);
        }
        self.ledger.undeployed()
    }

    fn undeployed_containers(&self) -> Vec<WorkloadSpec> {
        self.ledger.undeployed()
    }

    fn update_deployed_containers(&mut self, creation_ids: &[CreationId]) {
        self.ledger.mark_deployed(creation_ids);
    }

    fn total_created(&self) -> usize {
        self.ledger.created.len()
    }
}

/// Parameters of the synthetic arrival process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticWorkloadConfig {
    /// Mean new containers per interval (Poisson)
    pub arrival_rate: f64,
    /// Guaranteed IPS, drawn uniformly
    pub ips_min: f64,
    pub ips_max: f64,
    /// Burst ceiling as a multiple of guaranteed IPS, drawn from [1, max]
    pub burst_factor_max: f64,
    /// Work expressed as intervals at guaranteed IPS, drawn uniformly
    pub duration_min: f64,
    pub duration_max: f64,
    /// SLA deadline = creation + ceil(duration × slack)
    pub sla_slack: f64,
    /// Memory footprint in MB (normal, floored at 1)
    pub ram_mean: f64,
    pub ram_std: f64,
    /// Disk footprint in MB (normal, floored at 1)
    pub disk_mean: f64,
    pub disk_std: f64,
    /// Memory/disk read and write rates per MB of footprint
    pub io_rate_per_mb: f64,
}

impl Default for SyntheticWorkloadConfig {
    fn default() -> Self {
        SyntheticWorkloadConfig {
            arrival_rate: 1.5,
            ips_min: 5_000.0,
            ips_max: 30_000.0,
            burst_factor_max: 2.0,
            duration_min: 1.0,
            duration_max: 6.0,
            sla_slack: 1.5,
            ram_mean: 1_000.0,
            ram_std: 250.0,
            disk_mean: 8_000.0,
            disk_std: 2_000.0,
            io_rate_per_mb: 0.05,
        }
    }
}

impl SyntheticWorkloadConfig {
    pub fn validate(&self) -> Result<()> {
        let finite_non_negative = |name: &str, v: f64| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(SimulationError::config(format!("workload.{name} must be finite and non-negative, got {v}")))
            }
        };
        finite_non_negative("arrival_rate", self.arrival_rate)?;
        finite_non_negative("ips_min", self.ips_min)?;
        finite_non_negative("ram_std", self.ram_std)?;
        finite_non_negative("disk_std", self.disk_std)?;
        finite_non_negative("io_rate_per_mb", self.io_rate_per_mb)?;

        if self.ips_max < self.ips_min || self.ips_max <= 0.0 {
            return Err(SimulationError::config("workload.ips_max must be positive and >= ips_min"));
        }
        if !(self.burst_factor_max >= 1.0) {
            return Err(SimulationError::config("workload.burst_factor_max must be >= 1"));
        }
        if !(self.duration_min > 0.0 && self.duration_max >= self.duration_min) {
            return Err(SimulationError::config("workload duration range must be positive and ordered"));
        }
        if !(self.sla_slack >= 1.0) {
            return Err(SimulationError::config("workload.sla_slack must be >= 1"));
        }
        Ok(())
    }
}

/// Randomized arrival process.
///
/// Each interval draws `Poisson(arrival_rate)` new containers. Demand per
/// container:
/// - guaranteed IPS ~ U(ips_min, ips_max), burst ~ IPS × U(1, burst_factor_max)
/// - instructions = IPS × interval_secs × U(duration_min, duration_max)
/// - memory and disk sizes ~ Normal, read/write rates proportional to size
pub struct SyntheticWorkload {
    config: SyntheticWorkloadConfig,
    interval_secs: f64,
    rng: StdRng,
    arrivals: Option<Poisson<f64>>,
    ram: Normal<f64>,
    disk: Normal<f64>,
    ledger: ArrivalLedger,
}

impl SyntheticWorkload {
    pub fn new(config: SyntheticWorkloadConfig, interval_secs: f64, seed: u64) -> Result<Self> {
        config.validate()?;

        let arrivals = if config.arrival_rate > 0.0 {
            Some(
                Poisson::new(config.arrival_rate)
                    .map_err(|e| SimulationError::config(format!("arrival process: {e}")))?,
            )
        } else {
            None
        };
        let ram = Normal::new(config.ram_mean, config.ram_std)
            .map_err(|e| SimulationError::config(format!("memory distribution: {e}")))?;
        let disk = Normal::new(config.disk_mean, config.disk_std)
            .map_err(|e| SimulationError::config(format!("disk distribution: {e}")))?;

        Ok(SyntheticWorkload {
            config,
            interval_secs,
            rng: StdRng::seed_from_u64(seed),
            arrivals,
            ram,
            disk,
            ledger: ArrivalLedger::default(),
        })
    }

    fn sample_demand(&mut self, interval: u64) -> WorkloadDemand {
        let cfg = &self.config;
        let ips = self.rng.gen_range(cfg.ips_min..=cfg.ips_max);
        let burst = ips * self.rng.gen_range(1.0..=cfg.burst_factor_max);
        let duration = self.rng.gen_range(cfg.duration_min..=cfg.duration_max);
        let sla = interval + (duration * cfg.sla_slack).ceil() as u64;

        let ram_size = self.ram.sample(&mut self.rng).max(1.0);
        let disk_size = self.disk.sample(&mut self.rng).max(1.0);
        let rate = cfg.io_rate_per_mb;

        WorkloadDemand {
            guaranteed: ResourceProfile {
                ips,
                ram: IoProfile::new(ram_size, ram_size * rate, ram_size * rate),
                disk: IoProfile::new(disk_size, disk_size * rate, disk_size * rate),
                ..ResourceProfile::default()
            },
            burst_ips: burst,
            instructions: ips * self.interval_secs * duration,
            sla,
        }
    }
}

impl WorkloadSource for SyntheticWorkload {
    fn generate_new_containers(&mut self, interval: u64) -> Vec<WorkloadSpec> {
        let count = match &self.arrivals {
            Some(poisson) => {
                let draw: f64 = poisson.sample(&mut self.rng);
                draw as usize
            }
            None => 0,
        };
        for _ in 0..count {
            let demand = self.sample_demand(interval);
            self.ledger.create(interval, demand);
        }
        self.ledger.undeployed()
    }

    fn undeployed_containers(&self) -> Vec<WorkloadSpec> {
        self.ledger.undeployed()
    }

    fn update_deployed_containers(&mut self, creation_ids: &[CreationId]) {
        self.ledger.mark_deployed(creation_ids);
    }

    fn total_created(&self) -> usize {
        self.ledger.created.len()
    }
}
