//! Run configuration
//!
//! Handed to the engine by value at construction and never mutated after.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};
use crate::fleet::FleetConfig;
use crate::policies::{FirstFit, RandomPlacement, RandomSelection, SchedulerPolicy};
use crate::workload::SyntheticWorkloadConfig;

/// Built-in placement strategies selectable from config or CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    #[default]
    FirstFit,
    Random,
}

impl std::str::FromStr for PolicyKind {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first-fit" | "firstfit" | "ff" => Ok(PolicyKind::FirstFit),
            "random" => Ok(PolicyKind::Random),
            other => Err(SimulationError::config(format!("unknown policy '{other}'"))),
        }
    }
}

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Length of one scheduling interval in seconds
    pub interval_secs: f64,
    /// Intervals to run
    pub steps: u64,
    /// Upper bound on concurrently held container slots
    pub container_limit: usize,
    /// Router bandwidth shared by all migrations of one decision
    pub router_bandwidth: f64,
    /// Seed for every random component of the run
    pub seed: u64,
    pub policy: PolicyKind,
    /// Migration candidates drawn per interval (0 disables migration)
    pub selection_count: usize,
    pub fleet: FleetConfig,
    pub workload: SyntheticWorkloadConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            interval_secs: 300.0,
            steps: 20,
            container_limit: 10,
            router_bandwidth: 10_000.0,
            seed: 42,
            policy: PolicyKind::FirstFit,
            selection_count: 2,
            fleet: FleetConfig::default(),
            workload: SyntheticWorkloadConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: SimulationConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.interval_secs.is_finite() && self.interval_secs > 0.0) {
            return Err(SimulationError::config(format!(
                "interval_secs must be positive, got {}",
                self.interval_secs
            )));
        }
        if !(self.router_bandwidth.is_finite() && self.router_bandwidth > 0.0) {
            return Err(SimulationError::config(format!(
                "router_bandwidth must be positive, got {}",
                self.router_bandwidth
            )));
        }
        if self.container_limit == 0 {
            return Err(SimulationError::config("container_limit must be at least 1"));
        }
        self.workload.validate()
    }

    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_container_limit(mut self, limit: usize) -> Self {
        self.container_limit = limit;
        self
    }

    pub fn with_interval_secs(mut self, secs: f64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// Instantiate the configured policy, wrapped in random migration
    /// selection when `selection_count > 0`
    pub fn build_policy(&self) -> Box<dyn SchedulerPolicy> {
        let seed = self.seed.wrapping_add(1);
        match (self.policy, self.selection_count) {
            (PolicyKind::FirstFit, 0) => Box::new(FirstFit::new()),
            (PolicyKind::FirstFit, n) => Box::new(RandomSelection::new(FirstFit::new(), n, seed)),
            (PolicyKind::Random, 0) => Box::new(RandomPlacement::new(seed)),
            (PolicyKind::Random, n) => Box::new(RandomSelection::new(
                RandomPlacement::new(seed),
                n,
                seed.wrapping_add(1),
            )),
        }
    }
}
