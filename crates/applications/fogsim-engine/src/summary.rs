//! Run-level aggregates
//!
//! Folds step reports into the numbers a policy comparison needs: energy,
//! response time, SLA violations and migration overhead.

use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;
use crate::simulator::StepReport;

/// Result of a simulation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub policy_name: String,
    pub intervals: u64,
    /// Joules drawn by the fleet over the whole run
    pub total_energy: f64,
    /// Arrivals that went live
    pub deployed: usize,
    /// Moves of already-placed containers
    pub migrations: usize,
    pub total_migration_time: f64,
    /// Decision entries dropped for disk overflow
    pub rejected: usize,
    pub completed: usize,
    pub sla_violations: usize,
    /// Mean execution + migration time of completed containers (seconds)
    pub average_response_time: f64,
    /// Mean intervals queued before admission, over completed containers
    pub average_wait_intervals: f64,
    pub average_scheduling_ms: f64,
    /// Containers still running when the run ended
    pub still_active: usize,
    pub final_queue_len: usize,

    #[serde(skip)]
    response_sum: f64,
    #[serde(skip)]
    wait_sum: u64,
    #[serde(skip)]
    scheduling_ms_sum: f64,
}

impl RunSummary {
    pub fn new(policy_name: impl Into<String>) -> Self {
        RunSummary {
            policy_name: policy_name.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, report: &StepReport) {
        self.intervals += 1;
        self.total_energy += report.energy;
        self.deployed += report.acknowledged.len();
        self.rejected += report.rejected.len();

        for m in report.relocations() {
            self.migrations += 1;
            self.total_migration_time += m.migration_time;
        }

        for c in &report.destroyed {
            self.completed += 1;
            self.response_sum += c.response_time();
            self.wait_sum += c.wait_time();
            if c.violated_sla() {
                self.sla_violations += 1;
            }
        }

        self.scheduling_ms_sum += report.scheduling_time.as_secs_f64() * 1000.0;
        self.final_queue_len = report.queue_len;

        if self.completed > 0 {
            self.average_response_time = self.response_sum / self.completed as f64;
            self.average_wait_intervals = self.wait_sum as f64 / self.completed as f64;
        }
        self.average_scheduling_ms = self.scheduling_ms_sum / self.intervals as f64;
    }

    /// Capture end-of-run state
    pub fn finish(&mut self, cluster: &Cluster) {
        self.still_active = cluster.num_active_containers();
    }

    /// Fraction of completed containers that missed their deadline
    pub fn sla_violation_rate(&self) -> f64 {
        if self.completed == 0 {
            0.0
        } else {
            self.sla_violations as f64 / self.completed as f64
        }
    }
}
