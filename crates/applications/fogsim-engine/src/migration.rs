//! Migration overhead models
//!
//! Relocating a placed container to another host costs transfer time, which
//! the container spends not executing. No data is really moved; the model
//! only decides how many seconds to charge.
//!
//! ## Default model
//!
//! ```text
//! bandwidth = min(target.downlink / moves_into_target, router_bandwidth / decision_len)
//! time      = container_memory / bandwidth + |latency(source) − latency(target)|
//! ```
//!
//! First placements of new arrivals are never charged.

use std::fmt::Debug;

use crate::container::Container;
use crate::host::Host;

/// Everything a model may look at when pricing one relocation
#[derive(Debug, Clone, Copy)]
pub struct MigrationContext<'a> {
    pub container: &'a Container,
    pub source: &'a Host,
    pub target: &'a Host,
    /// Entries in the vetted decision that target `target`
    pub moves_into_target: usize,
    /// Entries in the vetted decision
    pub decision_len: usize,
}

/// Pluggable migration cost function
pub trait MigrationModel: Debug + Send + Sync {
    /// Seconds charged to `ctx.container` for this relocation
    fn migration_time(&self, ctx: &MigrationContext<'_>) -> f64;
}

/// Transfer over the target's inbound link, shared with the router
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthMigration {
    /// Total router bandwidth, split evenly across a decision
    pub router_bandwidth: f64,
}

impl BandwidthMigration {
    pub fn new(router_bandwidth: f64) -> Self {
        BandwidthMigration { router_bandwidth }
    }

    /// Bandwidth allotted to one relocation into `target`
    pub fn allocated_bandwidth(&self, ctx: &MigrationContext<'_>) -> f64 {
        let inbound = ctx.target.capacity.bandwidth.downlink / ctx.moves_into_target.max(1) as f64;
        let router = self.router_bandwidth / ctx.decision_len.max(1) as f64;
        inbound.min(router)
    }
}

impl MigrationModel for BandwidthMigration {
    fn migration_time(&self, ctx: &MigrationContext<'_>) -> f64 {
        let bandwidth = self.allocated_bandwidth(ctx);
        let transfer = if bandwidth > 0.0 {
            ctx.container.migration_size() / bandwidth
        } else {
            f64::INFINITY
        };
        transfer + (ctx.source.latency - ctx.target.latency).abs()
    }
}

/// Constant charge per relocation, handy for experiments that ignore links
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedMigration {
    pub seconds: f64,
}

impl MigrationModel for FixedMigration {
    fn migration_time(&self, _ctx: &MigrationContext<'_>) -> f64 {
        self.seconds
    }
}
