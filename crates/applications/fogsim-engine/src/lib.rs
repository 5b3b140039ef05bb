//! Fogsim Engine
//!
//! Interval-stepped simulator for comparing container placement policies on
//! a fog/edge cluster. Each interval new containers arrive, a pluggable
//! policy selects migration candidates and proposes placements, and the
//! engine commits them greedily against live host capacity while tracking
//! execution, migration overhead and power draw.
//!
//! ```text
//! WorkloadSource ──► ingest ──► selection ─► placement ─► filter_placement
//!                                                              │
//!   StepReport ◄── execute ◄── commit (disk hard, IPS/RAM soft) ◄┘
//! ```

pub mod cluster;
pub mod config;
pub mod container;
pub mod decision;
pub mod error;
pub mod fleet;
pub mod host;
pub mod migration;
pub mod policies;
pub mod power;
pub mod resources;
pub mod simulator;
pub mod summary;
pub mod workload;

/// Host index, assigned at registration and never reused
pub type HostId = usize;
/// Container slot index
pub type ContainerId = usize;
/// Identifier assigned to an arrival by its workload source
pub type CreationId = u64;

pub use cluster::Cluster;
pub use config::{PolicyKind, SimulationConfig};
pub use container::{Container, ContainerView};
pub use decision::{Decision, Migration, Placement};
pub use error::{Result, SimulationError};
pub use fleet::{CatalogFleet, FleetBuilder, FleetConfig, StaticFleet};
pub use host::{Host, HostSpec, HostView};
pub use migration::{BandwidthMigration, MigrationModel};
pub use policies::{FirstFit, RandomPlacement, RandomSelection, SchedulerPolicy};
pub use power::{PowerCurve, PowerModel};
pub use resources::{Bandwidth, IoProfile, ResourceProfile, WorkloadDemand};
pub use simulator::{SimulationEngine, StepReport};
pub use summary::RunSummary;
pub use workload::{SyntheticWorkload, TraceWorkload, WorkloadSource, WorkloadSpec};
