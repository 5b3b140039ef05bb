//! Resource descriptors shared by hosts and containers
//!
//! The same shapes describe capacity (on a host) and demand (on a container):
//! - Throughput in instructions per second (IPS)
//! - Memory and disk as (size, read rate, write rate) triples
//! - Link bandwidth as (uplink, downlink)
//!
//! All descriptors are plain values and never change after the host or
//! container that carries them is created.

use std::iter::Sum;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};

/// Size plus read/write throughput of a storage tier (memory or disk)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IoProfile {
    pub size: f64,
    pub read: f64,
    pub write: f64,
}

impl IoProfile {
    pub const ZERO: IoProfile = IoProfile {
        size: 0.0,
        read: 0.0,
        write: 0.0,
    };

    pub fn new(size: f64, read: f64, write: f64) -> Self {
        IoProfile { size, read, write }
    }

    /// Check whether `demand` fits inside this profile on every field
    pub fn covers(&self, demand: &IoProfile) -> bool {
        demand.size <= self.size && demand.read <= self.read && demand.write <= self.write
    }

    /// First field on which `demand` does not fit, as (name, need, have)
    pub fn first_shortfall(&self, demand: &IoProfile) -> Option<(&'static str, f64, f64)> {
        if demand.size > self.size {
            Some(("size", demand.size, self.size))
        } else if demand.read > self.read {
            Some(("read", demand.read, self.read))
        } else if demand.write > self.write {
            Some(("write", demand.write, self.write))
        } else {
            None
        }
    }

    fn is_valid(&self) -> bool {
        [self.size, self.read, self.write]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl Add for IoProfile {
    type Output = IoProfile;

    fn add(self, rhs: IoProfile) -> IoProfile {
        IoProfile {
            size: self.size + rhs.size,
            read: self.read + rhs.read,
            write: self.write + rhs.write,
        }
    }
}

impl Sub for IoProfile {
    type Output = IoProfile;

    fn sub(self, rhs: IoProfile) -> IoProfile {
        IoProfile {
            size: self.size - rhs.size,
            read: self.read - rhs.read,
            write: self.write - rhs.write,
        }
    }
}

impl Sum for IoProfile {
    fn sum<I: Iterator<Item = IoProfile>>(iter: I) -> IoProfile {
        iter.fold(IoProfile::ZERO, Add::add)
    }
}

/// Link bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bandwidth {
    pub uplink: f64,
    pub downlink: f64,
}

impl Bandwidth {
    pub fn new(uplink: f64, downlink: f64) -> Self {
        Bandwidth { uplink, downlink }
    }
}

/// Capacity (host) or guaranteed demand (container) across every dimension
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceProfile {
    /// Throughput in IPS
    pub ips: f64,
    pub ram: IoProfile,
    pub disk: IoProfile,
    #[serde(default)]
    pub bandwidth: Bandwidth,
}

impl ResourceProfile {
    pub fn new(ips: f64, ram: IoProfile, disk: IoProfile, bandwidth: Bandwidth) -> Self {
        ResourceProfile {
            ips,
            ram,
            disk,
            bandwidth,
        }
    }

    /// Validate a host capacity profile.
    ///
    /// Throughput and downlink must be strictly positive: utilization and
    /// migration transfer time divide by them.
    pub fn validate_capacity(&self) -> Result<()> {
        if !(self.ips.is_finite() && self.ips > 0.0) {
            return Err(SimulationError::spec(format!(
                "host throughput must be positive, got {}",
                self.ips
            )));
        }
        if !(self.ram.is_valid() && self.disk.is_valid()) {
            return Err(SimulationError::spec("host memory/disk capacity must be non-negative"));
        }
        if !(self.bandwidth.downlink > 0.0 && self.bandwidth.uplink > 0.0) {
            return Err(SimulationError::spec(format!(
                "host bandwidth must be positive, got {:?}",
                self.bandwidth
            )));
        }
        Ok(())
    }
}

/// Everything a container asks of the cluster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkloadDemand {
    /// Guaranteed-minimum demand (bandwidth is ignored for containers)
    pub guaranteed: ResourceProfile,
    /// Burst ceiling on throughput; apparent IPS never exceeds it
    pub burst_ips: f64,
    /// Total work, in instructions, before the container completes
    pub instructions: f64,
    /// Interval by which the container should be destroyed
    pub sla: u64,
}

impl WorkloadDemand {
    /// Demand with no burst headroom and zero memory/disk
    pub fn new(ips: f64, instructions: f64, sla: u64) -> Self {
        WorkloadDemand {
            guaranteed: ResourceProfile {
                ips,
                ..ResourceProfile::default()
            },
            burst_ips: ips,
            instructions,
            sla,
        }
    }

    pub fn with_burst(mut self, burst_ips: f64) -> Self {
        self.burst_ips = burst_ips;
        self
    }

    pub fn with_ram(mut self, ram: IoProfile) -> Self {
        self.guaranteed.ram = ram;
        self
    }

    pub fn with_disk(mut self, disk: IoProfile) -> Self {
        self.guaranteed.disk = disk;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let ips = self.guaranteed.ips;
        if !(ips.is_finite() && ips >= 0.0) {
            return Err(SimulationError::spec(format!("guaranteed IPS must be non-negative, got {ips}")));
        }
        if !(self.burst_ips.is_finite() && self.burst_ips >= ips) {
            return Err(SimulationError::spec(format!(
                "burst IPS {} below guaranteed IPS {}",
                self.burst_ips, ips
            )));
        }
        if !(self.instructions.is_finite() && self.instructions > 0.0) {
            return Err(SimulationError::spec(format!(
                "instruction budget must be positive, got {}",
                self.instructions
            )));
        }
        if !(self.guaranteed.ram.is_valid() && self.guaranteed.disk.is_valid()) {
            return Err(SimulationError::spec("memory/disk demand must be non-negative"));
        }
        Ok(())
    }
}
