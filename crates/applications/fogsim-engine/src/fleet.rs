//! Fleet bootstrap
//!
//! Produces the ordered host list once, at engine construction. Host indices
//! follow the list order.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SimulationError};
use crate::host::HostSpec;
use crate::power::PowerCurve;
use crate::resources::{Bandwidth, IoProfile, ResourceProfile};

/// Fleet-bootstrap collaborator
pub trait FleetBuilder {
    fn generate_hosts(&self) -> Result<Vec<HostSpec>>;
}

/// A fixed, prebuilt host list
#[derive(Debug, Clone, Default)]
pub struct StaticFleet(pub Vec<HostSpec>);

impl FleetBuilder for StaticFleet {
    fn generate_hosts(&self) -> Result<Vec<HostSpec>> {
        Ok(self.0.clone())
    }
}

/// A named machine type: capacity plus its decile power table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostTypeSpec {
    pub capacity: ResourceProfile,
    /// Watts at 0%, 10%, …, 100% utilization
    pub power_watts: Vec<f64>,
}

impl HostTypeSpec {
    /// Waggle "wildnode" edge computer (Jetson Xavier NX class)
    pub fn wildnode() -> Self {
        HostTypeSpec {
            capacity: ResourceProfile::new(
                100_000.0,
                IoProfile::new(8_000.0, 59_000.0 * 5.0, 59_000.0 * 5.0),
                IoProfile::new(512_000.0, 3_500.0 * 5.0, 2_500.0 * 10.0),
                Bandwidth::new(10.0, 1.0),
            ),
            power_watts: PowerCurve::jetson_xavier_nx().samples().to_vec(),
        }
    }
}

/// One host in the fleet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEntry {
    /// Key into [`FleetConfig::host_types`]
    pub host_type: String,
    /// Locality group name; hosts without one share the default group
    #[serde(default)]
    pub group: Option<String>,
    /// Link latency in seconds
    #[serde(default)]
    pub latency: f64,
}

impl HostEntry {
    pub fn new(host_type: impl Into<String>) -> Self {
        HostEntry {
            host_type: host_type.into(),
            group: None,
            latency: 0.0,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_latency(mut self, latency: f64) -> Self {
        self.latency = latency;
        self
    }
}

/// Host type catalog plus the ordered host list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub host_types: BTreeMap<String, HostTypeSpec>,
    pub hosts: Vec<HostEntry>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self::wildnodes(10)
    }
}

impl FleetConfig {
    /// `count` identical wildnodes in one group
    pub fn wildnodes(count: usize) -> Self {
        let mut host_types = BTreeMap::new();
        host_types.insert("wildnode".to_string(), HostTypeSpec::wildnode());
        FleetConfig {
            host_types,
            hosts: (0..count).map(|_| HostEntry::new("wildnode")).collect(),
        }
    }

    /// Resize the host list, repeating the last entry (or a wildnode)
    pub fn resize(&mut self, count: usize) {
        let filler = self
            .hosts
            .last()
            .cloned()
            .unwrap_or_else(|| HostEntry::new("wildnode"));
        if !self.host_types.contains_key(&filler.host_type) {
            self.host_types
                .insert(filler.host_type.clone(), HostTypeSpec::wildnode());
        }
        self.hosts.resize(count, filler);
    }
}

/// Builds hosts from a [`FleetConfig`].
///
/// Group names become dense group ids in order of first appearance; the
/// unnamed group is id 0 when it appears first.
#[derive(Debug, Clone)]
pub struct CatalogFleet {
    config: FleetConfig,
}

impl CatalogFleet {
    pub fn new(config: FleetConfig) -> Self {
        CatalogFleet { config }
    }
}

impl FleetBuilder for CatalogFleet {
    fn generate_hosts(&self) -> Result<Vec<HostSpec>> {
        let mut curves: BTreeMap<&str, Arc<PowerCurve>> = BTreeMap::new();
        let mut groups: Vec<Option<&str>> = Vec::new();
        let mut hosts = Vec::with_capacity(self.config.hosts.len());

        for (index, entry) in self.config.hosts.iter().enumerate() {
            let host_type = self.config.host_types.get(&entry.host_type).ok_or_else(|| {
                SimulationError::config(format!(
                    "host {index} references unknown host type '{}'",
                    entry.host_type
                ))
            })?;

            let curve = match curves.get(entry.host_type.as_str()) {
                Some(curve) => Arc::clone(curve),
                None => {
                    let curve = Arc::new(PowerCurve::from_samples(
                        entry.host_type.clone(),
                        &host_type.power_watts,
                    )?);
                    curves.insert(entry.host_type.as_str(), Arc::clone(&curve));
                    curve
                }
            };

            let group_name = entry.group.as_deref();
            let group = match groups.iter().position(|g| *g == group_name) {
                Some(id) => id,
                None => {
                    groups.push(group_name);
                    groups.len() - 1
                }
            };

            if !(entry.latency.is_finite() && entry.latency >= 0.0) {
                return Err(SimulationError::config(format!(
                    "host {index} latency must be non-negative, got {}",
                    entry.latency
                )));
            }

            hosts.push(
                HostSpec::new(host_type.capacity, curve)
                    .with_group(group)
                    .with_latency(entry.latency),
            );
        }

        debug!(hosts = hosts.len(), groups = groups.len(), "Generated fleet");
        Ok(hosts)
    }
}
