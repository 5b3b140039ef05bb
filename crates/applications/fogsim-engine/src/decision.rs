//! Placement decisions
//!
//! A [`Decision`] is the ordered list of (container, target host) pairs a
//! policy proposes for one interval. Order matters: the engine commits entries
//! front to back and every entry sees the effects of the ones before it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};
use crate::{ContainerId, HostId};

/// One proposed assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub container: ContainerId,
    pub host: HostId,
}

impl Placement {
    pub fn new(container: ContainerId, host: HostId) -> Self {
        Placement { container, host }
    }
}

/// Ordered placement proposal for one interval
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision(Vec<Placement>);

impl Decision {
    pub fn new() -> Self {
        Decision(Vec::new())
    }

    pub fn push(&mut self, container: ContainerId, host: HostId) {
        self.0.push(Placement::new(container, host));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Placement> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Placement] {
        &self.0
    }

    /// Keep entries matching `keep`, preserving order
    pub fn retain(&mut self, keep: impl FnMut(&Placement) -> bool) {
        self.0.retain(keep);
    }

    /// Number of entries targeting `host`
    pub fn moves_to(&self, host: HostId) -> usize {
        self.0.iter().filter(|p| p.host == host).count()
    }

    /// Check the shape a policy's `placement` must produce: every container
    /// at most once, and only containers from `candidates`.
    pub fn validate_against(&self, candidates: &[ContainerId]) -> Result<()> {
        let allowed: HashSet<ContainerId> = candidates.iter().copied().collect();
        let mut seen = HashSet::with_capacity(self.0.len());

        for (pos, p) in self.0.iter().enumerate() {
            if !allowed.contains(&p.container) {
                return Err(SimulationError::contract(format!(
                    "entry {pos} places container {} which was not offered for placement",
                    p.container
                )));
            }
            if !seen.insert(p.container) {
                return Err(SimulationError::contract(format!(
                    "container {} appears more than once (entry {pos})",
                    p.container
                )));
            }
        }
        Ok(())
    }

    /// Check that `self` keeps a subset of `original`'s entries in their
    /// original relative order.
    pub fn validate_subsequence_of(&self, original: &Decision) -> Result<()> {
        let mut remaining = original.0.iter();
        for (pos, p) in self.0.iter().enumerate() {
            if !remaining.any(|q| q == p) {
                return Err(SimulationError::contract(format!(
                    "filtered entry {pos} ({} -> {}) is new or out of order",
                    p.container, p.host
                )));
            }
        }
        Ok(())
    }
}

impl From<Vec<Placement>> for Decision {
    fn from(entries: Vec<Placement>) -> Self {
        Decision(entries)
    }
}

impl FromIterator<(ContainerId, HostId)> for Decision {
    fn from_iter<I: IntoIterator<Item = (ContainerId, HostId)>>(iter: I) -> Self {
        Decision(iter.into_iter().map(|(c, h)| Placement::new(c, h)).collect())
    }
}

impl IntoIterator for Decision {
    type Item = Placement;
    type IntoIter = std::vec::IntoIter<Placement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Decision {
    type Item = &'a Placement;
    type IntoIter = std::slice::Iter<'a, Placement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An entry the commit pass applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    pub container: ContainerId,
    /// `None` for a first placement
    pub from: Option<HostId>,
    pub to: HostId,
    /// Modeled transfer overhead in seconds (zero for first placements)
    pub migration_time: f64,
}

impl Migration {
    /// Whether this moved an already-placed container
    pub fn is_relocation(&self) -> bool {
        self.from.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_building() {
        let decision: Decision = vec![(0, 1), (2, 1), (3, 0)].into_iter().collect();
        assert_eq!(decision.len(), 3);
        assert_eq!(decision.moves_to(1), 2);
        assert_eq!(decision.moves_to(5), 0);
    }

    #[test]
    fn test_validate_rejects_foreign_container() {
        let decision: Decision = vec![(0, 1), (7, 1)].into_iter().collect();
        let err = decision.validate_against(&[0, 1, 2]).unwrap_err();
        assert!(matches!(err, SimulationError::PolicyContractViolation(_)));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let decision: Decision = vec![(0, 1), (0, 2)].into_iter().collect();
        assert!(decision.validate_against(&[0]).is_err());
    }

    #[test]
    fn test_subsequence_check() {
        let original: Decision = vec![(0, 1), (1, 1), (2, 0)].into_iter().collect();

        let dropped: Decision = vec![(0, 1), (2, 0)].into_iter().collect();
        assert!(dropped.validate_subsequence_of(&original).is_ok());

        let reordered: Decision = vec![(2, 0), (0, 1)].into_iter().collect();
        assert!(reordered.validate_subsequence_of(&original).is_err());

        let invented: Decision = vec![(0, 2)].into_iter().collect();
        assert!(invented.validate_subsequence_of(&original).is_err());

        assert!(Decision::new().validate_subsequence_of(&original).is_ok());
    }
}
