//! Agent Store
//!
//! Struct-of-Arrays storage for every flock member: position, heading and
//! owning group. Entries are append-only so an `AgentId` stays valid for the
//! lifetime of the store.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::groups::GroupId;

/// Stable handle to one agent; the index of its slot in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl AgentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Initial state handed over by a spawner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentSeed {
    pub position: Vec3,
    pub forward: Vec3,
}

/// SoA agent storage. `forwards[i]` is a unit vector (or zero for a
/// degenerate heading) and doubles as the agent's direction of travel.
#[derive(Clone, Debug, Default)]
pub struct AgentStore {
    positions: Vec<Vec3>,
    forwards: Vec<Vec3>,
    groups: Vec<GroupId>,
}

impl AgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        AgentStore {
            positions: Vec::with_capacity(capacity),
            forwards: Vec::with_capacity(capacity),
            groups: Vec::with_capacity(capacity),
        }
    }

    /// Appends one agent. The heading is normalized; a zero heading stays zero.
    pub fn push(&mut self, group: GroupId, position: Vec3, forward: Vec3) -> AgentId {
        let id = AgentId(self.positions.len() as u32);
        self.positions.push(position);
        self.forwards.push(forward.normalize_or_zero());
        self.groups.push(group);
        id
    }

    /// Appends a spawner batch and returns the new handles in batch order.
    pub fn extend(&mut self, group: GroupId, batch: &[AgentSeed]) -> Vec<AgentId> {
        self.positions.reserve(batch.len());
        self.forwards.reserve(batch.len());
        self.groups.reserve(batch.len());
        batch
            .iter()
            .map(|seed| self.push(group, seed.position, seed.forward))
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, id: AgentId) -> Option<Vec3> {
        self.positions.get(id.index()).copied()
    }

    pub fn forward(&self, id: AgentId) -> Option<Vec3> {
        self.forwards.get(id.index()).copied()
    }

    pub fn group(&self, id: AgentId) -> Option<GroupId> {
        self.groups.get(id.index()).copied()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn forwards(&self) -> &[Vec3] {
        &self.forwards
    }

    pub fn group_ids(&self) -> &[GroupId] {
        &self.groups
    }

    /// Overwrites one agent's state. Only the driver's commit phase calls this.
    #[inline]
    pub(crate) fn write(&mut self, id: AgentId, position: Vec3, forward: Vec3) {
        let i = id.index();
        self.positions[i] = position;
        self.forwards[i] = forward;
    }
}
