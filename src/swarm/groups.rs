//! Settings groups
//!
//! Agents are partitioned by the flock settings they share. Each group owns
//! an immutable `FlockSettings` and the list of its member agents; changing
//! a flock's parameters means registering a new group.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::pool::AgentId;
use crate::core::config::FlockSettings;
use crate::core::error::{FlockError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// One flock: shared settings plus its members, in registration order.
#[derive(Clone, Debug)]
pub struct FlockGroup {
    settings: FlockSettings,
    members: Vec<AgentId>,
}

impl FlockGroup {
    pub fn settings(&self) -> &FlockSettings {
        &self.settings
    }

    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct FlockGroups {
    groups: Vec<FlockGroup>,
}

impl FlockGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a flock. Settings are validated here so a tick never sees bad values.
    pub fn add_group(&mut self, settings: FlockSettings) -> Result<GroupId> {
        settings.validate()?;
        let id = GroupId(self.groups.len() as u32);
        self.groups.push(FlockGroup {
            settings,
            members: Vec::new(),
        });
        info!(
            "[Flock] Registered group {} (radius {:.2}, max speed {:.2})",
            id.0, settings.neighbor_radius, settings.max_speed
        );
        Ok(id)
    }

    pub fn register(&mut self, group: GroupId, agent: AgentId) -> Result<()> {
        self.group_mut(group)?.members.push(agent);
        Ok(())
    }

    pub fn register_all(&mut self, group: GroupId, agents: &[AgentId]) -> Result<()> {
        self.group_mut(group)?.members.extend_from_slice(agents);
        Ok(())
    }

    pub fn get(&self, group: GroupId) -> Option<&FlockGroup> {
        self.groups.get(group.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &FlockGroup)> {
        self.groups
            .iter()
            .enumerate()
            .map(|(i, group)| (GroupId(i as u32), group))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total_members(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }

    fn group_mut(&mut self, group: GroupId) -> Result<&mut FlockGroup> {
        self.groups
            .get_mut(group.0 as usize)
            .ok_or(FlockError::UnknownGroup(group))
    }
}
