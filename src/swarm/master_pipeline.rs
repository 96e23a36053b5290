//! Simulation Driver
//!
//! One tick, per settings group: snapshot → grid build → evaluation →
//! commit. Groups are independent, so their pipelines run concurrently
//! against the pre-tick store; commits then happen one whole group at a
//! time, so no reader ever sees a half-updated group.

use glam::Vec3;
use parking_lot::{RwLock, RwLockReadGuard};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::flocking::{run_flocking, AgentUpdate, FlockingKernel, Snapshot};
use super::grid::{build_grid, SpatialGrid};
use super::groups::{FlockGroup, FlockGroups, GroupId};
use super::pool::{AgentId, AgentSeed, AgentStore};
use super::spawner::SchoolSpawner;
use crate::core::config::{Bounds, FlockSettings, SimulationConfig, DEFAULT_MAX_DT};
use crate::core::error::{FlockError, Result};

/// Where one group's pipeline is within the current tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TickPhase {
    Idle,
    Snapshotting,
    GridBuilding,
    Evaluating,
    Committed,
}

/// What one group did during a tick.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupReport {
    pub group: GroupId,
    pub agents: usize,
    pub occupied_cells: usize,
    /// Sum of every agent's in-radius neighbor count.
    pub neighbor_links: u64,
    pub phase: TickPhase,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// The dt actually integrated with, after clamping.
    pub dt: f32,
    pub groups: Vec<GroupReport>,
    /// Groups with no live members this tick.
    pub skipped_groups: usize,
    pub elapsed: Duration,
}

impl TickReport {
    pub fn agents(&self) -> usize {
        self.groups.iter().map(|g| g.agents).sum()
    }

    pub fn neighbor_links(&self) -> u64 {
        self.groups.iter().map(|g| g.neighbor_links).sum()
    }
}

/// Clamps a host frame delta into `[0, max_dt]`. Non-finite input becomes 0.
pub fn clamp_dt(dt: f32, max_dt: f32) -> f32 {
    if !dt.is_finite() || dt < 0.0 {
        warn!("[Flock] Ignoring invalid tick delta {}", dt);
        return 0.0;
    }
    dt.min(max_dt)
}

/// One group's work for the current tick. Owns its snapshot, grid and
/// output buffer; nothing here outlives the tick.
struct GroupPipeline {
    group: GroupId,
    members: Vec<AgentId>,
    kernel: FlockingKernel,
    phase: TickPhase,
    snapshot: Snapshot,
    grid: Option<SpatialGrid>,
    updates: Vec<AgentUpdate>,
}

impl GroupPipeline {
    fn new(group: GroupId, settings: FlockSettings, bounds: Bounds, dt: f32) -> Self {
        GroupPipeline {
            group,
            members: Vec::new(),
            kernel: FlockingKernel::new(settings, bounds, dt),
            phase: TickPhase::Idle,
            snapshot: Snapshot::default(),
            grid: None,
            updates: Vec::new(),
        }
    }

    fn advance(&mut self, next: TickPhase) {
        debug_assert!(next > self.phase, "tick phases only move forward");
        trace!("[Flock] group {} {:?} -> {:?}", self.group.0, self.phase, next);
        self.phase = next;
    }

    /// Copies the live members' state out of the store. Members assigned to
    /// another group in the store, or listed twice, are dropped so each
    /// agent has exactly one writer.
    fn snapshot(&mut self, store: &AgentStore, group: &FlockGroup) {
        self.advance(TickPhase::Snapshotting);

        let mut members: Vec<AgentId> = group
            .members()
            .iter()
            .copied()
            .filter(|id| store.group(*id) == Some(self.group))
            .collect();
        members.sort_unstable();
        members.dedup();

        let positions: Vec<Vec3> = members
            .iter()
            .map(|id| store.positions()[id.index()])
            .collect();
        let forwards: Vec<Vec3> = members
            .iter()
            .map(|id| store.forwards()[id.index()])
            .collect();

        self.snapshot = Snapshot::new(positions, forwards);
        self.members = members;
    }

    fn build_grid(&mut self) {
        self.advance(TickPhase::GridBuilding);
        // build_grid returns only once every agent is inserted.
        self.grid = Some(build_grid(
            self.snapshot.positions(),
            self.kernel.settings.neighbor_radius,
        ));
    }

    fn evaluate(&mut self) {
        self.advance(TickPhase::Evaluating);
        if let Some(grid) = &self.grid {
            self.updates = run_flocking(&self.kernel, &self.snapshot, grid);
        }
    }

    /// Writes the whole group's results. Called with exclusive access to the store.
    fn commit(mut self, store: &mut AgentStore) -> GroupReport {
        let mut neighbor_links = 0u64;
        for (id, update) in self.members.iter().zip(&self.updates) {
            store.write(*id, update.position, update.forward);
            neighbor_links += u64::from(update.neighbor_count);
        }
        self.advance(TickPhase::Committed);

        let report = GroupReport {
            group: self.group,
            agents: self.members.len(),
            occupied_cells: self.grid.as_ref().map_or(0, SpatialGrid::cell_count),
            neighbor_links,
            phase: self.phase,
        };
        debug!(
            "[Flock] group {}: {} agents, {} cells, {} neighbor links",
            report.group.0, report.agents, report.occupied_cells, report.neighbor_links
        );
        report
    }
}

/// Runs every non-empty group's pipeline up to (not including) commit.
fn evaluate_groups(
    store: &AgentStore,
    groups: &FlockGroups,
    bounds: &Bounds,
    dt: f32,
) -> (Vec<GroupPipeline>, usize) {
    let live: Vec<(GroupId, &FlockGroup)> = groups.iter().filter(|(_, g)| !g.is_empty()).collect();
    let mut skipped = groups.len() - live.len();

    let pipelines: Vec<GroupPipeline> = live
        .into_par_iter()
        .map(|(id, group)| {
            let mut pipeline = GroupPipeline::new(id, *group.settings(), *bounds, dt);
            pipeline.snapshot(store, group);
            pipeline
        })
        .collect();

    // Every listed member may have been filtered out.
    let (pipelines, emptied): (Vec<_>, Vec<_>) =
        pipelines.into_iter().partition(|p| !p.snapshot.is_empty());
    skipped += emptied.len();

    let pipelines: Vec<GroupPipeline> = pipelines
        .into_par_iter()
        .map(|mut pipeline| {
            pipeline.build_grid();
            pipeline.evaluate();
            pipeline
        })
        .collect();

    (pipelines, skipped)
}

fn commit_groups(store: &mut AgentStore, pipelines: Vec<GroupPipeline>) -> Vec<GroupReport> {
    pipelines
        .into_iter()
        .map(|pipeline| pipeline.commit(store))
        .collect()
}

/// Advances every group by one tick, clamping `dt` to the default maximum.
pub fn step(store: &mut AgentStore, groups: &FlockGroups, bounds: &Bounds, dt: f32) -> TickReport {
    step_with_max_dt(store, groups, bounds, dt, DEFAULT_MAX_DT)
}

pub fn step_with_max_dt(
    store: &mut AgentStore,
    groups: &FlockGroups,
    bounds: &Bounds,
    dt: f32,
    max_dt: f32,
) -> TickReport {
    run_tick(store, groups, bounds, dt, max_dt)
}

/// How a tick reaches the agent store: directly, or through the shared lock.
trait StoreAccess {
    fn with_read<T>(&mut self, f: impl FnOnce(&AgentStore) -> T) -> T;
    fn with_write<T>(&mut self, f: impl FnOnce(&mut AgentStore) -> T) -> T;
}

impl StoreAccess for &mut AgentStore {
    fn with_read<T>(&mut self, f: impl FnOnce(&AgentStore) -> T) -> T {
        f(&**self)
    }

    fn with_write<T>(&mut self, f: impl FnOnce(&mut AgentStore) -> T) -> T {
        f(&mut **self)
    }
}

impl StoreAccess for &RwLock<AgentStore> {
    fn with_read<T>(&mut self, f: impl FnOnce(&AgentStore) -> T) -> T {
        f(&*self.read())
    }

    fn with_write<T>(&mut self, f: impl FnOnce(&mut AgentStore) -> T) -> T {
        f(&mut *self.write())
    }
}

/// Clamp, evaluate against the pre-tick store, then commit group by group.
fn run_tick(
    mut store: impl StoreAccess,
    groups: &FlockGroups,
    bounds: &Bounds,
    dt: f32,
    max_dt: f32,
) -> TickReport {
    let start = Instant::now();
    let dt = clamp_dt(dt, max_dt);

    let (pipelines, skipped_groups) =
        store.with_read(|store| evaluate_groups(store, groups, bounds, dt));
    let reports = store.with_write(|store| commit_groups(store, pipelines));

    TickReport {
        dt,
        groups: reports,
        skipped_groups,
        elapsed: start.elapsed(),
    }
}

/// Owning simulation: the agent store, its settings groups and the shared bounds.
///
/// The store sits behind `Arc<RwLock>` so render or debug code can hold a
/// `FlockView` and read committed state while the simulation keeps ticking.
pub struct FlockSimulation {
    store: Arc<RwLock<AgentStore>>,
    groups: FlockGroups,
    bounds: Bounds,
    max_dt: f32,
    pub global_tick: u64,
}

impl FlockSimulation {
    /// Validates the config and registers one group per settings block, in order.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut groups = FlockGroups::new();
        for settings in &config.groups {
            groups.add_group(*settings)?;
        }
        info!(
            "[Flock] Simulation ready with {} group(s), bounds {:?} ± {:?}",
            groups.len(),
            config.bounds.center,
            config.bounds.half_extents
        );
        Ok(FlockSimulation {
            store: Arc::new(RwLock::new(AgentStore::new())),
            groups,
            bounds: config.bounds,
            max_dt: config.max_dt,
            global_tick: 0,
        })
    }

    pub fn add_group(&mut self, settings: FlockSettings) -> Result<GroupId> {
        self.groups.add_group(settings)
    }

    /// Inserts a spawner batch into `group`. Takes effect from the next tick.
    pub fn spawn(&mut self, group: GroupId, batch: &[AgentSeed]) -> Result<Vec<AgentId>> {
        if self.groups.get(group).is_none() {
            return Err(FlockError::UnknownGroup(group));
        }
        let ids = self.store.write().extend(group, batch);
        self.groups.register_all(group, &ids)?;
        Ok(ids)
    }

    pub fn spawn_school(&mut self, group: GroupId, spawner: &SchoolSpawner) -> Result<Vec<AgentId>> {
        let batch = spawner.spawn()?;
        let ids = self.spawn(group, &batch)?;
        info!(
            "[Spawner] Spawned {} agents into group {} around {:?} (r = {:.2})",
            ids.len(),
            group.0,
            spawner.center,
            spawner.radius
        );
        Ok(ids)
    }

    /// Runs one tick. Readers keep seeing the previous state until each
    /// group's results are committed.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        self.global_tick += 1;
        let report = run_tick(&*self.store, &self.groups, &self.bounds, dt, self.max_dt);
        if self.global_tick % 100 == 0 {
            info!(
                "[Flock] Tick {}: {} agents in {:?}",
                self.global_tick,
                report.agents(),
                report.elapsed
            );
        }
        report
    }

    pub fn view(&self) -> FlockView {
        FlockView {
            store: Arc::clone(&self.store),
        }
    }

    pub fn groups(&self) -> &FlockGroups {
        &self.groups
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn max_dt(&self) -> f32 {
        self.max_dt
    }

    pub fn agent_count(&self) -> usize {
        self.store.read().len()
    }
}

/// Read-only handle onto a simulation's committed agent state.
#[derive(Clone)]
pub struct FlockView {
    store: Arc<RwLock<AgentStore>>,
}

impl FlockView {
    pub fn read(&self) -> RwLockReadGuard<'_, AgentStore> {
        self.store.read()
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.store.read().positions().to_vec()
    }

    pub fn forwards(&self) -> Vec<Vec3> {
        self.store.read().forwards().to_vec()
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }
}
