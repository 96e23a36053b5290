//! Swarm Engine
//!
//! Grid-accelerated flocking for many agents per tick: SoA agent store,
//! per-tick spatial grid, parallel steering evaluation and the driver that
//! runs them once per settings group.

pub mod flocking;
pub mod grid;
pub mod groups;
pub mod master_pipeline;
pub mod pool;
pub mod scale_test;
pub mod spawner;

pub use flocking::{AgentUpdate, FlockingKernel, Snapshot, Steering};
pub use grid::{build_grid, cell_of, GridBuilder, SpatialGrid};
pub use groups::{FlockGroup, FlockGroups, GroupId};
pub use master_pipeline::{step, FlockSimulation, FlockView, TickPhase, TickReport};
pub use pool::{AgentId, AgentSeed, AgentStore};
pub use spawner::SchoolSpawner;
