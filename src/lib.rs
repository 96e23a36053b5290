//! FlockGrid Core - parallel 3D flocking on a uniform spatial grid
//!
//! Simulates groups of autonomous agents following alignment, cohesion,
//! separation and soft containment rules. Neighbor discovery goes through a
//! grid rebuilt every tick, and every per-agent pass fans out over rayon.

pub mod core;
pub mod swarm;
pub mod utils;

pub use crate::core::config::{Bounds, FlockSettings, SimulationConfig};
pub use crate::core::error::{FlockError, Result};
pub use swarm::{
    step, AgentId, AgentSeed, AgentStore, FlockGroups, FlockSimulation, FlockView, GroupId,
    SchoolSpawner, TickReport,
};
pub use utils::benchmark::{BenchmarkReport, TickBenchmark};

/// Initialize tracing for the library.
pub fn setup_logging(level: Option<String>) {
    let filter = level.unwrap_or_else(|| "info".to_string());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
