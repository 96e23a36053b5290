use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::core::config::{Bounds, FlockSettings, SimulationConfig};
use crate::core::error::Result;
use crate::swarm::groups::GroupId;
use crate::swarm::master_pipeline::FlockSimulation;
use crate::swarm::spawner::SchoolSpawner;

/// Benchmark run description; deserializable so runs can be scripted from JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TickBenchmark {
    pub agents: usize,
    pub ticks: usize,
    pub dt: f32,
    pub spawn_radius: f32,
    pub seed: u64,
    pub settings: FlockSettings,
    pub bounds: Bounds,
}

impl Default for TickBenchmark {
    fn default() -> Self {
        TickBenchmark {
            agents: 10_000,
            ticks: 100,
            dt: 0.016,
            spawn_radius: 10.0,
            seed: 0,
            settings: FlockSettings::default(),
            bounds: Bounds::new(Vec3::ZERO, Vec3::splat(20.0)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub agents: usize,
    pub ticks: usize,
    pub mean_tick: Duration,
    pub max_tick: Duration,
    /// Average in-radius neighbors per agent per tick.
    pub mean_neighbors: f64,
}

impl TickBenchmark {
    /// Spawns one school and times `ticks` full simulation ticks.
    pub fn run(&self) -> Result<BenchmarkReport> {
        let config = SimulationConfig {
            bounds: self.bounds,
            groups: vec![self.settings],
            ..SimulationConfig::default()
        };
        let mut sim = FlockSimulation::new(config)?;
        let spawner = SchoolSpawner::new(self.agents, self.bounds.center, self.spawn_radius)
            .with_seed(self.seed);
        sim.spawn_school(GroupId(0), &spawner)?;

        info!(
            "📊 Running tick benchmark: {} agents x {} ticks",
            self.agents, self.ticks
        );

        let mut total = Duration::ZERO;
        let mut max_tick = Duration::ZERO;
        let mut links = 0u64;
        for _ in 0..self.ticks {
            let report = sim.tick(self.dt);
            total += report.elapsed;
            max_tick = max_tick.max(report.elapsed);
            links += report.neighbor_links();
        }

        let samples = (self.agents * self.ticks) as f64;
        let report = BenchmarkReport {
            agents: self.agents,
            ticks: self.ticks,
            mean_tick: if self.ticks > 0 {
                total.div_f64(self.ticks as f64)
            } else {
                Duration::ZERO
            },
            max_tick,
            mean_neighbors: if samples > 0.0 { links as f64 / samples } else { 0.0 },
        };

        info!(
            "📈 Benchmark complete. mean tick {:?}, max tick {:?}, {:.2} neighbors/agent",
            report.mean_tick, report.max_tick, report.mean_neighbors
        );
        Ok(report)
    }
}
