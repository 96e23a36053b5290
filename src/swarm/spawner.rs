//! School spawner
//!
//! Places `count` agents on a sphere shell of `radius` around `center`,
//! each heading straight out from the center. Every agent draws from its
//! own seeded RNG, so a batch is reproducible and can be generated in parallel.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, UnitSphere};
use rayon::prelude::*;

use super::grid::PARALLEL_BATCH;
use super::pool::AgentSeed;
use crate::core::error::{FlockError, Result};

const SEED_STRIDE: u64 = 0x9F6A_BC1;

#[derive(Clone, Debug, PartialEq)]
pub struct SchoolSpawner {
    pub count: usize,
    pub center: Vec3,
    pub radius: f32,
    pub seed: u64,
}

impl SchoolSpawner {
    pub fn new(count: usize, center: Vec3, radius: f32) -> Self {
        SchoolSpawner {
            count,
            center,
            radius,
            seed: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.center.is_finite() {
            return Err(FlockError::InvalidConfig("spawn center must be finite"));
        }
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(FlockError::InvalidConfig(
                "spawn radius must be finite and non-negative",
            ));
        }
        Ok(())
    }

    /// Generates the batch. Agent `i` always gets the same seed for the same spawner.
    pub fn spawn(&self) -> Result<Vec<AgentSeed>> {
        self.validate()?;
        let seeds = (0..self.count)
            .into_par_iter()
            .with_min_len(PARALLEL_BATCH)
            .map(|i| self.seed_for(i))
            .collect();
        Ok(seeds)
    }

    fn seed_for(&self, i: usize) -> AgentSeed {
        let stream = self
            .seed
            .wrapping_add((i as u64 + 1).wrapping_mul(SEED_STRIDE));
        let mut rng = StdRng::seed_from_u64(stream);
        let [x, y, z]: [f32; 3] = UnitSphere.sample(&mut rng);
        let dir = Vec3::new(x, y, z).normalize_or_zero();
        AgentSeed {
            position: self.center + dir * self.radius,
            forward: dir,
        }
    }
}
