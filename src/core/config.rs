use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::error::{FlockError, Result};

/// Upper bound on the integration step used when a tick runs long.
pub const DEFAULT_MAX_DT: f32 = 0.05;

/// Flocking parameters shared by every member of one group.
///
/// `neighbor_radius` is both the interaction radius and the edge length of
/// a spatial grid cell, so every neighbor within range sits in the 3×3×3
/// block around an agent's own cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockSettings {
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    /// Cruise speed carried for hosts only. Nothing in the tick reads it;
    /// the steering rules use `max_speed`.
    pub move_speed: f32,
    pub neighbor_radius: f32,
    pub max_speed: f32,
    pub bounds_weight: f32,
    /// Velocity blend rate, per second.
    pub smooth_factor: f32,
    /// Heading slerp rate, per second.
    pub rotation_smooth_factor: f32,
}

impl Default for FlockSettings {
    fn default() -> Self {
        FlockSettings {
            separation_weight: 1.0,
            alignment_weight: 1.0,
            cohesion_weight: 1.0,
            move_speed: 25.0,
            neighbor_radius: 1.0,
            max_speed: 5.0,
            bounds_weight: 1.0,
            smooth_factor: 4.0,
            rotation_smooth_factor: 8.0,
        }
    }
}

impl FlockSettings {
    /// Rejects settings the per-tick path cannot run with.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("separation_weight", self.separation_weight),
            ("alignment_weight", self.alignment_weight),
            ("cohesion_weight", self.cohesion_weight),
            ("move_speed", self.move_speed),
            ("bounds_weight", self.bounds_weight),
            ("smooth_factor", self.smooth_factor),
            ("rotation_smooth_factor", self.rotation_smooth_factor),
        ];
        for (field, value) in non_negative {
            check_finite(field, value)?;
            if value < 0.0 {
                return Err(FlockError::InvalidSettings {
                    field,
                    reason: "must not be negative",
                });
            }
        }

        for (field, value) in [
            ("neighbor_radius", self.neighbor_radius),
            ("max_speed", self.max_speed),
        ] {
            check_finite(field, value)?;
            if value <= 0.0 {
                return Err(FlockError::InvalidSettings {
                    field,
                    reason: "must be positive",
                });
            }
        }

        Ok(())
    }
}

fn check_finite(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FlockError::InvalidSettings {
            field,
            reason: "must be finite",
        })
    }
}

/// Axis-aligned containment box. Agents outside it are steered back toward `center`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bounds {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds {
            center: Vec3::ZERO,
            half_extents: Vec3::splat(2.5),
        }
    }
}

impl Bounds {
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Bounds {
            center,
            half_extents,
        }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }

    /// Inclusive on the faces: a point exactly on the boundary is inside.
    #[inline]
    pub fn contains(&self, point: Vec3) -> bool {
        let offset = (point - self.center).abs();
        offset.cmple(self.half_extents).all()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.center.is_finite() {
            return Err(FlockError::InvalidBounds("center must be finite"));
        }
        if !self.half_extents.is_finite() {
            return Err(FlockError::InvalidBounds("half extents must be finite"));
        }
        if self.half_extents.min_element() < 0.0 {
            return Err(FlockError::InvalidBounds("half extents must not be negative"));
        }
        Ok(())
    }
}

/// Top-level configuration: one settings block per flock plus the shared box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub bounds: Bounds,
    pub max_dt: f32,
    pub groups: Vec<FlockSettings>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            bounds: Bounds::default(),
            max_dt: DEFAULT_MAX_DT,
            groups: vec![FlockSettings::default()],
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        info!(
            "[Config] Loaded {} flock group(s) from {}",
            config.groups.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.bounds.validate()?;
        if !self.max_dt.is_finite() || self.max_dt <= 0.0 {
            return Err(FlockError::InvalidConfig("max_dt must be positive and finite"));
        }
        for settings in &self.groups {
            settings.validate()?;
        }
        Ok(())
    }
}
