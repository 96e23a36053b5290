//! Flocking Evaluator
//!
//! Per-agent steering over the 27-cell grid neighborhood: alignment,
//! cohesion, inverse-square separation and soft bounds containment, blended
//! into a desired velocity and integrated with velocity and heading
//! smoothing. Every agent reads only the pre-tick `Snapshot` and the sealed
//! grid and writes only its own output slot, so evaluation order never
//! changes a result.

use glam::{Mat3, Quat, Vec3};
use rayon::prelude::*;

use super::grid::{SpatialGrid, PARALLEL_BATCH};
use crate::core::config::{Bounds, FlockSettings};

/// Lengths below this are treated as "no direction".
pub const DEGENERATE_EPSILON: f32 = 1.0e-6;

/// Immutable pre-tick copy of one group's positions and headings.
/// Index `i` here is the agent's position within its group, not its `AgentId`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    positions: Vec<Vec3>,
    forwards: Vec<Vec3>,
}

impl Snapshot {
    pub fn new(positions: Vec<Vec3>, forwards: Vec<Vec3>) -> Self {
        assert_eq!(
            positions.len(),
            forwards.len(),
            "snapshot columns must have equal length"
        );
        Snapshot {
            positions,
            forwards,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn position(&self, i: usize) -> Vec3 {
        self.positions[i]
    }

    #[inline]
    pub fn forward(&self, i: usize) -> Vec3 {
        self.forwards[i]
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }
}

/// Breakdown of the steering that produced an agent's desired velocity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Steering {
    pub alignment: Vec3,
    pub cohesion: Vec3,
    pub separation: Vec3,
    pub bounds: Vec3,
    pub desired_velocity: Vec3,
    pub neighbor_count: u32,
}

/// New state for one agent after a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AgentUpdate {
    pub position: Vec3,
    pub forward: Vec3,
    pub velocity: Vec3,
    pub neighbor_count: u32,
}

/// Everything an evaluation needs besides the snapshot and grid.
/// `dt` is expected to be clamped already.
#[derive(Clone, Copy, Debug)]
pub struct FlockingKernel {
    pub settings: FlockSettings,
    pub bounds: Bounds,
    pub dt: f32,
}

impl FlockingKernel {
    pub fn new(settings: FlockSettings, bounds: Bounds, dt: f32) -> Self {
        FlockingKernel {
            settings,
            bounds,
            dt,
        }
    }

    /// Accumulates the flocking rules for agent `i` and blends them into a desired velocity.
    pub fn steer(&self, i: usize, snapshot: &Snapshot, grid: &SpatialGrid) -> Steering {
        let settings = &self.settings;
        let position = snapshot.position(i);
        let forward = snapshot.forward(i);

        let mut alignment = Vec3::ZERO;
        let mut cohesion = Vec3::ZERO;
        let mut separation = Vec3::ZERO;
        let mut neighbor_count = 0u32;

        grid.for_each_neighbor(grid.cell_of(position), |j| {
            let j = j as usize;
            if j == i {
                return;
            }
            let other = snapshot.position(j);
            let offset = position - other;
            let distance = offset.length();
            // NaN distances fail this test too.
            if !(distance < settings.neighbor_radius) {
                return;
            }

            alignment += snapshot.forward(j);
            cohesion += other;
            // Coincident agents push with no direction.
            if distance > DEGENERATE_EPSILON {
                separation += offset / (distance * distance);
            }
            neighbor_count += 1;
        });

        if neighbor_count > 0 {
            let n = neighbor_count as f32;
            alignment = (alignment / n).normalize_or_zero();
            cohesion = (cohesion / n - position).normalize_or_zero();
            separation = (separation / n).normalize_or_zero();
        }

        let bounds = if self.bounds.contains(position) {
            Vec3::ZERO
        } else {
            (self.bounds.center - position).normalize_or_zero() * settings.max_speed
        };

        // A zero sum yields a zero desired velocity: the agent brakes
        // instead of holding its heading.
        let desired_velocity = (forward
            + alignment * settings.alignment_weight
            + cohesion * settings.cohesion_weight
            + separation * settings.separation_weight
            + bounds * settings.bounds_weight)
            .normalize_or_zero()
            * settings.max_speed;

        Steering {
            alignment,
            cohesion,
            separation,
            bounds,
            desired_velocity,
            neighbor_count,
        }
    }

    /// Smooths the current velocity toward the desired one, moves the agent
    /// and turns its heading toward the new direction of travel.
    pub fn integrate(&self, position: Vec3, forward: Vec3, steering: &Steering) -> AgentUpdate {
        let settings = &self.settings;
        let dt = self.dt;

        let blend = (settings.smooth_factor * dt).clamp(0.0, 1.0);
        let velocity = (forward * settings.max_speed).lerp(steering.desired_velocity, blend);

        let turn = (settings.rotation_smooth_factor * dt).clamp(0.0, 1.0);

        AgentUpdate {
            position: position + velocity * dt,
            forward: slerp_heading(forward, velocity, turn),
            velocity,
            neighbor_count: steering.neighbor_count,
        }
    }

    pub fn evaluate(&self, i: usize, snapshot: &Snapshot, grid: &SpatialGrid) -> AgentUpdate {
        let steering = self.steer(i, snapshot, grid);
        self.integrate(snapshot.position(i), snapshot.forward(i), &steering)
    }
}

/// Evaluates every agent of the snapshot in parallel. Slot `i` of the
/// result is written only by agent `i`'s evaluation.
pub fn run_flocking(kernel: &FlockingKernel, snapshot: &Snapshot, grid: &SpatialGrid) -> Vec<AgentUpdate> {
    let mut out = vec![AgentUpdate::default(); snapshot.len()];
    out.par_iter_mut()
        .with_min_len(PARALLEL_BATCH)
        .enumerate()
        .for_each(|(i, slot)| *slot = kernel.evaluate(i, snapshot, grid));
    out
}

/// Rotation whose +Z axis points along `direction`, with +Y as the up hint.
/// `None` for a (near-)zero direction.
pub fn look_rotation(direction: Vec3) -> Option<Quat> {
    if direction.length_squared() <= DEGENERATE_EPSILON * DEGENERATE_EPSILON {
        return None;
    }
    let forward = direction.try_normalize()?;

    let right = Vec3::Y.cross(forward);
    if right.length_squared() <= DEGENERATE_EPSILON {
        // Looking straight up or down: no roll reference.
        return Some(Quat::from_rotation_arc(Vec3::Z, forward));
    }
    let right = right.normalize();
    let up = forward.cross(right);
    Some(Quat::from_mat3(&Mat3::from_cols(right, up, forward)))
}

/// Spherically interpolates the heading `from` toward `to` by `t`.
/// A degenerate target keeps the previous heading.
pub fn slerp_heading(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    match (look_rotation(from), look_rotation(to)) {
        (Some(start), Some(end)) => (start.slerp(end, t) * Vec3::Z).normalize_or_zero(),
        (Some(_), None) => from.normalize_or_zero(),
        (None, Some(end)) => end * Vec3::Z,
        (None, None) => from,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::grid::build_grid;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn approx(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1.0e-4)
    }

    fn pair_settings() -> FlockSettings {
        FlockSettings {
            separation_weight: 1.0,
            alignment_weight: 1.0,
            cohesion_weight: 1.0,
            neighbor_radius: 2.0,
            max_speed: 5.0,
            ..FlockSettings::default()
        }
    }

    fn wide_bounds() -> Bounds {
        Bounds::new(Vec3::ZERO, Vec3::splat(5.0))
    }

    #[test]
    fn two_agent_scenario_mirrors_along_x() {
        let snapshot = Snapshot::new(
            vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)],
            vec![Vec3::Z, Vec3::Z],
        );
        let settings = pair_settings();
        let grid = build_grid(snapshot.positions(), settings.neighbor_radius);
        let kernel = FlockingKernel::new(settings, wide_bounds(), 0.1);

        let left = kernel.steer(0, &snapshot, &grid);
        let right = kernel.steer(1, &snapshot, &grid);

        assert_eq!(left.neighbor_count, 1);
        assert_eq!(right.neighbor_count, 1);
        assert!(approx(left.alignment, Vec3::Z));
        assert!(approx(right.alignment, Vec3::Z));
        assert!(approx(left.cohesion, Vec3::X));
        assert!(approx(right.cohesion, -Vec3::X));
        assert!(approx(left.separation, -Vec3::X));
        assert!(approx(right.separation, Vec3::X));
        assert_eq!(left.bounds, Vec3::ZERO);

        let mirrored = right.desired_velocity * Vec3::new(-1.0, 1.0, 1.0);
        assert!(approx(left.desired_velocity, mirrored));
        assert!((left.desired_velocity.length() - 5.0).abs() < 1.0e-4);
    }

    #[test]
    fn isolated_agent_continues_along_heading() {
        let settings = pair_settings();
        let snapshot = Snapshot::new(vec![Vec3::new(0.5, 0.5, 0.5)], vec![Vec3::Z]);
        let grid = build_grid(snapshot.positions(), settings.neighbor_radius);
        let kernel = FlockingKernel::new(settings, wide_bounds(), 0.05);

        let steering = kernel.steer(0, &snapshot, &grid);
        assert_eq!(steering.neighbor_count, 0);
        assert_eq!(steering.alignment, Vec3::ZERO);
        assert_eq!(steering.cohesion, Vec3::ZERO);
        assert_eq!(steering.separation, Vec3::ZERO);
        assert_eq!(steering.bounds, Vec3::ZERO);
        assert!(approx(steering.desired_velocity, Vec3::Z * 5.0));

        let update = kernel.evaluate(0, &snapshot, &grid);
        assert!(approx(update.velocity, Vec3::Z * 5.0));
        assert!(approx(update.position, Vec3::new(0.5, 0.5, 0.75)));
        assert!(approx(update.forward, Vec3::Z));
    }

    #[test]
    fn agents_beyond_radius_are_ignored() {
        let settings = pair_settings();
        // Same neighborhood, but 2.5 apart with a radius of 2.
        let snapshot = Snapshot::new(
            vec![Vec3::new(0.1, 0.0, 0.0), Vec3::new(2.6, 0.0, 0.0)],
            vec![Vec3::Z, Vec3::X],
        );
        let grid = build_grid(snapshot.positions(), settings.neighbor_radius);
        let kernel = FlockingKernel::new(settings, wide_bounds(), 0.05);

        assert_eq!(kernel.steer(0, &snapshot, &grid).neighbor_count, 0);
        assert_eq!(kernel.steer(1, &snapshot, &grid).neighbor_count, 0);
    }

    #[test]
    fn outside_agent_steers_home_then_stops_steering() {
        let settings = pair_settings();
        let bounds = Bounds::new(Vec3::ZERO, Vec3::splat(2.5));
        let kernel = FlockingKernel::new(settings, bounds, 0.05);

        let outside = Snapshot::new(vec![Vec3::new(10.0, 0.0, 0.0)], vec![Vec3::Z]);
        let grid = build_grid(outside.positions(), settings.neighbor_radius);
        let steering = kernel.steer(0, &outside, &grid);
        assert!(approx(steering.bounds, Vec3::new(-5.0, 0.0, 0.0)));
        assert!(steering.desired_velocity.x < 0.0);

        let inside = Snapshot::new(vec![Vec3::new(1.0, 0.0, 0.0)], vec![Vec3::Z]);
        let grid = build_grid(inside.positions(), settings.neighbor_radius);
        assert_eq!(kernel.steer(0, &inside, &grid).bounds, Vec3::ZERO);
    }

    #[test]
    fn coincident_agents_produce_finite_state() {
        let settings = pair_settings();
        let snapshot = Snapshot::new(vec![Vec3::ONE, Vec3::ONE], vec![Vec3::Z, Vec3::X]);
        let grid = build_grid(snapshot.positions(), settings.neighbor_radius);
        let kernel = FlockingKernel::new(settings, wide_bounds(), 0.05);

        let steering = kernel.steer(0, &snapshot, &grid);
        assert_eq!(steering.neighbor_count, 1);
        assert_eq!(steering.separation, Vec3::ZERO);
        assert_eq!(steering.cohesion, Vec3::ZERO);
        assert!(approx(steering.alignment, Vec3::X));

        let update = kernel.evaluate(0, &snapshot, &grid);
        assert!(update.position.is_finite());
        assert!(update.forward.is_finite());
    }

    // All steering can cancel out. The agent then brakes toward a full stop
    // rather than holding its heading; this pins that behavior.
    #[test]
    fn cancelled_steering_gives_zero_desired_velocity() {
        let settings = FlockSettings {
            max_speed: 4.0,
            bounds_weight: 0.25,
            smooth_factor: 2.0,
            ..pair_settings()
        };
        let bounds = Bounds::new(Vec3::ZERO, Vec3::splat(2.5));
        let kernel = FlockingKernel::new(settings, bounds, 0.05);
        let snapshot = Snapshot::new(vec![Vec3::new(0.0, 0.0, 10.0)], vec![Vec3::Z]);
        let grid = build_grid(snapshot.positions(), settings.neighbor_radius);

        let steering = kernel.steer(0, &snapshot, &grid);
        assert_eq!(steering.desired_velocity, Vec3::ZERO);

        let update = kernel.integrate(snapshot.position(0), snapshot.forward(0), &steering);
        assert!(approx(update.velocity, Vec3::Z * 3.6));
        assert!(approx(update.forward, Vec3::Z));
    }

    #[test]
    fn evaluation_order_does_not_change_results() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 600;
        let positions: Vec<Vec3> = (0..n)
            .map(|_| Vec3::new(rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0)))
            .collect();
        let forwards: Vec<Vec3> = (0..n)
            .map(|_| {
                Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
                    .normalize_or_zero()
            })
            .collect();
        let snapshot = Snapshot::new(positions, forwards);
        let settings = FlockSettings {
            neighbor_radius: 1.0,
            ..pair_settings()
        };
        let grid = build_grid(snapshot.positions(), settings.neighbor_radius);
        let kernel = FlockingKernel::new(settings, Bounds::default(), 0.05);

        let parallel = run_flocking(&kernel, &snapshot, &grid);

        let mut reversed = vec![AgentUpdate::default(); n];
        for i in (0..n).rev() {
            reversed[i] = kernel.evaluate(i, &snapshot, &grid);
        }

        assert_eq!(parallel, reversed);
        assert!(parallel.iter().any(|u| u.neighbor_count > 0));
    }

    #[test]
    fn look_rotation_maps_z_onto_direction() {
        assert!(look_rotation(Vec3::ZERO).is_none());
        assert!(look_rotation(Vec3::splat(1.0e-9)).is_none());

        for dir in [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::new(1.0, 2.0, -3.0)] {
            let rotation = look_rotation(dir).unwrap();
            assert!(approx(rotation * Vec3::Z, dir.normalize()));
        }
        assert!(approx(look_rotation(Vec3::Z).unwrap() * Vec3::Y, Vec3::Y));
    }

    #[test]
    fn heading_turns_partially_and_survives_zero_targets() {
        let halfway = slerp_heading(Vec3::Z, Vec3::X, 0.5);
        assert!(approx(halfway, (Vec3::Z + Vec3::X).normalize()));

        assert_eq!(slerp_heading(Vec3::Z, Vec3::ZERO, 0.5), Vec3::Z);
        assert!(approx(slerp_heading(Vec3::ZERO, Vec3::X, 0.1), Vec3::X));
        assert_eq!(slerp_heading(Vec3::ZERO, Vec3::ZERO, 0.1), Vec3::ZERO);
    }
}
