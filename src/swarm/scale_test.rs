//! Scale tests for the flocking pipeline.
//!
//! These spawn real schools, rebuild the grid every tick and run the full
//! parallel evaluation, printing timings and RSS from /proc/self/status.
//!
//! Run: cargo test --release -- --nocapture --ignored

#[cfg(test)]
mod tests {
    use crate::core::config::{Bounds, FlockSettings, SimulationConfig};
    use crate::swarm::grid::build_grid;
    use crate::swarm::groups::GroupId;
    use crate::swarm::master_pipeline::FlockSimulation;
    use crate::swarm::spawner::SchoolSpawner;
    use glam::Vec3;
    use std::time::Instant;

    fn get_rss_mb() -> f64 {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    let kb: f64 = line
                        .split_whitespace()
                        .nth(1)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(0.0);
                    return kb / 1024.0;
                }
            }
        }
        0.0
    }

    /// 100K agents in one group: grid build alone, then full ticks.
    #[test]
    #[ignore]
    fn scale_100k_single_group() {
        let sep = "=".repeat(80);
        println!("\n{}", sep);
        println!("  FLOCKGRID: 100K AGENT SINGLE GROUP TEST");
        println!("{}\n", sep);

        let config = SimulationConfig {
            bounds: Bounds::new(Vec3::ZERO, Vec3::splat(60.0)),
            groups: vec![FlockSettings::default()],
            ..SimulationConfig::default()
        };
        let mut sim = FlockSimulation::new(config).expect("valid config");

        println!("[1/3] Spawning 100,000 agents...");
        let t0 = Instant::now();
        let spawner = SchoolSpawner::new(100_000, Vec3::ZERO, 40.0).with_seed(1);
        sim.spawn_school(GroupId(0), &spawner).expect("spawn");
        println!("  Time: {:?}  |  RSS: {:.1} MB", t0.elapsed(), get_rss_mb());

        println!("\n[2/3] Building grid once...");
        let positions = sim.view().positions();
        let t1 = Instant::now();
        let grid = build_grid(&positions, 1.0);
        println!("  Time: {:?}  |  Cells: {}", t1.elapsed(), grid.cell_count());
        assert_eq!(grid.len(), 100_000);

        println!("\n[3/3] Running 10 ticks...");
        let mut tick_times = Vec::new();
        for i in 0..10 {
            let report = sim.tick(0.016);
            println!(
                "  Tick {}: {:?}  |  Neighbor links: {}",
                i + 1,
                report.elapsed,
                report.neighbor_links()
            );
            tick_times.push(report.elapsed);
            assert_eq!(report.agents(), 100_000);
        }

        let avg_ms = tick_times.iter().map(|t| t.as_secs_f64() * 1000.0).sum::<f64>()
            / tick_times.len() as f64;
        assert!(sim.view().positions().iter().all(|p| p.is_finite()));

        println!("\n{}", sep);
        println!("  100K RESULT: PASSED  |  Avg tick: {:.1} ms  |  RSS: {:.0} MB", avg_ms, get_rss_mb());
        println!("{}\n", sep);
    }

    /// Eight flocks with different settings ticking side by side.
    #[test]
    #[ignore]
    fn scale_multi_group() {
        let groups: Vec<FlockSettings> = (0..8)
            .map(|g| FlockSettings {
                neighbor_radius: 0.75 + g as f32 * 0.25,
                max_speed: 3.0 + g as f32,
                ..FlockSettings::default()
            })
            .collect();
        let config = SimulationConfig {
            bounds: Bounds::new(Vec3::ZERO, Vec3::splat(30.0)),
            groups,
            ..SimulationConfig::default()
        };
        let mut sim = FlockSimulation::new(config).expect("valid config");
        for g in 0..8u32 {
            let center = Vec3::new(g as f32 * 4.0 - 14.0, 0.0, 0.0);
            let spawner = SchoolSpawner::new(10_000, center, 8.0).with_seed(u64::from(g));
            sim.spawn_school(GroupId(g), &spawner).expect("spawn");
        }

        let t = Instant::now();
        for _ in 0..20 {
            let report = sim.tick(0.016);
            assert_eq!(report.groups.len(), 8);
            assert_eq!(report.agents(), 80_000);
        }
        println!("  8 groups x 10K agents, 20 ticks: {:?}", t.elapsed());
    }
}
