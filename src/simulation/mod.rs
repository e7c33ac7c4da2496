pub mod environment;
pub mod lifecycle;
pub mod movement;
pub mod statistics;

use std::time::Instant;

use tracing::debug;

use crate::agent::{AgentId, Inventory};
use crate::config::simulation::SimulationConfig;
use crate::simulation::statistics::{TickCounters, TickStatistics};
use crate::world::coords::TilePos;
use crate::world::visibility::ViewRect;
use crate::world::World;

/// Result of executing a single tick.
#[derive(Debug)]
pub struct TickResult {
    pub statistics: TickStatistics,
    /// Phase timings in ms: [Environment, Intentions, Resolution, Lifecycle, Statistics]
    pub phase_timings_ms: [f32; 5],
}

/// Execute a single simulation tick on the world.
///
/// Environment timers run over the visibility window around the player (or
/// the origin when there is none). Agents within `active_radius` then
/// declare and resolve their moves, breeding requests are raised and
/// consumed, and the tick count advances.
pub fn execute_tick(
    world: &mut World,
    config: &SimulationConfig,
    dt: f32,
    player: Option<TilePos>,
    inventory: &Inventory,
) -> TickResult {
    let tick_start = Instant::now();
    let mut phase_timings = [0.0_f32; 5];
    let mut counters = TickCounters::default();

    world.set_player(player);
    let focus = player.unwrap_or(TilePos::new(0, 0));
    let rect = ViewRect::centered_on(focus, config.view_width, config.view_height);

    // Phase 1: Environment over the active tile set
    let phase_start = Instant::now();
    let active_tiles = world.active_tiles(rect);
    counters.active_tiles = active_tiles.len();
    counters.environment = environment::update_environment(world, &active_tiles, dt, config);
    phase_timings[0] = phase_start.elapsed().as_secs_f32() * 1000.0;

    // Phase 2: Timers and intentions
    let phase_start = Instant::now();
    let active: Vec<AgentId> = world.agents_near(focus, config.active_radius);
    counters.active_agents = active.len();
    for &id in &active {
        if let Some(agent) = world.agent_mut(id) {
            agent.tick_timers(dt);
        }
    }
    let bucket = world.tick_count / config.decision_window_ticks.max(1);
    let table = movement::collect_intentions(world, &active, bucket, inventory, config);
    counters.intentions = table.len();
    phase_timings[1] = phase_start.elapsed().as_secs_f32() * 1000.0;

    // Phase 3: Resolution
    let phase_start = Instant::now();
    counters.resolution = movement::execute_intentions(world, &table, config);
    phase_timings[2] = phase_start.elapsed().as_secs_f32() * 1000.0;

    // Phase 4: Lifecycle
    let phase_start = Instant::now();
    counters.breeding_requests = lifecycle::request_breeding(world, &active, config);
    counters.births = lifecycle::consume_breeding_requests(world, config);
    phase_timings[3] = phase_start.elapsed().as_secs_f32() * 1000.0;

    world.tick_count += 1;

    // Phase 5: Statistics
    let stats_start = Instant::now();
    let tick_duration = tick_start.elapsed().as_secs_f32() * 1000.0;
    let statistics = statistics::compute_statistics(world, &counters, tick_duration);
    phase_timings[4] = stats_start.elapsed().as_secs_f32() * 1000.0;

    // Congestion detection: most declared moves failing
    let declared = counters.intentions as u32;
    if declared >= 8 && counters.resolution.rejections * 2 > declared {
        debug!(
            tick = world.tick_count,
            declared,
            rejected = counters.resolution.rejections,
            "Movement congestion"
        );
    }

    TickResult {
        statistics,
        phase_timings_ms: phase_timings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generation::GenerationParams;
    use crate::world::tile::TerrainKind;
    use std::collections::HashSet;

    fn populated(seed: u64) -> (World, SimulationConfig, TilePos) {
        let config = SimulationConfig::default();
        let params = GenerationParams {
            seed,
            animal_density: 0.08,
            monster_density: 0.0,
            ..GenerationParams::default()
        };
        let mut world = World::new(&params, &config);
        let player = world.find_spawn_point(TilePos::new(0, 0));
        (world, config, player)
    }

    fn snapshot(world: &World) -> Vec<(TilePos, crate::agent::Species, bool)> {
        let mut agents: Vec<_> = world
            .agents()
            .map(|(_, a)| (a.tile(), a.species, a.is_alive()))
            .collect();
        agents.sort_by_key(|(pos, _, _)| *pos);
        agents
    }

    #[test]
    fn same_seed_same_history() {
        let inventory = Inventory::default();
        let (mut a, config, pa) = populated(42);
        let (mut b, _, pb) = populated(42);
        assert_eq!(pa, pb);
        for _ in 0..40 {
            let ra = execute_tick(&mut a, &config, 0.1, Some(pa), &inventory);
            let rb = execute_tick(&mut b, &config, 0.1, Some(pb), &inventory);
            assert_eq!(ra.statistics.moves, rb.statistics.moves);
            assert_eq!(ra.statistics.swaps, rb.statistics.swaps);
            assert_eq!(ra.statistics.births, rb.statistics.births);
        }
        assert_eq!(snapshot(&a), snapshot(&b));
        assert_eq!(a.tick_count, 40);
    }

    #[test]
    fn occupancy_stays_consistent_over_many_ticks() {
        let inventory = Inventory::default();
        let (mut world, config, player) = populated(7);
        for _ in 0..60 {
            execute_tick(&mut world, &config, 0.1, Some(player), &inventory);
        }

        let mut seen = HashSet::new();
        let living: Vec<(AgentId, TilePos)> = world
            .agents()
            .filter(|(_, a)| a.is_alive())
            .map(|(id, a)| (id, a.tile()))
            .collect();
        for (id, pos) in living {
            assert!(seen.insert(pos), "two agents share {}", pos);
            assert_ne!(pos, player, "agent on the player's tile");
            assert_eq!(world.living_agent_at(pos), Some(id));
            let local = pos.local();
            assert_eq!(world.chunk(pos.chunk()).unwrap().agent_at(local.x, local.y), Some(id));
            assert!(world.tile(pos).is_walkable());
        }
    }

    #[test]
    fn quiet_world_keeps_visibility_cache() {
        let config = SimulationConfig::default();
        let mut world = World::new(&GenerationParams::barren(3), &config);
        let inventory = Inventory::default();
        let player = world.find_spawn_point(TilePos::new(0, 0));
        for _ in 0..20 {
            execute_tick(&mut world, &config, 0.1, Some(player), &inventory);
        }
        assert_eq!(world.visibility().rebuild_count(), 1);
    }

    #[test]
    fn regrowth_in_view_invalidates_once() {
        let config = SimulationConfig {
            dirt_regrowth_secs: 0.25,
            ..SimulationConfig::default()
        };
        let mut world = World::new(&GenerationParams::barren(3), &config);
        let inventory = Inventory::default();
        let player = world.find_spawn_point(TilePos::new(0, 0));
        let patch = TilePos::new(player.x + 1, player.y);
        world.set_tile(patch, TerrainKind::Dirt);

        let mut regrown = 0;
        for _ in 0..5 {
            regrown += execute_tick(&mut world, &config, 0.1, Some(player), &inventory)
                .statistics
                .regrown;
        }
        assert_eq!(regrown, 1);
        assert_eq!(world.tile(patch).kind, TerrainKind::Grass);
        assert_eq!(world.visibility().rebuild_count(), 2);
    }

    #[test]
    fn agents_outside_active_radius_are_frozen() {
        let config = SimulationConfig {
            active_radius: 4,
            ..SimulationConfig::default()
        };
        let mut world = World::new(&GenerationParams::barren(9), &config);
        let far = TilePos::new(200, 200);
        for y in 195..=205 {
            for x in 195..=205 {
                world.set_tile(TilePos::new(x, y), TerrainKind::Grass);
            }
        }
        let id = world.spawn_agent(crate::agent::Species::Rabbit, far).unwrap();
        let inventory = Inventory::default();
        for _ in 0..30 {
            execute_tick(&mut world, &config, 0.1, Some(TilePos::new(0, 0)), &inventory);
        }
        assert_eq!(world.agent(id).unwrap().tile(), far);
        assert!(world.agent(id).unwrap().decision.is_none());
    }
}
