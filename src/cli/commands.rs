use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::info;

use crate::agent::{Agent, Inventory};
use crate::config::generation::GenerationParams;
use crate::config::simulation::SimulationConfig;
use crate::simulation;
use crate::world::coords::{Direction, TilePos};
use crate::world::generation::print_terrain_summary;
use crate::world::tile::Tile;
use crate::world::visibility::ViewRect;
use crate::world::World;

/// Print a terrain summary for a square of chunks around the origin.
pub fn generate(params: &GenerationParams, radius: i32) -> Result<(), String> {
    if radius < 0 {
        return Err(format!("radius must be >= 0, got {}", radius));
    }
    let mut world = World::new(params, &SimulationConfig::default());
    let spawn = world.find_spawn_point(TilePos::new(0, 0));

    println!("=== World: {} ===", world.name);
    println!("ID: {}", world.id);
    println!("Player spawn: {}", spawn);
    println!();
    print_terrain_summary(world.generator(), radius);
    Ok(())
}

/// Run the headless simulation: the player takes a seeded stroll while
/// ticks advance at the configured rate until `max_ticks` or Ctrl-C.
pub async fn run_simulation(
    config: &SimulationConfig,
    params: &GenerationParams,
    max_ticks: Option<u64>,
) -> Result<(), String> {
    let mut world = World::new(params, config);
    let spawn = world.find_spawn_point(TilePos::new(0, 0));
    world.set_player(Some(spawn));
    let inventory = Inventory::with_item("wheat", 5);
    let mut stroll = ChaCha8Rng::seed_from_u64(world.seed());

    info!(
        world = %world.name,
        seed = world.seed(),
        x = spawn.x,
        y = spawn.y,
        "World created"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let dt = config.tick_seconds();
    let target = std::time::Duration::from_secs_f32(dt);
    let log_every = (config.tick_rate_hz.round() as u64).max(1) * 10;

    eprintln!(
        "Simulation running (tick rate: {}Hz, view {}x{})",
        config.tick_rate_hz, config.view_width, config.view_height
    );

    loop {
        if max_ticks.is_some_and(|max| world.tick_count >= max) {
            break;
        }
        let tick_start = std::time::Instant::now();

        if world.tick_count % 10 == 0 {
            let dir = Direction::ALL[stroll.gen_range(0..Direction::ALL.len())];
            world.try_move_player(dir);
        }

        let player = world.player();
        let result = simulation::execute_tick(&mut world, config, dt, player, &inventory);
        let stats = &result.statistics;

        if world.tick_count % log_every == 0 {
            let removed = world.remove_dead_agents();
            info!(
                tick = stats.tick,
                active_agents = stats.active_agents,
                moves = stats.moves,
                swaps = stats.swaps,
                rejected = stats.rejected,
                births = stats.births,
                chunks = stats.loaded_chunks,
                agents = stats.total_agents,
                removed,
                diversity = stats.diversity_index,
                ms = stats.tick_duration_ms,
                "Tick milestone"
            );
        }

        // Rate limiting: sleep remaining time to hit target tick rate
        let elapsed = tick_start.elapsed();
        if elapsed < target {
            tokio::select! {
                _ = tokio::time::sleep(target - elapsed) => {}
                _ = &mut shutdown => {
                    eprintln!("\nShutdown signal received");
                    break;
                }
            }
        } else {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    eprintln!("\nShutdown signal received");
                    break;
                }
                else => {}
            }
        }
    }

    eprintln!(
        "Simulation stopped at tick {} ({} chunks, {} agents)",
        world.tick_count,
        world.chunk_count(),
        world.agent_count()
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct InspectReport {
    world: String,
    seed: u64,
    center: TilePos,
    tiles: Vec<Tile>,
    agents: Vec<Agent>,
}

/// Show the tiles around `(x, y)` as an ASCII map or as JSON.
pub fn inspect(
    config: &SimulationConfig,
    params: &GenerationParams,
    center: TilePos,
    radius: u32,
    json: bool,
) -> Result<(), String> {
    let mut world = World::new(params, config);
    let side = radius * 2 + 1;
    let rect = ViewRect::new(center.x - radius as i32, center.y - radius as i32, side, side);

    if json {
        let report = build_report(&mut world, center, rect);
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Cannot serialize inspection: {}", e))?;
        println!("{}", out);
    } else {
        println!("=== {} around {} ===", world.name, center);
        print!("{}", render_ascii(&mut world, rect));
        if let Some(tile) = world.peek_tile(center) {
            println!();
            println!("Center: {:?}", tile.kind);
            if let Some(poi) = tile.poi().or(tile.cover.as_ref()) {
                println!("  Point of interest: {:?}", poi.kind);
            }
            if let Some(agent) = tile.agent().and_then(|id| world.agent(id)) {
                println!("  Agent: {:?} ({:.0}/{:.0})", agent.species, agent.health, agent.max_health);
            }
        }
    }
    Ok(())
}

fn build_report(world: &mut World, center: TilePos, rect: ViewRect) -> InspectReport {
    let tiles: Vec<Tile> = world.visible_tiles(rect).into_iter().cloned().collect();
    let agents: Vec<Agent> = tiles
        .iter()
        .filter_map(|t| t.agent().and_then(|id| world.agent(id)).cloned())
        .collect();
    InspectReport {
        world: world.name.clone(),
        seed: world.seed(),
        center,
        tiles,
        agents,
    }
}

/// One character per tile, one line per row. Agents show their species.
pub fn render_ascii(world: &mut World, rect: ViewRect) -> String {
    let mut out = String::new();
    for dy in 0..rect.height as i32 {
        for dx in 0..rect.width as i32 {
            let pos = TilePos::new(rect.x + dx, rect.y + dy);
            let glyph = if world.player() == Some(pos) {
                '@'
            } else {
                let tile = world.tile(pos);
                let (occupant, ground) = (tile.agent(), tile.glyph());
                match occupant {
                    Some(id) => world.agent(id).map_or('?', |a| a.species.glyph()),
                    None => ground,
                }
            };
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}
