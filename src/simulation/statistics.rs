use std::collections::HashMap;

use serde::Serialize;

use crate::agent::Species;
use crate::simulation::environment::EnvironmentReport;
use crate::simulation::movement::ResolutionReport;
use crate::world::World;

/// Raw counts gathered by the tick phases.
#[derive(Debug, Clone, Default)]
pub struct TickCounters {
    pub active_tiles: usize,
    pub active_agents: usize,
    pub intentions: usize,
    pub resolution: ResolutionReport,
    pub environment: EnvironmentReport,
    pub breeding_requests: u32,
    pub births: u32,
}

/// Per-tick aggregate metrics for introspection and stall detection.
#[derive(Debug, Clone, Serialize)]
pub struct TickStatistics {
    pub tick: u64,
    pub active_tiles: usize,
    pub active_agents: usize,
    pub intentions: usize,
    pub moves: u32,
    pub swaps: u32,
    pub chain_moves: u32,
    pub rejected: u32,
    pub fallbacks: u32,
    pub breeding_requests: u32,
    pub births: u32,
    pub regrown: u32,
    pub matured: u32,
    pub loaded_chunks: usize,
    pub total_agents: usize,
    pub population: HashMap<Species, u32>,
    pub diversity_index: f32,
    pub visibility_rebuilds: u64,
    pub tick_duration_ms: f32,
}

/// Compute statistics for the current world state after a tick.
pub fn compute_statistics(
    world: &World,
    counters: &TickCounters,
    tick_duration_ms: f32,
) -> TickStatistics {
    let mut population: HashMap<Species, u32> = HashMap::new();
    let mut living = 0_u32;
    for (_, agent) in world.agents() {
        if agent.is_alive() {
            *population.entry(agent.species).or_insert(0) += 1;
            living += 1;
        }
    }
    let diversity = shannon_diversity(&population, living);

    TickStatistics {
        tick: world.tick_count,
        active_tiles: counters.active_tiles,
        active_agents: counters.active_agents,
        intentions: counters.intentions,
        moves: counters.resolution.commits,
        swaps: counters.resolution.swaps,
        chain_moves: counters.resolution.chain_moves,
        rejected: counters.resolution.rejections,
        fallbacks: counters.resolution.fallbacks,
        breeding_requests: counters.breeding_requests,
        births: counters.births,
        regrown: counters.environment.regrown,
        matured: counters.environment.matured,
        loaded_chunks: world.chunk_count(),
        total_agents: world.agent_count(),
        population,
        diversity_index: diversity,
        visibility_rebuilds: world.visibility().rebuild_count(),
        tick_duration_ms,
    }
}

/// Shannon diversity of the living population normalized to [0, 1].
/// 0 = a single species (or none), 1 = every present species equally common.
fn shannon_diversity(distribution: &HashMap<Species, u32>, total: u32) -> f32 {
    if total == 0 {
        return 0.0;
    }

    let total_f = total as f64;
    let mut entropy = 0.0_f64;
    let mut non_zero = 0_u32;

    for &count in distribution.values() {
        if count > 0 {
            non_zero += 1;
            let p = count as f64 / total_f;
            entropy -= p * p.ln();
        }
    }

    if non_zero <= 1 {
        return 0.0;
    }
    (entropy / (non_zero as f64).ln()) as f32
}
