use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentId, BreedingRequest};
use crate::config::simulation::SimulationConfig;
use crate::world::coords::TilePos;
use crate::world::World;

/// Whether two agents may breed right now: same species, both animals
/// off cooldown, adjacent and facing each other.
pub fn can_pair(a: &Agent, b: &Agent) -> bool {
    a.species == b.species
        && a.can_breed()
        && b.can_breed()
        && a.tile().manhattan(b.tile()) == 1
        && a.facing_tile() == b.tile()
        && b.facing_tile() == a.tile()
}

/// First free tile next to either parent, `a`'s side first.
fn nursery_tile(world: &World, a: TilePos, b: TilePos) -> Option<TilePos> {
    a.neighbors()
        .into_iter()
        .chain(b.neighbors())
        .find(|p| *p != a && *p != b && !world.is_occupied_by_others(*p, None))
}

/// Raise a breeding request for each eligible pair among `active`. The
/// request sits on the first agent of the pair in enumeration order.
pub fn request_breeding(world: &mut World, active: &[AgentId], config: &SimulationConfig) -> u32 {
    let mut raised = 0;
    for &id in active {
        let Some(agent) = world.agent(id) else {
            continue;
        };
        if !agent.can_breed() {
            continue;
        }
        let Some(partner_id) = world.living_agent_at(agent.facing_tile()) else {
            continue;
        };
        let Some(partner) = world.agent(partner_id) else {
            continue;
        };
        if !can_pair(agent, partner) {
            continue;
        }

        let here = agent.tile();
        let population = world.agent_count_in_chunk(here.chunk());
        if population >= config.max_agents_per_chunk {
            debug!(agent = ?id, population, "Breeding suppressed: chunk is full");
            continue;
        }
        let Some(tile) = nursery_tile(world, here, partner.tile()) else {
            debug!(agent = ?id, "Breeding skipped: no free tile near parents");
            continue;
        };

        let request = BreedingRequest {
            partner: partner_id,
            offspring: agent.species,
            tile,
        };
        if let Some(agent) = world.agent_mut(id) {
            agent.breeding = Some(request);
            agent.breed_cooldown = config.breeding_cooldown_secs;
        }
        if let Some(partner) = world.agent_mut(partner_id) {
            partner.breed_cooldown = config.breeding_cooldown_secs;
        }
        raised += 1;
        debug!(agent = ?id, partner = ?partner_id, tile = %tile, "Breeding requested");
    }
    raised
}

/// Spawn the offspring of every pending request, in enumeration order of
/// the requesting parents. Requests whose tile is no longer free are
/// dropped. Returns the number of births.
pub fn consume_breeding_requests(world: &mut World, config: &SimulationConfig) -> u32 {
    let mut pending: Vec<(AgentId, TilePos, BreedingRequest)> = world
        .agents()
        .filter_map(|(id, a)| a.breeding.map(|r| (id, a.tile(), r)))
        .collect();
    pending.sort_by_key(|(_, pos, _)| (pos.chunk(), pos.local().index()));

    let mut births = 0;
    for (parent, pos, request) in pending {
        if let Some(agent) = world.agent_mut(parent) {
            agent.breeding = None;
        }
        if world.agent_count_in_chunk(request.tile.chunk()) >= config.max_agents_per_chunk {
            debug!(parent = ?parent, tile = %request.tile, "Birth dropped: chunk is full");
            continue;
        }
        if world.is_occupied_by_others(request.tile, None) {
            warn!(parent = ?parent, tile = %request.tile, "Birth dropped: tile no longer free");
            continue;
        }
        match world.spawn_agent(request.offspring, request.tile) {
            Some(child) => {
                if let Some(agent) = world.agent_mut(child) {
                    agent.breed_cooldown = config.breeding_cooldown_secs;
                }
                births += 1;
                info!(
                    parent = ?parent,
                    partner = ?request.partner,
                    child = ?child,
                    species = ?request.offspring,
                    x = pos.x,
                    y = pos.y,
                    "Agent born"
                );
            }
            None => warn!(parent = ?parent, tile = %request.tile, "Birth dropped: spawn failed"),
        }
    }
    births
}
