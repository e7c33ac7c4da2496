pub mod chunk;
pub mod coords;
pub mod generation;
pub mod tile;
pub mod visibility;

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use slotmap::SlotMap;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agent::{Agent, AgentId, BehaviorState, Category, Species, tile_center};
use crate::config::generation::GenerationParams;
use crate::config::simulation::SimulationConfig;
use chunk::Chunk;
use coords::{ChunkPos, Direction, TilePos};
use generation::TerrainGenerator;
use tile::{Regrowth, Structure, TerrainKind, Tile};
use visibility::{ViewRect, VisibilityWindow};

/// Farthest ring `find_spawn_point` searches before giving up.
const SPAWN_SEARCH_RADIUS: i32 = 64;

/// Sparse, unbounded tile world. Owns every chunk and every agent.
pub struct World {
    pub id: Uuid,
    pub name: String,
    pub created_at: String,
    pub tick_count: u64,
    pub generation_params: GenerationParams,
    generator: TerrainGenerator,
    chunks: BTreeMap<ChunkPos, Chunk>,
    agents: SlotMap<AgentId, Agent>,
    visibility: VisibilityWindow,
    player: Option<TilePos>,
    dirt_regrowth_secs: f32,
    flee_secs: f32,
}

impl World {
    /// Create an empty world. A zero seed is replaced by a random one; the
    /// seed actually used is kept in `generation_params`.
    pub fn new(params: &GenerationParams, config: &SimulationConfig) -> Self {
        let seed = if params.seed == 0 {
            rand::thread_rng().r#gen()
        } else {
            params.seed
        };
        let resolved_params = GenerationParams {
            seed,
            ..params.clone()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let id = Uuid::from_bytes(rng.r#gen());

        World {
            id,
            name: format!("World-{}", seed),
            created_at: format!(
                "{}",
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs()
            ),
            tick_count: 0,
            generator: TerrainGenerator::new(&resolved_params),
            generation_params: resolved_params,
            chunks: BTreeMap::new(),
            agents: SlotMap::with_key(),
            visibility: VisibilityWindow::new(config.view_padding),
            player: None,
            dirt_regrowth_secs: config.dirt_regrowth_secs,
            flee_secs: config.flee_secs,
        }
    }

    pub fn seed(&self) -> u64 {
        self.generation_params.seed
    }

    pub fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    // --- Chunks and tiles ---

    pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    /// Loaded chunks in row-major chunk order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn ensure_chunk(&mut self, pos: ChunkPos) -> &mut Chunk {
        self.chunks.entry(pos).or_insert_with(|| {
            debug!(x = pos.x, y = pos.y, "Chunk created");
            Chunk::new(pos)
        })
    }

    fn slot_mut(&mut self, pos: TilePos) -> &mut Tile {
        let cpos = pos.chunk();
        let chunk = self.chunks.entry(cpos).or_insert_with(|| Chunk::new(cpos));
        chunk.tile_at(pos.local(), &self.generator)
    }

    /// Generate the tile at `pos` if needed and admit any agent the
    /// generator rolled for it.
    fn materialize(&mut self, pos: TilePos) {
        let cpos = pos.chunk();
        self.ensure_chunk(cpos);
        let Some(chunk) = self.chunks.get_mut(&cpos) else {
            return;
        };
        chunk.tile_at(pos.local(), &self.generator);
        for (at, species) in chunk.take_pending_spawns() {
            self.admit_generated(at, species);
        }
    }

    fn admit_generated(&mut self, pos: TilePos, species: Species) {
        if self.player == Some(pos) {
            debug!(x = pos.x, y = pos.y, ?species, "Generated spawn dropped: player stands there");
            return;
        }
        let id = self.agents.insert(Agent::new(species, pos));
        let tile = self.slot_mut(pos);
        if tile.structure.is_some() {
            warn!(x = pos.x, y = pos.y, ?species, "Generated spawn landed on occupied tile");
            self.agents.remove(id);
            return;
        }
        tile.structure = Some(Structure::Agent(id));
        if let Some(chunk) = self.chunks.get_mut(&pos.chunk()) {
            chunk.add_agent(pos.local(), id);
        }
        debug!(agent = ?id, ?species, x = pos.x, y = pos.y, "Generated agent admitted");
    }

    /// Tile at `pos`, generating its chunk and the tile on first access.
    pub fn tile(&mut self, pos: TilePos) -> &Tile {
        self.tile_mut(pos)
    }

    /// Mutable tile access for in-crate bookkeeping. Callers that change
    /// terrain or occupancy must invalidate the visibility window.
    pub(crate) fn tile_mut(&mut self, pos: TilePos) -> &mut Tile {
        self.materialize(pos);
        self.slot_mut(pos)
    }

    /// Tile at `pos` if it has been materialized.
    pub fn peek_tile(&self, pos: TilePos) -> Option<&Tile> {
        let local = pos.local();
        self.chunks
            .get(&pos.chunk())
            .and_then(|c| c.peek_tile(local.x, local.y))
    }

    /// Current terrain, materialized or not.
    pub fn terrain_at(&self, pos: TilePos) -> TerrainKind {
        match self.peek_tile(pos) {
            Some(tile) => tile.kind,
            None => self.generator.terrain_at(pos),
        }
    }

    /// Replace the terrain at `pos`, remembering the old kind so the edit
    /// can be undone. Dirt arms the regrowth timer; anything else clears it.
    pub fn set_tile(&mut self, pos: TilePos, kind: TerrainKind) {
        let regrowth_secs = self.dirt_regrowth_secs;
        let tile = self.tile_mut(pos);
        tile.prev_kind = Some(tile.kind);
        tile.kind = kind;
        tile.modified = true;
        tile.regrowth = (kind == TerrainKind::Dirt).then(|| Regrowth::new(regrowth_secs));
        let local = pos.local();
        if let Some(chunk) = self.chunks.get_mut(&pos.chunk()) {
            chunk.mark_modified(local.x, local.y);
        }
        self.visibility.invalidate();
    }

    /// Undo the last `set_tile`. False when there is nothing to undo.
    pub fn restore_tile(&mut self, pos: TilePos) -> bool {
        let tile = self.tile_mut(pos);
        let Some(prev) = tile.prev_kind.take() else {
            return false;
        };
        tile.kind = prev;
        tile.regrowth = None;
        self.visibility.invalidate();
        true
    }

    // --- Occupancy ---

    /// Terrain and points of interest allow standing at `pos`.
    pub fn is_walkable(&self, pos: TilePos) -> bool {
        match self.peek_tile(pos) {
            Some(tile) => tile.is_walkable(),
            None => self.generator.generate_tile(pos).tile.is_walkable(),
        }
    }

    /// The canonical collision predicate, shared by the player and agents.
    /// Unmaterialized tiles are answered by the generator; an agent it would
    /// roll there counts as an occupant.
    pub fn is_occupied_by_others(&self, pos: TilePos, excluding: Option<AgentId>) -> bool {
        if self.player == Some(pos) {
            return true;
        }
        match self.peek_tile(pos) {
            Some(tile) => {
                if !tile.is_walkable() {
                    return true;
                }
                match tile.agent() {
                    Some(id) => {
                        Some(id) != excluding
                            && self.agents.get(id).is_some_and(Agent::is_alive)
                    }
                    None => false,
                }
            }
            None => {
                let generated = self.generator.generate_tile(pos);
                !generated.tile.is_walkable() || generated.spawn.is_some()
            }
        }
    }

    /// Living agent standing on `pos`, if any.
    pub fn living_agent_at(&self, pos: TilePos) -> Option<AgentId> {
        self.peek_tile(pos)
            .and_then(Tile::agent)
            .filter(|id| self.agents.get(*id).is_some_and(Agent::is_alive))
    }

    // --- Agents ---

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents.iter()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agent_count_in_chunk(&self, pos: ChunkPos) -> usize {
        self.chunks.get(&pos).map_or(0, Chunk::agent_count)
    }

    /// Place a new agent. Fails when `pos` is blocked.
    pub fn spawn_agent(&mut self, species: Species, pos: TilePos) -> Option<AgentId> {
        self.materialize(pos);
        if self.is_occupied_by_others(pos, None) || self.slot_mut(pos).structure.is_some() {
            debug!(?species, x = pos.x, y = pos.y, "Spawn rejected: tile occupied");
            return None;
        }
        let id = self.agents.insert(Agent::new(species, pos));
        self.slot_mut(pos).structure = Some(Structure::Agent(id));
        if let Some(chunk) = self.chunks.get_mut(&pos.chunk()) {
            chunk.add_agent(pos.local(), id);
        }
        self.visibility.invalidate();
        debug!(agent = ?id, ?species, x = pos.x, y = pos.y, "Agent spawned");
        Some(id)
    }

    /// Clear an agent out of its tile slot and chunk index. The arena
    /// record is left alone.
    fn detach(&mut self, id: AgentId, pos: TilePos) {
        if let Some(tile) = self.chunks.get_mut(&pos.chunk()).and_then(|c| {
            let local = pos.local();
            c.peek_tile_mut(local.x, local.y)
        }) {
            if tile.agent() == Some(id) {
                tile.structure = None;
            } else {
                error!(agent = ?id, x = pos.x, y = pos.y, "Tile slot does not hold detaching agent");
            }
        }
        if let Some(chunk) = self.chunks.get_mut(&pos.chunk()) {
            if !chunk.remove_agent(pos.local(), id) {
                error!(agent = ?id, x = pos.x, y = pos.y, "Chunk index does not hold detaching agent");
            }
        }
        self.visibility.invalidate();
    }

    /// Remove an agent from the world entirely.
    pub fn remove_agent(&mut self, id: AgentId) -> Option<Agent> {
        let agent = self.agents.get(id)?;
        if agent.is_alive() {
            let pos = agent.tile();
            self.detach(id, pos);
        }
        self.agents.remove(id)
    }

    /// Apply damage from `source`. Returns true when this blow killed the
    /// agent. Surviving animals flee from the source.
    pub fn damage_agent(&mut self, id: AgentId, amount: f32, source: TilePos) -> bool {
        let flee_secs = self.flee_secs;
        let Some(agent) = self.agents.get_mut(id) else {
            warn!(agent = ?id, "Damage to unknown agent ignored");
            return false;
        };
        if !agent.is_alive() {
            return false;
        }
        agent.health = (agent.health - amount).max(0.0);
        if agent.health > 0.0 {
            if agent.category() == Category::Animal {
                agent.state = BehaviorState::Fleeing {
                    threat: source,
                    remaining: flee_secs,
                };
                agent.decision = None;
                agent.move_cooldown = 0.0;
            }
            return false;
        }

        agent.state = BehaviorState::Dead;
        agent.decision = None;
        agent.breeding = None;
        let (species, pos) = (agent.species, agent.tile());
        self.detach(id, pos);
        info!(agent = ?id, ?species, x = pos.x, y = pos.y, "Agent died");
        true
    }

    /// Drop every dead agent from the arena. Returns how many were removed.
    pub fn remove_dead_agents(&mut self) -> usize {
        let dead: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|(_, a)| !a.is_alive())
            .map(|(id, _)| id)
            .collect();
        for id in &dead {
            self.agents.remove(*id);
        }
        dead.len()
    }

    /// Commit a move of `id` from `from` to `to`: tile slots, chunk
    /// indices, and position. If `to` is held by something else the agent
    /// is put back on `from` and nothing else changes.
    pub fn move_agent_between_tiles(&mut self, id: AgentId, from: TilePos, to: TilePos) -> bool {
        let Some(agent) = self.agents.get(id) else {
            warn!(agent = ?id, "Move of unknown agent ignored");
            return false;
        };
        if !agent.is_alive() {
            return false;
        }
        if from == to {
            return true;
        }
        self.materialize(from);
        self.materialize(to);

        let holder = self.slot_mut(to).structure.as_ref().map(Structure::agent);
        match holder {
            Some(Some(other)) if other == id => return true,
            Some(blocker) => {
                debug!(
                    agent = ?id,
                    from = %from,
                    to = %to,
                    blocker = ?blocker,
                    "Move reverted: destination occupied"
                );
                if let Some(agent) = self.agents.get_mut(id) {
                    agent.position = tile_center(from);
                }
                return false;
            }
            None => {}
        }
        if self.player == Some(to) {
            debug!(agent = ?id, to = %to, "Move reverted: player stands there");
            if let Some(agent) = self.agents.get_mut(id) {
                agent.position = tile_center(from);
            }
            return false;
        }

        let source = self.slot_mut(from);
        if source.agent() == Some(id) {
            source.structure = None;
        } else {
            error!(agent = ?id, from = %from, "Source slot does not hold moving agent");
        }
        self.slot_mut(to).structure = Some(Structure::Agent(id));

        let (src, dst) = (from.chunk(), to.chunk());
        let indexed = if src == dst {
            self.ensure_chunk(src).move_agent(from.local(), to.local())
        } else {
            let removed = self.ensure_chunk(src).remove_agent(from.local(), id);
            removed && self.ensure_chunk(dst).add_agent(to.local(), id)
        };
        if !indexed {
            error!(agent = ?id, from = %from, to = %to, "Chunk index disagreed with tile slots");
        }

        if let Some(agent) = self.agents.get_mut(id) {
            agent.position = tile_center(to);
        }
        self.visibility.invalidate();
        true
    }

    /// Exchange the tiles of two living agents in one step.
    pub fn swap_agents(&mut self, a: AgentId, b: AgentId) -> bool {
        let (Some(agent_a), Some(agent_b)) = (self.agents.get(a), self.agents.get(b)) else {
            return false;
        };
        if a == b || !agent_a.is_alive() || !agent_b.is_alive() {
            return false;
        }
        let (pa, pb) = (agent_a.tile(), agent_b.tile());
        if self.slot_mut(pa).agent() != Some(a) || self.slot_mut(pb).agent() != Some(b) {
            error!(a = ?a, b = ?b, "Swap aborted: tile slots disagree with agent positions");
            return false;
        }

        self.slot_mut(pa).structure = Some(Structure::Agent(b));
        self.slot_mut(pb).structure = Some(Structure::Agent(a));
        let removed = self.ensure_chunk(pa.chunk()).remove_agent(pa.local(), a)
            && self.ensure_chunk(pb.chunk()).remove_agent(pb.local(), b);
        let added = self.ensure_chunk(pb.chunk()).add_agent(pb.local(), a)
            && self.ensure_chunk(pa.chunk()).add_agent(pa.local(), b);
        if !(removed && added) {
            error!(a = ?a, b = ?b, "Chunk index disagreed during swap");
        }

        if let Some(agent) = self.agents.get_mut(a) {
            agent.position = tile_center(pb);
        }
        if let Some(agent) = self.agents.get_mut(b) {
            agent.position = tile_center(pa);
        }
        self.visibility.invalidate();
        true
    }

    /// Living agents within Chebyshev `radius` of `center`, in chunk
    /// enumeration order (chunk row-major, then local row-major).
    pub fn agents_near(&self, center: TilePos, radius: u32) -> Vec<AgentId> {
        let r = radius as i32;
        let lo = TilePos::new(center.x - r, center.y - r).chunk();
        let hi = TilePos::new(center.x + r, center.y + r).chunk();
        self.chunks
            .range(lo..=hi)
            .filter(|(pos, _)| pos.x >= lo.x && pos.x <= hi.x)
            .flat_map(|(_, chunk)| chunk.agents())
            .filter(|(pos, id)| {
                pos.chebyshev(center) <= radius
                    && self.agents.get(*id).is_some_and(Agent::is_alive)
            })
            .map(|(_, id)| id)
            .collect()
    }

    // --- Player ---

    pub fn player(&self) -> Option<TilePos> {
        self.player
    }

    pub fn set_player(&mut self, pos: Option<TilePos>) {
        if self.player != pos {
            self.player = pos;
            self.visibility.invalidate();
        }
    }

    /// Step the player one tile if the canonical predicate allows it.
    pub fn try_move_player(&mut self, direction: Direction) -> bool {
        let Some(current) = self.player else {
            return false;
        };
        let target = current.offset(direction);
        self.materialize(target);
        if self.is_occupied_by_others(target, None) {
            debug!(to = %target, "Player move blocked");
            return false;
        }
        self.set_player(Some(target));
        true
    }

    /// Nearest free tile to `near`, searched ring by ring.
    pub fn find_spawn_point(&mut self, near: TilePos) -> TilePos {
        for r in 0..=SPAWN_SEARCH_RADIUS {
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx.abs().max(dy.abs()) != r {
                        continue;
                    }
                    let pos = TilePos::new(near.x + dx, near.y + dy);
                    self.materialize(pos);
                    if !self.is_occupied_by_others(pos, None) {
                        return pos;
                    }
                }
            }
        }
        warn!(near = %near, "No free spawn point found");
        near
    }

    // --- Visibility ---

    /// Active tile set for `rect` from the visibility window cache.
    pub fn active_tiles(&mut self, rect: ViewRect) -> Arc<[TilePos]> {
        self.visibility.active_tiles(rect)
    }

    pub fn visibility(&self) -> &VisibilityWindow {
        &self.visibility
    }

    pub fn invalidate_visibility(&mut self) {
        self.visibility.invalidate();
    }

    /// Chunks intersecting `rect`, created on demand, row-major.
    pub fn visible_chunks(&mut self, rect: ViewRect) -> Vec<&Chunk> {
        let wanted = rect.chunks();
        for pos in &wanted {
            self.ensure_chunk(*pos);
        }
        wanted.iter().filter_map(|pos| self.chunks.get(pos)).collect()
    }

    /// Materialized tiles of the active set for `rect`, row-major.
    pub fn visible_tiles(&mut self, rect: ViewRect) -> Vec<&Tile> {
        let active = self.active_tiles(rect);
        for pos in active.iter() {
            self.materialize(*pos);
        }
        active.iter().filter_map(|pos| self.peek_tile(*pos)).collect()
    }
}
