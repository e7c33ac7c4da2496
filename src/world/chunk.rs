use std::collections::BTreeMap;

use crate::agent::{AgentId, Species};
use crate::world::coords::{ChunkPos, LocalPos, TilePos, CHUNK_AREA};
use crate::world::generation::TerrainGenerator;
use crate::world::tile::Tile;

/// A 16x16 block of tiles, back-filled from the generator one tile at a
/// time, plus the index of agents standing in it.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub pos: ChunkPos,
    tiles: Vec<Option<Tile>>,
    /// Local tile index -> agent. Ordered so iteration is row-major.
    agents: BTreeMap<usize, AgentId>,
    modified: Vec<bool>,
    /// Agents rolled by the generator for tiles materialized since the
    /// world last drained this queue.
    pending_spawns: Vec<(TilePos, Species)>,
}

impl Chunk {
    pub fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            tiles: vec![None; CHUNK_AREA],
            agents: BTreeMap::new(),
            modified: vec![false; CHUNK_AREA],
            pending_spawns: Vec::new(),
        }
    }

    /// Tile at local coordinates, generating it on first access.
    /// `None` when the coordinates fall outside the chunk.
    pub fn get_tile(
        &mut self,
        local_x: i32,
        local_y: i32,
        generator: &TerrainGenerator,
    ) -> Option<&mut Tile> {
        let local = LocalPos::new(local_x, local_y)?;
        Some(self.tile_at(local, generator))
    }

    /// Same as `get_tile` for an already validated position.
    pub fn tile_at(&mut self, local: LocalPos, generator: &TerrainGenerator) -> &mut Tile {
        let pos = self.pos.tile_at(local);
        let pending = &mut self.pending_spawns;
        self.tiles[local.index()].get_or_insert_with(|| {
            let generated = generator.generate_tile(pos);
            if let Some(species) = generated.spawn {
                pending.push((pos, species));
            }
            generated.tile
        })
    }

    /// Tile at local coordinates if it has been materialized.
    pub fn peek_tile(&self, local_x: i32, local_y: i32) -> Option<&Tile> {
        let local = LocalPos::new(local_x, local_y)?;
        self.tiles[local.index()].as_ref()
    }

    pub fn peek_tile_mut(&mut self, local_x: i32, local_y: i32) -> Option<&mut Tile> {
        let local = LocalPos::new(local_x, local_y)?;
        self.tiles[local.index()].as_mut()
    }

    /// Overwrite a tile and mark it modified. Out-of-range is a no-op.
    pub fn set_tile(&mut self, local_x: i32, local_y: i32, mut tile: Tile) {
        let Some(local) = LocalPos::new(local_x, local_y) else {
            return;
        };
        tile.modified = true;
        self.modified[local.index()] = true;
        self.tiles[local.index()] = Some(tile);
    }

    pub fn mark_modified(&mut self, local_x: i32, local_y: i32) {
        if let Some(local) = LocalPos::new(local_x, local_y) {
            self.modified[local.index()] = true;
        }
    }

    pub fn is_modified(&self, local_x: i32, local_y: i32) -> bool {
        LocalPos::new(local_x, local_y).is_some_and(|l| self.modified[l.index()])
    }

    pub fn modified_count(&self) -> usize {
        self.modified.iter().filter(|m| **m).count()
    }

    /// Materialize every tile of the chunk.
    pub fn generate_all(&mut self, generator: &TerrainGenerator) {
        for i in 0..CHUNK_AREA {
            let local = LocalPos::from_index(i);
            self.get_tile(local.x, local.y, generator);
        }
    }

    /// Materialized tiles, row-major.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter().flatten()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_some()).count()
    }

    pub fn take_pending_spawns(&mut self) -> Vec<(TilePos, Species)> {
        std::mem::take(&mut self.pending_spawns)
    }

    // --- Occupancy index ---

    pub fn agent_at(&self, local_x: i32, local_y: i32) -> Option<AgentId> {
        let local = LocalPos::new(local_x, local_y)?;
        self.agents.get(&local.index()).copied()
    }

    pub fn is_occupied(&self, local_x: i32, local_y: i32, excluding: Option<AgentId>) -> bool {
        match self.agent_at(local_x, local_y) {
            Some(id) => Some(id) != excluding,
            None => false,
        }
    }

    /// Index an agent at a local tile. Fails if another agent holds it.
    pub fn add_agent(&mut self, local: LocalPos, id: AgentId) -> bool {
        match self.agents.get(&local.index()) {
            Some(existing) if *existing != id => false,
            _ => {
                self.agents.insert(local.index(), id);
                true
            }
        }
    }

    /// Remove an agent from the index. Fails if the tile is indexed to
    /// someone else or to no one.
    pub fn remove_agent(&mut self, local: LocalPos, id: AgentId) -> bool {
        if self.agents.get(&local.index()) == Some(&id) {
            self.agents.remove(&local.index());
            true
        } else {
            false
        }
    }

    /// Re-index an agent within this chunk. Fails, leaving the index
    /// unchanged, if `to` is held by a different agent or `from` is empty.
    pub fn move_agent(&mut self, from: LocalPos, to: LocalPos) -> bool {
        let Some(&id) = self.agents.get(&from.index()) else {
            return false;
        };
        if from == to {
            return true;
        }
        if self.agents.get(&to.index()).is_some_and(|other| *other != id) {
            return false;
        }
        self.agents.remove(&from.index());
        self.agents.insert(to.index(), id);
        true
    }

    /// Indexed agents in local row-major order.
    pub fn agents(&self) -> impl Iterator<Item = (TilePos, AgentId)> + '_ {
        self.agents
            .iter()
            .map(|(&idx, &id)| (self.pos.tile_at(LocalPos::from_index(idx)), id))
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentId;
    use crate::config::generation::GenerationParams;
    use crate::world::tile::TerrainKind;
    use slotmap::SlotMap;

    fn generator() -> TerrainGenerator {
        TerrainGenerator::new(&GenerationParams::barren(42))
    }

    fn ids(n: usize) -> Vec<AgentId> {
        let mut map: SlotMap<AgentId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn first_touch_chunk_has_256_tiles_with_global_coords() {
        let generator = generator();
        let mut chunk = Chunk::new(ChunkPos::new(0, 0));
        assert_eq!(chunk.tile_count(), 0);
        chunk.generate_all(&generator);
        assert_eq!(chunk.tile_count(), 256);
        for tile in chunk.tiles() {
            assert!((0..16).contains(&tile.pos.x));
            assert!((0..16).contains(&tile.pos.y));
            assert!(TerrainKind::ALL.contains(&tile.kind));
        }
    }

    #[test]
    fn out_of_range_access_is_absent() {
        let generator = generator();
        let mut chunk = Chunk::new(ChunkPos::new(0, 0));
        assert!(chunk.get_tile(16, 0, &generator).is_none());
        assert!(chunk.get_tile(-1, 3, &generator).is_none());
        assert!(chunk.peek_tile(0, 99).is_none());
        chunk.set_tile(
            20,
            20,
            Tile::new(TilePos::new(20, 20), TerrainKind::Sand),
        );
        assert_eq!(chunk.modified_count(), 0);
        assert_eq!(chunk.tile_count(), 0);
    }

    #[test]
    fn lazy_tile_is_memoized() {
        let generator = generator();
        let mut chunk = Chunk::new(ChunkPos::new(-1, 2));
        let first = chunk.get_tile(3, 4, &generator).unwrap().clone();
        assert_eq!(first.pos, TilePos::new(-13, 36));
        assert_eq!(chunk.tile_count(), 1);
        let second = chunk.get_tile(3, 4, &generator).unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(chunk.tile_count(), 1);
    }

    #[test]
    fn set_tile_marks_modified() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0));
        chunk.set_tile(
            2,
            3,
            Tile::new(TilePos::new(2, 3), TerrainKind::Dirt),
        );
        assert!(chunk.is_modified(2, 3));
        assert!(chunk.peek_tile(2, 3).unwrap().modified);
        assert_eq!(chunk.modified_count(), 1);
    }

    #[test]
    fn occupancy_index_add_move_remove() {
        let ids = ids(2);
        let (a, b) = (ids[0], ids[1]);
        let mut chunk = Chunk::new(ChunkPos::new(0, 0));
        let p1 = LocalPos::new(1, 1).unwrap();
        let p2 = LocalPos::new(2, 1).unwrap();

        assert!(chunk.add_agent(p1, a));
        assert!(chunk.add_agent(p2, b));
        assert!(!chunk.add_agent(p2, a), "tile already indexed to b");
        assert!(chunk.is_occupied(1, 1, None));
        assert!(!chunk.is_occupied(1, 1, Some(a)));

        assert!(!chunk.move_agent(p1, p2), "move into b's tile must fail");
        assert_eq!(chunk.agent_at(1, 1), Some(a));

        assert!(chunk.remove_agent(p2, b));
        assert!(chunk.move_agent(p1, p2));
        assert_eq!(chunk.agent_at(2, 1), Some(a));
        assert_eq!(chunk.agent_at(1, 1), None);
        assert!(!chunk.remove_agent(p1, a));
        assert_eq!(chunk.agent_count(), 1);
    }

    #[test]
    fn agents_enumerate_row_major() {
        let ids = ids(3);
        let mut chunk = Chunk::new(ChunkPos::new(1, 0));
        chunk.add_agent(LocalPos::new(5, 2).unwrap(), ids[0]);
        chunk.add_agent(LocalPos::new(9, 0).unwrap(), ids[1]);
        chunk.add_agent(LocalPos::new(0, 2).unwrap(), ids[2]);
        let order: Vec<AgentId> = chunk.agents().map(|(_, id)| id).collect();
        assert_eq!(order, vec![ids[1], ids[2], ids[0]]);
        let first = chunk.agents().next().unwrap().0;
        assert_eq!(first, TilePos::new(25, 0));
    }
}
