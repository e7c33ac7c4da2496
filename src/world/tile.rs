use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::world::coords::TilePos;

// === Enums ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TerrainKind {
    DeepWater,
    ShallowWater,
    Sand,
    Grass,
    Dirt,
    Swamp,
    Snow,
    Stone,
}

impl TerrainKind {
    pub const ALL: [TerrainKind; 8] = [
        TerrainKind::DeepWater,
        TerrainKind::ShallowWater,
        TerrainKind::Sand,
        TerrainKind::Grass,
        TerrainKind::Dirt,
        TerrainKind::Swamp,
        TerrainKind::Snow,
        TerrainKind::Stone,
    ];

    pub fn is_passable(self) -> bool {
        !matches!(self, TerrainKind::DeepWater | TerrainKind::Stone)
    }

    pub fn is_water(self) -> bool {
        matches!(self, TerrainKind::DeepWater | TerrainKind::ShallowWater)
    }

    /// Single-character map glyph.
    pub fn glyph(self) -> char {
        match self {
            TerrainKind::DeepWater => '~',
            TerrainKind::ShallowWater => '-',
            TerrainKind::Sand => ':',
            TerrainKind::Grass => '.',
            TerrainKind::Dirt => ',',
            TerrainKind::Swamp => '%',
            TerrainKind::Snow => '*',
            TerrainKind::Stone => '^',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoiKind {
    Tree,
    Cactus,
    Sapling,
    Flowers,
    Boulder,
    Campfire,
    Well,
}

impl PoiKind {
    pub fn is_passable(self) -> bool {
        matches!(self, PoiKind::Sapling | PoiKind::Flowers)
    }

    pub fn is_animated(self) -> bool {
        matches!(self, PoiKind::Campfire)
    }

    pub fn is_interactable(self) -> bool {
        matches!(self, PoiKind::Campfire | PoiKind::Well)
    }

    /// Animation frames; 1 for static points of interest.
    pub fn frame_count(self) -> u8 {
        match self {
            PoiKind::Campfire => 4,
            _ => 1,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            PoiKind::Tree => 'T',
            PoiKind::Cactus => 'Y',
            PoiKind::Sapling => 't',
            PoiKind::Flowers => '"',
            PoiKind::Boulder => 'O',
            PoiKind::Campfire => '&',
            PoiKind::Well => '#',
        }
    }
}

// === Structures ===

/// A static occupant of a tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub kind: PoiKind,
    pub frame: u8,
    pub frame_timer: f32,
    /// Seconds spent growing; only meaningful for saplings.
    pub growth: f32,
}

impl Poi {
    pub fn new(kind: PoiKind) -> Self {
        Self {
            kind,
            frame: 0,
            frame_timer: 0.0,
            growth: 0.0,
        }
    }
}

/// The single thing standing on a tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Structure {
    PointOfInterest(Poi),
    Agent(AgentId),
}

impl Structure {
    pub fn agent(&self) -> Option<AgentId> {
        match self {
            Structure::Agent(id) => Some(*id),
            Structure::PointOfInterest(_) => None,
        }
    }

    pub fn poi(&self) -> Option<&Poi> {
        match self {
            Structure::PointOfInterest(poi) => Some(poi),
            Structure::Agent(_) => None,
        }
    }
}

/// Countdown that turns a dirt tile back into grass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regrowth {
    pub elapsed: f32,
    pub duration: f32,
}

impl Regrowth {
    pub fn new(duration: f32) -> Self {
        Self {
            elapsed: 0.0,
            duration,
        }
    }

    /// Advance by `dt`; true once the duration has been reached.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.elapsed += dt;
        self.elapsed >= self.duration
    }
}

// === Tile ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub pos: TilePos,
    pub kind: TerrainKind,
    pub prev_kind: Option<TerrainKind>,
    pub modified: bool,
    /// The one blocking occupant: an impassable point of interest or an agent.
    pub structure: Option<Structure>,
    /// Passable ground cover (flowers, saplings) that agents can stand on.
    pub cover: Option<Poi>,
    pub regrowth: Option<Regrowth>,
}

impl Tile {
    pub fn new(pos: TilePos, kind: TerrainKind) -> Self {
        Self {
            pos,
            kind,
            prev_kind: None,
            modified: false,
            structure: None,
            cover: None,
            regrowth: None,
        }
    }

    /// Put a point of interest in the slot its passability calls for.
    /// Returns false, leaving the tile unchanged, if that slot is taken.
    pub fn place_poi(&mut self, poi: Poi) -> bool {
        let slot_free = if poi.kind.is_passable() {
            self.cover.is_none()
        } else {
            self.structure.is_none()
        };
        if !slot_free {
            return false;
        }
        if poi.kind.is_passable() {
            self.cover = Some(poi);
        } else {
            self.structure = Some(Structure::PointOfInterest(poi));
        }
        true
    }

    pub fn agent(&self) -> Option<AgentId> {
        self.structure.as_ref().and_then(Structure::agent)
    }

    pub fn poi(&self) -> Option<&Poi> {
        self.structure.as_ref().and_then(Structure::poi)
    }

    /// Whether terrain and any point of interest allow standing here.
    /// Agents are not considered.
    pub fn is_walkable(&self) -> bool {
        self.kind.is_passable() && self.poi().is_none_or(|p| p.kind.is_passable())
    }

    pub fn glyph(&self) -> char {
        match (&self.structure, &self.cover) {
            (Some(Structure::PointOfInterest(poi)), _) => poi.kind.glyph(),
            (Some(Structure::Agent(_)), _) => 'a',
            (None, Some(cover)) => cover.kind.glyph(),
            (None, None) => self.kind.glyph(),
        }
    }
}
