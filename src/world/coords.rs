use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Tiles per chunk edge.
pub const CHUNK_SIZE: i32 = 16;
/// Tiles per chunk.
pub const CHUNK_AREA: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Chunk coordinate along one axis for a global tile coordinate.
pub fn to_chunk(v: i32) -> i32 {
    v.div_euclid(CHUNK_SIZE)
}

/// Local coordinate along one axis; always in `[0, CHUNK_SIZE)`.
pub fn to_local(v: i32) -> i32 {
    v.rem_euclid(CHUNK_SIZE)
}

// === Direction ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

// === Tile coordinates ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn chunk(self) -> ChunkPos {
        ChunkPos::new(to_chunk(self.x), to_chunk(self.y))
    }

    pub fn local(self) -> LocalPos {
        LocalPos {
            x: to_local(self.x),
            y: to_local(self.y),
        }
    }

    pub fn offset(self, dir: Direction) -> TilePos {
        let (dx, dy) = dir.delta();
        TilePos::new(self.x + dx, self.y + dy)
    }

    pub fn neighbors(self) -> [TilePos; 4] {
        Direction::ALL.map(|d| self.offset(d))
    }

    pub fn manhattan(self, other: TilePos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn chebyshev(self, other: TilePos) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Direction of the dominant axis toward `other`; `None` when equal.
    /// Horizontal wins ties.
    pub fn direction_to(self, other: TilePos) -> Option<Direction> {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        if dx == 0 && dy == 0 {
            return None;
        }
        if dx.abs() >= dy.abs() {
            Some(if dx > 0 { Direction::Right } else { Direction::Left })
        } else {
            Some(if dy > 0 { Direction::Down } else { Direction::Up })
        }
    }
}

impl std::fmt::Display for TilePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// === Chunk coordinates ===

/// Chunk coordinate pair. Orders row-major (y, then x), which is the
/// enumeration order of the chunk store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Global coordinate of the chunk's (0, 0) tile.
    pub fn origin(self) -> TilePos {
        TilePos::new(self.x * CHUNK_SIZE, self.y * CHUNK_SIZE)
    }

    pub fn tile_at(self, local: LocalPos) -> TilePos {
        let origin = self.origin();
        TilePos::new(origin.x + local.x, origin.y + local.y)
    }
}

impl Ord for ChunkPos {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for ChunkPos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// === Local coordinates ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalPos {
    pub x: i32,
    pub y: i32,
}

impl LocalPos {
    pub fn new(x: i32, y: i32) -> Option<Self> {
        if (0..CHUNK_SIZE).contains(&x) && (0..CHUNK_SIZE).contains(&y) {
            Some(Self { x, y })
        } else {
            None
        }
    }

    /// Row-major index into a chunk's tile array.
    pub fn index(self) -> usize {
        (self.y * CHUNK_SIZE + self.x) as usize
    }

    pub fn from_index(index: usize) -> Self {
        let i = index as i32;
        Self {
            x: i % CHUNK_SIZE,
            y: i / CHUNK_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_coordinate_always_in_range() {
        for x in -100..100 {
            let l = to_local(x);
            assert!((0..CHUNK_SIZE).contains(&l), "to_local({}) = {}", x, l);
            assert_eq!(l, ((x % CHUNK_SIZE) + CHUNK_SIZE) % CHUNK_SIZE);
        }
    }

    #[test]
    fn negative_coordinates_floor_into_chunks() {
        assert_eq!(to_chunk(-1), -1);
        assert_eq!(to_chunk(-16), -1);
        assert_eq!(to_chunk(-17), -2);
        assert_eq!(to_chunk(15), 0);
        assert_eq!(to_chunk(16), 1);
        assert_eq!(to_local(-1), 15);
        assert_eq!(to_local(-16), 0);
    }

    #[test]
    fn chunk_and_local_reassemble_global() {
        for &(x, y) in &[(0, 0), (-1, -1), (17, -33), (-250, 999)] {
            let pos = TilePos::new(x, y);
            assert_eq!(pos.chunk().tile_at(pos.local()), pos);
        }
    }

    #[test]
    fn local_pos_bounds_checked() {
        assert!(LocalPos::new(0, 0).is_some());
        assert!(LocalPos::new(15, 15).is_some());
        assert!(LocalPos::new(16, 0).is_none());
        assert!(LocalPos::new(0, -1).is_none());
        let l = LocalPos::new(3, 7).unwrap();
        assert_eq!(LocalPos::from_index(l.index()), l);
    }

    #[test]
    fn chunk_pos_orders_row_major() {
        let mut chunks = vec![
            ChunkPos::new(1, 0),
            ChunkPos::new(0, 1),
            ChunkPos::new(-1, 1),
            ChunkPos::new(0, 0),
        ];
        chunks.sort();
        assert_eq!(
            chunks,
            vec![
                ChunkPos::new(0, 0),
                ChunkPos::new(1, 0),
                ChunkPos::new(-1, 1),
                ChunkPos::new(0, 1),
            ]
        );
    }

    #[test]
    fn direction_to_prefers_dominant_axis() {
        let a = TilePos::new(0, 0);
        assert_eq!(a.direction_to(TilePos::new(3, 1)), Some(Direction::Right));
        assert_eq!(a.direction_to(TilePos::new(-1, -4)), Some(Direction::Up));
        assert_eq!(a.direction_to(TilePos::new(2, 2)), Some(Direction::Right));
        assert_eq!(a.direction_to(a), None);
        assert_eq!(a.offset(Direction::Left).manhattan(a), 1);
    }
}
