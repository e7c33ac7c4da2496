use std::sync::Arc;

use tracing::trace;

use crate::world::coords::{to_chunk, ChunkPos, TilePos};

/// Camera rectangle in tiles; `(x, y)` is the top-left tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ViewRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn centered_on(center: TilePos, width: u32, height: u32) -> Self {
        Self::new(
            center.x - (width / 2) as i32,
            center.y - (height / 2) as i32,
            width,
            height,
        )
    }

    pub fn padded(self, padding: u32) -> Self {
        let p = padding as i32;
        Self::new(
            self.x - p,
            self.y - p,
            self.width + padding * 2,
            self.height + padding * 2,
        )
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        pos.x >= self.x
            && pos.y >= self.y
            && pos.x < self.x + self.width as i32
            && pos.y < self.y + self.height as i32
    }

    /// Tiles in the rectangle, row-major.
    pub fn tiles(self) -> impl Iterator<Item = TilePos> {
        let (x0, y0) = (self.x, self.y);
        let (w, h) = (self.width as i32, self.height as i32);
        (y0..y0 + h).flat_map(move |y| (x0..x0 + w).map(move |x| TilePos::new(x, y)))
    }

    /// Chunks intersecting the rectangle, row-major.
    pub fn chunks(&self) -> Vec<ChunkPos> {
        if self.width == 0 || self.height == 0 {
            return Vec::new();
        }
        let (cx0, cy0) = (to_chunk(self.x), to_chunk(self.y));
        let cx1 = to_chunk(self.x + self.width as i32 - 1);
        let cy1 = to_chunk(self.y + self.height as i32 - 1);
        (cy0..=cy1)
            .flat_map(|cy| (cx0..=cx1).map(move |cx| ChunkPos::new(cx, cy)))
            .collect()
    }
}

/// Active tile set for a camera rectangle plus padding, computed directly.
pub fn compute_active_tiles(rect: ViewRect, padding: u32) -> Vec<TilePos> {
    rect.padded(padding).tiles().collect()
}

/// Cache of the active tile set. Rebuilt lazily when the camera rect
/// changes or after `invalidate`; a stale set is never handed out.
#[derive(Debug, Clone)]
pub struct VisibilityWindow {
    padding: u32,
    cached: Option<(ViewRect, Arc<[TilePos]>)>,
    rebuilds: u64,
}

impl VisibilityWindow {
    pub fn new(padding: u32) -> Self {
        Self {
            padding,
            cached: None,
            rebuilds: 0,
        }
    }

    pub fn active_tiles(&mut self, rect: ViewRect) -> Arc<[TilePos]> {
        if let Some((cached_rect, tiles)) = &self.cached {
            if *cached_rect == rect {
                return Arc::clone(tiles);
            }
        }
        let tiles: Arc<[TilePos]> = compute_active_tiles(rect, self.padding).into();
        self.rebuilds += 1;
        trace!(
            x = rect.x,
            y = rect.y,
            tiles = tiles.len(),
            rebuilds = self.rebuilds,
            "Visibility window rebuilt"
        );
        self.cached = Some((rect, Arc::clone(&tiles)));
        tiles
    }

    /// Drop the cached set; the next access recomputes it.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }
}
