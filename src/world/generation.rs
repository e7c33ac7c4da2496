use std::collections::HashMap;

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::agent::Species;
use crate::config::generation::GenerationParams;
use crate::world::coords::{ChunkPos, LocalPos, TilePos, CHUNK_AREA};
use crate::world::tile::*;

/// A freshly generated tile plus any agent rolled onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedTile {
    pub tile: Tile,
    pub spawn: Option<Species>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Low,
    Mid,
    High,
}

fn band(value: f32, low: f32, high: f32) -> Band {
    if value < low {
        Band::Low
    } else if value > high {
        Band::High
    } else {
        Band::Mid
    }
}

/// Pure, seeded terrain source. Holds only the noise fields; generating the
/// same coordinate twice always yields the same tile.
pub struct TerrainGenerator {
    params: GenerationParams,
    elevation: Fbm<Perlin>,
    temperature: Perlin,
    humidity: Perlin,
}

impl TerrainGenerator {
    /// `params.seed` is used as given; resolve a zero seed before calling.
    pub fn new(params: &GenerationParams) -> Self {
        let seed = params.seed as u32;
        Self {
            params: params.clone(),
            elevation: Fbm::<Perlin>::new(seed).set_octaves(4),
            temperature: Perlin::new(seed.wrapping_add(1)),
            humidity: Perlin::new(seed.wrapping_add(2)),
        }
    }

    pub fn seed(&self) -> u64 {
        self.params.seed
    }

    fn sample(&self, field: &impl NoiseFn<f64, 2>, pos: TilePos, scale: f64) -> f32 {
        let nx = (pos.x as f64 + 0.5) * scale;
        let ny = (pos.y as f64 + 0.5) * scale;
        (field.get([nx, ny]) as f32).clamp(-1.0, 1.0)
    }

    pub fn elevation_at(&self, pos: TilePos) -> f32 {
        self.sample(&self.elevation, pos, self.params.terrain_scale)
    }

    /// Terrain kind only; no spawn rolls.
    pub fn terrain_at(&self, pos: TilePos) -> TerrainKind {
        let elevation = self.elevation_at(pos);
        let temperature = self.sample(&self.temperature, pos, self.params.climate_scale);
        let humidity = self.sample(&self.humidity, pos, self.params.climate_scale);
        classify(elevation, temperature, humidity, self.params.sea_level)
    }

    pub fn generate_tile(&self, pos: TilePos) -> GeneratedTile {
        let kind = self.terrain_at(pos);
        let mut tile = Tile::new(pos, kind);
        let mut rng = ChaCha8Rng::seed_from_u64(coordinate_seed(self.params.seed, pos));

        let poi = roll_poi(kind, &mut rng, &self.params);
        let spawn = if poi.is_none() {
            roll_spawn(kind, &mut rng, &self.params)
        } else {
            None
        };
        if let Some(kind) = poi {
            tile.place_poi(Poi::new(kind));
        }

        GeneratedTile { tile, spawn }
    }

    /// All tiles of one chunk, row-major.
    pub fn generate_chunk(&self, chunk: ChunkPos) -> Vec<GeneratedTile> {
        (0..CHUNK_AREA)
            .map(|i| self.generate_tile(chunk.tile_at(LocalPos::from_index(i))))
            .collect()
    }
}

/// Deterministic per-coordinate RNG seed.
fn coordinate_seed(seed: u64, pos: TilePos) -> u64 {
    seed.wrapping_mul(6364136223846793005)
        .wrapping_add(pos.x as i64 as u64)
        .wrapping_mul(1442695040888963407)
        .wrapping_add(pos.y as i64 as u64)
        .wrapping_mul(6364136223846793005)
}

/// Decision table: (elevation band, temperature band, humidity band,
/// proximity to water) -> terrain.
fn classify(elevation: f32, temperature: f32, humidity: f32, sea_level: f32) -> TerrainKind {
    let deep_level = sea_level - 0.15;
    let shore_level = sea_level + 0.06;

    if elevation < deep_level {
        return TerrainKind::DeepWater;
    }
    if elevation < sea_level {
        return TerrainKind::ShallowWater;
    }
    let near_water = elevation < shore_level;
    let temp = band(temperature, -0.3, 0.3);
    let humid = band(humidity, -0.25, 0.25);

    if near_water {
        return match (temp, humid) {
            (Band::Low, _) => TerrainKind::Snow,
            (_, Band::High) => TerrainKind::Swamp,
            _ => TerrainKind::Sand,
        };
    }

    match band(elevation, 0.0, 0.45) {
        Band::High if elevation > 0.65 => TerrainKind::Stone,
        Band::High => match (temp, humid) {
            (Band::Low, _) => TerrainKind::Snow,
            (_, Band::Low) => TerrainKind::Stone,
            _ => TerrainKind::Grass,
        },
        Band::Mid | Band::Low => match (temp, humid) {
            (Band::Low, _) => TerrainKind::Snow,
            (Band::High, Band::Low) => TerrainKind::Sand,
            (Band::Mid, Band::Low) => TerrainKind::Dirt,
            (_, Band::High) if elevation < 0.1 => TerrainKind::Swamp,
            _ => TerrainKind::Grass,
        },
    }
}

fn roll_poi(kind: TerrainKind, rng: &mut impl Rng, params: &GenerationParams) -> Option<PoiKind> {
    let veg = params.vegetation_density;
    match kind {
        TerrainKind::Grass => {
            let r = rng.r#gen::<f32>();
            if r < veg * 0.6 {
                Some(PoiKind::Tree)
            } else if r < veg * 0.8 {
                Some(PoiKind::Flowers)
            } else if r < veg {
                Some(PoiKind::Sapling)
            } else if rng.r#gen::<f32>() < params.structure_density {
                Some(if rng.gen_bool(0.5) {
                    PoiKind::Campfire
                } else {
                    PoiKind::Well
                })
            } else {
                None
            }
        }
        TerrainKind::Sand if rng.r#gen::<f32>() < veg * 0.3 => Some(PoiKind::Cactus),
        TerrainKind::Swamp if rng.r#gen::<f32>() < veg * 0.4 => Some(PoiKind::Tree),
        TerrainKind::Dirt | TerrainKind::Snow
            if rng.r#gen::<f32>() < params.structure_density * 2.0 =>
        {
            Some(PoiKind::Boulder)
        }
        _ => None,
    }
}

fn roll_spawn(kind: TerrainKind, rng: &mut impl Rng, params: &GenerationParams) -> Option<Species> {
    if !kind.is_passable() || kind.is_water() {
        return None;
    }
    let r = rng.r#gen::<f32>();
    if r < params.animal_density {
        let species = match kind {
            TerrainKind::Sand => Species::Camel,
            TerrainKind::Snow => Species::Deer,
            _ => match rng.gen_range(0..3) {
                0 => Species::Rabbit,
                1 => Species::Deer,
                _ => Species::Sheep,
            },
        };
        Some(species)
    } else if r < params.animal_density + params.monster_density {
        Some(if kind == TerrainKind::Swamp {
            Species::Slime
        } else {
            Species::Wolf
        })
    } else if r < params.animal_density + params.monster_density + params.trader_density {
        Some(Species::Trader)
    } else {
        None
    }
}

/// Terrain counts over a square of chunks centered on the origin. Pure, so
/// chunks are generated in parallel.
pub fn terrain_summary(generator: &TerrainGenerator, radius: i32) -> HashMap<TerrainKind, u32> {
    let chunks: Vec<ChunkPos> = (-radius..=radius)
        .flat_map(|cy| (-radius..=radius).map(move |cx| ChunkPos::new(cx, cy)))
        .collect();

    chunks
        .par_iter()
        .map(|&chunk| {
            let mut counts: HashMap<TerrainKind, u32> = HashMap::new();
            for generated in generator.generate_chunk(chunk) {
                *counts.entry(generated.tile.kind).or_insert(0) += 1;
            }
            counts
        })
        .reduce(HashMap::new, |mut acc, counts| {
            for (kind, n) in counts {
                *acc.entry(kind).or_insert(0) += n;
            }
            acc
        })
}

/// Print a terrain summary for a square of chunks around the origin.
pub fn print_terrain_summary(generator: &TerrainGenerator, radius: i32) {
    let counts = terrain_summary(generator, radius);
    let total: u32 = counts.values().sum();
    let side = radius * 2 + 1;

    println!("=== Terrain Summary ===");
    println!("Seed: {}", generator.seed());
    println!("Chunks: {}x{} ({} tiles)", side, side, total);

    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by_key(|&(kind, _)| kind);
    println!("\nTerrain:");
    for (kind, count) in &sorted {
        let pct = *count as f32 / total.max(1) as f32 * 100.0;
        println!(
            "  {} {:<14} {:>7} ({:.1}%)",
            kind.glyph(),
            format!("{:?}", kind),
            count,
            pct
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_params() -> GenerationParams {
        GenerationParams {
            seed: 42,
            ..GenerationParams::default()
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let a = TerrainGenerator::new(&default_params());
        let b = TerrainGenerator::new(&default_params());
        for y in -20..20 {
            for x in -20..20 {
                let pos = TilePos::new(x * 7, y * 5);
                assert_eq!(a.generate_tile(pos), b.generate_tile(pos), "Mismatch at {}", pos);
            }
        }
    }

    #[test]
    fn different_seeds_differ() {
        let a = TerrainGenerator::new(&default_params());
        let b = TerrainGenerator::new(&GenerationParams {
            seed: 43,
            ..default_params()
        });
        let differs = (0..400).any(|i| {
            let pos = TilePos::new(i * 3, i * 2);
            a.terrain_at(pos) != b.terrain_at(pos)
        });
        assert!(differs, "Seeds 42 and 43 produced identical terrain");
    }

    #[test]
    fn generated_chunk_is_full_and_row_major() {
        let generator = TerrainGenerator::new(&default_params());
        let chunk = ChunkPos::new(-2, 3);
        let tiles = generator.generate_chunk(chunk);
        assert_eq!(tiles.len(), CHUNK_AREA);
        assert_eq!(tiles[0].tile.pos, TilePos::new(-32, 48));
        assert_eq!(tiles[1].tile.pos, TilePos::new(-31, 48));
        assert_eq!(tiles[16].tile.pos, TilePos::new(-32, 49));
    }

    #[test]
    fn spawns_never_share_a_tile_with_pois() {
        let generator = TerrainGenerator::new(&GenerationParams {
            seed: 5,
            vegetation_density: 0.5,
            animal_density: 0.3,
            ..GenerationParams::default()
        });
        for generated in generator.generate_chunk(ChunkPos::new(0, 0)) {
            if generated.spawn.is_some() {
                assert!(generated.tile.structure.is_none());
                assert!(generated.tile.cover.is_none());
                assert!(generated.tile.kind.is_passable());
            }
        }
    }

    #[test]
    fn barren_params_spawn_nothing() {
        let generator = TerrainGenerator::new(&GenerationParams::barren(11));
        for cy in -1..=1 {
            for cx in -1..=1 {
                for generated in generator.generate_chunk(ChunkPos::new(cx, cy)) {
                    assert!(generated.spawn.is_none());
                    assert!(generated.tile.structure.is_none());
                    assert!(generated.tile.cover.is_none());
                }
            }
        }
    }

    #[test]
    fn classify_water_bands() {
        assert_eq!(classify(-0.9, 0.0, 0.0, -0.2), TerrainKind::DeepWater);
        assert_eq!(classify(-0.25, 0.0, 0.0, -0.2), TerrainKind::ShallowWater);
        assert_eq!(classify(-0.18, 0.0, 0.0, -0.2), TerrainKind::Sand);
        assert_eq!(classify(0.9, 0.0, 0.0, -0.2), TerrainKind::Stone);
        assert_eq!(classify(0.2, 0.0, 0.0, -0.2), TerrainKind::Grass);
        assert_eq!(classify(0.2, -0.8, 0.0, -0.2), TerrainKind::Snow);
        assert_eq!(classify(0.2, 0.8, -0.8, -0.2), TerrainKind::Sand);
    }

    #[test]
    fn summary_counts_every_tile() {
        let generator = TerrainGenerator::new(&default_params());
        let counts = terrain_summary(&generator, 1);
        let total: u32 = counts.values().sum();
        assert_eq!(total as usize, 9 * CHUNK_AREA);
    }
}
