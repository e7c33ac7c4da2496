use tracing::trace;

use crate::config::simulation::SimulationConfig;
use crate::world::coords::TilePos;
use crate::world::tile::{Poi, PoiKind, Structure, TerrainKind};
use crate::world::World;

/// What changed during one environment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvironmentReport {
    pub regrown: u32,
    pub matured: u32,
    pub frames_advanced: u32,
}

/// Advance timers on every tile of the active set: dirt regrowth, sapling
/// growth, and point-of-interest animation. Only terrain or occupancy
/// changes invalidate the visibility window.
pub fn update_environment(
    world: &mut World,
    active: &[TilePos],
    dt: f32,
    config: &SimulationConfig,
) -> EnvironmentReport {
    let mut report = EnvironmentReport::default();
    let player = world.player();

    for &pos in active {
        let tile = world.tile_mut(pos);

        if let Some(regrowth) = tile.regrowth.as_mut() {
            if tile.kind != TerrainKind::Dirt {
                tile.regrowth = None;
            } else if regrowth.advance(dt) {
                tile.kind = TerrainKind::Grass;
                tile.prev_kind = None;
                tile.regrowth = None;
                report.regrown += 1;
            }
        }

        if let Some(cover) = tile.cover.as_mut() {
            if cover.kind == PoiKind::Sapling {
                cover.growth += dt;
                let trodden = tile.structure.is_some() || player == Some(pos);
                if cover.growth >= config.sapling_growth_secs && !trodden {
                    let grown = if tile.kind == TerrainKind::Sand {
                        PoiKind::Cactus
                    } else {
                        PoiKind::Tree
                    };
                    tile.cover = None;
                    tile.structure = Some(Structure::PointOfInterest(Poi::new(grown)));
                    report.matured += 1;
                }
            }
        }

        if let Some(Structure::PointOfInterest(poi)) = tile.structure.as_mut() {
            if poi.kind.is_animated() {
                poi.frame_timer += dt;
                while poi.frame_timer >= config.poi_frame_secs {
                    poi.frame_timer -= config.poi_frame_secs;
                    poi.frame = (poi.frame + 1) % poi.kind.frame_count();
                    report.frames_advanced += 1;
                }
            }
        }
    }

    if report.regrown > 0 || report.matured > 0 {
        world.invalidate_visibility();
        trace!(regrown = report.regrown, matured = report.matured, "Environment changed terrain");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generation::GenerationParams;
    use crate::world::visibility::ViewRect;

    fn setup() -> (World, SimulationConfig) {
        let config = SimulationConfig {
            dirt_regrowth_secs: 1.0,
            sapling_growth_secs: 2.0,
            poi_frame_secs: 0.25,
            ..SimulationConfig::default()
        };
        let mut world = World::new(&GenerationParams::barren(21), &config);
        for x in 0..4 {
            world.set_tile(TilePos::new(x, 0), TerrainKind::Grass);
        }
        (world, config)
    }

    #[test]
    fn dirt_regrows_to_grass() {
        let (mut world, config) = setup();
        let pos = TilePos::new(0, 0);
        world.set_tile(pos, TerrainKind::Dirt);

        let report = update_environment(&mut world, &[pos], 0.6, &config);
        assert_eq!(report.regrown, 0);
        assert_eq!(world.tile(pos).kind, TerrainKind::Dirt);

        let report = update_environment(&mut world, &[pos], 0.6, &config);
        assert_eq!(report.regrown, 1);
        let tile = world.tile(pos);
        assert_eq!(tile.kind, TerrainKind::Grass);
        assert!(tile.regrowth.is_none());
        assert!(tile.modified);
    }

    #[test]
    fn overwriting_dirt_interrupts_regrowth() {
        let (mut world, config) = setup();
        let pos = TilePos::new(1, 0);
        world.set_tile(pos, TerrainKind::Dirt);
        update_environment(&mut world, &[pos], 0.6, &config);

        world.set_tile(pos, TerrainKind::Sand);
        update_environment(&mut world, &[pos], 5.0, &config);
        assert_eq!(world.tile(pos).kind, TerrainKind::Sand);

        world.set_tile(pos, TerrainKind::Dirt);
        update_environment(&mut world, &[pos], 0.6, &config);
        assert_eq!(world.tile(pos).kind, TerrainKind::Dirt, "new dirt restarts the timer");
    }

    #[test]
    fn tiles_outside_active_set_are_frozen() {
        let (mut world, config) = setup();
        let inside = TilePos::new(0, 0);
        let outside = TilePos::new(3, 0);
        world.set_tile(inside, TerrainKind::Dirt);
        world.set_tile(outside, TerrainKind::Dirt);
        update_environment(&mut world, &[inside], 2.0, &config);
        assert_eq!(world.tile(inside).kind, TerrainKind::Grass);
        assert_eq!(world.tile(outside).kind, TerrainKind::Dirt);
    }

    #[test]
    fn sapling_matures_unless_occupied() {
        let (mut world, config) = setup();
        let free = TilePos::new(0, 0);
        let trodden = TilePos::new(2, 0);
        let underfoot = TilePos::new(3, 0);
        for pos in [free, trodden, underfoot] {
            world.tile_mut(pos).place_poi(Poi::new(PoiKind::Sapling));
        }
        world
            .spawn_agent(crate::agent::Species::Sheep, trodden)
            .unwrap();
        world.set_player(Some(underfoot));

        let report = update_environment(&mut world, &[free, trodden, underfoot], 2.5, &config);
        assert_eq!(report.matured, 1);
        assert_eq!(world.tile(free).poi().map(|p| p.kind), Some(PoiKind::Tree));
        assert!(world.tile(free).cover.is_none());
        assert_eq!(world.tile(trodden).cover.as_ref().map(|p| p.kind), Some(PoiKind::Sapling));
        assert_eq!(world.tile(underfoot).cover.as_ref().map(|p| p.kind), Some(PoiKind::Sapling));
        assert!(world.tile(underfoot).is_walkable());
    }

    #[test]
    fn campfire_cycles_frames_without_invalidating() {
        let (mut world, config) = setup();
        let pos = TilePos::new(1, 0);
        world.tile_mut(pos).place_poi(Poi::new(PoiKind::Campfire));
        let rect = ViewRect::new(0, 0, 2, 1);
        world.active_tiles(rect);

        let report = update_environment(&mut world, &[pos], 1.1, &config);
        assert_eq!(report.frames_advanced, 4);
        assert_eq!(world.tile(pos).poi().unwrap().frame, 0);
        update_environment(&mut world, &[pos], 0.3, &config);
        assert_eq!(world.tile(pos).poi().unwrap().frame, 1);
        assert!(world.visibility().is_cached());
    }
}
