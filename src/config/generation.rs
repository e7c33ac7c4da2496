use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters used to procedurally generate terrain and initial population.
/// Stored with the world so every chunk generated later in the session uses
/// the same inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub seed: u64,
    #[serde(default = "default_terrain_scale")]
    pub terrain_scale: f64,
    #[serde(default = "default_climate_scale")]
    pub climate_scale: f64,
    #[serde(default = "default_sea_level")]
    pub sea_level: f32,
    #[serde(default = "default_vegetation_density")]
    pub vegetation_density: f32,
    #[serde(default = "default_structure_density")]
    pub structure_density: f32,
    #[serde(default = "default_animal_density")]
    pub animal_density: f32,
    #[serde(default = "default_monster_density")]
    pub monster_density: f32,
    #[serde(default = "default_trader_density")]
    pub trader_density: f32,
}

fn default_terrain_scale() -> f64 {
    0.045
}
fn default_climate_scale() -> f64 {
    0.012
}
fn default_sea_level() -> f32 {
    -0.2
}
fn default_vegetation_density() -> f32 {
    0.12
}
fn default_structure_density() -> f32 {
    0.004
}
fn default_animal_density() -> f32 {
    0.015
}
fn default_monster_density() -> f32 {
    0.004
}
fn default_trader_density() -> f32 {
    0.001
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            seed: 0,
            terrain_scale: default_terrain_scale(),
            climate_scale: default_climate_scale(),
            sea_level: default_sea_level(),
            vegetation_density: default_vegetation_density(),
            structure_density: default_structure_density(),
            animal_density: default_animal_density(),
            monster_density: default_monster_density(),
            trader_density: default_trader_density(),
        }
    }
}

impl GenerationParams {
    /// Load generation parameters from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let params: Self = toml::from_str(&content)
            .map_err(|e| format!("Invalid TOML in {}: {}", path.display(), e))?;
        params.validate()?;
        Ok(params)
    }

    /// Parameters with every spawn roll disabled: bare terrain only.
    pub fn barren(seed: u64) -> Self {
        GenerationParams {
            seed,
            vegetation_density: 0.0,
            structure_density: 0.0,
            animal_density: 0.0,
            monster_density: 0.0,
            trader_density: 0.0,
            ..GenerationParams::default()
        }
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.terrain_scale > 0.0 && self.terrain_scale <= 1.0) {
            return Err(format!(
                "terrain_scale must be in (0.0, 1.0], got {}",
                self.terrain_scale
            ));
        }
        if !(self.climate_scale > 0.0 && self.climate_scale <= 1.0) {
            return Err(format!(
                "climate_scale must be in (0.0, 1.0], got {}",
                self.climate_scale
            ));
        }
        if !(-1.0..=1.0).contains(&self.sea_level) {
            return Err(format!(
                "sea_level must be -1.0-1.0, got {}",
                self.sea_level
            ));
        }
        let densities = [
            ("vegetation_density", self.vegetation_density),
            ("structure_density", self.structure_density),
            ("animal_density", self.animal_density),
            ("monster_density", self.monster_density),
            ("trader_density", self.trader_density),
        ];
        for (name, value) in densities {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be 0.0-1.0, got {}", name, value));
            }
        }
        let spawn_total = self.animal_density + self.monster_density + self.trader_density;
        if spawn_total > 0.5 {
            return Err(format!(
                "animal_density + monster_density + trader_density must be <= 0.5, got {}",
                spawn_total
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_params_are_valid() {
        GenerationParams::default().validate().unwrap();
        GenerationParams::barren(7).validate().unwrap();
    }

    #[test]
    fn invalid_terrain_scale() {
        let params = GenerationParams {
            terrain_scale: 0.0,
            ..GenerationParams::default()
        };
        let err = params.validate().unwrap_err();
        assert!(
            err.contains("terrain_scale"),
            "Error should mention terrain_scale: {}",
            err
        );
    }

    #[test]
    fn invalid_density() {
        let params = GenerationParams {
            vegetation_density: 1.5,
            ..GenerationParams::default()
        };
        let err = params.validate().unwrap_err();
        assert!(err.contains("vegetation_density"), "Error: {}", err);
    }

    #[test]
    fn spawn_densities_capped_together() {
        let params = GenerationParams {
            animal_density: 0.3,
            monster_density: 0.3,
            ..GenerationParams::default()
        };
        let err = params.validate().unwrap_err();
        assert!(err.contains("animal_density + monster_density"), "Error: {}", err);
    }

    #[test]
    fn from_toml_string_uses_defaults() {
        let params: GenerationParams = toml::from_str("seed = 42").unwrap();
        assert_eq!(params.seed, 42);
        assert_eq!(params.terrain_scale, 0.045);
        assert_eq!(params.sea_level, -0.2);
        params.validate().unwrap();
    }

    #[test]
    fn from_file_valid() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmpfile,
            r#"
seed = 9
terrain_scale = 0.08
sea_level = -0.1
animal_density = 0.05
"#
        )
        .unwrap();

        let params = GenerationParams::from_file(tmpfile.path()).unwrap();
        assert_eq!(params.seed, 9);
        assert_eq!(params.terrain_scale, 0.08);
        assert_eq!(params.animal_density, 0.05);
    }

    #[test]
    fn from_file_missing() {
        let err = GenerationParams::from_file(Path::new("/nonexistent/file.toml")).unwrap_err();
        assert!(err.contains("Cannot read"), "Error: {}", err);
    }

    #[test]
    fn from_file_invalid_toml() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "this is not valid toml {{{{").unwrap();

        let err = GenerationParams::from_file(tmpfile.path()).unwrap_err();
        assert!(err.contains("Invalid TOML"), "Error: {}", err);
    }

    #[test]
    fn from_file_out_of_range() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "seed = 1\nsea_level = 3.0\n").unwrap();

        let err = GenerationParams::from_file(tmpfile.path()).unwrap_err();
        assert!(err.contains("sea_level"), "Error: {}", err);
    }
}
