use serde::Deserialize;
use std::path::Path;

/// Largest accepted view width or height, in tiles.
pub const MAX_VIEW_EXTENT: u32 = 4096;
/// Largest accepted view padding, in tiles.
pub const MAX_VIEW_PADDING: u32 = 1024;
/// Largest accepted active radius, in tiles.
pub const MAX_ACTIVE_RADIUS: u32 = 4096;

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_view_width")]
    pub view_width: u32,
    #[serde(default = "default_view_height")]
    pub view_height: u32,
    #[serde(default = "default_view_padding")]
    pub view_padding: u32,
    #[serde(default = "default_active_radius")]
    pub active_radius: u32,
    #[serde(default = "default_dirt_regrowth_secs")]
    pub dirt_regrowth_secs: f32,
    #[serde(default = "default_sapling_growth_secs")]
    pub sapling_growth_secs: f32,
    #[serde(default = "default_poi_frame_secs")]
    pub poi_frame_secs: f32,
    #[serde(default = "default_decision_window_ticks")]
    pub decision_window_ticks: u64,
    #[serde(default = "default_retry_fraction")]
    pub retry_fraction: f32,
    #[serde(default = "default_stuck_threshold_secs")]
    pub stuck_threshold_secs: f32,
    #[serde(default = "default_breeding_cooldown_secs")]
    pub breeding_cooldown_secs: f32,
    #[serde(default = "default_max_agents_per_chunk")]
    pub max_agents_per_chunk: usize,
    #[serde(default = "default_flee_secs")]
    pub flee_secs: f32,
    #[serde(default = "default_aggro_radius")]
    pub aggro_radius: u32,
    #[serde(default = "default_follow_radius")]
    pub follow_radius: u32,
}

fn default_tick_rate() -> f32 {
    10.0
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_view_width() -> u32 {
    32
}
fn default_view_height() -> u32 {
    24
}
fn default_view_padding() -> u32 {
    2
}
fn default_active_radius() -> u32 {
    24
}
fn default_dirt_regrowth_secs() -> f32 {
    30.0
}
fn default_sapling_growth_secs() -> f32 {
    90.0
}
fn default_poi_frame_secs() -> f32 {
    0.25
}
fn default_decision_window_ticks() -> u64 {
    5
}
fn default_retry_fraction() -> f32 {
    0.25
}
fn default_stuck_threshold_secs() -> f32 {
    3.0
}
fn default_breeding_cooldown_secs() -> f32 {
    45.0
}
fn default_max_agents_per_chunk() -> usize {
    12
}
fn default_flee_secs() -> f32 {
    4.0
}
fn default_aggro_radius() -> u32 {
    6
}
fn default_follow_radius() -> u32 {
    8
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            tick_rate_hz: default_tick_rate(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            view_width: default_view_width(),
            view_height: default_view_height(),
            view_padding: default_view_padding(),
            active_radius: default_active_radius(),
            dirt_regrowth_secs: default_dirt_regrowth_secs(),
            sapling_growth_secs: default_sapling_growth_secs(),
            poi_frame_secs: default_poi_frame_secs(),
            decision_window_ticks: default_decision_window_ticks(),
            retry_fraction: default_retry_fraction(),
            stuck_threshold_secs: default_stuck_threshold_secs(),
            breeding_cooldown_secs: default_breeding_cooldown_secs(),
            max_agents_per_chunk: default_max_agents_per_chunk(),
            flee_secs: default_flee_secs(),
            aggro_radius: default_aggro_radius(),
            follow_radius: default_follow_radius(),
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: SimulationConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.tick_rate_hz <= 0.0 {
            errors.push(format!(
                "tick_rate_hz must be > 0.0, got {}. Example: tick_rate_hz = 10.0",
                self.tick_rate_hz
            ));
        }

        if self.view_width == 0 || self.view_height == 0 {
            errors.push(format!(
                "view_width and view_height must be > 0, got {}x{}. Example: view_width = 32",
                self.view_width, self.view_height
            ));
        }

        if self.view_width > MAX_VIEW_EXTENT || self.view_height > MAX_VIEW_EXTENT {
            errors.push(format!(
                "view_width and view_height must be <= {}, got {}x{}",
                MAX_VIEW_EXTENT, self.view_width, self.view_height
            ));
        }

        if self.view_padding > MAX_VIEW_PADDING {
            errors.push(format!(
                "view_padding must be <= {}, got {}. Example: view_padding = 2",
                MAX_VIEW_PADDING, self.view_padding
            ));
        }

        if self.active_radius == 0 || self.active_radius > MAX_ACTIVE_RADIUS {
            errors.push(format!(
                "active_radius must be in 1..={}, got {}. Example: active_radius = 24",
                MAX_ACTIVE_RADIUS, self.active_radius
            ));
        }

        let durations = [
            ("dirt_regrowth_secs", self.dirt_regrowth_secs),
            ("sapling_growth_secs", self.sapling_growth_secs),
            ("poi_frame_secs", self.poi_frame_secs),
            ("stuck_threshold_secs", self.stuck_threshold_secs),
            ("flee_secs", self.flee_secs),
        ];
        for (name, value) in durations {
            if value <= 0.0 {
                errors.push(format!("{} must be > 0.0, got {}", name, value));
            }
        }

        if self.breeding_cooldown_secs < 0.0 {
            errors.push(format!(
                "breeding_cooldown_secs must be >= 0.0, got {}. Example: breeding_cooldown_secs = 45.0",
                self.breeding_cooldown_secs
            ));
        }

        if self.decision_window_ticks == 0 {
            errors.push(format!(
                "decision_window_ticks must be > 0, got {}. Example: decision_window_ticks = 5",
                self.decision_window_ticks
            ));
        }

        if !(self.retry_fraction > 0.0 && self.retry_fraction <= 1.0) {
            errors.push(format!(
                "retry_fraction must be in (0.0, 1.0], got {}. Example: retry_fraction = 0.25",
                self.retry_fraction
            ));
        }

        if self.max_agents_per_chunk == 0 {
            errors.push(format!(
                "max_agents_per_chunk must be > 0, got {}. Example: max_agents_per_chunk = 12",
                self.max_agents_per_chunk
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            errors.push(format!(
                "log_format must be one of {:?}, got '{}'. Example: log_format = \"text\"",
                valid_formats, self.log_format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }

    /// Seconds per tick at the configured rate.
    pub fn tick_seconds(&self) -> f32 {
        1.0 / self.tick_rate_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn test_path() -> PathBuf {
        PathBuf::from("test-config.toml")
    }

    #[test]
    fn valid_config_loads_all_fields() {
        let toml = r#"
            tick_rate_hz = 20.0
            log_level = "debug"
            log_format = "json"
            view_width = 40
            view_height = 30
            view_padding = 4
            active_radius = 16
            dirt_regrowth_secs = 12.5
            decision_window_ticks = 3
            retry_fraction = 0.5
            stuck_threshold_secs = 2.0
            breeding_cooldown_secs = 10.0
            max_agents_per_chunk = 6
        "#;
        let config = SimulationConfig::from_toml_str(toml, &test_path()).unwrap();
        assert_eq!(config.tick_rate_hz, 20.0);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, "json");
        assert_eq!(config.view_width, 40);
        assert_eq!(config.view_height, 30);
        assert_eq!(config.view_padding, 4);
        assert_eq!(config.active_radius, 16);
        assert_eq!(config.dirt_regrowth_secs, 12.5);
        assert_eq!(config.decision_window_ticks, 3);
        assert_eq!(config.retry_fraction, 0.5);
        assert_eq!(config.stuck_threshold_secs, 2.0);
        assert_eq!(config.breeding_cooldown_secs, 10.0);
        assert_eq!(config.max_agents_per_chunk, 6);
    }

    #[test]
    fn defaults_applied_for_empty_config() {
        let config = SimulationConfig::from_toml_str("", &test_path()).unwrap();
        let default = SimulationConfig::default();
        assert_eq!(config.tick_rate_hz, default.tick_rate_hz);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, "text");
        assert_eq!(config.view_width, 32);
        assert_eq!(config.view_height, 24);
        assert_eq!(config.active_radius, 24);
        assert_eq!(config.dirt_regrowth_secs, 30.0);
        assert_eq!(config.decision_window_ticks, 5);
        assert_eq!(config.max_agents_per_chunk, default.max_agents_per_chunk);
        default.validate().unwrap();
    }

    #[test]
    fn invalid_tick_rate_rejected() {
        let err = SimulationConfig::from_toml_str("tick_rate_hz = -1.0", &test_path()).unwrap_err();
        assert!(err.contains("tick_rate_hz"));
        assert!(err.contains("> 0.0"));
    }

    #[test]
    fn invalid_retry_fraction_rejected() {
        let err =
            SimulationConfig::from_toml_str("retry_fraction = 1.5", &test_path()).unwrap_err();
        assert!(err.contains("retry_fraction"));
    }

    #[test]
    fn invalid_log_level_rejected() {
        let err =
            SimulationConfig::from_toml_str(r#"log_level = "verbose""#, &test_path()).unwrap_err();
        assert!(err.contains("log_level"));
    }

    #[test]
    fn invalid_log_format_rejected() {
        let err =
            SimulationConfig::from_toml_str(r#"log_format = "xml""#, &test_path()).unwrap_err();
        assert!(err.contains("log_format"));
    }

    #[test]
    fn oversized_view_and_radius_rejected() {
        let toml = "view_width = 5000000000\n";
        assert!(SimulationConfig::from_toml_str(toml, &test_path()).is_err());

        let toml = "view_width = 100000\nview_padding = 3000000000\nactive_radius = 4294967295";
        let err = SimulationConfig::from_toml_str(toml, &test_path()).unwrap_err();
        assert!(err.contains("view_width"));
        assert!(err.contains("view_padding"));
        assert!(err.contains("active_radius"));

        let toml = "view_width = 4096\nview_height = 4096\nview_padding = 1024\nactive_radius = 4096";
        SimulationConfig::from_toml_str(toml, &test_path()).unwrap();
    }

    #[test]
    fn multiple_errors_reported_together() {
        let toml = "tick_rate_hz = 0.0\nactive_radius = 0\ndirt_regrowth_secs = 0.0";
        let err = SimulationConfig::from_toml_str(toml, &test_path()).unwrap_err();
        assert!(err.contains("tick_rate_hz"));
        assert!(err.contains("active_radius"));
        assert!(err.contains("dirt_regrowth_secs"));
    }

    #[test]
    fn malformed_toml_includes_source_path() {
        let err =
            SimulationConfig::from_toml_str("tick_rate_hz = [invalid", &test_path()).unwrap_err();
        assert!(err.contains("test-config.toml"));
    }

    #[test]
    fn from_file_loads_valid_config() {
        let mut tmp = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(tmp, "tick_rate_hz = 5.0").unwrap();
        let config = SimulationConfig::from_file(tmp.path()).unwrap();
        assert_eq!(config.tick_rate_hz, 5.0);
        assert!((config.tick_seconds() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn from_file_missing_file_error() {
        let err = SimulationConfig::from_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.contains("Cannot read"));
    }
}
