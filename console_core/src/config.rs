use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::density::{DensityPalette, DensityStyle};
use crate::geo::GeoBounds;
use crate::infrastructure::DEFAULT_TOWER_RADIUS;
use crate::style::Rgb;

pub const BUILTIN_CONSOLE_CONFIG: &str = include_str!("data/console_config.json");
pub const CONFIG_PATH_ENV: &str = "CROWD_CONSOLE_CONFIG_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    polling: PollingConfig,
    density: DensityConfig,
    infrastructure: InfrastructureConfig,
    status: StatusConfig,
    crowd: CrowdDefaults,
    viewport: Option<GeoBounds>,
}

impl ConsoleConfig {
    /// Parses the embedded defaults; a broken builtin degrades to the
    /// compiled-in section defaults.
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN_CONSOLE_CONFIG).unwrap_or_else(|err| {
            tracing::warn!(
                target: "crowd_console::config",
                error = %err,
                "console_config.builtin_invalid"
            );
            Self::default()
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = ConsoleConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn polling(&self) -> &PollingConfig {
        &self.polling
    }

    pub fn polling_mut(&mut self) -> &mut PollingConfig {
        &mut self.polling
    }

    pub fn density(&self) -> &DensityConfig {
        &self.density
    }

    pub fn infrastructure(&self) -> &InfrastructureConfig {
        &self.infrastructure
    }

    pub fn status(&self) -> &StatusConfig {
        &self.status
    }

    pub fn crowd(&self) -> &CrowdDefaults {
        &self.crowd
    }

    pub fn viewport(&self) -> GeoBounds {
        self.viewport.unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse console config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read console config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    infrastructure_ms: u64,
    status_ms: u64,
    density_ms: u64,
    density_auto_refresh: bool,
}

impl PollingConfig {
    pub fn infrastructure_interval(&self) -> Duration {
        Duration::from_millis(self.infrastructure_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_ms)
    }

    pub fn density_interval(&self) -> Duration {
        Duration::from_millis(self.density_ms)
    }

    pub fn density_auto_refresh(&self) -> bool {
        self.density_auto_refresh
    }

    pub fn set_density_auto_refresh(&mut self, enabled: bool) {
        self.density_auto_refresh = enabled;
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            infrastructure_ms: 2_000,
            status_ms: 3_000,
            density_ms: 10_000,
            density_auto_refresh: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    low: Rgb,
    mid: Rgb,
    high: Rgb,
    min_radius_m: f64,
    max_radius_m: f64,
}

impl DensityConfig {
    pub fn style(&self) -> DensityStyle {
        let (min_radius_m, max_radius_m) = if self.min_radius_m <= self.max_radius_m {
            (self.min_radius_m, self.max_radius_m)
        } else {
            (self.max_radius_m, self.min_radius_m)
        };
        DensityStyle {
            palette: DensityPalette {
                low: self.low,
                mid: self.mid,
                high: self.high,
            },
            min_radius_m,
            max_radius_m,
        }
    }
}

impl Default for DensityConfig {
    fn default() -> Self {
        let style = DensityStyle::default();
        Self {
            low: style.palette.low,
            mid: style.palette.mid,
            high: style.palette.high,
            min_radius_m: style.min_radius_m,
            max_radius_m: style.max_radius_m,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InfrastructureConfig {
    default_tower_radius: f64,
    hit_tolerance_deg: f64,
}

impl InfrastructureConfig {
    pub fn default_tower_radius(&self) -> f64 {
        if self.default_tower_radius.is_finite() && self.default_tower_radius > 0.0 {
            self.default_tower_radius
        } else {
            DEFAULT_TOWER_RADIUS
        }
    }

    pub fn hit_tolerance_deg(&self) -> f64 {
        self.hit_tolerance_deg.abs()
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            default_tower_radius: DEFAULT_TOWER_RADIUS,
            hit_tolerance_deg: 0.0015,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    ttl_ms: u64,
}

impl StatusConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { ttl_ms: 4_000 }
    }
}

/// Values used when an operator command omits its count or sizing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrowdDefaults {
    pub crowd_size: u32,
    pub route_crowd_size: u32,
    pub event_wave_size: u32,
    pub event_wave_interval_seconds: f64,
    pub event_dwell_min_seconds: f64,
    pub event_dwell_max_seconds: f64,
    pub traffic_target_agents: u32,
}

impl Default for CrowdDefaults {
    fn default() -> Self {
        Self {
            crowd_size: 50,
            route_crowd_size: 10,
            event_wave_size: 100,
            event_wave_interval_seconds: 10.0,
            event_dwell_min_seconds: 30.0,
            event_dwell_max_seconds: 90.0,
            traffic_target_agents: 200,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConsoleConfigMetadata {
    path: Option<PathBuf>,
}

impl ConsoleConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Loads from `explicit`, else `CROWD_CONSOLE_CONFIG_PATH`, else the builtin.
/// Unreadable or malformed files fall back to the builtin.
pub fn load_console_config(explicit: Option<&Path>) -> (ConsoleConfig, ConsoleConfigMetadata) {
    let override_path = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

    if let Some(path) = override_path {
        match ConsoleConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "crowd_console::config",
                    path = %path.display(),
                    "console_config.loaded=file"
                );
                return (config, ConsoleConfigMetadata::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "crowd_console::config",
                    path = %path.display(),
                    error = %err,
                    "console_config.load_failed"
                );
            }
        }
    }

    tracing::info!(
        target: "crowd_console::config",
        "console_config.loaded=builtin"
    );
    (ConsoleConfig::builtin(), ConsoleConfigMetadata::new(None))
}
