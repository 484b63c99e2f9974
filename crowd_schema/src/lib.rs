//! Wire contracts shared by the crowd operations console.
//!
//! Every payload exchanged with the simulation service and the density
//! predictor lives here so the console core can stay transport-agnostic.
//! Field names mirror the JSON the services speak; coordinate pairs inside
//! paths are `[lon, lat]`.

use serde::{Deserialize, Serialize};

/// One tracked entity as pushed on the live subscription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityPayload {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "type", default = "default_entity_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<bool>,
}

fn default_entity_type() -> String {
    "generic".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutePreviewRequest {
    pub source_lat: f64,
    pub source_lon: f64,
    pub dest_lat: f64,
    pub dest_lon: f64,
    pub number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RoutePreviewResponse {
    pub ok: bool,
    #[serde(default)]
    pub points: Vec<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrowdRequest {
    pub number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrowdRouteRequest {
    pub number: u32,
    pub source_lat: f64,
    pub source_lon: f64,
    pub dest_lat: f64,
    pub dest_lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayCreate {
    pub lon: f64,
    pub lat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MobileTowerCreate {
    pub lon: f64,
    pub lat: f64,
    pub radius: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TollGateCreate {
    pub lon: f64,
    pub lat: f64,
    /// Serialized as `null` when absent; the service accepts an optional fee.
    pub fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Aggregated infrastructure statistics (`/infra-stats`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InfraStats {
    #[serde(default)]
    pub gateways: Vec<InfraStatEntry>,
    #[serde(default)]
    pub mobile_towers: Vec<InfraStatEntry>,
    #[serde(default)]
    pub toll_gates: Vec<InfraStatEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InfraStatEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub nearby_agents: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventConfig {
    pub source_lat: f64,
    pub source_lon: f64,
    pub dest_lat: f64,
    pub dest_lon: f64,
    pub wave_size: u32,
    pub wave_interval_seconds: f64,
    pub dwell_min_seconds: f64,
    pub dwell_max_seconds: f64,
    pub exit_after_dwell: bool,
    /// `None` keeps launching waves until stopped.
    pub max_waves: Option<u32>,
}

impl EventConfig {
    pub fn between(source_lat: f64, source_lon: f64, dest_lat: f64, dest_lon: f64) -> Self {
        Self {
            source_lat,
            source_lon,
            dest_lat,
            dest_lon,
            wave_size: 100,
            wave_interval_seconds: 10.0,
            dwell_min_seconds: 30.0,
            dwell_max_seconds: 90.0,
            exit_after_dwell: true,
            max_waves: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EventStatus {
    pub active: bool,
    #[serde(default)]
    pub waves_launched: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomTrafficConfig {
    pub target_agents: u32,
    pub max_agents: u32,
    pub spawn_interval_seconds: f64,
    pub batch_min: u32,
    pub batch_max: u32,
    pub min_speed: f64,
    pub max_speed: f64,
}

impl Default for RandomTrafficConfig {
    fn default() -> Self {
        Self {
            target_agents: 200,
            max_agents: 400,
            spawn_interval_seconds: 2.0,
            batch_min: 5,
            batch_max: 15,
            min_speed: 0.0003,
            max_speed: 0.0008,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RandomTrafficStatus {
    pub active: bool,
    #[serde(default)]
    pub random_agent_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SpeedConfig {
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeedResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    pub multiplier: f64,
}

/// Generic acknowledgement returned by fire-and-forget commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AckResponse {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AckResponse {
    /// Commands that do not report `ok` are treated as accepted.
    pub fn accepted(&self) -> bool {
        self.ok.unwrap_or(true)
    }
}

/// Density prediction output (`/predict-live`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DensityResponse {
    #[serde(default)]
    pub generated_at: f64,
    #[serde(default)]
    pub total_weight: f64,
    #[serde(default)]
    pub tiles: Vec<DensityTile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DensityTile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h3_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norm_weight: Option<f64>,
}

pub fn decode_snapshot_json(data: &str) -> serde_json::Result<Vec<EntityPayload>> {
    serde_json::from_str(data)
}

pub fn encode_snapshot_json(entities: &[EntityPayload]) -> serde_json::Result<String> {
    serde_json::to_string(entities)
}

pub fn decode_infra_stats_json(data: &str) -> serde_json::Result<InfraStats> {
    serde_json::from_str(data)
}

pub fn decode_density_json(data: &str) -> serde_json::Result<DensityResponse> {
    serde_json::from_str(data)
}
