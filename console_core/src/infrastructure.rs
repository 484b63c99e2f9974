//! Cached infrastructure markers (gateways, mobile towers, toll gates) and
//! the intents that mutate them upstream.
//!
//! The cache is read-only from the console's point of view: it is replaced
//! wholesale by each accepted stats poll and otherwise only shrinks when the
//! operator confirms a delete.

use crowd_schema::{GatewayCreate, InfraStatEntry, InfraStats, MobileTowerCreate, TollGateCreate};
use tracing::{debug, info};

use crate::gateway::{InfraAddRequest, OutboundRequest};
use crate::geo::LatLon;
use crate::schedule::{RequestStamp, StampSequencer};

/// Coverage radius used when the operator's radius text is absent or unusable.
pub const DEFAULT_TOWER_RADIUS: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfraKind {
    Gateway,
    Tower,
    Toll,
}

impl InfraKind {
    pub const ALL: [InfraKind; 3] = [InfraKind::Gateway, InfraKind::Tower, InfraKind::Toll];

    pub fn label(&self) -> &'static str {
        match self {
            InfraKind::Gateway => "gateway",
            InfraKind::Tower => "tower",
            InfraKind::Toll => "toll",
        }
    }

    pub fn collection_path(&self) -> &'static str {
        match self {
            InfraKind::Gateway => "/gateways",
            InfraKind::Tower => "/mobile-towers",
            InfraKind::Toll => "/toll-gates",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "gateway" | "gw" | "gate" => Some(InfraKind::Gateway),
            "tower" | "mobile-tower" | "twr" => Some(InfraKind::Tower),
            "toll" | "toll-gate" | "tollgate" => Some(InfraKind::Toll),
            _ => None,
        }
    }

    fn index(&self) -> usize {
        match self {
            InfraKind::Gateway => 0,
            InfraKind::Tower => 1,
            InfraKind::Toll => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InfraAttributes {
    Gateway,
    Tower { radius: f64 },
    Toll { fee: Option<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructureRecord {
    pub id: String,
    pub kind: InfraKind,
    pub name: Option<String>,
    pub position: LatLon,
    pub attributes: InfraAttributes,
    /// Supplied by the stats source; never computed locally.
    pub nearby_agents: u32,
}

impl InfrastructureRecord {
    fn from_entry(kind: InfraKind, entry: &InfraStatEntry) -> Self {
        let attributes = match kind {
            InfraKind::Gateway => InfraAttributes::Gateway,
            InfraKind::Tower => InfraAttributes::Tower {
                radius: entry
                    .radius
                    .filter(|radius| radius.is_finite() && *radius > 0.0)
                    .unwrap_or(DEFAULT_TOWER_RADIUS),
            },
            InfraKind::Toll => InfraAttributes::Toll { fee: entry.fee },
        };
        Self {
            id: entry.id.clone(),
            kind,
            name: entry.name.clone(),
            position: LatLon::new(entry.lat, entry.lon),
            attributes,
            nearby_agents: entry.nearby_agents,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Parses operator radius text, substituting `default` for anything that is
/// not a positive finite number.
pub fn parse_radius(text: Option<&str>, default: f64) -> f64 {
    text.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|radius| radius.is_finite() && *radius > 0.0)
        .unwrap_or(default)
}

/// Parses operator fee text; unusable input means no fee.
pub fn parse_fee(text: Option<&str>) -> Option<f64> {
    text.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|fee| fee.is_finite() && *fee >= 0.0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    pub kind: InfraKind,
    pub id: String,
    pub name: String,
}

#[derive(Debug)]
pub struct InfrastructureOverlay {
    groups: [Vec<InfrastructureRecord>; 3],
    agent_count: Option<u32>,
    sequencer: StampSequencer,
    radius_text: Option<String>,
    fee_text: Option<String>,
    default_tower_radius: f64,
    pending_delete: Option<PendingDelete>,
}

impl Default for InfrastructureOverlay {
    fn default() -> Self {
        Self::new(DEFAULT_TOWER_RADIUS)
    }
}

impl InfrastructureOverlay {
    pub fn new(default_tower_radius: f64) -> Self {
        let default_tower_radius = if default_tower_radius.is_finite() && default_tower_radius > 0.0 {
            default_tower_radius
        } else {
            DEFAULT_TOWER_RADIUS
        };
        Self {
            groups: [Vec::new(), Vec::new(), Vec::new()],
            agent_count: None,
            sequencer: StampSequencer::new(),
            radius_text: None,
            fee_text: None,
            default_tower_radius,
            pending_delete: None,
        }
    }

    pub fn records(&self, kind: InfraKind) -> &[InfrastructureRecord] {
        &self.groups[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &InfrastructureRecord> {
        self.groups.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn agent_count(&self) -> Option<u32> {
        self.agent_count
    }

    pub fn refresh_request(&mut self) -> OutboundRequest {
        OutboundRequest::FetchInfraStats {
            stamp: self.sequencer.issue(),
        }
    }

    /// Rebuilds all three groups from `stats` unless a newer poll has already
    /// been applied. Returns whether the stats were applied.
    pub fn apply_stats(&mut self, stamp: RequestStamp, stats: &InfraStats) -> bool {
        if !self.sequencer.accept(stamp) {
            debug!(
                target: "crowd_console::infra",
                stamp = stamp.0,
                "infra.stats_superseded"
            );
            return false;
        }
        let rebuild = |kind: InfraKind, entries: &[InfraStatEntry]| -> Vec<InfrastructureRecord> {
            entries
                .iter()
                .filter(|entry| entry.lat.is_finite() && entry.lon.is_finite())
                .map(|entry| InfrastructureRecord::from_entry(kind, entry))
                .collect()
        };
        self.groups = [
            rebuild(InfraKind::Gateway, &stats.gateways),
            rebuild(InfraKind::Tower, &stats.mobile_towers),
            rebuild(InfraKind::Toll, &stats.toll_gates),
        ];
        self.agent_count = stats.agent_count;
        debug!(
            target: "crowd_console::infra",
            gateways = self.groups[0].len(),
            towers = self.groups[1].len(),
            tolls = self.groups[2].len(),
            "infra.stats_applied"
        );
        true
    }

    pub fn set_radius_text(&mut self, text: Option<String>) {
        self.radius_text = text;
    }

    pub fn set_fee_text(&mut self, text: Option<String>) {
        self.fee_text = text;
    }

    pub fn radius_text(&self) -> Option<&str> {
        self.radius_text.as_deref()
    }

    pub fn fee_text(&self) -> Option<&str> {
        self.fee_text.as_deref()
    }

    /// Builds the add payload for a placement click. Malformed radius or fee
    /// text never blocks placement.
    pub fn placement(&self, kind: InfraKind, at: LatLon) -> InfraAddRequest {
        match kind {
            InfraKind::Gateway => InfraAddRequest::Gateway(GatewayCreate {
                lon: at.lon,
                lat: at.lat,
                name: None,
            }),
            InfraKind::Tower => {
                let radius = parse_radius(self.radius_text.as_deref(), self.default_tower_radius);
                InfraAddRequest::Tower(MobileTowerCreate {
                    lon: at.lon,
                    lat: at.lat,
                    radius,
                    name: None,
                })
            }
            InfraKind::Toll => InfraAddRequest::Toll(TollGateCreate {
                lon: at.lon,
                lat: at.lat,
                fee: parse_fee(self.fee_text.as_deref()),
                name: None,
            }),
        }
    }

    /// Nearest marker within `tolerance` degrees of `point`.
    pub fn marker_at(&self, point: LatLon, tolerance: f64) -> Option<&InfrastructureRecord> {
        self.iter()
            .map(|record| (record, record.position.approx_distance_deg(&point)))
            .filter(|(_, distance)| *distance <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(record, _)| record)
    }

    /// Stages a delete that waits for operator confirmation.
    pub fn request_delete(&mut self, kind: InfraKind, id: &str) -> Option<&PendingDelete> {
        let record = self.records(kind).iter().find(|record| record.id == id)?;
        let pending = PendingDelete {
            kind,
            id: record.id.clone(),
            name: record.display_name().to_string(),
        };
        self.pending_delete = Some(pending);
        self.pending_delete.as_ref()
    }

    pub fn pending_delete(&self) -> Option<&PendingDelete> {
        self.pending_delete.as_ref()
    }

    pub fn cancel_delete(&mut self) -> Option<PendingDelete> {
        self.pending_delete.take()
    }

    /// Emits the delete intent and drops the marker from the cache. Polls
    /// issued before the delete can no longer land; the refresh follows the
    /// acknowledgement.
    pub fn confirm_delete(&mut self) -> Vec<OutboundRequest> {
        let Some(pending) = self.pending_delete.take() else {
            return Vec::new();
        };
        self.groups[pending.kind.index()].retain(|record| record.id != pending.id);
        self.sequencer.invalidate();
        info!(
            target: "crowd_console::infra",
            kind = pending.kind.label(),
            id = %pending.id,
            "infra.delete_confirmed"
        );
        vec![OutboundRequest::DeleteInfrastructure {
            kind: pending.kind,
            id: pending.id,
        }]
    }
}
