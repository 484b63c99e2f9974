//! Tracked entities decoded from the live subscription and their visual
//! encoding.

use crowd_schema::EntityPayload;

use crate::geo::LatLon;
use crate::style::{MarkerStyle, Rgb};

/// Lifecycle phase of an event attendee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventPhase {
    ToDest,
    Dwelling,
    Exiting,
    Settled,
    None,
}

impl EventPhase {
    pub fn parse(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            Some("to_dest") => EventPhase::ToDest,
            Some("dwelling") => EventPhase::Dwelling,
            Some("exiting") => EventPhase::Exiting,
            Some("settled") => EventPhase::Settled,
            _ => EventPhase::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventPhase::ToDest => "to_dest",
            EventPhase::Dwelling => "dwelling",
            EventPhase::Exiting => "exiting",
            EventPhase::Settled => "settled",
            EventPhase::None => "none",
        }
    }
}

/// Category of a tracked entity. Only event attendees carry a phase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityCategory {
    Random,
    Routed,
    Event(EventPhase),
    Other(String),
}

impl EntityCategory {
    pub fn from_wire(kind: &str, phase: Option<&str>) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "random" => EntityCategory::Random,
            "routed" => EntityCategory::Routed,
            "event" => EntityCategory::Event(EventPhase::parse(phase)),
            other => EntityCategory::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            EntityCategory::Random => "random",
            EntityCategory::Routed => "routed",
            EntityCategory::Event(_) => "event",
            EntityCategory::Other(kind) => kind.as_str(),
        }
    }

    pub fn phase(&self) -> EventPhase {
        match self {
            EntityCategory::Event(phase) => *phase,
            _ => EventPhase::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntity {
    pub id: String,
    pub position: LatLon,
    pub category: EntityCategory,
    pub stopped: bool,
}

impl TrackedEntity {
    pub fn from_payload(payload: &EntityPayload) -> Self {
        Self {
            id: payload.id.clone(),
            position: LatLon::new(payload.lat, payload.lon),
            category: EntityCategory::from_wire(&payload.kind, payload.phase.as_deref()),
            stopped: payload.stop.unwrap_or(false),
        }
    }

    /// Resolves the marker style with precedence
    /// event phase > stopped > category > default.
    pub fn marker_style(&self) -> MarkerStyle {
        if let EntityCategory::Event(phase) = self.category {
            if let Some(fill) = phase_fill(phase) {
                return MarkerStyle::new(fill, PHASE_RADIUS);
            }
        }
        if self.stopped {
            return MarkerStyle::new(STOPPED_FILL, BASE_RADIUS);
        }
        match self.category {
            EntityCategory::Random => MarkerStyle::new(RANDOM_FILL, BASE_RADIUS),
            EntityCategory::Routed => MarkerStyle::new(ROUTED_FILL, BASE_RADIUS),
            EntityCategory::Event(_) => MarkerStyle::new(EVENT_FILL, BASE_RADIUS),
            EntityCategory::Other(_) => MarkerStyle::new(DEFAULT_FILL, BASE_RADIUS),
        }
    }
}

pub const BASE_RADIUS: f32 = 3.0;
pub const PHASE_RADIUS: f32 = 4.0;

pub const TO_DEST_FILL: Rgb = Rgb::new(249, 115, 22);
pub const DWELLING_FILL: Rgb = Rgb::new(168, 85, 247);
pub const EXITING_FILL: Rgb = Rgb::new(100, 116, 139);
pub const SETTLED_FILL: Rgb = Rgb::new(20, 184, 166);
pub const STOPPED_FILL: Rgb = Rgb::new(239, 68, 68);
pub const RANDOM_FILL: Rgb = Rgb::new(59, 130, 246);
pub const ROUTED_FILL: Rgb = Rgb::new(34, 197, 94);
pub const EVENT_FILL: Rgb = Rgb::new(236, 72, 153);
pub const DEFAULT_FILL: Rgb = Rgb::new(229, 231, 235);

fn phase_fill(phase: EventPhase) -> Option<Rgb> {
    match phase {
        EventPhase::ToDest => Some(TO_DEST_FILL),
        EventPhase::Dwelling => Some(DWELLING_FILL),
        EventPhase::Exiting => Some(EXITING_FILL),
        EventPhase::Settled => Some(SETTLED_FILL),
        EventPhase::None => None,
    }
}
