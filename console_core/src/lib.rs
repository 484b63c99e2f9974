//! Real-time state reconciliation and interaction engine for the crowd
//! operations console.
//!
//! The crate performs no I/O. Inputs arrive as [`ConsoleEvent`]s and every
//! side effect leaves as an [`OutboundRequest`] for a [`CommandGateway`] to
//! deliver.

pub mod command_text;
pub mod config;
pub mod console;
pub mod density;
pub mod entity;
pub mod gateway;
pub mod geo;
pub mod infrastructure;
pub mod interaction;
pub mod reconciler;
pub mod route_flow;
pub mod schedule;
pub mod status;
pub mod style;

pub use crowd_schema as wire;

pub use command_text::{parse_command_line, CommandParseError, ConsoleCommand};
pub use config::{load_console_config, ConfigError, ConsoleConfig, ConsoleConfigMetadata};
pub use console::{ConsoleEvent, ConsoleState};
pub use density::{
    CellIndex, DensityFeature, DensityLayer, DensityLayerRenderer, DensityShape, DensityStatus,
    NoCellIndex, WeightedCell,
};
pub use entity::{EntityCategory, EventPhase, TrackedEntity};
pub use gateway::{
    CommandGateway, CommandKind, Completion, Endpoint, HttpMethod, OutboundRequest, Service,
    TransportError,
};
pub use geo::{GeoBounds, LatLon};
pub use infrastructure::{InfraKind, InfrastructureOverlay, InfrastructureRecord};
pub use interaction::{ClickOutcome, InteractionMode, InteractionModeController, ModeCommand};
pub use reconciler::{EntityMarker, ReconcileStats, SnapshotReconciler};
pub use route_flow::{PreviewDisposition, PreviewTicket, RouteSelectionFlow};
pub use schedule::{PollTimer, RequestStamp, StampSequencer};
pub use status::{StatusLevel, StatusMessage, TransientStatus};
pub use style::{MarkerStyle, Rgb};
