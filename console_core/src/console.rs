//! The console's single owned state object.
//!
//! Every input (pushed snapshots, map clicks, operator commands, transport
//! completions and timer ticks) arrives as a [`ConsoleEvent`] and is applied
//! by [`ConsoleState::update`] on one thread. The returned requests are handed
//! to a [`CommandGateway`](crate::gateway::CommandGateway) by the caller.

use std::time::Instant;

use crowd_schema::{
    CrowdRequest, EntityPayload, EventConfig, EventStatus, RandomTrafficConfig,
    RandomTrafficStatus, SpeedConfig,
};
use tracing::{debug, info, warn};

use crate::command_text::{ConsoleCommand, DensityAction, InfraAction};
use crate::config::ConsoleConfig;
use crate::density::{CellIndex, DensityLayerRenderer, DensityStatus};
use crate::gateway::{CommandKind, Completion, OutboundRequest, TransportError};
use crate::geo::LatLon;
use crate::infrastructure::{InfraKind, InfrastructureOverlay};
use crate::interaction::{ClickOutcome, InteractionModeController, ModeCommand};
use crate::reconciler::SnapshotReconciler;
use crate::route_flow::RouteSelectionFlow;
use crate::schedule::{PollTimer, StampSequencer};
use crate::status::{StatusMessage, TransientStatus};

pub const MIN_SPEED_MULTIPLIER: f64 = 0.01;
pub const MAX_SPEED_MULTIPLIER: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEvent {
    Snapshot(Vec<EntityPayload>),
    Click(LatLon),
    /// Secondary action (right-click) used to pick a marker for deletion.
    SecondaryClick(LatLon),
    Command(ConsoleCommand),
    Completion(Completion),
    Tick,
    SubscriptionLost,
}

#[derive(Debug)]
pub struct ConsoleState {
    config: ConsoleConfig,
    reconciler: SnapshotReconciler,
    controller: InteractionModeController,
    infrastructure: InfrastructureOverlay,
    density: DensityLayerRenderer,
    status: TransientStatus,
    infra_timer: PollTimer,
    status_timer: PollTimer,
    density_timer: PollTimer,
    event_sequencer: StampSequencer,
    traffic_sequencer: StampSequencer,
    event_status: Option<EventStatus>,
    traffic_status: Option<RandomTrafficStatus>,
    speed_multiplier: f64,
    connected: bool,
}

impl ConsoleState {
    pub fn new(config: ConsoleConfig) -> Self {
        let density = DensityLayerRenderer::new(config.density().style());
        Self::with_density(config, density)
    }

    /// Uses `index` to resolve density cell codes into boundaries.
    pub fn with_cell_index(config: ConsoleConfig, index: impl CellIndex + Send + 'static) -> Self {
        let density = DensityLayerRenderer::with_index(config.density().style(), index);
        Self::with_density(config, density)
    }

    fn with_density(config: ConsoleConfig, density: DensityLayerRenderer) -> Self {
        let polling = config.polling();
        Self {
            reconciler: SnapshotReconciler::new(),
            controller: InteractionModeController::new(),
            infrastructure: InfrastructureOverlay::new(
                config.infrastructure().default_tower_radius(),
            ),
            density,
            status: TransientStatus::new(config.status().ttl()),
            infra_timer: PollTimer::new(polling.infrastructure_interval()),
            status_timer: PollTimer::new(polling.status_interval()),
            density_timer: PollTimer::new(polling.density_interval()),
            event_sequencer: StampSequencer::new(),
            traffic_sequencer: StampSequencer::new(),
            event_status: None,
            traffic_status: None,
            speed_multiplier: 1.0,
            connected: false,
            config,
        }
    }

    /// Arms the poll timers; each fires on the first tick at or after `now`.
    pub fn start(&mut self, now: Instant) {
        self.infra_timer.start(now);
        self.status_timer.start(now);
        if self.config.polling().density_auto_refresh() {
            self.density_timer.start(now);
        }
        info!(
            target: "crowd_console::state",
            density_auto = self.density_timer.is_active(),
            "console.started"
        );
    }

    pub fn update(&mut self, event: ConsoleEvent, now: Instant) -> Vec<OutboundRequest> {
        match event {
            ConsoleEvent::Snapshot(payloads) => {
                if !self.connected {
                    info!(target: "crowd_console::state", "subscription.connected");
                }
                self.connected = true;
                self.reconciler.apply_payloads(&payloads);
                Vec::new()
            }
            ConsoleEvent::Click(at) => self.click(at),
            ConsoleEvent::SecondaryClick(at) => {
                self.secondary_click(at, now);
                Vec::new()
            }
            ConsoleEvent::Command(command) => self.command(command, now),
            ConsoleEvent::Completion(completion) => self.complete(completion, now),
            ConsoleEvent::Tick => self.tick(now),
            ConsoleEvent::SubscriptionLost => {
                if self.connected {
                    warn!(target: "crowd_console::state", "subscription.lost");
                }
                self.connected = false;
                Vec::new()
            }
        }
    }

    fn click(&mut self, at: LatLon) -> Vec<OutboundRequest> {
        if !at.is_finite() {
            return Vec::new();
        }
        match self.controller.click(at) {
            ClickOutcome::PlacementRequested { kind, at } => {
                vec![OutboundRequest::AddInfrastructure(
                    self.infrastructure.placement(kind, at),
                )]
            }
            ClickOutcome::DestinationSet(Some(ticket)) => {
                vec![OutboundRequest::RoutePreview { ticket }]
            }
            ClickOutcome::DestinationSet(None)
            | ClickOutcome::SourceSet
            | ClickOutcome::SelectionReset => Vec::new(),
        }
    }

    fn secondary_click(&mut self, at: LatLon, now: Instant) {
        let tolerance = self.config.infrastructure().hit_tolerance_deg();
        let Some((kind, id)) = self
            .infrastructure
            .marker_at(at, tolerance)
            .map(|record| (record.kind, record.id.clone()))
        else {
            return;
        };
        self.stage_delete(kind, &id, now);
    }

    fn stage_delete(&mut self, kind: InfraKind, id: &str, now: Instant) {
        match self.infrastructure.request_delete(kind, id) {
            Some(pending) => {
                let prompt = format!("delete {} {}? confirm or abort", kind.label(), pending.name);
                self.status.info(prompt, now);
            }
            None => self
                .status
                .error(format!("no {} with id {id}", kind.label()), now),
        }
    }

    fn command(&mut self, command: ConsoleCommand, now: Instant) -> Vec<OutboundRequest> {
        debug!(target: "crowd_console::state", ?command, "command.received");
        match command {
            ConsoleCommand::Mode(mode) => {
                self.controller.command(mode);
                Vec::new()
            }
            ConsoleCommand::Place { kind, value } => {
                match kind {
                    InfraKind::Tower if value.is_some() => self.infrastructure.set_radius_text(value),
                    InfraKind::Toll if value.is_some() => self.infrastructure.set_fee_text(value),
                    _ => {}
                }
                self.controller.command(ModeCommand::Place(kind));
                Vec::new()
            }
            ConsoleCommand::SetRadius(text) => {
                self.infrastructure.set_radius_text(text);
                Vec::new()
            }
            ConsoleCommand::SetFee(text) => {
                self.infrastructure.set_fee_text(text);
                Vec::new()
            }
            ConsoleCommand::AddCrowd(number) => {
                let number = count_or(number.as_deref(), self.config.crowd().crowd_size, "crowd size");
                vec![OutboundRequest::AddCrowd(CrowdRequest { number })]
            }
            ConsoleCommand::RouteCrowd(number) => {
                let number = count_or(
                    number.as_deref(),
                    self.config.crowd().route_crowd_size,
                    "route crowd size",
                );
                match self.route().route_crowd_request(number) {
                    Some(request) => vec![OutboundRequest::AddCrowdRoute(request)],
                    None => self.needs_route(now),
                }
            }
            ConsoleCommand::Preview => match self.route().ticket() {
                Some(ticket) => vec![OutboundRequest::RoutePreview { ticket }],
                None => self.needs_route(now),
            },
            ConsoleCommand::StartEvent {
                wave_size,
                interval_seconds,
            } => {
                let Some(ticket) = self.route().ticket() else {
                    return self.needs_route(now);
                };
                let defaults = self.config.crowd();
                let mut config = EventConfig::between(
                    ticket.source.lat,
                    ticket.source.lon,
                    ticket.destination.lat,
                    ticket.destination.lon,
                );
                config.wave_size =
                    count_or(wave_size.as_deref(), defaults.event_wave_size, "event wave size").max(1);
                config.wave_interval_seconds = interval_or(
                    interval_seconds.as_deref(),
                    defaults.event_wave_interval_seconds,
                );
                config.dwell_min_seconds = defaults.event_dwell_min_seconds;
                config.dwell_max_seconds = defaults
                    .event_dwell_max_seconds
                    .max(defaults.event_dwell_min_seconds);
                vec![OutboundRequest::StartEvent(config)]
            }
            ConsoleCommand::StopEvent => vec![OutboundRequest::StopEvent],
            ConsoleCommand::StartTraffic { target } => {
                let target_agents = count_or(
                    target.as_deref(),
                    self.config.crowd().traffic_target_agents,
                    "traffic target",
                );
                let defaults = RandomTrafficConfig::default();
                vec![OutboundRequest::StartRandomTraffic(RandomTrafficConfig {
                    target_agents,
                    max_agents: defaults.max_agents.max(target_agents),
                    ..defaults
                })]
            }
            ConsoleCommand::StopTraffic => vec![OutboundRequest::StopRandomTraffic],
            ConsoleCommand::Speed(multiplier) => {
                if !multiplier.is_finite() {
                    self.status.error("speed multiplier must be a number", now);
                    return Vec::new();
                }
                let multiplier = multiplier.clamp(MIN_SPEED_MULTIPLIER, MAX_SPEED_MULTIPLIER);
                vec![OutboundRequest::SetSpeed(SpeedConfig { multiplier })]
            }
            ConsoleCommand::Infra(action) => match action {
                InfraAction::Refresh => vec![self.infrastructure.refresh_request()],
                InfraAction::Clear => vec![OutboundRequest::ClearInfrastructure],
                InfraAction::Save => vec![OutboundRequest::SaveInfrastructure],
                InfraAction::Load => vec![OutboundRequest::LoadInfrastructure],
            },
            ConsoleCommand::Delete { kind, id } => {
                self.stage_delete(kind, &id, now);
                Vec::new()
            }
            ConsoleCommand::Confirm => self.infrastructure.confirm_delete(),
            ConsoleCommand::Abort => {
                if self.infrastructure.cancel_delete().is_some() {
                    self.status.info("delete aborted", now);
                }
                Vec::new()
            }
            ConsoleCommand::ClearAgents { agent_type } => {
                match agent_type.as_deref() {
                    Some(label) => self.reconciler.clear_category(label),
                    None => self.reconciler.clear(),
                }
                vec![OutboundRequest::ClearAgents { agent_type }]
            }
            ConsoleCommand::Density(action) => match action {
                DensityAction::On => {
                    self.config.polling_mut().set_density_auto_refresh(true);
                    self.density_timer.start(now);
                    Vec::new()
                }
                DensityAction::Off => {
                    self.config.polling_mut().set_density_auto_refresh(false);
                    self.density_timer.cancel();
                    self.density.clear();
                    Vec::new()
                }
                DensityAction::Refresh => vec![self.density.refresh_request()],
            },
            ConsoleCommand::ClearSelection => {
                self.controller.clear_selection();
                Vec::new()
            }
        }
    }

    fn needs_route(&mut self, now: Instant) -> Vec<OutboundRequest> {
        self.status
            .error("select a source and a destination first", now);
        Vec::new()
    }

    fn complete(&mut self, completion: Completion, now: Instant) -> Vec<OutboundRequest> {
        match completion {
            Completion::RoutePreview { ticket, result } => {
                self.controller.route_mut().accept_preview(ticket, result);
                Vec::new()
            }
            Completion::InfraStats { stamp, result } => {
                match result {
                    Ok(stats) => {
                        self.infrastructure.apply_stats(stamp, &stats);
                    }
                    Err(err) => self.transport_failed("infrastructure refresh", &err, now),
                }
                Vec::new()
            }
            Completion::EventStatus { stamp, result } => {
                match result {
                    Ok(status) => {
                        if self.event_sequencer.accept(stamp) {
                            self.event_status = Some(status);
                        }
                    }
                    Err(err) => self.transport_failed("event status", &err, now),
                }
                Vec::new()
            }
            Completion::RandomTrafficStatus { stamp, result } => {
                match result {
                    Ok(status) => {
                        if self.traffic_sequencer.accept(stamp) {
                            self.traffic_status = Some(status);
                        }
                    }
                    Err(err) => self.transport_failed("traffic status", &err, now),
                }
                Vec::new()
            }
            Completion::Density { stamp, result } => {
                match result {
                    Ok(response) => {
                        if self.density.apply_response(stamp, &response)
                            && self.density.layer().status == DensityStatus::NoData
                        {
                            self.status.info("density: no data", now);
                        }
                    }
                    Err(err) => self.transport_failed("density refresh", &err, now),
                }
                Vec::new()
            }
            Completion::Speed { result } => {
                match result {
                    Ok(response) => {
                        self.speed_multiplier = response.multiplier;
                        self.status
                            .info(format!("speed x{:.2}", response.multiplier), now);
                    }
                    Err(err) => self.transport_failed("speed change", &err, now),
                }
                Vec::new()
            }
            Completion::Command { kind, result } => match result {
                Ok(ack) => {
                    let text = ack
                        .message
                        .unwrap_or_else(|| format!("{} ok", kind.label()));
                    self.status.info(text, now);
                    self.follow_up(kind)
                }
                Err(err) => {
                    self.transport_failed(kind.label(), &err, now);
                    Vec::new()
                }
            },
        }
    }

    /// Refreshes triggered by an acknowledged command.
    fn follow_up(&mut self, kind: CommandKind) -> Vec<OutboundRequest> {
        let mut requests = Vec::new();
        if kind.refreshes_infrastructure() {
            requests.push(self.infrastructure.refresh_request());
        }
        if kind.refreshes_status() {
            requests.extend(self.status_requests());
        }
        requests
    }

    fn transport_failed(&mut self, what: &str, err: &TransportError, now: Instant) {
        warn!(
            target: "crowd_console::state",
            what,
            error = %err,
            "request.failed"
        );
        self.status.error(format!("{what} failed: {err}"), now);
    }

    fn status_requests(&mut self) -> [OutboundRequest; 2] {
        [
            OutboundRequest::FetchEventStatus {
                stamp: self.event_sequencer.issue(),
            },
            OutboundRequest::FetchRandomTrafficStatus {
                stamp: self.traffic_sequencer.issue(),
            },
        ]
    }

    fn tick(&mut self, now: Instant) -> Vec<OutboundRequest> {
        self.status.expire(now);
        let mut requests = Vec::new();
        if self.infra_timer.fire_if_due(now) {
            requests.push(self.infrastructure.refresh_request());
        }
        if self.status_timer.fire_if_due(now) {
            requests.extend(self.status_requests());
        }
        if self.density_timer.fire_if_due(now) {
            requests.push(self.density.refresh_request());
        }
        requests
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn reconciler(&self) -> &SnapshotReconciler {
        &self.reconciler
    }

    pub fn controller(&self) -> &InteractionModeController {
        &self.controller
    }

    pub fn route(&self) -> &RouteSelectionFlow {
        self.controller.route()
    }

    pub fn infrastructure(&self) -> &InfrastructureOverlay {
        &self.infrastructure
    }

    pub fn density(&self) -> &DensityLayerRenderer {
        &self.density
    }

    pub fn density_auto_refresh(&self) -> bool {
        self.density_timer.is_active()
    }

    pub fn status_line(&self, now: Instant) -> Option<&StatusMessage> {
        self.status.current(now)
    }

    pub fn event_status(&self) -> Option<&EventStatus> {
        self.event_status.as_ref()
    }

    pub fn traffic_status(&self) -> Option<&RandomTrafficStatus> {
        self.traffic_status.as_ref()
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.speed_multiplier
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Resolves an operator-typed count; missing text takes the default silently,
/// malformed text takes it with a warning.
fn count_or(text: Option<&str>, default: u32, what: &'static str) -> u32 {
    let Some(text) = text else {
        return default;
    };
    text.trim().parse().unwrap_or_else(|_| {
        warn!(
            target: "crowd_console::state",
            what,
            text,
            default,
            "command.count_defaulted"
        );
        default
    })
}

fn interval_or(text: Option<&str>, default: f64) -> f64 {
    let Some(text) = text else {
        return default;
    };
    match text.trim().parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds > 0.0 => seconds,
        _ => {
            warn!(
                target: "crowd_console::state",
                text,
                default,
                "command.interval_defaulted"
            );
            default
        }
    }
}
