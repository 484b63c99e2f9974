//! Outbound request contract.
//!
//! The core never performs I/O. It produces [`OutboundRequest`]s, a
//! [`CommandGateway`] carries them to the services, and the transport reports
//! back through [`Completion`]s tagged with the ticket or stamp that was
//! dispatched. Commands are one-shot: no retry, and every non-success reply is
//! handled the same way as a transport error.

use crowd_schema::{
    AckResponse, CrowdRequest, CrowdRouteRequest, DensityResponse, EventConfig, EventStatus,
    GatewayCreate, InfraStats, MobileTowerCreate, RandomTrafficConfig, RandomTrafficStatus,
    RoutePreviewResponse, SpeedConfig, SpeedResponse, TollGateCreate,
};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::infrastructure::InfraKind;
use crate::route_flow::PreviewTicket;
use crate::schedule::RequestStamp;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("service responded with status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

/// Which upstream service handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Simulation,
    Predictor,
}

/// Route of a request. `segment` and `query` hold raw operator text; the
/// transport encodes them when it builds the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub service: Service,
    pub method: HttpMethod,
    pub path: &'static str,
    pub segment: Option<String>,
    pub query: Vec<(&'static str, String)>,
}

impl Endpoint {
    fn simulation(method: HttpMethod, path: &'static str) -> Self {
        Self {
            service: Service::Simulation,
            method,
            path,
            segment: None,
            query: Vec::new(),
        }
    }

    fn with_segment(mut self, segment: &str) -> Self {
        self.segment = Some(segment.to_string());
        self
    }

    fn with_query(mut self, key: &'static str, value: &str) -> Self {
        self.query.push((key, value.to_string()));
        self
    }
}

/// Kind-specific add payload for an infrastructure marker.
#[derive(Debug, Clone, PartialEq)]
pub enum InfraAddRequest {
    Gateway(GatewayCreate),
    Tower(MobileTowerCreate),
    Toll(TollGateCreate),
}

impl InfraAddRequest {
    pub fn kind(&self) -> InfraKind {
        match self {
            InfraAddRequest::Gateway(_) => InfraKind::Gateway,
            InfraAddRequest::Tower(_) => InfraKind::Tower,
            InfraAddRequest::Toll(_) => InfraKind::Toll,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundRequest {
    RoutePreview { ticket: PreviewTicket },
    AddCrowd(CrowdRequest),
    AddCrowdRoute(CrowdRouteRequest),
    AddInfrastructure(InfraAddRequest),
    DeleteInfrastructure { kind: InfraKind, id: String },
    ClearInfrastructure,
    SaveInfrastructure,
    LoadInfrastructure,
    FetchInfraStats { stamp: RequestStamp },
    StartEvent(EventConfig),
    StopEvent,
    FetchEventStatus { stamp: RequestStamp },
    StartRandomTraffic(RandomTrafficConfig),
    StopRandomTraffic,
    FetchRandomTrafficStatus { stamp: RequestStamp },
    SetSpeed(SpeedConfig),
    ClearAgents { agent_type: Option<String> },
    FetchDensity { stamp: RequestStamp },
}

/// Fire-and-forget command kinds acknowledged through [`Completion::Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    AddCrowd,
    AddCrowdRoute,
    AddInfrastructure(InfraKind),
    DeleteInfrastructure(InfraKind),
    ClearInfrastructure,
    SaveInfrastructure,
    LoadInfrastructure,
    StartEvent,
    StopEvent,
    StartRandomTraffic,
    StopRandomTraffic,
    ClearAgents,
}

impl CommandKind {
    pub fn label(&self) -> &'static str {
        match self {
            CommandKind::AddCrowd => "add crowd",
            CommandKind::AddCrowdRoute => "add routed crowd",
            CommandKind::AddInfrastructure(kind) => match kind {
                InfraKind::Gateway => "add gateway",
                InfraKind::Tower => "add tower",
                InfraKind::Toll => "add toll gate",
            },
            CommandKind::DeleteInfrastructure(kind) => match kind {
                InfraKind::Gateway => "delete gateway",
                InfraKind::Tower => "delete tower",
                InfraKind::Toll => "delete toll gate",
            },
            CommandKind::ClearInfrastructure => "clear infrastructure",
            CommandKind::SaveInfrastructure => "save infrastructure",
            CommandKind::LoadInfrastructure => "load infrastructure",
            CommandKind::StartEvent => "start event",
            CommandKind::StopEvent => "stop event",
            CommandKind::StartRandomTraffic => "start random traffic",
            CommandKind::StopRandomTraffic => "stop random traffic",
            CommandKind::ClearAgents => "clear agents",
        }
    }

    /// Acknowledged commands that change what the infrastructure poll returns.
    pub fn refreshes_infrastructure(&self) -> bool {
        matches!(
            self,
            CommandKind::AddInfrastructure(_)
                | CommandKind::DeleteInfrastructure(_)
                | CommandKind::ClearInfrastructure
                | CommandKind::LoadInfrastructure
        )
    }

    pub fn refreshes_status(&self) -> bool {
        matches!(
            self,
            CommandKind::StartEvent
                | CommandKind::StopEvent
                | CommandKind::StartRandomTraffic
                | CommandKind::StopRandomTraffic
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    RoutePreview {
        ticket: PreviewTicket,
        result: Result<RoutePreviewResponse, TransportError>,
    },
    InfraStats {
        stamp: RequestStamp,
        result: Result<InfraStats, TransportError>,
    },
    EventStatus {
        stamp: RequestStamp,
        result: Result<EventStatus, TransportError>,
    },
    RandomTrafficStatus {
        stamp: RequestStamp,
        result: Result<RandomTrafficStatus, TransportError>,
    },
    Density {
        stamp: RequestStamp,
        result: Result<DensityResponse, TransportError>,
    },
    Speed {
        result: Result<SpeedResponse, TransportError>,
    },
    Command {
        kind: CommandKind,
        result: Result<AckResponse, TransportError>,
    },
}

impl OutboundRequest {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            OutboundRequest::RoutePreview { .. } => {
                Endpoint::simulation(HttpMethod::Post, "/route-preview")
            }
            OutboundRequest::AddCrowd(_) => Endpoint::simulation(HttpMethod::Post, "/add-crowd"),
            OutboundRequest::AddCrowdRoute(_) => {
                Endpoint::simulation(HttpMethod::Post, "/add-crowd-route")
            }
            OutboundRequest::AddInfrastructure(add) => match add {
                InfraAddRequest::Gateway(_) => Endpoint::simulation(HttpMethod::Post, "/add-gateway"),
                InfraAddRequest::Tower(_) => {
                    Endpoint::simulation(HttpMethod::Post, "/add-mobile-tower")
                }
                InfraAddRequest::Toll(_) => Endpoint::simulation(HttpMethod::Post, "/add-toll-gate"),
            },
            OutboundRequest::DeleteInfrastructure { kind, id } => {
                Endpoint::simulation(HttpMethod::Delete, kind.collection_path()).with_segment(id)
            }
            OutboundRequest::ClearInfrastructure => {
                Endpoint::simulation(HttpMethod::Delete, "/infra")
            }
            OutboundRequest::SaveInfrastructure => {
                Endpoint::simulation(HttpMethod::Post, "/infra-save")
            }
            OutboundRequest::LoadInfrastructure => {
                Endpoint::simulation(HttpMethod::Post, "/infra-load")
            }
            OutboundRequest::FetchInfraStats { .. } => {
                Endpoint::simulation(HttpMethod::Get, "/infra-stats")
            }
            OutboundRequest::StartEvent(_) => Endpoint::simulation(HttpMethod::Post, "/start-event"),
            OutboundRequest::StopEvent => Endpoint::simulation(HttpMethod::Post, "/stop-event"),
            OutboundRequest::FetchEventStatus { .. } => {
                Endpoint::simulation(HttpMethod::Get, "/event-status")
            }
            OutboundRequest::StartRandomTraffic(_) => {
                Endpoint::simulation(HttpMethod::Post, "/start-random-traffic")
            }
            OutboundRequest::StopRandomTraffic => {
                Endpoint::simulation(HttpMethod::Post, "/stop-random-traffic")
            }
            OutboundRequest::FetchRandomTrafficStatus { .. } => {
                Endpoint::simulation(HttpMethod::Get, "/random-traffic-status")
            }
            OutboundRequest::SetSpeed(_) => {
                Endpoint::simulation(HttpMethod::Post, "/speed-multiplier")
            }
            OutboundRequest::ClearAgents { agent_type } => match agent_type {
                Some(kind) => Endpoint::simulation(HttpMethod::Delete, "/agents")
                    .with_query("agent_type", kind),
                None => Endpoint::simulation(HttpMethod::Delete, "/agents"),
            },
            OutboundRequest::FetchDensity { .. } => Endpoint {
                service: Service::Predictor,
                ..Endpoint::simulation(HttpMethod::Get, "/predict-live")
            },
        }
    }

    /// JSON body for requests that carry one.
    pub fn body(&self) -> serde_json::Result<Option<JsonValue>> {
        let value = match self {
            OutboundRequest::RoutePreview { ticket } => serde_json::to_value(ticket.request())?,
            OutboundRequest::AddCrowd(body) => serde_json::to_value(body)?,
            OutboundRequest::AddCrowdRoute(body) => serde_json::to_value(body)?,
            OutboundRequest::AddInfrastructure(add) => match add {
                InfraAddRequest::Gateway(body) => serde_json::to_value(body)?,
                InfraAddRequest::Tower(body) => serde_json::to_value(body)?,
                InfraAddRequest::Toll(body) => serde_json::to_value(body)?,
            },
            OutboundRequest::StartEvent(body) => serde_json::to_value(body)?,
            OutboundRequest::StartRandomTraffic(body) => serde_json::to_value(body)?,
            OutboundRequest::SetSpeed(body) => serde_json::to_value(body)?,
            OutboundRequest::DeleteInfrastructure { .. }
            | OutboundRequest::ClearInfrastructure
            | OutboundRequest::SaveInfrastructure
            | OutboundRequest::LoadInfrastructure
            | OutboundRequest::FetchInfraStats { .. }
            | OutboundRequest::StopEvent
            | OutboundRequest::FetchEventStatus { .. }
            | OutboundRequest::StopRandomTraffic
            | OutboundRequest::FetchRandomTrafficStatus { .. }
            | OutboundRequest::ClearAgents { .. }
            | OutboundRequest::FetchDensity { .. } => return Ok(None),
        };
        Ok(Some(value))
    }

    pub fn command_kind(&self) -> Option<CommandKind> {
        let kind = match self {
            OutboundRequest::AddCrowd(_) => CommandKind::AddCrowd,
            OutboundRequest::AddCrowdRoute(_) => CommandKind::AddCrowdRoute,
            OutboundRequest::AddInfrastructure(add) => CommandKind::AddInfrastructure(add.kind()),
            OutboundRequest::DeleteInfrastructure { kind, .. } => {
                CommandKind::DeleteInfrastructure(*kind)
            }
            OutboundRequest::ClearInfrastructure => CommandKind::ClearInfrastructure,
            OutboundRequest::SaveInfrastructure => CommandKind::SaveInfrastructure,
            OutboundRequest::LoadInfrastructure => CommandKind::LoadInfrastructure,
            OutboundRequest::StartEvent(_) => CommandKind::StartEvent,
            OutboundRequest::StopEvent => CommandKind::StopEvent,
            OutboundRequest::StartRandomTraffic(_) => CommandKind::StartRandomTraffic,
            OutboundRequest::StopRandomTraffic => CommandKind::StopRandomTraffic,
            OutboundRequest::ClearAgents { .. } => CommandKind::ClearAgents,
            _ => return None,
        };
        Some(kind)
    }

    /// Builds the completion for a successful reply whose body is `text`.
    pub fn complete(&self, text: &str) -> Completion {
        self.finish(Ok(text))
    }

    /// Builds the completion for a request that failed in transport.
    pub fn fail(&self, error: TransportError) -> Completion {
        self.finish(Err(error))
    }

    fn finish(&self, outcome: Result<&str, TransportError>) -> Completion {
        match self {
            OutboundRequest::RoutePreview { ticket } => Completion::RoutePreview {
                ticket: *ticket,
                result: decode(outcome),
            },
            OutboundRequest::FetchInfraStats { stamp } => Completion::InfraStats {
                stamp: *stamp,
                result: decode(outcome),
            },
            OutboundRequest::FetchEventStatus { stamp } => Completion::EventStatus {
                stamp: *stamp,
                result: decode(outcome),
            },
            OutboundRequest::FetchRandomTrafficStatus { stamp } => {
                Completion::RandomTrafficStatus {
                    stamp: *stamp,
                    result: decode(outcome),
                }
            }
            OutboundRequest::FetchDensity { stamp } => Completion::Density {
                stamp: *stamp,
                result: decode(outcome),
            },
            OutboundRequest::SetSpeed(_) => Completion::Speed {
                result: decode(outcome),
            },
            OutboundRequest::AddCrowd(_) => acknowledge(CommandKind::AddCrowd, outcome),
            OutboundRequest::AddCrowdRoute(_) => acknowledge(CommandKind::AddCrowdRoute, outcome),
            OutboundRequest::AddInfrastructure(add) => {
                acknowledge(CommandKind::AddInfrastructure(add.kind()), outcome)
            }
            OutboundRequest::DeleteInfrastructure { kind, .. } => {
                acknowledge(CommandKind::DeleteInfrastructure(*kind), outcome)
            }
            OutboundRequest::ClearInfrastructure => {
                acknowledge(CommandKind::ClearInfrastructure, outcome)
            }
            OutboundRequest::SaveInfrastructure => {
                acknowledge(CommandKind::SaveInfrastructure, outcome)
            }
            OutboundRequest::LoadInfrastructure => {
                acknowledge(CommandKind::LoadInfrastructure, outcome)
            }
            OutboundRequest::StartEvent(_) => acknowledge(CommandKind::StartEvent, outcome),
            OutboundRequest::StopEvent => acknowledge(CommandKind::StopEvent, outcome),
            OutboundRequest::StartRandomTraffic(_) => {
                acknowledge(CommandKind::StartRandomTraffic, outcome)
            }
            OutboundRequest::StopRandomTraffic => {
                acknowledge(CommandKind::StopRandomTraffic, outcome)
            }
            OutboundRequest::ClearAgents { .. } => acknowledge(CommandKind::ClearAgents, outcome),
        }
    }
}

/// Commands answer with a generic ack; `ok: false` counts as a failure.
fn acknowledge(kind: CommandKind, outcome: Result<&str, TransportError>) -> Completion {
    let result = decode::<AckResponse>(outcome).and_then(|ack| {
        if ack.accepted() {
            Ok(ack)
        } else {
            Err(TransportError::Rejected(
                ack.message.unwrap_or_else(|| kind.label().to_string()),
            ))
        }
    });
    Completion::Command { kind, result }
}

fn decode<T: DeserializeOwned>(outcome: Result<&str, TransportError>) -> Result<T, TransportError> {
    let text = outcome?;
    let body = if text.trim().is_empty() { "{}" } else { text };
    serde_json::from_str(body).map_err(|err| TransportError::Decode(err.to_string()))
}

/// Carries core intents to the outside world.
pub trait CommandGateway {
    fn submit(&mut self, request: OutboundRequest);

    fn submit_all(&mut self, requests: Vec<OutboundRequest>) {
        for request in requests {
            self.submit(request);
        }
    }
}

impl CommandGateway for Vec<OutboundRequest> {
    fn submit(&mut self, request: OutboundRequest) {
        self.push(request);
    }
}
