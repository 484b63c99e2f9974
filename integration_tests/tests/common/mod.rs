#![allow(dead_code)]

use std::time::Instant;

use console_core::{
    CommandGateway, ConsoleConfig, ConsoleEvent, ConsoleState, OutboundRequest,
};
use crowd_schema::EntityPayload;

/// Collects submitted requests so scenarios can answer them by hand.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    pub sent: Vec<OutboundRequest>,
}

impl CommandGateway for RecordingGateway {
    fn submit(&mut self, request: OutboundRequest) {
        self.sent.push(request);
    }
}

impl RecordingGateway {
    pub fn take(&mut self) -> Vec<OutboundRequest> {
        std::mem::take(&mut self.sent)
    }
}

/// Console state wired to a recording gateway, the way the terminal app
/// drives it.
pub struct Harness {
    pub state: ConsoleState,
    pub gateway: RecordingGateway,
    pub now: Instant,
}

impl Harness {
    /// Started console with the initial poll burst already drained.
    pub fn started() -> Self {
        let now = Instant::now();
        let mut harness = Self {
            state: ConsoleState::new(ConsoleConfig::default()),
            gateway: RecordingGateway::default(),
            now,
        };
        harness.state.start(now);
        harness.send(ConsoleEvent::Tick);
        harness.gateway.take();
        harness
    }

    pub fn send(&mut self, event: ConsoleEvent) {
        let requests = self.state.update(event, self.now);
        self.gateway.submit_all(requests);
    }

    /// Answers the first pending request `matches` accepts with `body`.
    pub fn answer<F>(&mut self, matches: F, body: &str) -> Option<OutboundRequest>
    where
        F: Fn(&OutboundRequest) -> bool,
    {
        let index = self.gateway.sent.iter().position(|request| matches(request))?;
        let request = self.gateway.sent.remove(index);
        let completion = request.complete(body);
        self.send(ConsoleEvent::Completion(completion));
        Some(request)
    }
}

pub fn payload(id: &str, lat: f64, lon: f64, kind: &str) -> EntityPayload {
    EntityPayload {
        id: id.to_string(),
        lat,
        lon,
        kind: kind.to_string(),
        phase: None,
        speed: None,
        stop: None,
    }
}
