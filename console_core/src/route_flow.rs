//! Source/destination selection and the provisional route preview.

use crowd_schema::{CrowdRouteRequest, RoutePreviewRequest, RoutePreviewResponse};
use tracing::{debug, trace};

use crate::gateway::TransportError;
use crate::geo::LatLon;

/// Identifies the selection a preview request was dispatched for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewTicket {
    pub generation: u64,
    pub source: LatLon,
    pub destination: LatLon,
}

impl PreviewTicket {
    pub fn request(&self) -> RoutePreviewRequest {
        RoutePreviewRequest {
            source_lat: self.source.lat,
            source_lon: self.source.lon,
            dest_lat: self.destination.lat,
            dest_lon: self.destination.lon,
            number: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewDisposition {
    Rendered,
    /// The selection changed after dispatch; the response was discarded.
    Stale,
    /// Failure responses are dropped without surfacing an error.
    Failed,
}

#[derive(Debug, Default, Clone)]
pub struct RouteSelectionFlow {
    source: Option<LatLon>,
    destination: Option<LatLon>,
    preview: Option<Vec<LatLon>>,
    generation: u64,
}

impl RouteSelectionFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self) -> Option<LatLon> {
        self.source
    }

    pub fn destination(&self) -> Option<LatLon> {
        self.destination
    }

    /// Provisional path; present only while both endpoints are set.
    pub fn preview(&self) -> Option<&[LatLon]> {
        self.preview.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A new source invalidates any destination and preview chosen for the
    /// previous one.
    pub fn set_source(&mut self, at: LatLon) {
        self.source = Some(at);
        self.destination = None;
        self.preview = None;
        self.bump();
    }

    /// Sets the destination and returns the preview ticket to dispatch when a
    /// source is already chosen.
    pub fn set_destination(&mut self, at: LatLon) -> Option<PreviewTicket> {
        self.destination = Some(at);
        self.preview = None;
        self.bump();
        self.ticket()
    }

    /// Starts a fresh selection from `at`, discarding the previous route.
    pub fn reset_with_source(&mut self, at: LatLon) {
        self.set_source(at);
    }

    pub fn clear(&mut self) {
        if self.source.is_none() && self.destination.is_none() && self.preview.is_none() {
            return;
        }
        self.source = None;
        self.destination = None;
        self.preview = None;
        self.bump();
    }

    /// Ticket for the current selection, used to re-request a preview.
    pub fn ticket(&self) -> Option<PreviewTicket> {
        match (self.source, self.destination) {
            (Some(source), Some(destination)) => Some(PreviewTicket {
                generation: self.generation,
                source,
                destination,
            }),
            _ => None,
        }
    }

    pub fn accept_preview(
        &mut self,
        ticket: PreviewTicket,
        result: Result<RoutePreviewResponse, TransportError>,
    ) -> PreviewDisposition {
        if ticket.generation != self.generation || self.ticket().is_none() {
            debug!(
                target: "crowd_console::route",
                dispatched = ticket.generation,
                current = self.generation,
                "preview.stale"
            );
            return PreviewDisposition::Stale;
        }

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                debug!(target: "crowd_console::route", error = %err, "preview.failed");
                return PreviewDisposition::Failed;
            }
        };
        if !response.ok || response.points.len() < 2 {
            debug!(
                target: "crowd_console::route",
                message = response.message.as_deref().unwrap_or(""),
                "preview.no_route"
            );
            return PreviewDisposition::Failed;
        }

        let points: Vec<LatLon> = response
            .points
            .iter()
            .copied()
            .map(LatLon::from_lon_lat)
            .filter(LatLon::is_finite)
            .collect();
        if points.len() < 2 {
            return PreviewDisposition::Failed;
        }
        trace!(
            target: "crowd_console::route",
            points = points.len(),
            generation = self.generation,
            "preview.rendered"
        );
        self.preview = Some(points);
        PreviewDisposition::Rendered
    }

    /// Request spawning `number` agents along the selected route.
    pub fn route_crowd_request(&self, number: u32) -> Option<CrowdRouteRequest> {
        let ticket = self.ticket()?;
        Some(CrowdRouteRequest {
            number,
            source_lat: ticket.source.lat,
            source_lon: ticket.source.lon,
            dest_lat: ticket.destination.lat,
            dest_lon: ticket.destination.lon,
        })
    }

    fn bump(&mut self) {
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_route() -> RoutePreviewResponse {
        RoutePreviewResponse {
            ok: true,
            points: vec![[75.77, 23.18], [75.78, 23.19], [75.79, 23.2]],
            count: Some(3),
            message: None,
        }
    }

    fn selected() -> (RouteSelectionFlow, PreviewTicket) {
        let mut flow = RouteSelectionFlow::new();
        flow.set_source(LatLon::new(23.18, 75.77));
        let ticket = flow
            .set_destination(LatLon::new(23.2, 75.79))
            .expect("ticket issued once both endpoints exist");
        (flow, ticket)
    }

    #[test]
    fn matching_generation_renders_preview() {
        let (mut flow, ticket) = selected();
        assert_eq!(flow.accept_preview(ticket, Ok(ok_route())), PreviewDisposition::Rendered);
        let preview = flow.preview().expect("preview rendered");
        assert_eq!(preview.len(), 3);
        assert_eq!(preview[0], LatLon::new(23.18, 75.77));
    }

    #[test]
    fn stale_generation_is_discarded() {
        let (mut flow, ticket) = selected();
        flow.set_source(LatLon::new(23.15, 75.75));
        assert_eq!(flow.accept_preview(ticket, Ok(ok_route())), PreviewDisposition::Stale);
        assert!(flow.preview().is_none());
    }

    #[test]
    fn changing_destination_clears_rendered_preview_synchronously() {
        let (mut flow, ticket) = selected();
        flow.accept_preview(ticket, Ok(ok_route()));
        let next = flow.set_destination(LatLon::new(23.21, 75.8));
        assert!(flow.preview().is_none());
        assert!(next.is_some());
        assert_eq!(flow.accept_preview(ticket, Ok(ok_route())), PreviewDisposition::Stale);
    }

    #[test]
    fn failures_are_silent() {
        let (mut flow, ticket) = selected();
        let refused = RoutePreviewResponse {
            ok: false,
            message: Some("No route".into()),
            ..RoutePreviewResponse::default()
        };
        assert_eq!(flow.accept_preview(ticket, Ok(refused)), PreviewDisposition::Failed);
        assert_eq!(
            flow.accept_preview(ticket, Err(TransportError::Network("refused".into()))),
            PreviewDisposition::Failed
        );
        assert!(flow.preview().is_none());
        assert!(flow.destination().is_some());
    }

    #[test]
    fn destination_without_source_issues_no_ticket() {
        let mut flow = RouteSelectionFlow::new();
        assert!(flow.set_destination(LatLon::new(23.2, 75.79)).is_none());
        assert!(flow.route_crowd_request(10).is_none());
    }

    #[test]
    fn route_crowd_uses_both_endpoints() {
        let (flow, _) = selected();
        let request = flow.route_crowd_request(25).expect("both endpoints set");
        assert_eq!(request.number, 25);
        assert_eq!(request.source_lat, 23.18);
        assert_eq!(request.dest_lon, 75.79);
    }
}
