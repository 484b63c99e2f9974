mod common;

use common::Harness;
use console_core::command_text::DensityAction;
use console_core::{
    CellIndex, ConsoleCommand, ConsoleConfig, ConsoleEvent, ConsoleState, DensityLayerRenderer,
    DensityShape, DensityStatus, LatLon, OutboundRequest, WeightedCell,
};
use std::time::Instant;

fn is_density(request: &OutboundRequest) -> bool {
    matches!(request, OutboundRequest::FetchDensity { .. })
}

fn normalized_of(renderer: &DensityLayerRenderer, weight: f64) -> f64 {
    renderer
        .layer()
        .features
        .iter()
        .find(|feature| feature.weight == weight)
        .map(|feature| feature.normalized)
        .expect("feature for weight")
}

#[test]
fn percentile_band_saturates_the_tails() {
    let cells: Vec<WeightedCell> = (1..=100)
        .map(|weight| WeightedCell {
            cell_id: None,
            position: Some(LatLon::new(23.13 + weight as f64 * 0.0005, 75.77)),
            weight: weight as f64,
        })
        .collect();
    let mut renderer = DensityLayerRenderer::new(Default::default());
    renderer.render(&cells);

    assert_eq!(renderer.layer().status, DensityStatus::Rendered { cells: 100 });
    assert_eq!(normalized_of(&renderer, 1.0), 0.0);
    assert_eq!(normalized_of(&renderer, 100.0), 1.0);
    assert_eq!(normalized_of(&renderer, 3.0), 0.0);
    assert_eq!(normalized_of(&renderer, 98.0), 1.0);
    let middle = normalized_of(&renderer, 50.0);
    assert!(middle > 0.0 && middle < 1.0);
}

struct SquareIndex;

impl CellIndex for SquareIndex {
    fn boundary(&self, code: &str) -> Option<Vec<LatLon>> {
        (code == "square").then(|| {
            vec![
                LatLon::new(23.17, 75.76),
                LatLon::new(23.17, 75.77),
                LatLon::new(23.18, 75.77),
                LatLon::new(23.18, 75.76),
            ]
        })
    }
}

#[test]
fn resolvable_code_beats_inline_coordinate() {
    let now = Instant::now();
    let mut state = ConsoleState::with_cell_index(ConsoleConfig::default(), SquareIndex);
    let requests = state.update(
        ConsoleEvent::Command(ConsoleCommand::Density(DensityAction::Refresh)),
        now,
    );
    let request = requests.into_iter().find(is_density).expect("density fetch");

    let body = r#"{
        "generated_at": 1714557600.0,
        "total_weight": 6.0,
        "tiles": [
            {"h3_index": "square", "lat": 23.20, "lon": 75.80, "weight": 1.0},
            {"h3_index": "unknown", "lat": 23.21, "lon": 75.81, "weight": 2.0},
            {"h3_index": "unknown", "weight": 3.0}
        ]
    }"#;
    state.update(ConsoleEvent::Completion(request.complete(body)), now);

    let layer = state.density().layer();
    assert_eq!(layer.features.len(), 2);
    assert_eq!(layer.skipped, 1);
    assert!(matches!(layer.features[0].shape, DensityShape::Polygon(ref ring) if ring.len() == 4));
    match &layer.features[1].shape {
        DensityShape::Circle { center, .. } => assert_eq!(*center, LatLon::new(23.21, 75.81)),
        other => panic!("expected a circle, got {other:?}"),
    }
}

#[test]
fn auto_refresh_polls_until_switched_off() {
    let mut harness = Harness::started();
    harness.send(ConsoleEvent::Command(ConsoleCommand::Density(DensityAction::On)));
    harness.send(ConsoleEvent::Tick);

    harness
        .answer(
            is_density,
            r#"{"tiles":[{"lat":23.18,"lon":75.77,"weight":4.0},{"lat":23.19,"lon":75.78,"weight":8.0}]}"#,
        )
        .expect("density poll issued");
    assert_eq!(
        harness.state.density().layer().status,
        DensityStatus::Rendered { cells: 2 }
    );

    harness.send(ConsoleEvent::Command(ConsoleCommand::Density(DensityAction::Off)));
    assert_eq!(harness.state.density().layer().status, DensityStatus::NoData);
    assert!(!harness.state.density_auto_refresh());

    harness.now += harness.state.config().polling().density_interval() * 2;
    harness.send(ConsoleEvent::Tick);
    assert!(!harness.gateway.sent.iter().any(is_density));
}

#[test]
fn empty_response_reports_no_data() {
    let mut harness = Harness::started();
    harness.send(ConsoleEvent::Command(ConsoleCommand::Density(DensityAction::Refresh)));
    harness
        .answer(is_density, r#"{"tiles":[]}"#)
        .expect("density fetch issued");

    assert_eq!(harness.state.density().layer().status, DensityStatus::NoData);
    assert_eq!(
        harness.state.status_line(harness.now).map(|status| status.text.as_str()),
        Some("density: no data")
    );
}
