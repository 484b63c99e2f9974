mod common;

use common::Harness;
use console_core::command_text::InfraAction;
use console_core::gateway::InfraAddRequest;
use console_core::infrastructure::DEFAULT_TOWER_RADIUS;
use console_core::{
    ConsoleCommand, ConsoleEvent, InfraKind, InteractionMode, LatLon, OutboundRequest,
};

const STATS: &str = r#"{
    "gateways": [{"id": "g-1", "name": "North gate", "lat": 23.18, "lon": 75.77, "nearby_agents": 4}],
    "mobile_towers": [{"id": "t-1", "lat": 23.16, "lon": 75.75, "radius": 0.02, "nearby_agents": 9}],
    "toll_gates": [],
    "agent_count": 120
}"#;

fn is_stats(request: &OutboundRequest) -> bool {
    matches!(request, OutboundRequest::FetchInfraStats { .. })
}

fn place(harness: &mut Harness, kind: InfraKind) {
    harness.send(ConsoleEvent::Command(ConsoleCommand::Place { kind, value: None }));
}

#[test]
fn tower_placement_stays_armed_across_clicks() {
    let mut harness = Harness::started();
    place(&mut harness, InfraKind::Tower);

    for (i, at) in [LatLon::new(23.17, 75.76), LatLon::new(23.19, 75.79)].into_iter().enumerate() {
        harness.send(ConsoleEvent::Click(at));
        assert_eq!(
            harness.state.controller().mode(),
            InteractionMode::PlacingInfra(InfraKind::Tower)
        );
        assert_eq!(harness.gateway.sent.len(), i + 1);
    }

    for request in harness.gateway.take() {
        assert!(matches!(
            request,
            OutboundRequest::AddInfrastructure(InfraAddRequest::Tower(_))
        ));
    }
    assert!(harness.state.route().source().is_none());
}

#[test]
fn malformed_radius_falls_back_to_default() {
    let mut harness = Harness::started();
    harness.send(ConsoleEvent::Command(ConsoleCommand::SetRadius(Some("wide".to_string()))));
    place(&mut harness, InfraKind::Tower);
    harness.send(ConsoleEvent::Click(LatLon::new(23.17, 75.76)));

    match harness.gateway.take().as_slice() {
        [OutboundRequest::AddInfrastructure(InfraAddRequest::Tower(tower))] => {
            assert_eq!(tower.radius, DEFAULT_TOWER_RADIUS);
            assert_eq!((tower.lat, tower.lon), (23.17, 75.76));
        }
        other => panic!("expected a tower add, got {other:?}"),
    }
}

#[test]
fn malformed_fee_still_places_toll() {
    let mut harness = Harness::started();
    harness.send(ConsoleEvent::Command(ConsoleCommand::Place {
        kind: InfraKind::Toll,
        value: Some("free".to_string()),
    }));
    harness.send(ConsoleEvent::Click(LatLon::new(23.17, 75.76)));

    match harness.gateway.take().as_slice() {
        [OutboundRequest::AddInfrastructure(InfraAddRequest::Toll(toll))] => {
            assert_eq!(toll.fee, None);
        }
        other => panic!("expected a toll add, got {other:?}"),
    }
}

#[test]
fn acknowledged_placement_refreshes_stats() {
    let mut harness = Harness::started();
    place(&mut harness, InfraKind::Gateway);
    harness.send(ConsoleEvent::Click(LatLon::new(23.18, 75.77)));

    harness
        .answer(
            |request| matches!(request, OutboundRequest::AddInfrastructure(_)),
            r#"{"ok":true}"#,
        )
        .expect("add answered");
    harness.answer(is_stats, STATS).expect("refresh issued");

    let infra = harness.state.infrastructure();
    assert_eq!(infra.records(InfraKind::Gateway).len(), 1);
    assert_eq!(infra.records(InfraKind::Tower).len(), 1);
    assert_eq!(infra.records(InfraKind::Gateway)[0].nearby_agents, 4);
    assert_eq!(infra.agent_count(), Some(120));
}

#[test]
fn older_stats_do_not_overwrite_newer() {
    let mut harness = Harness::started();
    harness.send(ConsoleEvent::Command(ConsoleCommand::Infra(InfraAction::Refresh)));
    harness.send(ConsoleEvent::Command(ConsoleCommand::Infra(InfraAction::Refresh)));
    let mut requests = harness.gateway.take();
    let newer = requests.pop().expect("second refresh");
    let older = requests.pop().expect("first refresh");

    harness.send(ConsoleEvent::Completion(newer.complete(STATS)));
    harness.send(ConsoleEvent::Completion(older.complete(r#"{"agent_count": 1}"#)));

    assert_eq!(harness.state.infrastructure().len(), 2);
    assert_eq!(harness.state.infrastructure().agent_count(), Some(120));
}

#[test]
fn secondary_click_stages_delete_until_confirmed() {
    let mut harness = Harness::started();
    harness.send(ConsoleEvent::Command(ConsoleCommand::Infra(InfraAction::Refresh)));
    harness.answer(is_stats, STATS).expect("refresh issued");

    harness.send(ConsoleEvent::SecondaryClick(LatLon::new(23.1805, 75.7705)));
    let pending = harness
        .state
        .infrastructure()
        .pending_delete()
        .expect("delete staged");
    assert_eq!(pending.id, "g-1");
    assert_eq!(pending.name, "North gate");
    assert!(harness.gateway.sent.is_empty());

    harness.send(ConsoleEvent::Command(ConsoleCommand::Confirm));
    match harness.gateway.sent.as_slice() {
        [OutboundRequest::DeleteInfrastructure { kind, id }] => {
            assert_eq!(*kind, InfraKind::Gateway);
            assert_eq!(id, "g-1");
        }
        other => panic!("unexpected requests {other:?}"),
    }
    assert!(harness.state.infrastructure().records(InfraKind::Gateway).is_empty());

    harness
        .answer(
            |request| matches!(request, OutboundRequest::DeleteInfrastructure { .. }),
            r#"{"ok":true}"#,
        )
        .expect("delete answered");
    assert!(harness.gateway.sent.iter().any(is_stats));
}

#[test]
fn refresh_sent_before_delete_cannot_restore_the_record() {
    let mut harness = Harness::started();
    harness.send(ConsoleEvent::Command(ConsoleCommand::Infra(InfraAction::Refresh)));
    harness.answer(is_stats, STATS).expect("refresh issued");

    harness.send(ConsoleEvent::Command(ConsoleCommand::Infra(InfraAction::Refresh)));
    harness.send(ConsoleEvent::Command(ConsoleCommand::Delete {
        kind: InfraKind::Gateway,
        id: "g-1".to_string(),
    }));
    harness.send(ConsoleEvent::Command(ConsoleCommand::Confirm));

    // The earlier refresh still lists the gateway when it lands.
    harness.answer(is_stats, STATS).expect("stale refresh pending");
    assert!(harness.state.infrastructure().records(InfraKind::Gateway).is_empty());
    assert_eq!(harness.state.infrastructure().records(InfraKind::Tower).len(), 1);
}

#[test]
fn aborted_delete_sends_nothing() {
    let mut harness = Harness::started();
    harness.send(ConsoleEvent::Command(ConsoleCommand::Infra(InfraAction::Refresh)));
    harness.answer(is_stats, STATS).expect("refresh issued");

    harness.send(ConsoleEvent::Command(ConsoleCommand::Delete {
        kind: InfraKind::Tower,
        id: "t-1".to_string(),
    }));
    assert!(harness.state.infrastructure().pending_delete().is_some());
    harness.send(ConsoleEvent::Command(ConsoleCommand::Abort));

    assert!(harness.state.infrastructure().pending_delete().is_none());
    assert!(harness.gateway.sent.is_empty());
    assert_eq!(harness.state.infrastructure().records(InfraKind::Tower).len(), 1);
}

#[test]
fn acknowledged_bulk_clear_refreshes_stats() {
    let mut harness = Harness::started();
    harness.send(ConsoleEvent::Command(ConsoleCommand::Infra(InfraAction::Clear)));
    assert_eq!(harness.gateway.sent, vec![OutboundRequest::ClearInfrastructure]);

    harness
        .answer(
            |request| matches!(request, OutboundRequest::ClearInfrastructure),
            r#"{"ok":true,"message":"infrastructure cleared"}"#,
        )
        .expect("clear answered");

    assert_eq!(harness.gateway.sent.len(), 1);
    assert!(is_stats(&harness.gateway.sent[0]));
}
