mod common;

use common::Harness;
use console_core::gateway::InfraAddRequest;
use console_core::{
    parse_command_line, CommandParseError, ConsoleEvent, LatLon, OutboundRequest,
};
use crowd_schema::SpeedConfig;

fn run(harness: &mut Harness, line: &str) -> Result<(), CommandParseError> {
    let command = parse_command_line(line)?;
    harness.send(ConsoleEvent::Command(command));
    Ok(())
}

#[test]
fn typed_placement_with_bad_radius_still_places() -> anyhow::Result<()> {
    let mut harness = Harness::started();
    run(&mut harness, "place tower not-a-number")?;
    harness.send(ConsoleEvent::Click(LatLon::new(23.17, 75.76)));

    match harness.gateway.take().as_slice() {
        [OutboundRequest::AddInfrastructure(InfraAddRequest::Tower(tower))] => {
            assert_eq!(tower.radius, harness.state.config().infrastructure().default_tower_radius());
        }
        other => panic!("expected a tower add, got {other:?}"),
    }
    Ok(())
}

#[test]
fn speed_is_clamped_and_echoed() -> anyhow::Result<()> {
    let mut harness = Harness::started();
    run(&mut harness, "speed 50")?;
    assert_eq!(
        harness.gateway.sent,
        vec![OutboundRequest::SetSpeed(SpeedConfig { multiplier: 10.0 })]
    );

    harness
        .answer(
            |request| matches!(request, OutboundRequest::SetSpeed(_)),
            r#"{"ok":true,"multiplier":10.0}"#,
        )
        .expect("speed answered");
    assert_eq!(harness.state.speed_multiplier(), 10.0);
    Ok(())
}

#[test]
fn crowd_uses_configured_default() -> anyhow::Result<()> {
    let mut harness = Harness::started();
    run(&mut harness, "crowd")?;
    match harness.gateway.take().as_slice() {
        [OutboundRequest::AddCrowd(request)] => {
            assert_eq!(request.number, harness.state.config().crowd().crowd_size);
        }
        other => panic!("expected a crowd add, got {other:?}"),
    }
    Ok(())
}

#[test]
fn rejected_command_surfaces_an_error() -> anyhow::Result<()> {
    let mut harness = Harness::started();
    run(&mut harness, "infra load")?;
    harness
        .answer(
            |request| matches!(request, OutboundRequest::LoadInfrastructure),
            r#"{"ok":false,"message":"no saved layout"}"#,
        )
        .expect("load answered");

    let status = harness.state.status_line(harness.now).expect("status shown");
    assert!(status.text.contains("no saved layout"), "{}", status.text);
    assert!(harness.gateway.sent.is_empty());
    Ok(())
}

#[test]
fn malformed_counts_use_configured_defaults() -> anyhow::Result<()> {
    let mut harness = Harness::started();
    run(&mut harness, "crowd many")?;
    run(&mut harness, "traffic start lots")?;

    let crowd = harness.state.config().crowd().clone();
    match harness.gateway.take().as_slice() {
        [OutboundRequest::AddCrowd(request), OutboundRequest::StartRandomTraffic(traffic)] => {
            assert_eq!(request.number, crowd.crowd_size);
            assert_eq!(traffic.target_agents, crowd.traffic_target_agents);
        }
        other => panic!("unexpected requests {other:?}"),
    }
    Ok(())
}

#[test]
fn malformed_lines_never_reach_the_state() {
    let mut harness = Harness::started();
    assert!(run(&mut harness, "speed fast").is_err());
    assert!(run(&mut harness, "teleport").is_err());
    assert!(run(&mut harness, "event").is_err());
    assert!(harness.gateway.sent.is_empty());
}
