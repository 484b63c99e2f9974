//! Click interpretation.
//!
//! A map click means different things depending on the sticky mode and on
//! what has already been selected. Placement modes stay active across clicks
//! so markers can be dropped in quick succession; selection modes are
//! one-shot and fall back to `Idle` after the click they were armed for.

use tracing::debug;

use crate::geo::LatLon;
use crate::infrastructure::InfraKind;
use crate::route_flow::{PreviewTicket, RouteSelectionFlow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    SelectingSource,
    SelectingDest,
    PlacingInfra(InfraKind),
}

impl InteractionMode {
    pub fn indicator(&self) -> &'static str {
        match self {
            InteractionMode::Idle => "idle",
            InteractionMode::SelectingSource => "select source",
            InteractionMode::SelectingDest => "select destination",
            InteractionMode::PlacingInfra(InfraKind::Gateway) => "place gateway",
            InteractionMode::PlacingInfra(InfraKind::Tower) => "place tower",
            InteractionMode::PlacingInfra(InfraKind::Toll) => "place toll gate",
        }
    }

    pub fn is_placing(&self) -> bool {
        matches!(self, InteractionMode::PlacingInfra(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeCommand {
    SelectSource,
    SelectDest,
    Place(InfraKind),
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// Emit an add intent; the placement mode stays armed.
    PlacementRequested { kind: InfraKind, at: LatLon },
    SourceSet,
    /// Carries the preview ticket to dispatch when a source exists.
    DestinationSet(Option<PreviewTicket>),
    /// Both endpoints were set; the click started a new selection.
    SelectionReset,
}

#[derive(Debug, Default)]
pub struct InteractionModeController {
    mode: InteractionMode,
    route: RouteSelectionFlow,
}

impl InteractionModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn route(&self) -> &RouteSelectionFlow {
        &self.route
    }

    pub fn route_mut(&mut self) -> &mut RouteSelectionFlow {
        &mut self.route
    }

    /// Explicit mode commands replace the current mode outright, so selection
    /// and placement are mutually exclusive.
    pub fn command(&mut self, command: ModeCommand) {
        let next = match command {
            ModeCommand::SelectSource => InteractionMode::SelectingSource,
            ModeCommand::SelectDest => InteractionMode::SelectingDest,
            ModeCommand::Place(kind) => InteractionMode::PlacingInfra(kind),
            ModeCommand::Cancel => InteractionMode::Idle,
        };
        if next != self.mode {
            debug!(
                target: "crowd_console::interaction",
                from = self.mode.indicator(),
                to = next.indicator(),
                "mode.changed"
            );
        }
        self.mode = next;
    }

    pub fn click(&mut self, at: LatLon) -> ClickOutcome {
        let mode = self.mode;
        if let InteractionMode::PlacingInfra(kind) = mode {
            return ClickOutcome::PlacementRequested { kind, at };
        }

        let source_set = self.route.source().is_some();
        let destination_set = self.route.destination().is_some();
        let outcome = match mode {
            InteractionMode::SelectingSource => {
                self.route.set_source(at);
                ClickOutcome::SourceSet
            }
            InteractionMode::Idle if !source_set => {
                self.route.set_source(at);
                ClickOutcome::SourceSet
            }
            InteractionMode::SelectingDest => {
                ClickOutcome::DestinationSet(self.route.set_destination(at))
            }
            InteractionMode::Idle if !destination_set => {
                ClickOutcome::DestinationSet(self.route.set_destination(at))
            }
            _ => {
                self.route.reset_with_source(at);
                ClickOutcome::SelectionReset
            }
        };
        self.mode = InteractionMode::Idle;
        outcome
    }

    pub fn clear_selection(&mut self) {
        self.route.clear();
    }
}
