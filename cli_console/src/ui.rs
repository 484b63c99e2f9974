use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use console_core::density::{DensityFeature, DensityShape, METERS_PER_DEGREE};
use console_core::infrastructure::InfraAttributes;
use console_core::status::StatusLevel;
use console_core::{ConsoleState, DensityStatus, GeoBounds, InfraKind, InteractionMode, LatLon, Rgb};
use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Circle, Line as CanvasLine, Points};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

pub struct UiState {
    pub logs: VecDeque<String>,
    pub max_logs: usize,
    /// Command line being typed after `:`.
    pub prompt: Option<String>,
    /// Inner area of the last drawn map, used to turn mouse cells into
    /// coordinates.
    pub map_area: Rect,
    /// Map position under the mouse pointer, if it is over the map.
    pub hover: Option<LatLon>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            logs: VecDeque::new(),
            max_logs: 6,
            prompt: None,
            map_area: Rect::default(),
            hover: None,
        }
    }
}

impl UiState {
    pub fn push_log<S: Into<String>>(&mut self, line: S) {
        let mut text: String = line.into();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        if text.is_empty() {
            return;
        }
        self.logs.push_front(text);
        while self.logs.len() > self.max_logs {
            self.logs.pop_back();
        }
    }
}

/// Converts a terminal cell inside `area` to the coordinate at its centre.
pub fn cell_to_latlon(area: Rect, bounds: &GeoBounds, column: u16, row: u16) -> Option<LatLon> {
    if area.width == 0
        || area.height == 0
        || column < area.x
        || row < area.y
        || column >= area.x + area.width
        || row >= area.y + area.height
    {
        return None;
    }
    let fx = (f64::from(column - area.x) + 0.5) / f64::from(area.width);
    let fy = (f64::from(row - area.y) + 0.5) / f64::from(area.height);
    Some(LatLon::new(
        bounds.max_lat - fy * bounds.height(),
        bounds.min_lon + fx * bounds.width(),
    ))
}

pub fn draw_ui(frame: &mut Frame, ui: &mut UiState, state: &ConsoleState, now: Instant) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(frame.size());
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(chunks[1]);

    draw_header(frame, chunks[0], state);
    ui.map_area = body[0].inner(&Margin {
        vertical: 1,
        horizontal: 1,
    });
    draw_map(frame, body[0], state);
    draw_panel(frame, body[1], state, ui.hover, now);
    draw_logs(frame, chunks[2], ui);
    draw_footer(frame, chunks[3], ui, state);
}

fn rgb(color: Rgb) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

fn draw_header(frame: &mut Frame, area: Rect, state: &ConsoleState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Crowd Operations Console");
    let connection = if state.is_connected() {
        Span::styled("Connected", Style::default().fg(Color::Green))
    } else {
        Span::styled("Reconnecting", Style::default().fg(Color::Red))
    };
    let mode = state.controller().mode();
    let mode_style = match mode {
        InteractionMode::Idle => Style::default().fg(Color::Gray),
        InteractionMode::PlacingInfra(_) => Style::default().fg(Color::Magenta),
        _ => Style::default().fg(Color::Yellow),
    };
    let line = Line::from(vec![
        connection,
        Span::raw(format!(" | {} entities | mode ", state.reconciler().len())),
        Span::styled(mode.indicator(), mode_style),
        Span::raw(format!(" | speed x{:.2}", state.speed_multiplier())),
    ]);
    let text = Paragraph::new(line).wrap(Wrap { trim: true });
    frame.render_widget(block, area);
    frame.render_widget(
        text,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn draw_map(frame: &mut Frame, area: Rect, state: &ConsoleState) {
    let bounds = state.config().viewport();

    let mut by_fill: HashMap<Rgb, Vec<(f64, f64)>> = HashMap::new();
    for (_, marker) in state.reconciler().markers() {
        by_fill
            .entry(marker.style.fill)
            .or_default()
            .push((marker.position.lon, marker.position.lat));
    }

    let route = state.route();
    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title("Map"))
        .marker(Marker::Braille)
        .x_bounds([bounds.min_lon, bounds.max_lon])
        .y_bounds([bounds.min_lat, bounds.max_lat])
        .paint(|ctx| {
            for feature in &state.density().layer().features {
                let color = rgb(feature.fill);
                match &feature.shape {
                    DensityShape::Polygon(ring) => {
                        for (a, b) in ring.iter().zip(ring.iter().cycle().skip(1)) {
                            ctx.draw(&CanvasLine {
                                x1: a.lon,
                                y1: a.lat,
                                x2: b.lon,
                                y2: b.lat,
                                color,
                            });
                        }
                    }
                    DensityShape::Circle { center, radius_m } => ctx.draw(&Circle {
                        x: center.lon,
                        y: center.lat,
                        radius: radius_m / METERS_PER_DEGREE,
                        color,
                    }),
                }
            }
            ctx.layer();

            for (fill, coords) in &by_fill {
                ctx.draw(&Points {
                    coords,
                    color: rgb(*fill),
                });
            }
            ctx.layer();

            if let Some(path) = route.preview() {
                for pair in path.windows(2) {
                    ctx.draw(&CanvasLine {
                        x1: pair[0].lon,
                        y1: pair[0].lat,
                        x2: pair[1].lon,
                        y2: pair[1].lat,
                        color: Color::DarkGray,
                    });
                }
            }
            for record in state.infrastructure().iter() {
                let (glyph, color) = match record.kind {
                    InfraKind::Gateway => ("G", Color::Cyan),
                    InfraKind::Tower => ("T", Color::Magenta),
                    InfraKind::Toll => ("$", Color::Yellow),
                };
                if let InfraAttributes::Tower { radius } = record.attributes {
                    ctx.draw(&Circle {
                        x: record.position.lon,
                        y: record.position.lat,
                        radius,
                        color,
                    });
                }
                ctx.print(
                    record.position.lon,
                    record.position.lat,
                    Span::styled(glyph, Style::default().fg(color)),
                );
            }
            if let Some(source) = route.source() {
                ctx.print(
                    source.lon,
                    source.lat,
                    Span::styled("S", Style::default().fg(Color::Green)),
                );
            }
            if let Some(destination) = route.destination() {
                ctx.print(
                    destination.lon,
                    destination.lat,
                    Span::styled("D", Style::default().fg(Color::Red)),
                );
            }
        });
    frame.render_widget(canvas, area);
}

/// The density cell under the pointer, or the densest cell when the pointer
/// is elsewhere.
fn density_readout(
    state: &ConsoleState,
    hover: Option<LatLon>,
) -> Option<(&'static str, &DensityFeature)> {
    let layer = state.density().layer();
    hover
        .and_then(|at| layer.feature_at(at))
        .map(|feature| ("cell    ", feature))
        .or_else(|| layer.peak().map(|feature| ("peak    ", feature)))
}

fn draw_panel(
    frame: &mut Frame,
    area: Rect,
    state: &ConsoleState,
    hover: Option<LatLon>,
    now: Instant,
) {
    let label = Style::default().fg(Color::Yellow);
    let mut lines = Vec::new();

    let event = match state.event_status() {
        Some(status) if status.active => format!("active, {} waves", status.waves_launched),
        Some(_) => "idle".to_string(),
        None => "unknown".to_string(),
    };
    lines.push(Line::from(vec![Span::styled("event   ", label), Span::raw(event)]));
    let traffic = match state.traffic_status() {
        Some(status) if status.active => format!("active, {} agents", status.random_agent_count),
        Some(_) => "idle".to_string(),
        None => "unknown".to_string(),
    };
    lines.push(Line::from(vec![Span::styled("traffic ", label), Span::raw(traffic)]));

    let density = match state.density().layer().status {
        DensityStatus::NoData => "no data".to_string(),
        DensityStatus::Rendered { cells } => format!("{cells} cells"),
    };
    let auto = if state.density_auto_refresh() { "auto" } else { "manual" };
    lines.push(Line::from(vec![
        Span::styled("density ", label),
        Span::raw(format!("{density} ({auto})")),
    ]));
    if let Some((title, feature)) = density_readout(state, hover) {
        lines.push(Line::from(vec![
            Span::styled(title, label),
            Span::raw(feature.label.clone()),
        ]));
    }

    let infra = state.infrastructure();
    lines.push(Line::from(vec![
        Span::styled("infra   ", label),
        Span::raw(format!(
            "{} gw / {} tw / {} toll",
            infra.records(InfraKind::Gateway).len(),
            infra.records(InfraKind::Tower).len(),
            infra.records(InfraKind::Toll).len()
        )),
    ]));
    if let Some(total) = infra.agent_count() {
        lines.push(Line::from(vec![
            Span::styled("agents  ", label),
            Span::raw(total.to_string()),
        ]));
    }
    lines.push(Line::from(vec![
        Span::styled("draft   ", label),
        Span::raw(format!(
            "radius {} | fee {}",
            infra.radius_text().unwrap_or("-"),
            infra.fee_text().unwrap_or("-")
        )),
    ]));
    lines.push(Line::default());
    for record in infra.iter() {
        lines.push(Line::from(format!(
            "{:<4} {:<12} {:>4} nearby",
            record.kind.label(),
            record.display_name(),
            record.nearby_agents
        )));
    }

    if let Some(message) = state.status_line(now) {
        let color = match message.level {
            StatusLevel::Info => Color::Green,
            StatusLevel::Error => Color::Red,
        };
        lines.insert(
            0,
            Line::from(Span::styled(message.text.clone(), Style::default().fg(color))),
        );
    }

    let block = Block::default().borders(Borders::ALL).title("Status");
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(
        paragraph,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn draw_logs(frame: &mut Frame, area: Rect, ui: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Logs");
    let lines: Vec<Line> = ui
        .logs
        .iter()
        .map(|entry| Line::from(Span::raw(entry)))
        .collect();
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(
        paragraph,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn draw_footer(frame: &mut Frame, area: Rect, ui: &UiState, state: &ConsoleState) {
    let key = Style::default().fg(Color::Yellow);
    let line = if let Some(prompt) = &ui.prompt {
        Line::from(vec![Span::styled(":", key), Span::raw(prompt.as_str())])
    } else if let Some(pending) = state.infrastructure().pending_delete() {
        Line::from(vec![
            Span::raw(format!("delete {} {}? ", pending.kind.label(), pending.name)),
            Span::styled("y", key),
            Span::raw(" confirm  "),
            Span::styled("n", key),
            Span::raw(" abort"),
        ])
    } else {
        let mut spans = Vec::new();
        for (binding, action) in [
            ("s/d", " source/dest  "),
            ("g/w/l", " place gw/tower/toll  "),
            ("esc", " cancel  "),
            ("r", " refresh  "),
            ("v", " density  "),
            (":", " command  "),
            ("q", " quit"),
        ] {
            spans.push(Span::styled(binding, key));
            spans.push(Span::raw(action));
        }
        Line::from(spans)
    };
    let block = Block::default().borders(Borders::ALL);
    frame.render_widget(block, area);
    frame.render_widget(
        Paragraph::new(line),
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_map_onto_viewport() {
        let bounds = GeoBounds::default();
        let area = Rect::new(1, 1, 100, 50);
        let top_left = cell_to_latlon(area, &bounds, 1, 1).expect("inside map");
        assert!(top_left.lat > bounds.max_lat - bounds.height() / 50.0);
        assert!(top_left.lon < bounds.min_lon + bounds.width() / 100.0);
        let centre = cell_to_latlon(area, &bounds, 50, 25).expect("inside map");
        assert!(bounds.contains(&centre));
        assert!(cell_to_latlon(area, &bounds, 0, 10).is_none());
        assert!(cell_to_latlon(area, &bounds, 101, 10).is_none());
    }

    #[test]
    fn readout_prefers_the_hovered_cell() {
        use console_core::command_text::DensityAction;
        use console_core::{ConsoleCommand, ConsoleConfig, ConsoleEvent};

        let now = Instant::now();
        let mut state = ConsoleState::new(ConsoleConfig::default());
        assert!(density_readout(&state, None).is_none());

        let refresh = ConsoleCommand::Density(DensityAction::Refresh);
        let requests = state.update(ConsoleEvent::Command(refresh), now);
        let fetch = requests.first().expect("density fetch");
        let body = r#"{"tiles":[
            {"lat":23.18,"lon":75.77,"weight":1.0},
            {"lat":23.20,"lon":75.80,"weight":9.0}
        ]}"#;
        state.update(ConsoleEvent::Completion(fetch.complete(body)), now);

        let (title, peak) = density_readout(&state, None).expect("peak shown");
        assert_eq!(title.trim(), "peak");
        assert_eq!(peak.weight, 9.0);

        let (title, hovered) =
            density_readout(&state, Some(LatLon::new(23.18, 75.77))).expect("cell under pointer");
        assert_eq!(title.trim(), "cell");
        assert_eq!(hovered.weight, 1.0);
        assert!(hovered.label.starts_with("weight 1.000"));
    }
}
