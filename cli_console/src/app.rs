use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, Instant};

use color_eyre::Result;
use console_core::command_text::{DensityAction, InfraAction};
use console_core::{
    parse_command_line, CommandGateway, Completion, ConsoleCommand, ConsoleConfig, ConsoleEvent,
    ConsoleState, InfraKind, ModeCommand,
};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, trace, warn};

use crate::http_gateway::HttpGateway;
use crate::subscription::SubscriptionEvent;
use crate::ui::{cell_to_latlon, draw_ui, UiState};

const SPEED_STEP: f64 = 1.5;

pub struct ConsoleApp {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    ui_state: UiState,
    state: ConsoleState,
    snapshots: UnboundedReceiver<SubscriptionEvent>,
    gateway: HttpGateway,
    completions: crossbeam_channel::Receiver<Completion>,
    shutdown_sender: Sender<()>,
    log_receiver: Receiver<String>,
}

impl ConsoleApp {
    pub fn new(
        config: ConsoleConfig,
        snapshots: UnboundedReceiver<SubscriptionEvent>,
        gateway: HttpGateway,
        completions: crossbeam_channel::Receiver<Completion>,
        shutdown_sender: Sender<()>,
        log_receiver: Receiver<String>,
    ) -> Result<Self> {
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(std::io::stdout(), EnableMouseCapture)?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(Self {
            terminal,
            ui_state: UiState::default(),
            state: ConsoleState::new(config),
            snapshots,
            gateway,
            completions,
            shutdown_sender,
            log_receiver,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let started = Instant::now();
        self.state.start(started);
        self.dispatch(ConsoleEvent::Tick, started);
        let mut last_draw = started;

        loop {
            let now = Instant::now();
            while let Ok(event) = self.snapshots.try_recv() {
                let event = match event {
                    SubscriptionEvent::Snapshot(entities) => ConsoleEvent::Snapshot(entities),
                    SubscriptionEvent::Lost => ConsoleEvent::SubscriptionLost,
                };
                self.dispatch(event, now);
            }

            while let Ok(completion) = self.completions.try_recv() {
                self.dispatch(ConsoleEvent::Completion(completion), now);
            }

            while let Ok(line) = self.log_receiver.try_recv() {
                self.ui_state.push_log(line);
            }

            self.dispatch(ConsoleEvent::Tick, now);

            if last_draw.elapsed() >= Duration::from_millis(100) {
                self.terminal
                    .draw(|frame| draw_ui(frame, &mut self.ui_state, &self.state, now))?;
                last_draw = Instant::now();
            }

            if event::poll(Duration::from_millis(50))? {
                match event::read()? {
                    Event::Key(key) => {
                        if self.handle_key(key) {
                            break;
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
        }

        crossterm::execute!(std::io::stdout(), DisableMouseCapture)?;
        self.terminal.show_cursor()?;
        crossterm::terminal::disable_raw_mode()?;
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    fn dispatch(&mut self, event: ConsoleEvent, now: Instant) {
        let requests = self.state.update(event, now);
        if !requests.is_empty() {
            trace!(count = requests.len(), "requests.dispatched");
            self.gateway.submit_all(requests);
        }
    }

    fn command(&mut self, command: ConsoleCommand) {
        self.dispatch(ConsoleEvent::Command(command), Instant::now());
    }

    /// Returns `true` when the operator asked to quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind == KeyEventKind::Release {
            return false;
        }
        if self.ui_state.prompt.is_some() {
            self.handle_prompt_key(key.code);
            return false;
        }
        if self.state.infrastructure().pending_delete().is_some() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.command(ConsoleCommand::Confirm);
                    return false;
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.command(ConsoleCommand::Abort);
                    return false;
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Esc => self.command(ConsoleCommand::Mode(ModeCommand::Cancel)),
            KeyCode::Char(':') => self.ui_state.prompt = Some(String::new()),
            KeyCode::Char('s') => self.command(ConsoleCommand::Mode(ModeCommand::SelectSource)),
            KeyCode::Char('d') => self.command(ConsoleCommand::Mode(ModeCommand::SelectDest)),
            KeyCode::Char('g') => self.place(InfraKind::Gateway),
            KeyCode::Char('w') => self.place(InfraKind::Tower),
            KeyCode::Char('l') => self.place(InfraKind::Toll),
            KeyCode::Char('c') => self.command(ConsoleCommand::ClearSelection),
            KeyCode::Char('p') => self.command(ConsoleCommand::Preview),
            KeyCode::Char('a') => self.command(ConsoleCommand::AddCrowd(None)),
            KeyCode::Char('r') => self.command(ConsoleCommand::Infra(InfraAction::Refresh)),
            KeyCode::Char('f') => self.command(ConsoleCommand::Density(DensityAction::Refresh)),
            KeyCode::Char('v') => {
                let action = if self.state.density_auto_refresh() {
                    DensityAction::Off
                } else {
                    DensityAction::On
                };
                self.command(ConsoleCommand::Density(action));
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let speed = self.state.speed_multiplier() * SPEED_STEP;
                self.command(ConsoleCommand::Speed(speed));
            }
            KeyCode::Char('-') | KeyCode::Char('_') => {
                let speed = self.state.speed_multiplier() / SPEED_STEP;
                self.command(ConsoleCommand::Speed(speed));
            }
            _ => {}
        }
        false
    }

    fn place(&mut self, kind: InfraKind) {
        self.command(ConsoleCommand::Place { kind, value: None });
    }

    fn handle_prompt_key(&mut self, code: KeyCode) {
        let Some(prompt) = self.ui_state.prompt.as_mut() else {
            return;
        };
        match code {
            KeyCode::Char(c) => prompt.push(c),
            KeyCode::Backspace => {
                prompt.pop();
            }
            KeyCode::Esc => self.ui_state.prompt = None,
            KeyCode::Enter => {
                let line = self.ui_state.prompt.take().unwrap_or_default();
                if line.trim().is_empty() {
                    return;
                }
                match parse_command_line(&line) {
                    Ok(command) => {
                        info!(command = %line.trim(), "prompt.command");
                        self.command(command);
                    }
                    Err(err) => {
                        warn!(command = %line.trim(), error = %err, "prompt.rejected");
                        self.ui_state.push_log(format!("{err}"));
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let bounds = self.state.config().viewport();
        let at = cell_to_latlon(self.ui_state.map_area, &bounds, mouse.column, mouse.row);
        let button = match mouse.kind {
            MouseEventKind::Down(button) => button,
            MouseEventKind::Moved => {
                self.ui_state.hover = at;
                return;
            }
            _ => return,
        };
        let Some(at) = at else {
            return;
        };
        let event = match button {
            MouseButton::Left => ConsoleEvent::Click(at),
            MouseButton::Right => ConsoleEvent::SecondaryClick(at),
            MouseButton::Middle => return,
        };
        self.dispatch(event, Instant::now());
    }
}
