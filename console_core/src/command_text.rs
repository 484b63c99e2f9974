use std::num::ParseFloatError;

use thiserror::Error;

use crate::infrastructure::InfraKind;
use crate::interaction::ModeCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfraAction {
    Refresh,
    Clear,
    Save,
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityAction {
    On,
    Off,
    Refresh,
}

/// Operator command typed at the console prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Mode(ModeCommand),
    /// Arms placement; an optional value updates the tower radius or toll fee
    /// draft first.
    Place {
        kind: InfraKind,
        value: Option<String>,
    },
    SetRadius(Option<String>),
    SetFee(Option<String>),
    /// Counts and intervals stay raw; malformed text resolves to the
    /// configured defaults when the command runs.
    AddCrowd(Option<String>),
    RouteCrowd(Option<String>),
    Preview,
    StartEvent {
        wave_size: Option<String>,
        interval_seconds: Option<String>,
    },
    StopEvent,
    StartTraffic {
        target: Option<String>,
    },
    StopTraffic,
    Speed(f64),
    Infra(InfraAction),
    Delete {
        kind: InfraKind,
        id: String,
    },
    Confirm,
    Abort,
    ClearAgents {
        agent_type: Option<String>,
    },
    Density(DensityAction),
    ClearSelection,
}

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid float '{value}' for {context}: {source}")]
    InvalidFloat {
        value: String,
        context: &'static str,
        source: ParseFloatError,
    },
    #[error("invalid infrastructure kind '{0}'")]
    InvalidKind(String),
    #[error("invalid action '{action}' for {command}")]
    InvalidAction {
        command: &'static str,
        action: String,
    },
}

pub fn parse_command_line(input: &str) -> Result<ConsoleCommand, CommandParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let mut parts = trimmed.split_whitespace();
    let verb = parts
        .next()
        .map(|v| v.to_ascii_lowercase())
        .ok_or(CommandParseError::Empty)?;

    match verb.as_str() {
        "source" | "src" => Ok(ConsoleCommand::Mode(ModeCommand::SelectSource)),
        "dest" | "destination" => Ok(ConsoleCommand::Mode(ModeCommand::SelectDest)),
        "cancel" | "idle" => Ok(ConsoleCommand::Mode(ModeCommand::Cancel)),
        "place" => {
            let kind_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("kind"))?;
            let kind = parse_kind(kind_str)?;
            let value = parts.next().map(str::to_string);
            Ok(ConsoleCommand::Place { kind, value })
        }
        // Radius and fee stay raw; unparsable text resolves to defaults at placement.
        "radius" => Ok(ConsoleCommand::SetRadius(rest(parts))),
        "fee" => Ok(ConsoleCommand::SetFee(rest(parts))),
        "crowd" => Ok(ConsoleCommand::AddCrowd(raw(parts.next()))),
        "route-crowd" | "route_crowd" => Ok(ConsoleCommand::RouteCrowd(raw(parts.next()))),
        "preview" => Ok(ConsoleCommand::Preview),
        "event" => {
            let action = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("action"))?
                .to_ascii_lowercase();
            match action.as_str() {
                "start" => Ok(ConsoleCommand::StartEvent {
                    wave_size: raw(parts.next()),
                    interval_seconds: raw(parts.next()),
                }),
                "stop" => Ok(ConsoleCommand::StopEvent),
                other => Err(CommandParseError::InvalidAction {
                    command: "event",
                    action: other.to_string(),
                }),
            }
        }
        "traffic" => {
            let action = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("action"))?
                .to_ascii_lowercase();
            match action.as_str() {
                "start" => Ok(ConsoleCommand::StartTraffic {
                    target: raw(parts.next()),
                }),
                "stop" => Ok(ConsoleCommand::StopTraffic),
                other => Err(CommandParseError::InvalidAction {
                    command: "traffic",
                    action: other.to_string(),
                }),
            }
        }
        "speed" => {
            let value_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("multiplier"))?;
            let multiplier = parse_f64(value_str, "speed multiplier")?;
            Ok(ConsoleCommand::Speed(multiplier))
        }
        "infra" => {
            let action = parts.next().unwrap_or("refresh").to_ascii_lowercase();
            let action = match action.as_str() {
                "refresh" => InfraAction::Refresh,
                "clear" => InfraAction::Clear,
                "save" => InfraAction::Save,
                "load" => InfraAction::Load,
                other => {
                    return Err(CommandParseError::InvalidAction {
                        command: "infra",
                        action: other.to_string(),
                    });
                }
            };
            Ok(ConsoleCommand::Infra(action))
        }
        "delete" => {
            let kind_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("kind"))?;
            let id = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("id"))?;
            Ok(ConsoleCommand::Delete {
                kind: parse_kind(kind_str)?,
                id: id.to_string(),
            })
        }
        "confirm" | "yes" => Ok(ConsoleCommand::Confirm),
        "abort" | "no" => Ok(ConsoleCommand::Abort),
        "agents" => {
            let action = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("action"))?
                .to_ascii_lowercase();
            if action != "clear" {
                return Err(CommandParseError::InvalidAction {
                    command: "agents",
                    action,
                });
            }
            let agent_type = parts.next().map(|t| t.to_ascii_lowercase());
            Ok(ConsoleCommand::ClearAgents { agent_type })
        }
        "density" => {
            let action = parts.next().unwrap_or("refresh").to_ascii_lowercase();
            let action = match action.as_str() {
                "on" => DensityAction::On,
                "off" => DensityAction::Off,
                "refresh" => DensityAction::Refresh,
                other => {
                    return Err(CommandParseError::InvalidAction {
                        command: "density",
                        action: other.to_string(),
                    });
                }
            };
            Ok(ConsoleCommand::Density(action))
        }
        "clear-selection" | "clear_selection" => Ok(ConsoleCommand::ClearSelection),
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

fn rest<'a>(parts: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined = parts.collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn raw(token: Option<&str>) -> Option<String> {
    token.map(str::to_string)
}

fn parse_kind(token: &str) -> Result<InfraKind, CommandParseError> {
    InfraKind::parse(token).ok_or_else(|| CommandParseError::InvalidKind(token.to_string()))
}

fn parse_f64(value: &str, context: &'static str) -> Result<f64, CommandParseError> {
    value
        .parse::<f64>()
        .map_err(|source| CommandParseError::InvalidFloat {
            value: value.to_string(),
            context,
            source,
        })
}
