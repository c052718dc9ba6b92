//! # Console Gateway
//!
//! A line-based stand-in for the chat platform, used by the demo binary.
//!
//! | Line                      | Meaning                                  |
//! |---------------------------|------------------------------------------|
//! | `/name key=value ...`     | slash command with options               |
//! | `!button id`              | button press                             |
//! | `!select id a,b`          | select menu with chosen values           |
//! | `!modal id key=value ...` | modal submission                         |
//! | `?command option partial` | autocomplete request                     |
//! | `@event {json}`           | platform event                           |
//! | `quit`                    | stop                                     |

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::traits::{CommandSync, Responder};
use crate::domain::types::CommandDefinition;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("expected key=value, got '{0}'")]
    InvalidPair(String),

    #[error("invalid event payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unknown input '{0}'")]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Command {
        name: String,
        options: HashMap<String, Value>,
    },
    Button {
        custom_id: String,
    },
    Select {
        custom_id: String,
        values: Vec<String>,
    },
    Modal {
        custom_id: String,
        fields: HashMap<String, String>,
    },
    Autocomplete {
        command: String,
        option: String,
        value: String,
    },
    Event {
        name: String,
        data: Value,
    },
    Quit,
    Empty,
}

fn split_pair(token: &str) -> Result<(String, String), ConsoleError> {
    token
        .split_once('=')
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| ConsoleError::InvalidPair(token.to_string()))
}

/// Integers and booleans are typed, everything else stays a string.
fn option_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::from(raw),
    }
}

pub fn parse_line(line: &str) -> Result<ConsoleInput, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleInput::Empty);
    }
    if line == "quit" || line == "exit" {
        return Ok(ConsoleInput::Quit);
    }

    if let Some(rest) = line.strip_prefix('/') {
        let mut tokens = rest.split_whitespace();
        let name = tokens.next().ok_or(ConsoleError::Missing("command name"))?;
        let options = tokens
            .map(|t| split_pair(t).map(|(k, v)| (k, option_value(&v))))
            .collect::<Result<_, _>>()?;
        return Ok(ConsoleInput::Command {
            name: name.to_string(),
            options,
        });
    }

    if let Some(rest) = line.strip_prefix('!') {
        let mut tokens = rest.split_whitespace();
        let kind = tokens.next().ok_or(ConsoleError::Missing("interaction kind"))?;
        let custom_id = tokens
            .next()
            .ok_or(ConsoleError::Missing("custom id"))?
            .to_string();
        return match kind {
            "button" => Ok(ConsoleInput::Button { custom_id }),
            "select" => Ok(ConsoleInput::Select {
                custom_id,
                values: tokens
                    .flat_map(|t| t.split(','))
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect(),
            }),
            "modal" => Ok(ConsoleInput::Modal {
                custom_id,
                fields: tokens.map(split_pair).collect::<Result<_, _>>()?,
            }),
            other => Err(ConsoleError::Unknown(format!("!{other}"))),
        };
    }

    if let Some(rest) = line.strip_prefix('?') {
        let mut tokens = rest.splitn(3, ' ');
        let command = tokens.next().filter(|t| !t.is_empty()).ok_or(ConsoleError::Missing("command name"))?;
        let option = tokens.next().ok_or(ConsoleError::Missing("option name"))?;
        return Ok(ConsoleInput::Autocomplete {
            command: command.to_string(),
            option: option.to_string(),
            value: tokens.next().unwrap_or_default().to_string(),
        });
    }

    if let Some(rest) = line.strip_prefix('@') {
        let (name, body) = rest.split_once(' ').unwrap_or((rest, ""));
        if name.is_empty() {
            return Err(ConsoleError::Missing("event name"));
        }
        let data = match body.trim() {
            "" => Value::Null,
            json => serde_json::from_str(json)?,
        };
        return Ok(ConsoleInput::Event {
            name: name.to_string(),
            data,
        });
    }

    Err(ConsoleError::Unknown(line.to_string()))
}

/// Prints replies to stdout.
#[derive(Debug, Clone)]
pub struct ConsoleResponder {
    channel: String,
}

impl ConsoleResponder {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl Responder for ConsoleResponder {
    async fn reply(&self, content: &str, ephemeral: bool) -> Result<(), String> {
        let marker = if ephemeral { " (only you)" } else { "" };
        println!("[{}]{} {}", self.channel, marker, content);
        Ok(())
    }

    fn channel_id(&self) -> String {
        self.channel.clone()
    }
}

/// Prints the command definitions as JSON instead of pushing them to a platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleCommandSync;

#[async_trait]
impl CommandSync for ConsoleCommandSync {
    async fn sync_commands(&self, commands: Vec<CommandDefinition>) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(&commands)?);
        Ok(())
    }
}
