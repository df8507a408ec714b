//! Slash command parsing
//!
//! A line starting with `/` is a command. The marker is stripped by the
//! caller; what remains is split on the first run of whitespace into a
//! command token and a raw argument.

use crate::error::ChatError;

/// Every command the server understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Create,
    Help,
    Join,
    Part,
    Room,
    Rooms,
    Switch,
    Topic,
}

impl Command {
    /// All commands, in the order `/help` lists them
    pub const ALL: [Command; 8] = [
        Command::Create,
        Command::Help,
        Command::Join,
        Command::Part,
        Command::Room,
        Command::Rooms,
        Command::Switch,
        Command::Topic,
    ];

    /// The token typed after the slash
    pub fn name(self) -> &'static str {
        match self {
            Command::Create => "create",
            Command::Help => "help",
            Command::Join => "join",
            Command::Part => "part",
            Command::Room => "room",
            Command::Rooms => "rooms",
            Command::Switch => "switch",
            Command::Topic => "topic",
        }
    }

    /// One-line description shown by `/help`
    pub fn description(self) -> &'static str {
        match self {
            Command::Create => "Create a new room: /create foo",
            Command::Help => "This command",
            Command::Join => "Join a room: /join foo",
            Command::Part => "Leave a room: /part foo",
            Command::Room => "Display your active room: /room",
            Command::Rooms => "Display all rooms you're in: /rooms",
            Command::Switch => "Make another room active: /switch foo",
            Command::Topic => {
                "Show or change the topic in your active room: /topic This is a new topic"
            }
        }
    }

    /// Look a command up by its exact (case-sensitive) token
    pub fn from_name(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.name() == token)
    }
}

/// A parsed command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation<'a> {
    pub command: Command,
    /// Everything after the command token, trimmed. Empty when absent.
    pub argument: &'a str,
}

impl<'a> Invocation<'a> {
    /// The first word of the argument, or `""` if there is none
    ///
    /// Commands that take a room name use this so a missing name reaches
    /// the room operation as an empty string.
    pub fn name_argument(&self) -> &'a str {
        self.argument.split_whitespace().next().unwrap_or("")
    }
}

/// Parse a command line with its leading `/` already removed
pub fn parse(line: &str) -> Result<Invocation<'_>, ChatError> {
    let line = line.trim();
    let (token, argument) = match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], line[idx..].trim_start()),
        None => (line, ""),
    };

    match Command::from_name(token) {
        Some(command) => Ok(Invocation { command, argument }),
        None => Err(ChatError::Unrecognized(token.to_string())),
    }
}

/// Render the `/help` listing
///
/// Descriptions are aligned on the longest command name.
pub fn help_text() -> String {
    let width = Command::ALL
        .iter()
        .map(|cmd| cmd.name().len())
        .max()
        .unwrap_or(0);

    let mut text = String::from("The following commands are available:\n");
    for cmd in Command::ALL {
        text.push_str(&format!(
            "\t- /{:<width$}\t{}\n",
            cmd.name(),
            cmd.description(),
            width = width
        ));
    }
    text
}
