//! services/client/src/terminal/command.rs
//!
//! Defines the line protocol between the person at the terminal and the
//! client: every input line parses into one `Command`.

use std::str::FromStr;

/// Roles offered by the input form.
pub const ROLES: [&str; 6] = [
    "professional",
    "startup founder",
    "software engineer",
    "product manager",
    "student",
    "entrepreneur",
];

/// Insight counts offered by the input form.
pub const INSIGHT_CHOICES: [u8; 3] = [3, 5, 7];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sets the book title field.
    Book(String),
    /// Sets the role field.
    Role(String),
    /// Sets the insight count field.
    Insights(u8),
    Submit,
    Retry,
    Next,
    Prev,
    /// One-based insight number, as printed under the carousel.
    GoTo(usize),
    Play,
    Stop,
    Dismiss,
    Reset,
    History,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Nothing to do. Type 'help' for the list of commands.")]
    Empty,
    #[error("Unknown command '{0}'. Type 'help' for the list of commands.")]
    Unknown(String),
    #[error("'{0}' needs an argument.")]
    MissingArgument(&'static str),
    #[error("Unknown role '{0}'. Choose one of: {roles}.", roles = ROLES.join(", "))]
    InvalidRole(String),
    #[error("Insights must be 3, 5 or 7, got '{0}'.")]
    InvalidInsights(String),
    #[error("'{0}' is not an insight number.")]
    InvalidIndex(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "book" | "title" => {
                if rest.is_empty() {
                    Err(CommandError::MissingArgument("book"))
                } else {
                    Ok(Command::Book(rest.to_string()))
                }
            }
            "role" => {
                let role = rest.to_lowercase();
                if role.is_empty() {
                    Err(CommandError::MissingArgument("role"))
                } else if ROLES.contains(&role.as_str()) {
                    Ok(Command::Role(role))
                } else {
                    Err(CommandError::InvalidRole(rest.to_string()))
                }
            }
            "insights" => match rest.parse::<u8>() {
                Ok(n) if INSIGHT_CHOICES.contains(&n) => Ok(Command::Insights(n)),
                _ if rest.is_empty() => Err(CommandError::MissingArgument("insights")),
                _ => Err(CommandError::InvalidInsights(rest.to_string())),
            },
            "submit" | "go" => Ok(Command::Submit),
            "retry" => Ok(Command::Retry),
            "next" | "n" | "right" => Ok(Command::Next),
            "prev" | "p" | "left" => Ok(Command::Prev),
            "goto" => match rest.parse::<usize>() {
                Ok(n) if n >= 1 => Ok(Command::GoTo(n)),
                _ if rest.is_empty() => Err(CommandError::MissingArgument("goto")),
                _ => Err(CommandError::InvalidIndex(rest.to_string())),
            },
            "play" => Ok(Command::Play),
            "stop" => Ok(Command::Stop),
            "dismiss" => Ok(Command::Dismiss),
            "reset" | "new" => Ok(Command::Reset),
            "history" => Ok(Command::History),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            _ => Err(CommandError::Unknown(word.to_string())),
        }
    }
}

pub const HELP: &str = "\
Commands:
  book <title>        set the book title
  role <role>         professional | startup founder | software engineer |
                      product manager | student | entrepreneur
  insights <3|5|7>    number of insights to request
  submit              get insights for the current form
  retry               repeat the last request
  next | prev         move through the insights (also: right | left)
  goto <n>            jump to insight n
  play | stop         read the summary aloud / stop reading
  dismiss             hide the error banner
  reset               start over with a new book
  history             show recent analyses
  quit                leave";
