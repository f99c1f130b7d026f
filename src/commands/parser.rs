use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Help entry for one chat command.
pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "add_reading",
        usage: "add_reading \"Title\" [Duration in days]",
        help: "Adds a new reading to the list and a reminder according to the specified duration.\n\
               If duration is not specified, defaults to 7 days.\n\n\
               Example:\n    add_reading \"Deep Learning Book\" 10\n    add_reading \"Python Tricks\"",
    },
    CommandSpec {
        name: "get_readings",
        usage: "get_readings [status]",
        help: "Lists readings by status.\n\
               status can be: in_progress (default), done, or all\n\n\
               Examples:\n    get_readings\n    get_readings done\n    get_readings all",
    },
    CommandSpec {
        name: "mark_done",
        usage: "mark_done <reading_id>",
        help: "Mark a reading as done.\n\nExample:\n    mark_done 3",
    },
    CommandSpec {
        name: "mark_in_progress",
        usage: "mark_in_progress <reading_id>",
        help: "Mark a reading as in-progress.\n\nExample:\n    mark_in_progress 2",
    },
    CommandSpec {
        name: "get_reminders",
        usage: "get_reminders",
        help: "Show all scheduled reminders for readings.",
    },
    CommandSpec {
        name: "delete_reminder",
        usage: "delete_reminder <reminder_id>",
        help: "Delete a reminder by its ID.\n\nExample:\n    delete_reminder 5",
    },
    CommandSpec {
        name: "help",
        usage: "help [command]",
        help: "Shows this message, or the help for one command.",
    },
];

pub fn spec(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name == name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddReading { title: String, duration_days: Option<u32> },
    GetReadings { status: Option<String> },
    MarkDone { reading_id: i64 },
    MarkInProgress { reading_id: i64 },
    GetReminders,
    DeleteReminder { id: i64 },
    Help { command: Option<String> },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::AddReading { .. } => "add_reading",
            Command::GetReadings { .. } => "get_readings",
            Command::MarkDone { .. } => "mark_done",
            Command::MarkInProgress { .. } => "mark_in_progress",
            Command::GetReminders => "get_reminders",
            Command::DeleteReminder { .. } => "delete_reminder",
            Command::Help { .. } => "help",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("{argument} is a required argument that is missing")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("converting to \"int\" failed for parameter \"{argument}\" (got '{value}')")]
    InvalidArgument {
        command: &'static str,
        argument: &'static str,
        value: String,
    },
}

impl CommandError {
    pub fn command(&self) -> Option<&'static str> {
        match self {
            CommandError::Unknown(_) => None,
            CommandError::MissingArgument { command, .. }
            | CommandError::InvalidArgument { command, .. } => Some(command),
        }
    }
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r#""([^"]*)"|(\S+)"#).expect("token pattern is valid"))
}

/// Splits on whitespace, keeping double-quoted spans together.
pub fn tokenize(input: &str) -> Vec<String> {
    token_regex()
        .captures_iter(input)
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

struct Args {
    command: &'static str,
    tokens: std::vec::IntoIter<String>,
}

impl Args {
    fn required(&mut self, argument: &'static str) -> Result<String, CommandError> {
        self.tokens.next().ok_or(CommandError::MissingArgument {
            command: self.command,
            argument,
        })
    }

    fn optional(&mut self) -> Option<String> {
        self.tokens.next()
    }

    fn int<T: std::str::FromStr>(&self, argument: &'static str, value: String) -> Result<T, CommandError> {
        value.parse().map_err(|_| CommandError::InvalidArgument {
            command: self.command,
            argument,
            value,
        })
    }

    fn required_int<T: std::str::FromStr>(&mut self, argument: &'static str) -> Result<T, CommandError> {
        let value = self.required(argument)?;
        self.int(argument, value)
    }

    fn optional_int<T: std::str::FromStr>(&mut self, argument: &'static str) -> Result<Option<T>, CommandError> {
        match self.optional() {
            Some(value) => self.int(argument, value).map(Some),
            None => Ok(None),
        }
    }
}

/// Parses a chat message. Messages without the prefix yield `Ok(None)`.
/// Extra trailing arguments are ignored.
pub fn parse(prefix: &str, message: &str) -> Result<Option<Command>, CommandError> {
    let Some(body) = message.trim_start().strip_prefix(prefix) else {
        return Ok(None);
    };

    let mut tokens = tokenize(body).into_iter();
    let Some(name) = tokens.next() else {
        return Ok(None);
    };
    let Some(spec) = spec(&name) else {
        return Err(CommandError::Unknown(name));
    };

    let mut args = Args {
        command: spec.name,
        tokens,
    };

    let command = match spec.name {
        "add_reading" => Command::AddReading {
            title: args.required("title")?,
            duration_days: args.optional_int("duration_days")?,
        },
        "get_readings" => Command::GetReadings {
            status: args.optional(),
        },
        "mark_done" => Command::MarkDone {
            reading_id: args.required_int("reading_id")?,
        },
        "mark_in_progress" => Command::MarkInProgress {
            reading_id: args.required_int("reading_id")?,
        },
        "get_reminders" => Command::GetReminders,
        "delete_reminder" => Command::DeleteReminder {
            id: args.required_int("id")?,
        },
        _ => Command::Help {
            command: args.optional(),
        },
    };

    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_keeps_quoted_titles_together() {
        assert_eq!(
            tokenize(r#"add_reading "Deep Learning Book" 10"#),
            vec!["add_reading", "Deep Learning Book", "10"]
        );
        assert_eq!(tokenize("  get_readings   all "), vec!["get_readings", "all"]);
        assert_eq!(tokenize(r#"add_reading """#), vec!["add_reading", ""]);
    }

    #[test]
    fn ignores_messages_without_prefix() {
        assert_eq!(parse("!", "hello there"), Ok(None));
        assert_eq!(parse("!", "!"), Ok(None));
    }

    #[test]
    fn parses_add_reading_with_and_without_duration() {
        assert_eq!(
            parse("!", r#"!add_reading "Deep Learning Book" 10"#),
            Ok(Some(Command::AddReading {
                title: "Deep Learning Book".to_string(),
                duration_days: Some(10)
            }))
        );
        assert_eq!(
            parse("!", "!add_reading Tricks"),
            Ok(Some(Command::AddReading {
                title: "Tricks".to_string(),
                duration_days: None
            }))
        );
    }

    #[test]
    fn rejects_non_integer_and_negative_durations() {
        let err = parse("!", "!add_reading Title soon").unwrap_err();
        assert!(matches!(
            err,
            CommandError::InvalidArgument { argument: "duration_days", .. }
        ));
        assert!(parse("!", "!add_reading Title -3").is_err());
    }

    #[test]
    fn missing_id_is_reported_with_its_command() {
        let err = parse("!", "!mark_done").unwrap_err();
        assert_eq!(
            err,
            CommandError::MissingArgument {
                command: "mark_done",
                argument: "reading_id"
            }
        );
        assert_eq!(err.command(), Some("mark_done"));
    }

    #[test]
    fn parses_remaining_commands() {
        assert_eq!(
            parse("!", "!get_readings done"),
            Ok(Some(Command::GetReadings { status: Some("done".to_string()) }))
        );
        assert_eq!(parse("!", "!get_reminders"), Ok(Some(Command::GetReminders)));
        assert_eq!(
            parse("!", "!delete_reminder 5 extra"),
            Ok(Some(Command::DeleteReminder { id: 5 }))
        );
        assert_eq!(
            parse("!", "!mark_in_progress 2"),
            Ok(Some(Command::MarkInProgress { reading_id: 2 }))
        );
        assert_eq!(
            parse("!", "!help mark_done"),
            Ok(Some(Command::Help { command: Some("mark_done".to_string()) }))
        );
    }

    #[test]
    fn unknown_commands_are_errors() {
        assert_eq!(
            parse("!", "!dance"),
            Err(CommandError::Unknown("dance".to_string()))
        );
    }

    #[test]
    fn every_command_has_a_spec() {
        let names = [
            Command::GetReminders.name(),
            Command::Help { command: None }.name(),
            Command::MarkDone { reading_id: 1 }.name(),
        ];
        for name in names {
            assert!(spec(name).is_some());
        }
    }
}
