use std::sync::Arc;

use chrono::{Days, Local, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, error, info};

use super::parser::{self, Command, CommandError, COMMANDS};
use crate::config::Config;
use crate::db::{Repository, DATETIME_FORMAT};
use crate::error::{AppError, Result};
use crate::format::{code_block, tabulate};
use crate::models::{ReadingFilter, ReadingStatus};

/// Due time for a reading: `hour`:00 on `today`, pushed out by `duration_days`.
/// Fails when the result falls outside the representable calendar.
pub fn due_date(today: NaiveDate, hour: u32, duration_days: u32) -> Result<NaiveDateTime> {
    let at_hour = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    today
        .and_time(at_hour)
        .checked_add_days(Days::new(u64::from(duration_days)))
        .ok_or_else(|| {
            AppError::Validation(format!("duration of {} days is too far out", duration_days))
        })
}

pub struct CommandHandler {
    repository: Arc<Repository>,
    prefix: String,
    default_duration_days: u32,
    reminder_hour: u32,
}

impl CommandHandler {
    pub fn new(repository: Arc<Repository>, config: &Config) -> Self {
        Self {
            repository,
            prefix: config.command_prefix.clone(),
            default_duration_days: config.default_duration_days,
            reminder_hour: config.reminder_hour,
        }
    }

    /// Turns a chat message into a reply. `None` means the message wasn't
    /// meant for the bot and nothing should be sent.
    pub async fn respond(&self, message: &str) -> Option<String> {
        self.respond_at(message, Local::now().naive_local()).await
    }

    pub async fn respond_at(&self, message: &str, now: NaiveDateTime) -> Option<String> {
        let command = match parser::parse(&self.prefix, message) {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(CommandError::Unknown(name)) => {
                debug!("ignoring unknown command {}", name);
                return None;
            }
            Err(e) => return Some(self.usage_error(&e)),
        };

        let name = command.name();
        info!("running command {}", name);
        match self.handle(command, now).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                error!("command {} failed: {}", name, e);
                Some(format!("Error running `{}{}`: {}", self.prefix, name, e))
            }
        }
    }

    pub async fn handle(&self, command: Command, now: NaiveDateTime) -> Result<String> {
        match command {
            Command::AddReading {
                title,
                duration_days,
            } => {
                let duration = duration_days.unwrap_or(self.default_duration_days);
                self.add_reading(&title, duration, now).await
            }
            Command::GetReadings { status } => self.get_readings(status.as_deref()).await,
            Command::MarkDone { reading_id } => self.mark(reading_id, ReadingStatus::Done).await,
            Command::MarkInProgress { reading_id } => {
                self.mark(reading_id, ReadingStatus::InProgress).await
            }
            Command::GetReminders => self.get_reminders().await,
            Command::DeleteReminder { id } => Ok(self.delete_reminder(id).await),
            Command::Help { command } => Ok(self.help(command.as_deref())),
        }
    }

    async fn add_reading(&self, title: &str, duration: u32, now: NaiveDateTime) -> Result<String> {
        let due = due_date(now.date(), self.reminder_hour, duration)?;
        let reading = self
            .repository
            .create_reading(title, duration, ReadingStatus::InProgress)
            .await?;

        self.repository.create_reminder(reading.id, due).await?;

        Ok(format!(
            "New reading '{}' added. Discussion set for {}",
            reading.title,
            due.format(DATETIME_FORMAT)
        ))
    }

    async fn get_readings(&self, status: Option<&str>) -> Result<String> {
        let status = status.unwrap_or(ReadingStatus::InProgress.as_str());
        // No reading can carry a status outside the known set.
        let Ok(filter) = status.parse::<ReadingFilter>() else {
            return Ok(format!("No {} readings found", status));
        };

        let readings = self.repository.get_readings(filter).await?;
        if readings.is_empty() {
            return Ok(match filter {
                ReadingFilter::All => "No readings found".to_string(),
                _ => format!("No {} readings found", status),
            });
        }

        Ok(code_block(&tabulate(&readings)))
    }

    async fn mark(&self, reading_id: i64, status: ReadingStatus) -> Result<String> {
        self.repository.update_reading(reading_id, status).await?;
        let in_progress = self.repository.get_readings(ReadingFilter::InProgress).await?;

        Ok(format!(
            "Reading with id {} marked as {}.\nCurrent in-progress readings:{}",
            reading_id,
            status.label(),
            code_block(&tabulate(&in_progress))
        ))
    }

    async fn get_reminders(&self) -> Result<String> {
        let reminders = self.repository.get_reminder_details().await?;
        if reminders.is_empty() {
            return Ok("No reminders found".to_string());
        }
        Ok(code_block(&tabulate(&reminders)))
    }

    async fn delete_reminder(&self, id: i64) -> String {
        match self.repository.delete_reminder(id).await {
            Ok(()) => format!("Reminder with id {} deleted", id),
            Err(e) => format!("Could not delete reminder id={}.\n`{}`", id, e),
        }
    }

    fn help(&self, command: Option<&str>) -> String {
        if let Some(name) = command {
            return match parser::spec(name.trim_start_matches(self.prefix.as_str())) {
                Some(spec) => format!(
                    "```\n{}{}\n\n{}\n```",
                    self.prefix, spec.usage, spec.help
                ),
                None => format!("No command called \"{}\" found.", name),
            };
        }

        let lines: Vec<String> = COMMANDS
            .iter()
            .map(|spec| format!("  {}{}", self.prefix, spec.usage))
            .collect();
        format!(
            "```\nCommands:\n{}\n\nType {}help command for more info on a command.\n```",
            lines.join("\n"),
            self.prefix
        )
    }

    fn usage_error(&self, error: &CommandError) -> String {
        match error.command().and_then(parser::spec) {
            Some(spec) => format!("{}\nUsage: `{}{}`", error, self.prefix, spec.usage),
            None => error.to_string(),
        }
    }
}
