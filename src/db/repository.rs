use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::config::DatabaseLocation;
use crate::error::{AppError, Result};
use crate::models::{Note, Reading, ReadingFilter, ReadingStatus, Reminder, ReminderDetail};

use super::schema::SCHEMA;

/// Storage format for reminder due times (local wall clock).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const READING_COLUMNS: &str = "id, title, status, created_at, duration";
const REMINDER_COLUMNS: &str = "id, reading_id, reminder_datetime, created_at";
const NOTE_COLUMNS: &str = "id, reading_id, user_id, content, created_at";

/// Every write runs in its own transaction and re-reads the row after commit,
/// so callers always see database-assigned ids and timestamps.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn open(location: &DatabaseLocation) -> Result<Self> {
        let conn = match location {
            DatabaseLocation::File(path) => Connection::open(path).await?,
            DatabaseLocation::Memory => Connection::open_in_memory().await?,
        };
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        Self::open(&DatabaseLocation::Memory).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Reading operations

    pub async fn create_reading(
        &self,
        title: &str,
        duration: u32,
        status: ReadingStatus,
    ) -> Result<Reading> {
        if title.trim().is_empty() {
            return Err(AppError::Validation("reading title must not be empty".to_string()));
        }
        let title = title.to_string();

        let reading = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO readings (title, status, duration) VALUES (?1, ?2, ?3)",
                    params![title, status.as_str(), duration],
                )?;
                let id = tx.last_insert_rowid();
                tx.commit()?;

                let reading = conn.query_row(
                    &format!("SELECT {READING_COLUMNS} FROM readings WHERE id = ?1"),
                    params![id],
                    reading_from_row,
                )?;
                Ok(reading)
            })
            .await?;
        Ok(reading)
    }

    pub async fn get_reading(&self, id: i64) -> Result<Option<Reading>> {
        let reading = self
            .conn
            .call(move |conn| {
                let reading = conn
                    .query_row(
                        &format!("SELECT {READING_COLUMNS} FROM readings WHERE id = ?1"),
                        params![id],
                        reading_from_row,
                    )
                    .optional()?;
                Ok(reading)
            })
            .await?;
        Ok(reading)
    }

    pub async fn get_readings(&self, filter: ReadingFilter) -> Result<Vec<Reading>> {
        let status = filter.status().map(ReadingStatus::as_str);
        let readings = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {READING_COLUMNS} FROM readings WHERE (?1 IS NULL OR status = ?1) ORDER BY id"
                ))?;
                let readings = stmt
                    .query_map(params![status], reading_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(readings)
            })
            .await?;
        Ok(readings)
    }

    pub async fn update_reading(&self, id: i64, status: ReadingStatus) -> Result<Reading> {
        let reading = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let changed = tx.execute(
                    "UPDATE readings SET status = ?1 WHERE id = ?2",
                    params![status.as_str(), id],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                tx.commit()?;

                let reading = conn.query_row(
                    &format!("SELECT {READING_COLUMNS} FROM readings WHERE id = ?1"),
                    params![id],
                    reading_from_row,
                )?;
                Ok(Some(reading))
            })
            .await?;
        reading.ok_or_else(|| AppError::not_found("Reading", id))
    }

    /// Deletes a reading together with its reminders and notes.
    #[allow(dead_code)]
    pub async fn delete_reading(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let deleted = tx.execute("DELETE FROM readings WHERE id = ?1", params![id])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await?;

        if !deleted {
            return Err(AppError::not_found("Reading", id));
        }
        Ok(())
    }

    // Reminder operations

    pub async fn create_reminder(
        &self,
        reading_id: i64,
        reminder_datetime: NaiveDateTime,
    ) -> Result<Reminder> {
        let due = reminder_datetime.format(DATETIME_FORMAT).to_string();
        let reminder = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO reminders (reading_id, reminder_datetime) VALUES (?1, ?2)",
                    params![reading_id, due],
                )?;
                let id = tx.last_insert_rowid();
                tx.commit()?;

                let reminder = conn.query_row(
                    &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
                    params![id],
                    reminder_from_row,
                )?;
                Ok(reminder)
            })
            .await?;
        Ok(reminder)
    }

    #[allow(dead_code)]
    pub async fn get_reminder(&self, id: i64) -> Result<Option<Reminder>> {
        let reminder = self
            .conn
            .call(move |conn| {
                let reminder = conn
                    .query_row(
                        &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
                        params![id],
                        reminder_from_row,
                    )
                    .optional()?;
                Ok(reminder)
            })
            .await?;
        Ok(reminder)
    }

    /// All pending reminders in storage order.
    pub async fn get_reminders(&self) -> Result<Vec<Reminder>> {
        let reminders = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {REMINDER_COLUMNS} FROM reminders ORDER BY id"
                ))?;
                let reminders = stmt
                    .query_map([], reminder_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(reminders)
            })
            .await?;
        Ok(reminders)
    }

    pub async fn get_reminder_details(&self) -> Result<Vec<ReminderDetail>> {
        let details = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT m.id, m.reading_id, r.title, m.reminder_datetime
                       FROM reminders m
                       JOIN readings r ON m.reading_id = r.id
                       ORDER BY m.id"#,
                )?;
                let details = stmt
                    .query_map([], reminder_detail_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(details)
            })
            .await?;
        Ok(details)
    }

    pub async fn delete_reminder(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let deleted = tx.execute("DELETE FROM reminders WHERE id = ?1", params![id])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await?;

        if !deleted {
            return Err(AppError::not_found("Reminder", id));
        }
        Ok(())
    }

    // Note operations (no chat command exposes these yet)

    #[allow(dead_code)]
    pub async fn create_note(&self, reading_id: i64, user_id: &str, content: &str) -> Result<Note> {
        if content.trim().is_empty() {
            return Err(AppError::Validation("note content must not be empty".to_string()));
        }

        let user_id = user_id.to_string();
        let content = content.to_string();
        let note = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO notes (reading_id, user_id, content) VALUES (?1, ?2, ?3)",
                    params![reading_id, user_id, content],
                )?;
                let id = tx.last_insert_rowid();
                tx.commit()?;

                let note = conn.query_row(
                    &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
                    params![id],
                    note_from_row,
                )?;
                Ok(note)
            })
            .await?;
        Ok(note)
    }

    #[allow(dead_code)]
    pub async fn get_notes(&self, reading_id: i64) -> Result<Vec<Note>> {
        let notes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NOTE_COLUMNS} FROM notes WHERE reading_id = ?1 ORDER BY id"
                ))?;
                let notes = stmt
                    .query_map(params![reading_id], note_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(notes)
            })
            .await?;
        Ok(notes)
    }
}

fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    // RFC3339 (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') (e.g., "2026-01-11 12:34:56")
    parse_naive(s).map(|naive| naive.and_utc())
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

fn text_column<T>(row: &Row, idx: usize, parse: impl Fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected value '{}'", raw).into(),
        )
    })
}

fn reading_from_row(row: &Row) -> rusqlite::Result<Reading> {
    Ok(Reading {
        id: row.get(0)?,
        title: row.get(1)?,
        status: text_column(row, 2, |s| s.parse().ok())?,
        created_at: text_column(row, 3, parse_utc)?,
        duration: row.get(4)?,
    })
}

fn reminder_from_row(row: &Row) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: row.get(0)?,
        reading_id: row.get(1)?,
        reminder_datetime: text_column(row, 2, parse_naive)?,
        created_at: text_column(row, 3, parse_utc)?,
    })
}

fn reminder_detail_from_row(row: &Row) -> rusqlite::Result<ReminderDetail> {
    Ok(ReminderDetail {
        id: row.get(0)?,
        reading_id: row.get(1)?,
        reading_title: row.get(2)?,
        reminder_datetime: text_column(row, 3, parse_naive)?,
    })
}

fn note_from_row(row: &Row) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        reading_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        created_at: text_column(row, 4, parse_utc)?,
    })
}
