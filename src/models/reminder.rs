use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    pub reading_id: i64,
    /// Local wall-clock time the discussion is due.
    pub reminder_datetime: NaiveDateTime,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now >= self.reminder_datetime
    }
}

/// A reminder joined with the title of the reading it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderDetail {
    pub id: i64,
    pub reading_id: i64,
    pub reading_title: String,
    pub reminder_datetime: NaiveDateTime,
}
