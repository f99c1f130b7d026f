use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    #[default]
    InProgress,
    Done,
}

impl ReadingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadingStatus::InProgress => "in_progress",
            ReadingStatus::Done => "done",
        }
    }

    /// Human wording used in confirmations, e.g. "marked as in-progress".
    pub fn label(self) -> &'static str {
        match self {
            ReadingStatus::InProgress => "in-progress",
            ReadingStatus::Done => "done",
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(ReadingStatus::InProgress),
            "done" => Ok(ReadingStatus::Done),
            other => Err(AppError::Validation(format!("unknown reading status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingFilter {
    #[default]
    InProgress,
    Done,
    All,
}

impl ReadingFilter {
    pub fn status(self) -> Option<ReadingStatus> {
        match self {
            ReadingFilter::InProgress => Some(ReadingStatus::InProgress),
            ReadingFilter::Done => Some(ReadingStatus::Done),
            ReadingFilter::All => None,
        }
    }
}

impl From<ReadingStatus> for ReadingFilter {
    fn from(status: ReadingStatus) -> Self {
        match status {
            ReadingStatus::InProgress => ReadingFilter::InProgress,
            ReadingStatus::Done => ReadingFilter::Done,
        }
    }
}

impl FromStr for ReadingFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(ReadingFilter::All);
        }
        s.parse::<ReadingStatus>().map(ReadingFilter::from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub title: String,
    pub status: ReadingStatus,
    pub created_at: DateTime<Utc>,
    pub duration: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_column_text() {
        for status in [ReadingStatus::InProgress, ReadingStatus::Done] {
            assert_eq!(status.as_str().parse::<ReadingStatus>().unwrap(), status);
        }
        assert!("finished".parse::<ReadingStatus>().is_err());
    }

    #[test]
    fn filter_parses_all_and_statuses() {
        assert_eq!("all".parse::<ReadingFilter>().unwrap(), ReadingFilter::All);
        assert_eq!("done".parse::<ReadingFilter>().unwrap(), ReadingFilter::Done);
        assert_eq!(ReadingFilter::default(), ReadingFilter::InProgress);
        assert_eq!(ReadingFilter::All.status(), None);
        assert!("someday".parse::<ReadingFilter>().is_err());
    }
}
