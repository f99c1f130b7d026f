use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub reading_id: i64,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
