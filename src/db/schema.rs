pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- readings table
CREATE TABLE IF NOT EXISTS readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    status TEXT NOT NULL DEFAULT 'in_progress' CHECK (status IN ('in_progress', 'done')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    duration INTEGER NOT NULL CHECK (duration >= 0)
);

CREATE INDEX IF NOT EXISTS idx_readings_status ON readings(status);

-- reminders table
CREATE TABLE IF NOT EXISTS reminders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reading_id INTEGER NOT NULL REFERENCES readings(id) ON DELETE CASCADE,
    reminder_datetime TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_reminders_reading_id ON reminders(reading_id);

-- notes table
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reading_id INTEGER NOT NULL REFERENCES readings(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    content TEXT NOT NULL CHECK (length(trim(content)) > 0),
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_notes_reading_id ON notes(reading_id);
"#;
