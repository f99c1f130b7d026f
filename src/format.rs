//! Plain-text tables for chat replies.
//!
//! Layout follows the usual "simple" table style: a header line, a dashed
//! rule under each column, then one line per record. Numeric columns are
//! right-aligned, everything else left-aligned, columns separated by two
//! spaces.

use crate::db::DATETIME_FORMAT;
use crate::models::{Reading, ReminderDetail};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Number(i64),
}

impl Cell {
    fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
        }
    }
}

/// A record that can be laid out as one table row.
pub trait TableRow {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<Cell>;
}

impl TableRow for Reading {
    fn headers() -> &'static [&'static str] {
        &["id", "title", "status", "created_at", "duration"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Number(self.id),
            Cell::Text(self.title.clone()),
            Cell::Text(self.status.to_string()),
            Cell::Text(self.created_at.format(DATETIME_FORMAT).to_string()),
            Cell::Number(i64::from(self.duration)),
        ]
    }
}

impl TableRow for ReminderDetail {
    fn headers() -> &'static [&'static str] {
        &["id", "reading_id", "reading_title", "reminder_datetime"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Number(self.id),
            Cell::Number(self.reading_id),
            Cell::Text(self.reading_title.clone()),
            Cell::Text(self.reminder_datetime.format(DATETIME_FORMAT).to_string()),
        ]
    }
}

/// Renders records as a table. No records renders as an empty string.
pub fn tabulate<T: TableRow>(records: &[T]) -> String {
    if records.is_empty() {
        return String::new();
    }

    let headers = T::headers();
    let rows: Vec<Vec<Cell>> = records.iter().map(TableRow::cells).collect();

    // A column is numeric only if every value in it is.
    let numeric: Vec<bool> = (0..headers.len())
        .map(|col| rows.iter().all(|row| matches!(row.get(col), Some(Cell::Number(_)))))
        .collect();

    let rendered: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(Cell::render).collect())
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            rendered
                .iter()
                .filter_map(|row| row.get(col))
                .map(|s| s.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(rendered.len() + 2);
    lines.push(render_line(headers.iter().copied(), &widths, &numeric));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in &rendered {
        lines.push(render_line(row.iter().map(String::as_str), &widths, &numeric));
    }

    lines.join("\n")
}

/// Wraps text in a fenced code block; empty text stays empty.
pub fn code_block(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("```\n{}\n```", text)
    }
}

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize], numeric: &[bool]) -> String {
    let parts: Vec<String> = cells
        .enumerate()
        .map(|(col, text)| pad(text, widths[col], numeric[col]))
        .collect();
    parts.join("  ").trim_end().to_string()
}

fn pad(text: &str, width: usize, right_align: bool) -> String {
    if right_align {
        format!("{:>width$}", text, width = width)
    } else {
        format!("{:<width$}", text, width = width)
    }
}
