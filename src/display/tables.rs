//! Table formatting utilities for structured output.

use comfy_table::{
    Attribute, Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

use crate::indexer::BuildStats;
use crate::resolver::RetrievedMatch;
use crate::store::Payload;
use crate::types::TableKind;

/// Longest text excerpt shown in a results table.
const EXCERPT_CHARS: usize = 80;

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    /// Create a new table builder.
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.apply_modifier(UTF8_ROUND_CORNERS);
        Self { table }
    }

    /// Set the table headers.
    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    /// Add a row to the table.
    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Build and return the formatted table.
    pub fn build(self) -> String {
        self.table.to_string()
    }
}

/// The column most worth showing for a matched row.
fn excerpt(table: TableKind, payload: &Payload) -> String {
    let columns: &[&str] = match table {
        TableKind::CustomerReview => &["review_text_cleaned", "review_text"],
        TableKind::MedicalRecord => &["symptoms_cleaned", "doctor_notes_cleaned", "symptoms"],
    };

    let text = columns
        .iter()
        .find_map(|c| payload.get(*c).and_then(|v| v.as_str()))
        .unwrap_or("");

    if text.chars().count() > EXCERPT_CHARS {
        let cut: String = text.chars().take(EXCERPT_CHARS).collect();
        format!("{cut}…")
    } else {
        text.to_string()
    }
}

/// Create the results table for a query.
pub fn create_matches_table(matches: &[RetrievedMatch]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);

    table.set_header(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Key").add_attribute(Attribute::Bold),
        Cell::new("Table").add_attribute(Attribute::Bold),
        Cell::new("Distance").add_attribute(Attribute::Bold),
        Cell::new("Text").add_attribute(Attribute::Bold),
    ]);

    for (rank, m) in matches.iter().enumerate() {
        let color = match m.table {
            TableKind::CustomerReview => Color::Cyan,
            TableKind::MedicalRecord => Color::Magenta,
        };
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(m.key.to_string()).fg(color),
            Cell::new(m.table.table_name()),
            Cell::new(format!("{:.4}", m.distance.get())),
            Cell::new(excerpt(m.table, &m.payload)),
        ]);
    }

    table.to_string()
}

/// Create a summary table for a completed build.
pub fn create_build_summary_table(stats: &BuildStats) -> String {
    let rate = if stats.elapsed.as_secs_f64() > 0.0 {
        stats.total() as f64 / stats.elapsed.as_secs_f64()
    } else {
        0.0
    };

    TableBuilder::new()
        .set_headers(vec!["Metric", "Value"])
        .add_row(vec![
            TableKind::CustomerReview.table_name().to_string(),
            stats.reviews.to_string(),
        ])
        .add_row(vec![
            TableKind::MedicalRecord.table_name().to_string(),
            stats.medical_records.to_string(),
        ])
        .add_row(vec!["Total vectors".to_string(), stats.total().to_string()])
        .add_row(vec!["Dimension".to_string(), stats.dimension.to_string()])
        .add_row(vec![
            "Artifact".to_string(),
            stats.index_path.display().to_string(),
        ])
        .add_row(vec![
            "Time".to_string(),
            format!("{:?} ({rate:.0} records/s)", stats.elapsed),
        ])
        .build()
}
