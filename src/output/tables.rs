use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color as TableColor, ContentArrangement, Table};

use crate::job_data::JobStatus;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn status_cell(status: Option<JobStatus>) -> Cell {
    let Some(status) = status else {
        return Cell::new("");
    };
    let cell = Cell::new(status);
    match status {
        JobStatus::Success => cell.fg(TableColor::Green),
        JobStatus::Failure => cell.fg(TableColor::Red).add_attribute(Attribute::Bold),
        JobStatus::Unstable => cell.fg(TableColor::DarkYellow).add_attribute(Attribute::Bold),
        JobStatus::InProgress => cell.fg(TableColor::Yellow),
        JobStatus::NotRun | JobStatus::Aborted | JobStatus::Undefined => {
            cell.fg(TableColor::DarkGrey)
        }
    }
}
