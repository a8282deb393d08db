//! Table formatting utilities using comfy-table.

use comfy_table::{Cell, Table};
use owo_colors::OwoColorize;

/// One row of the task listing.
pub struct TaskRow {
    pub name: String,
    pub kind: &'static str,
    pub depends_on: Vec<String>,
    pub steps: Vec<String>,
}

fn styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(*h).add_attribute(comfy_table::Attribute::Bold))
                .collect::<Vec<_>>(),
        )
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "-".bright_black().to_string()
    } else {
        names.join(", ")
    }
}

/// Prints registered tasks with their kind, dependencies and pipeline steps.
pub fn print_task_table(rows: &[TaskRow]) {
    let mut table = styled_table(&["Task", "Kind", "Depends on", "Steps"]);

    for row in rows {
        let kind_color = match row.kind {
            "pipeline" => comfy_table::Color::Magenta,
            "group" => comfy_table::Color::DarkGrey,
            _ => comfy_table::Color::Cyan,
        };
        table.add_row(vec![
            Cell::new(&row.name).fg(comfy_table::Color::White),
            Cell::new(row.kind).fg(kind_color),
            Cell::new(join_or_none(&row.depends_on)),
            Cell::new(join_or_none(&row.steps)),
        ]);
    }

    println!("{}", table);
}

/// Prints graph edges as `from → to` with the edge kind.
pub fn print_edge_table(edges: &[(String, String, String)]) {
    let mut table = styled_table(&["Task", "Edge", "Target"]);

    for (from, to, kind) in edges {
        table.add_row(vec![
            Cell::new(from).fg(comfy_table::Color::White),
            Cell::new(kind).fg(comfy_table::Color::DarkGrey),
            Cell::new(to).fg(comfy_table::Color::Cyan),
        ]);
    }

    println!("{}", table);
}
