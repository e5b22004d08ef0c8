use super::ui;
use crate::{BookOutcome, BookStatus};
use comfy_table::{Cell, CellAlignment, Color};

fn status_cell(status: &BookStatus) -> Cell {
    let color = match status {
        BookStatus::Updated => Color::Green,
        BookStatus::UpToDate => Color::DarkGrey,
        BookStatus::DryRun => Color::Yellow,
        BookStatus::Skipped(_) => Color::Red,
    };
    Cell::new(status.to_string()).fg(color)
}

/// Renders the per-workbook results of a run.
pub fn display_outcomes(outcomes: &[BookOutcome]) -> String {
    if outcomes.is_empty() {
        return ui::style_text("No workbooks processed.", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Workbook"),
        ui::header_cell("Last update"),
        ui::header_cell("Hours since"),
        ui::header_cell("Rows added"),
        ui::header_cell("Status"),
    ]);

    for outcome in outcomes {
        let name = outcome
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| outcome.path.display().to_string());

        table.add_row(vec![
            Cell::new(name),
            ui::format_optional_cell(outcome.last_update, |d| {
                d.format("%d.%m.%Y %H:%M").to_string()
            }),
            ui::format_optional_cell(outcome.hours_since, |h| h.to_string()),
            Cell::new(outcome.rows_updated).set_alignment(CellAlignment::Right),
            status_cell(&outcome.status),
        ]);
    }

    let updated: u32 = outcomes.iter().map(|o| o.rows_updated).sum();
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o.status, BookStatus::Skipped(_)))
        .count();

    let mut output = format!(
        "{}\n\n",
        ui::style_text("Price book update", ui::StyleType::Title)
    );
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n\nRows added: {}",
        ui::style_text(&updated.to_string(), ui::StyleType::Success)
    ));
    if skipped > 0 {
        output.push_str(&format!(
            "  Skipped: {}",
            ui::style_text(&skipped.to_string(), ui::StyleType::Error)
        ));
    }
    output
}
