/// Terminal output helpers shared by the commands
use colored::*;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color as TableColor, ContentArrangement, Table};

use crate::updater::SourceStage;

pub fn section_header(title: &str) {
    println!("\n{} {}", "▶".cyan().bold(), title.bold());
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn failure(message: &str) {
    println!("{} {}", "✗".red().bold(), message);
}

/// A rounded table with a bold cyan header row
pub fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        header
            .iter()
            .map(|title| Cell::new(title).add_attribute(Attribute::Bold).fg(TableColor::Cyan)),
    );
    table
}

/// Two-column label/value table
pub fn print_stats_table(title: &str, stats: Vec<(&str, String)>) {
    let mut table = new_table(&[title, ""]);
    for (label, value) in stats {
        table.add_row(vec![Cell::new(label), Cell::new(value).fg(TableColor::Green)]);
    }
    println!("{}", table);
}

pub fn stage_cell(stage: SourceStage) -> Cell {
    let color = match stage {
        SourceStage::Committed => TableColor::Green,
        SourceStage::Skipped => TableColor::DarkGrey,
        SourceStage::FailedRolledBack => TableColor::Red,
        _ => TableColor::Yellow,
    };
    Cell::new(stage.name()).fg(color)
}

/// Thousands-separated integer
pub fn format_number<T: ToString>(n: T) -> String {
    let digits = n.to_string();
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest.to_string()),
        None => ("", digits),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}", sign, grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, "0")]
    #[test_case(999, "999")]
    #[test_case(1000, "1,000")]
    #[test_case(2_500_000, "2,500,000")]
    #[test_case(-12345, "-12,345")]
    fn test_format_number(n: i64, expected: &str) {
        assert_eq!(format_number(n), expected);
    }
}
