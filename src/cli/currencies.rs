use super::ui;
use crate::core::currency::{self, CurrencyInfo};
use comfy_table::Cell;

pub fn display_currencies(matches: &[&CurrencyInfo]) -> String {
    if matches.is_empty() {
        return ui::style_text("No matching currencies", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(""),
        ui::header_cell("Code"),
        ui::header_cell("Name"),
    ]);
    for info in matches {
        table.add_row(vec![
            Cell::new(info.flag),
            Cell::new(info.code),
            Cell::new(info.name),
        ]);
    }
    table.to_string()
}

pub fn run(term: Option<&str>) {
    let matches = currency::search(term.unwrap_or_default());
    println!("{}", display_currencies(&matches));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_currencies() {
        let output = display_currencies(&currency::search("franc"));
        assert!(output.contains("CHF"));
        assert!(!output.contains("EUR"));

        assert!(display_currencies(&[]).contains("No matching currencies"));
    }
}
