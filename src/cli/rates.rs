use super::{rates_status, refresh_with_spinner, ui};
use crate::App;
use crate::core::currency;
use crate::core::rates::RateTable;
use anyhow::{Result, bail};
use comfy_table::Cell;

/// Renders the catalog currencies first, then every other code in the table.
pub fn display_rates(table: &RateTable) -> String {
    let mut out = ui::new_styled_table();
    out.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Name"),
        ui::header_cell(&format!("Per 1 {}", table.base())),
    ]);

    let listed = currency::catalog()
        .iter()
        .filter_map(|c| table.get(c.code).map(|rate| (c.code, rate)));
    let others = table
        .iter()
        .filter(|(code, _)| currency::lookup(code).is_none());

    for (code, rate) in listed.chain(others) {
        out.add_row(vec![
            Cell::new(format!("{} {}", currency::flag(code), code).trim().to_string()),
            Cell::new(currency::name(code)),
            ui::number_cell(format!("{rate:.4}")),
        ]);
    }
    out.to_string()
}

pub async fn run(app: &App) -> Result<()> {
    refresh_with_spinner(app).await;
    let view = app.rates.current_snapshot().await;

    let Some(snapshot) = &view.snapshot else {
        bail!("No exchange rates available. Check your connection and try again.");
    };

    println!("{}\n", display_rates(&snapshot.table));
    println!("{}", rates_status(&view));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_display_rates_lists_catalog_first() {
        let rates: BTreeMap<String, f64> = [("AED", 3.6725), ("EUR", 0.92), ("JPY", 152.5)]
            .iter()
            .map(|(c, r)| (c.to_string(), *r))
            .collect();
        let table = RateTable::new("USD", rates).unwrap();

        let output = display_rates(&table);
        let usd = output.find("US Dollar").unwrap();
        let eur = output.find("Euro").unwrap();
        let aed = output.find("AED").unwrap();
        assert!(usd < eur && eur < aed);
        assert!(output.contains("152.5000"));
        assert!(output.contains("Per 1 USD"));
    }
}
