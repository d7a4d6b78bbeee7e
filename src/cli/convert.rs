use super::{rates_status, refresh_with_spinner, ui};
use crate::App;
use crate::core::{ConversionEntry, CurrencyPair, convert, currency};
use anyhow::{Result, bail};
use chrono::Utc;
use tracing::warn;

pub struct ConvertArgs {
    pub amount: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub reverse: bool,
    pub save: bool,
}

/// Picks the pair to convert with: explicit codes override the saved pair,
/// and `reverse` swaps whatever results.
pub fn resolve_pair(saved: &CurrencyPair, args: &ConvertArgs) -> CurrencyPair {
    let pair = CurrencyPair::new(
        args.from.as_deref().unwrap_or(&saved.from),
        args.to.as_deref().unwrap_or(&saved.to),
    );
    if args.reverse { pair.swapped() } else { pair }
}

pub async fn run(app: &App, args: ConvertArgs) -> Result<()> {
    let saved = app.preferences.load().await;
    let pair = resolve_pair(&saved, &args);

    refresh_with_spinner(app).await;
    let view = app.rates.current_snapshot().await;
    let Some(table) = view.table() else {
        bail!("No exchange rates available. Check your connection and try again.");
    };

    for code in [&pair.from, &pair.to] {
        if !table.contains(code) {
            bail!("Unknown currency: {code}");
        }
    }

    let Some(converted) = convert(&args.amount, &pair.from, &pair.to, Some(table)) else {
        bail!("Invalid amount: '{}'", args.amount);
    };

    // Only a pair that just converted is worth remembering
    if pair != saved {
        if let Err(e) = app.preferences.save(&pair).await {
            warn!("Failed to save currency pair: {}", e);
        }
    }

    println!(
        "{} {} {} = {} {} {}",
        currency::flag(&pair.from),
        args.amount.trim(),
        pair.from,
        currency::flag(&pair.to),
        ui::style_text(&converted, ui::StyleType::Amount),
        pair.to
    );
    if let Some(rate) = app.rates.rate(&pair.from, &pair.to).await {
        println!(
            "{}",
            ui::style_text(
                &format!("1 {} = {:.4} {}", pair.from, rate, pair.to),
                ui::StyleType::Subtle
            )
        );
    }
    println!("{}", rates_status(&view));

    if args.save {
        let Some(entry) =
            ConversionEntry::record(&pair.from, &pair.to, &args.amount, table, Utc::now())
        else {
            bail!("Only positive amounts can be saved");
        };
        let update = app.ledger.append(entry).await;
        if let Some(e) = update.persistence {
            eprintln!(
                "{}",
                ui::style_text(&format!("History was not saved: {e}"), ui::StyleType::Warning)
            );
        } else if let Some(saved) = update.entries.first() {
            println!("Saved to history as #{}", saved.id());
        }
    }
    Ok(())
}
