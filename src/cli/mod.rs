//! Terminal front end. Formats output and forwards user actions to the core.

pub mod convert;
pub mod currencies;
pub mod history;
pub mod rates;
pub mod setup;
pub mod ui;
pub mod watch;

use crate::core::{RefreshOutcome, SnapshotView};

fn local_time(at: &chrono::DateTime<chrono::Utc>) -> String {
    at.with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// One-line summary of where the rates came from and how old they are.
pub fn rates_status(view: &SnapshotView) -> String {
    let Some(snapshot) = &view.snapshot else {
        return ui::style_text("No exchange rates available", ui::StyleType::Error);
    };

    let published = snapshot
        .source_updated_at
        .map(|at| format!(" (published {})", local_time(&at)))
        .unwrap_or_default();
    if view.fresh {
        ui::style_text(
            &format!("Updated: {}{}", local_time(&snapshot.fetched_at), published),
            ui::StyleType::Subtle,
        )
    } else {
        ui::style_text(
            &format!(
                "Offline: showing rates saved {}{}",
                local_time(&snapshot.fetched_at),
                published
            ),
            ui::StyleType::Warning,
        )
    }
}

/// Refreshes rates behind a spinner.
pub async fn refresh_with_spinner(app: &crate::App) -> RefreshOutcome {
    let pb = ui::new_spinner("Fetching exchange rates...");
    let outcome = app.rates.refresh().await;
    pb.finish_and_clear();

    if let Some(error) = outcome.error() {
        eprintln!(
            "{}",
            ui::style_text(
                &format!("Failed to fetch exchange rates: {error}"),
                ui::StyleType::Warning
            )
        );
    }
    outcome
}
