use super::{rates_status, ui};
use crate::App;
use anyhow::{Context, Result};
use tracing::info;

/// Shows the saved rates right away, then keeps them refreshed on the
/// configured interval until Ctrl-C.
pub async fn run(app: &App) -> Result<()> {
    let interval = app.config.refresh_interval();
    println!(
        "{}",
        ui::style_text(
            &format!(
                "Refreshing {} rates every {}s. Press Ctrl-C to stop.",
                app.rates.base(),
                interval.as_secs()
            ),
            ui::StyleType::Subtle
        )
    );

    if app.rates.load_cached().await {
        println!("{}", rates_status(&app.rates.current_snapshot().await));
    }

    let handle = app.rates.schedule_periodic_refresh(interval);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Stopping periodic refresh");
    handle.cancel_and_wait().await;
    println!("{}", rates_status(&app.rates.current_snapshot().await));
    Ok(())
}
