use super::ui;
use crate::App;
use crate::core::{ConversionEntry, EntryPatch, LedgerUpdate, Photo, PhotoSlot};
use anyhow::{Context, Result, bail};
use comfy_table::Cell;
use std::path::Path;

pub fn display_history(entries: &[ConversionEntry]) -> String {
    if entries.is_empty() {
        return ui::style_text("No saved conversions yet.", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("ID"),
        ui::header_cell("Saved"),
        ui::header_cell("From"),
        ui::header_cell("To"),
        ui::header_cell("Rate"),
        ui::header_cell("Store"),
        ui::header_cell("Rating"),
        ui::header_cell("Photos"),
    ]);

    for entry in entries {
        table.add_row(vec![
            Cell::new(entry.id()),
            Cell::new(
                entry
                    .timestamp()
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M"),
            ),
            ui::number_cell(format!("{} {}", entry.from_amount(), entry.from_currency())),
            ui::number_cell(format!("{} {}", entry.to_amount(), entry.to_currency())),
            ui::number_cell(format!("{:.4}", entry.rate())),
            ui::optional_text_cell(entry.store_name()),
            Cell::new(ui::stars(entry.rating())),
            ui::number_cell(entry.photos().len()),
        ]);
    }

    format!(
        "{}\n\n{}",
        ui::style_text("Recent conversions", ui::StyleType::Title),
        table
    )
}

fn report(update: &LedgerUpdate, id: i64) -> Result<()> {
    if !update.changed {
        bail!("No saved conversion with id {id}");
    }
    if let Some(e) = &update.persistence {
        eprintln!(
            "{}",
            ui::style_text(&format!("History was not saved: {e}"), ui::StyleType::Warning)
        );
    }
    Ok(())
}

pub async fn show(app: &App) -> Result<()> {
    println!("{}", display_history(&app.ledger.entries().await));
    Ok(())
}

pub async fn note(app: &App, id: i64, store: Option<String>, rating: Option<u8>) -> Result<()> {
    if store.is_none() && rating.is_none() {
        bail!("Nothing to update: pass --store and/or --rating");
    }
    let patch = EntryPatch {
        store_name: store,
        rating,
        ..Default::default()
    };
    let update = app.ledger.update(id, patch).await;
    report(&update, id)?;
    println!("Updated conversion #{id}");
    Ok(())
}

/// Attaches the image at `file` to a photo slot, or clears the slot when no
/// file is given. Images are stored by reference, and slot 2 is only usable
/// once slot 1 holds a photo.
pub async fn photo(app: &App, id: i64, slot: u8, file: Option<&Path>) -> Result<()> {
    let Some(slot) = PhotoSlot::from_number(slot) else {
        bail!("Photo slot must be 1 or 2");
    };

    let Some(entry) = app.ledger.get(id).await else {
        bail!("No saved conversion with id {id}");
    };
    if file.is_some() && slot.index() > entry.photos().len() {
        bail!("Photo slot 1 of conversion #{id} is empty; attach a photo there first");
    }

    let patch = match file {
        Some(path) => {
            let path = path
                .canonicalize()
                .with_context(|| format!("Failed to read photo: {}", path.display()))?;
            EntryPatch::attach_photo(slot, Photo::new(format!("file://{}", path.display())))
        }
        None => EntryPatch::detach_photo(slot),
    };

    let update = app.ledger.update(id, patch).await;
    report(&update, id)?;
    println!("Updated photos of conversion #{id}");
    Ok(())
}

pub async fn remove(app: &App, id: i64) -> Result<()> {
    let update = app.ledger.remove(id).await;
    report(&update, id)?;
    println!("Removed conversion #{id}");
    Ok(())
}

pub async fn clear(app: &App) -> Result<()> {
    let update = app.ledger.clear().await;
    if let Some(e) = &update.persistence {
        bail!("Failed to clear history: {e}");
    }
    println!("History cleared");
    Ok(())
}
