//! The bounded history of saved conversions.
//!
//! The ledger holds at most [`MAX_ENTRIES`] entries, newest first. Every
//! mutation rewrites the whole sequence to storage before the next operation
//! may start.

use crate::core::convert::{convert, effective_rate, parse_amount};
use crate::core::rates::RateTable;
use crate::core::storage::{HISTORY_KEY, KeyValueStorage, PersistenceError, put_json};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const MAX_ENTRIES: usize = 10;
pub const MAX_PHOTOS: usize = 2;
pub const MAX_RATING: u8 = 5;

/// An image attached to an entry: a `data:` URL or an opaque object reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Photo(String);

impl Photo {
    pub fn new(reference: impl Into<String>) -> Self {
        Photo(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSlot {
    First,
    Second,
}

impl PhotoSlot {
    pub fn index(self) -> usize {
        match self {
            PhotoSlot::First => 0,
            PhotoSlot::Second => 1,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(PhotoSlot::First),
            2 => Some(PhotoSlot::Second),
            _ => None,
        }
    }
}

/// A saved conversion. Only the store name, rating and photos change after
/// creation, and only through [`ConversionLedger::update`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionEntry {
    id: i64,
    from_currency: String,
    to_currency: String,
    from_amount: String,
    to_amount: String,
    rate: f64,
    timestamp: DateTime<Utc>,
    store_name: String,
    rating: u8,
    photos: Vec<Photo>,
}

impl ConversionEntry {
    /// Converts `from_amount` with `table` and captures the rate in effect now.
    /// Returns `None` when the amount is not positive or a code is unknown.
    pub fn record(
        from: &str,
        to: &str,
        from_amount: &str,
        table: &RateTable,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let amount = parse_amount(from_amount)?;
        if amount.is_zero() {
            return None;
        }
        let to_amount = convert(from_amount, from, to, Some(table))?;
        let rate = effective_rate(from, to, table)?;

        Some(ConversionEntry {
            id: now.timestamp_millis(),
            from_currency: from.to_string(),
            to_currency: to.to_string(),
            from_amount: from_amount.trim().to_string(),
            to_amount,
            rate,
            timestamp: now,
            store_name: String::new(),
            rating: 0,
            photos: Vec::new(),
        })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn from_currency(&self) -> &str {
        &self.from_currency
    }

    pub fn to_currency(&self) -> &str {
        &self.to_currency
    }

    pub fn from_amount(&self) -> &str {
        &self.from_amount
    }

    pub fn to_amount(&self) -> &str {
        &self.to_amount
    }

    /// The from→to rate when the entry was saved.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn rating(&self) -> u8 {
        self.rating
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    /// A photo can only go into the next free slot or replace an existing one;
    /// the sequence never has a gap.
    fn accepts(&self, patch: &EntryPatch) -> bool {
        let photos = patch
            .photos
            .as_ref()
            .map_or(self.photos.len(), |p| p.len().min(MAX_PHOTOS));
        match &patch.photo_slot {
            Some((slot, Some(_))) => slot.index() <= photos,
            _ => true,
        }
    }

    fn apply(&mut self, patch: EntryPatch) {
        if let Some(store_name) = patch.store_name {
            self.store_name = store_name;
        }
        if let Some(rating) = patch.rating {
            self.rating = rating.min(MAX_RATING);
        }
        if let Some(mut photos) = patch.photos {
            photos.truncate(MAX_PHOTOS);
            self.photos = photos;
        }
        if let Some((slot, photo)) = patch.photo_slot {
            let index = slot.index();
            match photo {
                Some(photo) if index < self.photos.len() => self.photos[index] = photo,
                Some(photo) => self.photos.push(photo),
                None if index < self.photos.len() => {
                    self.photos.remove(index);
                }
                None => {}
            }
        }
    }
}

/// Changes to the mutable fields of an entry. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub store_name: Option<String>,
    pub rating: Option<u8>,
    pub photos: Option<Vec<Photo>>,
    /// Sets (`Some`) or clears (`None`) one photo slot. Clearing the first slot
    /// moves the second photo into it.
    pub photo_slot: Option<(PhotoSlot, Option<Photo>)>,
}

impl EntryPatch {
    pub fn store_name(name: impl Into<String>) -> Self {
        EntryPatch {
            store_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn rating(rating: u8) -> Self {
        EntryPatch {
            rating: Some(rating),
            ..Default::default()
        }
    }

    /// Replaces the photo in `slot`. The second slot can only be filled once the
    /// first one holds a photo; otherwise the ledger rejects the patch.
    pub fn attach_photo(slot: PhotoSlot, photo: Photo) -> Self {
        EntryPatch {
            photo_slot: Some((slot, Some(photo))),
            ..Default::default()
        }
    }

    pub fn detach_photo(slot: PhotoSlot) -> Self {
        EntryPatch {
            photo_slot: Some((slot, None)),
            ..Default::default()
        }
    }
}

/// Result of a ledger mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerUpdate {
    pub entries: Vec<ConversionEntry>,
    /// False when the operation was a no-op: an unknown id, a photo for the
    /// second slot while the first is empty, or an id that cannot be advanced.
    pub changed: bool,
    /// Set when the new sequence could not be written. The in-memory ledger is
    /// still updated.
    pub persistence: Option<PersistenceError>,
}

pub struct ConversionLedger {
    storage: Arc<dyn KeyValueStorage>,
    entries: Mutex<Vec<ConversionEntry>>,
}

impl ConversionLedger {
    /// Creates an empty ledger; call [`ConversionLedger::load`] to read history.
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        ConversionLedger {
            storage,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Reads the persisted history, upgrading older layouts. Unreadable history
    /// is deleted and treated as empty.
    pub async fn load(&self) -> Vec<ConversionEntry> {
        let mut entries = self.entries.lock().await;

        let text = match self.storage.get(HISTORY_KEY).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!("No saved history");
                entries.clear();
                return Vec::new();
            }
            Err(e) => {
                warn!("Failed to read history: {}", e);
                entries.clear();
                return Vec::new();
            }
        };

        let raw: Vec<Value> = match serde_json::from_str(&text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Discarding corrupted history: {}", e);
                if let Err(e) = self.storage.remove(HISTORY_KEY).await {
                    warn!("Failed to remove corrupted history: {}", e);
                }
                entries.clear();
                return Vec::new();
            }
        };

        let mut loaded: Vec<ConversionEntry> = raw.iter().filter_map(normalize_entry).collect();
        loaded.truncate(MAX_ENTRIES);

        let canonical = serde_json::to_value(&loaded).ok();
        if canonical.as_ref() != Some(&Value::Array(raw)) {
            info!("Upgrading saved history to the current layout");
            if let Err(e) = put_json(self.storage.as_ref(), HISTORY_KEY, &loaded).await {
                warn!("Failed to rewrite history: {}", e);
            }
        }

        debug!(entries = loaded.len(), "Loaded history");
        *entries = loaded.clone();
        loaded
    }

    pub async fn entries(&self) -> Vec<ConversionEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn get(&self, id: i64) -> Option<ConversionEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Inserts `entry` as the newest and evicts the oldest beyond the cap. The
    /// id is bumped if needed so ids keep increasing.
    pub async fn append(&self, mut entry: ConversionEntry) -> LedgerUpdate {
        let mut entries = self.entries.lock().await;

        if let Some(newest) = entries.first() {
            if entry.id <= newest.id {
                let Some(next) = newest.id.checked_add(1) else {
                    warn!("No entry id left after {}, not saving", newest.id);
                    return unchanged(&entries);
                };
                debug!("Bumping entry id {} past {}", entry.id, newest.id);
                entry.id = next;
            }
        }
        entries.insert(0, entry);
        entries.truncate(MAX_ENTRIES);

        self.persist(&entries).await
    }

    /// Applies `patch` to the entry with `id`. Unknown ids are ignored.
    pub async fn update(&self, id: i64, patch: EntryPatch) -> LedgerUpdate {
        let mut entries = self.entries.lock().await;

        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            debug!("No entry with id {} to update", id);
            return unchanged(&entries);
        };
        if !entry.accepts(&patch) {
            debug!("Rejecting photo for an empty earlier slot of entry {}", id);
            return unchanged(&entries);
        }
        entry.apply(patch);

        self.persist(&entries).await
    }

    pub async fn remove(&self, id: i64) -> LedgerUpdate {
        let mut entries = self.entries.lock().await;

        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            debug!("No entry with id {} to remove", id);
            return unchanged(&entries);
        }

        self.persist(&entries).await
    }

    /// Empties the ledger and deletes the stored history key.
    pub async fn clear(&self) -> LedgerUpdate {
        let mut entries = self.entries.lock().await;
        entries.clear();

        let persistence = self
            .storage
            .remove(HISTORY_KEY)
            .await
            .err()
            .map(PersistenceError::from);
        if let Some(e) = &persistence {
            warn!("Failed to delete history: {}", e);
        }
        LedgerUpdate {
            entries: Vec::new(),
            changed: true,
            persistence,
        }
    }

    async fn persist(&self, entries: &[ConversionEntry]) -> LedgerUpdate {
        let persistence = put_json(self.storage.as_ref(), HISTORY_KEY, entries)
            .await
            .err();
        if let Some(e) = &persistence {
            warn!("Failed to save history: {}", e);
        }
        LedgerUpdate {
            entries: entries.to_vec(),
            changed: true,
            persistence,
        }
    }
}

fn unchanged(entries: &[ConversionEntry]) -> LedgerUpdate {
    LedgerUpdate {
        entries: entries.to_vec(),
        changed: false,
        persistence: None,
    }
}

/// Persisted entry as written by any layout so far: photos either as a list or
/// as `photo1`/`photo2`, amounts as strings or numbers, and timestamps as
/// RFC 3339, epoch milliseconds or free-form locale text.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    id: Option<Value>,
    from_currency: Option<String>,
    to_currency: Option<String>,
    from_amount: Option<Value>,
    to_amount: Option<Value>,
    rate: Option<f64>,
    timestamp: Option<Value>,
    store_name: Option<String>,
    rating: Option<f64>,
    photos: Option<Vec<Option<String>>>,
    photo1: Option<String>,
    photo2: Option<String>,
}

fn amount_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn normalize_entry(value: &Value) -> Option<ConversionEntry> {
    let stored: StoredEntry = match serde_json::from_value(value.clone()) {
        Ok(stored) => stored,
        Err(e) => {
            warn!("Dropping unreadable history entry: {}", e);
            return None;
        }
    };

    let id = match stored.id.as_ref() {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .filter(|id| *id > 0);
    let (Some(id), Some(from_currency), Some(to_currency)) =
        (id, stored.from_currency, stored.to_currency)
    else {
        warn!("Dropping history entry without a valid id or currencies");
        return None;
    };
    let from_amount = stored.from_amount.as_ref().and_then(amount_text)?;
    let to_amount = stored.to_amount.as_ref().and_then(amount_text)?;

    let rate = match stored.rate {
        Some(rate) if rate.is_finite() && rate > 0.0 => rate,
        _ => {
            let from = parse_amount(&from_amount).filter(|a| !a.is_zero())?;
            let to = parse_amount(&to_amount)?;
            (to / from).to_f64()?
        }
    };

    let timestamp = match stored.timestamp.as_ref() {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Some(Value::Number(n)) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
    .or_else(|| Utc.timestamp_millis_opt(id).single())
    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let photos: Vec<Photo> = match stored.photos {
        Some(photos) => photos.into_iter().flatten().collect::<Vec<_>>(),
        None => [stored.photo1, stored.photo2].into_iter().flatten().collect(),
    }
    .into_iter()
    .filter(|p| !p.is_empty())
    .take(MAX_PHOTOS)
    .map(Photo)
    .collect();

    Some(ConversionEntry {
        id,
        from_currency: from_currency.trim().to_ascii_uppercase(),
        to_currency: to_currency.trim().to_ascii_uppercase(),
        from_amount,
        to_amount,
        rate,
        timestamp,
        store_name: stored.store_name.unwrap_or_default(),
        rating: stored
            .rating
            .filter(|r| r.is_finite())
            .map_or(0, |r| r.round().clamp(0.0, MAX_RATING as f64) as u8),
        photos,
    })
}
