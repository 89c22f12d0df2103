//! Tag Inspector
//!
//! Reads a file's tags into a `TagSnapshot` and writes normalised updates back
//! through the configured `TagCodec`.
//!
//! The two transforms the pipeline relies on are public pure functions so any
//! caller can compute exactly what a passthrough rewrite would write:
//! - [`passthrough_updates`] - existing readable tags -> safe rewrite mapping
//! - [`merge_updates`] - existing tags + fetched metadata -> confident-match mapping
//! - [`virtualdj_compat`] - normalise fields VirtualDJ is known to misread

use crate::error::TagError;
use crate::types::{Metadata, TagCodec, TagField, TagSnapshot, TagUpdates};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Comment prefix marking a file this tool has tagged from a confident match
pub const PROCESSED_MARKER: &str = "<KAT_v1>";

/// Tag Inspector service
#[derive(Clone)]
pub struct TagInspector {
    codec: Arc<dyn TagCodec>,
}

impl TagInspector {
    pub fn new(codec: Arc<dyn TagCodec>) -> Self {
        Self { codec }
    }

    /// Read the current tag state
    ///
    /// # Errors
    /// `TagError::Unreadable` if the container cannot be parsed. The file is
    /// never modified by a read.
    pub fn read(&self, path: &Path) -> Result<TagSnapshot, TagError> {
        let snapshot = self.codec.read(path)?;
        debug!(
            file = %path.display(),
            container = snapshot.container(),
            fields = snapshot.tags().len(),
            "Read tags"
        );
        Ok(snapshot)
    }

    /// Write `updates`, applying the VirtualDJ transform first when asked
    ///
    /// The transform runs over the mapping before the single physical write.
    ///
    /// # Errors
    /// `TagError::Write` when the codec fails; the original file is left intact.
    pub fn write(
        &self,
        path: &Path,
        updates: &TagUpdates,
        ensure_virtualdj_compat: bool,
    ) -> Result<(), TagError> {
        let normalized;
        let to_write = if ensure_virtualdj_compat {
            normalized = virtualdj_compat(updates.clone());
            &normalized
        } else {
            updates
        };

        debug!(
            file = %path.display(),
            fields = to_write.len(),
            virtualdj_compat = ensure_virtualdj_compat,
            "Writing tags"
        );
        self.codec.write(path, to_write, ensure_virtualdj_compat)
    }

    /// Stable field -> value view of a file's tags for logging and debugging
    ///
    /// Every known field is present (empty when unset), plus `container` and
    /// `has_artwork`.
    pub fn dump(&self, path: &Path) -> Result<BTreeMap<String, String>, TagError> {
        let snapshot = self.codec.read(path)?;

        let mut printed: BTreeMap<String, String> = TagField::ALL
            .iter()
            .map(|field| {
                let value = snapshot.get(*field).unwrap_or_default().to_string();
                (field.as_str().to_string(), value)
            })
            .collect();
        printed.insert("container".to_string(), snapshot.container().to_string());
        printed.insert("has_artwork".to_string(), snapshot.has_artwork().to_string());

        Ok(printed)
    }
}

/// Build the update mapping for a passthrough rewrite of existing tags
///
/// Values are trimmed; blanks and the literal "None" some taggers store are
/// dropped; year is cut to its leading four digits. ISRC is never rewritten.
pub fn passthrough_updates(snapshot: &TagSnapshot) -> TagUpdates {
    snapshot
        .tags()
        .iter()
        .filter(|(field, _)| **field != TagField::Isrc)
        .filter_map(|(field, value)| {
            let value = clean_value(value)?;
            let value = match field {
                TagField::Year => normalize_year(&value)?,
                _ => value,
            };
            Some((*field, value))
        })
        .collect()
}

/// Build the update mapping for a confident match
///
/// Fetched metadata overwrites, with three exceptions:
/// - genre only fills a blank existing genre
/// - the existing comment is kept and prefixed with [`PROCESSED_MARKER`] once
/// - year is cut to four digits, or dropped when it has none
pub fn merge_updates(snapshot: &TagSnapshot, metadata: &Metadata) -> TagUpdates {
    let mut updates = metadata.to_tag_updates();

    if snapshot.get(TagField::Genre).and_then(clean_value).is_some() {
        updates.remove(&TagField::Genre);
    }

    if let Some(year) = updates.remove(&TagField::Year) {
        if let Some(year) = normalize_year(&year) {
            updates.insert(TagField::Year, year);
        }
    }

    let comment = match snapshot.get(TagField::Comment).map(str::trim) {
        None | Some("") => PROCESSED_MARKER.to_string(),
        Some(existing) if existing.starts_with(PROCESSED_MARKER) => existing.to_string(),
        Some(existing) => format!("{} {}", PROCESSED_MARKER, existing),
    };
    updates.insert(TagField::Comment, comment);

    updates
}

/// Normalise a mapping for VirtualDJ
///
/// - track/disc "03/12" becomes number "3" plus total "12" (an explicit total wins)
/// - numbering without a positive integer is dropped
/// - year is cut to four digits
/// - bpm is rounded to a whole number
///
/// Idempotent: applying it twice gives the same mapping as applying it once.
pub fn virtualdj_compat(mut updates: TagUpdates) -> TagUpdates {
    for value in updates.values_mut() {
        *value = value.trim().to_string();
    }

    split_numbering(&mut updates, TagField::TrackNumber, TagField::TrackTotal);
    split_numbering(&mut updates, TagField::DiscNumber, TagField::DiscTotal);

    if let Some(year) = updates.remove(&TagField::Year) {
        if let Some(year) = normalize_year(&year) {
            updates.insert(TagField::Year, year);
        }
    }

    if let Some(bpm) = updates.remove(&TagField::Bpm) {
        if let Some(bpm) = normalize_bpm(&bpm) {
            updates.insert(TagField::Bpm, bpm);
        }
    }

    updates.retain(|_, v| !v.is_empty());
    updates
}

/// Leading four digits of a date-like string ("2019-05-01" -> "2019")
pub fn normalize_year(value: &str) -> Option<String> {
    let value = value.trim();
    let year: String = value.chars().take(4).collect();
    if year.len() == 4 && year.chars().all(|c| c.is_ascii_digit()) {
        Some(year)
    } else {
        None
    }
}

fn split_numbering(updates: &mut TagUpdates, number_field: TagField, total_field: TagField) {
    let explicit_total = updates.remove(&total_field).and_then(|t| parse_positive(&t));

    let mut embedded_total = None;
    if let Some(raw) = updates.remove(&number_field) {
        let mut parts = raw.splitn(2, '/');
        let number = parts.next().and_then(parse_positive);
        embedded_total = parts.next().and_then(parse_positive);

        if let Some(number) = number {
            updates.insert(number_field, number);
        }
    }

    if let Some(total) = explicit_total.or(embedded_total) {
        updates.insert(total_field, total);
    }
}

fn parse_positive(value: &str) -> Option<String> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Some(n.to_string()),
        _ => None,
    }
}

fn normalize_bpm(value: &str) -> Option<String> {
    let bpm: f64 = value.trim().parse().ok()?;
    if bpm.is_finite() && bpm >= 1.0 {
        Some(format!("{}", bpm.round() as u32))
    } else {
        None
    }
}

fn clean_value(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value.to_string())
    }
}
