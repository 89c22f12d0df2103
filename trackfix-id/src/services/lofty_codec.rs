//! Tag codec backed by lofty
//!
//! Supports every container lofty understands (ID3v2/ID3v1, APE, Vorbis
//! comments, MP4 ilst, RIFF INFO, ...).
//!
//! Writes never touch the original file in place: the file is copied to a
//! hidden sibling temp file, tags are saved into the copy, and only then is the
//! copy renamed over the original. A crash or error at any point before the
//! rename leaves the original bytes untouched.
//!
//! With VirtualDJ compatibility on, ID3v2 tags are saved as v2.3.

use crate::error::TagError;
use crate::types::{TagCodec, TagField, TagSnapshot, TagUpdates};
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, FileType, TaggedFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// lofty-based `TagCodec`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyCodec;

impl LoftyCodec {
    pub fn new() -> Self {
        Self
    }
}

impl TagCodec for LoftyCodec {
    fn read(&self, path: &Path) -> Result<TagSnapshot, TagError> {
        let unreadable = |reason: String| TagError::Unreadable {
            path: path.to_path_buf(),
            reason,
        };

        let tagged_file = probe(path).map_err(unreadable)?;
        let container = container_name(tagged_file.file_type());

        let mut tags = BTreeMap::new();
        let mut has_artwork = false;

        // Try to get primary tag
        if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            for field in TagField::ALL {
                if let Some(value) = read_field(tag, field) {
                    tags.insert(field, value);
                }
            }
            has_artwork = !tag.pictures().is_empty();
        }

        Ok(TagSnapshot::new(path, container, tags, has_artwork))
    }

    fn write(
        &self,
        path: &Path,
        updates: &TagUpdates,
        ensure_virtualdj_compat: bool,
    ) -> Result<(), TagError> {
        let write_error = |reason: String| TagError::Write {
            path: path.to_path_buf(),
            reason,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let suffix = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        // Same directory so the final rename never crosses filesystems
        let temp = tempfile::Builder::new()
            .prefix(".trackfix-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(|e| write_error(format!("create temp file: {}", e)))?;

        // fs::copy also carries the permission bits over to the replacement
        std::fs::copy(path, temp.path())
            .map_err(|e| write_error(format!("copy to temp file: {}", e)))?;

        let mut tagged_file = probe(temp.path()).map_err(write_error)?;

        if tagged_file.primary_tag_mut().is_none() {
            let tag_type = tagged_file.primary_tag_type();
            tagged_file.insert_tag(Tag::new(tag_type));
        }

        {
            let tag = tagged_file
                .primary_tag_mut()
                .ok_or_else(|| write_error("no writable tag for this container".to_string()))?;

            for (field, value) in updates {
                if !insert_field(tag, *field, value) {
                    warn!(
                        file = %path.display(),
                        field = field.as_str(),
                        "Field not supported by this tag type, skipped"
                    );
                }
            }
        }

        // VirtualDJ reads ID3v2.3; lofty stores the year as TYER in that version
        let options = WriteOptions::default().use_id3v23(ensure_virtualdj_compat);

        tagged_file
            .save_to_path(temp.path(), options)
            .map_err(|e| write_error(format!("save tags: {}", e)))?;

        temp.persist(path)
            .map_err(|e| write_error(format!("replace original: {}", e.error)))?;

        debug!(file = %path.display(), fields = updates.len(), "Tags saved");
        Ok(())
    }
}

fn probe(path: &Path) -> Result<TaggedFile, String> {
    Probe::open(path)
        .map_err(|e| e.to_string())?
        .guess_file_type()
        .map_err(|e| e.to_string())?
        .read()
        .map_err(|e| e.to_string())
}

fn item_key(field: TagField) -> ItemKey {
    match field {
        TagField::Title => ItemKey::TrackTitle,
        TagField::Artist => ItemKey::TrackArtist,
        TagField::Album => ItemKey::AlbumTitle,
        TagField::AlbumArtist => ItemKey::AlbumArtist,
        TagField::Year => ItemKey::RecordingDate,
        TagField::Genre => ItemKey::Genre,
        TagField::Comment => ItemKey::Comment,
        TagField::Isrc => ItemKey::Isrc,
        TagField::TrackNumber => ItemKey::TrackNumber,
        TagField::TrackTotal => ItemKey::TrackTotal,
        TagField::DiscNumber => ItemKey::DiscNumber,
        TagField::DiscTotal => ItemKey::DiscTotal,
        TagField::Bpm => ItemKey::IntegerBpm,
    }
}

/// Set one field; BPM falls back to the decimal key for formats without an integer one
fn insert_field(tag: &mut Tag, field: TagField, value: &str) -> bool {
    if tag.insert_text(item_key(field), value.to_string()) {
        return true;
    }
    field == TagField::Bpm && tag.insert_text(ItemKey::Bpm, value.to_string())
}

fn read_field(tag: &Tag, field: TagField) -> Option<String> {
    let value = match field {
        // Formats disagree on where the year lives
        TagField::Year => tag
            .get_string(&ItemKey::Year)
            .or_else(|| tag.get_string(&ItemKey::RecordingDate)),
        TagField::Bpm => tag
            .get_string(&ItemKey::IntegerBpm)
            .or_else(|| tag.get_string(&ItemKey::Bpm)),
        _ => tag.get_string(&item_key(field)),
    };

    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn container_name(file_type: FileType) -> &'static str {
    match file_type {
        FileType::Mpeg => "MP3",
        FileType::Flac => "FLAC",
        FileType::Opus => "Opus",
        FileType::Vorbis => "OGG Vorbis",
        FileType::Aac => "AAC",
        FileType::Mp4 => "MP4",
        FileType::Aiff => "AIFF",
        FileType::Wav => "WAV",
        FileType::WavPack => "WavPack",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::tag::TagType;

    #[test]
    fn test_read_nonexistent_file() {
        let codec = LoftyCodec::new();
        let result = codec.read(Path::new("/nonexistent/file.mp3"));
        assert!(matches!(result, Err(TagError::Unreadable { .. })));
    }

    #[test]
    fn test_item_keys_distinct() {
        let mut keys: Vec<String> = TagField::ALL
            .iter()
            .map(|f| format!("{:?}", item_key(*f)))
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), TagField::ALL.len());
    }

    #[test]
    fn test_bpm_uses_integer_key_for_id3v2() {
        let mut tag = Tag::new(TagType::Id3v2);
        assert!(insert_field(&mut tag, TagField::Bpm, "124"));
        assert_eq!(read_field(&tag, TagField::Bpm).as_deref(), Some("124"));
    }
}
