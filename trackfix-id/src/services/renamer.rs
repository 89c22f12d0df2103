//! Renamer
//!
//! Renders a filename from a `{field}` template and moves the file there
//! without ever replacing another file. Clashes get a numeric suffix:
//! `name.ext`, `name (2).ext`, ... `name (999).ext`.

use crate::error::RenameError;
use crate::types::TemplateValues;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Highest suffix tried before giving up
const MAX_SUFFIX: u32 = 999;

/// Characters no supported filesystem accepts in a file name
const ILLEGAL_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// A computed, not yet applied rename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameProposal {
    pub src_path: PathBuf,
    /// Bare file name (no directory), extension included
    pub dest_name: String,
}

impl RenameProposal {
    /// True when the proposal names the file's current name
    pub fn is_noop(&self) -> bool {
        self.src_path
            .file_name()
            .is_some_and(|name| name.to_string_lossy() == self.dest_name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Renamer;

impl Renamer {
    pub fn new() -> Self {
        Self
    }

    /// Compute the destination name for `path`
    ///
    /// Missing placeholders render empty. If nothing usable is left after
    /// sanitising, the original stem is kept. The extension never changes.
    pub fn propose(
        &self,
        path: &Path,
        values: &TemplateValues,
        template: &str,
    ) -> Result<RenameProposal, RenameError> {
        let original_stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| RenameError::InvalidPath(path.to_path_buf()))?;

        let rendered = sanitize_component(&render_template(template, values));
        let stem = if rendered.is_empty() {
            original_stem
        } else {
            rendered
        };

        let dest_name = match path.extension() {
            Some(ext) => format!("{}.{}", stem, ext.to_string_lossy()),
            None => stem,
        };

        debug!(src = %path.display(), dest_name = %dest_name, "Proposed rename");

        Ok(RenameProposal {
            src_path: path.to_path_buf(),
            dest_name,
        })
    }

    /// Move the file to the proposed name, or the first free suffixed variant
    ///
    /// Returns the path the file now lives at.
    pub fn apply(&self, proposal: &RenameProposal) -> Result<PathBuf, RenameError> {
        let src = proposal.src_path.as_path();
        if proposal.is_noop() {
            return Ok(src.to_path_buf());
        }

        let dir = src
            .parent()
            .ok_or_else(|| RenameError::InvalidPath(src.to_path_buf()))?;
        let base = dir.join(&proposal.dest_name);

        for n in 1..=MAX_SUFFIX {
            let dest = if n == 1 {
                base.clone()
            } else {
                suffixed(&base, n)
            };

            if dest == src {
                // The file already carries this suffixed name.
                return Ok(src.to_path_buf());
            }

            if claim(src, &dest)? {
                info!(from = %src.display(), to = %dest.display(), "Renamed file");
                return Ok(dest);
            }

            debug!(dest = %dest.display(), "Destination taken, trying next suffix");
        }

        Err(RenameError::Collision {
            dest: base,
            attempts: MAX_SUFFIX,
        })
    }
}

/// Try to move `src` to `dest`; `Ok(false)` means `dest` belongs to another file
fn claim(src: &Path, dest: &Path) -> Result<bool, RenameError> {
    let io_err = |source: io::Error| RenameError::Io {
        path: src.to_path_buf(),
        source,
    };

    match fs::hard_link(src, dest) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(src) {
                let _ = fs::remove_file(dest);
                return Err(io_err(e));
            }
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            // Case-only renames on case-insensitive filesystems land here.
            if is_same_file(src, dest) {
                fs::rename(src, dest).map_err(io_err)?;
                return Ok(true);
            }
            Ok(false)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(io_err(e)),
        Err(_) => {
            // No hard links here (FAT, some network mounts).
            if dest.exists() && !is_same_file(src, dest) {
                return Ok(false);
            }
            fs::rename(src, dest).map_err(io_err)?;
            Ok(true)
        }
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// `dir/name.ext` -> `dir/name (n).ext`
fn suffixed(base: &Path, n: u32) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    };
    base.with_file_name(name)
}

/// Substitute `{field}` placeholders
///
/// Values are sanitised before substitution so they cannot introduce path
/// separators. Unknown fields render as "". An unclosed `{` is kept literally.
pub fn render_template(template: &str, values: &TemplateValues) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = after[..close].trim();
                if let Some(value) = values.get(key) {
                    out.push_str(&clean_value(value));
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Make `name` safe as a single path component
///
/// Removes `\ / : * ? " < > |` and control characters, collapses whitespace,
/// trims surrounding spaces and dots. May return an empty string.
pub fn sanitize_component(name: &str) -> String {
    clean_value(name)
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

fn clean_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && !c.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> TemplateValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_fields() {
        let v = values(&[("title", "Title"), ("artist", "Artist")]);
        assert_eq!(render_template("{artist}_{title}", &v), "Artist_Title");
        assert_eq!(render_template("{ title } - x", &v), "Title - x");
    }

    #[test]
    fn test_render_missing_and_unclosed() {
        let v = values(&[("title", "Title")]);
        assert_eq!(render_template("{title}_{artist}", &v), "Title_");
        assert_eq!(render_template("{title} {oops", &v), "Title {oops");
        assert_eq!(render_template("plain", &v), "plain");
    }

    #[test]
    fn test_values_cannot_add_separators() {
        let v = values(&[("title", "AC/DC: Live?")]);
        assert_eq!(render_template("{title}", &v), "ACDC Live");
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("  a  b\t c "), "a b c");
        assert_eq!(sanitize_component("..hidden.."), "hidden");
        assert_eq!(sanitize_component("a<b>c|d\u{7}"), "abcd");
        assert_eq!(sanitize_component(" . "), "");
    }

    #[test]
    fn test_propose_keeps_extension_and_falls_back() {
        let renamer = Renamer::new();
        let path = Path::new("/music/song.mp3");

        let p = renamer
            .propose(path, &values(&[("title", "T"), ("artist", "A")]), "{artist}_{title}")
            .unwrap();
        assert_eq!(p.dest_name, "A_T.mp3");

        let p = renamer.propose(path, &values(&[]), "{title}").unwrap();
        assert_eq!(p.dest_name, "song.mp3");
        assert!(p.is_noop());
    }

    #[test]
    fn test_suffixed() {
        assert_eq!(
            suffixed(Path::new("/d/Artist_Title.mp3"), 2),
            PathBuf::from("/d/Artist_Title (2).mp3")
        );
        assert_eq!(suffixed(Path::new("/d/noext"), 3), PathBuf::from("/d/noext (3)"));
    }

    #[test]
    fn test_apply_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("song.mp3");
        fs::write(&src, b"audio").unwrap();

        let renamer = Renamer::new();
        let proposal = RenameProposal {
            src_path: src.clone(),
            dest_name: "New.mp3".into(),
        };
        let new_path = renamer.apply(&proposal).unwrap();

        assert_eq!(new_path, dir.path().join("New.mp3"));
        assert!(!src.exists());
        assert_eq!(fs::read(&new_path).unwrap(), b"audio");
    }

    #[test]
    fn test_apply_missing_source_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let proposal = RenameProposal {
            src_path: dir.path().join("gone.mp3"),
            dest_name: "x.mp3".into(),
        };
        assert!(matches!(
            Renamer::new().apply(&proposal),
            Err(RenameError::Io { .. })
        ));
    }
}
