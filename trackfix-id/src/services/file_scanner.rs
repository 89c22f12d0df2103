//! Audio file scanner
//!
//! Expands the command-line inputs of a batch run into a list of audio files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Extensions accepted even when magic bytes are inconclusive
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "oga", "opus", "m4a", "aac", "mp4", "wav", "aiff", "aif", "wv", "ape",
    "mpc", "spx",
];

/// Recursive audio file discovery
pub struct FileScanner {
    ignore_patterns: Vec<String>,
    max_depth: Option<usize>,
}

impl FileScanner {
    /// Scanner with the default system-file ignore list
    pub fn new() -> Self {
        Self {
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                "desktop.ini".to_string(),
                "@eaDir".to_string(),
            ],
            max_depth: None,
        }
    }

    /// Only descend `depth` levels below the root (1 = the root's own entries)
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Audio files under `root_path`, sorted by path
    ///
    /// Unreadable entries are logged and skipped.
    pub fn scan(&self, root_path: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root_path.exists() {
            return Err(ScanError::PathNotFound(root_path.to_path_buf()));
        }
        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        let mut symlink_visited = HashSet::new();
        let mut files = Vec::new();

        let walker = WalkDir::new(root_path)
            .follow_links(false)
            .max_depth(self.max_depth.unwrap_or(usize::MAX))
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || self.should_process_entry(e, &mut symlink_visited));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if self.is_audio_file(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Error accessing entry: {}", e),
            }
        }

        tracing::debug!(root = %root_path.display(), count = files.len(), "Scan complete");
        Ok(files)
    }

    /// Expand a mix of files and directories
    ///
    /// Files are taken as given (the pipeline reports them if unreadable).
    /// Directories are scanned when `recursive` is set and skipped otherwise.
    pub fn expand(&self, inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>, ScanError> {
        let mut files = Vec::new();
        for input in inputs {
            if input.is_dir() {
                if recursive {
                    files.extend(self.scan(input)?);
                } else {
                    tracing::warn!(path = %input.display(), "Skipping directory (use --recursive)");
                }
            } else if input.exists() {
                files.push(input.clone());
            } else {
                return Err(ScanError::PathNotFound(input.clone()));
            }
        }
        Ok(files)
    }

    fn should_process_entry(&self, entry: &DirEntry, symlink_visited: &mut HashSet<PathBuf>) -> bool {
        let file_name = entry.file_name().to_string_lossy();

        // Hidden entries, including .git and our own temp files
        if file_name.starts_with('.') {
            return false;
        }
        if self.ignore_patterns.iter().any(|p| file_name == p.as_str()) {
            return false;
        }

        if entry.path_is_symlink() {
            if let Ok(canonical) = entry.path().canonicalize() {
                if !symlink_visited.insert(canonical) {
                    tracing::warn!("Symlink loop detected: {}", entry.path().display());
                    return false;
                }
            }
        }

        true
    }

    /// Magic bytes first, extension as fallback
    fn is_audio_file(&self, path: &Path) -> bool {
        match infer::get_from_path(path) {
            Ok(Some(kind)) if kind.matcher_type() == infer::MatcherType::Audio => return true,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Error verifying {}: {}", path.display(), e);
                return false;
            }
        }

        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| is_audio_extension(&ext))
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn is_audio_extension(ext: &str) -> bool {
    AUDIO_EXTENSIONS.contains(&ext)
}
