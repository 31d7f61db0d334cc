//! Ingestion layer: incremental tailing of transcript files
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │  Source Files   │ ──► │  LogTailer   │ ──► │ transcript::     │
//! │ (~/.claude/...) │     │ (offsets)    │     │   parse_line     │
//! └─────────────────┘     └──────────────┘     └──────────────────┘
//! ```
//!
//! The tailer remembers one byte offset per watched file and hands back only
//! the complete lines appended since the last read. Content that already
//! existed when a file was first seen is treated as history and skipped.
//!
//! Every I/O failure is swallowed here: a missing file, a permission error or
//! a truncation race turns into "no lines this time".

pub mod transcript;

pub use transcript::{parse_line, ContentBlock, EntryKind, TranscriptEntry};

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Extension of transcript files.
pub const TRANSCRIPT_EXTENSION: &str = "jsonl";

/// Returns true if `path` looks like a transcript file.
pub fn is_transcript(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == TRANSCRIPT_EXTENSION)
}

/// Find every transcript below `root`.
///
/// A missing root yields an empty list.
pub fn discover_transcripts(root: &Path) -> Vec<PathBuf> {
    let pattern = root.join("**").join(format!("*.{}", TRANSCRIPT_EXTENSION));
    let pattern_str = pattern.to_string_lossy();

    match glob::glob(&pattern_str) {
        Ok(entries) => entries.flatten().filter(|p| p.is_file()).collect(),
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "Invalid transcript glob pattern");
            Vec::new()
        }
    }
}

/// One transcript being tailed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedFile {
    pub path: PathBuf,
    /// Byte offset just past the last delivered line
    pub offset: u64,
}

/// Tracks read positions of transcript files.
#[derive(Debug, Default)]
pub struct LogTailer {
    offsets: HashMap<PathBuf, u64>,
}

impl LogTailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every transcript currently below `root` at its present size.
    ///
    /// Returns the number of files registered.
    pub fn prime(&mut self, root: &Path) -> usize {
        let files = discover_transcripts(root);
        for path in &files {
            self.on_file_added(path);
        }
        files.len()
    }

    /// A file appeared: its existing content counts as already seen.
    ///
    /// Re-adding a known path keeps the current offset.
    pub fn on_file_added(&mut self, path: &Path) {
        if self.offsets.contains_key(path) {
            return;
        }
        match std::fs::metadata(path) {
            Ok(metadata) => {
                tracing::debug!(path = %path.display(), size = metadata.len(), "Tracking transcript");
                self.offsets.insert(path.to_path_buf(), metadata.len());
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Cannot stat new transcript");
            }
        }
    }

    /// A file changed: return the complete non-blank lines appended since
    /// the last read, in file order.
    ///
    /// A path that was never added is read from the beginning.
    pub fn on_file_changed(&mut self, path: &Path) -> Vec<String> {
        let offset = self.offsets.get(path).copied().unwrap_or(0);

        match read_appended(path, offset) {
            Ok(Appended::Lines { lines, new_offset }) => {
                self.offsets.insert(path.to_path_buf(), new_offset);
                lines
            }
            Ok(Appended::Nothing) => {
                self.offsets.entry(path.to_path_buf()).or_insert(offset);
                Vec::new()
            }
            Ok(Appended::Truncated { size }) => {
                tracing::debug!(
                    path = %path.display(),
                    offset,
                    size,
                    "Transcript shrank, resetting offset"
                );
                self.offsets.insert(path.to_path_buf(), 0);
                Vec::new()
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Failed to read transcript");
                Vec::new()
            }
        }
    }

    /// A file went away: forget it.
    pub fn on_file_removed(&mut self, path: &Path) {
        if self.offsets.remove(path).is_some() {
            tracing::debug!(path = %path.display(), "Stopped tracking transcript");
        }
    }

    /// Current offset of a tracked file.
    pub fn offset(&self, path: &Path) -> Option<u64> {
        self.offsets.get(path).copied()
    }

    /// Snapshot of every tracked file.
    pub fn watched_files(&self) -> Vec<WatchedFile> {
        let mut files: Vec<_> = self
            .offsets
            .iter()
            .map(|(path, offset)| WatchedFile {
                path: path.clone(),
                offset: *offset,
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Forget every tracked file.
    pub fn clear(&mut self) {
        self.offsets.clear();
    }
}

enum Appended {
    Lines { lines: Vec<String>, new_offset: u64 },
    Nothing,
    Truncated { size: u64 },
}

fn read_appended(path: &Path, offset: u64) -> std::io::Result<Appended> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    if size < offset {
        return Ok(Appended::Truncated { size });
    }
    if size == offset {
        return Ok(Appended::Nothing);
    }

    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity((size - offset) as usize);
    file.take(size - offset).read_to_end(&mut buf)?;

    // Only complete lines; a trailing partial line waits for its newline
    let Some(last_newline) = buf.iter().rposition(|&b| b == b'\n') else {
        return Ok(Appended::Nothing);
    };
    let complete = &buf[..=last_newline];

    let lines = complete
        .split(|&b| b == b'\n')
        .map(String::from_utf8_lossy)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.into_owned())
        .collect();

    Ok(Appended::Lines {
        lines,
        new_offset: offset + complete.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_existing_content_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, "{\"old\":1}\n{\"old\":2}\n");

        let mut tailer = LogTailer::new();
        tailer.on_file_added(&path);
        assert_eq!(tailer.offset(&path), Some(20));
        assert!(tailer.on_file_changed(&path).is_empty());

        append(&path, "{\"new\":1}\n");
        assert_eq!(tailer.on_file_changed(&path), vec!["{\"new\":1}"]);
    }

    #[test]
    fn test_lines_in_file_order_without_blanks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, "");

        let mut tailer = LogTailer::new();
        tailer.on_file_added(&path);

        append(&path, "a\n\n   \nb\nc\n");
        assert_eq!(tailer.on_file_changed(&path), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_no_byte_range_is_delivered_twice() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, "");

        let mut tailer = LogTailer::new();
        tailer.on_file_added(&path);

        let mut delivered = Vec::new();
        let mut last_offset = 0;
        for chunk in ["one\ntw", "o\nthr", "ee\n", "", "four\n"] {
            append(&path, chunk);
            delivered.extend(tailer.on_file_changed(&path));
            let offset = tailer.offset(&path).unwrap();
            assert!(offset >= last_offset, "offset went backwards");
            last_offset = offset;
        }

        assert_eq!(delivered, vec!["one", "two", "three", "four"]);
        assert_eq!(last_offset, std::fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_partial_line_is_held_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, "");

        let mut tailer = LogTailer::new();
        tailer.on_file_added(&path);

        append(&path, "{\"half\":");
        assert!(tailer.on_file_changed(&path).is_empty());
        assert_eq!(tailer.offset(&path), Some(0));

        append(&path, "true}\n");
        assert_eq!(tailer.on_file_changed(&path), vec!["{\"half\":true}"]);
    }

    #[test]
    fn test_truncation_resets_offset_without_reading() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, "");

        let mut tailer = LogTailer::new();
        tailer.on_file_added(&path);
        append(&path, "first line\nsecond line\n");
        assert_eq!(tailer.on_file_changed(&path).len(), 2);

        std::fs::write(&path, "x\n").unwrap();
        assert!(tailer.on_file_changed(&path).is_empty());
        assert_eq!(tailer.offset(&path), Some(0));

        // Content written after the rotation is picked up from the start
        append(&path, "y\n");
        assert_eq!(tailer.on_file_changed(&path), vec!["x", "y"]);
    }

    #[test]
    fn test_duplicate_add_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, "");

        let mut tailer = LogTailer::new();
        tailer.on_file_added(&path);
        append(&path, "pending\n");
        tailer.on_file_added(&path);

        assert_eq!(tailer.on_file_changed(&path), vec!["pending"]);
        assert_eq!(tailer.len(), 1);
    }

    #[test]
    fn test_unknown_file_is_read_from_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.jsonl");
        append(&path, "early\n");

        let mut tailer = LogTailer::new();
        assert_eq!(tailer.on_file_changed(&path), vec!["early"]);
        assert_eq!(tailer.offset(&path), Some(6));
    }

    #[test]
    fn test_missing_file_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ghost.jsonl");

        let mut tailer = LogTailer::new();
        tailer.on_file_added(&path);
        assert!(tailer.on_file_changed(&path).is_empty());
        assert!(tailer.is_empty());
    }

    #[test]
    fn test_removed_file_is_forgotten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, "x\n");

        let mut tailer = LogTailer::new();
        tailer.on_file_added(&path);
        tailer.on_file_removed(&path);
        assert!(tailer.offset(&path).is_none());
    }

    #[test]
    fn test_prime_registers_nested_transcripts() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("-home-me-proj");
        std::fs::create_dir_all(project.join("sub")).unwrap();
        append(&project.join("a.jsonl"), "old\n");
        append(&project.join("sub").join("b.jsonl"), "older\n");
        append(&project.join("notes.txt"), "ignored\n");

        let mut tailer = LogTailer::new();
        assert_eq!(tailer.prime(dir.path()), 2);

        let files = tailer.watched_files();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.offset > 0));
        assert!(files.iter().all(|f| is_transcript(&f.path)));
    }

    #[test]
    fn test_prime_missing_root() {
        let mut tailer = LogTailer::new();
        assert_eq!(tailer.prime(Path::new("/definitely/not/here")), 0);
        assert!(tailer.is_empty());
    }
}
