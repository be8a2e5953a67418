//! Source location tracking for diagnostics.
//!
//! - `Span`: compact byte range inside one source file
//! - `SourceMap`: owns every loaded source file and turns spans into
//!   `path:line:col` locations
//!
//! ```
//! # use ard_ast::span::*;
//! # use std::path::PathBuf;
//! let mut map = SourceMap::new();
//! let file_id = map.add_file(PathBuf::from("main.ard"), "let x = 42\nlet y = 13".to_string());
//! let span = Span::new(file_id, 11, 21);
//!
//! assert_eq!(map.snippet(&span), "let y = 13");
//! assert_eq!(map.line_col(&span), (2, 1));
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Byte range in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Index into `SourceMap::files`
    pub file_id: u16,
    /// Byte offset of the first character
    pub start: u32,
    /// Byte offset one past the last character
    pub end: u32,
}

impl Span {
    pub fn new(file_id: u16, start: u32, end: u32) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    /// Zero-length span at the start of a file.
    pub fn zero(file_id: u16) -> Self {
        Self::new(file_id, 0, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Length of the span in bytes.
    ///
    /// # Panics
    /// Panics if `end < start` (malformed span).
    pub fn len(&self) -> u32 {
        assert!(
            self.end >= self.start,
            "malformed span: end ({}) < start ({})",
            self.end,
            self.start
        );
        self.end - self.start
    }

    /// Span covering both `self` and `other`.
    ///
    /// # Panics
    /// Panics if the spans belong to different files.
    pub fn merge(&self, other: &Span) -> Span {
        assert_eq!(
            self.file_id, other.file_id,
            "cannot merge spans from different files"
        );
        Span {
            file_id: self.file_id,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Every source file taking part in one compilation.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

/// A single source file with a line index.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
    /// Byte offset of every line start, plus an EOF sentinel.
    line_starts: Vec<u32>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Adds a file and returns its id.
    pub fn add_file(&mut self, path: PathBuf, source: String) -> u16 {
        let file_id = self.files.len();
        assert!(file_id < u16::MAX as usize, "too many source files");
        self.files.push(SourceFile::new(path, source));
        file_id as u16
    }

    pub fn file(&self, file_id: u16) -> Option<&SourceFile> {
        self.files.get(file_id as usize)
    }

    pub fn file_path(&self, span: &Span) -> Option<&Path> {
        self.file(span.file_id).map(|file| file.path.as_path())
    }

    /// Source text covered by `span`, or `""` for an unknown file.
    pub fn snippet(&self, span: &Span) -> &str {
        self.file(span.file_id)
            .and_then(|file| file.source.get(span.start as usize..span.end as usize))
            .unwrap_or("")
    }

    /// 1-based `(line, column)` of the span start.
    pub fn line_col(&self, span: &Span) -> (u32, u32) {
        self.file(span.file_id)
            .map(|file| file.line_col(span.start))
            .unwrap_or((1, 1))
    }

    /// `path:line:col` for the span start.
    pub fn location(&self, span: &Span) -> String {
        let (line, col) = self.line_col(span);
        match self.file_path(span) {
            Some(path) => format!("{}:{line}:{col}", path.display()),
            None => format!("<unknown>:{line}:{col}"),
        }
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl SourceFile {
    pub fn new(path: PathBuf, source: String) -> Self {
        let line_starts = compute_line_starts(&source);
        Self {
            path,
            source,
            line_starts,
        }
    }

    /// 1-based `(line, column)` for a byte offset; offsets past EOF clamp to EOF.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let offset = offset.min(self.source.len() as u32);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.max(1) - 1,
        };
        let line = (line_idx + 1) as u32;
        let col = (offset - self.line_starts[line_idx]) + 1;
        (line, col)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len() - 1
    }
}

/// Byte offsets of line starts; the last entry is the EOF sentinel.
fn compute_line_starts(source: &str) -> Vec<u32> {
    let mut line_starts = vec![0];
    for (idx, ch) in source.char_indices() {
        if ch == '\n' {
            line_starts.push((idx + 1) as u32);
        }
    }
    if line_starts.last() != Some(&(source.len() as u32)) {
        line_starts.push(source.len() as u32);
    }
    line_starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge() {
        let merged = Span::new(0, 10, 20).merge(&Span::new(0, 15, 30));
        assert_eq!(merged, Span::new(0, 10, 30));
        assert_eq!(merged.len(), 20);
    }

    #[test]
    fn test_line_col_lookup() {
        let file = SourceFile::new(PathBuf::from("a.ard"), "ab\ncd\n\nef".to_string());
        assert_eq!(file.line_col(0), (1, 1));
        assert_eq!(file.line_col(4), (2, 2));
        assert_eq!(file.line_col(6), (3, 1));
        assert_eq!(file.line_col(8), (4, 2));
        assert_eq!(file.line_count(), 4);
    }

    #[test]
    fn test_location_formatting() {
        let mut map = SourceMap::new();
        let id = map.add_file(PathBuf::from("main.ard"), "let x = 1\nlet y".to_string());
        assert_eq!(map.location(&Span::new(id, 14, 15)), "main.ard:2:5");
        assert_eq!(map.location(&Span::new(9, 0, 0)), "<unknown>:1:1");
    }
}
