//! The source database: loaded files and span resolution.

use crate::span::{FileId, Span};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// One loaded source file: its path, its text, and a line-start index.
#[derive(Debug)]
pub struct SourceFile {
    /// The ID assigned by the owning [`SourceDb`].
    pub id: FileId,
    /// The path the file was loaded from (or a synthetic name for tests).
    pub path: PathBuf,
    /// The full file content.
    pub content: String,
    /// Byte offset of the first character of each line.
    line_starts: Vec<u32>,
}

impl SourceFile {
    /// Builds a standalone source file with its line index.
    ///
    /// Most callers go through [`SourceDb::load`]; the module cache builds
    /// files directly so it can share them across cached modules.
    pub fn new(id: FileId, path: PathBuf, content: String) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in content.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self {
            id,
            path,
            content,
            line_starts,
        }
    }

    /// Converts a byte offset into 1-based `(line, column)` coordinates.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let col = offset - self.line_starts[line];
        (line as u32 + 1, col + 1)
    }

    /// Returns the source text inside `[start, end)`.
    pub fn snippet(&self, start: u32, end: u32) -> &str {
        &self.content[start as usize..end as usize]
    }

    /// The directory containing this file, used for sibling-module lookup.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// A span resolved to a path and 1-based line/column coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSpan {
    /// The path of the file the span is in.
    pub path: PathBuf,
    /// 1-based line of the span start.
    pub line: u32,
    /// 1-based column of the span start.
    pub col: u32,
}

impl fmt::Display for ResolvedSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.col)
    }
}

/// Owns the text of every loaded source file and maps spans to locations.
///
/// All parsing borrows text from the database, so it must outlive the parse;
/// the resolver keeps one database per cache.
pub struct SourceDb {
    files: Vec<SourceFile>,
}

impl SourceDb {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Reads a file from disk and registers it.
    pub fn load(&mut self, path: &Path) -> Result<FileId, io::Error> {
        let content = std::fs::read_to_string(path)?;
        Ok(self.insert(path.to_path_buf(), content))
    }

    /// Registers in-memory text under a synthetic path. Used by tests.
    pub fn add(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> FileId {
        self.insert(path.into(), content.into())
    }

    fn insert(&mut self, path: PathBuf, content: String) -> FileId {
        let id = FileId::from_raw(self.files.len() as u32);
        self.files.push(SourceFile::new(id, path, content));
        id
    }

    /// Returns the file for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this database.
    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.as_raw() as usize]
    }

    /// Resolves a span to its path and start line/column.
    ///
    /// A [`Span::NONE`] resolves to a placeholder path.
    pub fn resolve(&self, span: Span) -> ResolvedSpan {
        if span.is_none() {
            return ResolvedSpan {
                path: PathBuf::from("<unknown>"),
                line: 0,
                col: 0,
            };
        }
        let file = self.file(span.file);
        let (line, col) = file.line_col(span.start);
        ResolvedSpan {
            path: file.path.clone(),
            line,
            col,
        }
    }

    /// Returns the source text covered by a span.
    pub fn snippet(&self, span: Span) -> &str {
        self.file(span.file).snippet(span.start, span.end)
    }
}

impl Default for SourceDb {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_read_back() {
        let mut db = SourceDb::new();
        let id = db.add("top.sv", "module top; endmodule");
        assert_eq!(db.file(id).content, "module top; endmodule");
    }

    #[test]
    fn line_col_resolution() {
        let mut db = SourceDb::new();
        let id = db.add("a.sv", "one\ntwo\nthree");
        let span = Span::new(id, 4, 7); // "two"
        let loc = db.resolve(span);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.col, 1);
        assert_eq!(loc.to_string(), "a.sv:2:1");
    }

    #[test]
    fn line_col_at_line_start() {
        let mut db = SourceDb::new();
        let id = db.add("a.sv", "ab\ncd");
        assert_eq!(db.file(id).line_col(0), (1, 1));
        assert_eq!(db.file(id).line_col(3), (2, 1));
        assert_eq!(db.file(id).line_col(4), (2, 2));
    }

    #[test]
    fn snippet_extraction() {
        let mut db = SourceDb::new();
        let id = db.add("a.sv", "assign y = a;");
        assert_eq!(db.snippet(Span::new(id, 7, 8)), "y");
    }

    #[test]
    fn none_span_resolves_to_placeholder() {
        let db = SourceDb::new();
        let loc = db.resolve(Span::NONE);
        assert_eq!(loc.path, PathBuf::from("<unknown>"));
    }

    #[test]
    fn file_dir() {
        let mut db = SourceDb::new();
        let id = db.add("designs/alu/alu.sv", "module alu; endmodule");
        assert_eq!(db.file(id).dir(), Path::new("designs/alu"));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.sv");
        std::fs::write(&path, "module gate; endmodule").unwrap();

        let mut db = SourceDb::new();
        let id = db.load(&path).unwrap();
        assert_eq!(db.file(id).content, "module gate; endmodule");
        assert_eq!(db.file(id).dir(), dir.path());
    }

    #[test]
    fn load_missing_file_errors() {
        let mut db = SourceDb::new();
        assert!(db.load(Path::new("/nonexistent/missing.sv")).is_err());
    }
}
