//! File identifiers and byte-offset spans.

use serde::{Deserialize, Serialize};

/// Opaque identifier for a source file loaded into a [`SourceDb`](crate::SourceDb).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct FileId(u32);

impl FileId {
    /// A placeholder ID for spans with no real source (synthetic nodes, tests).
    pub const NONE: FileId = FileId(u32::MAX);

    /// Creates a `FileId` from a raw index.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw index of this `FileId`.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// A half-open byte range `[start, end)` within one source file.
///
/// Every AST node carries a `Span` so that evaluator and resolver errors can
/// point back at the construct that caused them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Span {
    /// The file this span belongs to.
    pub file: FileId,
    /// Inclusive start byte offset.
    pub start: u32,
    /// Exclusive end byte offset.
    pub end: u32,
}

impl Span {
    /// A span with no real location.
    pub const NONE: Span = Span {
        file: FileId::NONE,
        start: 0,
        end: 0,
    };

    /// Creates a new span.
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// Returns the smallest span covering both `self` and `other`.
    ///
    /// # Panics
    ///
    /// Panics if the spans come from different files.
    pub fn cover(self, other: Span) -> Span {
        assert_eq!(self.file, other.file, "cannot cover spans across files");
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Returns `true` if the span is zero-length.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns `true` if this span has no real location.
    pub fn is_none(&self) -> bool {
        self.file == FileId::NONE
    }
}
