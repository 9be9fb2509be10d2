//! Interned identifiers backed by a thread-safe string interner.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};

/// An interned identifier: a `u32` index into the session [`Interner`].
///
/// Copying and comparing identifiers is O(1); the original text is
/// recovered through [`Interner::resolve`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    /// Builds an `Ident` from a raw index. Intended for deserialization
    /// and tests; normal code goes through [`Interner::intern`].
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw index of this identifier.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: the wrapped u32 always fits in usize on supported platforms, and
// `try_from_usize` rejects indices that do not fit back into u32.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// Thread-safe string interner for the whole simulation session.
///
/// Module, port, net, and instance names are interned once and flow through
/// the parser, resolver, and evaluators as plain `u32` keys.
pub struct Interner {
    rodeo: ThreadedRodeo<Ident>,
}

impl Interner {
    /// Creates an empty interner.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Interns `s`, returning its identifier. Re-interning the same text
    /// returns the same identifier without allocating.
    pub fn intern(&self, s: &str) -> Ident {
        self.rodeo.get_or_intern(s)
    }

    /// Resolves an identifier back to its text.
    ///
    /// # Panics
    ///
    /// Panics if `ident` was not produced by this interner.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.rodeo.resolve(&ident)
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}
