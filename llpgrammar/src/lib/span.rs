use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A `Span` records what portion of the user's input something (e.g. a directive or production)
/// references (i.e. the `Span` doesn't hold a reference / copy of the actual input).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// Create a new span starting at byte `start` and ending at byte `end`.
    ///
    /// # Panics
    ///
    /// If `end` is less than `start`.
    pub fn new(start: usize, end: usize) -> Self {
        if end < start {
            panic!("Span starts ({}) after it ends ({})!", start, end);
        }
        Span { start, end }
    }

    /// Byte offset of the start of the span.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset of the end of the span.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Length in bytes of the span.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if this `Span` covers 0 bytes, or `false` otherwise.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How the spans of a [Spanned] value relate to each other.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SpansKind {
    /// A single span at the site of the error.
    Error,
    /// The first span is the first definition, every subsequent span is a duplicate of it.
    DuplicationError,
    /// The first span is the site of the problem, every subsequent span is something it
    /// conflicts with.
    Conflict,
}

/// Implemented by errors and warnings which can point at one or more places in the grammar
/// source.
pub trait Spanned: fmt::Display {
    /// Returns the spans associated with this value. There is always at least one span; the first
    /// is the primary location.
    fn spans(&self) -> &[Span];
    /// Describes how the spans returned by [Spanned::spans] relate to each other.
    fn spanskind(&self) -> SpansKind;
}
