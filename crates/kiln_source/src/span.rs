//! Byte-offset ranges within a single source file.

use serde::{Deserialize, Serialize};

/// A byte offset range within one source file.
///
/// `start` is inclusive and `end` is exclusive. Spans carry no file
/// identity; the owning module analysis or diagnostic knows the file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the start of the span (inclusive).
    pub start: u32,
    /// Byte offset of the end of the span (exclusive).
    pub end: u32,
}

impl Span {
    /// Creates a new span with the given byte range.
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Produces a span covering both inputs.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Returns the length of this span in bytes.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` if this span has zero length.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_spans() {
        let m = Span::new(5, 15).merge(Span::new(10, 25));
        assert_eq!(m, Span::new(5, 25));
    }

    #[test]
    fn merge_order_independent() {
        let a = Span::new(5, 15);
        let b = Span::new(1, 3);
        assert_eq!(a.merge(b), b.merge(a));
    }

    #[test]
    fn len_and_empty() {
        assert_eq!(Span::new(3, 8).len(), 5);
        assert!(Span::new(4, 4).is_empty());
        assert!(!Span::new(4, 5).is_empty());
    }
}
