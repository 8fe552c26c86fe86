//! Handles for files held by a [`SourceDb`](crate::SourceDb).

/// Index of a file in the [`SourceDb`](crate::SourceDb) that loaded it.
///
/// Handles are only meaningful for the database that issued them; the
/// analyzer and cache key files by normalized path instead.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct FileId(u32);

impl FileId {
    /// Wraps a raw index.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}
