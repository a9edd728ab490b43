//! Page index newtype for positions inside a viewer.
//!
//! Viewer pages are addressed by XPath child position, which is 1-based, so
//! this wrapper keeps zero out of the picture entirely.

use std::fmt;
use std::num::NonZeroUsize;

/// 1-based position of a page within one source's viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(NonZeroUsize);

impl PageIndex {
    /// The first page of a source.
    pub const FIRST: Self = Self(NonZeroUsize::MIN);

    /// Create a PageIndex from a 1-based position; `None` for zero.
    #[must_use]
    pub const fn new(position: usize) -> Option<Self> {
        match NonZeroUsize::new(position) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// Get the 1-based position (as used in XPath `div[n]`).
    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }

    /// The following page.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for PageIndex {
    fn default() -> Self {
        Self::FIRST
    }
}

impl From<PageIndex> for usize {
    fn from(index: PageIndex) -> Self {
        index.get()
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
