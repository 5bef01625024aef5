//! Page-number pagination over counted listings.
//!
//! A requested page is resolved leniently: anything that is not an integer
//! falls back to the first page, and any integer outside the valid range
//! falls back to the last page. A listing always has at least one page, so
//! an empty listing yields a single empty page rather than an error.

use serde::{Deserialize, Serialize};
use std::num::{IntErrorKind, NonZeroU32};

pub const DEFAULT_PAGE_SIZE: NonZeroU32 = NonZeroU32::new(10).unwrap();

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Paginator {
    per_page: NonZeroU32,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Paginator {
    #[must_use]
    pub fn new(per_page: NonZeroU32) -> Self {
        Self { per_page }
    }

    #[must_use]
    pub fn num_pages(self, count: u64) -> u64 {
        count.div_ceil(u64::from(self.per_page.get())).max(1)
    }

    /// Resolves the raw `page` query value against a listing of `count` items.
    #[must_use]
    pub fn window(self, count: u64, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages(count);

        let number = match requested.map(|raw| raw.trim().parse::<i64>()) {
            Some(Ok(number)) => u64::try_from(number)
                .ok()
                .filter(|number| (1..=num_pages).contains(number))
                .unwrap_or(num_pages),
            // Integers too large for i64 are still out of range.
            Some(Err(err))
                if matches!(
                    err.kind(),
                    IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
                ) =>
            {
                num_pages
            }
            None | Some(Err(_)) => 1,
        };

        PageWindow {
            number,
            num_pages,
            count,
            per_page: self.per_page,
        }
    }
}

/// The slice of a listing that one page covers.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub per_page: NonZeroU32,
}

impl PageWindow {
    #[must_use]
    pub fn offset(self) -> u64 {
        (self.number - 1) * self.limit()
    }

    #[must_use]
    pub fn limit(self) -> u64 {
        u64::from(self.per_page.get())
    }

    #[must_use]
    pub fn has_previous(self) -> bool {
        self.number > 1
    }

    #[must_use]
    pub fn has_next(self) -> bool {
        self.number < self.num_pages
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            count: window.count,
            has_previous: window.has_previous(),
            has_next: window.has_next(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
