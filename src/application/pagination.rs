//! Page-number pagination for list views.
//!
//! Pages are 1-based. Requests outside the available range are clamped rather
//! than rejected: a missing or non-integer page parameter yields the first
//! page, while an integer below one or past the end yields the last one. An
//! empty listing still has a single (empty) page.

use std::num::NonZeroU32;

use serde::Deserialize;

/// Raw `?page=` query parameter; kept as a string so malformed input can fall
/// back to the first page instead of rejecting the request.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// Requested page number. `0` stands for any integer below one.
    pub fn requested(&self) -> u64 {
        let Some(value) = self.page.as_deref().map(str::trim) else {
            return 1;
        };
        match value.parse::<i128>() {
            Ok(number) if number < 1 => 0,
            Ok(number) => u64::try_from(number).unwrap_or(u64::MAX),
            Err(_) => 1,
        }
    }
}

/// Offset/limit window handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u64,
}

/// Splits a listing of `total` items into pages of `per_page`.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    per_page: NonZeroU32,
}

impl Paginator {
    pub fn new(per_page: NonZeroU32) -> Self {
        Self { per_page }
    }

    pub fn per_page(&self) -> u64 {
        u64::from(self.per_page.get())
    }

    /// Number of pages needed to display `total` items (never less than one).
    pub fn num_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.per_page()).max(1)
    }

    /// Resolve `requested` to a real page for `total` items. Page `0` and
    /// anything past the end resolve to the last page.
    pub fn clamp(&self, requested: u64, total: u64) -> u64 {
        let last = self.num_pages(total);
        if requested == 0 || requested > last {
            last
        } else {
            requested
        }
    }

    pub fn window(&self, number: u64) -> PageRequest {
        PageRequest {
            offset: (number.max(1) - 1) * self.per_page(),
            limit: self.per_page(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, number: u64, num_pages: u64, total: u64) -> Self {
        Self {
            items,
            number,
            num_pages,
            total,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
        }
    }
}
