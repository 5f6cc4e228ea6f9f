use crate::common::Sort;
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use std::fmt::{Display, Formatter};

/// A zero-based page index, a page size and an ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageRequest {
    page: u64,
    size: u64,
    sort: Sort,
}

impl PageRequest {
    /// Fails with [ErrorKind::InvalidPageRequest] when `size` is zero.
    pub fn of(page: u64, size: u64) -> QuarryResult<Self> {
        PageRequest::of_sorted(page, size, Sort::unsorted())
    }

    pub fn of_sorted(page: u64, size: u64, sort: Sort) -> QuarryResult<Self> {
        if size == 0 {
            log::error!("Page size must be positive, requested page {} of size 0", page);
            return Err(QuarryError::new(
                "page size must be greater than zero",
                ErrorKind::InvalidPageRequest,
            ));
        }
        Ok(PageRequest { page, size, sort })
    }

    /// Accepts signed input, as received from outside callers, and rejects
    /// negative indexes and non-positive sizes.
    pub fn try_of(page: i64, size: i64) -> QuarryResult<Self> {
        if page < 0 {
            log::error!("Negative page index {}", page);
            return Err(QuarryError::new(
                &format!("page index must not be negative, got {}", page),
                ErrorKind::InvalidPageRequest,
            ));
        }
        if size <= 0 {
            log::error!("Non-positive page size {}", size);
            return Err(QuarryError::new(
                &format!("page size must be greater than zero, got {}", size),
                ErrorKind::InvalidPageRequest,
            ));
        }
        PageRequest::of(page as u64, size as u64)
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }

    /// The following page, or `None` at the largest representable index.
    pub fn next(&self) -> Option<PageRequest> {
        let page = self.page.checked_add(1)?;
        Some(PageRequest {
            page,
            ..self.clone()
        })
    }

    pub fn previous_or_first(&self) -> PageRequest {
        PageRequest {
            page: self.page.saturating_sub(1),
            ..self.clone()
        }
    }

    pub fn first(&self) -> PageRequest {
        PageRequest {
            page: 0,
            ..self.clone()
        }
    }

    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    /// The same request with its size capped at `max_size`.
    pub(crate) fn clamp(&self, max_size: Option<u64>) -> PageRequest {
        match max_size {
            Some(max) if max > 0 && self.size > max => {
                log::debug!("Clamping page size {} to {}", self.size, max);
                PageRequest {
                    size: max,
                    ..self.clone()
                }
            }
            _ => self.clone(),
        }
    }
}

impl Display for PageRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "page {} of size {} sorted by {}", self.page, self.size, self.sort)
    }
}
