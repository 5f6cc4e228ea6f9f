use crate::paging::PageRequest;

/// One window of results with the total across all pages.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Page<T> {
    content: Vec<T>,
    request: PageRequest,
    total_elements: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        Page {
            content,
            request,
            total_elements,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    /// The zero-based page index.
    pub fn number(&self) -> u64 {
        self.request.page()
    }

    pub fn size(&self) -> u64 {
        self.request.size()
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn total_pages(&self) -> u64 {
        self.total_elements.div_ceil(self.request.size())
    }

    pub fn is_first(&self) -> bool {
        !self.has_previous()
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    pub fn has_next(&self) -> bool {
        self.number().saturating_add(1) < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.request.has_previous()
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn next_request(&self) -> Option<PageRequest> {
        self.has_next().then(|| self.request.next()).flatten()
    }

    pub fn map<U, F: FnMut(T) -> U>(self, transform: F) -> Page<U> {
        Page {
            content: self.content.into_iter().map(transform).collect(),
            request: self.request,
            total_elements: self.total_elements,
        }
    }
}

/// A window of results that only knows whether another window follows.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Slice<T> {
    content: Vec<T>,
    request: PageRequest,
    has_next: bool,
}

impl<T> Slice<T> {
    pub fn new(content: Vec<T>, request: PageRequest, has_next: bool) -> Self {
        Slice {
            content,
            request,
            has_next,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    pub fn number(&self) -> u64 {
        self.request.page()
    }

    pub fn size(&self) -> u64 {
        self.request.size()
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn has_previous(&self) -> bool {
        self.request.has_previous()
    }

    pub fn is_first(&self) -> bool {
        !self.has_previous()
    }

    pub fn is_last(&self) -> bool {
        !self.has_next
    }

    pub fn next_request(&self) -> Option<PageRequest> {
        self.has_next.then(|| self.request.next()).flatten()
    }

    pub fn map<U, F: FnMut(T) -> U>(self, transform: F) -> Slice<U> {
        Slice {
            content: self.content.into_iter().map(transform).collect(),
            request: self.request,
            has_next: self.has_next,
        }
    }
}
