use crate::common::{Order, Sort};
use crate::errors::QuarryResult;
use crate::paging::{Page, PageRequest, Slice};
use crate::query::QuerySpec;

/// Turns an unwindowed query into page and slice windows and assembles the
/// results.
#[derive(Debug, Clone)]
pub struct Paginator {
    id_field: String,
    max_page_size: Option<u64>,
}

impl Paginator {
    pub fn new(id_field: &str, max_page_size: Option<u64>) -> Self {
        Paginator {
            id_field: id_field.to_string(),
            max_page_size,
        }
    }

    /// The request as it will be executed, after the size cap.
    pub fn effective(&self, request: &PageRequest) -> PageRequest {
        request.clamp(self.max_page_size)
    }

    /// Request ordering first, then the query's own ordering, then the
    /// identity so rows with equal keys keep a stable position across pages.
    pub fn ordering(&self, spec: &QuerySpec, request: &PageRequest) -> Sort {
        request
            .sort()
            .clone()
            .and(spec.sort().clone())
            .and(Sort::from_orders(vec![Order::asc(&self.id_field)]))
    }

    pub fn page_window(&self, spec: &QuerySpec, request: &PageRequest) -> QuerySpec {
        spec.clone()
            .with_sort(self.ordering(spec, request))
            .with_offset(request.offset())
            .with_limit(Some(request.size()))
    }

    /// One extra row tells whether another slice follows.
    pub fn slice_window(&self, spec: &QuerySpec, request: &PageRequest) -> QuerySpec {
        spec.clone()
            .with_sort(self.ordering(spec, request))
            .with_offset(request.offset())
            .with_limit(Some(request.size().saturating_add(1)))
    }

    /// Builds a page, asking `count` for the total only when the window
    /// cannot tell it.
    ///
    /// A first page shorter than the page size holds every row. Any other
    /// non-empty short page is the last one, so the total is its offset
    /// plus its length.
    pub fn assemble_page<T, C>(
        &self,
        content: Vec<T>,
        request: PageRequest,
        count: C,
    ) -> QuarryResult<Page<T>>
    where
        C: FnOnce() -> QuarryResult<u64>,
    {
        let len = content.len() as u64;
        let total = if request.offset() == 0 && len < request.size() {
            len
        } else if len > 0 && len < request.size() {
            request.offset().saturating_add(len)
        } else {
            count()?
        };
        Ok(Page::new(content, request, total))
    }

    pub fn assemble_slice<T>(&self, mut content: Vec<T>, request: PageRequest) -> Slice<T> {
        let size = request.size() as usize;
        let has_next = content.len() > size;
        content.truncate(size);
        Slice::new(content, request, has_next)
    }
}
