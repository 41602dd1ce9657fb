use crate::config::MAX_PAGE_SIZE;
use crate::errors::ServiceResult;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// One page returned by a page-fetch collaborator.
///
/// `has_more` is not part of the contract; callers derive it from
/// `data.len() == limit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: Option<usize>) -> Self {
        Self { data, total }
    }
}

/// Collaborator that fetches one page of records given offset and limit
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, offset: usize, limit: usize) -> ServiceResult<Page<Value>>;
}

/// Page source over records already resident in memory
#[derive(Debug, Clone, Default)]
pub struct VecPageSource {
    records: Vec<Value>,
}

impl VecPageSource {
    pub fn new(records: Vec<Value>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl PageSource for VecPageSource {
    async fn fetch_page(&self, offset: usize, limit: usize) -> ServiceResult<Page<Value>> {
        let start = offset.min(self.records.len());
        let end = offset.saturating_add(limit).min(self.records.len());
        Ok(Page::new(self.records[start..end].to_vec(), Some(self.records.len())))
    }
}

/// Clamp a requested page size to the platform ceiling.
pub fn cap_page_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_PAGE_SIZE)
}

/// Sequential offset/limit walk over a paged source.
///
/// Every request is capped at `MAX_PAGE_SIZE` and, when a maximum is set, at
/// the records still wanted. A page shorter than its request ends the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    offset: usize,
    page_limit: usize,
    remaining: Option<usize>,
    pages: usize,
    has_more: bool,
}

impl PageCursor {
    /// `max_records` of `None` walks until a short page.
    pub fn new(limit: usize, max_records: Option<usize>) -> Self {
        Self {
            offset: 0,
            page_limit: cap_page_limit(limit),
            remaining: max_records,
            pages: 0,
            has_more: true,
        }
    }

    /// `(offset, limit)` of the next request, or `None` once the walk is over.
    pub fn next_request(&self) -> Option<(usize, usize)> {
        if !self.has_more {
            return None;
        }
        let limit = match self.remaining {
            Some(0) => return None,
            Some(remaining) => self.page_limit.min(remaining),
            None => self.page_limit,
        };
        Some((self.offset, limit))
    }

    /// Record the page returned for the current request and keep at most
    /// `limit` of its records.
    pub fn accept<T>(&mut self, mut data: Vec<T>) -> Vec<T> {
        let Some((_, limit)) = self.next_request() else {
            return Vec::new();
        };
        self.has_more = data.len() >= limit;
        data.truncate(limit);
        self.offset += limit;
        self.pages += 1;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= data.len();
        }
        data
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// The last page was full, so the source may hold further records
    pub fn has_more(&self) -> bool {
        self.has_more
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchAllOptions {
    /// Requested page size; capped at `MAX_PAGE_SIZE`
    pub limit: usize,
    /// Stop once this many records have been accumulated
    pub max_records: usize,
}

impl Default for FetchAllOptions {
    fn default() -> Self {
        Self {
            limit: MAX_PAGE_SIZE,
            max_records: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchAllResult<T> {
    pub data: Vec<T>,
    pub pages: usize,
    /// The last page was full, so the source may hold further records
    pub has_more: bool,
    /// Total reported by the last page, if the source reports one
    pub total: Option<usize>,
}

/// Accumulate records by calling `page_fetch` sequentially with increasing
/// offsets until `max_records` is reached or a short page is returned.
///
/// `on_progress(loaded, total)` is called after every page; `total` is the
/// source-reported total capped at `max_records`, or `max_records` when the
/// source does not report one.
pub async fn fetch_all<T, F, Fut, P>(
    mut page_fetch: F,
    options: FetchAllOptions,
    mut on_progress: P,
) -> ServiceResult<FetchAllResult<T>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = ServiceResult<Page<T>>>,
    P: FnMut(usize, usize),
{
    let mut cursor = PageCursor::new(options.limit, Some(options.max_records));
    let mut data: Vec<T> = Vec::new();
    let mut total = None;

    while let Some((offset, limit)) = cursor.next_request() {
        debug!("Fetching page {} (offset {}, limit {})", cursor.pages() + 1, offset, limit);

        let page = page_fetch(offset, limit).await?;
        total = page.total.or(total);
        data.extend(cursor.accept(page.data));

        let reported_total = total.map_or(options.max_records, |t| t.min(options.max_records));
        on_progress(data.len(), reported_total);
    }

    Ok(FetchAllResult {
        data,
        pages: cursor.pages(),
        has_more: cursor.has_more(),
        total,
    })
}

/// `fetch_all` over a `PageSource`.
pub async fn fetch_all_from<P>(
    source: &dyn PageSource,
    options: FetchAllOptions,
    on_progress: P,
) -> ServiceResult<FetchAllResult<Value>>
where
    P: FnMut(usize, usize),
{
    fetch_all(|offset, limit| source.fetch_page(offset, limit), options, on_progress).await
}
