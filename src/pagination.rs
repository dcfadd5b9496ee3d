use crate::client::PageQuery;
use crate::types::{PageResponse, PageWindow, PredictedLabel, Resource, ResourceKind, TimeRange};

/// Page sizes offered to the user. Not enforced here.
pub const PAGE_SIZE_OPTIONS: [u32; 4] = [5, 10, 30, 100];

/// Filters narrowing a view.
///
/// `namespace` and `node_name` are sent to the API; `status`, `label` and
/// `search` are applied to the fetched rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFilters {
    pub namespace: Option<String>,
    pub node_name: Option<String>,
    pub status: Option<PredictedLabel>,
    pub label: Option<String>,
    pub search: Option<String>,
}

impl ResourceFilters {
    /// Maps a select value to a filter; `"all"` and blanks mean unfiltered.
    pub fn choice(value: &str) -> Option<String> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            None
        } else {
            Some(value.to_string())
        }
    }

    /// Whether any filter applies to fetched rows rather than to the query.
    pub fn has_row_filters(&self) -> bool {
        self.status.is_some() || self.label.is_some() || self.search.is_some()
    }

    pub fn matches<R: Resource>(&self, row: &R) -> bool {
        if let Some(status) = self.status {
            if row.predicted_label() != Some(status) {
                return false;
            }
        }
        if let Some(key) = &self.label {
            let has_label = row.labels().map(|l| l.contains_key(key)).unwrap_or(false);
            if !has_label {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let haystack = [row.identifier(), row.namespace(), row.node_name()];
            let found = haystack
                .iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }
        true
    }

    pub fn apply<R: Resource>(&self, rows: Vec<R>) -> Vec<R> {
        if !self.has_row_filters() {
            return rows;
        }
        rows.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// Page index, page size, time range and filters of one view.
///
/// Anything but the page index changing sends the view back to page 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    page: u64,
    page_size: u32,
    time_range: TimeRange,
    filters: ResourceFilters,
}

impl PageState {
    pub fn new(page_size: u32, time_range: TimeRange) -> Self {
        Self {
            page: 0,
            page_size,
            time_range,
            filters: ResourceFilters::default(),
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn filters(&self) -> &ResourceFilters {
        &self.filters
    }

    pub fn set_page(&mut self, page: u64) {
        self.page = page;
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size;
        self.page = 0;
    }

    pub fn set_time_range(&mut self, time_range: TimeRange) {
        self.time_range = time_range;
        self.page = 0;
    }

    pub fn set_filters(&mut self, filters: ResourceFilters) {
        self.filters = filters;
        self.page = 0;
    }

    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    pub fn window(&self) -> PageWindow {
        PageWindow {
            limit: self.page_size,
            skip: self.page * u64::from(self.page_size),
        }
    }

    pub fn query(&self, kind: ResourceKind) -> PageQuery {
        let window = self.window();
        PageQuery {
            limit: window.limit,
            skip: window.skip,
            time_range: self.time_range,
            namespace: match kind {
                ResourceKind::Pod => self.filters.namespace.clone(),
                ResourceKind::Node => None,
            },
            node_name: match kind {
                ResourceKind::Node => self.filters.node_name.clone(),
                ResourceKind::Pod => None,
            },
        }
    }
}

/// Whether a page after `resp` exists.
///
/// Uses the reported total when there is one, otherwise assumes more rows
/// follow a full page.
pub fn compute_has_more<R>(window: PageWindow, resp: &PageResponse<R>) -> bool {
    let returned = resp.data.len() as u64;
    match resp.total {
        Some(total) => {
            let skip = resp.skip.unwrap_or(window.skip);
            let count = resp.count.unwrap_or(returned);
            skip + count < total
        }
        None => returned == u64::from(window.limit),
    }
}
