use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::DashboardClient;
use crate::dispatcher::{ActionDispatcher, ActionState, RemediationState};
use crate::error::Result;
use crate::notify::Notifier;
use crate::pagination::{compute_has_more, PageState, ResourceFilters};
use crate::poller::{Completion, Poller, RefreshState};
use crate::schedule::{schedule, TaskHandle};
use crate::types::{Config, NodeRow, PageWindow, PodRow, Resource, ResourceKind, TimeRange};

pub type PodsView = ListView<PodRow>;
pub type NodesView = ListView<NodeRow>;

/// Result of one refresh as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated { rows: usize, has_more: bool },
    Failed,
    Superseded,
}

/// Everything a table, its pagination bar and refresh indicator display.
#[derive(Debug, Clone)]
pub struct ListSnapshot<R> {
    pub rows: Vec<R>,
    pub page: u64,
    pub page_size: u32,
    pub time_range: TimeRange,
    pub filters: ResourceFilters,
    pub has_more: bool,
    pub has_previous: bool,
    pub refresh: RefreshState,
}

struct ListInner<R> {
    poller: Poller,
    page: PageState,
    rows: Vec<R>,
    has_more: bool,
}

/// Paginated, periodically refreshed list of pod or node rows.
pub struct ListView<R: Resource> {
    client: DashboardClient,
    notifier: Notifier,
    actions: ActionDispatcher,
    refresh_every: Duration,
    inner: Mutex<ListInner<R>>,
}

impl<R: Resource> ListView<R> {
    pub fn new(
        client: DashboardClient,
        notifier: Notifier,
        page_size: u32,
        time_range: TimeRange,
        refresh_every: Duration,
    ) -> Self {
        Self {
            actions: ActionDispatcher::new(client.clone(), notifier.clone()),
            client,
            notifier,
            refresh_every,
            inner: Mutex::new(ListInner {
                poller: Poller::new(),
                page: PageState::new(page_size, time_range),
                rows: Vec::new(),
                has_more: true,
            }),
        }
    }

    pub fn from_config(client: DashboardClient, notifier: Notifier, cfg: &Config) -> Self {
        let refresh_every = match R::KIND {
            ResourceKind::Pod => cfg.pods_refresh,
            ResourceKind::Node => cfg.nodes_refresh,
        };
        Self::new(client, notifier, cfg.page_size, cfg.time_range, refresh_every)
    }

    pub fn kind(&self) -> ResourceKind {
        R::KIND
    }

    pub fn refresh_every(&self) -> Duration {
        self.refresh_every
    }

    fn lock(&self) -> MutexGuard<'_, ListInner<R>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> ListSnapshot<R> {
        let inner = self.lock();
        ListSnapshot {
            rows: inner.rows.clone(),
            page: inner.page.page(),
            page_size: inner.page.page_size(),
            time_range: inner.page.time_range(),
            filters: inner.page.filters().clone(),
            has_more: inner.has_more,
            has_previous: inner.page.has_previous(),
            refresh: inner.poller.state(),
        }
    }

    /// Fetches the current page, superseding any fetch still in flight.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (token, query) = {
            let mut inner = self.lock();
            (inner.poller.begin(), inner.page.query(R::KIND))
        };
        let window = PageWindow {
            limit: query.limit,
            skip: query.skip,
        };
        debug!(kind = %R::KIND, generation = token.generation(), skip = query.skip, limit = query.limit, time_range = %query.time_range, "refreshing");

        let result = token.run(self.client.fetch_page::<R>(&query)).await;

        let mut inner = self.lock();
        match inner.poller.finish(&token, result, true) {
            Completion::Fresh(page) => {
                let has_more = compute_has_more(window, &page);
                let rows = inner.page.filters().apply(page.data);
                info!(kind = %R::KIND, rows = rows.len(), total = ?page.total, has_more, "refreshed");
                let outcome = RefreshOutcome::Updated {
                    rows: rows.len(),
                    has_more,
                };
                inner.rows = rows;
                inner.has_more = has_more;
                outcome
            }
            Completion::Failed(e) => {
                drop(inner);
                warn!(kind = %R::KIND, error = %e, "refresh failed, keeping previous rows");
                self.notifier
                    .error(format!("Failed to fetch {} data", R::KIND.collection()));
                RefreshOutcome::Failed
            }
            Completion::Superseded => {
                debug!(kind = %R::KIND, generation = token.generation(), "refresh superseded");
                RefreshOutcome::Superseded
            }
        }
    }

    pub async fn set_page(&self, page: u64) -> RefreshOutcome {
        self.lock().page.set_page(page);
        self.refresh().await
    }

    pub async fn next_page(&self) -> RefreshOutcome {
        let next = {
            let mut inner = self.lock();
            let next = inner.page.page() + 1;
            inner.page.set_page(next);
            next
        };
        debug!(kind = %R::KIND, page = next, "next page");
        self.refresh().await
    }

    pub async fn previous_page(&self) -> RefreshOutcome {
        {
            let mut inner = self.lock();
            let previous = inner.page.page().saturating_sub(1);
            inner.page.set_page(previous);
        }
        self.refresh().await
    }

    pub async fn set_page_size(&self, page_size: u32) -> RefreshOutcome {
        self.lock().page.set_page_size(page_size);
        self.refresh().await
    }

    pub async fn set_time_range(&self, time_range: TimeRange) -> RefreshOutcome {
        self.lock().page.set_time_range(time_range);
        self.refresh().await
    }

    pub async fn set_filters(&self, filters: ResourceFilters) -> RefreshOutcome {
        self.lock().page.set_filters(filters);
        self.refresh().await
    }

    /// Starts periodic refreshing; the first refresh runs immediately.
    pub fn start(self: &Arc<Self>) -> TaskHandle {
        let view = Arc::clone(self);
        schedule(R::KIND.collection(), self.refresh_every, move || {
            let view = Arc::clone(&view);
            async move {
                view.refresh().await;
            }
        })
    }

    /// Cancels any in-flight fetch; the scheduled task is stopped through its handle.
    pub fn teardown(&self) {
        self.lock().poller.teardown();
    }

    pub fn actions(&self) -> &ActionDispatcher {
        &self.actions
    }

    pub async fn explain(&self, row: &R) -> ActionState {
        self.actions.explain(row).await
    }

    pub async fn remediate(&self, row: &R) -> RemediationState {
        self.actions.remediate(row).await
    }

    /// Applies the planned remediation and refreshes the list once it went through.
    pub async fn apply_remediation(&self) -> Result<()> {
        self.actions.apply_remediation().await?;
        self.refresh().await;
        Ok(())
    }
}
