pub mod aggregate;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::client::{DashboardClient, PageQuery};
use crate::error::Result;
use crate::notify::Notifier;
use crate::pagination::ResourceFilters;
use crate::poller::{Completion, Poller, RefreshState, RequestToken};
use crate::report::{write_export, ExportError};
use crate::schedule::{schedule, TaskHandle};
use crate::types::{
    Config, ExportFormat, HourBucket, NodeRow, PageResponse, PodRow, Resource, ResourceAverages,
    ResourceKind, StatusCounts, TimeRange,
};
use crate::views::RefreshOutcome;

pub use aggregate::{
    filter_by_latest, hourly_buckets, latest_per_resource, resource_averages, status_counts,
    unique_resources,
};

/// Aggregates of one sample, recomputed from the rows on every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub kind: ResourceKind,
    /// Distinct resources in the sample.
    pub total_resources: usize,
    pub sample_size: usize,
    pub status: StatusCounts,
    pub averages: ResourceAverages,
    pub buckets: Vec<HourBucket>,
    pub generated_at: DateTime<Utc>,
}

impl AnalyticsSummary {
    pub fn from_rows<R: Resource>(rows: &[R], now: DateTime<Utc>) -> Self {
        Self {
            kind: R::KIND,
            total_resources: unique_resources(rows),
            sample_size: rows.len(),
            status: status_counts(rows),
            averages: resource_averages(rows),
            buckets: hourly_buckets(rows, now),
            generated_at: now,
        }
    }

    /// Summary of the resources whose latest snapshot passes `filters`.
    pub fn from_filtered<R: Resource>(rows: &[R], filters: &ResourceFilters, now: DateTime<Utc>) -> Self {
        Self::from_rows(&filter_by_latest(rows, filters), now)
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsSnapshot {
    pub active: ResourceKind,
    pub time_range: TimeRange,
    pub filters: ResourceFilters,
    pub refresh: RefreshState,
    pub summary: AnalyticsSummary,
}

struct AnalyticsInner {
    poller: Poller,
    active: ResourceKind,
    time_range: TimeRange,
    filters: ResourceFilters,
    pods: Vec<PodRow>,
    nodes: Vec<NodeRow>,
}

/// Pod/node analytics tabs sharing one poller.
///
/// Samples are larger than a list page and always start at offset 0. They are
/// stored unfiltered; status, label and search filters narrow the summaries.
pub struct AnalyticsView {
    client: DashboardClient,
    notifier: Notifier,
    refresh_every: Duration,
    pod_sample: u32,
    node_sample: u32,
    inner: Mutex<AnalyticsInner>,
}

impl AnalyticsView {
    pub fn new(
        client: DashboardClient,
        notifier: Notifier,
        time_range: TimeRange,
        refresh_every: Duration,
        pod_sample: u32,
        node_sample: u32,
    ) -> Self {
        Self {
            client,
            notifier,
            refresh_every,
            pod_sample,
            node_sample,
            inner: Mutex::new(AnalyticsInner {
                poller: Poller::new(),
                active: ResourceKind::Pod,
                time_range,
                filters: ResourceFilters::default(),
                pods: Vec::new(),
                nodes: Vec::new(),
            }),
        }
    }

    pub fn from_config(client: DashboardClient, notifier: Notifier, cfg: &Config) -> Self {
        Self::new(
            client,
            notifier,
            cfg.analytics_time_range,
            cfg.analytics_refresh,
            cfg.analytics_pod_sample,
            cfg.analytics_node_sample,
        )
    }

    fn lock(&self) -> MutexGuard<'_, AnalyticsInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn active(&self) -> ResourceKind {
        self.lock().active
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.lock().poller.state()
    }

    /// Unfiltered pod sample as last fetched.
    pub fn pods(&self) -> Vec<PodRow> {
        self.lock().pods.clone()
    }

    pub fn nodes(&self) -> Vec<NodeRow> {
        self.lock().nodes.clone()
    }

    pub fn summary(&self, kind: ResourceKind) -> AnalyticsSummary {
        let now = Utc::now();
        let inner = self.lock();
        match kind {
            ResourceKind::Pod => AnalyticsSummary::from_filtered(&inner.pods, &inner.filters, now),
            ResourceKind::Node => AnalyticsSummary::from_filtered(&inner.nodes, &inner.filters, now),
        }
    }

    pub fn summaries(&self) -> Vec<AnalyticsSummary> {
        vec![self.summary(ResourceKind::Pod), self.summary(ResourceKind::Node)]
    }

    pub fn snapshot(&self) -> AnalyticsSnapshot {
        let (active, time_range, filters, refresh) = {
            let inner = self.lock();
            (inner.active, inner.time_range, inner.filters.clone(), inner.poller.state())
        };
        AnalyticsSnapshot {
            active,
            time_range,
            filters,
            refresh,
            summary: self.summary(active),
        }
    }

    fn sample_query(&self, inner: &AnalyticsInner) -> PageQuery {
        let (limit, namespace, node_name) = match inner.active {
            ResourceKind::Pod => (self.pod_sample, inner.filters.namespace.clone(), None),
            ResourceKind::Node => (self.node_sample, None, inner.filters.node_name.clone()),
        };
        PageQuery {
            limit,
            skip: 0,
            time_range: inner.time_range,
            namespace,
            node_name,
        }
    }

    /// Fetches the sample of the active tab, superseding any fetch in flight.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (token, kind, query) = {
            let mut inner = self.lock();
            let query = self.sample_query(&inner);
            (inner.poller.begin(), inner.active, query)
        };
        debug!(%kind, generation = token.generation(), limit = query.limit, time_range = %query.time_range, "refreshing analytics");

        match kind {
            ResourceKind::Pod => {
                let result = token.run(self.client.fetch_pods(&query)).await;
                let mut inner = self.lock();
                let (outcome, rows) = self.settle(&mut inner, &token, result);
                if let Some(rows) = rows {
                    inner.pods = rows;
                }
                outcome
            }
            ResourceKind::Node => {
                let result = token.run(self.client.fetch_nodes(&query)).await;
                let mut inner = self.lock();
                let (outcome, rows) = self.settle(&mut inner, &token, result);
                if let Some(rows) = rows {
                    inner.nodes = rows;
                }
                outcome
            }
        }
    }

    fn settle<R: Resource>(
        &self,
        inner: &mut AnalyticsInner,
        token: &RequestToken,
        result: Result<PageResponse<R>>,
    ) -> (RefreshOutcome, Option<Vec<R>>) {
        let owns_flags = inner.active == R::KIND;
        match inner.poller.finish(token, result, owns_flags) {
            Completion::Fresh(page) => {
                // row filters run at summary time, after deduplication
                let rows = page.data;
                info!(kind = %R::KIND, rows = rows.len(), "analytics sample refreshed");
                let outcome = RefreshOutcome::Updated {
                    rows: rows.len(),
                    has_more: false,
                };
                (outcome, Some(rows))
            }
            Completion::Failed(e) => {
                warn!(kind = %R::KIND, error = %e, "analytics refresh failed, keeping previous sample");
                self.notifier
                    .error(format!("Failed to fetch {} data", R::KIND.collection()));
                (RefreshOutcome::Failed, None)
            }
            Completion::Superseded => (RefreshOutcome::Superseded, None),
        }
    }

    /// Switches tab and fetches its sample right away.
    pub async fn set_view(&self, kind: ResourceKind) -> RefreshOutcome {
        {
            let mut inner = self.lock();
            if inner.active != kind {
                inner.active = kind;
                inner.poller.clear_flags();
            }
        }
        self.refresh().await
    }

    pub async fn set_time_range(&self, time_range: TimeRange) -> RefreshOutcome {
        self.lock().time_range = time_range;
        self.refresh().await
    }

    pub async fn set_filters(&self, filters: ResourceFilters) -> RefreshOutcome {
        self.lock().filters = filters;
        self.notifier.success("Filters applied. Refreshing data...");
        self.refresh().await
    }

    pub fn start(self: &Arc<Self>) -> TaskHandle {
        let view = Arc::clone(self);
        schedule("analytics", self.refresh_every, move || {
            let view = Arc::clone(&view);
            async move {
                view.refresh().await;
            }
        })
    }

    pub fn teardown(&self) {
        self.lock().poller.teardown();
    }

    /// Writes both summaries to `dir` and reports the outcome as a notification.
    pub fn export(&self, dir: &Path, format: ExportFormat) -> std::result::Result<PathBuf, ExportError> {
        let summaries = self.summaries();
        match write_export(dir, format, &summaries, Utc::now().date_naive()) {
            Ok(path) => {
                info!(path = %path.display(), "analytics exported");
                self.notifier.success(format!(
                    "Analytics data downloaded as {}",
                    format.extension().to_uppercase()
                ));
                Ok(path)
            }
            Err(e) => {
                error!(error = %e, "analytics export failed");
                self.notifier.error("Failed to export analytics data");
                Err(e)
            }
        }
    }
}
