// Public modules
pub mod types;
pub mod config;
pub mod parsing;
pub mod error;
pub mod client;
pub mod notify;
pub mod schedule;
pub mod poller;
pub mod pagination;
pub mod dispatcher;
pub mod views;
pub mod analytics;
pub mod report;

// Re-export commonly used items
pub use types::*;
pub use config::{load_config, load_config_with_env, EnvironmentProvider, SystemEnvironment, MockEnvironment};
pub use parsing::{parse_timestamp, value_as_f64, value_as_label};
pub use error::{DashboardError, Result};
pub use client::{DashboardClient, PageQuery};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use schedule::{schedule, TaskHandle};
pub use poller::{Completion, Poller, RefreshState, RequestToken};
pub use pagination::{compute_has_more, PageState, ResourceFilters, PAGE_SIZE_OPTIONS};
pub use dispatcher::{ActionDispatcher, ActionState, ApplyOutcome, ApplyState, RemediationState};
pub use views::{ListSnapshot, ListView, NodesView, PodsView, RefreshOutcome};
pub use analytics::{AnalyticsSnapshot, AnalyticsSummary, AnalyticsView};
pub use report::{to_csv, to_json, write_export, ExportError};
