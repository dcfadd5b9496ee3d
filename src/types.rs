use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::parsing::{deserialize_label, deserialize_lenient_f64, deserialize_timestamp};

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub pods_refresh: Duration,
    pub nodes_refresh: Duration,
    pub analytics_refresh: Duration,
    pub page_size: u32,
    pub time_range: TimeRange,
    pub analytics_time_range: TimeRange,
    pub analytics_pod_sample: u32,
    pub analytics_node_sample: u32,
    pub views: Vec<ViewKind>,
    pub export_dir: Option<PathBuf>,
    pub export_format: ExportFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(10),
            pods_refresh: Duration::from_secs(5),
            nodes_refresh: Duration::from_secs(2),
            analytics_refresh: Duration::from_secs(120),
            page_size: 5,
            time_range: TimeRange::Last5m,
            analytics_time_range: TimeRange::Last1h,
            analytics_pod_sample: 100,
            analytics_node_sample: 20,
            views: vec![ViewKind::Pods, ViewKind::Nodes, ViewKind::Analytics],
            export_dir: None,
            export_format: ExportFormat::Csv,
        }
    }
}

/// Trailing window the API filters rows by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "last_5m")]
    Last5m,
    #[serde(rename = "last_10m")]
    Last10m,
    #[serde(rename = "last_15m")]
    Last15m,
    #[serde(rename = "last_30m")]
    Last30m,
    #[serde(rename = "last_1h")]
    Last1h,
    #[serde(rename = "last_3h")]
    Last3h,
    #[serde(rename = "last_6h")]
    Last6h,
    #[serde(rename = "last_1d")]
    Last1d,
}

impl TimeRange {
    pub const ALL: [TimeRange; 8] = [
        TimeRange::Last5m,
        TimeRange::Last10m,
        TimeRange::Last15m,
        TimeRange::Last30m,
        TimeRange::Last1h,
        TimeRange::Last3h,
        TimeRange::Last6h,
        TimeRange::Last1d,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Last5m => "last_5m",
            TimeRange::Last10m => "last_10m",
            TimeRange::Last15m => "last_15m",
            TimeRange::Last30m => "last_30m",
            TimeRange::Last1h => "last_1h",
            TimeRange::Last3h => "last_3h",
            TimeRange::Last6h => "last_6h",
            TimeRange::Last1d => "last_1d",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::Last5m => "Last 5 minutes",
            TimeRange::Last10m => "Last 10 minutes",
            TimeRange::Last15m => "Last 15 minutes",
            TimeRange::Last30m => "Last 30 minutes",
            TimeRange::Last1h => "Last 1 hour",
            TimeRange::Last3h => "Last 3 hours",
            TimeRange::Last6h => "Last 6 hours",
            TimeRange::Last1d => "Last 1 day",
        }
    }

    pub fn duration(&self) -> ChronoDuration {
        match self {
            TimeRange::Last5m => ChronoDuration::minutes(5),
            TimeRange::Last10m => ChronoDuration::minutes(10),
            TimeRange::Last15m => ChronoDuration::minutes(15),
            TimeRange::Last30m => ChronoDuration::minutes(30),
            TimeRange::Last1h => ChronoDuration::hours(1),
            TimeRange::Last3h => ChronoDuration::hours(3),
            TimeRange::Last6h => ChronoDuration::hours(6),
            TimeRange::Last1d => ChronoDuration::days(1),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        TimeRange::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == token)
            .ok_or_else(|| format!("unknown time range {:?}", token))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pod,
    Node,
}

impl ResourceKind {
    /// Collection segment under `/dashboard`.
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pods",
            ResourceKind::Node => "nodes",
        }
    }

    /// Segment used by the explain and remediate endpoints.
    pub fn singular(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pod",
            ResourceKind::Node => "node",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "Pods",
            ResourceKind::Node => "Nodes",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Pods,
    Nodes,
    Analytics,
}

impl FromStr for ViewKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pods" => Ok(ViewKind::Pods),
            "nodes" => Ok(ViewKind::Nodes),
            "analytics" => Ok(ViewKind::Analytics),
            other => Err(format!("unknown view {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format {:?}", other)),
        }
    }
}

/// Health classification computed by the remote model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictedLabel {
    Good,
    Bad,
    Alert,
    #[serde(other)]
    Unknown,
}

impl FromStr for PredictedLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "good" => Ok(PredictedLabel::Good),
            "bad" => Ok(PredictedLabel::Bad),
            "alert" => Ok(PredictedLabel::Alert),
            other => Err(format!("unknown label {:?}", other)),
        }
    }
}

/// Common view over pod and node rows.
pub trait Resource: Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    const KIND: ResourceKind;

    fn identifier(&self) -> Option<&str>;
    fn timestamp(&self) -> Option<DateTime<Utc>>;
    fn cpu_usage(&self) -> Option<f64>;
    fn memory_usage(&self) -> Option<f64>;
    fn predicted_label(&self) -> Option<PredictedLabel>;
    fn namespace(&self) -> Option<&str>;
    fn node_name(&self) -> Option<&str>;
    fn extra(&self) -> &serde_json::Map<String, serde_json::Value>;

    /// Kubernetes labels attached to the snapshot, when the collector recorded them.
    fn labels(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.extra().get("labels").and_then(|v| v.as_object())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64", skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64", skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64", skip_serializing_if = "Option::is_none")]
    pub restarts: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_label", skip_serializing_if = "Option::is_none")]
    pub predicted_label: Option<PredictedLabel>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Resource for PodRow {
    const KIND: ResourceKind = ResourceKind::Pod;

    fn identifier(&self) -> Option<&str> {
        self.pod.as_deref().filter(|s| !s.is_empty())
    }
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
    fn cpu_usage(&self) -> Option<f64> {
        self.cpu_usage
    }
    fn memory_usage(&self) -> Option<f64> {
        self.memory_usage
    }
    fn predicted_label(&self) -> Option<PredictedLabel> {
        self.predicted_label
    }
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
    fn node_name(&self) -> Option<&str> {
        self.node_name.as_deref()
    }
    fn extra(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.extra
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64", skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64", skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_label", skip_serializing_if = "Option::is_none")]
    pub predicted_label: Option<PredictedLabel>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Resource for NodeRow {
    const KIND: ResourceKind = ResourceKind::Node;

    fn identifier(&self) -> Option<&str> {
        self.node_name.as_deref().filter(|s| !s.is_empty())
    }
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
    fn cpu_usage(&self) -> Option<f64> {
        self.cpu_usage
    }
    fn memory_usage(&self) -> Option<f64> {
        self.memory_usage
    }
    fn predicted_label(&self) -> Option<PredictedLabel> {
        self.predicted_label
    }
    fn namespace(&self) -> Option<&str> {
        None
    }
    fn node_name(&self) -> Option<&str> {
        self.node_name.as_deref()
    }
    fn extra(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.extra
    }
}

/// Slice of the remote result set to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: u32,
    pub skip: u64,
}

/// One page of rows as returned by `/dashboard/{pods,nodes}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResponse<R> {
    pub data: Vec<R>,
    pub skip: Option<u64>,
    pub count: Option<u64>,
    pub total: Option<u64>,
}

// Older API revisions answered with a bare array instead of the envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPage<R> {
    Envelope {
        data: Vec<R>,
        #[serde(default)]
        skip: Option<u64>,
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        total: Option<u64>,
    },
    Bare(Vec<R>),
}

impl<'de, R: Deserialize<'de>> Deserialize<'de> for PageResponse<R> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawPage::<R>::deserialize(deserializer)? {
            RawPage::Envelope { data, skip, count, total } => PageResponse { data, skip, count, total },
            RawPage::Bare(data) => PageResponse { data, skip: None, count: None, total: None },
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplainResponse {
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemediationPlan {
    pub remediation: String,
    #[serde(default)]
    pub remediation_id: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub good: u64,
    pub bad: u64,
    pub alert: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.good + self.bad + self.alert
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceAverages {
    pub cpu_usage: f64,
    pub memory_usage: f64,
}

/// One hour of accumulated usage; bucket 0 is the most recent hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourBucket {
    pub start: DateTime<Utc>,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub samples: u32,
}
