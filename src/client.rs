use anyhow::{anyhow, Context};
use http::{Method, StatusCode};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{DashboardError, Result};
use crate::types::{
    Config, ExplainResponse, NodeRow, PageResponse, PodRow, RemediationPlan, Resource, TimeRange,
};

/// Query string of `/dashboard/{pods,nodes}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageQuery {
    pub limit: u32,
    pub skip: u64,
    pub time_range: TimeRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
}

/// HTTP client of the monitoring API. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    base: Url,
    http: reqwest::Client,
}

impl DashboardClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid API base URL {:?}", base_url))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow!("API base URL must be http(s), got {:?}", base_url));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { base, http })
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Self::new(&cfg.api_base_url, cfg.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    pub async fn fetch_page<R: Resource>(&self, query: &PageQuery) -> Result<PageResponse<R>> {
        let url = self.endpoint(&["dashboard", R::KIND.collection()]);
        self.get_json(url, query).await
    }

    pub async fn fetch_pods(&self, query: &PageQuery) -> Result<PageResponse<PodRow>> {
        self.fetch_page::<PodRow>(query).await
    }

    pub async fn fetch_nodes(&self, query: &PageQuery) -> Result<PageResponse<NodeRow>> {
        self.fetch_page::<NodeRow>(query).await
    }

    pub async fn explain<R: Resource>(&self, row: &R) -> Result<String> {
        let url = self.endpoint(&["explain", R::KIND.singular()]);
        let resp: ExplainResponse = self.post_json(url, row).await?;
        Ok(resp.explanation)
    }

    pub async fn remediate<R: Resource>(&self, row: &R) -> Result<RemediationPlan> {
        let url = self.endpoint(&["remediate", R::KIND.singular()]);
        self.post_json(url, row).await
    }

    /// Any 2xx answer counts as applied; the body is not inspected.
    pub async fn apply_remediation(&self, remediation_id: &str) -> Result<()> {
        let url = self.endpoint(&["remediate", "apply", remediation_id]);
        let path = url.path().to_string();
        let request = self.http.post(url).header("Accept", "application/json");
        self.send(Method::POST, &path, request).await?;
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // base is validated as a hierarchical http(s) URL in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, query: &impl Serialize) -> Result<T> {
        let path = url.path().to_string();
        let request = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .query(query);
        let body = self.send(Method::GET, &path, request).await?;
        decode(&path, &body)
    }

    async fn post_json<T: DeserializeOwned>(&self, url: Url, body: &impl Serialize) -> Result<T> {
        let path = url.path().to_string();
        let request = self
            .http
            .post(url)
            .header("Accept", "application/json")
            .json(body);
        let body = self.send(Method::POST, &path, request).await?;
        decode(&path, &body)
    }

    async fn send(&self, method: Method, path: &str, request: RequestBuilder) -> Result<Vec<u8>> {
        debug!(%method, path, "dashboard request");
        let transport = |source| DashboardError::Transport {
            method: method.clone(),
            path: path.to_string(),
            source,
        };
        let resp = request.send().await.map_err(transport)?;
        let status = StatusCode::from_u16(resp.status().as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DashboardError::Status {
                method: method.clone(),
                path: path.to_string(),
                status,
                body,
            });
        }
        let bytes = resp.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|source| DashboardError::Decode {
        path: path.to_string(),
        source,
    })
}
