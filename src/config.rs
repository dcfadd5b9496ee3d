use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{Config, ExportFormat, TimeRange, ViewKind};

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }
    
    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }
    
    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

/// Positive number of seconds; unset falls back to `default`.
fn positive_secs<E: EnvironmentProvider>(env: &E, key: &str, default: u64) -> Result<Duration> {
    let secs: u64 = match env.get_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", key))?,
        None => default,
    };
    if secs == 0 {
        return Err(anyhow!("{} must be greater than 0", key));
    }
    Ok(Duration::from_secs(secs))
}

/// Lenient numeric variable: anything unparseable or zero becomes `default`.
fn lenient_u32<E: EnvironmentProvider>(env: &E, key: &str, default: u32) -> u32 {
    env.get_var(key)
        .and_then(|v| v.trim().parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn parse_time_range<E: EnvironmentProvider>(env: &E, key: &str, default: TimeRange) -> Result<TimeRange> {
    match env.get_var(key) {
        Some(raw) => raw
            .parse::<TimeRange>()
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("Invalid {}", key)),
        None => Ok(default),
    }
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let defaults = Config::default();

    let api_base_url = env
        .get_var("DASHBOARD_API_URL")
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(defaults.api_base_url);
    let parsed = Url::parse(&api_base_url).context("Invalid DASHBOARD_API_URL")?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(anyhow!("DASHBOARD_API_URL must be an http(s) URL"));
    }

    let request_timeout = env
        .get_var("REQUEST_TIMEOUT_SECS")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .map(Duration::from_secs)
        .unwrap_or(defaults.request_timeout);

    let pods_refresh = positive_secs(env, "PODS_REFRESH_SECS", defaults.pods_refresh.as_secs())?;
    let nodes_refresh = positive_secs(env, "NODES_REFRESH_SECS", defaults.nodes_refresh.as_secs())?;
    let analytics_refresh =
        positive_secs(env, "ANALYTICS_REFRESH_SECS", defaults.analytics_refresh.as_secs())?;

    let page_size: u32 = match env.get_var("PAGE_SIZE") {
        Some(raw) => raw.trim().parse().context("Invalid PAGE_SIZE")?,
        None => defaults.page_size,
    };
    if page_size == 0 {
        return Err(anyhow!("PAGE_SIZE must be greater than 0"));
    }

    let time_range = parse_time_range(env, "TIME_RANGE", defaults.time_range)?;
    let analytics_time_range = parse_time_range(env, "ANALYTICS_TIME_RANGE", defaults.analytics_time_range)?;

    let analytics_pod_sample = lenient_u32(env, "ANALYTICS_POD_SAMPLE", defaults.analytics_pod_sample);
    let analytics_node_sample = lenient_u32(env, "ANALYTICS_NODE_SAMPLE", defaults.analytics_node_sample);

    let views = match env.get_var("DASHBOARD_VIEWS") {
        Some(raw) => {
            let mut views: Vec<ViewKind> = Vec::new();
            for token in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let view: ViewKind = token
                    .parse()
                    .map_err(|e: String| anyhow!(e))
                    .context("Invalid DASHBOARD_VIEWS")?;
                if !views.contains(&view) {
                    views.push(view);
                }
            }
            if views.is_empty() {
                return Err(anyhow!("DASHBOARD_VIEWS must name at least one view (comma-separated)"));
            }
            views
        }
        None => defaults.views,
    };

    let export_dir = env
        .get_var("EXPORT_DIR")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);

    let export_format: ExportFormat = match env.get_var("EXPORT_FORMAT") {
        Some(raw) => raw
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("Invalid EXPORT_FORMAT")?,
        None => defaults.export_format,
    };

    Ok(Config {
        api_base_url,
        request_timeout,
        pods_refresh,
        nodes_refresh,
        analytics_refresh,
        page_size,
        time_range,
        analytics_time_range,
        analytics_pod_sample,
        analytics_node_sample,
        views,
        export_dir,
        export_format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_loading_with_env() {
        let env = MockEnvironment::new()
            .with_var("DASHBOARD_API_URL", "https://monitor.internal:8443/")
            .with_var("REQUEST_TIMEOUT_SECS", "3")
            .with_var("PODS_REFRESH_SECS", "7")
            .with_var("NODES_REFRESH_SECS", "4")
            .with_var("ANALYTICS_REFRESH_SECS", "60")
            .with_var("PAGE_SIZE", "30")
            .with_var("TIME_RANGE", "last_1d")
            .with_var("ANALYTICS_TIME_RANGE", "last_6h")
            .with_var("ANALYTICS_POD_SAMPLE", "250")
            .with_var("ANALYTICS_NODE_SAMPLE", "40")
            .with_var("DASHBOARD_VIEWS", "nodes,analytics")
            .with_var("EXPORT_DIR", "/tmp/exports")
            .with_var("EXPORT_FORMAT", "JSON");

        let config = load_config_with_env(&env).unwrap();

        assert_eq!(config.api_base_url, "https://monitor.internal:8443");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.pods_refresh, Duration::from_secs(7));
        assert_eq!(config.nodes_refresh, Duration::from_secs(4));
        assert_eq!(config.analytics_refresh, Duration::from_secs(60));
        assert_eq!(config.page_size, 30);
        assert_eq!(config.time_range, TimeRange::Last1d);
        assert_eq!(config.analytics_time_range, TimeRange::Last6h);
        assert_eq!(config.analytics_pod_sample, 250);
        assert_eq!(config.analytics_node_sample, 40);
        assert_eq!(config.views, vec![ViewKind::Nodes, ViewKind::Analytics]);
        assert_eq!(config.export_dir, Some(PathBuf::from("/tmp/exports")));
        assert_eq!(config.export_format, ExportFormat::Json);
    }

    #[test]
    fn test_config_loading_defaults() {
        let config = load_config_with_env(&MockEnvironment::new()).unwrap();

        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.pods_refresh, Duration::from_secs(5));
        assert_eq!(config.nodes_refresh, Duration::from_secs(2));
        assert_eq!(config.analytics_refresh, Duration::from_secs(120));
        assert_eq!(config.page_size, 5);
        assert_eq!(config.time_range, TimeRange::Last5m);
        assert_eq!(config.analytics_time_range, TimeRange::Last1h);
        assert_eq!(config.analytics_pod_sample, 100);
        assert_eq!(config.analytics_node_sample, 20);
        assert_eq!(config.views, vec![ViewKind::Pods, ViewKind::Nodes, ViewKind::Analytics]);
        assert_eq!(config.export_dir, None);
        assert_eq!(config.export_format, ExportFormat::Csv);
    }

    #[test]
    fn test_config_rejects_bad_api_url() {
        for url in ["ftp://example.com", "not a url"] {
            let env = MockEnvironment::new().with_var("DASHBOARD_API_URL", url);
            let result = load_config_with_env(&env);
            assert!(result.is_err(), "accepted {}", url);
            assert!(result.unwrap_err().to_string().contains("DASHBOARD_API_URL"));
        }
    }

    #[test]
    fn test_config_rejects_zero_intervals() {
        for key in ["PODS_REFRESH_SECS", "NODES_REFRESH_SECS", "ANALYTICS_REFRESH_SECS", "PAGE_SIZE"] {
            let env = MockEnvironment::new().with_var(key, "0");
            let result = load_config_with_env(&env);
            assert!(result.is_err(), "accepted zero {}", key);
            assert!(result.unwrap_err().to_string().contains(key));
        }

        let env = MockEnvironment::new().with_var("PODS_REFRESH_SECS", "soon");
        let result = load_config_with_env(&env);
        assert!(result.unwrap_err().to_string().contains("PODS_REFRESH_SECS"));
    }

    #[test]
    fn test_config_rejects_unknown_tokens() {
        let env = MockEnvironment::new().with_var("TIME_RANGE", "last_2h");
        assert!(load_config_with_env(&env).unwrap_err().to_string().contains("TIME_RANGE"));

        let env = MockEnvironment::new().with_var("EXPORT_FORMAT", "xlsx");
        assert!(load_config_with_env(&env).unwrap_err().to_string().contains("EXPORT_FORMAT"));

        let env = MockEnvironment::new().with_var("DASHBOARD_VIEWS", "pods,charts");
        assert!(load_config_with_env(&env).unwrap_err().to_string().contains("DASHBOARD_VIEWS"));
    }

    #[test]
    fn test_views_parsing() {
        let env = MockEnvironment::new().with_var("DASHBOARD_VIEWS", " pods , pods,  analytics ,");
        let config = load_config_with_env(&env).unwrap();
        assert_eq!(config.views, vec![ViewKind::Pods, ViewKind::Analytics]);

        let env = MockEnvironment::new().with_var("DASHBOARD_VIEWS", " , ,");
        let result = load_config_with_env(&env);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("DASHBOARD_VIEWS"));
    }

    #[test]
    fn test_numeric_parsing_with_invalid_values() {
        let env = MockEnvironment::new()
            .with_var("REQUEST_TIMEOUT_SECS", "invalid")
            .with_var("ANALYTICS_POD_SAMPLE", "lots")
            .with_var("ANALYTICS_NODE_SAMPLE", "0");

        let config = load_config_with_env(&env).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(10)); // default fallback
        assert_eq!(config.analytics_pod_sample, 100); // default fallback
        assert_eq!(config.analytics_node_sample, 20); // default fallback
    }

    #[test]
    fn test_blank_export_dir_is_unset() {
        let env = MockEnvironment::new().with_var("EXPORT_DIR", "   ");
        assert_eq!(load_config_with_env(&env).unwrap().export_dir, None);
    }
}
