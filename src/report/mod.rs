use chrono::NaiveDate;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analytics::AnalyticsSummary;
use crate::types::{ExportFormat, ResourceKind};

pub const CSV_HEADER: &str = "Resource Type,Total,Good,Alert,Bad,CPU,Memory";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize analytics summary")]
    Json(#[from] serde_json::Error),
    #[error("{kind} {field} is not a finite number")]
    NonFinite { kind: ResourceKind, field: &'static str },
}

/// `kubernetes_analytics_<YYYY-MM-DD>.<ext>`
pub fn export_file_name(format: ExportFormat, date: NaiveDate) -> String {
    format!(
        "kubernetes_analytics_{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

fn check_finite(summary: &AnalyticsSummary) -> Result<(), ExportError> {
    let averages = [
        ("cpu_usage", summary.averages.cpu_usage),
        ("memory_usage", summary.averages.memory_usage),
    ];
    let buckets = summary
        .buckets
        .iter()
        .flat_map(|b| [("bucket cpu_usage", b.cpu_usage), ("bucket memory_usage", b.memory_usage)]);
    for (field, value) in averages.into_iter().chain(buckets) {
        if !value.is_finite() {
            return Err(ExportError::NonFinite {
                kind: summary.kind,
                field,
            });
        }
    }
    Ok(())
}

/// One line per summary; usage averages are rounded to whole percents.
pub fn to_csv(summaries: &[AnalyticsSummary]) -> Result<String, ExportError> {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for s in summaries {
        check_finite(s)?;
        // writing into a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},{},{},{}%,{}%",
            s.kind.display_name(),
            s.total_resources,
            s.status.good,
            s.status.alert,
            s.status.bad,
            s.averages.cpu_usage.round(),
            s.averages.memory_usage.round(),
        );
    }
    Ok(out)
}

pub fn to_json(summaries: &[AnalyticsSummary]) -> Result<String, ExportError> {
    for s in summaries {
        check_finite(s)?;
    }
    Ok(serde_json::to_string_pretty(summaries)?)
}

pub fn render(format: ExportFormat, summaries: &[AnalyticsSummary]) -> Result<String, ExportError> {
    match format {
        ExportFormat::Csv => to_csv(summaries),
        ExportFormat::Json => to_json(summaries),
    }
}

/// Renders `summaries` and writes them into `dir`, creating it when missing.
pub fn write_export(
    dir: &Path,
    format: ExportFormat,
    summaries: &[AnalyticsSummary],
    date: NaiveDate,
) -> Result<PathBuf, ExportError> {
    let body = render(format, summaries)?;
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(export_file_name(format, date));
    fs::write(&path, body).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeRow, PodRow, PredictedLabel};
    use chrono::{TimeZone, Utc};

    fn summaries() -> Vec<AnalyticsSummary> {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let pods = vec![
            PodRow {
                pod: Some("api".into()),
                timestamp: Some(now),
                cpu_usage: Some(40.4),
                memory_usage: Some(70.6),
                predicted_label: Some(PredictedLabel::Alert),
                ..Default::default()
            },
            PodRow {
                pod: Some("db".into()),
                timestamp: Some(now),
                cpu_usage: Some(20.0),
                memory_usage: Some(30.0),
                predicted_label: Some(PredictedLabel::Good),
                ..Default::default()
            },
        ];
        let nodes: Vec<NodeRow> = Vec::new();
        vec![
            AnalyticsSummary::from_rows(&pods, now),
            AnalyticsSummary::from_rows(&nodes, now),
        ]
    }

    #[test]
    fn test_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(export_file_name(ExportFormat::Csv, date), "kubernetes_analytics_2024-03-07.csv");
        assert_eq!(export_file_name(ExportFormat::Json, date), "kubernetes_analytics_2024-03-07.json");
    }

    #[test]
    fn test_csv_layout() {
        let csv = to_csv(&summaries()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "Pods,2,1,1,0,30%,50%");
        assert_eq!(lines[2], "Nodes,0,0,0,0,0%,0%");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_json_is_array_of_summaries() {
        let json = to_json(&summaries()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["kind"], "pod");
        assert_eq!(items[0]["status"]["alert"], 1);
        assert_eq!(items[1]["buckets"].as_array().unwrap().len(), 24);
    }

    #[test]
    fn test_non_finite_is_rejected() {
        let mut data = summaries();
        data[1].averages.memory_usage = f64::NAN;
        let err = to_csv(&data).unwrap_err();
        assert!(matches!(err, ExportError::NonFinite { kind: ResourceKind::Node, field: "memory_usage" }));
        assert!(to_json(&data).is_err());
    }
}
