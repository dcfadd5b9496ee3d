use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::pagination::ResourceFilters;
use crate::types::{HourBucket, PredictedLabel, Resource, ResourceAverages, StatusCounts};

pub const BUCKET_COUNT: usize = 24;
const HOUR_MS: i64 = 3_600_000;

/// Latest snapshot of every resource in `rows`, keyed by identifier.
///
/// Rows without identifier are skipped. On equal timestamps the row seen first
/// is kept, which is the newest one for the API's descending order.
pub fn latest_per_resource<R: Resource>(rows: &[R]) -> HashMap<&str, &R> {
    let mut latest: HashMap<&str, &R> = HashMap::new();
    for row in rows {
        let Some(id) = row.identifier() else { continue };
        match latest.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(mut slot) => {
                if row.timestamp() > slot.get().timestamp() {
                    slot.insert(row);
                }
            }
        }
    }
    latest
}

/// Every row of the resources whose latest snapshot passes `filters`.
///
/// Rows without identifier are kept when they pass on their own.
pub fn filter_by_latest<R: Resource>(rows: &[R], filters: &ResourceFilters) -> Vec<R> {
    if !filters.has_row_filters() {
        return rows.to_vec();
    }
    let keep: HashSet<&str> = latest_per_resource(rows)
        .into_iter()
        .filter(|(_, row)| filters.matches(*row))
        .map(|(id, _)| id)
        .collect();
    rows.iter()
        .filter(|row| match row.identifier() {
            Some(id) => keep.contains(id),
            None => filters.matches(*row),
        })
        .cloned()
        .collect()
}

/// Counts predicted labels over the latest snapshot of each resource.
pub fn status_counts<R: Resource>(rows: &[R]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for row in latest_per_resource(rows).values() {
        match row.predicted_label() {
            Some(PredictedLabel::Good) => counts.good += 1,
            Some(PredictedLabel::Bad) => counts.bad += 1,
            Some(PredictedLabel::Alert) => counts.alert += 1,
            Some(PredictedLabel::Unknown) | None => {}
        }
    }
    counts
}

/// Mean CPU and memory usage over every row of the sample, duplicates included.
pub fn resource_averages<R: Resource>(rows: &[R]) -> ResourceAverages {
    if rows.is_empty() {
        return ResourceAverages::default();
    }
    let (cpu, memory) = rows.iter().fold((0.0, 0.0), |(cpu, mem), row| {
        (
            cpu + row.cpu_usage().unwrap_or(0.0),
            mem + row.memory_usage().unwrap_or(0.0),
        )
    });
    let n = rows.len() as f64;
    ResourceAverages {
        cpu_usage: cpu / n,
        memory_usage: memory / n,
    }
}

pub fn unique_resources<R: Resource>(rows: &[R]) -> usize {
    rows.iter()
        .filter_map(|r| r.identifier())
        .collect::<HashSet<_>>()
        .len()
}

/// Sums usage into the trailing 24 hourly buckets; bucket 0 ends at `now`.
pub fn hourly_buckets<R: Resource>(rows: &[R], now: DateTime<Utc>) -> Vec<HourBucket> {
    let mut buckets: Vec<HourBucket> = (0..BUCKET_COUNT)
        .map(|i| HourBucket {
            start: now - ChronoDuration::hours(i as i64 + 1),
            cpu_usage: 0.0,
            memory_usage: 0.0,
            samples: 0,
        })
        .collect();

    for row in rows {
        let Some(ts) = row.timestamp() else { continue };
        let age_ms = (now - ts).num_milliseconds();
        if age_ms < 0 {
            continue;
        }
        let index = (age_ms / HOUR_MS) as usize;
        if let Some(bucket) = buckets.get_mut(index) {
            bucket.cpu_usage += row.cpu_usage().unwrap_or(0.0);
            bucket.memory_usage += row.memory_usage().unwrap_or(0.0);
            bucket.samples += 1;
        }
    }
    buckets
}
