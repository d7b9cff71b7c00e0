use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::fields::RawValue;
use crate::metrics::subjective_average;
use crate::store::{Record, Store};

const NO_DATA: &str = "No data yet.";
const MISSING: &str = "–";

#[derive(Debug, Serialize)]
pub struct HistoryView {
    pub entries: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    /// `YYYY-MM-DD HH:MM` of the last write.
    pub heading: String,
    pub date: Option<NaiveDate>,
    pub timestamp: NaiveDateTime,
    /// Subjective average out of 10; absent when the day is incomplete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_vibe: Option<f64>,
    pub summary: Vec<String>,
    pub fields: BTreeMap<String, RawValue>,
}

/// Newest entries first, each with its score and a short summary.
pub fn build_history(mut store: Store) -> HistoryView {
    if store.is_empty() {
        return HistoryView {
            entries: Vec::new(),
            message: Some(NO_DATA.to_string()),
        };
    }

    store.ensure_date_column();
    let entries = store
        .by_timestamp_desc()
        .into_iter()
        .filter_map(history_entry)
        .collect();

    HistoryView {
        entries,
        message: None,
    }
}

fn history_entry(record: &Record) -> Option<HistoryEntry> {
    let timestamp = record.timestamp?;
    Some(HistoryEntry {
        heading: timestamp.format("%Y-%m-%d %H:%M").to_string(),
        date: record.date,
        timestamp,
        overall_vibe: subjective_average(record),
        summary: summary_lines(record),
        fields: record.fields.clone(),
    })
}

fn summary_lines(record: &Record) -> Vec<String> {
    let show = |name: &str| {
        record
            .get(name)
            .map_or_else(|| MISSING.to_string(), ToString::to_string)
    };
    let show_or_zero = |name: &str| {
        record
            .get(name)
            .map_or_else(|| "0".to_string(), ToString::to_string)
    };

    vec![
        format!("Sleep: {}h (Q: {})", show("sleep_hours"), show("sleep_quality")),
        format!("Glucose: {} | HRV: {}", show("fasting_glucose"), show("hrv")),
        format!(
            "Exercise: gym={}, run={} km",
            show_or_zero("gym"),
            show_or_zero("run_km")
        ),
        format!("Steps: {}", show("walking_steps")),
    ]
}
