//! Decoding of the upstream report payloads.
//!
//! The provider has shipped several response shapes over time. Each known
//! shape is a variant of an untagged union tried in order; per-row field
//! synonyms are serde aliases. A newly-observed shape is a one-variant (or
//! one-alias) extension here, not a change to the normalizer.

use serde::Deserialize;
use serde_json::Value;

/// Timeseries payload: either `{"data": [...]}` or a bare top-level array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TimeseriesPayload {
    Enveloped { data: Vec<TimeseriesRow> },
    Bare(Vec<TimeseriesRow>),
}

impl TimeseriesPayload {
    pub fn into_rows(self) -> Vec<TimeseriesRow> {
        match self {
            TimeseriesPayload::Enveloped { data } => data,
            TimeseriesPayload::Bare(rows) => rows,
        }
    }

    /// Decode rows from a raw response body, yielding an empty sequence
    /// when the body matches none of the known shapes.
    pub fn rows_from_value(value: &Value) -> Vec<TimeseriesRow> {
        serde_json::from_value::<TimeseriesPayload>(value.clone())
            .map(TimeseriesPayload::into_rows)
            .unwrap_or_default()
    }
}

/// One timeseries bucket. The timestamp has appeared as `date`, `start`,
/// and `x`; the visitor count as `visitors` and `y`. `pageviews` was absent
/// entirely in the legacy shape.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeseriesRow {
    #[serde(alias = "start", alias = "x")]
    pub date: String,
    #[serde(alias = "y")]
    pub visitors: u64,
    #[serde(default)]
    pub pageviews: u64,
}

/// Stats (breakdown) payload, same envelope tolerance as the timeseries.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StatsPayload {
    Enveloped { data: Vec<StatRow> },
    Bare(Vec<StatRow>),
}

impl StatsPayload {
    pub fn into_rows(self) -> Vec<StatRow> {
        match self {
            StatsPayload::Enveloped { data } => data,
            StatsPayload::Bare(rows) => rows,
        }
    }

    pub fn rows_from_value(value: &Value) -> Vec<StatRow> {
        serde_json::from_value::<StatsPayload>(value.clone())
            .map(StatsPayload::into_rows)
            .unwrap_or_default()
    }
}

/// One breakdown row. `key` is null for direct/unattributed traffic.
#[derive(Debug, Clone, Deserialize)]
pub struct StatRow {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub visitors: u64,
    #[serde(default)]
    pub pageviews: u64,
}
