//! Dashboard orchestration and normalization.
//!
//! Owns the per-user view state (selection, committed bundle) and runs the
//! fetch cycle: four report requests issued concurrently, all settled before
//! anything is committed, and a generation-tagged guard so a slow cycle for
//! an abandoned selection can never overwrite a newer one.

pub mod models;

use std::sync::Arc;

use chrono::Datelike;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::error::ApiError;
use crate::models::Project;
use crate::upstream::response::{StatsPayload, TimeseriesPayload};
use crate::upstream::{GroupBy, ReportFetcher, ReportQuery};

pub use models::{AnalyticsBundle, BundleView, ChartPoint, Selection, StatEntry, Totals};

const SPANISH_MONTHS: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sep", "oct", "nov", "dic",
];

/// Format an upstream timestamp for display ("5 ago" style). Unparseable
/// values pass through untouched rather than breaking the chart.
pub fn format_display_date(raw: &str) -> String {
    let parsed = chrono::DateTime::parse_from_rfc3339(raw)
        .map(|instant| instant.date_naive())
        .or_else(|_| chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d"));

    match parsed {
        Ok(date) => format!("{} {}", date.day(), SPANISH_MONTHS[date.month0() as usize]),
        Err(_) => raw.to_string(),
    }
}

/// Reshape a timeseries response into chart points.
pub fn normalize_timeseries(value: &Value) -> Vec<ChartPoint> {
    TimeseriesPayload::rows_from_value(value)
        .into_iter()
        .map(|row| ChartPoint {
            date: format_display_date(&row.date),
            visitors: row.visitors,
            pageviews: row.pageviews,
        })
        .collect()
}

/// Reshape a breakdown response into table rows. A null key is direct or
/// unattributed traffic and renders as the empty string.
pub fn normalize_stats(value: &Value, with_pageviews: bool) -> Vec<StatEntry> {
    StatsPayload::rows_from_value(value)
        .into_iter()
        .map(|row| StatEntry {
            key: row.key.unwrap_or_default(),
            visitors: row.visitors,
            pageviews: with_pageviews.then_some(row.pageviews),
        })
        .collect()
}

#[derive(Debug, Default)]
struct ViewState {
    selection: Option<Selection>,
    selected_project: Option<String>,
    /// Monotonic cycle tag; bumped when a new cycle starts, compared at
    /// commit time.
    generation: u64,
    bundle: AnalyticsBundle,
    last_error: Option<String>,
}

pub struct DashboardService {
    fetcher: Arc<dyn ReportFetcher>,
    views: DashMap<String, ViewState>,
}

impl DashboardService {
    pub fn new(fetcher: Arc<dyn ReportFetcher>) -> Self {
        Self {
            fetcher,
            views: DashMap::new(),
        }
    }

    /// Run one fetch cycle for the given selection and return the view the
    /// user should see afterwards.
    ///
    /// The cycle aborts (prior bundle kept, diagnostic recorded) when the
    /// timeseries request fails or its body carries an `error` field;
    /// partial success from the breakdowns is discarded in that case so an
    /// inconsistent bundle is never shown. Breakdown failures alone degrade
    /// to empty tables.
    pub async fn refresh(
        &self,
        user_id: &str,
        selection: Selection,
    ) -> Result<BundleView, ApiError> {
        let generation = {
            let mut view = self.views.entry(user_id.to_string()).or_default();
            view.generation += 1;
            view.selection = Some(selection.clone());
            view.selected_project = Some(selection.project_id.clone());
            view.generation
        };

        let Selection {
            project_id,
            from,
            to,
        } = &selection;

        let timeseries_query = ReportQuery::timeseries(project_id, from, to);
        let pages_query = ReportQuery::stats(project_id, GroupBy::Path, from, to);
        let referrers_query = ReportQuery::stats(project_id, GroupBy::Referrer, from, to);
        let utms_query = ReportQuery::stats(project_id, GroupBy::UtmSource, from, to);

        let (timeseries, pages, referrers, utms) = tokio::join!(
            self.fetcher.fetch(&timeseries_query),
            self.fetcher.fetch(&pages_query),
            self.fetcher.fetch(&referrers_query),
            self.fetcher.fetch(&utms_query),
        );

        let timeseries_value = match timeseries {
            Ok(value) => {
                if let Some(report_error) = value.get("error") {
                    let message = report_error
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| report_error.to_string());
                    self.record_failure(user_id, &message);
                    return Err(ApiError::Upstream {
                        status: 502,
                        details: message,
                        hint: None,
                    });
                }
                value
            }
            Err(err) => {
                self.record_failure(user_id, &err.to_string());
                return Err(err.into());
            }
        };

        let bundle = AnalyticsBundle {
            timeseries: normalize_timeseries(&timeseries_value),
            pages: breakdown_entries(pages, true),
            referrers: breakdown_entries(referrers, false),
            utms: breakdown_entries(utms, false),
        };

        let mut view = self.views.entry(user_id.to_string()).or_default();
        if view.generation != generation {
            // A newer selection's cycle started while this one was in
            // flight; its state wins and this result is dropped.
            debug!(user_id, "discarding stale fetch cycle result");
            return Ok(BundleView::from(&view.bundle));
        }

        view.bundle = bundle;
        view.last_error = None;
        Ok(BundleView::from(&view.bundle))
    }

    /// The currently committed bundle plus derived totals.
    pub fn view(&self, user_id: &str) -> BundleView {
        self.views
            .get(user_id)
            .map(|view| BundleView::from(&view.bundle))
            .unwrap_or_else(|| BundleView::from(&AnalyticsBundle::default()))
    }

    /// The selection the latest cycle was issued for.
    pub fn selection(&self, user_id: &str) -> Option<Selection> {
        self.views
            .get(user_id)
            .and_then(|view| view.selection.clone())
    }

    pub fn selected_project(&self, user_id: &str) -> Option<String> {
        self.views
            .get(user_id)
            .and_then(|view| view.selected_project.clone())
    }

    pub fn last_error(&self, user_id: &str) -> Option<String> {
        self.views
            .get(user_id)
            .and_then(|view| view.last_error.clone())
    }

    /// A project was added. Only the first project ever added to an empty
    /// list becomes selected automatically.
    pub fn note_added(&self, user_id: &str, project_id: &str, list_was_empty: bool) {
        let mut view = self.views.entry(user_id.to_string()).or_default();
        if list_was_empty {
            view.selected_project = Some(project_id.to_string());
        }
    }

    /// A project was removed. When it was the selected one, selection falls
    /// back to the first remaining project, or to none.
    pub fn note_removed(&self, user_id: &str, project_id: &str, remaining: &[Project]) {
        let mut view = self.views.entry(user_id.to_string()).or_default();
        if view.selected_project.as_deref() == Some(project_id) {
            view.selected_project = remaining.first().map(|project| project.id.clone());
        }
    }

    fn record_failure(&self, user_id: &str, message: &str) {
        warn!(user_id, "fetch cycle aborted: {message}");
        let mut view = self.views.entry(user_id.to_string()).or_default();
        view.last_error = Some(message.to_string());
    }
}

fn breakdown_entries(
    result: Result<Value, crate::upstream::UpstreamError>,
    with_pageviews: bool,
) -> Vec<StatEntry> {
    match result {
        Ok(value) => normalize_stats(&value, with_pageviews),
        Err(err) => {
            warn!("breakdown fetch failed, rendering an empty table: {err}");
            Vec::new()
        }
    }
}
