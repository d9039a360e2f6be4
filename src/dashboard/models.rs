use serde::Serialize;

/// One chart bucket, serialized with the labels the charts and CSV exports
/// display ("Visitantes"/"Vistas").
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub date: String,
    #[serde(rename = "Visitantes")]
    pub visitors: u64,
    #[serde(rename = "Vistas")]
    pub pageviews: u64,
}

/// One breakdown table row. Pageviews are only meaningful for the per-path
/// breakdown and are omitted from the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatEntry {
    pub key: String,
    pub visitors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pageviews: Option<u64>,
}

/// The chart-ready record set for one (project, date range) pair. Rebuilt
/// wholesale on every successful fetch cycle; never merged incrementally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsBundle {
    pub timeseries: Vec<ChartPoint>,
    pub pages: Vec<StatEntry>,
    pub referrers: Vec<StatEntry>,
    pub utms: Vec<StatEntry>,
}

impl AnalyticsBundle {
    pub fn total_visitors(&self) -> u64 {
        self.timeseries.iter().map(|point| point.visitors).sum()
    }

    pub fn total_pageviews(&self) -> u64 {
        self.timeseries.iter().map(|point| point.pageviews).sum()
    }

    pub fn unique_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn totals(&self) -> Totals {
        Totals {
            visitors: self.total_visitors(),
            pageviews: self.total_pageviews(),
            unique_pages: self.unique_pages(),
        }
    }
}

/// Derived values, recomputed from the bundle on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub visitors: u64,
    pub pageviews: u64,
    pub unique_pages: usize,
}

/// The (project, date range) pair a fetch cycle was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub project_id: String,
    pub from: String,
    pub to: String,
}

/// Bundle plus derived totals, as served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct BundleView {
    #[serde(flatten)]
    pub bundle: AnalyticsBundle,
    pub totals: Totals,
}

impl From<&AnalyticsBundle> for BundleView {
    fn from(bundle: &AnalyticsBundle) -> Self {
        Self {
            totals: bundle.totals(),
            bundle: bundle.clone(),
        }
    }
}
