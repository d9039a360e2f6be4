use serde::Deserialize;

use crate::config::UpstreamConfig;

/// Hard cap on breakdown rows per stats query. Callers needing more must
/// paginate upstream (not supported) or accept truncation.
pub const STATS_RESULT_LIMIT: u32 = 50;

/// Some providers reject requests carrying no user agent, so every request
/// identifies itself with a fixed one.
pub const USER_AGENT: &str = "Mozilla/5.0 (Compatible; Mirador-Dashboard/1.0)";

/// Default rolling window, expressed in the upstream's relative-token syntax.
pub const DEFAULT_FROM: &str = "now-30d";
pub const DEFAULT_TO: &str = "now";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    #[default]
    Timeseries,
    Stats,
}

impl ReportType {
    fn endpoint(&self) -> &'static str {
        match self {
            ReportType::Timeseries => "timeseries",
            ReportType::Stats => "stats",
        }
    }
}

/// Breakdown dimension for stats reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Path,
    Referrer,
    UtmSource,
    UtmMedium,
    UtmCampaign,
}

impl GroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Path => "path",
            GroupBy::Referrer => "referrer",
            GroupBy::UtmSource => "utm_source",
            GroupBy::UtmMedium => "utm_medium",
            GroupBy::UtmCampaign => "utm_campaign",
        }
    }
}

/// One report request against the upstream API. Date bounds are passed
/// through verbatim: both relative tokens ("now-30d") and absolute instants
/// are the upstream's to validate, and a malformed value surfaces as an
/// upstream 4xx.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub project_id: String,
    pub report_type: ReportType,
    pub group_by: Option<GroupBy>,
    pub from: String,
    pub to: String,
}

impl ReportQuery {
    pub fn timeseries(project_id: &str, from: &str, to: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            report_type: ReportType::Timeseries,
            group_by: None,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn stats(project_id: &str, group_by: GroupBy, from: &str, to: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            report_type: ReportType::Stats,
            group_by: Some(group_by),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Construct the upstream URL and header set. No parameter is ever
    /// dropped; team scoping is appended whenever it is configured.
    pub fn build(&self, config: &UpstreamConfig) -> BuiltRequest {
        let base = config.base_url.trim_end_matches('/');
        let mut url = format!(
            "{base}/{endpoint}?projectId={project_id}&environment=production&from={from}&to={to}",
            endpoint = self.report_type.endpoint(),
            project_id = self.project_id,
            from = self.from,
            to = self.to,
        );

        if self.report_type == ReportType::Stats {
            if let Some(group_by) = self.group_by {
                url.push_str(&format!(
                    "&groupBy={}&limit={STATS_RESULT_LIMIT}",
                    group_by.as_str()
                ));
            }
        }

        if let Some(team_id) = &config.team_id {
            url.push_str(&format!("&teamId={team_id}"));
        }

        let headers = vec![
            (
                "Authorization",
                format!("Bearer {}", config.api_token),
            ),
            ("Content-Type", "application/json".to_string()),
            ("User-Agent", USER_AGENT.to_string()),
        ];

        BuiltRequest { url, headers }
    }
}

/// A fully-built upstream request: URL plus the headers to send with it.
#[derive(Debug, Clone)]
pub struct BuiltRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(team_id: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            api_token: "secret-token".to_string(),
            team_id: team_id.map(str::to_string),
            base_url: "https://analytics.example.com/api".to_string(),
        }
    }

    #[test]
    fn timeseries_url_carries_every_parameter() {
        let query = ReportQuery::timeseries("prj_123", "now-30d", "now");
        let built = query.build(&config(None));

        assert!(built.url.starts_with("https://analytics.example.com/api/timeseries?"));
        assert!(built.url.contains("projectId=prj_123"));
        assert!(built.url.contains("environment=production"));
        assert!(built.url.contains("from=now-30d"));
        assert!(built.url.contains("to=now"));
        assert!(!built.url.contains("teamId"));
        assert!(!built.url.contains("groupBy"));
    }

    #[test]
    fn stats_url_appends_group_by_and_limit() {
        let query = ReportQuery::stats("prj_123", GroupBy::UtmSource, "2024-01-01", "2024-02-01");
        let built = query.build(&config(None));

        assert!(built.url.contains("/stats?"));
        assert!(built.url.contains("groupBy=utm_source"));
        assert!(built.url.contains("limit=50"));
        assert!(built.url.contains("from=2024-01-01"));
        assert!(built.url.contains("to=2024-02-01"));
    }

    #[test]
    fn team_id_is_appended_when_configured() {
        let query = ReportQuery::timeseries("prj_123", "now-30d", "now");
        let built = query.build(&config(Some("team_9")));

        assert!(built.url.ends_with("&teamId=team_9"));
    }

    #[test]
    fn headers_include_bearer_token_and_user_agent() {
        let query = ReportQuery::timeseries("prj_123", "now-30d", "now");
        let built = query.build(&config(None));

        let authorization = built
            .headers
            .iter()
            .find(|(name, _)| *name == "Authorization")
            .map(|(_, value)| value.as_str());
        assert_eq!(authorization, Some("Bearer secret-token"));

        let user_agent = built
            .headers
            .iter()
            .find(|(name, _)| *name == "User-Agent")
            .map(|(_, value)| value.as_str());
        assert_eq!(user_agent, Some(USER_AGENT));
    }
}
