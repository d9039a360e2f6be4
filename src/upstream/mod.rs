//! Client for the third-party web-analytics HTTP API.
//!
//! The upstream contract has changed shape across versions, so response
//! decoding is deliberately tolerant: every historically-observed payload
//! shape is enumerated in `response` and new ones are added there.

pub mod client;
pub mod query;
pub mod response;

pub use client::{AnalyticsApi, ReportFetcher, UpstreamError};
pub use query::{BuiltRequest, GroupBy, ReportQuery, ReportType};
