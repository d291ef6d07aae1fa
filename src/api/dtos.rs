use serde::{Deserialize, Serialize};

use crate::entities::{Channel, ListingRecord};
use crate::query::{ChartStatus, TitleQuery, TrendPoint};

pub const DEFAULT_TREND_DAYS: u32 = 90;
const ALL: &str = "all";

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub exact: bool,
    pub channel: Option<String>,
    pub list: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrendParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default)]
    pub exact: bool,
    pub channel: Option<String>,
    pub list: Option<String>,
}

fn default_days() -> u32 {
    DEFAULT_TREND_DAYS
}

/// Turns raw query-string values into a `TitleQuery`. An empty or `all`
/// channel/list means no filter.
pub fn build_query(
    q: &str,
    exact: bool,
    channel: Option<&str>,
    list: Option<&str>,
) -> Result<TitleQuery, String> {
    let text = q.trim();
    if text.is_empty() {
        return Err("Query parameter 'q' is required".to_string());
    }

    let channel = match filter_value(channel) {
        Some(key) => Some(key.parse::<Channel>().map_err(|e| e.to_string())?),
        None => None,
    };
    let list_name = filter_value(list).map(str::to_string);

    Ok(TitleQuery::new(text)
        .exact(exact)
        .channel(channel)
        .list_name(list_name))
}

fn filter_value(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(ALL))
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    /// `null` when the title never appeared.
    pub status: Option<ChartStatus>,
    pub history: Vec<ListingRecord>,
}

#[derive(Debug, Serialize)]
pub struct TrendResponse {
    pub query: String,
    pub days: u32,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub records: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
