//! Read-only questions asked of the stored history: is a title on the chart
//! right now, where has it appeared, and how has its rank moved.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::entities::{Channel, ListingRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleQuery {
    pub text: String,
    /// Whole-title equality instead of case-insensitive substring match.
    pub exact: bool,
    pub channel: Option<Channel>,
    pub list_name: Option<String>,
}

impl TitleQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
            ..Self::default()
        }
    }

    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    pub fn channel(mut self, channel: Option<Channel>) -> Self {
        self.channel = channel;
        self
    }

    pub fn list_name(mut self, list_name: Option<String>) -> Self {
        self.list_name = list_name;
        self
    }

    fn in_scope(&self, record: &ListingRecord) -> bool {
        self.channel.is_none_or(|c| c == record.channel)
            && self
                .list_name
                .as_deref()
                .is_none_or(|l| l == record.list_name)
    }

    fn title_matches(&self, record: &ListingRecord) -> bool {
        let title = record.title.trim();
        if self.exact {
            title == self.text
        } else {
            title.to_lowercase().contains(&self.text.to_lowercase())
        }
    }

    pub fn matches(&self, record: &ListingRecord) -> bool {
        self.in_scope(record) && self.title_matches(record)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartStatus {
    /// Whether the title is listed on `latest_date`.
    pub on_chart: bool,
    /// Most recent ingestion date within the query's channel/list scope.
    pub latest_date: NaiveDate,
    /// Best (lowest) rank on `latest_date`, if listed.
    pub best_rank: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub rank: u32,
}

/// `None` when the title never appeared in scope.
pub fn chart_status(records: &[ListingRecord], query: &TitleQuery) -> Option<ChartStatus> {
    let latest_date = records
        .iter()
        .filter(|r| query.in_scope(r))
        .map(|r| r.date)
        .max()?;

    let mut seen = false;
    let mut best_rank: Option<u32> = None;
    for record in records.iter().filter(|r| query.matches(r)) {
        seen = true;
        if record.date == latest_date {
            best_rank = Some(best_rank.map_or(record.rank, |b| b.min(record.rank)));
        }
    }

    seen.then_some(ChartStatus {
        on_chart: best_rank.is_some(),
        latest_date,
        best_rank,
    })
}

/// Every matching record, oldest first, best rank first within a day.
pub fn history(records: &[ListingRecord], query: &TitleQuery) -> Vec<ListingRecord> {
    let mut hits: Vec<ListingRecord> = records.iter().filter(|r| query.matches(r)).cloned().collect();
    hits.sort_by_key(|r| (r.date, r.rank));
    hits
}

/// Best rank per day over the trailing `days` window ending at `today`.
pub fn rank_trend(
    records: &[ListingRecord],
    query: &TitleQuery,
    days: u32,
    today: NaiveDate,
) -> Vec<TrendPoint> {
    let cutoff = today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN);

    let mut best: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for record in records
        .iter()
        .filter(|r| r.date >= cutoff && query.matches(r))
    {
        best.entry(record.date)
            .and_modify(|rank| *rank = (*rank).min(record.rank))
            .or_insert(record.rank);
    }

    best.into_iter()
        .map(|(date, rank)| TrendPoint { date, rank })
        .collect()
}
