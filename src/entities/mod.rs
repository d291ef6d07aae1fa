use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// --- Channels ---

/// Retail channels the extractor knows how to read.
///
/// The set is closed: adding a retailer means adding a variant here and its
/// selector table in `extractor::channel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    BooksComTw,
    Eslite,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::BooksComTw, Channel::Eslite];

    /// Stable key used in configuration and in the persisted store.
    pub fn key(&self) -> &'static str {
        match self {
            Self::BooksComTw => "books_com_tw",
            Self::Eslite => "eslite",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChannel(pub String);

impl fmt::Display for UnknownChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown channel '{}'", self.0)
    }
}

impl std::error::Error for UnknownChannel {}

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.key() == s)
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

// --- Records ---

/// One listing entry as read off a page, before it is stamped with a run date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub rank: u32,
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub url: Option<String>,
}

/// One observation of one title at one rank on one list on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub date: NaiveDate,
    pub channel: Channel,
    pub list_name: String,
    pub rank: u32,
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub url: Option<String>,
}

/// Identity of a stored row. At most one record per key exists in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalKey {
    pub date: NaiveDate,
    pub channel: Channel,
    pub list_name: String,
    pub rank: u32,
}

impl ListingRecord {
    pub fn from_raw(date: NaiveDate, channel: Channel, list_name: &str, item: RawItem) -> Self {
        Self {
            date,
            channel,
            list_name: list_name.to_string(),
            rank: item.rank,
            title: item.title,
            author: item.author,
            isbn: item.isbn,
            url: item.url,
        }
    }

    pub fn key(&self) -> LogicalKey {
        LogicalKey {
            date: self.date,
            channel: self.channel,
            list_name: self.list_name.clone(),
            rank: self.rank,
        }
    }
}
