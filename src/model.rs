// Core structs: RawItem, CatalogEntry, SimilarityRow, ScoredPost, ReportStats
use chrono::{DateTime, Utc};
use thiserror::Error;

/// One labeled reference sentence of the intent catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub label: String,
    pub reference_text: String,
}

/// A single extraction attempt handed back by a page driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub text: String,
    pub author: Option<String>,
    pub author_url: Option<String>,
    pub timestamp_iso: Option<String>,
    pub url: Option<String>,
}

/// A post accepted by the collector. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    pub text: String,
    pub author: Option<String>,
    /// Link to the author's profile, when the feed exposes one.
    pub author_url: Option<String>,
    pub timestamp_iso: Option<String>,
    pub source_url: Option<String>,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityRow {
    pub item_index: usize,
    /// One score per catalog entry, aligned by catalog index.
    pub per_catalog_scores: Vec<f64>,
    pub best_index: usize,
    pub best_label: String,
    pub best_score: f64,
    pub mean_score: f64,
}

/// A collected post together with its similarity row.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPost {
    pub item: RawItem,
    pub row: SimilarityRow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportStats {
    pub query: String,
    pub post_count: usize,
    pub mean_best_score: f64,
    pub top_label: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// Opaque summary of how much content a page driver has loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressToken(pub u64);

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("intent catalog is empty")]
    Empty,
}

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("cannot score {items} items against {entries} catalog entries")]
    DimensionMismatch { items: usize, entries: usize },
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("http error: {0}")]
    HttpError(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid response status {0}")]
    InvalidResponse(u16),
    #[error(transparent)]
    Parse(#[from] ParserError),
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("html parse error: {0}")]
    HtmlParseError(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid datetime: {0}")]
    InvalidDate(#[from] chrono::ParseError),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("api error: {0}")]
    ApiError(String),
    #[error("notifier unreachable")]
    Unreachable,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
