//! Market data sources consumed by the tool systems
//!
//! Tools only see the [`MarketData`] trait, so tests can swap the live Yahoo
//! Finance client for in-memory fixtures.
pub mod yahoo;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

use crate::errors::AgentError;

pub use yahoo::{YahooFinance, YahooFinanceConfig};

/// Lookback window for daily price history
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
)]
pub enum Period {
    #[serde(rename = "1mo")]
    #[strum(serialize = "1mo")]
    OneMonth,
    #[default]
    #[serde(rename = "3mo")]
    #[strum(serialize = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    #[strum(serialize = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    #[strum(serialize = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    #[strum(serialize = "2y")]
    TwoYears,
}

/// One daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Fundamentals for a listed company. Every field is optional because
/// upstream coverage varies by symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub recommendation: Option<String>,
    pub business_summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: Option<String>,
    pub publisher: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub link: Option<String>,
}

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("No data found for ticker '{0}'")]
    NotFound(String),

    #[error("Market data request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Market data service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected market data response: {0}")]
    Decode(String),
}

impl From<MarketDataError> for AgentError {
    fn from(err: MarketDataError) -> Self {
        AgentError::ExecutionError(err.to_string())
    }
}

/// Source of prices, fundamentals and headlines
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Daily bars for `symbol` over `period`, oldest first
    async fn history(&self, symbol: &str, period: Period) -> Result<Vec<PriceBar>, MarketDataError>;

    async fn profile(&self, symbol: &str) -> Result<CompanyProfile, MarketDataError>;

    /// Up to `limit` recent articles, newest first
    async fn news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsArticle>, MarketDataError>;
}
