use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use std::collections::HashMap;

use crate::market_data::{
    CompanyProfile, MarketData, MarketDataError, NewsArticle, Period, PriceBar,
};

/// In-memory market data keyed by symbol
#[derive(Default)]
pub struct FixtureMarketData {
    pub bars: HashMap<String, Vec<PriceBar>>,
    pub profiles: HashMap<String, CompanyProfile>,
    pub news: HashMap<String, Vec<NewsArticle>>,
    /// When set, every news lookup fails with this message
    pub news_failure: Option<String>,
}

impl FixtureMarketData {
    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_profile(mut self, symbol: &str, profile: CompanyProfile) -> Self {
        self.profiles.insert(symbol.to_string(), profile);
        self
    }

    pub fn with_news(mut self, symbol: &str, news: Vec<NewsArticle>) -> Self {
        self.news.insert(symbol.to_string(), news);
        self
    }
}

#[async_trait]
impl MarketData for FixtureMarketData {
    async fn history(&self, symbol: &str, _period: Period) -> Result<Vec<PriceBar>, MarketDataError> {
        self.bars
            .get(symbol)
            .cloned()
            .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))
    }

    async fn profile(&self, symbol: &str) -> Result<CompanyProfile, MarketDataError> {
        self.profiles
            .get(symbol)
            .cloned()
            .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))
    }

    async fn news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsArticle>, MarketDataError> {
        if let Some(message) = &self.news_failure {
            return Err(MarketDataError::Api {
                status: 500,
                message: message.clone(),
            });
        }
        Ok(self
            .news
            .get(symbol)
            .map(|articles| articles.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Daily bars built from a list of closes; highs and lows sit one unit
/// either side of the close
pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| PriceBar {
            date: start.checked_add_days(Days::new(i as u64)).unwrap(),
            open: *close,
            high: close + 1.0,
            low: close - 1.0,
            close: *close,
            volume: 1_000 + i as u64,
        })
        .collect()
}

/// A steady uptrend of `n` closes starting at 100
pub fn rising_closes(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 + i as f64).collect()
}
