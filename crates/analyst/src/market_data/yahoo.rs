use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{CompanyProfile, MarketData, MarketDataError, NewsArticle, Period, PriceBar};

pub const YAHOO_HOST: &str = "https://query2.finance.yahoo.com";
pub const YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YahooFinanceConfig {
    pub host: String,
    /// Visited once to obtain the session cookie the crumb endpoint requires
    pub cookie_url: Option<String>,
}

impl Default for YahooFinanceConfig {
    fn default() -> Self {
        Self {
            host: YAHOO_HOST.to_string(),
            cookie_url: Some(YAHOO_COOKIE_URL.to_string()),
        }
    }
}

/// Yahoo Finance client backed by the public chart, quoteSummary and search endpoints
pub struct YahooFinance {
    client: Client,
    config: YahooFinanceConfig,
    crumb: Mutex<Option<String>>,
}

impl YahooFinance {
    pub fn new(config: YahooFinanceConfig) -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            crumb: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.host.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<(StatusCode, T), MarketDataError> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<T>(&body) {
            Ok(parsed) => Ok((status, parsed)),
            Err(_) if !status.is_success() => Err(MarketDataError::Api {
                status: status.as_u16(),
                message: body,
            }),
            Err(e) => Err(MarketDataError::Decode(e.to_string())),
        }
    }

    /// Fetch and cache the anti-forgery crumb quoteSummary requires
    async fn crumb(&self) -> Result<String, MarketDataError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        if let Some(cookie_url) = &self.config.cookie_url {
            // this endpoint answers 404 but still sets the session cookie
            if let Err(e) = self.client.get(cookie_url).send().await {
                debug!("cookie request failed: {}", e);
            }
        }

        let response = self.client.get(self.url("/v1/test/getcrumb")).send().await?;
        let status = response.status();
        let crumb = response.text().await?;
        if !status.is_success() || crumb.trim().is_empty() {
            return Err(MarketDataError::Api {
                status: status.as_u16(),
                message: "could not obtain crumb".to_string(),
            });
        }

        let crumb = crumb.trim().to_string();
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    async fn quote_summary(&self, symbol: &str) -> Result<CompanyProfile, MarketDataError> {
        let url = self.url(&format!(
            "/v10/finance/quoteSummary/{}",
            urlencoding::encode(symbol)
        ));
        let mut query = vec![(
            "modules",
            "price,assetProfile,summaryDetail,financialData".to_string(),
        )];
        match self.crumb().await {
            Ok(crumb) => query.push(("crumb", crumb)),
            Err(e) => warn!("continuing without crumb: {}", e),
        }

        let (status, envelope): (_, QuoteSummaryEnvelope) = self.get_json(&url, &query).await?;
        if let Some(error) = envelope.quote_summary.error {
            return Err(yahoo_error(symbol, status, error));
        }

        let result = envelope
            .quote_summary
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))?;

        Ok(result.into_profile())
    }
}

#[async_trait]
impl MarketData for YahooFinance {
    async fn history(&self, symbol: &str, period: Period) -> Result<Vec<PriceBar>, MarketDataError> {
        let url = self.url(&format!("/v8/finance/chart/{}", urlencoding::encode(symbol)));
        let query = [
            ("range", period.to_string()),
            ("interval", "1d".to_string()),
            ("includePrePost", "false".to_string()),
        ];
        let (status, envelope): (_, ChartEnvelope) = self.get_json(&url, &query).await?;

        if let Some(error) = envelope.chart.error {
            return Err(yahoo_error(symbol, status, error));
        }

        let result = envelope
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))?;

        Ok(result.into_bars())
    }

    async fn profile(&self, symbol: &str) -> Result<CompanyProfile, MarketDataError> {
        match self.quote_summary(symbol).await {
            Err(e) if is_unauthorized(&e) => {
                // crumbs expire with the session cookie; fetch a new one and retry once
                debug!("crumb rejected, refreshing: {}", e);
                self.crumb.lock().await.take();
                self.quote_summary(symbol).await
            }
            result => result,
        }
    }

    async fn news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsArticle>, MarketDataError> {
        let url = self.url("/v1/finance/search");
        let query = [
            ("q", symbol.to_string()),
            ("quotesCount", "0".to_string()),
            ("newsCount", limit.to_string()),
        ];
        let (status, envelope): (_, SearchEnvelope) = self.get_json(&url, &query).await?;
        if !status.is_success() {
            return Err(MarketDataError::Api {
                status: status.as_u16(),
                message: "search request failed".to_string(),
            });
        }

        Ok(envelope
            .news
            .into_iter()
            .take(limit)
            .map(SearchNewsItem::into_article)
            .collect())
    }
}

/// A stale or missing crumb, reported either as a bare 401 or as an
/// `Unauthorized` error code in the envelope
fn is_unauthorized(err: &MarketDataError) -> bool {
    match err {
        MarketDataError::Api { status, message } => {
            *status == 401 || message.starts_with("Unauthorized")
        }
        _ => false,
    }
}

fn yahoo_error(symbol: &str, status: StatusCode, error: YahooError) -> MarketDataError {
    if error.code.eq_ignore_ascii_case("Not Found") {
        MarketDataError::NotFound(symbol.to_string())
    } else {
        MarketDataError::Api {
            status: status.as_u16(),
            message: format!("{}: {}", error.code, error.description),
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

impl ChartResult {
    /// Rows with a missing price are dropped; a missing volume counts as zero
    fn into_bars(self) -> Vec<PriceBar> {
        let quote = self.indicators.quote.into_iter().next().unwrap_or_default();
        let offset = self.meta.gmtoffset;

        self.timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
                Some(PriceBar {
                    date,
                    open: (*quote.open.get(i)?)?,
                    high: (*quote.high.get(i)?)?,
                    low: (*quote.low.get(i)?)?,
                    close: (*quote.close.get(i)?)?,
                    volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    #[serde(default)]
    price: PriceModule,
    #[serde(default)]
    asset_profile: AssetProfileModule,
    #[serde(default)]
    summary_detail: SummaryDetailModule,
    #[serde(default)]
    financial_data: FinancialDataModule,
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`, or `{}` when absent
#[derive(Debug, Default, Deserialize)]
struct RawNumber {
    raw: Option<f64>,
}

fn raw(value: Option<RawNumber>) -> Option<f64> {
    value.and_then(|v| v.raw)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
    market_cap: Option<RawNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetProfileModule {
    sector: Option<String>,
    industry: Option<String>,
    long_business_summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetailModule {
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawNumber>,
    #[serde(rename = "forwardPE")]
    forward_pe: Option<RawNumber>,
    dividend_yield: Option<RawNumber>,
    fifty_two_week_high: Option<RawNumber>,
    fifty_two_week_low: Option<RawNumber>,
    market_cap: Option<RawNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialDataModule {
    recommendation_key: Option<String>,
}

impl QuoteSummaryResult {
    fn into_profile(self) -> CompanyProfile {
        CompanyProfile {
            name: self.price.long_name.or(self.price.short_name),
            sector: self.asset_profile.sector,
            industry: self.asset_profile.industry,
            market_cap: raw(self.price.market_cap).or(raw(self.summary_detail.market_cap)),
            trailing_pe: raw(self.summary_detail.trailing_pe),
            forward_pe: raw(self.summary_detail.forward_pe),
            dividend_yield: raw(self.summary_detail.dividend_yield),
            fifty_two_week_high: raw(self.summary_detail.fifty_two_week_high),
            fifty_two_week_low: raw(self.summary_detail.fifty_two_week_low),
            recommendation: self.financial_data.recommendation_key,
            business_summary: self.asset_profile.long_business_summary,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    news: Vec<SearchNewsItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNewsItem {
    title: Option<String>,
    publisher: Option<String>,
    link: Option<String>,
    provider_publish_time: Option<i64>,
    summary: Option<String>,
}

impl SearchNewsItem {
    fn into_article(self) -> NewsArticle {
        NewsArticle {
            title: self.title,
            publisher: self.publisher,
            published_at: self
                .provider_publish_time
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
            summary: self.summary,
            link: self.link,
        }
    }
}
