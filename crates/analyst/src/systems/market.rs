use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString};

use super::{normalize_ticker, parse_arguments, truncate_chars, System};
use crate::errors::{AgentError, AgentResult};
use crate::indicators::{
    ema, last, mean, pct_change, rolling_mean, rolling_std, round_to, rounded, rsi, sample_std,
};
use crate::market_data::{MarketData, Period, PriceBar};
use crate::models::tool::{Tool, ToolCall};

const RECENT_BARS: usize = 10;
const SUMMARY_CHARS: usize = 500;
const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
enum MarketTool {
    GetStockData,
    GetCompanyInfo,
    GetTechnicalIndicators,
}

impl MarketTool {
    fn definition(self) -> Tool {
        let ticker = json!({
            "type": "string",
            "description": "Stock ticker symbol (e.g., 'AAPL', 'MSFT', 'SPY')"
        });

        match self {
            MarketTool::GetStockData => Tool::new(
                self.as_ref(),
                "Fetch historical stock price data for a given ticker symbol. \
                Returns OHLCV data (Open, High, Low, Close, Volume) along with \
                basic statistics like average price, volatility, and price change.",
                json!({
                    "type": "object",
                    "required": ["ticker"],
                    "properties": {
                        "ticker": ticker,
                        "period": {
                            "type": "string",
                            "description": "Time period for data. Options: '1mo', '3mo', '6mo', '1y', '2y'",
                            "enum": Period::iter().map(|p| p.to_string()).collect::<Vec<_>>()
                        }
                    }
                }),
            ),
            MarketTool::GetCompanyInfo => Tool::new(
                self.as_ref(),
                "Fetch fundamental company information including sector, industry, \
                market cap, P/E ratio, dividend yield, and a business summary.",
                json!({
                    "type": "object",
                    "required": ["ticker"],
                    "properties": {"ticker": ticker}
                }),
            ),
            MarketTool::GetTechnicalIndicators => Tool::new(
                self.as_ref(),
                "Calculate technical indicators for a stock: Simple Moving Averages \
                (SMA 20, 50, 200), Relative Strength Index (RSI), MACD, and \
                Bollinger Bands. Useful for trend and momentum analysis.",
                json!({
                    "type": "object",
                    "required": ["ticker"],
                    "properties": {"ticker": ticker}
                }),
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StockDataArgs {
    ticker: String,
    #[serde(default)]
    period: Period,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TickerArgs {
    ticker: String,
}

#[derive(Debug, Serialize)]
struct StockDataReport {
    ticker: String,
    period: Period,
    current_price: f64,
    period_high: f64,
    period_low: f64,
    price_change_pct: Option<f64>,
    annualized_volatility_pct: Option<f64>,
    avg_daily_volume: u64,
    recent_prices: Value,
    data_points: usize,
}

#[derive(Debug, Serialize)]
struct CompanyInfoReport {
    ticker: String,
    name: Value,
    sector: Value,
    industry: Value,
    market_cap: Value,
    pe_ratio: Value,
    forward_pe: Value,
    dividend_yield: Value,
    #[serde(rename = "52_week_high")]
    fifty_two_week_high: Value,
    #[serde(rename = "52_week_low")]
    fifty_two_week_low: Value,
    avg_analyst_rating: Value,
    business_summary: String,
}

#[derive(Debug, Serialize)]
struct TechnicalReport {
    ticker: String,
    current_price: f64,
    sma_20: Option<f64>,
    sma_50: Option<f64>,
    sma_200: Option<f64>,
    rsi_14: Option<f64>,
    macd: Option<f64>,
    macd_signal: Option<f64>,
    macd_histogram: Option<f64>,
    bollinger_upper: Option<f64>,
    bollinger_middle: Option<f64>,
    bollinger_lower: Option<f64>,
    trend_signals: Vec<String>,
}

/// Price history, fundamentals and technical indicators
pub struct MarketSystem {
    tools: Vec<Tool>,
    source: Arc<dyn MarketData>,
}

impl MarketSystem {
    pub fn new(source: Arc<dyn MarketData>) -> Self {
        Self {
            tools: MarketTool::iter().map(MarketTool::definition).collect(),
            source,
        }
    }

    async fn load_bars(&self, ticker: &str, period: Period) -> AgentResult<Vec<PriceBar>> {
        let bars = self.source.history(ticker, period).await?;
        if bars.is_empty() {
            return Err(AgentError::ExecutionError(format!(
                "No data found for ticker '{}'",
                ticker
            )));
        }
        Ok(bars)
    }

    async fn stock_data(&self, params: Value) -> AgentResult<Value> {
        let args: StockDataArgs = parse_arguments(params)?;
        let ticker = normalize_ticker(&args.ticker)?;
        let bars = self.load_bars(&ticker, args.period).await?;
        to_value(stock_data_report(ticker, args.period, &bars))
    }

    async fn company_info(&self, params: Value) -> AgentResult<Value> {
        let args: TickerArgs = parse_arguments(params)?;
        let ticker = normalize_ticker(&args.ticker)?;
        let profile = self.source.profile(&ticker).await?;

        to_value(CompanyInfoReport {
            ticker,
            name: or_na(profile.name),
            sector: or_na(profile.sector),
            industry: or_na(profile.industry),
            market_cap: or_na(profile.market_cap),
            pe_ratio: or_na(profile.trailing_pe),
            forward_pe: or_na(profile.forward_pe),
            dividend_yield: or_na(profile.dividend_yield),
            fifty_two_week_high: or_na(profile.fifty_two_week_high),
            fifty_two_week_low: or_na(profile.fifty_two_week_low),
            avg_analyst_rating: or_na(profile.recommendation),
            business_summary: truncate_chars(
                profile.business_summary.as_deref().unwrap_or("N/A"),
                SUMMARY_CHARS,
            ),
        })
    }

    async fn technical_indicators(&self, params: Value) -> AgentResult<Value> {
        let args: TickerArgs = parse_arguments(params)?;
        let ticker = normalize_ticker(&args.ticker)?;
        let bars = self.load_bars(&ticker, Period::OneYear).await?;
        to_value(technical_report(ticker, &bars))
    }
}

#[async_trait]
impl System for MarketSystem {
    fn name(&self) -> &str {
        "market"
    }

    fn description(&self) -> &str {
        "Historical prices, company fundamentals and technical indicators"
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Value> {
        let tool = MarketTool::from_str(&tool_call.name)
            .map_err(|_| AgentError::ToolNotFound(tool_call.name.clone()))?;

        match tool {
            MarketTool::GetStockData => self.stock_data(tool_call.arguments).await,
            MarketTool::GetCompanyInfo => self.company_info(tool_call.arguments).await,
            MarketTool::GetTechnicalIndicators => {
                self.technical_indicators(tool_call.arguments).await
            }
        }
    }
}

fn stock_data_report(ticker: String, period: Period, bars: &[PriceBar]) -> StockDataReport {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let first = closes[0];
    let latest = closes[closes.len() - 1];

    let high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();

    let mut recent_close = Map::new();
    let mut recent_volume = Map::new();
    for bar in &bars[bars.len().saturating_sub(RECENT_BARS)..] {
        let date = bar.date.format("%Y-%m-%d").to_string();
        recent_close.insert(date.clone(), json!(round_to(bar.close, 2)));
        recent_volume.insert(date, json!(bar.volume));
    }

    StockDataReport {
        ticker,
        period,
        current_price: round_to(latest, 2),
        period_high: round_to(high, 2),
        period_low: round_to(low, 2),
        price_change_pct: rounded(Some((latest - first) / first * 100.0), 2),
        annualized_volatility_pct: rounded(
            sample_std(&pct_change(&closes)).map(|std| std * TRADING_DAYS.sqrt() * 100.0),
            2,
        ),
        avg_daily_volume: mean(&volumes).unwrap_or(0.0) as u64,
        recent_prices: json!({"Close": recent_close, "Volume": recent_volume}),
        data_points: bars.len(),
    }
}

fn technical_report(ticker: String, bars: &[PriceBar]) -> TechnicalReport {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let current = closes[closes.len() - 1];

    let sma_20 = last(&rolling_mean(&closes, 20));
    let sma_50 = last(&rolling_mean(&closes, 50));
    let sma_200 = last(&rolling_mean(&closes, 200));
    let rsi_14 = last(&rsi(&closes, 14));

    let ema_12 = ema(&closes, 12);
    let ema_26 = ema(&closes, 26);
    let macd_line: Vec<f64> = ema_12.iter().zip(&ema_26).map(|(a, b)| a - b).collect();
    let signal_line = ema(&macd_line, 9);
    let histogram: Vec<f64> = macd_line.iter().zip(&signal_line).map(|(m, s)| m - s).collect();

    let bb_std = last(&rolling_std(&closes, 20));
    let bollinger = sma_20.zip(bb_std);

    let mut signals = Vec::new();
    if let (Some(sma_50), Some(sma_200)) = (sma_50, sma_200) {
        if current > sma_50 && sma_50 > sma_200 {
            signals.push("Bullish: Price above SMA50 and SMA200 (golden cross territory)");
        } else if current < sma_50 && sma_50 < sma_200 {
            signals.push("Bearish: Price below SMA50 and SMA200 (death cross territory)");
        }
    }
    match rsi_14 {
        Some(value) if value > 70.0 => signals.push("RSI overbought (>70): Potential pullback"),
        Some(value) if value < 30.0 => signals.push("RSI oversold (<30): Potential bounce"),
        _ => {}
    }
    if let [.., previous, latest] = histogram.as_slice() {
        if *latest > 0.0 && *previous <= 0.0 {
            signals.push("MACD bullish crossover (histogram turned positive)");
        } else if *latest < 0.0 && *previous >= 0.0 {
            signals.push("MACD bearish crossover (histogram turned negative)");
        }
    }
    if signals.is_empty() {
        signals.push("Neutral / no strong signals");
    }

    TechnicalReport {
        ticker,
        current_price: round_to(current, 2),
        sma_20: rounded(sma_20, 2),
        sma_50: rounded(sma_50, 2),
        sma_200: rounded(sma_200, 2),
        rsi_14: rounded(rsi_14, 2),
        macd: rounded(macd_line.last().copied(), 2),
        macd_signal: rounded(signal_line.last().copied(), 2),
        macd_histogram: rounded(histogram.last().copied(), 2),
        bollinger_upper: rounded(bollinger.map(|(mid, std)| mid + 2.0 * std), 2),
        bollinger_middle: rounded(sma_20, 2),
        bollinger_lower: rounded(bollinger.map(|(mid, std)| mid - 2.0 * std), 2),
        trend_signals: signals.into_iter().map(String::from).collect(),
    }
}

/// Missing upstream fields are reported as the literal "N/A"
fn or_na<T: Serialize>(value: Option<T>) -> Value {
    value
        .and_then(|v| serde_json::to_value(v).ok())
        .filter(|v| !v.is_null())
        .unwrap_or_else(|| json!("N/A"))
}

fn to_value<T: Serialize>(report: T) -> AgentResult<Value> {
    serde_json::to_value(report).map_err(|e| AgentError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::CompanyProfile;
    use crate::systems::fixtures::{bars_from_closes, rising_closes, FixtureMarketData};

    fn system(source: FixtureMarketData) -> MarketSystem {
        MarketSystem::new(Arc::new(source))
    }

    #[test]
    fn test_tool_catalog() {
        let system = system(FixtureMarketData::default());
        let names: Vec<_> = system.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["get_stock_data", "get_company_info", "get_technical_indicators"]
        );
        assert_eq!(
            system.tools()[0].input_schema["properties"]["period"]["enum"],
            json!(["1mo", "3mo", "6mo", "1y", "2y"])
        );
    }

    #[tokio::test]
    async fn test_stock_data_statistics() {
        let closes = vec![100.0, 110.0, 99.0, 108.9];
        let source = FixtureMarketData::default().with_bars("AAPL", bars_from_closes(&closes));
        let system = system(source);

        let result = system
            .call(ToolCall::new("get_stock_data", json!({"ticker": "aapl"})))
            .await
            .unwrap();

        assert_eq!(result["ticker"], "AAPL");
        assert_eq!(result["period"], "3mo");
        assert_eq!(result["current_price"], 108.9);
        assert_eq!(result["period_high"], 111.0);
        assert_eq!(result["period_low"], 98.0);
        assert_eq!(result["price_change_pct"], 8.9);
        assert_eq!(result["avg_daily_volume"], 1001);
        assert_eq!(result["data_points"], 4);
        assert_eq!(result["recent_prices"]["Close"]["2024-01-02"], 110.0);
        assert_eq!(result["recent_prices"]["Volume"]["2024-01-04"], 1003);

        // daily moves of +10%, -10%, +10%
        let expected = sample_std(&[0.1, -0.1, 0.1]).unwrap() * 252f64.sqrt() * 100.0;
        let volatility = result["annualized_volatility_pct"].as_f64().unwrap();
        assert!((volatility - round_to(expected, 2)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stock_data_keeps_last_ten_bars() {
        let source =
            FixtureMarketData::default().with_bars("MSFT", bars_from_closes(&rising_closes(30)));
        let result = system(source)
            .call(ToolCall::new("get_stock_data", json!({"ticker": "MSFT", "period": "1y"})))
            .await
            .unwrap();

        assert_eq!(result["period"], "1y");
        let close = result["recent_prices"]["Close"].as_object().unwrap();
        assert_eq!(close.len(), 10);
        assert_eq!(close.keys().next().unwrap(), "2024-01-21");
    }

    #[tokio::test]
    async fn test_stock_data_errors() {
        let source = FixtureMarketData::default().with_bars("EMPTY", vec![]);
        let system = system(source);

        let err = system
            .call(ToolCall::new("get_stock_data", json!({"ticker": "ZZZZ"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No data found for ticker 'ZZZZ'");

        let err = system
            .call(ToolCall::new("get_stock_data", json!({"ticker": "EMPTY"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No data found for ticker 'EMPTY'");

        let err = system
            .call(ToolCall::new("get_stock_data", json!({"ticker": "AAPL", "period": "5y"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(_)));

        let err = system
            .call(ToolCall::new("get_stock_data", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(ref m) if m.contains("ticker")));
    }

    #[tokio::test]
    async fn test_company_info_fallbacks() {
        let profile = CompanyProfile {
            name: Some("Apple Inc.".into()),
            sector: Some("Technology".into()),
            market_cap: Some(3.4e12),
            trailing_pe: Some(33.1),
            fifty_two_week_high: Some(237.23),
            business_summary: Some("x".repeat(800)),
            ..Default::default()
        };
        let source = FixtureMarketData::default().with_profile("AAPL", profile);
        let result = system(source)
            .call(ToolCall::new("get_company_info", json!({"ticker": "AAPL"})))
            .await
            .unwrap();

        assert_eq!(result["name"], "Apple Inc.");
        assert_eq!(result["industry"], "N/A");
        assert_eq!(result["pe_ratio"], 33.1);
        assert_eq!(result["forward_pe"], "N/A");
        assert_eq!(result["52_week_high"], 237.23);
        assert_eq!(result["52_week_low"], "N/A");
        assert_eq!(result["avg_analyst_rating"], "N/A");
        assert_eq!(result["business_summary"].as_str().unwrap().len(), 500);
    }

    #[tokio::test]
    async fn test_company_info_missing_summary() {
        let source = FixtureMarketData::default().with_profile("XYZ", CompanyProfile::default());
        let result = system(source)
            .call(ToolCall::new("get_company_info", json!({"ticker": "XYZ"})))
            .await
            .unwrap();
        assert_eq!(result["business_summary"], "N/A");
        assert_eq!(result["market_cap"], "N/A");
    }

    #[tokio::test]
    async fn test_technical_indicators_uptrend() {
        let source =
            FixtureMarketData::default().with_bars("NVDA", bars_from_closes(&rising_closes(250)));
        let result = system(source)
            .call(ToolCall::new("get_technical_indicators", json!({"ticker": "NVDA"})))
            .await
            .unwrap();

        // closes run 100..=349
        assert_eq!(result["current_price"], 349.0);
        assert_eq!(result["sma_20"], 339.5);
        assert_eq!(result["sma_50"], 324.5);
        assert_eq!(result["sma_200"], 249.5);
        assert_eq!(result["rsi_14"], 100.0);
        assert_eq!(result["bollinger_middle"], 339.5);
        assert!(result["bollinger_upper"].as_f64().unwrap() > 339.5);
        assert!(result["macd"].as_f64().unwrap() > 0.0);

        let signals: Vec<&str> = result["trend_signals"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s.as_str().unwrap())
            .collect();
        assert!(signals.contains(&"Bullish: Price above SMA50 and SMA200 (golden cross territory)"));
        assert!(signals.contains(&"RSI overbought (>70): Potential pullback"));
    }

    #[tokio::test]
    async fn test_technical_indicators_short_history() {
        let source =
            FixtureMarketData::default().with_bars("IPO", bars_from_closes(&[10.0, 10.0, 10.0]));
        let result = system(source)
            .call(ToolCall::new("get_technical_indicators", json!({"ticker": "IPO"})))
            .await
            .unwrap();

        assert!(result["sma_20"].is_null());
        assert!(result["sma_200"].is_null());
        assert!(result["rsi_14"].is_null());
        assert!(result["bollinger_upper"].is_null());
        assert_eq!(result["macd"], 0.0);
        assert_eq!(result["trend_signals"], json!(["Neutral / no strong signals"]));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = system(FixtureMarketData::default())
            .call(ToolCall::new("get_weather", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err, AgentError::ToolNotFound("get_weather".into()));
    }
}
