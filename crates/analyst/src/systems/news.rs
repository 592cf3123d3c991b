use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString};

use super::{normalize_ticker, parse_arguments, truncate_chars, System};
use crate::errors::{AgentError, AgentResult};
use crate::market_data::{MarketData, NewsArticle};
use crate::models::tool::{Tool, ToolCall};

const MAX_ARTICLES: usize = 8;
const SUMMARY_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
enum NewsTool {
    GetStockNews,
}

impl NewsTool {
    fn definition(self) -> Tool {
        match self {
            NewsTool::GetStockNews => Tool::new(
                self.as_ref(),
                "Fetch recent news headlines and articles for a stock ticker. \
                Returns titles, publishers, publication dates, and article links. \
                Use this tool to understand WHY a stock is moving: earnings reports, \
                analyst upgrades/downgrades, product launches, regulatory news, etc. \
                Complements price and technical data with narrative context.",
                json!({
                    "type": "object",
                    "required": ["ticker"],
                    "properties": {
                        "ticker": {
                            "type": "string",
                            "description": "Stock ticker symbol (e.g., 'AAPL', 'TSLA', 'NVDA')"
                        }
                    }
                }),
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NewsArgs {
    ticker: String,
}

#[derive(Debug, Serialize)]
struct ArticleSummary {
    title: String,
    publisher: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<String>,
}

impl From<NewsArticle> for ArticleSummary {
    fn from(article: NewsArticle) -> Self {
        Self {
            title: article.title.unwrap_or_else(|| "N/A".to_string()),
            publisher: article.publisher.unwrap_or_else(|| "N/A".to_string()),
            date: article
                .published_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string()),
            summary: article
                .summary
                .filter(|s| !s.is_empty())
                .map(|s| truncate_chars(&s, SUMMARY_CHARS)),
            link: article.link.filter(|l| !l.is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
struct NewsReport {
    ticker: String,
    article_count: usize,
    articles: Vec<ArticleSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

/// Recent headlines for a ticker
pub struct NewsSystem {
    tools: Vec<Tool>,
    source: Arc<dyn MarketData>,
}

impl NewsSystem {
    pub fn new(source: Arc<dyn MarketData>) -> Self {
        Self {
            tools: NewsTool::iter().map(NewsTool::definition).collect(),
            source,
        }
    }

    async fn stock_news(&self, params: Value) -> AgentResult<Value> {
        let args: NewsArgs = parse_arguments(params)?;
        let ticker = normalize_ticker(&args.ticker)?;

        let articles = self
            .source
            .news(&ticker, MAX_ARTICLES)
            .await
            .map_err(|e| AgentError::ExecutionError(format!("Failed to fetch news: {}", e)))?;

        let articles: Vec<ArticleSummary> = articles
            .into_iter()
            .take(MAX_ARTICLES)
            .map(ArticleSummary::from)
            .collect();

        let report = NewsReport {
            ticker,
            article_count: articles.len(),
            note: articles
                .is_empty()
                .then(|| "No recent news found for this ticker.".to_string()),
            articles,
        };
        serde_json::to_value(report).map_err(|e| AgentError::Internal(e.to_string()))
    }
}

#[async_trait]
impl System for NewsSystem {
    fn name(&self) -> &str {
        "news"
    }

    fn description(&self) -> &str {
        "Recent news headlines for listed companies"
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Value> {
        let tool = NewsTool::from_str(&tool_call.name)
            .map_err(|_| AgentError::ToolNotFound(tool_call.name.clone()))?;

        match tool {
            NewsTool::GetStockNews => self.stock_news(tool_call.arguments).await,
        }
    }
}
