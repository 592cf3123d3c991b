use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString};
use tracing::debug;

use super::{normalize_ticker, parse_arguments, System};
use crate::errors::{AgentError, AgentResult};
use crate::hmm::RegimeModel;
use crate::indicators::{log_returns, rolling_mean, rolling_std, round_to, rsi};
use crate::market_data::{MarketData, MarketDataError, Period, PriceBar};
use crate::models::tool::{Tool, ToolCall};

const DEFAULT_TICKER: &str = "SPY";
const MIN_ROWS: usize = 10;
const HISTORY_DAYS: usize = 10;
const REGIME_LABELS: [&str; 5] = [
    "Strong Bull",
    "Calm Bull",
    "Neutral",
    "Bear / High Volatility",
    "Crisis",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
enum RegimeTool {
    DetectMarketRegime,
}

impl RegimeTool {
    fn definition(self) -> Tool {
        match self {
            RegimeTool::DetectMarketRegime => Tool::new(
                self.as_ref(),
                "Detect the current market regime using a pre-trained Hidden Markov Model. \
                The HMM was trained on 20 years of S&P 500 data and identifies 5 regimes: \
                Strong Bull, Calm Bull, Neutral, Bear/High Volatility, and Crisis. \
                Returns the current regime, regime probabilities, and recent regime history. \
                Use this tool to add regime context to any stock or market analysis.",
                json!({
                    "type": "object",
                    "required": [],
                    "properties": {
                        "ticker": {
                            "type": "string",
                            "description": "Ticker to analyze. Default 'SPY' (S&P 500 ETF) since the model \
                            was trained on S&P 500 data. Using SPY gives the most accurate \
                            regime detection. Other tickers can be used but results are \
                            approximate since the model was calibrated to S&P 500 dynamics."
                        }
                    }
                }),
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegimeArgs {
    ticker: Option<String>,
}

/// One complete row of model inputs
#[derive(Debug, Clone, PartialEq)]
struct FeatureRow {
    date: NaiveDate,
    log_return: f64,
    vol_21d: f64,
    vol_ratio: f64,
    rsi: f64,
    ma_distance: f64,
}

impl FeatureRow {
    fn values(&self) -> Vec<f64> {
        vec![
            self.log_return,
            self.vol_21d,
            self.vol_ratio,
            self.rsi,
            self.ma_distance,
        ]
    }
}

#[derive(Debug, Serialize)]
struct CurrentFeatures {
    log_return: f64,
    volatility_21d: f64,
    vol_ratio: f64,
    rsi: f64,
    ma_distance_pct: f64,
}

#[derive(Debug, Serialize)]
struct RegimeDay {
    date: String,
    regime: String,
}

#[derive(Debug, Serialize)]
struct RegimeReport {
    ticker: String,
    model_info: String,
    current_regime: String,
    regime_confidence_pct: Map<String, Value>,
    regime_stability: String,
    current_features: CurrentFeatures,
    recent_regime_history: Vec<RegimeDay>,
    transition_probabilities_from_current: Map<String, Value>,
    note: String,
}

/// Market regime classification from a pre-trained Gaussian HMM
pub struct RegimeSystem {
    tools: Vec<Tool>,
    source: Arc<dyn MarketData>,
    model_path: PathBuf,
}

impl RegimeSystem {
    pub fn new(source: Arc<dyn MarketData>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            tools: RegimeTool::iter().map(RegimeTool::definition).collect(),
            source,
            model_path: model_path.into(),
        }
    }

    async fn detect(&self, params: Value) -> AgentResult<Value> {
        let args: RegimeArgs = parse_arguments(params)?;
        let ticker = normalize_ticker(args.ticker.as_deref().unwrap_or(DEFAULT_TICKER))?;

        if !self.model_path.exists() {
            return Err(AgentError::ExecutionError(format!(
                "HMM model not found at {}. Set regime.model_path to a trained model artifact.",
                self.model_path.display()
            )));
        }
        let model = RegimeModel::load(&self.model_path).map_err(failed)?;

        let bars = match self.source.history(&ticker, Period::SixMonths).await {
            Ok(bars) if bars.is_empty() => {
                return Err(MarketDataError::NotFound(ticker).into());
            }
            Ok(bars) => bars,
            Err(e @ MarketDataError::NotFound(_)) => return Err(e.into()),
            Err(e) => return Err(failed(e)),
        };

        let rows = compute_features(&bars);
        if rows.len() < MIN_ROWS {
            return Err(AgentError::ExecutionError(
                "Not enough data after feature computation".to_string(),
            ));
        }
        debug!(ticker = %ticker, rows = rows.len(), "regime features computed");

        let raw: Vec<Vec<f64>> = rows.iter().map(FeatureRow::values).collect();
        let scaled = model.scale(&raw).map_err(failed)?;
        let states = model.predict(&scaled);
        let posteriors = model.predict_proba(&scaled);

        let (Some(&current), Some(current_probs), Some(latest)) =
            (states.last(), posteriors.last(), rows.last())
        else {
            return Err(failed("model produced no predictions"));
        };

        let n = model.n_components;
        let regime_confidence_pct = (0..n)
            .map(|i| (label(n, i), json!(round_to(current_probs[i] * 100.0, 1))))
            .collect();
        let transition_probabilities_from_current = (0..n)
            .map(|j| (label(n, j), json!(round_to(model.trans_mat[current][j] * 100.0, 1))))
            .collect();

        let window = states.len().saturating_sub(HISTORY_DAYS);
        let stability = states[window..].iter().filter(|s| **s == current).count();
        let recent_regime_history = rows[window..]
            .iter()
            .zip(&states[window..])
            .map(|(row, state)| RegimeDay {
                date: row.date.format("%Y-%m-%d").to_string(),
                regime: label(n, *state),
            })
            .collect();

        let report = RegimeReport {
            model_info: format!(
                "Gaussian HMM with {} states, trained on 20 years of S&P 500 data",
                n
            ),
            current_regime: label(n, current),
            regime_confidence_pct,
            regime_stability: format!("{}/{} days in current regime", stability, HISTORY_DAYS),
            current_features: CurrentFeatures {
                log_return: round_to(latest.log_return * 100.0, 3),
                volatility_21d: round_to(latest.vol_21d * 100.0, 2),
                vol_ratio: round_to(latest.vol_ratio, 3),
                rsi: round_to(latest.rsi, 1),
                ma_distance_pct: round_to(latest.ma_distance * 100.0, 2),
            },
            recent_regime_history,
            transition_probabilities_from_current,
            note: if ticker == DEFAULT_TICKER {
                "Model is running on its native index (S&P 500), highest accuracy.".to_string()
            } else {
                "Regime detection is most accurate for SPY (S&P 500) since the model \
                was trained on S&P 500 data. Results for other tickers are approximate."
                    .to_string()
            },
            ticker,
        };
        serde_json::to_value(report).map_err(|e| AgentError::Internal(e.to_string()))
    }
}

#[async_trait]
impl System for RegimeSystem {
    fn name(&self) -> &str {
        "regime"
    }

    fn description(&self) -> &str {
        "Market regime detection with a pre-trained hidden Markov model"
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Value> {
        let tool = RegimeTool::from_str(&tool_call.name)
            .map_err(|_| AgentError::ToolNotFound(tool_call.name.clone()))?;

        match tool {
            RegimeTool::DetectMarketRegime => self.detect(tool_call.arguments).await,
        }
    }
}

fn failed(err: impl std::fmt::Display) -> AgentError {
    AgentError::ExecutionError(format!("Regime detection failed: {}", err))
}

fn label(n_components: usize, state: usize) -> String {
    match REGIME_LABELS.get(state) {
        Some(name) if n_components == REGIME_LABELS.len() => name.to_string(),
        _ => format!("Regime {}", state),
    }
}

/// The five training features per bar, dropping bars where any rolling
/// window is incomplete or a value is not finite
fn compute_features(bars: &[PriceBar]) -> Vec<FeatureRow> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    if closes.len() < 2 {
        return Vec::new();
    }

    // returns[k] is the move into bar k + 1
    let returns = log_returns(&closes);
    let vol_5d = rolling_std(&returns, 5);
    let vol_21d = rolling_std(&returns, 21);
    let rsi_14 = rsi(&closes, 14);
    let ma_20 = rolling_mean(&closes, 20);

    (1..closes.len())
        .filter_map(|i| {
            let k = i - 1;
            let vol_short = vol_5d[k]?;
            let vol_long = vol_21d[k]?;
            let ma = ma_20[i]?;
            let row = FeatureRow {
                date: bars[i].date,
                log_return: returns[k],
                vol_21d: vol_long,
                vol_ratio: vol_short / vol_long,
                rsi: rsi_14[i]?,
                ma_distance: (closes[i] - ma) / ma,
            };
            row.values().iter().all(|v| v.is_finite()).then_some(row)
        })
        .collect()
}
