//! Core data model (spec §3). Dates are trading-day dates in local market
//! timezone; months are stored as the first day of the month. Money and
//! volumes are integers; ratios and percentages are `f64`, where `12.3`
//! means `12.3%`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `(ticker, date) -> OHLCV`. Invariant: `close > 0`, `low <= open,close <= high`.
/// Never mutated after insert; replaced wholesale by upsert on key collision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub turnover: i64,
}

impl PriceBar {
    pub fn is_valid(&self) -> bool {
        self.close > 0.0 && self.low <= self.open && self.open <= self.high && self.low <= self.close && self.close <= self.high
    }
}

/// `(ticker, date) -> PER, PBR, DividendYield`. All-null rows are rejected
/// by the caller before upsert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Valuation {
    pub ticker: String,
    pub date: NaiveDate,
    pub per: Option<f64>,
    pub pbr: Option<f64>,
    pub dividend_yield: Option<f64>,
}

impl Valuation {
    pub fn all_null(&self) -> bool {
        self.per.is_none() && self.pbr.is_none() && self.dividend_yield.is_none()
    }
}

/// `(ticker, month) -> revenue, YoY, MoM, EPS, EPS_QoQ`. `month` is the
/// first day of the reporting month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MonthlyRevenue {
    pub ticker: String,
    pub month: NaiveDate,
    pub revenue: i64,
    pub yoy: Option<f64>,
    pub mom: Option<f64>,
    pub eps: Option<f64>,
    pub eps_qoq: Option<f64>,
}

/// `(ticker, date|year) -> ROE, ROA, margins, ratios`. A row is emitted
/// iff at least one derived field is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Quality {
    pub ticker: String,
    pub date: NaiveDate,
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub gross_margin: Option<f64>,
    pub op_margin: Option<f64>,
    pub net_margin: Option<f64>,
    pub debt_ratio: Option<f64>,
    pub current_ratio: Option<f64>,
    pub eps: Option<f64>,
}

impl Quality {
    pub fn any_present(&self) -> bool {
        self.roe.is_some()
            || self.roa.is_some()
            || self.gross_margin.is_some()
            || self.op_margin.is_some()
            || self.net_margin.is_some()
            || self.debt_ratio.is_some()
            || self.current_ratio.is_some()
    }
}

/// `(ticker, date) -> foreignNet, invTrustNet, dealerNet` signed share
/// counts; positive means net buy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FundFlow {
    pub ticker: String,
    pub date: NaiveDate,
    pub foreign_net: i64,
    pub inv_trust_net: i64,
    pub dealer_net: i64,
}

/// Latest technical-indicator snapshot for a ticker. Fields are `None`
/// where warm-up was insufficient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MomentumSnapshot {
    pub ticker: String,
    pub date: NaiveDate,
    pub rsi14: Option<f64>,
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub macd: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_mid: Option<f64>,
    pub bollinger_lower: Option<f64>,
    pub price_change_1m: Option<f64>,
    pub return_52w: Option<f64>,
    pub ma20_above_ma60_days: i64,
}

/// Output of the scoring engine for a single ticker at a single date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRank {
    pub ticker: String,
    pub date: NaiveDate,
    pub valuation: f64,
    pub growth: f64,
    pub quality: f64,
    pub chips: f64,
    pub momentum: f64,
    pub total: f64,
    pub missing: Vec<String>,
}

/// `date -> (ticker -> weight)`. `sum(w) == 1` or the map is empty ("hold
/// cash").
pub type TargetWeights = HashMap<String, f64>;

/// In-run portfolio state, owned exclusively by the back-test kernel.
#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    pub cash: f64,
    pub holdings: HashMap<String, f64>,
    pub last_price: HashMap<String, f64>,
}

/// Sequence of positive equity marks indexed by the sorted trading
/// calendar of a single back-test run.
#[derive(Debug, Clone, Default)]
pub struct EquityCurve {
    pub dates: Vec<NaiveDate>,
    pub equity: Vec<f64>,
}

/// Universe catalog entry (spec §4.11).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockListing {
    pub ticker: String,
    pub name: String,
    pub industry: Option<String>,
    pub market: Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Market {
    Listed,
    Otc,
    Emerging,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Listed => "上市",
            Market::Otc => "上櫃",
            Market::Emerging => "興櫃",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "上市" => Some(Market::Listed),
            "上櫃" => Some(Market::Otc),
            "興櫃" => Some(Market::Emerging),
            _ => None,
        }
    }
}

/// A scoring/back-test-facing price sample used outside the storage
/// engine (e.g. in the portfolio builder's ADTV clip).
#[derive(Debug, Clone, Copy)]
pub struct Turnover {
    pub date: NaiveDate,
    pub value: i64,
}

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}
