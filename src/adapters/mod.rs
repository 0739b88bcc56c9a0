//! Upstream adapters (C1): two typed clients — [`primary::PrimarySource`]
//! (TWSE OpenAPI) and [`fallback::FallbackSource`] (FinMind) — over
//! HTTP/JSON, normalizing raw rows into the canonical records in
//! [`crate::models`]. `QuotaExceeded` surfaces as [`crate::error::AppError`]
//! so C4 can branch on it.

pub mod fallback;
pub mod primary;

use crate::models::{FundFlow, MonthlyRevenue, PriceBar, Quality, Valuation};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Window of calendar dates a fetcher operates over.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Intermediate rows an adapter hands to a fetcher before factor-specific
/// normalization (spec §4.4). Adapters never write to storage directly.
/// `Serialize`/`Deserialize` so the response cache (C2) can round-trip them
/// verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceRows(pub Vec<PriceBar>);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuationRows(pub Vec<Valuation>);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevenueRows(pub Vec<MonthlyRevenue>);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityRows(pub Vec<Quality>);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundFlowRows(pub Vec<FundFlow>);

/// Raw income-statement / balance-sheet line item, before synonym-keyed
/// lookup (spec §4.4 Quality). Kept as a loose `(name, value)` bag because
/// upstream line-item names vary by provider and filing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialStatementRows {
    pub date: Option<NaiveDate>,
    pub income_statement: Vec<LineItem>,
    pub balance_sheet: Vec<LineItem>,
}

/// Raw institutional trading row, pre-synonym-match (spec §4.4 FundFlow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstitutionalRow {
    pub date: NaiveDate,
    pub entity_name: String,
    /// Primary reports net directly; Fallback reports buy/sell.
    pub net: Option<i64>,
    pub buy: Option<i64>,
    pub sell: Option<i64>,
}

/// TWSE dates look like `"113/01/05"` (ROC year/month/day, slash
/// separated). Returns `None` for anything that doesn't parse.
pub fn roc_to_gregorian_date(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw.trim().split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let roc_year: i32 = parts[0].parse().ok()?;
    let month: u32 = parts[1].parse().ok()?;
    let day: u32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(roc_year + 1911, month, day)
}

/// TWSE numeric cells are comma-separated strings with `"--"`/`"X"`/empty
/// used as null markers; delegates to the shared upstream-number parser.
pub fn parse_twse_number(raw: &str) -> Option<f64> {
    crate::cache::parse_upstream_number(raw)
}

pub fn default_http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .expect("building reqwest client with static config never fails")
}

/// Legal-entity synonym groups used to bucket institutional trading rows
/// (spec §4.4 FundFlow).
pub fn classify_entity(name: &str) -> Option<EntityBucket> {
    const FOREIGN: &[&str] = &["外資及陸資(不含外資自營商)", "外資及陸資"];
    const TRUST: &[&str] = &["投信"];
    const DEALER: &[&str] = &["自營商(自行買賣)", "自營商"];

    if FOREIGN.contains(&name) {
        Some(EntityBucket::Foreign)
    } else if TRUST.contains(&name) {
        Some(EntityBucket::InvestmentTrust)
    } else if DEALER.contains(&name) {
        Some(EntityBucket::Dealer)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityBucket {
    Foreign,
    InvestmentTrust,
    Dealer,
}

/// Synonym dictionary for quality-metric line items (spec §4.4 Quality).
pub fn match_line_item<'a>(items: &'a [LineItem], synonyms: &[&str]) -> Option<&'a LineItem> {
    items.iter().find(|item| synonyms.contains(&item.name.as_str()))
}

pub mod synonyms {
    pub const REVENUE: &[&str] = &["營業收入", "營收", "總收入"];
    pub const GROSS_PROFIT: &[&str] = &["營業毛利", "毛利"];
    pub const OP_INCOME: &[&str] = &["營業利益", "營業淨利"];
    pub const NET_INCOME: &[&str] = &["本期淨利", "稅後淨利", "淨利"];
    pub const TOTAL_ASSETS: &[&str] = &["資產總計", "資產總額"];
    pub const TOTAL_EQUITY: &[&str] = &["權益總計", "股東權益總額"];
    pub const TOTAL_LIABILITIES: &[&str] = &["負債總計", "負債總額"];
    pub const CURRENT_ASSETS: &[&str] = &["流動資產"];
    pub const CURRENT_LIABILITIES: &[&str] = &["流動負債"];
}
