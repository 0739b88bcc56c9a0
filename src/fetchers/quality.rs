//! Quality fetcher (spec §4.4 "Quality"): combines income-statement and
//! balance-sheet line items by synonym-matching a fixed dictionary, then
//! derives margins and ratios. A row is emitted iff at least one derived
//! field is computable.

use chrono::NaiveDate;

use crate::adapters::primary::PrimarySource;
use crate::adapters::{match_line_item, synonyms, FinancialStatementRows, LineItem, Window};
use crate::error::Result;
use crate::fetchers::FetchContext;
use crate::models::Quality;
use crate::storage::{quality as quality_storage, Storage};

pub async fn fetch(ctx: &FetchContext, storage: &Storage, ticker: &str, window: Window, force: bool, today: NaiveDate) -> Result<()> {
    for month in PrimarySource::months_in_window(window, today) {
        fetch_month(ctx, storage, ticker, month, force).await?;
    }
    Ok(())
}

async fn fetch_month(ctx: &FetchContext, storage: &Storage, ticker: &str, month: NaiveDate, force: bool) -> Result<()> {
    let month_end = last_day_of_month(month);

    if !force {
        let existing = quality_storage::range(&storage.quality, ticker, month, month_end).await?;
        if !existing.is_empty() {
            return Ok(());
        }
    }

    let statements = match ctx.primary.fetch_financial_statement_month(ticker, month).await {
        Ok(s) if !s.income_statement.is_empty() || !s.balance_sheet.is_empty() => s,
        _ => match ctx.fallback.fetch_financial_statements(ticker, month, month_end).await {
            Ok(s) => s,
            Err(err) if err.is_quota_exceeded() => return Err(err),
            Err(_) => return Ok(()),
        },
    };

    let Some(row) = derive_quality(ticker, month, &statements) else {
        return Ok(());
    };
    quality_storage::upsert_quality(&storage.quality, &[row]).await?;
    Ok(())
}

/// Derives margins/ratios from combined line items (spec §3, §4.4 Quality).
/// `None` if the caller supplies no statements, or if no derived field ends
/// up present (the caller should then skip writing the row).
fn derive_quality(ticker: &str, month: NaiveDate, statements: &FinancialStatementRows) -> Option<Quality> {
    let find_income = |syn: &[&str]| find_value(&statements.income_statement, syn);
    let find_balance = |syn: &[&str]| find_value(&statements.balance_sheet, syn);

    let revenue = find_income(synonyms::REVENUE);
    let gross_profit = find_income(synonyms::GROSS_PROFIT);
    let op_income = find_income(synonyms::OP_INCOME);
    let net_income = find_income(synonyms::NET_INCOME);
    let total_assets = find_balance(synonyms::TOTAL_ASSETS);
    let total_equity = find_balance(synonyms::TOTAL_EQUITY);
    let total_liabilities = find_balance(synonyms::TOTAL_LIABILITIES);
    let current_assets = find_balance(synonyms::CURRENT_ASSETS);
    let current_liabilities = find_balance(synonyms::CURRENT_LIABILITIES);

    let ratio = |numerator: Option<f64>, denominator: Option<f64>, scale: f64| {
        match (numerator, denominator) {
            (Some(n), Some(d)) if d != 0.0 => Some(scale * n / d),
            _ => None,
        }
    };

    let row = Quality {
        ticker: ticker.to_string(),
        date: statements.date.unwrap_or(month),
        roe: ratio(net_income, total_equity, 100.0),
        roa: ratio(net_income, total_assets, 100.0),
        gross_margin: ratio(gross_profit, revenue, 100.0),
        op_margin: ratio(op_income, revenue, 100.0),
        net_margin: ratio(net_income, revenue, 100.0),
        debt_ratio: ratio(total_liabilities, total_assets, 100.0),
        current_ratio: ratio(current_assets, current_liabilities, 1.0),
        eps: None,
    };

    if row.any_present() {
        Some(row)
    } else {
        None
    }
}

fn find_value(items: &[LineItem], synonyms: &[&str]) -> Option<f64> {
    match_line_item(items, synonyms).map(|item| item.value)
}

fn last_day_of_month(month: NaiveDate) -> NaiveDate {
    use chrono::Datelike;
    let next_month = if month.month() == 12 {
        NaiveDate::from_ymd_opt(month.year() + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(month.year(), month.month() + 1, 1).unwrap()
    };
    next_month.pred_opt().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, value: f64) -> LineItem {
        LineItem { name: name.to_string(), value }
    }

    #[test]
    fn derives_margins_from_matched_synonyms() {
        let statements = FinancialStatementRows {
            date: Some(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()),
            income_statement: vec![item("營業收入", 1000.0), item("營業毛利", 300.0), item("本期淨利", 100.0)],
            balance_sheet: vec![item("資產總計", 5000.0), item("權益總計", 2000.0)],
        };
        let row = derive_quality("2330", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), &statements).unwrap();
        assert_eq!(row.gross_margin, Some(30.0));
        assert_eq!(row.net_margin, Some(10.0));
        assert_eq!(row.roe, Some(5.0));
        assert_eq!(row.roa, Some(2.0));
        assert_eq!(row.debt_ratio, None); // total_liabilities not supplied
    }

    #[test]
    fn no_matching_items_yields_no_row() {
        let statements = FinancialStatementRows {
            date: None,
            income_statement: vec![item("unrelated", 1.0)],
            balance_sheet: vec![],
        };
        assert!(derive_quality("2330", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), &statements).is_none());
    }
}
