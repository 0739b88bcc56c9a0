//! FundFlow fetcher (spec §4.4 "FundFlow"): iterates days newest → oldest
//! within each month of the window to maximize cache hits on recent
//! ranges, groups raw entity rows by date, and buckets them into
//! `foreign_net | inv_trust_net | dealer_net` via an explicit synonym
//! match (see [`crate::adapters::classify_entity`]).

use chrono::{Datelike, Duration, NaiveDate};

use crate::adapters::primary::PrimarySource;
use crate::adapters::{classify_entity, EntityBucket, InstitutionalRow, Window};
use crate::error::Result;
use crate::fetchers::FetchContext;
use crate::models::FundFlow;
use crate::storage::{fundamentals, Storage};

pub async fn fetch(ctx: &FetchContext, storage: &Storage, ticker: &str, window: Window, force: bool, today: NaiveDate) -> Result<()> {
    for month in PrimarySource::months_in_window(window, today).into_iter().rev() {
        let days = days_in_month_within(month, window);
        for date in days.into_iter().rev() {
            fetch_day(ctx, storage, ticker, date, force).await?;
        }
    }
    Ok(())
}

async fn fetch_day(ctx: &FetchContext, storage: &Storage, ticker: &str, date: NaiveDate, force: bool) -> Result<()> {
    if !force {
        let existing = fundamentals::fund_flow_range(&storage.fundamentals, ticker, date, date).await?;
        if !existing.is_empty() {
            return Ok(());
        }
    }

    let rows = match ctx.primary.fetch_institutional_flow_day(ticker, date).await {
        Ok(rows) if !rows.is_empty() => rows,
        _ => match ctx
            .fallback
            .fetch_institutional_flow(ticker, date, date)
            .await
        {
            Ok(rows) => rows,
            Err(err) if err.is_quota_exceeded() => return Err(err),
            Err(_) => return Ok(()),
        },
    };

    if rows.is_empty() {
        return Ok(());
    }

    let aggregated = aggregate(ticker, date, &rows);
    fundamentals::upsert_fund_flow(&storage.fundamentals, &[aggregated]).await?;
    Ok(())
}

fn aggregate(ticker: &str, date: NaiveDate, rows: &[InstitutionalRow]) -> FundFlow {
    let mut foreign_net = 0i64;
    let mut inv_trust_net = 0i64;
    let mut dealer_net = 0i64;

    for row in rows {
        let Some(bucket) = classify_entity(&row.entity_name) else {
            continue;
        };
        let net = row.net.unwrap_or_else(|| row.buy.unwrap_or(0) - row.sell.unwrap_or(0));
        match bucket {
            EntityBucket::Foreign => foreign_net += net,
            EntityBucket::InvestmentTrust => inv_trust_net += net,
            EntityBucket::Dealer => dealer_net += net,
        }
    }

    FundFlow {
        ticker: ticker.to_string(),
        date,
        foreign_net,
        inv_trust_net,
        dealer_net,
    }
}

fn days_in_month_within(month: NaiveDate, window: Window) -> Vec<NaiveDate> {
    let month_start = NaiveDate::from_ymd_opt(month.year(), month.month(), 1).unwrap();
    let next_month = if month.month() == 12 {
        NaiveDate::from_ymd_opt(month.year() + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(month.year(), month.month() + 1, 1).unwrap()
    };

    let lo = month_start.max(window.start);
    let hi = (next_month - Duration::days(1)).min(window.end);

    let mut days = Vec::new();
    let mut cur = lo;
    while cur <= hi {
        days.push(cur);
        cur += Duration::days(1);
    }
    days
}
