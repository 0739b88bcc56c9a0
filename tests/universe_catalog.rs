//! End-to-end seed test for the universe catalog (C12): seeding the
//! `stock_list` table directly (no network) and exercising staleness and
//! listing through the public `universe` module.

use chrono::Utc;

use tw_equity_screener::config::Config;
use tw_equity_screener::models::{Market, StockListing};
use tw_equity_screener::storage::{fundamentals, Storage};
use tw_equity_screener::universe;

async fn test_config(dir: &std::path::Path) -> Config {
    Config {
        finmind_token: None,
        db_path: dir.to_string_lossy().to_string(),
        cache_dir: dir.to_string_lossy().to_string(),
        progress_dir: dir.to_string_lossy().to_string(),
        fetch_concurrency: 1,
        http_timeout_secs: 5,
    }
}

#[tokio::test]
async fn fresh_catalog_is_stale_then_fresh_after_stamping_and_listable() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).await;
    let storage = Storage::open(&config).await.unwrap();

    assert!(universe::should_update(&storage).await.unwrap());

    fundamentals::upsert_stock_list(
        &storage.fundamentals,
        &[
            StockListing { ticker: "2330".into(), name: "台積電".into(), industry: Some("半導體業".into()), market: Market::Listed },
            StockListing { ticker: "6488".into(), name: "環球晶".into(), industry: Some("半導體業".into()), market: Market::Otc },
        ],
    )
    .await
    .unwrap();
    storage.set_meta("stock_list_updated_at", &Utc::now().to_rfc3339()).await.unwrap();

    assert!(!universe::should_update(&storage).await.unwrap());

    let listings = universe::list(&storage).await.unwrap();
    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].ticker, "2330");
    assert_eq!(listings[0].market, Market::Listed);
    assert_eq!(listings[1].market, Market::Otc);

    storage.close().await;
}

#[test]
fn market_filter_round_trips_through_as_str_and_from_str() {
    for m in [Market::Listed, Market::Otc, Market::Emerging] {
        assert_eq!(Market::from_str(m.as_str()), Some(m));
    }
}
