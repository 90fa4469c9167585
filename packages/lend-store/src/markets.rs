use anyhow::{Context, Result};
use serde::Serialize;
use store_engine::{ActiveKey, BoundedCache};

use crate::api::MarketTotals;
use crate::store::Store;
use crate::types::MarketId;

/// Market-level aggregates, keyed by market id. The completion cascades of
/// the mutating slices refresh these.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MarketsState {
    pub totals: BoundedCache<MarketTotals>,
}

pub async fn fetch_totals(store: &Store, market: &MarketId, refetch: bool) -> Result<MarketTotals> {
    let key = ActiveKey::from(market.to_string());
    if !refetch {
        if let Some(stored) = store.markets.read(|s| s.totals.get(&key).cloned()).await {
            return Ok(stored);
        }
    }
    let totals = store
        .api
        .market_totals(market)
        .await
        .with_context(|| format!("fetching totals for {market}"))?;
    store
        .markets
        .set_by_active_key(|s| &mut s.totals, key, totals.clone())
        .await;
    Ok(totals)
}
