use anyhow::{Context, Result};
use serde::Serialize;
use store_engine::{key::part_or_empty, ActiveKey, BoundedCache};

use crate::api::{UserLoanExists, UserMarketBalances};
use crate::store::Store;
use crate::types::{MarketId, Session};

/// Per-user, per-market read caches. Other slices consume these as
/// read-only snapshots for validation and refresh them through the fetch
/// functions here after their own mutations land.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserState {
    pub balances: BoundedCache<UserMarketBalances>,
    pub loans_exists: BoundedCache<UserLoanExists>,
}

/// `{signer}-{market}`: user-scoped data is keyed independently of form
/// inputs so it survives form edits and is shared across slices.
pub fn user_active_key(session: &Session, market: &MarketId) -> ActiveKey {
    ActiveKey::from_parts([part_or_empty(session.signer.as_ref()), market.to_string()])
}

/// The user's wallet and vault balances for one market. Returns the cached
/// copy unless it is missing or `refetch` is set.
pub async fn fetch_market_balances(
    store: &Store,
    session: &Session,
    market: &MarketId,
    refetch: bool,
) -> Result<UserMarketBalances> {
    anyhow::ensure!(session.signer.is_some(), "no signer connected");
    let key = user_active_key(session, market);
    if !refetch {
        if let Some(stored) = store.user.read(|s| s.balances.get(&key).cloned()).await {
            return Ok(stored);
        }
    }
    let balances = store
        .api
        .user_market_balances(session, market)
        .await
        .with_context(|| format!("fetching market balances for {market}"))?;
    store
        .user
        .set_by_active_key(|s| &mut s.balances, key, balances.clone())
        .await;
    Ok(balances)
}

/// Whether the user holds a loan on this market; cached like balances.
pub async fn fetch_loan_exists(
    store: &Store,
    session: &Session,
    market: &MarketId,
    refetch: bool,
) -> Result<UserLoanExists> {
    anyhow::ensure!(session.signer.is_some(), "no signer connected");
    let key = user_active_key(session, market);
    if !refetch {
        if let Some(stored) = store.user.read(|s| s.loans_exists.get(&key).copied()).await {
            return Ok(stored);
        }
    }
    let exists = store
        .api
        .user_loan_exists(session, market)
        .await
        .with_context(|| format!("fetching loan existence for {market}"))?;
    store
        .user
        .set_by_active_key(|s| &mut s.loans_exists, key, exists)
        .await;
    Ok(exists)
}
