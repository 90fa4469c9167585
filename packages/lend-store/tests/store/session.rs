//! Identity switches reset the slices scoped to that identity.

use std::sync::atomic::Ordering;

use lend_store::collateral_add::{self, CollateralAddState};
use lend_store::types::{Address, ChainId, Session};
use lend_store::{markets, user};

use crate::helpers;

#[tokio::test]
async fn switching_signer_resets_user_scoped_slices() {
    let (store, api, session, market) = helpers::store_with_wallet();
    collateral_add::set_form_values(&store, Some(&session), Some(&market), Some("10".to_owned())).await;
    markets::fetch_totals(&store, &market.id, false).await.unwrap();
    assert!(store.collateral_add.mutation_count() > 0);
    assert_eq!(api.totals_calls.load(Ordering::SeqCst), 1);

    let next = Session::signed_in(ChainId(1), Address::from("0xb0b"));
    store.on_session_changed(Some(&session), &next).await;

    // form and user state belonged to the old signer
    assert_eq!(
        store.collateral_add.snapshot().await,
        CollateralAddState::default()
    );
    assert!(store.user.read(|s| s.balances.is_empty()).await);

    // market aggregates are chain-scoped and survive a signer switch
    markets::fetch_totals(&store, &market.id, false).await.unwrap();
    assert_eq!(api.totals_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn switching_chain_resets_chain_scoped_slices_too() {
    let (store, api, session, market) = helpers::store_with_wallet();
    user::fetch_market_balances(&store, &session, &market.id, false)
        .await
        .unwrap();
    markets::fetch_totals(&store, &market.id, false).await.unwrap();
    lend_store::gas::fetch_gas_info(&store, &session).await;
    assert!(store.gas.read(|s| s.gas_info.is_some()).await);

    let next = Session::signed_in(ChainId(42161), Address::from("0xa1ce"));
    store.on_session_changed(Some(&session), &next).await;

    assert!(store.user.read(|s| s.balances.is_empty()).await);
    assert!(store.markets.read(|s| s.totals.is_empty()).await);
    assert!(store.gas.read(|s| s.gas_info.is_none()).await);

    markets::fetch_totals(&store, &market.id, false).await.unwrap();
    assert_eq!(api.totals_calls.load(Ordering::SeqCst), 2);
}
