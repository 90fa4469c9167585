//! Only the result tagged with the currently-active key may mutate shared
//! state, regardless of arrival order.

use lend_store::collateral_add::{self, CollateralAddState};
use lend_store::types::FormEstGas;

use crate::helpers;

/// User enters "100" (key K1); the preview for K1 lands, then the user
/// edits to "50" (key K2) while K1's gas estimate is still in flight. The
/// late 21000 estimate belongs to K1 and must be discarded; K2's 18000
/// must land.
#[tokio::test]
async fn late_gas_estimate_for_an_old_key_is_discarded() {
    let (store, api, session, market) = helpers::store_with_wallet();
    api.set_est_gas("100", 21_000);
    api.set_est_gas("50", 18_000);

    let k1 = collateral_add::active_key(Some(&session), Some(&market), "100");
    let k2 = collateral_add::active_key(Some(&session), Some(&market), "50");
    assert_ne!(k1, k2);

    let (entered, release) = api.hold_next_est_gas();
    let first = tokio::spawn({
        let store = store.clone();
        let session = session.clone();
        let market = market.clone();
        async move {
            collateral_add::set_form_values(&store, Some(&session), Some(&market), Some("100".to_owned()))
                .await;
        }
    });
    entered.await.unwrap();

    // the preview resolved before the estimate stalled
    let detail = store
        .collateral_add
        .read(|s| s.detail_info.get(&k1).cloned())
        .await
        .expect("preview for the first amount");
    assert_eq!(detail.health_full, "health:100");

    // edit while K1's estimate is still in flight; K2's estimate resolves
    collateral_add::set_form_values(&store, Some(&session), Some(&market), Some("50".to_owned())).await;
    release.send(()).unwrap();
    first.await.unwrap();

    let state = store.collateral_add.snapshot().await;
    assert_eq!(state.active_key, k2);
    assert_eq!(state.form_est_gas.get(&k2), Some(&FormEstGas::done(18_000)));
    // K1 keeps only its loading placeholder, never the stale 21000
    assert_eq!(state.form_est_gas.get(&k1), Some(&FormEstGas::loading()));
    assert_eq!(state.form_status.error, None);
    // the discarded estimate did not blank the committed previews either
    assert!(state.detail_info.contains_key(&k1));
    assert!(state.detail_info.contains_key(&k2));
}

/// A reset mid-flight means the late result finds a key it no longer
/// matches; nothing of the pre-reset state may come back.
#[tokio::test]
async fn reset_discards_results_for_pre_reset_keys() {
    let (store, api, session, market) = helpers::store_with_wallet();

    let (entered, release) = api.hold_next_est_gas();
    let in_flight = tokio::spawn({
        let store = store.clone();
        let session = session.clone();
        let market = market.clone();
        async move {
            collateral_add::set_form_values(&store, Some(&session), Some(&market), Some("7".to_owned()))
                .await;
        }
    });
    entered.await.unwrap();

    store.collateral_add.reset().await;
    release.send(()).unwrap();
    in_flight.await.unwrap();

    assert_eq!(
        store.collateral_add.snapshot().await,
        CollateralAddState::default()
    );
}
