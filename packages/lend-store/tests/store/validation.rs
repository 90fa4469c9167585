//! Validation errors are fields on the form, never thrown, and suppress
//! the estimate until the input is corrected.

use std::sync::atomic::Ordering;

use lend_store::api::UserMarketBalances;
use lend_store::collateral_add;
use lend_store::types::AmountError;

use crate::helpers;

#[tokio::test]
async fn over_balance_input_sets_an_error_and_skips_the_estimate() {
    let (store, api, session, market) = helpers::store_with_wallet();
    api.set_balances(UserMarketBalances {
        collateral: "5".to_owned(),
        borrowed: "0".to_owned(),
        vault_shares: "0".to_owned(),
        gauge: "0".to_owned(),
    });

    collateral_add::set_form_values(&store, Some(&session), Some(&market), Some("10".to_owned())).await;
    let values = store.collateral_add.read(|s| s.form_values.clone()).await;
    assert_eq!(values.collateral_error, Some(AmountError::TooMuch));
    assert_eq!(api.est_gas_calls.load(Ordering::SeqCst), 0);
    assert_eq!(api.gas_info_calls.load(Ordering::SeqCst), 0);

    // correcting the input clears the error and releases the estimate
    collateral_add::set_form_values(&store, Some(&session), Some(&market), Some("3".to_owned())).await;
    let values = store.collateral_add.read(|s| s.form_values.clone()).await;
    assert_eq!(values.collateral_error, None);
    assert_eq!(api.est_gas_calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.gas_info_calls.load(Ordering::SeqCst), 1);
}
