//! Redundant commits never reach subscribers.

use lend_store::gas;

use crate::helpers;

#[tokio::test]
async fn identical_fetches_notify_subscribers_once() {
    let (store, _api, session, _market) = helpers::store_with_wallet();
    let mut seen = store.gas.subscribe();

    gas::fetch_gas_info(&store, &session).await;
    assert!(seen.has_changed().unwrap());
    seen.borrow_and_update();
    assert_eq!(store.gas.mutation_count(), 1);

    // the mock returns byte-identical fee data; the write is gated out
    gas::fetch_gas_info(&store, &session).await;
    assert!(!seen.has_changed().unwrap());
    assert_eq!(store.gas.mutation_count(), 1);
}
