use serde::Serialize;

use crate::api::GasInfo;
use crate::store::Store;
use crate::types::Session;

/// Chain fee data shared by every estimate and step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GasState {
    pub gas_info: Option<GasInfo>,
}

/// Refresh the cached fee data. Estimates and steps call this first; a
/// failure keeps the previous snapshot and is never fatal to the caller.
pub async fn fetch_gas_info(store: &Store, session: &Session) {
    tracing::debug!(chain = %session.chain_id, "fetching gas info");
    match store.api.gas_info(session.chain_id).await {
        Ok(info) => {
            store.gas.set_by_key(|s| &mut s.gas_info, Some(info)).await;
        }
        Err(err) => tracing::debug!("gas info fetch failed: {err:#}"),
    }
}
