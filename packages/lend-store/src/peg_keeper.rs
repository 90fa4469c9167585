use anyhow::Context;
use serde::Serialize;
use store_engine::{
    is_current, ActiveKey, BoundedCache, CompleteMode, FormStatus, HasStatus, Keyed, Step,
    StepError, StepGate, StepOutcome, StepRunner,
};

use crate::api::TxResp;
use crate::store::Store;
use crate::types::{FormEstGas, PoolId, Session};
use crate::gas;

/// Maintenance action: mint or burn against the pool to restore the peg.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PegKeeperStep {
    Update,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PegKeeperDetails {
    pub debt: String,
    pub est_caller_profit: String,
}

/// Keyed on `{chain}-{pool}` only: there is no user input, the scope is
/// the whole key.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PegKeeperState {
    pub active_key: ActiveKey,
    pub details: BoundedCache<PegKeeperDetails>,
    pub est_gas: BoundedCache<FormEstGas>,
    pub form_status: FormStatus<PegKeeperStep>,
}

impl Keyed for PegKeeperState {
    fn active_key(&self) -> &ActiveKey {
        &self.active_key
    }
}

impl HasStatus<PegKeeperStep> for PegKeeperState {
    fn status(&self) -> &FormStatus<PegKeeperStep> {
        &self.form_status
    }
    fn status_mut(&mut self) -> &mut FormStatus<PegKeeperStep> {
        &mut self.form_status
    }
}

pub fn active_key(session: Option<&Session>, pool: Option<&PoolId>) -> ActiveKey {
    ActiveKey::from_parts([
        session
            .map(|s| s.chain_id.to_string())
            .unwrap_or_default(),
        pool.map(|p| p.to_string()).unwrap_or_default(),
    ])
}

/// Select a pool: commit the new key synchronously, then refresh its debt
/// and the update's gas estimate.
pub async fn set_pool(store: &Store, session: Option<&Session>, pool: Option<&PoolId>) {
    let key = active_key(session, pool);
    store
        .peg_keeper
        .set_by_keys(|s| {
            s.active_key = key.clone();
            s.form_status = s.form_status.reset_transient();
        })
        .await;

    let (Some(session), Some(pool)) = (session, pool) else {
        return;
    };

    fetch_details(store, key.clone(), pool).await;
    fetch_est_gas_update(store, key, session, pool).await;
}

pub async fn fetch_details(store: &Store, key: ActiveKey, pool: &PoolId) {
    let threshold = store.peg_keeper.cache_threshold();
    match store.api.peg_keeper_info(key.clone(), pool).await {
        Ok(resp) => {
            store
                .peg_keeper
                .commit_if_current(&resp.active_key, |s| {
                    s.details.insert(
                        threshold,
                        resp.active_key.clone(),
                        PegKeeperDetails {
                            debt: resp.debt.clone(),
                            est_caller_profit: resp.est_caller_profit.clone(),
                        },
                    );
                })
                .await;
        }
        Err(err) => {
            let message = format!("{err:#}");
            tracing::debug!(%key, "peg keeper info fetch failed: {message}");
            store
                .peg_keeper
                .commit_if_current(&key, |s| s.form_status.error = Some(message.clone()))
                .await;
        }
    }
}

pub async fn fetch_est_gas_update(store: &Store, key: ActiveKey, session: &Session, pool: &PoolId) {
    if session.signer.is_none() {
        return;
    }

    store
        .peg_keeper
        .set_by_active_key(|s| &mut s.est_gas, key.clone(), FormEstGas::loading())
        .await;
    gas::fetch_gas_info(store, session).await;

    let threshold = store.peg_keeper.cache_threshold();
    match store.api.peg_keeper_est_gas_update(key.clone(), pool).await {
        Ok(resp) => {
            store
                .peg_keeper
                .commit_if_current(&resp.active_key, |s| {
                    s.est_gas.insert(
                        threshold,
                        resp.active_key.clone(),
                        FormEstGas::done(resp.estimated_gas),
                    );
                })
                .await;
        }
        Err(err) => {
            let message = format!("{err:#}");
            tracing::debug!(%key, "peg keeper gas estimate failed: {message}");
            store
                .peg_keeper
                .commit_if_current(&key, |s| s.form_status.error = Some(message.clone()))
                .await;
        }
    }
}

/// Single-step pipeline: anyone may call update, no allowance involved.
/// The pool's debt changes on success, so the details are refetched for
/// the current key while the slice keeps its inputs.
pub async fn step_update(
    store: &Store,
    session: &Session,
    pool: &PoolId,
) -> Result<StepOutcome<TxResp>, StepError> {
    let Some(provider) = store.provider() else {
        return Err(StepError::MissingProvider);
    };

    let key = store.peg_keeper.current_key().await;
    let runner = StepRunner::new(&store.peg_keeper);
    runner
        .begin(Step::Action(PegKeeperStep::Update), StepGate::None)
        .await?;

    gas::fetch_gas_info(store, session).await;
    let result = store
        .api
        .peg_keeper_update(key.clone(), &provider, pool)
        .await
        .context("updating peg keeper");
    let outcome = runner
        .finish_action(is_current(&key), result, CompleteMode::KeepState)
        .await;

    if outcome.is_committed() {
        fetch_details(store, key, pool).await;
    }
    Ok(outcome)
}
