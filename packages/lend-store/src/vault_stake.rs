use anyhow::Context;
use serde::Serialize;
use store_engine::{
    is_current, ActiveKey, BoundedCache, CompleteMode, FormState, FormStatus, HasStatus, Keyed,
    Step, StepError, StepGate, StepOutcome, StepRunner,
};

use crate::api::{ApproveResp, TxResp};
use crate::store::Store;
use crate::types::{is_positive_amount, is_too_much, AmountError, FormEstGas, Market, Session};
use crate::{gas, user};

/// Action step of the stake pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StakeStep {
    Stake,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct VaultStakeForm {
    pub amount: String,
    pub amount_error: Option<AmountError>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct VaultStakeState {
    pub active_key: ActiveKey,
    pub form_est_gas: BoundedCache<FormEstGas>,
    pub form_status: FormStatus<StakeStep>,
    pub form_values: VaultStakeForm,
}

impl Keyed for VaultStakeState {
    fn active_key(&self) -> &ActiveKey {
        &self.active_key
    }
}

impl HasStatus<StakeStep> for VaultStakeState {
    fn status(&self) -> &FormStatus<StakeStep> {
        &self.form_status
    }
    fn status_mut(&mut self) -> &mut FormStatus<StakeStep> {
        &mut self.form_status
    }
}

impl FormState<StakeStep> for VaultStakeState {
    type Values = VaultStakeForm;

    fn set_active_key(&mut self, key: ActiveKey) {
        self.active_key = key;
    }
    fn set_values(&mut self, values: VaultStakeForm) {
        self.form_values = values;
    }
}

/// `{chain}-stake-{market}-{amount}`; unresolved identity parts stay
/// empty so a key exists before the session or market settles.
pub fn active_key(session: Option<&Session>, market: Option<&Market>, amount: &str) -> ActiveKey {
    ActiveKey::from_parts([
        session
            .map(|s| s.chain_id.to_string())
            .unwrap_or_default(),
        "stake".to_owned(),
        market.map(|m| m.id.to_string()).unwrap_or_default(),
        amount.to_owned(),
    ])
}

/// Recompute the key and commit the merged values optimistically, then
/// validate against the wallet's vault shares and refresh the estimate.
pub async fn set_form_values(
    store: &Store,
    session: Option<&Session>,
    market: Option<&Market>,
    amount: Option<String>,
) {
    let mut values = store.vault_stake.read(|s| s.form_values.clone()).await;
    if let Some(amount) = amount {
        values.amount = amount;
    }
    values.amount_error = None;

    let key = active_key(session, market, &values.amount);
    store.vault_stake.apply_input(key.clone(), values.clone()).await;

    let (Some(session), Some(market)) = (session, market) else {
        return;
    };
    if session.signer.is_none() {
        return;
    }

    match user::fetch_market_balances(store, session, &market.id, true).await {
        Ok(balances) => {
            if is_too_much(&values.amount, &balances.vault_shares) {
                store
                    .vault_stake
                    .commit_if_current(&key, |s| {
                        s.form_values.amount_error = Some(AmountError::TooMuchWallet);
                    })
                    .await;
                return;
            }
        }
        Err(err) => {
            let message = format!("{err:#}");
            store
                .vault_stake
                .commit_if_current(&key, |s| s.form_status.error = Some(message))
                .await;
            return;
        }
    }

    fetch_est_gas_approval(store, key, session, market).await;
}

/// Estimate gas for approval + stake under `key`; the result is committed
/// only while the key is still current. Also refreshes the approval flag.
pub async fn fetch_est_gas_approval(
    store: &Store,
    key: ActiveKey,
    session: &Session,
    market: &Market,
) {
    let (amount, amount_error) = store
        .vault_stake
        .read(|s| (s.form_values.amount.clone(), s.form_values.amount_error))
        .await;
    if session.signer.is_none() || !is_positive_amount(&amount) || amount_error.is_some() {
        return;
    }

    store
        .vault_stake
        .set_by_active_key(|s| &mut s.form_est_gas, key.clone(), FormEstGas::loading())
        .await;
    gas::fetch_gas_info(store, session).await;

    let threshold = store.vault_stake.cache_threshold();
    match store
        .api
        .vault_stake_est_gas_approval(key.clone(), &market.id, &amount)
        .await
    {
        Ok(resp) => {
            store
                .vault_stake
                .commit_if_current(&resp.active_key, |s| {
                    s.form_est_gas.insert(
                        threshold,
                        resp.active_key.clone(),
                        FormEstGas::done(resp.estimated_gas),
                    );
                    s.form_status.is_approved = resp.is_approved;
                })
                .await;
        }
        Err(err) => {
            let message = format!("{err:#}");
            tracing::debug!(%key, "stake gas estimate failed: {message}");
            store
                .vault_stake
                .commit_if_current(&key, |s| s.form_status.error = Some(message.clone()))
                .await;
        }
    }
}

/// Approval step: grant the vault allowance for the entered amount.
pub async fn step_approve(
    store: &Store,
    session: &Session,
    market: &Market,
) -> Result<StepOutcome<ApproveResp>, StepError> {
    let Some(provider) = store.provider() else {
        return Err(StepError::MissingProvider);
    };

    let (key, amount) = store
        .vault_stake
        .read(|s| (s.active_key.clone(), s.form_values.amount.clone()))
        .await;
    let runner = StepRunner::new(&store.vault_stake);
    runner
        .begin(Step::<StakeStep>::Approval, StepGate::RequiresApproval)
        .await?;

    gas::fetch_gas_info(store, session).await;
    let result = store
        .api
        .vault_stake_approve(key.clone(), &provider, &market.id, &amount)
        .await
        .context("approving vault stake");
    let outcome = runner.finish_approval(is_current(&key), result).await;

    if outcome.is_committed() {
        // allowance changed, the estimate for this key is out of date
        fetch_est_gas_approval(store, key, session, market).await;
    }
    Ok(outcome)
}

/// Primary action: stake the entered amount of vault shares.
pub async fn step_stake(
    store: &Store,
    session: &Session,
    market: &Market,
) -> Result<StepOutcome<TxResp>, StepError> {
    let Some(provider) = store.provider() else {
        return Err(StepError::MissingProvider);
    };

    let (key, amount) = store
        .vault_stake
        .read(|s| (s.active_key.clone(), s.form_values.amount.clone()))
        .await;
    let runner = StepRunner::new(&store.vault_stake);
    runner
        .begin(Step::Action(StakeStep::Stake), StepGate::RequiresApproval)
        .await?;

    gas::fetch_gas_info(store, session).await;
    let result = store
        .api
        .vault_stake(key.clone(), &provider, &market.id, &amount)
        .await
        .context("staking vault shares");
    let outcome = runner
        .finish_action(is_current(&key), result, CompleteMode::ResetSlice)
        .await;

    if outcome.is_committed() {
        store.refresh_after_action(session, &market.id).await;
    }
    Ok(outcome)
}
