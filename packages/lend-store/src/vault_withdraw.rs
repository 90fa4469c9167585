use anyhow::Context;
use serde::Serialize;
use store_engine::{
    is_current, ActiveKey, BoundedCache, CompleteMode, FormState, FormStatus, HasStatus, Keyed,
    Step, StepError, StepGate, StepOutcome, StepRunner,
};

use crate::api::TxResp;
use crate::store::Store;
use crate::types::{is_positive_amount, is_too_much, AmountError, FormEstGas, Market, Session};
use crate::{gas, user};

/// Withdrawing needs no allowance, so this pipeline has a single step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WithdrawStep {
    Withdraw,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct VaultWithdrawForm {
    pub amount: String,
    pub is_full_withdraw: bool,
    pub amount_error: Option<AmountError>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct VaultWithdrawState {
    pub active_key: ActiveKey,
    pub form_est_gas: BoundedCache<FormEstGas>,
    pub form_status: FormStatus<WithdrawStep>,
    pub form_values: VaultWithdrawForm,
}

impl Keyed for VaultWithdrawState {
    fn active_key(&self) -> &ActiveKey {
        &self.active_key
    }
}

impl HasStatus<WithdrawStep> for VaultWithdrawState {
    fn status(&self) -> &FormStatus<WithdrawStep> {
        &self.form_status
    }
    fn status_mut(&mut self) -> &mut FormStatus<WithdrawStep> {
        &mut self.form_status
    }
}

impl FormState<WithdrawStep> for VaultWithdrawState {
    type Values = VaultWithdrawForm;

    fn set_active_key(&mut self, key: ActiveKey) {
        self.active_key = key;
    }
    fn set_values(&mut self, values: VaultWithdrawForm) {
        self.form_values = values;
    }
}

/// `{chain}-withdraw-{market}-{amount}-{full}`.
pub fn active_key(
    session: Option<&Session>,
    market: Option<&Market>,
    amount: &str,
    is_full_withdraw: bool,
) -> ActiveKey {
    ActiveKey::from_parts([
        session
            .map(|s| s.chain_id.to_string())
            .unwrap_or_default(),
        "withdraw".to_owned(),
        market.map(|m| m.id.to_string()).unwrap_or_default(),
        amount.to_owned(),
        is_full_withdraw.to_string(),
    ])
}

pub async fn set_form_values(
    store: &Store,
    session: Option<&Session>,
    market: Option<&Market>,
    amount: Option<String>,
    is_full_withdraw: Option<bool>,
) {
    let mut values = store.vault_withdraw.read(|s| s.form_values.clone()).await;
    if let Some(amount) = amount {
        values.amount = amount;
    }
    if let Some(is_full) = is_full_withdraw {
        values.is_full_withdraw = is_full;
    }
    values.amount_error = None;

    let key = active_key(session, market, &values.amount, values.is_full_withdraw);
    store
        .vault_withdraw
        .apply_input(key.clone(), values.clone())
        .await;

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
                    .vault_withdraw
                    .commit_if_current(&key, |s| {
                        s.form_values.amount_error = Some(AmountError::TooMuchMax);
                    })
                    .await;
                return;
            }
        }
        Err(err) => {
            let message = format!("{err:#}");
            store
                .vault_withdraw
                .commit_if_current(&key, |s| s.form_status.error = Some(message))
                .await;
            return;
        }
    }

    fetch_est_gas(store, key, session, market).await;
}

pub async fn fetch_est_gas(store: &Store, key: ActiveKey, session: &Session, market: &Market) {
    let values = store.vault_withdraw.read(|s| s.form_values.clone()).await;
    let has_input = values.is_full_withdraw || is_positive_amount(&values.amount);
    if session.signer.is_none() || !has_input || values.amount_error.is_some() {
        return;
    }

    store
        .vault_withdraw
        .set_by_active_key(|s| &mut s.form_est_gas, key.clone(), FormEstGas::loading())
        .await;
    gas::fetch_gas_info(store, session).await;

    let threshold = store.vault_withdraw.cache_threshold();
    match store
        .api
        .vault_withdraw_est_gas(
            key.clone(),
            &market.id,
            &values.amount,
            values.is_full_withdraw,
        )
        .await
    {
        Ok(resp) => {
            store
                .vault_withdraw
                .commit_if_current(&resp.active_key, |s| {
                    s.form_est_gas.insert(
                        threshold,
                        resp.active_key.clone(),
                        FormEstGas::done(resp.estimated_gas),
                    );
                })
                .await;
        }
        Err(err) => {
            let message = format!("{err:#}");
            tracing::debug!(%key, "withdraw gas estimate failed: {message}");
            store
                .vault_withdraw
                .commit_if_current(&key, |s| s.form_status.error = Some(message.clone()))
                .await;
        }
    }
}

/// Single-step pipeline: withdraw (or redeem everything) from the vault.
pub async fn step_withdraw(
    store: &Store,
    session: &Session,
    market: &Market,
) -> Result<StepOutcome<TxResp>, StepError> {
    let Some(provider) = store.provider() else {
        return Err(StepError::MissingProvider);
    };

    let (key, values) = store
        .vault_withdraw
        .read(|s| (s.active_key.clone(), s.form_values.clone()))
        .await;
    let runner = StepRunner::new(&store.vault_withdraw);
    runner
        .begin(Step::Action(WithdrawStep::Withdraw), StepGate::None)
        .await?;

    gas::fetch_gas_info(store, session).await;
    let result = store
        .api
        .vault_withdraw(
            key.clone(),
            &provider,
            &market.id,
            &values.amount,
            values.is_full_withdraw,
        )
        .await
        .context("withdrawing vault shares");
    let outcome = runner
        .finish_action(is_current(&key), result, CompleteMode::ResetSlice)
        .await;

    if outcome.is_committed() {
        store.refresh_after_action(session, &market.id).await;
    }
    Ok(outcome)
}
