use anyhow::Context;
use serde::Serialize;
use store_engine::{
    is_current, ActiveKey, BoundedCache, CompleteMode, FormState, FormStatus, HasStatus, Keyed,
    Step, StepError, StepGate, StepOutcome, StepRunner,
};

use crate::api::{ApproveResp, DetailInfo, TxResp};
use crate::store::Store;
use crate::types::{is_positive_amount, is_too_much, AmountError, FormEstGas, Market, Session};
use crate::{gas, user};

/// Action step of the add-collateral pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddStep {
    Add,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CollateralAddForm {
    pub collateral: String,
    pub collateral_error: Option<AmountError>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CollateralAddState {
    pub active_key: ActiveKey,
    pub detail_info: BoundedCache<DetailInfo>,
    pub form_est_gas: BoundedCache<FormEstGas>,
    pub form_status: FormStatus<AddStep>,
    pub form_values: CollateralAddForm,
}

impl Keyed for CollateralAddState {
    fn active_key(&self) -> &ActiveKey {
        &self.active_key
    }
}

impl HasStatus<AddStep> for CollateralAddState {
    fn status(&self) -> &FormStatus<AddStep> {
        &self.form_status
    }
    fn status_mut(&mut self) -> &mut FormStatus<AddStep> {
        &mut self.form_status
    }
}

impl FormState<AddStep> for CollateralAddState {
    type Values = CollateralAddForm;

    fn set_active_key(&mut self, key: ActiveKey) {
        self.active_key = key;
    }
    fn set_values(&mut self, values: CollateralAddForm) {
        self.form_values = values;
    }
}

/// `{chain}-{market}-{collateral}`.
pub fn active_key(
    session: Option<&Session>,
    market: Option<&Market>,
    collateral: &str,
) -> ActiveKey {
    ActiveKey::from_parts([
        session
            .map(|s| s.chain_id.to_string())
            .unwrap_or_default(),
        market.map(|m| m.id.to_string()).unwrap_or_default(),
        collateral.to_owned(),
    ])
}

pub async fn set_form_values(
    store: &Store,
    session: Option<&Session>,
    market: Option<&Market>,
    collateral: Option<String>,
) {
    let mut values = store.collateral_add.read(|s| s.form_values.clone()).await;
    if let Some(collateral) = collateral {
        values.collateral = collateral;
    }
    values.collateral_error = None;

    let key = active_key(session, market, &values.collateral);
    store
        .collateral_add
        .apply_input(key.clone(), values.clone())
        .await;

    let (Some(session), Some(market)) = (session, market) else {
        return;
    };

    if session.signer.is_some() {
        match user::fetch_market_balances(store, session, &market.id, true).await {
            Ok(balances) => {
                if is_too_much(&values.collateral, &balances.collateral) {
                    store
                        .collateral_add
                        .commit_if_current(&key, |s| {
                            s.form_values.collateral_error = Some(AmountError::TooMuch);
                        })
                        .await;
                }
            }
            Err(err) => {
                let message = format!("{err:#}");
                store
                    .collateral_add
                    .commit_if_current(&key, |s| s.form_status.error = Some(message))
                    .await;
            }
        }
    }

    fetch_detail_info(store, key.clone(), session, market).await;
    fetch_est_gas_approval(store, key, session, market).await;
}

/// Position preview for the entered collateral amount.
pub async fn fetch_detail_info(store: &Store, key: ActiveKey, session: &Session, market: &Market) {
    let collateral = store
        .collateral_add
        .read(|s| s.form_values.collateral.clone())
        .await;
    if session.signer.is_none() || !is_positive_amount(&collateral) {
        return;
    }

    let threshold = store.collateral_add.cache_threshold();
    match store
        .api
        .collateral_add_detail(key.clone(), &market.id, &collateral)
        .await
    {
        Ok(resp) => {
            store
                .collateral_add
                .commit_if_current(&resp.active_key, |s| {
                    s.detail_info
                        .insert(threshold, resp.active_key.clone(), resp.detail.clone());
                })
                .await;
        }
        Err(err) => {
            let message = format!("{err:#}");
            tracing::debug!(%key, "collateral detail fetch failed: {message}");
            store
                .collateral_add
                .commit_if_current(&key, |s| s.form_status.error = Some(message.clone()))
                .await;
        }
    }
}

pub async fn fetch_est_gas_approval(
    store: &Store,
    key: ActiveKey,
    session: &Session,
    market: &Market,
) {
    let (collateral, collateral_error) = store
        .collateral_add
        .read(|s| {
            (
                s.form_values.collateral.clone(),
                s.form_values.collateral_error,
            )
        })
        .await;
    if session.signer.is_none() || !is_positive_amount(&collateral) || collateral_error.is_some() {
        return;
    }

    store
        .collateral_add
        .set_by_active_key(|s| &mut s.form_est_gas, key.clone(), FormEstGas::loading())
        .await;
    gas::fetch_gas_info(store, session).await;

    let threshold = store.collateral_add.cache_threshold();
    match store
        .api
        .collateral_add_est_gas_approval(key.clone(), &market.id, &collateral)
        .await
    {
        Ok(resp) => {
            store
                .collateral_add
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
            tracing::debug!(%key, "collateral gas estimate failed: {message}");
            store
                .collateral_add
                .commit_if_current(&key, |s| s.form_status.error = Some(message.clone()))
                .await;
        }
    }
}

/// Approval step: grant the controller an allowance for the collateral.
pub async fn step_approve(
    store: &Store,
    session: &Session,
    market: &Market,
) -> Result<StepOutcome<ApproveResp>, StepError> {
    let Some(provider) = store.provider() else {
        return Err(StepError::MissingProvider);
    };

    let (key, collateral) = store
        .collateral_add
        .read(|s| (s.active_key.clone(), s.form_values.collateral.clone()))
        .await;
    let runner = StepRunner::new(&store.collateral_add);
    runner
        .begin(Step::<AddStep>::Approval, StepGate::RequiresApproval)
        .await?;

    gas::fetch_gas_info(store, session).await;
    let result = store
        .api
        .collateral_add_approve(key.clone(), &provider, &market.id, &collateral)
        .await
        .context("approving collateral");
    let outcome = runner.finish_approval(is_current(&key), result).await;

    if outcome.is_committed() {
        fetch_est_gas_approval(store, key, session, market).await;
    }
    Ok(outcome)
}

/// Primary action: add the entered collateral to the open loan.
pub async fn step_add(
    store: &Store,
    session: &Session,
    market: &Market,
) -> Result<StepOutcome<TxResp>, StepError> {
    let Some(provider) = store.provider() else {
        return Err(StepError::MissingProvider);
    };

    let (key, collateral) = store
        .collateral_add
        .read(|s| (s.active_key.clone(), s.form_values.collateral.clone()))
        .await;
    let runner = StepRunner::new(&store.collateral_add);
    runner
        .begin(Step::Action(AddStep::Add), StepGate::RequiresApproval)
        .await?;

    gas::fetch_gas_info(store, session).await;
    let result = store
        .api
        .collateral_add(key.clone(), &provider, &market.id, &collateral)
        .await
        .context("adding collateral");
    let outcome = runner
        .finish_action(is_current(&key), result, CompleteMode::ResetSlice)
        .await;

    if outcome.is_committed() {
        if let Err(err) = user::fetch_loan_exists(store, session, &market.id, true).await {
            tracing::debug!("post-action loan existence refresh failed: {err:#}");
        }
        store.refresh_after_action(session, &market.id).await;
    }
    Ok(outcome)
}
