use anyhow::Context;
use serde::Serialize;
use store_engine::{
    CompleteMode, FormStatus, HasStatus, Step, StepError, StepGate, StepOutcome, StepRunner,
};

use crate::api::{FutureRates, TxHash};
use crate::store::Store;
use crate::types::{is_too_much, FormEstGas, Market, Session};
use crate::{gas, user};

/// Shown while the wallet holds less of the borrowed token than the
/// liquidation needs; the gas estimate is suppressed while it stands.
pub const WARNING_NOT_ENOUGH_BORROWED: &str = "warning-not-enough-borrowed-token";

/// Action step of the self-liquidation pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LiquidateStep {
    Liquidate,
}

/// The only unkeyed slice: there is no user-entered amount, every input is
/// the position itself, so results are committed flat rather than under a
/// derived key.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelfLiquidationState {
    pub form_est_gas: FormEstGas,
    pub form_status: FormStatus<LiquidateStep>,
    pub future_rates: Option<FutureRates>,
    pub liquidation_amount: String,
}

impl HasStatus<LiquidateStep> for SelfLiquidationState {
    fn status(&self) -> &FormStatus<LiquidateStep> {
        &self.form_status
    }
    fn status_mut(&mut self) -> &mut FormStatus<LiquidateStep> {
        &mut self.form_status
    }
}

/// Preview the liquidation at the chosen slippage: tokens to repay, rate
/// impact, and any warning from the market library, then check the wallet
/// actually holds enough of the borrowed token.
pub async fn fetch_details(store: &Store, session: &Session, market: &Market, max_slippage: &str) {
    if session.signer.is_none() || max_slippage.is_empty() {
        return;
    }

    let detail = match store
        .api
        .self_liquidation_detail(session, &market.id, max_slippage)
        .await
    {
        Ok(detail) => detail,
        Err(err) => {
            let message = format!("{err:#}");
            tracing::debug!("self-liquidation preview failed: {message}");
            store
                .self_liquidation
                .set_by_keys(|s| s.form_status.error = Some(message.clone()))
                .await;
            return;
        }
    };

    store
        .self_liquidation
        .set_by_keys(|s| {
            s.liquidation_amount = detail.tokens_to_liquidate.clone();
            s.future_rates = Some(detail.future_rates.clone());
            if let Some(warning) = &detail.warning {
                s.form_status.warning = Some(warning.clone());
            }
        })
        .await;

    match user::fetch_market_balances(store, session, &market.id, true).await {
        Ok(balances) => {
            if is_too_much(&detail.tokens_to_liquidate, &balances.borrowed) {
                store
                    .self_liquidation
                    .set_by_keys(|s| {
                        s.form_status.warning = Some(WARNING_NOT_ENOUGH_BORROWED.to_owned());
                    })
                    .await;
            }
        }
        Err(err) => {
            let message = format!("{err:#}");
            store
                .self_liquidation
                .set_by_keys(|s| s.form_status.error = Some(message.clone()))
                .await;
        }
    }

    let blocked = store
        .self_liquidation
        .read(|s| s.form_status.error.is_some() || s.form_status.warning.is_some())
        .await;
    if !blocked {
        fetch_est_gas_approval(store, session, market, max_slippage).await;
    }
}

pub async fn fetch_est_gas_approval(
    store: &Store,
    session: &Session,
    market: &Market,
    max_slippage: &str,
) {
    let warning = store
        .self_liquidation
        .read(|s| s.form_status.warning.clone())
        .await;
    if session.signer.is_none() || warning.is_some() {
        return;
    }

    store
        .self_liquidation
        .set_by_key(|s| &mut s.form_est_gas, FormEstGas::loading())
        .await;
    gas::fetch_gas_info(store, session).await;

    match store
        .api
        .self_liquidation_est_gas_approval(&market.id, max_slippage)
        .await
    {
        Ok(resp) => {
            store
                .self_liquidation
                .set_by_keys(|s| {
                    s.form_est_gas = FormEstGas::done(resp.estimated_gas);
                    s.form_status.is_approved = resp.is_approved;
                })
                .await;
        }
        Err(err) => {
            let message = format!("{err:#}");
            tracing::debug!("self-liquidation gas estimate failed: {message}");
            store
                .self_liquidation
                .set_by_keys(|s| {
                    s.form_est_gas = FormEstGas::default();
                    s.form_status.error = Some(message.clone());
                })
                .await;
        }
    }
}

/// Approval step: allow the controller to pull the borrowed token.
pub async fn step_approve(
    store: &Store,
    session: &Session,
    market: &Market,
    max_slippage: &str,
) -> Result<StepOutcome<Vec<TxHash>>, StepError> {
    let Some(provider) = store.provider() else {
        return Err(StepError::MissingProvider);
    };

    let runner = StepRunner::new(&store.self_liquidation);
    runner
        .begin(Step::<LiquidateStep>::Approval, StepGate::RequiresApproval)
        .await?;

    gas::fetch_gas_info(store, session).await;
    let result = store
        .api
        .self_liquidation_approve(&provider, &market.id)
        .await
        .context("approving self-liquidation");
    let outcome = runner.finish_approval(|_| true, result).await;

    if outcome.is_committed() {
        fetch_est_gas_approval(store, session, market, max_slippage).await;
    }
    Ok(outcome)
}

/// Primary action: repay the position's debt from the wallet and close it.
pub async fn step_liquidate(
    store: &Store,
    session: &Session,
    market: &Market,
    max_slippage: &str,
) -> Result<StepOutcome<TxHash>, StepError> {
    let Some(provider) = store.provider() else {
        return Err(StepError::MissingProvider);
    };

    let runner = StepRunner::new(&store.self_liquidation);
    runner
        .begin(
            Step::Action(LiquidateStep::Liquidate),
            StepGate::RequiresApproval,
        )
        .await?;

    gas::fetch_gas_info(store, session).await;
    let result = store
        .api
        .self_liquidate(&provider, &market.id, max_slippage)
        .await
        .context("self-liquidating loan");
    let outcome = runner
        .finish_action(|_| true, result, CompleteMode::ResetSlice)
        .await;

    if outcome.is_committed() {
        if let Err(err) = user::fetch_loan_exists(store, session, &market.id, true).await {
            tracing::debug!("post-liquidation loan existence refresh failed: {err:#}");
        }
        store.refresh_after_action(session, &market.id).await;
    }
    Ok(outcome)
}
