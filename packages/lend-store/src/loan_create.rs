use anyhow::Context;
use serde::Serialize;
use store_engine::{
    is_current, ActiveKey, BoundedCache, CompleteMode, FormStatus, HasStatus, Keyed, Step,
    StepError, StepGate, StepOutcome, StepRunner,
};

use crate::api::{ApproveResp, DetailInfo, TxResp};
use crate::store::Store;
use crate::types::{is_positive_amount, is_too_much, AmountError, FormEstGas, Market, Session};
use crate::{gas, user};

/// Action step of the loan-create pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreateStep {
    Create,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoanCreateForm {
    pub user_collateral: String,
    pub debt: String,
    /// Number of bands backing the loan (`N`).
    pub band_range: u8,
    pub collateral_error: Option<AmountError>,
    pub debt_error: Option<AmountError>,
}

impl Default for LoanCreateForm {
    fn default() -> Self {
        LoanCreateForm {
            user_collateral: String::new(),
            debt: String::new(),
            band_range: 10,
            collateral_error: None,
            debt_error: None,
        }
    }
}

/// This slice runs two derived keys: the form key covers every input, the
/// max key only the inputs the borrow maximum depends on, so a debt edit
/// does not invalidate the cached maximum.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoanCreateState {
    pub active_key: ActiveKey,
    pub active_key_max: ActiveKey,
    pub detail_info: BoundedCache<DetailInfo>,
    pub form_est_gas: BoundedCache<FormEstGas>,
    pub form_status: FormStatus<CreateStep>,
    pub form_values: LoanCreateForm,
    pub max_recv: BoundedCache<String>,
}

impl Keyed for LoanCreateState {
    fn active_key(&self) -> &ActiveKey {
        &self.active_key
    }
}

impl HasStatus<CreateStep> for LoanCreateState {
    fn status(&self) -> &FormStatus<CreateStep> {
        &self.form_status
    }
    fn status_mut(&mut self) -> &mut FormStatus<CreateStep> {
        &mut self.form_status
    }
}

/// `{chain}-{market}-{collateral}-{debt}-{n}`.
pub fn active_key(
    session: Option<&Session>,
    market: Option<&Market>,
    form: &LoanCreateForm,
) -> ActiveKey {
    ActiveKey::from_parts([
        session
            .map(|s| s.chain_id.to_string())
            .unwrap_or_default(),
        market.map(|m| m.id.to_string()).unwrap_or_default(),
        form.user_collateral.clone(),
        form.debt.clone(),
        form.band_range.to_string(),
    ])
}

/// `{chain}-{market}-{collateral}-{n}`: the maximum borrowable amount does
/// not depend on the entered debt.
pub fn active_key_max(
    session: Option<&Session>,
    market: Option<&Market>,
    form: &LoanCreateForm,
) -> ActiveKey {
    ActiveKey::from_parts([
        session
            .map(|s| s.chain_id.to_string())
            .unwrap_or_default(),
        market.map(|m| m.id.to_string()).unwrap_or_default(),
        form.user_collateral.clone(),
        form.band_range.to_string(),
    ])
}

/// Partial form update; `None` fields keep their current value.
#[derive(Clone, Debug, Default)]
pub struct LoanCreateUpdate {
    pub user_collateral: Option<String>,
    pub debt: Option<String>,
    pub band_range: Option<u8>,
}

pub async fn set_form_values(
    store: &Store,
    session: Option<&Session>,
    market: Option<&Market>,
    update: LoanCreateUpdate,
) {
    let mut values = store.loan_create.read(|s| s.form_values.clone()).await;
    if let Some(user_collateral) = update.user_collateral {
        values.user_collateral = user_collateral;
    }
    if let Some(debt) = update.debt {
        values.debt = debt;
    }
    if let Some(band_range) = update.band_range {
        values.band_range = band_range;
    }
    values.collateral_error = None;
    values.debt_error = None;

    let key = active_key(session, market, &values);
    let key_max = active_key_max(session, market, &values);
    store
        .loan_create
        .set_by_keys(|s| {
            s.active_key = key.clone();
            s.active_key_max = key_max.clone();
            s.form_values = values.clone();
            s.form_status = s.form_status.reset_transient();
        })
        .await;

    let (Some(session), Some(market)) = (session, market) else {
        return;
    };
    if session.signer.is_none() {
        return;
    }

    let max_recv = fetch_max_recv(store, key_max, session, market).await;

    // validation against the wallet balance and the borrow maximum
    let mut collateral_error = None;
    match user::fetch_market_balances(store, session, &market.id, true).await {
        Ok(balances) => {
            if is_too_much(&values.user_collateral, &balances.collateral) {
                collateral_error = Some(AmountError::TooMuch);
            }
        }
        Err(err) => {
            let message = format!("{err:#}");
            store
                .loan_create
                .commit_if_current(&key, |s| s.form_status.error = Some(message))
                .await;
        }
    }
    let debt_error = max_recv
        .as_deref()
        .filter(|max| is_too_much(&values.debt, max))
        .map(|_| AmountError::TooMuchMax);
    if collateral_error.is_some() || debt_error.is_some() {
        store
            .loan_create
            .commit_if_current(&key, |s| {
                s.form_values.collateral_error = collateral_error;
                s.form_values.debt_error = debt_error;
            })
            .await;
    }

    fetch_detail_info(store, key.clone(), session, market).await;
    fetch_est_gas_approval(store, key, session, market).await;
}

/// Maximum borrowable debt for the entered collateral; cached under its
/// own key and reused as the stored value when already present.
pub async fn fetch_max_recv(
    store: &Store,
    key_max: ActiveKey,
    session: &Session,
    market: &Market,
) -> Option<String> {
    let (values, stored) = store
        .loan_create
        .read(|s| (s.form_values.clone(), s.max_recv.get(&key_max).cloned()))
        .await;
    if let Some(stored) = stored {
        return Some(stored);
    }
    if session.signer.is_none() || !is_positive_amount(&values.user_collateral) {
        return None;
    }

    let threshold = store.loan_create.cache_threshold();
    match store
        .api
        .loan_create_max_recv(
            key_max.clone(),
            &market.id,
            &values.user_collateral,
            values.band_range,
        )
        .await
    {
        Ok(resp) => {
            store
                .loan_create
                .update(|s| {
                    if s.active_key_max == resp.active_key {
                        s.max_recv
                            .insert(threshold, resp.active_key.clone(), resp.max_recv.clone());
                    }
                })
                .await;
            Some(resp.max_recv)
        }
        Err(err) => {
            tracing::debug!(%key_max, "max borrowable fetch failed: {err:#}");
            None
        }
    }
}

/// Position preview for the entered collateral, debt, and band range.
pub async fn fetch_detail_info(store: &Store, key: ActiveKey, session: &Session, market: &Market) {
    let values = store.loan_create.read(|s| s.form_values.clone()).await;
    if session.signer.is_none()
        || !is_positive_amount(&values.user_collateral)
        || !is_positive_amount(&values.debt)
    {
        return;
    }

    let threshold = store.loan_create.cache_threshold();
    match store
        .api
        .loan_create_detail(
            key.clone(),
            &market.id,
            &values.user_collateral,
            &values.debt,
            values.band_range,
        )
        .await
    {
        Ok(resp) => {
            store
                .loan_create
                .commit_if_current(&resp.active_key, |s| {
                    s.detail_info
                        .insert(threshold, resp.active_key.clone(), resp.detail.clone());
                })
                .await;
        }
        Err(err) => {
            let message = format!("{err:#}");
            tracing::debug!(%key, "loan preview fetch failed: {message}");
            store
                .loan_create
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
    let values = store.loan_create.read(|s| s.form_values.clone()).await;
    if session.signer.is_none()
        || !is_positive_amount(&values.user_collateral)
        || !is_positive_amount(&values.debt)
        || values.collateral_error.is_some()
        || values.debt_error.is_some()
    {
        return;
    }

    store
        .loan_create
        .set_by_active_key(|s| &mut s.form_est_gas, key.clone(), FormEstGas::loading())
        .await;
    gas::fetch_gas_info(store, session).await;

    let threshold = store.loan_create.cache_threshold();
    match store
        .api
        .loan_create_est_gas_approval(
            key.clone(),
            &market.id,
            &values.user_collateral,
            &values.debt,
            values.band_range,
        )
        .await
    {
        Ok(resp) => {
            store
                .loan_create
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
            tracing::debug!(%key, "loan gas estimate failed: {message}");
            store
                .loan_create
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

    let (key, values) = store
        .loan_create
        .read(|s| (s.active_key.clone(), s.form_values.clone()))
        .await;
    let runner = StepRunner::new(&store.loan_create);
    runner
        .begin(Step::<CreateStep>::Approval, StepGate::RequiresApproval)
        .await?;

    gas::fetch_gas_info(store, session).await;
    let result = store
        .api
        .loan_create_approve(key.clone(), &provider, &market.id, &values.user_collateral)
        .await
        .context("approving loan collateral");
    let outcome = runner.finish_approval(is_current(&key), result).await;

    if outcome.is_committed() {
        fetch_est_gas_approval(store, key, session, market).await;
    }
    Ok(outcome)
}

/// Primary action: open the loan with the entered collateral and debt.
pub async fn step_create(
    store: &Store,
    session: &Session,
    market: &Market,
) -> Result<StepOutcome<TxResp>, StepError> {
    let Some(provider) = store.provider() else {
        return Err(StepError::MissingProvider);
    };

    let (key, values) = store
        .loan_create
        .read(|s| (s.active_key.clone(), s.form_values.clone()))
        .await;
    let runner = StepRunner::new(&store.loan_create);
    runner
        .begin(Step::Action(CreateStep::Create), StepGate::RequiresApproval)
        .await?;

    gas::fetch_gas_info(store, session).await;
    let result = store
        .api
        .loan_create(
            key.clone(),
            &provider,
            &market.id,
            &values.user_collateral,
            &values.debt,
            values.band_range,
        )
        .await
        .context("creating loan");
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
