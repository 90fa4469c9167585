use std::sync::Arc;

use parking_lot::Mutex;
use store_engine::{EngineConfig, SliceCell};

use crate::api::LendApi;
use crate::collateral_add::CollateralAddState;
use crate::gas::GasState;
use crate::loan_create::LoanCreateState;
use crate::markets::MarketsState;
use crate::peg_keeper::PegKeeperState;
use crate::self_liquidation::SelfLiquidationState;
use crate::types::{MarketId, Provider, Session};
use crate::user::UserState;
use crate::vault_stake::VaultStakeState;
use crate::vault_withdraw::VaultWithdrawState;
use crate::{markets, user};

/// The store context: every slice, the API client handle, and the wallet
/// provider cell. Created once at app start and passed explicitly to all
/// orchestration functions; each slice's state is owned by that slice
/// alone, and cross-slice effects go through the owning slice's fetch
/// functions.
pub struct Store {
    pub config: EngineConfig,
    pub api: Arc<dyn LendApi>,
    wallet: Mutex<Option<Arc<Provider>>>,

    pub gas: SliceCell<GasState>,
    pub user: SliceCell<UserState>,
    pub markets: SliceCell<MarketsState>,

    pub loan_create: SliceCell<LoanCreateState>,
    pub collateral_add: SliceCell<CollateralAddState>,
    pub vault_stake: SliceCell<VaultStakeState>,
    pub vault_withdraw: SliceCell<VaultWithdrawState>,
    pub self_liquidation: SliceCell<SelfLiquidationState>,
    pub peg_keeper: SliceCell<PegKeeperState>,
}

impl Store {
    pub fn new(api: Arc<dyn LendApi>, config: EngineConfig) -> Arc<Store> {
        Arc::new(Store {
            config,
            api,
            wallet: Mutex::new(None),
            gas: SliceCell::new(&config),
            user: SliceCell::new(&config),
            markets: SliceCell::new(&config),
            loan_create: SliceCell::new(&config),
            collateral_add: SliceCell::new(&config),
            vault_stake: SliceCell::new(&config),
            vault_withdraw: SliceCell::new(&config),
            self_liquidation: SliceCell::new(&config),
            peg_keeper: SliceCell::new(&config),
        })
    }

    pub fn connect_wallet(&self, provider: Provider) {
        *self.wallet.lock() = Some(Arc::new(provider));
    }

    pub fn disconnect_wallet(&self) {
        *self.wallet.lock() = None;
    }

    /// The opaque provider handle; its presence gates every mutating step.
    pub fn provider(&self) -> Option<Arc<Provider>> {
        self.wallet.lock().clone()
    }

    /// Reset the slices scoped to an identity when it changes. A chain
    /// switch resets everything chain-scoped; a signer switch (or sign-out)
    /// resets the user slice and every form slice, whose approvals belong
    /// to the old signer.
    pub async fn on_session_changed(&self, prev: Option<&Session>, next: &Session) {
        let network_switched = prev.map(|p| p.chain_id != next.chain_id).unwrap_or(false);
        let user_switched =
            prev.map(|p| p.signer != next.signer).unwrap_or(false) || next.signer.is_none();

        if network_switched || user_switched {
            tracing::debug!(network_switched, user_switched, "resetting identity-scoped state");
            self.user.reset().await;
            self.loan_create.reset().await;
            self.collateral_add.reset().await;
            self.vault_stake.reset().await;
            self.vault_withdraw.reset().await;
            self.self_liquidation.reset().await;
            self.peg_keeper.reset().await;
        }
        if network_switched {
            self.markets.reset().await;
            self.gas.reset().await;
        }
    }

    /// Read-refetches other features depend on after a mutating action
    /// landed. Runs after the pipeline's completion status is committed;
    /// failures are logged and dropped so they can never affect it.
    pub(crate) async fn refresh_after_action(&self, session: &Session, market: &MarketId) {
        if let Err(err) = user::fetch_market_balances(self, session, market, true).await {
            tracing::debug!("post-action balances refresh failed: {err:#}");
        }
        if let Err(err) = markets::fetch_totals(self, market, true).await {
            tracing::debug!("post-action totals refresh failed: {err:#}");
        }
    }
}
