use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lend_store::api::{
    ApiError, ApiResult, ApproveResp, DetailInfo, DetailInfoResp, EstGasApprovalResp, EstGasResp,
    FlatEstGasApproval, FutureRates, GasInfo, LendApi, MarketTotals, MaxRecvResp,
    PegKeeperInfoResp, SelfLiquidationDetail, TxHash, TxResp, UserLoanExists, UserMarketBalances,
};
use lend_store::types::{Address, ChainId, Market, MarketId, PoolId, Provider, Session};
use lend_store::Store;
use parking_lot::Mutex;
use store_engine::{ActiveKey, EngineConfig};
use tokio::sync::oneshot;

pub fn session() -> Session {
    Session::signed_in(ChainId(1), Address::from("0xa1ce"))
}

pub fn market() -> Market {
    Market {
        id: MarketId::from("one-way-market-0"),
        collateral_symbol: "WETH".to_owned(),
        borrowed_symbol: "crvUSD".to_owned(),
    }
}

/// Store over a [`MockApi`] with a connected wallet, ready for steps.
pub fn store_with_wallet() -> (Arc<Store>, Arc<MockApi>, Session, Market) {
    store_with_config(EngineConfig::default())
}

pub fn store_with_config(config: EngineConfig) -> (Arc<Store>, Arc<MockApi>, Session, Market) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let api = Arc::new(MockApi::default());
    let store = Store::new(api.clone(), config);
    store.connect_wallet(Provider {
        address: Address::from("0xa1ce"),
    });
    (store, api, session(), market())
}

struct Hold {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Programmable stand-in for the chain/market client. Responses echo the
/// request's active key verbatim; per-method counters record traffic, and
/// a one-shot latch can hold the next gas-estimate call in flight so tests
/// can interleave an input change with a slow response.
pub struct MockApi {
    balances: Mutex<UserMarketBalances>,
    est_gas: Mutex<HashMap<String, u64>>,
    approved: AtomicBool,
    fail_next_approve: AtomicBool,
    est_gas_gate: Mutex<Option<Hold>>,
    action_gate: Mutex<Option<Hold>>,

    pub gas_info_calls: AtomicU32,
    pub balances_calls: AtomicU32,
    pub loan_exists_calls: AtomicU32,
    pub totals_calls: AtomicU32,
    pub est_gas_calls: AtomicU32,
    pub approve_calls: AtomicU32,
    pub action_calls: AtomicU32,
}

impl Default for MockApi {
    fn default() -> Self {
        MockApi {
            balances: Mutex::new(UserMarketBalances {
                collateral: "1000".to_owned(),
                borrowed: "1000".to_owned(),
                vault_shares: "1000".to_owned(),
                gauge: "0".to_owned(),
            }),
            est_gas: Mutex::new(HashMap::new()),
            approved: AtomicBool::new(false),
            fail_next_approve: AtomicBool::new(false),
            est_gas_gate: Mutex::new(None),
            action_gate: Mutex::new(None),
            gas_info_calls: AtomicU32::new(0),
            balances_calls: AtomicU32::new(0),
            loan_exists_calls: AtomicU32::new(0),
            totals_calls: AtomicU32::new(0),
            est_gas_calls: AtomicU32::new(0),
            approve_calls: AtomicU32::new(0),
            action_calls: AtomicU32::new(0),
        }
    }
}

impl MockApi {
    /// Gas returned for estimates whose input amount is `amount`.
    pub fn set_est_gas(&self, amount: &str, gas: u64) {
        self.est_gas.lock().insert(amount.to_owned(), gas);
    }

    pub fn set_balances(&self, balances: UserMarketBalances) {
        *self.balances.lock() = balances;
    }

    /// Hold the next gas-estimate call: the first receiver fires once the
    /// call is in flight, the sender releases it.
    pub fn hold_next_est_gas(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.est_gas_gate.lock() = Some(Hold {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    /// Same latch for the next mutating action call.
    pub fn hold_next_action(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.action_gate.lock() = Some(Hold {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    pub fn fail_next_approve(&self) {
        self.fail_next_approve.store(true, Ordering::SeqCst);
    }

    fn gas_for(&self, amount: &str) -> u64 {
        self.est_gas.lock().get(amount).copied().unwrap_or(100_000)
    }

    async fn wait_if_held(&self) {
        let hold = self.est_gas_gate.lock().take();
        if let Some(Hold { entered, release }) = hold {
            let _ = entered.send(());
            let _ = release.await;
        }
    }

    async fn wait_if_action_held(&self) {
        let hold = self.action_gate.lock().take();
        if let Some(Hold { entered, release }) = hold {
            let _ = entered.send(());
            let _ = release.await;
        }
    }

    fn approve(&self, key: ActiveKey) -> ApiResult<ApproveResp> {
        self.approve_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_approve.swap(false, Ordering::SeqCst) {
            return Err(ApiError::Revert(
                "insufficient allowance contract revert".to_owned(),
            ));
        }
        self.approved.store(true, Ordering::SeqCst);
        Ok(ApproveResp {
            active_key: key,
            hashes: vec![TxHash("0xa9".to_owned())],
        })
    }

    fn detail(&self, key: ActiveKey, amount: &str) -> DetailInfoResp {
        DetailInfoResp {
            active_key: key,
            detail: DetailInfo {
                health_full: format!("health:{amount}"),
                health_not_full: format!("health-nf:{amount}"),
                bands: (0, 10),
                prices: vec!["3000".to_owned()],
                future_rates: None,
            },
        }
    }
}

#[async_trait]
impl LendApi for MockApi {
    async fn gas_info(&self, _chain: ChainId) -> ApiResult<GasInfo> {
        self.gas_info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GasInfo {
            max_fee_per_gas: 40,
            max_priority_fee_per_gas: 2,
        })
    }

    async fn user_market_balances(
        &self,
        _session: &Session,
        _market: &MarketId,
    ) -> ApiResult<UserMarketBalances> {
        self.balances_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.balances.lock().clone())
    }

    async fn user_loan_exists(
        &self,
        _session: &Session,
        _market: &MarketId,
    ) -> ApiResult<UserLoanExists> {
        self.loan_exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(UserLoanExists { loan_exists: true })
    }

    async fn market_totals(&self, _market: &MarketId) -> ApiResult<MarketTotals> {
        self.totals_calls.fetch_add(1, Ordering::SeqCst);
        Ok(MarketTotals {
            total_debt: "123456".to_owned(),
            total_supplied: "654321".to_owned(),
        })
    }

    async fn loan_create_max_recv(
        &self,
        key: ActiveKey,
        _market: &MarketId,
        user_collateral: &str,
        _band_range: u8,
    ) -> ApiResult<MaxRecvResp> {
        Ok(MaxRecvResp {
            active_key: key,
            max_recv: format!("{user_collateral}000"),
        })
    }

    async fn loan_create_detail(
        &self,
        key: ActiveKey,
        _market: &MarketId,
        user_collateral: &str,
        _debt: &str,
        _band_range: u8,
    ) -> ApiResult<DetailInfoResp> {
        Ok(self.detail(key, user_collateral))
    }

    async fn loan_create_est_gas_approval(
        &self,
        key: ActiveKey,
        _market: &MarketId,
        user_collateral: &str,
        _debt: &str,
        _band_range: u8,
    ) -> ApiResult<EstGasApprovalResp> {
        self.est_gas_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_held().await;
        Ok(EstGasApprovalResp {
            active_key: key,
            estimated_gas: self.gas_for(user_collateral),
            is_approved: self.approved.load(Ordering::SeqCst),
        })
    }

    async fn loan_create_approve(
        &self,
        key: ActiveKey,
        _provider: &Provider,
        _market: &MarketId,
        _user_collateral: &str,
    ) -> ApiResult<ApproveResp> {
        self.approve(key)
    }

    async fn loan_create(
        &self,
        key: ActiveKey,
        _provider: &Provider,
        _market: &MarketId,
        _user_collateral: &str,
        _debt: &str,
        _band_range: u8,
    ) -> ApiResult<TxResp> {
        self.action_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TxResp {
            active_key: key,
            hash: TxHash("0xc0".to_owned()),
        })
    }

    async fn collateral_add_detail(
        &self,
        key: ActiveKey,
        _market: &MarketId,
        collateral: &str,
    ) -> ApiResult<DetailInfoResp> {
        Ok(self.detail(key, collateral))
    }

    async fn collateral_add_est_gas_approval(
        &self,
        key: ActiveKey,
        _market: &MarketId,
        collateral: &str,
    ) -> ApiResult<EstGasApprovalResp> {
        self.est_gas_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_held().await;
        Ok(EstGasApprovalResp {
            active_key: key,
            estimated_gas: self.gas_for(collateral),
            is_approved: self.approved.load(Ordering::SeqCst),
        })
    }

    async fn collateral_add_approve(
        &self,
        key: ActiveKey,
        _provider: &Provider,
        _market: &MarketId,
        _collateral: &str,
    ) -> ApiResult<ApproveResp> {
        self.approve(key)
    }

    async fn collateral_add(
        &self,
        key: ActiveKey,
        _provider: &Provider,
        _market: &MarketId,
        _collateral: &str,
    ) -> ApiResult<TxResp> {
        self.action_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_action_held().await;
        Ok(TxResp {
            active_key: key,
            hash: TxHash("0xad".to_owned()),
        })
    }

    async fn vault_stake_est_gas_approval(
        &self,
        key: ActiveKey,
        _market: &MarketId,
        amount: &str,
    ) -> ApiResult<EstGasApprovalResp> {
        self.est_gas_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_held().await;
        Ok(EstGasApprovalResp {
            active_key: key,
            estimated_gas: self.gas_for(amount),
            is_approved: self.approved.load(Ordering::SeqCst),
        })
    }

    async fn vault_stake_approve(
        &self,
        key: ActiveKey,
        _provider: &Provider,
        _market: &MarketId,
        _amount: &str,
    ) -> ApiResult<ApproveResp> {
        self.approve(key)
    }

    async fn vault_stake(
        &self,
        key: ActiveKey,
        _provider: &Provider,
        _market: &MarketId,
        _amount: &str,
    ) -> ApiResult<TxResp> {
        self.action_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TxResp {
            active_key: key,
            hash: TxHash("0x57".to_owned()),
        })
    }

    async fn vault_withdraw_est_gas(
        &self,
        key: ActiveKey,
        _market: &MarketId,
        amount: &str,
        _is_full_withdraw: bool,
    ) -> ApiResult<EstGasResp> {
        self.est_gas_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_held().await;
        Ok(EstGasResp {
            active_key: key,
            estimated_gas: self.gas_for(amount),
        })
    }

    async fn vault_withdraw(
        &self,
        key: ActiveKey,
        _provider: &Provider,
        _market: &MarketId,
        _amount: &str,
        _is_full_withdraw: bool,
    ) -> ApiResult<TxResp> {
        self.action_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TxResp {
            active_key: key,
            hash: TxHash("0xd0".to_owned()),
        })
    }

    async fn self_liquidation_detail(
        &self,
        _session: &Session,
        _market: &MarketId,
        _max_slippage: &str,
    ) -> ApiResult<SelfLiquidationDetail> {
        Ok(SelfLiquidationDetail {
            tokens_to_liquidate: "250".to_owned(),
            future_rates: FutureRates {
                borrow_apr: "0.07".to_owned(),
                lend_apr: "0.05".to_owned(),
            },
            warning: None,
        })
    }

    async fn self_liquidation_est_gas_approval(
        &self,
        _market: &MarketId,
        _max_slippage: &str,
    ) -> ApiResult<FlatEstGasApproval> {
        self.est_gas_calls.fetch_add(1, Ordering::SeqCst);
        Ok(FlatEstGasApproval {
            estimated_gas: 300_000,
            is_approved: self.approved.load(Ordering::SeqCst),
        })
    }

    async fn self_liquidation_approve(
        &self,
        _provider: &Provider,
        _market: &MarketId,
    ) -> ApiResult<Vec<TxHash>> {
        self.approve_calls.fetch_add(1, Ordering::SeqCst);
        self.approved.store(true, Ordering::SeqCst);
        Ok(vec![TxHash("0x51".to_owned())])
    }

    async fn self_liquidate(
        &self,
        _provider: &Provider,
        _market: &MarketId,
        _max_slippage: &str,
    ) -> ApiResult<TxHash> {
        self.action_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TxHash("0x5e".to_owned()))
    }

    async fn peg_keeper_info(&self, key: ActiveKey, _pool: &PoolId) -> ApiResult<PegKeeperInfoResp> {
        Ok(PegKeeperInfoResp {
            active_key: key,
            debt: "9000".to_owned(),
            est_caller_profit: "1.5".to_owned(),
        })
    }

    async fn peg_keeper_est_gas_update(
        &self,
        key: ActiveKey,
        _pool: &PoolId,
    ) -> ApiResult<EstGasResp> {
        self.est_gas_calls.fetch_add(1, Ordering::SeqCst);
        Ok(EstGasResp {
            active_key: key,
            estimated_gas: 180_000,
        })
    }

    async fn peg_keeper_update(
        &self,
        key: ActiveKey,
        _provider: &Provider,
        _pool: &PoolId,
    ) -> ApiResult<TxResp> {
        self.action_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TxResp {
            active_key: key,
            hash: TxHash("0x9e".to_owned()),
        })
    }
}
