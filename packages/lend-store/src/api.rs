use async_trait::async_trait;
use serde::Serialize;
use store_engine::ActiveKey;

use crate::types::{ChainId, MarketId, PoolId, Provider, Session};

/// Hard failures from the chain/market client. Soft conditions (a warning,
/// an approval still missing) travel inside the response types instead.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ApiError {
    #[error("rpc failure: {0}")]
    Rpc(String),
    #[error("contract revert: {0}")]
    Revert(String),
    #[error("request timed out")]
    Timeout,
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TxHash(pub String);

/// Current fee data for the connected chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GasInfo {
    pub max_fee_per_gas: u64,
    pub max_priority_fee_per_gas: u64,
}

/// Opaque preview of a position after the pending change. The numbers are
/// computed by the market library; the store only caches and keys them.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DetailInfo {
    pub health_full: String,
    pub health_not_full: String,
    pub bands: (i64, i64),
    pub prices: Vec<String>,
    pub future_rates: Option<FutureRates>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FutureRates {
    pub borrow_apr: String,
    pub lend_apr: String,
}

/// Responses echo the ActiveKey they were issued under, verbatim; commits
/// compare it against the slice's current key at resolution time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetailInfoResp {
    pub active_key: ActiveKey,
    pub detail: DetailInfo,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MaxRecvResp {
    pub active_key: ActiveKey,
    pub max_recv: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EstGasApprovalResp {
    pub active_key: ActiveKey,
    pub estimated_gas: u64,
    pub is_approved: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EstGasResp {
    pub active_key: ActiveKey,
    pub estimated_gas: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApproveResp {
    pub active_key: ActiveKey,
    pub hashes: Vec<TxHash>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TxResp {
    pub active_key: ActiveKey,
    pub hash: TxHash,
}

/// Self-liquidation preview; this slice is unkeyed so nothing is echoed.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelfLiquidationDetail {
    pub tokens_to_liquidate: String,
    pub future_rates: FutureRates,
    pub warning: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlatEstGasApproval {
    pub estimated_gas: u64,
    pub is_approved: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PegKeeperInfoResp {
    pub active_key: ActiveKey,
    pub debt: String,
    pub est_caller_profit: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserMarketBalances {
    pub collateral: String,
    pub borrowed: String,
    pub vault_shares: String,
    pub gauge: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserLoanExists {
    pub loan_exists: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MarketTotals {
    pub total_debt: String,
    pub total_supplied: String,
}

/// Boundary to the chain/market client library.
///
/// Implementations must be idempotent per call, echo the request's active
/// key back where one is passed, and return `Err` on hard failure rather
/// than silently empty data. Everything behind this trait is treated as an
/// opaque asynchronous black box by the store.
#[async_trait]
pub trait LendApi: Send + Sync {
    async fn gas_info(&self, chain: ChainId) -> ApiResult<GasInfo>;

    // reads shared across slices
    async fn user_market_balances(
        &self,
        session: &Session,
        market: &MarketId,
    ) -> ApiResult<UserMarketBalances>;
    async fn user_loan_exists(
        &self,
        session: &Session,
        market: &MarketId,
    ) -> ApiResult<UserLoanExists>;
    async fn market_totals(&self, market: &MarketId) -> ApiResult<MarketTotals>;

    // loan create
    async fn loan_create_max_recv(
        &self,
        key: ActiveKey,
        market: &MarketId,
        user_collateral: &str,
        band_range: u8,
    ) -> ApiResult<MaxRecvResp>;
    async fn loan_create_detail(
        &self,
        key: ActiveKey,
        market: &MarketId,
        user_collateral: &str,
        debt: &str,
        band_range: u8,
    ) -> ApiResult<DetailInfoResp>;
    async fn loan_create_est_gas_approval(
        &self,
        key: ActiveKey,
        market: &MarketId,
        user_collateral: &str,
        debt: &str,
        band_range: u8,
    ) -> ApiResult<EstGasApprovalResp>;
    async fn loan_create_approve(
        &self,
        key: ActiveKey,
        provider: &Provider,
        market: &MarketId,
        user_collateral: &str,
    ) -> ApiResult<ApproveResp>;
    async fn loan_create(
        &self,
        key: ActiveKey,
        provider: &Provider,
        market: &MarketId,
        user_collateral: &str,
        debt: &str,
        band_range: u8,
    ) -> ApiResult<TxResp>;

    // collateral add
    async fn collateral_add_detail(
        &self,
        key: ActiveKey,
        market: &MarketId,
        collateral: &str,
    ) -> ApiResult<DetailInfoResp>;
    async fn collateral_add_est_gas_approval(
        &self,
        key: ActiveKey,
        market: &MarketId,
        collateral: &str,
    ) -> ApiResult<EstGasApprovalResp>;
    async fn collateral_add_approve(
        &self,
        key: ActiveKey,
        provider: &Provider,
        market: &MarketId,
        collateral: &str,
    ) -> ApiResult<ApproveResp>;
    async fn collateral_add(
        &self,
        key: ActiveKey,
        provider: &Provider,
        market: &MarketId,
        collateral: &str,
    ) -> ApiResult<TxResp>;

    // vault stake
    async fn vault_stake_est_gas_approval(
        &self,
        key: ActiveKey,
        market: &MarketId,
        amount: &str,
    ) -> ApiResult<EstGasApprovalResp>;
    async fn vault_stake_approve(
        &self,
        key: ActiveKey,
        provider: &Provider,
        market: &MarketId,
        amount: &str,
    ) -> ApiResult<ApproveResp>;
    async fn vault_stake(
        &self,
        key: ActiveKey,
        provider: &Provider,
        market: &MarketId,
        amount: &str,
    ) -> ApiResult<TxResp>;

    // vault withdraw
    async fn vault_withdraw_est_gas(
        &self,
        key: ActiveKey,
        market: &MarketId,
        amount: &str,
        is_full_withdraw: bool,
    ) -> ApiResult<EstGasResp>;
    async fn vault_withdraw(
        &self,
        key: ActiveKey,
        provider: &Provider,
        market: &MarketId,
        amount: &str,
        is_full_withdraw: bool,
    ) -> ApiResult<TxResp>;

    // self-liquidation
    async fn self_liquidation_detail(
        &self,
        session: &Session,
        market: &MarketId,
        max_slippage: &str,
    ) -> ApiResult<SelfLiquidationDetail>;
    async fn self_liquidation_est_gas_approval(
        &self,
        market: &MarketId,
        max_slippage: &str,
    ) -> ApiResult<FlatEstGasApproval>;
    async fn self_liquidation_approve(
        &self,
        provider: &Provider,
        market: &MarketId,
    ) -> ApiResult<Vec<TxHash>>;
    async fn self_liquidate(
        &self,
        provider: &Provider,
        market: &MarketId,
        max_slippage: &str,
    ) -> ApiResult<TxHash>;

    // peg keeper
    async fn peg_keeper_info(&self, key: ActiveKey, pool: &PoolId) -> ApiResult<PegKeeperInfoResp>;
    async fn peg_keeper_est_gas_update(
        &self,
        key: ActiveKey,
        pool: &PoolId,
    ) -> ApiResult<EstGasResp>;
    async fn peg_keeper_update(
        &self,
        key: ActiveKey,
        provider: &Provider,
        pool: &PoolId,
    ) -> ApiResult<TxResp>;
}
