use std::fmt::{Display, Formatter};
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// EVM-style chain identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl Display for ChainId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One-way market identifier, e.g. `one-way-market-4`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketId(pub String);

impl Display for MarketId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarketId {
    fn from(s: &str) -> Self {
        MarketId(s.to_owned())
    }
}

/// Stableswap pool identifier for the peg keeper flows.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolId(pub String);

impl Display for PoolId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PoolId {
    fn from(s: &str) -> Self {
        PoolId(s.to_owned())
    }
}

/// Checksummed account address, kept opaque.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_owned())
    }
}

/// Connected chain session: which chain the client is on and, once a
/// wallet is connected, the signer. Slices that issue network calls guard
/// on the pieces they need.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Session {
    pub chain_id: ChainId,
    pub signer: Option<Address>,
}

impl Session {
    pub fn read_only(chain_id: ChainId) -> Self {
        Session {
            chain_id,
            signer: None,
        }
    }

    pub fn signed_in(chain_id: ChainId, signer: Address) -> Self {
        Session {
            chain_id,
            signer: Some(signer),
        }
    }
}

/// Opaque wallet/provider handle. Its presence alone gates every mutating
/// step; the store never looks inside beyond passing it to the API client.
#[derive(Clone, Debug)]
pub struct Provider {
    pub address: Address,
}

/// Market descriptor, resolved by the markets listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Market {
    pub id: MarketId,
    pub collateral_symbol: String,
    pub borrowed_symbol: String,
}

/// Synchronous validation failures, stored on the form itself rather than
/// thrown. The UI disables the action button while one is present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmountError {
    /// More than the user's token balance.
    TooMuch,
    /// More than the user's wallet holds of the vault shares.
    TooMuchWallet,
    /// More than the computed maximum for the current inputs.
    TooMuchMax,
}

/// Gas estimate for the current form configuration. A `loading` entry is
/// committed under the key before the fetch resolves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FormEstGas {
    pub estimated_gas: u64,
    pub loading: bool,
}

impl FormEstGas {
    pub fn loading() -> Self {
        FormEstGas {
            estimated_gas: 0,
            loading: true,
        }
    }

    pub fn done(estimated_gas: u64) -> Self {
        FormEstGas {
            estimated_gas,
            loading: false,
        }
    }
}

/// `true` when both sides parse as non-negative numbers and the first
/// exceeds the second. Empty or unparseable input never flags an error;
/// the form simply stays inactive.
pub fn is_too_much(value: &str, limit: &str) -> bool {
    let (Ok(value), Ok(limit)) = (
        BigDecimal::from_str(value.trim()),
        BigDecimal::from_str(limit.trim()),
    ) else {
        return false;
    };
    let zero = BigDecimal::from(0);
    value >= zero && limit >= zero && value > limit
}

/// `true` when the input parses as a strictly positive number. Network
/// calls are only worth issuing past this check.
pub fn is_positive_amount(value: &str) -> bool {
    BigDecimal::from_str(value.trim())
        .map(|value| value > BigDecimal::from(0))
        .unwrap_or(false)
}
