//! The three Tornado Cash ETH pools on Ethereum mainnet.
//!
//! Each pool is a single contract holding fixed-size deposits; withdrawals
//! leave the contract as value transfers to the recipient.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, address};

use crate::error::Error;

/// A monitored Tornado Cash ETH pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pool {
    /// The 1 ETH denomination pool.
    OneEth,
    /// The 10 ETH denomination pool.
    TenEth,
    /// The 100 ETH denomination pool.
    HundredEth,
}

const ONE_ETH_POOL: Address = address!("47CE0C6eD5B0Ce3d3A51fdb1C52DC66a7c3c2936");
const TEN_ETH_POOL: Address = address!("910Cbd523D972eb0a6f4cAe4618aD62622b39DbF");
const HUNDRED_ETH_POOL: Address = address!("A160cdAB225685dA1d56aa342Ad8841c3b53f291");

impl Pool {
    /// All pools in canonical (ascending denomination) order.
    pub const ALL: [Self; 3] = [Self::OneEth, Self::TenEth, Self::HundredEth];

    /// Returns the pool contract address.
    #[must_use]
    pub const fn address(self) -> Address {
        match self {
            Self::OneEth => ONE_ETH_POOL,
            Self::TenEth => TEN_ETH_POOL,
            Self::HundredEth => HUNDRED_ETH_POOL,
        }
    }

    /// Deposit size in whole ETH.
    #[must_use]
    pub const fn denomination(self) -> u32 {
        match self {
            Self::OneEth => 1,
            Self::TenEth => 10,
            Self::HundredEth => 100,
        }
    }

    /// Human-readable name, e.g. `"10 ETH"`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OneEth => "1 ETH",
            Self::TenEth => "10 ETH",
            Self::HundredEth => "100 ETH",
        }
    }

    /// Stable machine key, e.g. `"10_eth"`.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::OneEth => "1_eth",
            Self::TenEth => "10_eth",
            Self::HundredEth => "100_eth",
        }
    }

    /// Position of this pool in [`Pool::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::OneEth => 0,
            Self::TenEth => 1,
            Self::HundredEth => 2,
        }
    }

    /// Look up a pool by its command-line token (`"1"`, `"10"`, `"100"`).
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.denomination().to_string() == token || p.key() == token)
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pool {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s).ok_or_else(|| {
            Error::InvalidInput(format!("unknown pool '{s}' (valid values: 1, 10, 100)"))
        })
    }
}

/// A non-empty set of pools, kept in canonical order without duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSelection(Vec<Pool>);

impl PoolSelection {
    /// Every pool.
    #[must_use]
    pub fn all() -> Self {
        Self(Pool::ALL.to_vec())
    }

    /// Build a selection from any pools; returns [`None`] when empty.
    #[must_use]
    pub fn new(pools: impl IntoIterator<Item = Pool>) -> Option<Self> {
        let mut pools: Vec<Pool> = pools.into_iter().collect();
        pools.sort_unstable();
        pools.dedup();
        (!pools.is_empty()).then_some(Self(pools))
    }

    /// Parse a comma-separated token list such as `"1,10"`.
    ///
    /// Unknown tokens are returned alongside the selection so the caller can
    /// warn about them. The selection is `None` when no token is valid.
    #[must_use]
    pub fn parse_lenient(list: &str) -> (Option<Self>, Vec<String>) {
        let mut pools = Vec::new();
        let mut ignored = Vec::new();
        for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.parse::<Pool>() {
                Ok(pool) => pools.push(pool),
                Err(_) => ignored.push(token.to_owned()),
            }
        }
        (Self::new(pools), ignored)
    }

    /// Iterate the selected pools in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Pool> + '_ {
        self.0.iter().copied()
    }

    /// Number of selected pools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; a selection holds at least one pool.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The selected pools as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Pool] {
        &self.0
    }
}

impl Default for PoolSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for PoolSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|p| p.name()).collect();
        f.write_str(&names.join(", "))
    }
}
