//! Core domain types: typed explorer transactions and per-recipient stats.
//!
//! The explorer returns every field as a JSON string. [`RawTransaction`]
//! mirrors that payload and [`RawTransaction::into_transaction`] is the only
//! place where it is validated and converted into a [`Transaction`].

use std::fmt;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::pools::Pool;

/// Which explorer feed a transaction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    /// A directly signed transaction (`txlist`).
    Normal,
    /// A value transfer made by contract execution (`txlistinternal`).
    Internal,
}

impl TxKind {
    /// The explorer `action` parameter for this feed.
    #[must_use]
    pub const fn action(self) -> &'static str {
        match self {
            Self::Normal => "txlist",
            Self::Internal => "txlistinternal",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Internal => "internal",
        })
    }
}

/// A transaction as reported by the explorer, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Block the transaction was included in.
    pub block_number: u64,
    /// Transaction hash (internal transfers carry their parent's hash).
    pub hash: String,
    /// Sender.
    pub from: Address,
    /// Receiver; `None` for contract creation.
    pub to: Option<Address>,
    /// Transferred value in wei.
    pub value: U256,
    /// Block timestamp, seconds since the Unix epoch.
    pub timestamp: i64,
    /// Feed the transaction came from.
    pub kind: TxKind,
}

/// Deserialize an optional address, treating `""` as absent.
fn deserialize_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Wire shape shared by `txlist` and `txlistinternal` entries.
///
/// Only the fields the analysis needs are declared; the rest are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    /// Decimal block number.
    pub block_number: Option<String>,
    /// Decimal Unix timestamp.
    pub time_stamp: Option<String>,
    /// Transaction hash.
    pub hash: Option<String>,
    /// Sender address.
    pub from: Option<String>,
    /// Receiver address; empty for contract creation.
    #[serde(default, deserialize_with = "deserialize_opt_string")]
    pub to: Option<String>,
    /// Decimal wei value.
    pub value: Option<String>,
}

/// Stand-in hash for internal rows the explorer lists without one.
pub const INTERNAL_HASH_FALLBACK: &str = "internal";

fn required<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Decode(format!("transaction is missing `{field}`")))
}

fn parse_address(field: &'static str, raw: &str) -> Result<Address> {
    raw.parse::<Address>()
        .map_err(|e| Error::Decode(format!("bad `{field}` address {raw:?}: {e}")))
}

impl RawTransaction {
    /// Validate the payload and convert it into a typed [`Transaction`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if a required field is missing or malformed.
    pub fn into_transaction(self, kind: TxKind) -> Result<Transaction> {
        let block = required("blockNumber", self.block_number.as_deref())?;
        let block_number = block
            .parse::<u64>()
            .map_err(|e| Error::Decode(format!("bad `blockNumber` {block:?}: {e}")))?;

        let ts = required("timeStamp", self.time_stamp.as_deref())?;
        let timestamp = ts
            .parse::<i64>()
            .map_err(|e| Error::Decode(format!("bad `timeStamp` {ts:?}: {e}")))?;

        let value = required("value", self.value.as_deref())?;
        let value = U256::from_str_radix(value, 10)
            .map_err(|e| Error::Decode(format!("bad `value` {value:?}: {e}")))?;

        let from = parse_address("from", required("from", self.from.as_deref())?)?;
        let to = self
            .to
            .as_deref()
            .map(|raw| parse_address("to", raw))
            .transpose()?;

        let hash = match kind {
            TxKind::Normal => required("hash", self.hash.as_deref())?.to_owned(),
            TxKind::Internal => self
                .hash
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .unwrap_or(INTERNAL_HASH_FALLBACK)
                .to_owned(),
        };

        Ok(Transaction {
            block_number,
            hash,
            from,
            to,
            value,
            timestamp,
            kind,
        })
    }
}

/// Who received a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Recipient {
    /// An externally owned account or contract.
    Account(Address),
    /// The transfer created a contract and has no receiver.
    ContractCreation,
}

impl From<Option<Address>> for Recipient {
    fn from(to: Option<Address>) -> Self {
        to.map_or(Self::ContractCreation, Self::Account)
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(addr) => write!(f, "{addr:#x}"),
            Self::ContractCreation => f.write_str("contract_creation"),
        }
    }
}

/// One withdrawal kept for downstream inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    /// Transaction hash.
    pub hash: String,
    /// Value in wei.
    pub value: U256,
    /// Block timestamp, seconds since the Unix epoch.
    pub timestamp: i64,
    /// Feed the withdrawal came from.
    pub kind: TxKind,
}

/// Withdrawals from one pool to one recipient.
///
/// `count` always equals `withdrawals.len()` and `total_wei` their sum; the
/// fields are only mutated through [`RecipientPoolStat::record`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientPoolStat {
    count: usize,
    total_wei: U256,
    withdrawals: Vec<Withdrawal>,
}

impl RecipientPoolStat {
    /// Add a withdrawal.
    pub fn record(&mut self, withdrawal: Withdrawal) {
        self.count += 1;
        self.total_wei = self.total_wei.saturating_add(withdrawal.value);
        self.withdrawals.push(withdrawal);
    }

    /// Number of withdrawals.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Cumulative value in wei.
    #[must_use]
    pub const fn total_wei(&self) -> U256 {
        self.total_wei
    }

    /// Contributing withdrawals in the order they were recorded.
    #[must_use]
    pub fn withdrawals(&self) -> &[Withdrawal] {
        &self.withdrawals
    }

    /// Earliest withdrawal timestamp.
    #[must_use]
    pub fn first_timestamp(&self) -> Option<i64> {
        self.withdrawals.iter().map(|w| w.timestamp).min()
    }

    /// Latest withdrawal timestamp.
    #[must_use]
    pub fn last_timestamp(&self) -> Option<i64> {
        self.withdrawals.iter().map(|w| w.timestamp).max()
    }
}

/// Per-pool slice of a [`RecipientRecord`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolActivity {
    /// Number of withdrawals.
    pub count: usize,
    /// Total withdrawn, in ETH.
    pub total_eth: f64,
    /// First withdrawal seen.
    pub first_seen: Option<DateTime<Utc>>,
    /// Last withdrawal seen.
    pub last_seen: Option<DateTime<Utc>>,
}

/// Everything known about one recipient across the selected pools.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipientRecord {
    /// Per-pool activity, indexed by [`Pool::index`].
    pub pools: [PoolActivity; 3],
    /// Sum of the per-pool totals, in ETH.
    pub total_eth: f64,
    /// Earliest withdrawal across all pools.
    pub first_seen: Option<DateTime<Utc>>,
    /// Latest withdrawal across all pools.
    pub last_seen: Option<DateTime<Utc>>,
}

impl RecipientRecord {
    /// Activity in a single pool.
    #[must_use]
    pub const fn pool(&self, pool: Pool) -> &PoolActivity {
        &self.pools[pool.index()]
    }
}
