//! Withdrawal aggregation.
//!
//! For each selected pool:
//! 1. List normal and internal transactions for the pool address.
//! 2. Keep transfers sent *by* the pool with a positive value.
//! 3. Group them by recipient.
//!
//! The per-pool maps are then merged into one [`RecipientRecord`] per
//! recipient. A fetch failure in one pool leaves that pool empty; a failure
//! while resolving the date window aborts the whole run.

use std::collections::BTreeMap;

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::explorer::{BlockRange, Closest, Explorer, MAX_END_BLOCK};
use crate::pools::{Pool, PoolSelection};
use crate::types::{
    PoolActivity, Recipient, RecipientPoolStat, RecipientRecord, Transaction, TxKind, Withdrawal,
};
use crate::window::TimeSpan;

/// Recipient → withdrawals for a single pool.
pub type PoolStats = BTreeMap<Recipient, RecipientPoolStat>;

/// Recipient → merged record across pools.
pub type RecipientMap = BTreeMap<Recipient, RecipientRecord>;

/// Convert wei to ETH.
#[must_use]
pub fn wei_to_eth(wei: U256) -> f64 {
    format_ether(wei).parse().unwrap_or(f64::NAN)
}

fn to_datetime(timestamp: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0)
}

/// Group the pool's outgoing transfers by recipient.
///
/// A transaction counts when `from == pool` and `value > 0`. Transactions
/// without a receiver land in [`Recipient::ContractCreation`].
pub fn collect_withdrawals(
    pool: Address,
    transactions: impl IntoIterator<Item = Transaction>,
) -> PoolStats {
    let mut stats = PoolStats::new();
    for tx in transactions {
        if tx.from != pool || tx.value.is_zero() {
            continue;
        }
        stats
            .entry(Recipient::from(tx.to))
            .or_default()
            .record(Withdrawal {
                hash: tx.hash,
                value: tx.value,
                timestamp: tx.timestamp,
                kind: tx.kind,
            });
    }
    stats
}

/// Fetch and group one pool's withdrawals within `range`.
///
/// # Errors
///
/// Propagates any explorer failure for either feed.
pub async fn analyze_pool<E: Explorer>(
    explorer: &E,
    pool: Pool,
    range: BlockRange,
) -> Result<PoolStats> {
    let address = pool.address();
    tracing::info!(pool = %pool, %address, "fetching transactions");

    let normal = explorer
        .fetch_transactions(address, range, TxKind::Normal)
        .await?;
    let internal = explorer
        .fetch_transactions(address, range, TxKind::Internal)
        .await?;

    tracing::info!(
        pool = %pool,
        normal = normal.len(),
        internal = internal.len(),
        "transactions fetched"
    );

    Ok(collect_withdrawals(address, normal.into_iter().chain(internal)))
}

/// Merge per-pool maps for the selected pools into one record per recipient.
///
/// Maps for pools outside `selection` are ignored.
#[must_use]
pub fn merge(selection: &[Pool], per_pool: &BTreeMap<Pool, PoolStats>) -> RecipientMap {
    let mut merged = RecipientMap::new();

    for &pool in selection {
        let Some(stats) = per_pool.get(&pool) else {
            continue;
        };
        for (recipient, stat) in stats {
            let record = merged.entry(*recipient).or_default();
            record.pools[pool.index()] = PoolActivity {
                count: stat.count(),
                total_eth: wei_to_eth(stat.total_wei()),
                first_seen: stat.first_timestamp().and_then(to_datetime),
                last_seen: stat.last_timestamp().and_then(to_datetime),
            };
        }
    }

    for record in merged.values_mut() {
        record.total_eth = record.pools.iter().map(|p| p.total_eth).sum();
        record.first_seen = record.pools.iter().filter_map(|p| p.first_seen).min();
        record.last_seen = record.pools.iter().filter_map(|p| p.last_seen).max();
    }

    merged
}

/// Result of a full multi-pool analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Pools that were analyzed.
    pub selection: PoolSelection,
    /// Block range that was queried.
    pub range: BlockRange,
    /// Merged per-recipient records.
    pub recipients: RecipientMap,
    /// Pools whose fetch failed, with the error message.
    pub failed_pools: Vec<(Pool, String)>,
}

/// Per-pool column totals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolTotals {
    /// Withdrawals across all recipients.
    pub count: usize,
    /// ETH across all recipients.
    pub total_eth: f64,
}

impl Analysis {
    /// Records ordered by total ETH descending, then by recipient.
    #[must_use]
    pub fn ranked(&self) -> Vec<(&Recipient, &RecipientRecord)> {
        let mut rows: Vec<_> = self.recipients.iter().collect();
        rows.sort_by(|(ra, a), (rb, b)| b.total_eth.total_cmp(&a.total_eth).then_with(|| ra.cmp(rb)));
        rows
    }

    /// Column totals for one pool.
    #[must_use]
    pub fn pool_totals(&self, pool: Pool) -> PoolTotals {
        self.recipients
            .values()
            .map(|r| r.pool(pool))
            .fold(PoolTotals::default(), |acc, p| PoolTotals {
                count: acc.count + p.count,
                total_eth: acc.total_eth + p.total_eth,
            })
    }

    /// Sum of every recipient's total.
    #[must_use]
    pub fn grand_total(&self) -> f64 {
        self.recipients.values().map(|r| r.total_eth).sum()
    }
}

/// Resolve `span` to blocks, analyze each selected pool, and merge.
///
/// # Errors
///
/// Returns an error if either bound cannot be resolved to a block. Per-pool
/// fetch failures are logged and recorded in [`Analysis::failed_pools`].
pub async fn analyze_withdrawals<E: Explorer>(
    explorer: &E,
    selection: &PoolSelection,
    span: TimeSpan,
) -> Result<Analysis> {
    let start = match span.start {
        Some(start) => explorer.resolve_block(start.timestamp(), Closest::After).await?,
        None => 0,
    };
    let end = explorer
        .resolve_block(span.end.timestamp(), Closest::Before)
        .await?
        .min(MAX_END_BLOCK);
    let range = BlockRange { start, end };
    tracing::info!(start_block = start, end_block = end, window = %span, "resolved block range");

    let mut per_pool = BTreeMap::new();
    let mut failed_pools = Vec::new();

    for pool in selection.iter() {
        let stats = match analyze_pool(explorer, pool, range).await {
            Ok(stats) => {
                tracing::info!(pool = %pool, recipients = stats.len(), "pool analyzed");
                stats
            }
            Err(e) => {
                tracing::warn!(pool = %pool, error = %e, "pool fetch failed, continuing without it");
                failed_pools.push((pool, e.to_string()));
                PoolStats::new()
            }
        };
        per_pool.insert(pool, stats);
    }

    Ok(Analysis {
        recipients: merge(selection.as_slice(), &per_pool),
        selection: selection.clone(),
        range,
        failed_pools,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(from: Address, to: Option<Address>, wei: u128, timestamp: i64) -> Transaction {
        Transaction {
            block_number: 1,
            hash: format!("0x{timestamp:x}"),
            from,
            to,
            value: U256::from(wei),
            timestamp,
            kind: TxKind::Internal,
        }
    }

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from(bytes)
    }

    const ETH: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn filter_keeps_only_positive_outgoing_transfers() {
        let pool = Pool::OneEth.address();
        let stats = collect_withdrawals(
            pool,
            [
                tx(pool, Some(addr(1)), ETH, 10),
                tx(pool, Some(addr(1)), 0, 11),
                tx(addr(9), Some(pool), ETH, 12),
                tx(pool, None, ETH, 13),
            ],
        );
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[&Recipient::Account(addr(1))].count(), 1);
        assert_eq!(stats[&Recipient::ContractCreation].count(), 1);
    }

    #[test]
    fn merging_nothing_is_empty() {
        assert!(merge(&[], &BTreeMap::new()).is_empty());
        assert!(merge(Pool::ALL.as_slice(), &BTreeMap::new()).is_empty());
    }

    #[test]
    fn unselected_pools_are_ignored() {
        let pool = Pool::HundredEth.address();
        let per_pool = BTreeMap::from([(
            Pool::HundredEth,
            collect_withdrawals(pool, [tx(pool, Some(addr(2)), 100 * ETH, 50)]),
        )]);
        assert!(merge(&[Pool::OneEth], &per_pool).is_empty());
    }

    #[test]
    fn aggregate_spans_all_pools() {
        let one = Pool::OneEth.address();
        let hundred = Pool::HundredEth.address();
        let per_pool = BTreeMap::from([
            (
                Pool::OneEth,
                collect_withdrawals(one, [tx(one, Some(addr(3)), ETH, 2_000)]),
            ),
            (
                Pool::HundredEth,
                collect_withdrawals(hundred, [tx(hundred, Some(addr(3)), 100 * ETH, 1_000)]),
            ),
        ]);
        let merged = merge(Pool::ALL.as_slice(), &per_pool);
        let record = &merged[&Recipient::Account(addr(3))];

        let sum: f64 = record.pools.iter().map(|p| p.total_eth).sum();
        assert!((record.total_eth - sum).abs() < 1e-9);
        assert!((record.total_eth - 101.0).abs() < 1e-9);
        assert_eq!(record.first_seen, DateTime::from_timestamp(1_000, 0));
        assert_eq!(record.last_seen, DateTime::from_timestamp(2_000, 0));
        assert_eq!(record.pool(Pool::TenEth).count, 0);
        assert_eq!(record.pool(Pool::TenEth).first_seen, None);
    }

    #[test]
    fn wei_conversion() {
        assert!((wei_to_eth(U256::from(ETH)) - 1.0).abs() < f64::EPSILON);
        assert!((wei_to_eth(U256::from(ETH / 2)) - 0.5).abs() < f64::EPSILON);
        assert!(wei_to_eth(U256::ZERO).abs() < f64::EPSILON);
    }

    #[test]
    fn ranking_orders_by_total_then_address() {
        let pool = Pool::TenEth.address();
        let stats = collect_withdrawals(
            pool,
            [
                tx(pool, Some(addr(5)), 10 * ETH, 1),
                tx(pool, Some(addr(4)), 10 * ETH, 2),
                tx(pool, Some(addr(6)), 20 * ETH, 3),
            ],
        );
        let analysis = Analysis {
            selection: PoolSelection::all(),
            range: BlockRange::default(),
            recipients: merge(Pool::ALL.as_slice(), &BTreeMap::from([(Pool::TenEth, stats)])),
            failed_pools: Vec::new(),
        };
        let order: Vec<Recipient> = analysis.ranked().into_iter().map(|(r, _)| *r).collect();
        assert_eq!(
            order,
            vec![
                Recipient::Account(addr(6)),
                Recipient::Account(addr(4)),
                Recipient::Account(addr(5)),
            ]
        );
        let totals = analysis.pool_totals(Pool::TenEth);
        assert_eq!(totals.count, 3);
        assert!((totals.total_eth - 40.0).abs() < 1e-9);
        assert!((analysis.grand_total() - 40.0).abs() < 1e-9);
    }
}
