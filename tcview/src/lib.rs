//! Tornado Cash ETH pool withdrawal analysis.
//!
//! Lists every transfer leaving the 1, 10 and 100 ETH pools through the
//! Etherscan V2 API, groups the transfers by recipient, and merges the
//! per-pool views into one record per recipient with counts, ETH totals and
//! first/last withdrawal dates.
//!
//! ```no_run
//! use tcview::{ExplorerClient, ExplorerConfig, PoolSelection, DateWindow};
//!
//! # async fn run() -> tcview::Result<()> {
//! let client = ExplorerClient::connect(ExplorerConfig::new("YOUR_API_KEY"))?;
//! let span = DateWindow::Last7Days.resolve(chrono::Utc::now())?;
//! let analysis = tcview::analyze_withdrawals(&client, &PoolSelection::all(), span).await?;
//! for (recipient, record) in analysis.ranked() {
//!     println!("{recipient} {:.2} ETH", record.total_eth);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod error;
pub mod explorer;
pub mod pools;
pub mod types;
pub mod window;

pub use analysis::{Analysis, PoolStats, PoolTotals, RecipientMap, analyze_pool, analyze_withdrawals, merge};
pub use error::{Error, Result};
pub use explorer::{
    BlockRange, Closest, Explorer, ExplorerClient, ExplorerConfig, HttpTransport, KeyStatus, Transport,
};
pub use pools::{Pool, PoolSelection};
pub use types::{PoolActivity, Recipient, RecipientPoolStat, RecipientRecord, Transaction, TxKind, Withdrawal};
pub use window::{DateWindow, TimeSpan, parse_date};
