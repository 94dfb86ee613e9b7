//! Etherscan V2 explorer client.
//!
//! Three queries are used:
//! 1. `block/getblocknobytime` to turn a wall-clock bound into a block number.
//! 2. `account/txlist` and `account/txlistinternal`, paged 10,000 rows at a
//!    time, to list every transaction touching a pool.
//! 3. `stats/ethsupply` as a cheap request when validating an API key.
//!
//! Requests are issued strictly one after another. The HTTP layer sits
//! behind [`Transport`] so the paging logic can run against canned pages.

use std::future::Future;
use std::time::Duration;

use alloy::primitives::Address;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{RawTransaction, Transaction, TxKind};

/// Etherscan V2 multichain endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.etherscan.io/v2/api";

/// Ethereum mainnet; the pools are only deployed there.
pub const MAINNET_CHAIN_ID: u64 = 1;

/// Rows requested per page; a shorter page marks the end of the listing.
pub const PAGE_SIZE: usize = 10_000;

/// Highest block the explorer accepts as an open upper bound.
pub const MAX_END_BLOCK: u64 = 99_999_999;

/// Per-request timeout for listing and block lookups.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request timeout for API-key validation.
pub const VALIDATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Pause between consecutive pages to stay under the free-tier rate limit.
pub const PAGE_DELAY: Duration = Duration::from_millis(200);

/// Progress is logged every N pages.
const PROGRESS_INTERVAL: u32 = 5;

/// Messages the explorer uses for an empty, but successful, answer.
const NO_DATA_MESSAGES: &[&str] = &["no transactions found", "no records found", "no data found"];

/// The `{status, message, result}` wrapper around every explorer reply.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// `"1"` on success, `"0"` otherwise.
    pub status: String,
    /// `"OK"`, `"NOTOK"`, or a "no data" message.
    #[serde(default)]
    pub message: String,
    /// A list, a string, or an error description.
    #[serde(default)]
    pub result: Value,
}

impl Envelope {
    /// Whether the status flag signals success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == "1"
    }

    /// Whether this is the explorer's "nothing matched" answer.
    #[must_use]
    pub fn is_no_data(&self) -> bool {
        let message = self.message.trim().to_ascii_lowercase();
        NO_DATA_MESSAGES.iter().any(|m| message.starts_with(m))
    }

    /// The `result` field rendered as text, for error messages.
    #[must_use]
    pub fn result_text(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Unwrap the payload.
    ///
    /// Returns `Ok(None)` for a "no data" answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] for any other non-success status.
    pub fn into_payload(self) -> Result<Option<Value>> {
        if self.is_success() {
            return Ok(Some(self.result));
        }
        if self.is_no_data() {
            return Ok(None);
        }
        Err(Error::Upstream {
            detail: self.result_text(),
            message: self.message,
        })
    }
}

/// Which side of a timestamp the block lookup should snap to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closest {
    /// Last block at or before the timestamp.
    Before,
    /// First block at or after the timestamp.
    After,
}

impl Closest {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

/// Inclusive block interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    /// First block.
    pub start: u64,
    /// Last block.
    pub end: u64,
}

impl Default for BlockRange {
    fn default() -> Self {
        Self {
            start: 0,
            end: MAX_END_BLOCK,
        }
    }
}

/// Outcome of probing the explorer with a candidate API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStatus {
    /// The explorer accepted the key.
    Valid,
    /// The explorer rejected the key.
    Invalid(String),
    /// The explorer could not be reached; the key may still be fine.
    Unconfirmed(String),
}

/// Explorer connection settings.
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// API endpoint.
    pub base_url: String,
    /// EIP-155 chain id sent with each request.
    pub chain_id: u64,
    /// Etherscan API key.
    pub api_key: String,
    /// Timeout for listing and block lookups.
    pub request_timeout: Duration,
    /// Timeout for key validation.
    pub validation_timeout: Duration,
    /// Pause between pages.
    pub page_delay: Duration,
}

impl ExplorerConfig {
    /// Mainnet defaults with the given key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            chain_id: MAINNET_CHAIN_ID,
            api_key: api_key.into(),
            request_timeout: REQUEST_TIMEOUT,
            validation_timeout: VALIDATION_TIMEOUT,
            page_delay: PAGE_DELAY,
        }
    }
}

/// A single GET against the explorer endpoint.
pub trait Transport {
    /// Send `query` and decode the envelope.
    fn get(
        &self,
        query: &[(&'static str, String)],
        timeout: Duration,
    ) -> impl Future<Output = Result<Envelope>>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build an HTTP transport for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the TLS backend cannot be initialised.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tcview/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, query: &[(&'static str, String)], timeout: Duration) -> Result<Envelope> {
        let response = self
            .http
            .get(&self.base_url)
            .query(query)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Envelope>().await?)
    }
}

/// The two explorer queries the analysis depends on.
pub trait Explorer {
    /// Map a Unix timestamp to the nearest block on the requested side.
    fn resolve_block(&self, timestamp: i64, closest: Closest) -> impl Future<Output = Result<u64>>;

    /// List every transaction of `kind` for `address` within `range`,
    /// ascending by block.
    fn fetch_transactions(
        &self,
        address: Address,
        range: BlockRange,
        kind: TxKind,
    ) -> impl Future<Output = Result<Vec<Transaction>>>;
}

/// Etherscan V2 client.
#[derive(Debug, Clone)]
pub struct ExplorerClient<T = HttpTransport> {
    transport: T,
    config: ExplorerConfig,
}

impl ExplorerClient<HttpTransport> {
    /// Connect over HTTP using `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn connect(config: ExplorerConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.base_url.clone())?;
        Ok(Self { transport, config })
    }
}

impl<T: Transport> ExplorerClient<T> {
    /// Use a custom transport.
    pub const fn with_transport(transport: T, config: ExplorerConfig) -> Self {
        Self { transport, config }
    }

    /// The settings this client was built with.
    #[must_use]
    pub const fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    async fn call(
        &self,
        mut query: Vec<(&'static str, String)>,
        timeout: Duration,
    ) -> Result<Envelope> {
        query.push(("chainid", self.config.chain_id.to_string()));
        query.push(("apikey", self.config.api_key.clone()));
        self.transport.get(&query, timeout).await
    }

    /// Check this client's key against the explorer.
    ///
    /// Never fails: transport problems are reported as
    /// [`KeyStatus::Unconfirmed`].
    pub async fn check_key(&self) -> KeyStatus {
        let query = vec![
            ("module", "stats".to_owned()),
            ("action", "ethsupply".to_owned()),
        ];
        match self.call(query, self.config.validation_timeout).await {
            Ok(envelope) => classify_key_reply(&envelope),
            Err(Error::Http(e)) if e.is_timeout() => KeyStatus::Unconfirmed(
                "connection timeout - could not validate (network issue)".to_owned(),
            ),
            Err(Error::Http(e)) if e.is_connect() => KeyStatus::Unconfirmed(
                "connection error - could not validate (network issue)".to_owned(),
            ),
            Err(e) => KeyStatus::Unconfirmed(format!("validation error: {e}")),
        }
    }
}

fn classify_key_reply(envelope: &Envelope) -> KeyStatus {
    if envelope.message == "NOTOK" {
        let detail = envelope.result_text();
        if detail.to_ascii_lowercase().contains("invalid api key") {
            return KeyStatus::Invalid("Invalid API key".to_owned());
        }
        let detail = if detail.is_empty() { "Unknown error".to_owned() } else { detail };
        return KeyStatus::Invalid(format!("API error: {detail}"));
    }
    if !envelope.is_success() {
        tracing::debug!(message = %envelope.message, "key check returned no success flag");
    }
    KeyStatus::Valid
}

fn parse_block_number(result: &Value) -> Result<u64> {
    let parsed = match result {
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::Decode(format!("expected a block number, got {result}")))
}

impl<T: Transport> Explorer for ExplorerClient<T> {
    async fn resolve_block(&self, timestamp: i64, closest: Closest) -> Result<u64> {
        let query = vec![
            ("module", "block".to_owned()),
            ("action", "getblocknobytime".to_owned()),
            ("timestamp", timestamp.to_string()),
            ("closest", closest.as_str().to_owned()),
        ];
        let envelope = self.call(query, self.config.request_timeout).await?;
        let payload = envelope
            .into_payload()?
            .ok_or_else(|| Error::Decode(format!("no block found for timestamp {timestamp}")))?;
        parse_block_number(&payload)
    }

    async fn fetch_transactions(
        &self,
        address: Address,
        range: BlockRange,
        kind: TxKind,
    ) -> Result<Vec<Transaction>> {
        let mut transactions = Vec::new();
        let mut page = 1u32;

        loop {
            let query = vec![
                ("module", "account".to_owned()),
                ("action", kind.action().to_owned()),
                ("address", format!("{address:#x}")),
                ("startblock", range.start.to_string()),
                ("endblock", range.end.to_string()),
                ("page", page.to_string()),
                ("offset", PAGE_SIZE.to_string()),
                ("sort", "asc".to_owned()),
            ];
            let envelope = self.call(query, self.config.request_timeout).await?;
            let Some(payload) = envelope.into_payload()? else {
                break;
            };

            let rows: Vec<RawTransaction> = serde_json::from_value(payload)
                .map_err(|e| Error::Decode(format!("{} page {page}: {e}", kind.action())))?;
            let fetched = rows.len();
            for row in rows {
                transactions.push(row.into_transaction(kind)?);
            }

            if fetched < PAGE_SIZE {
                break;
            }

            page += 1;
            if page.is_multiple_of(PROGRESS_INTERVAL) {
                let block = transactions.last().map_or(range.start, |tx: &Transaction| tx.block_number);
                tracing::info!(%address, %kind, page, block, rows = transactions.len(), "fetching");
            }
            tokio::time::sleep(self.config.page_delay).await;
        }

        Ok(transactions)
    }
}
