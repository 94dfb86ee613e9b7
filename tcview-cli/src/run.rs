//! A single viewer run: resolve the window, analyze the pools, show the
//! table and optionally export it.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use tcview::{Analysis, DateWindow, Explorer, ExplorerClient, PoolSelection, analyze_withdrawals};

use crate::config::ExplorerSettings;
use crate::credentials::CredentialStore;
use crate::prompt::Prompter;
use crate::report::{Table, export_csv};

/// What to analyze and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Time window.
    pub window: DateWindow,
    /// Pools to include.
    pub pools: PoolSelection,
    /// CSV destination, if any.
    pub export: Option<PathBuf>,
}

/// Turn a `--pools` list into a selection, telling the user about tokens
/// that were dropped. No valid token selects every pool.
///
/// # Errors
///
/// Returns an error on terminal I/O failure.
pub fn select_pools<P: Prompter>(prompter: &mut P, list: &str) -> Result<PoolSelection> {
    let (selection, ignored) = PoolSelection::parse_lenient(list);
    for token in &ignored {
        tracing::warn!(token = %token, "unknown pool ignored");
        prompter.say(&format!("  Warning: unknown pool '{token}' ignored (valid: 1, 10, 100)"))?;
    }
    match selection {
        Some(selection) => Ok(selection),
        None => {
            prompter.say("  No valid pools selected. Using all pools.")?;
            Ok(PoolSelection::all())
        }
    }
}

/// Run `query` against `explorer`, reporting through `prompter`.
///
/// # Errors
///
/// Returns an error if the window is invalid, a block lookup fails, or the
/// export cannot be written. Single-pool failures only show up in the table.
pub async fn execute<E, P>(explorer: &E, prompter: &mut P, query: &Query) -> Result<Analysis>
where
    E: Explorer,
    P: Prompter,
{
    let span = query.window.resolve(Utc::now())?;
    prompter.say(&format!(
        "\nAnalyzing {} withdrawals, {span}...",
        query.pools
    ))?;
    for pool in query.pools.iter() {
        prompter.say(&format!("    • {}: {:#x}", pool.name(), pool.address()))?;
    }

    let analysis = analyze_withdrawals(explorer, &query.pools, span).await?;
    prompter.say(&format!(
        "Block range: {} to {}",
        analysis.range.start, analysis.range.end
    ))?;
    prompter.say(&Table(&analysis).to_string())?;

    if let Some(path) = &query.export {
        export_csv(&analysis, path)?;
        prompter.say(&format!(
            "\n✓ Exported {} recipients to {}",
            analysis.recipients.len(),
            path.display()
        ))?;
    }

    Ok(analysis)
}

/// Settings and credentials loaded once at startup.
#[derive(Debug, Clone)]
pub struct Session {
    /// Explorer connection settings.
    pub settings: ExplorerSettings,
    /// Where the API key is cached.
    pub store: CredentialStore,
    /// The key in use.
    pub api_key: String,
}

impl Session {
    /// Explorer client for the current key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn explorer(&self) -> Result<ExplorerClient> {
        let client = ExplorerClient::connect(self.settings.client_config(&self.api_key))?;
        tracing::debug!(base_url = %client.config().base_url, "explorer client ready");
        Ok(client)
    }

    /// Connect and run `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or the run fails.
    pub async fn run<P: Prompter>(&self, prompter: &mut P, query: &Query) -> Result<Analysis> {
        execute(&self.explorer()?, prompter, query).await
    }
}
