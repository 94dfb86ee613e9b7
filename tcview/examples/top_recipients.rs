#![allow(clippy::print_stdout, reason = "example prints its results")]
//! Print the ten largest recipients of the 10 ETH pool over the last week.
//!
//! Usage:
//!   `ETHERSCAN_API_KEY=... cargo run --example top_recipients`

use tcview::{DateWindow, ExplorerClient, ExplorerConfig, KeyStatus, Pool, PoolSelection};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let api_key = std::env::var("ETHERSCAN_API_KEY")?;
    let client = ExplorerClient::connect(ExplorerConfig::new(api_key))?;

    if let KeyStatus::Invalid(reason) = client.check_key().await {
        return Err(reason.into());
    }

    let pools = PoolSelection::new([Pool::TenEth]).ok_or("empty selection")?;
    let span = DateWindow::Last7Days.resolve(chrono::Utc::now())?;
    let analysis = tcview::analyze_withdrawals(&client, &pools, span).await?;

    println!(
        "{} recipients between blocks {} and {}",
        analysis.recipients.len(),
        analysis.range.start,
        analysis.range.end
    );
    for (recipient, record) in analysis.ranked().into_iter().take(10) {
        let activity = record.pool(Pool::TenEth);
        println!("{recipient}  {:>3} × 10 ETH  {:>8.2} ETH", activity.count, record.total_eth);
    }

    Ok(())
}
