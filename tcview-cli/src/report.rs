//! Table and CSV rendering of an [`Analysis`].
//!
//! Both outputs list recipients in [`Analysis::ranked`] order and only show
//! columns for the selected pools.

use std::{fmt, io};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tcview::window::DATE_FORMAT;
use tcview::{Analysis, Pool, PoolActivity};

const ADDRESS_WIDTH: usize = 44;
const COUNT_WIDTH: usize = 5;
const DATE_WIDTH: usize = 12;
const GRAND_WIDTH: usize = 12;

fn fmt_date(date: Option<DateTime<Utc>>, missing: &str) -> String {
    date.map_or_else(|| missing.to_owned(), |d| d.format(DATE_FORMAT).to_string())
}

/// Width of the TOTAL column for a pool; wider pools move more ETH.
fn total_width(pool: Pool) -> usize {
    9 + pool.denomination().to_string().len()
}

fn section_width(pool: Pool) -> usize {
    COUNT_WIDTH + 1 + total_width(pool) + 1 + DATE_WIDTH + 1 + DATE_WIDTH
}

fn pool_cells(pool: Pool, activity: &PoolActivity) -> String {
    format!(
        " │ {:>cw$} {:>tw$.2} {:>dw$} {:>dw$}",
        activity.count,
        activity.total_eth,
        fmt_date(activity.first_seen, "-"),
        fmt_date(activity.last_seen, "-"),
        cw = COUNT_WIDTH,
        tw = total_width(pool),
        dw = DATE_WIDTH,
    )
}

/// Summary banner and recipient table, rendered through [`fmt::Display`].
#[derive(Debug, Clone, Copy)]
pub struct Table<'a>(pub &'a Analysis);

impl fmt::Display for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let analysis = self.0;
        if analysis.recipients.is_empty() {
            writeln!(f, "\n  No withdrawals found for the specified criteria.")?;
            return write_failures(f, analysis);
        }

        let pools = analysis.selection.as_slice();
        let width = ADDRESS_WIDTH
            + pools.iter().map(|&p| section_width(p) + 3).sum::<usize>()
            + GRAND_WIDTH
            + 3;
        let heavy = "═".repeat(width);

        writeln!(f, "\n{heavy}\n  TORNADO CASH WITHDRAWAL SUMMARY\n{heavy}")?;
        writeln!(f, "  Total unique recipients: {}", analysis.recipients.len())?;
        for &pool in pools {
            let totals = analysis.pool_totals(pool);
            writeln!(
                f,
                "  Total {} withdrawals: {} ({:.2} ETH)",
                pool.name(),
                totals.count,
                totals.total_eth
            )?;
        }
        writeln!(f, "  Grand total: {:.2} ETH\n{heavy}\n", analysis.grand_total())?;

        // Column titles, pool group labels, divider.
        write!(f, "{:<ADDRESS_WIDTH$}", "RECIPIENT ADDRESS")?;
        for &pool in pools {
            write!(
                f,
                " │ {:>cw$} {:>tw$} {:>dw$} {:>dw$}",
                "#",
                "TOTAL",
                "FIRST DATE",
                "LAST DATE",
                cw = COUNT_WIDTH,
                tw = total_width(pool),
                dw = DATE_WIDTH,
            )?;
        }
        writeln!(f, " │ {:>GRAND_WIDTH$}", "TOTAL ETH")?;

        write!(f, "{:ADDRESS_WIDTH$}", "")?;
        for &pool in pools {
            let label = format!("───── {} POOL ─────", pool.name());
            write!(f, " │ {label:^w$}", w = section_width(pool))?;
        }
        writeln!(f, " │")?;

        let mut divider = "─".repeat(ADDRESS_WIDTH);
        for &pool in pools {
            divider.push_str("─┼─");
            divider.push_str(&"─".repeat(section_width(pool)));
        }
        divider.push_str("─┼─");
        divider.push_str(&"─".repeat(GRAND_WIDTH));
        writeln!(f, "{divider}")?;

        for (recipient, record) in analysis.ranked() {
            write!(f, "{:<ADDRESS_WIDTH$}", recipient.to_string())?;
            for &pool in pools {
                f.write_str(&pool_cells(pool, record.pool(pool)))?;
            }
            writeln!(f, " │ {:>GRAND_WIDTH$.2}", record.total_eth)?;
        }

        writeln!(f, "{divider}")?;
        write!(f, "{:<ADDRESS_WIDTH$}", "TOTAL")?;
        for &pool in pools {
            let totals = analysis.pool_totals(pool);
            write!(
                f,
                " │ {:>cw$} {:>tw$.2} {:>dw$} {:>dw$}",
                totals.count,
                totals.total_eth,
                "",
                "",
                cw = COUNT_WIDTH,
                tw = total_width(pool),
                dw = DATE_WIDTH,
            )?;
        }
        writeln!(f, " │ {:>GRAND_WIDTH$.2}", analysis.grand_total())?;

        write_failures(f, analysis)
    }
}

fn write_failures(f: &mut fmt::Formatter<'_>, analysis: &Analysis) -> fmt::Result {
    for (pool, error) in &analysis.failed_pools {
        writeln!(f, "\n  ⚠ {pool} pool could not be fetched and is shown as empty: {error}")?;
    }
    Ok(())
}

/// CSV header for the selected pools.
#[must_use]
pub fn csv_header(pools: &[Pool]) -> Vec<String> {
    let mut header = vec!["Recipient Address".to_owned()];
    for pool in pools {
        let name = pool.name();
        header.extend([
            format!("{name} Withdrawals"),
            format!("Total {name}"),
            format!("{name} First Date"),
            format!("{name} Last Date"),
        ]);
    }
    header.extend([
        "Grand Total ETH".to_owned(),
        "Overall First Date".to_owned(),
        "Overall Last Date".to_owned(),
    ]);
    header
}

/// CSV amounts always carry a fraction, `21.0` rather than `21`.
fn fmt_eth(value: f64) -> String {
    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

/// Write the CSV export to any writer.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_csv<W: io::Write>(analysis: &Analysis, writer: W) -> Result<()> {
    let pools = analysis.selection.as_slice();
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(csv_header(pools))?;

    for (recipient, record) in analysis.ranked() {
        let mut row = vec![recipient.to_string()];
        for &pool in pools {
            let activity = record.pool(pool);
            row.extend([
                activity.count.to_string(),
                fmt_eth(activity.total_eth),
                fmt_date(activity.first_seen, ""),
                fmt_date(activity.last_seen, ""),
            ]);
        }
        row.extend([
            fmt_eth(record.total_eth),
            fmt_date(record.first_seen, ""),
            fmt_date(record.last_seen, ""),
        ]);
        csv.write_record(&row)?;
    }

    csv.flush()?;
    Ok(())
}

/// Write the CSV export to `path`, replacing it atomically.
///
/// # Errors
///
/// Returns an error if the file cannot be created, written or renamed.
pub fn export_csv(analysis: &Analysis, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let tmp = path.with_extension("csv.tmp");
    let written = std::fs::File::create(&tmp)
        .with_context(|| format!("creating {}", tmp.display()))
        .and_then(|file| {
            write_csv(analysis, io::BufWriter::new(file))
                .with_context(|| format!("writing {}", tmp.display()))
        })
        .and_then(|()| {
            std::fs::rename(&tmp, path)
                .with_context(|| format!("renaming {} → {}", tmp.display(), path.display()))
        });

    if let Err(e) = written {
        if let Err(cleanup) = std::fs::remove_file(&tmp) {
            tracing::debug!(path = %tmp.display(), error = %cleanup, "temp file not removed");
        }
        return Err(e);
    }

    tracing::info!(path = %path.display(), rows = analysis.recipients.len(), "CSV exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use alloy::primitives::{Address, U256};
    use tcview::analysis::collect_withdrawals;
    use tcview::{BlockRange, PoolSelection, Transaction, TxKind, merge};

    use super::*;

    const ETH: u128 = 1_000_000_000_000_000_000;

    fn tx(pool: Pool, to: u8, eth: u128, timestamp: i64) -> Transaction {
        Transaction {
            block_number: 1,
            hash: format!("0x{timestamp:x}"),
            from: pool.address(),
            to: Some(Address::from([to; 20])),
            value: U256::from(eth * ETH),
            timestamp,
            kind: TxKind::Internal,
        }
    }

    fn analysis(selection: PoolSelection) -> Analysis {
        let day = 86_400;
        let mut per_pool = BTreeMap::new();
        per_pool.insert(
            Pool::OneEth,
            collect_withdrawals(
                Pool::OneEth.address(),
                [tx(Pool::OneEth, 1, 1, 1_704_067_200), tx(Pool::OneEth, 2, 1, 1_704_067_200 + day)],
            ),
        );
        per_pool.insert(
            Pool::TenEth,
            collect_withdrawals(
                Pool::TenEth.address(),
                [
                    tx(Pool::TenEth, 2, 10, 1_704_067_200 + 2 * day),
                    tx(Pool::TenEth, 2, 10, 1_704_067_200 + 5 * day),
                    tx(Pool::TenEth, 3, 10, 1_704_067_200),
                ],
            ),
        );
        Analysis {
            recipients: merge(selection.as_slice(), &per_pool),
            selection,
            range: BlockRange::default(),
            failed_pools: Vec::new(),
        }
    }

    fn csv_rows(analysis: &Analysis) -> Vec<Vec<String>> {
        let mut buf = Vec::new();
        write_csv(analysis, &mut buf).unwrap();
        csv::Reader::from_reader(buf.as_slice())
            .records()
            .map(|r| r.unwrap().iter().map(str::to_owned).collect())
            .collect()
    }

    #[test]
    fn header_follows_selection() {
        let header = csv_header(&[Pool::TenEth, Pool::HundredEth]);
        assert_eq!(header.len(), 1 + 2 * 4 + 3);
        assert_eq!(header[1], "10 ETH Withdrawals");
        assert_eq!(header[6], "Total 100 ETH");
        assert_eq!(header[9], "Grand Total ETH");
    }

    #[test]
    fn rows_are_sorted_by_grand_total() {
        let rows = csv_rows(&analysis(PoolSelection::all()));
        let addresses: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(
            addresses,
            vec![
                "0x0202020202020202020202020202020202020202",
                "0x0303030303030303030303030303030303030303",
                "0x0101010101010101010101010101010101010101",
            ]
        );
        // 0x02.. : 1 ETH pool once, 10 ETH pool twice, never 100 ETH.
        let top = &rows[0];
        assert_eq!(top[1], "1");
        assert_eq!(top[2], "1.0");
        assert_eq!(top[3], "2024-01-02");
        assert_eq!(top[5], "2");
        assert_eq!(top[6], "20.0");
        assert_eq!(top[7], "2024-01-03");
        assert_eq!(top[8], "2024-01-06");
        assert_eq!(top[9], "0");
        assert_eq!(top[10], "0.0");
        assert_eq!(top[11], "");
        assert_eq!(top[13], "21.0");
        assert_eq!(top[14], "2024-01-02");
        assert_eq!(top[15], "2024-01-06");
    }

    #[test]
    fn csv_and_table_agree_on_totals() {
        let analysis = analysis(PoolSelection::new([Pool::OneEth, Pool::TenEth]).unwrap());
        let rows = csv_rows(&analysis);
        let table = Table(&analysis).to_string();

        for (i, pool) in analysis.selection.iter().enumerate() {
            let count_col = 1 + i * 4;
            let count: usize = rows.iter().map(|r| r[count_col].parse::<usize>().unwrap()).sum();
            let total: f64 = rows.iter().map(|r| r[count_col + 1].parse::<f64>().unwrap()).sum();

            let totals = analysis.pool_totals(pool);
            assert_eq!(count, totals.count);
            assert!((total - totals.total_eth).abs() < 1e-9);
            assert!(table.contains(&format!(
                "Total {} withdrawals: {} ({:.2} ETH)",
                pool.name(),
                count,
                total
            )));
        }

        let grand: f64 = rows.iter().map(|r| r[9].parse::<f64>().unwrap()).sum();
        assert!(table.contains(&format!("Grand total: {grand:.2} ETH")));
        let total_line = table.lines().find(|l| l.starts_with("TOTAL ")).unwrap();
        assert!(total_line.ends_with(&format!("{grand:.2}")));
    }

    #[test]
    fn table_uses_dashes_for_missing_dates() {
        let analysis = analysis(PoolSelection::all());
        let table = Table(&analysis).to_string();
        let row = table
            .lines()
            .find(|l| l.starts_with("0x0303030303030303030303030303030303030303"))
            .unwrap();
        assert!(row.contains(" - "));
        assert!(table.contains("───── 100 ETH POOL ─────"));
        assert!(!table.contains("could not be fetched"));
    }

    #[test]
    fn empty_analysis_says_so() {
        let mut analysis = analysis(PoolSelection::new([Pool::HundredEth]).unwrap());
        assert!(analysis.recipients.is_empty());
        analysis.failed_pools.push((Pool::HundredEth, "timeout".to_owned()));
        let table = Table(&analysis).to_string();
        assert!(table.contains("No withdrawals found"));
        assert!(table.contains("100 ETH pool could not be fetched"));
    }

    #[test]
    fn export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("withdrawals.csv");
        export_csv(&analysis(PoolSelection::all()), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Recipient Address,1 ETH Withdrawals"));
        assert_eq!(text.lines().count(), 4);
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn failed_export_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken.csv");
        std::fs::create_dir(&path).unwrap();

        let err = export_csv(&analysis(PoolSelection::all()), &path).unwrap_err();
        assert!(format!("{err:#}").contains("renaming"));
        assert!(path.is_dir());
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn eth_amounts_keep_a_fraction() {
        assert_eq!(fmt_eth(21.0), "21.0");
        assert_eq!(fmt_eth(0.0), "0.0");
        assert_eq!(fmt_eth(0.5), "0.5");
        assert_eq!(fmt_eth(0.00001), "0.00001");
    }
}
