//! Menu-driven mode, used when no window flag is given.

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use tcview::{DateWindow, Pool, PoolSelection, parse_date};

use crate::prompt::Prompter;
use crate::run::{Query, Session};
use crate::setup::{KeyValidator, ensure_api_key, reset_api_key};

const BANNER: &str = r"
╔══════════════════════════════════════════════════════════════════╗
║                  TORNADO CASH WITHDRAWAL VIEWER                  ║
║         1 ETH · 10 ETH · 100 ETH pools on Ethereum mainnet       ║
╚══════════════════════════════════════════════════════════════════╝";

/// Pool menu entries 1–7; 8 is the custom y/N walk.
const POOL_PRESETS: [&[Pool]; 7] = [
    &Pool::ALL,
    &[Pool::OneEth],
    &[Pool::TenEth],
    &[Pool::HundredEth],
    &[Pool::OneEth, Pool::TenEth],
    &[Pool::OneEth, Pool::HundredEth],
    &[Pool::TenEth, Pool::HundredEth],
];

/// Ask which pools to analyze. Anything unexpected selects all pools.
///
/// Returns `None` once input is exhausted.
///
/// # Errors
///
/// Returns an error on terminal I/O failure.
pub fn choose_pools<P: Prompter>(prompter: &mut P) -> Result<Option<PoolSelection>> {
    prompter.say("\n  Select pools to analyze:")?;
    prompter.say("    1. All pools (1 ETH + 10 ETH + 100 ETH)")?;
    for (n, preset) in POOL_PRESETS.iter().enumerate().skip(1) {
        let names: Vec<&str> = preset.iter().map(|p| p.name()).collect();
        let suffix = if preset.len() == 1 { " pool only" } else { "" };
        prompter.say(&format!("    {}. {}{suffix}", n + 1, names.join(" + ")))?;
    }
    prompter.say("    8. Custom selection\n")?;

    let Some(answer) = prompter.ask("  Select option (1-8) [1]: ")? else {
        return Ok(None);
    };
    let choice = if answer.is_empty() { "1" } else { answer.as_str() };

    if choice == "8" {
        prompter.say("\n  Custom selection (y/N for each):")?;
        let mut picked = Vec::new();
        for pool in Pool::ALL {
            let question = format!("    Include {} pool? (y/N): ", pool.name());
            let Some(answer) = prompter.ask(&question)? else {
                return Ok(None);
            };
            if answer.eq_ignore_ascii_case("y") {
                picked.push(pool);
            }
        }
        if let Some(selection) = PoolSelection::new(picked) {
            return Ok(Some(selection));
        }
        prompter.say("  No pools selected. Using all pools.")?;
        return Ok(Some(PoolSelection::all()));
    }

    let preset = choice
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| POOL_PRESETS.get(i));
    if let Some(selection) = preset.and_then(|pools| PoolSelection::new(pools.iter().copied())) {
        return Ok(Some(selection));
    }
    prompter.say("  Invalid option. Using all pools.")?;
    Ok(Some(PoolSelection::all()))
}

fn parse_end_date(input: &str) -> tcview::Result<Option<NaiveDate>> {
    if input.is_empty() {
        return Ok(None);
    }
    parse_date(input).map(Some)
}

/// Answer to the date menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowChoice {
    /// Analyze this window.
    Window(DateWindow),
    /// The all-time run was not confirmed.
    Cancelled,
}

/// Ask for a date window.
///
/// Invalid input falls back to the last 30 days. Returns `None` once input
/// is exhausted.
///
/// # Errors
///
/// Returns an error on terminal I/O failure.
pub fn choose_window<P: Prompter>(prompter: &mut P) -> Result<Option<WindowChoice>> {
    prompter.say("\n  Select date range:")?;
    prompter.say("    1. Last 24 hours")?;
    prompter.say("    2. Last 7 days")?;
    prompter.say("    3. Last 30 days (1 month)")?;
    prompter.say("    4. Last 90 days (3 months)")?;
    prompter.say("    5. Custom date range")?;
    prompter.say("    6. All time (WARNING: this may take a very long time!)\n")?;

    let Some(choice) = prompter.ask("  Select option (1-6): ")? else {
        return Ok(None);
    };

    let window = match choice.as_str() {
        "1" => DateWindow::Last24Hours,
        "2" => DateWindow::Last7Days,
        "3" => DateWindow::Last30Days,
        "4" => DateWindow::Last90Days,
        "5" => {
            let Some(start) = prompter.ask("  Enter start date (YYYY-MM-DD): ")? else {
                return Ok(None);
            };
            let range = match parse_date(&start) {
                Ok(start) => {
                    let Some(end) = prompter.ask("  Enter end date (YYYY-MM-DD) [today]: ")?
                    else {
                        return Ok(None);
                    };
                    parse_end_date(&end).map(|end| DateWindow::Range { start, end })
                }
                Err(e) => Err(e),
            };
            match range {
                Ok(window) => window,
                Err(e) => {
                    tracing::debug!(error = %e, "custom range rejected");
                    prompter.say("  Invalid date format. Using last 30 days.")?;
                    DateWindow::Last30Days
                }
            }
        }
        "6" => {
            let question = "  Analyzing all time data may take a very long time. Continue? (y/N): ";
            let Some(answer) = prompter.ask(question)? else {
                return Ok(None);
            };
            if !answer.eq_ignore_ascii_case("y") {
                prompter.say("  Cancelled.")?;
                return Ok(Some(WindowChoice::Cancelled));
            }
            DateWindow::AllTime
        }
        _ => {
            prompter.say("  Invalid option. Using last 30 days.")?;
            DateWindow::Last30Days
        }
    };
    Ok(Some(WindowChoice::Window(window)))
}

/// Outcome of the view questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryChoice {
    /// Run this query.
    Run(Query),
    /// Nothing to run; back to the menu.
    Cancelled,
}

/// Walk the pool, window and export questions.
///
/// Returns `None` once input is exhausted, so nothing runs unasked.
///
/// # Errors
///
/// Returns an error on terminal I/O failure.
pub fn ask_query<P: Prompter>(prompter: &mut P) -> Result<Option<QueryChoice>> {
    let Some(pools) = choose_pools(prompter)? else {
        return Ok(None);
    };
    prompter.say(&format!("\n  Selected pools: {pools}"))?;

    let window = match choose_window(prompter)? {
        None => return Ok(None),
        Some(WindowChoice::Cancelled) => return Ok(Some(QueryChoice::Cancelled)),
        Some(WindowChoice::Window(window)) => window,
    };

    let Some(export) = prompter.ask("\n  Export to CSV file (leave blank to skip): ")? else {
        return Ok(None);
    };
    let export = (!export.is_empty()).then(|| PathBuf::from(export));

    Ok(Some(QueryChoice::Run(Query { window, pools, export })))
}

/// Run the main menu until the user exits or input ends.
///
/// Analysis errors are shown and the menu continues.
///
/// # Errors
///
/// Returns an error on terminal I/O failure, or if the key is gone after a
/// reset and setup is cancelled.
pub async fn run_menu<P, V>(session: &mut Session, prompter: &mut P, validator: &V) -> Result<()>
where
    P: Prompter,
    V: KeyValidator,
{
    loop {
        prompter.say(BANNER)?;
        prompter.say("\n  Options:")?;
        prompter.say("    1. View Tornado Cash withdrawals")?;
        prompter.say("    2. Change API key")?;
        prompter.say("    3. Exit\n")?;

        let Some(choice) = prompter.ask("  Select option (1-3): ")? else {
            return Ok(());
        };

        match choice.as_str() {
            "1" => {
                match ask_query(prompter)? {
                    None => return Ok(()),
                    Some(QueryChoice::Cancelled) => {}
                    Some(QueryChoice::Run(query)) => {
                        if let Err(e) = session.run(prompter, &query).await {
                            tracing::error!(error = %e, "analysis failed");
                            prompter.say(&format!("\n  Error: {e:#}"))?;
                        }
                    }
                }
                if prompter.ask("\n  Press Enter to continue...")?.is_none() {
                    return Ok(());
                }
            }
            "2" => {
                reset_api_key(prompter, validator, &session.store).await?;
                session.api_key = ensure_api_key(prompter, validator, &session.store).await?;
            }
            "3" => {
                prompter.say("\n  Goodbye!\n")?;
                return Ok(());
            }
            _ => prompter.say("\n  Invalid option. Please try again.")?,
        }
    }
}

#[cfg(test)]
mod tests {
    use tcview::KeyStatus;

    use super::*;
    use crate::config::ExplorerSettings;
    use crate::credentials::CredentialStore;
    use crate::prompt::script::Script;

    struct AlwaysValid;

    impl KeyValidator for AlwaysValid {
        async fn validate(&self, _key: &str) -> KeyStatus {
            KeyStatus::Valid
        }
    }

    fn pools(answers: &[&str]) -> (PoolSelection, Script) {
        let mut script = Script::new(answers);
        let selection = choose_pools(&mut script).unwrap().unwrap();
        (selection, script)
    }

    fn window(answers: &[&str]) -> Option<WindowChoice> {
        choose_window(&mut Script::new(answers)).unwrap()
    }

    fn picked(window: DateWindow) -> Option<WindowChoice> {
        Some(WindowChoice::Window(window))
    }

    #[test]
    fn pool_menu_presets() {
        assert_eq!(pools(&[""]).0, PoolSelection::all());
        assert_eq!(pools(&["3"]).0.as_slice(), &[Pool::TenEth]);
        assert_eq!(pools(&["6"]).0.as_slice(), &[Pool::OneEth, Pool::HundredEth]);
        let (_, script) = pools(&["1"]);
        assert!(script.saw("2. 1 ETH pool only"));
        assert!(script.saw("7. 10 ETH + 100 ETH"));
    }

    #[test]
    fn pool_menu_custom_and_fallbacks() {
        let (selection, _) = pools(&["8", "n", "y", "y"]);
        assert_eq!(selection.as_slice(), &[Pool::TenEth, Pool::HundredEth]);

        let (selection, script) = pools(&["8", "n", "", "N"]);
        assert_eq!(selection, PoolSelection::all());
        assert!(script.saw("No pools selected"));

        let (selection, script) = pools(&["9"]);
        assert_eq!(selection, PoolSelection::all());
        assert!(script.saw("Invalid option. Using all pools."));
    }

    #[test]
    fn date_menu_choices() {
        assert_eq!(window(&["1"]), picked(DateWindow::Last24Hours));
        assert_eq!(window(&["4"]), picked(DateWindow::Last90Days));
        assert_eq!(window(&["6", "y"]), picked(DateWindow::AllTime));
        assert_eq!(window(&["6", "n"]), Some(WindowChoice::Cancelled));
        assert_eq!(
            window(&["5", "2024-01-01", ""]),
            picked(DateWindow::Range {
                start: parse_date("2024-01-01").unwrap(),
                end: None,
            })
        );
    }

    #[test]
    fn date_menu_falls_back_to_thirty_days() {
        let mut script = Script::new(&["5", "01/02/2024"]);
        let choice = choose_window(&mut script).unwrap();
        assert_eq!(choice, picked(DateWindow::Last30Days));
        assert!(script.saw("Invalid date format"));
        assert_eq!(script.remaining(), 0);

        assert_eq!(window(&["5", "2024-01-01", "soon"]), picked(DateWindow::Last30Days));
        assert_eq!(window(&["x"]), picked(DateWindow::Last30Days));
    }

    #[test]
    fn query_carries_export_path() {
        let mut script = Script::new(&["2", "2", "out.csv"]);
        let Some(QueryChoice::Run(query)) = ask_query(&mut script).unwrap() else {
            panic!("expected a query");
        };
        assert_eq!(query.pools.as_slice(), &[Pool::OneEth]);
        assert_eq!(query.window, DateWindow::Last7Days);
        assert_eq!(query.export, Some(PathBuf::from("out.csv")));
        assert!(script.saw("Selected pools: 1 ETH"));

        let mut script = Script::new(&["1", "3", ""]);
        let Some(QueryChoice::Run(query)) = ask_query(&mut script).unwrap() else {
            panic!("expected a query");
        };
        assert_eq!(query.export, None);
    }

    #[test]
    fn closed_input_never_builds_a_query() {
        let partial: [&[&str]; 7] = [
            &[],
            &["1"],
            &["8", "y"],
            &["1", "5"],
            &["1", "5", "2024-01-01"],
            &["1", "6"],
            &["1", "3"],
        ];
        for answers in partial {
            let mut script = Script::new(answers);
            assert_eq!(ask_query(&mut script).unwrap(), None, "answers: {answers:?}");
        }
        assert_eq!(choose_pools(&mut Script::new(&[])).unwrap(), None);
        assert_eq!(window(&[]), None);
    }

    fn session(dir: &tempfile::TempDir) -> Session {
        let store = CredentialStore::new(dir.path().join("config.json"));
        store.save_api_key("OLDKEY0123456789ABCDEF").unwrap();
        Session {
            settings: ExplorerSettings::default(),
            store,
            api_key: "OLDKEY0123456789ABCDEF".to_owned(),
        }
    }

    #[tokio::test]
    async fn menu_exits_on_three_or_eof() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);

        let mut script = Script::new(&["7", "3"]);
        run_menu(&mut session, &mut script, &AlwaysValid).await.unwrap();
        assert!(script.saw("Invalid option. Please try again."));
        assert!(script.saw("Goodbye"));

        let mut script = Script::new(&[]);
        run_menu(&mut session, &mut script, &AlwaysValid).await.unwrap();
        assert!(!script.saw("Goodbye"));
    }

    #[tokio::test]
    async fn eof_inside_view_exits_without_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let mut script = Script::new(&["1"]);
        run_menu(&mut session, &mut script, &AlwaysValid).await.unwrap();
        assert!(!script.saw("Analyzing"));
        assert!(!script.saw("Press Enter"));
    }

    #[tokio::test]
    async fn cancelled_all_time_returns_to_menu() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let mut script = Script::new(&["1", "1", "6", "n", "", "3"]);
        run_menu(&mut session, &mut script, &AlwaysValid).await.unwrap();
        assert!(script.saw("Cancelled."));
        assert!(script.saw("Goodbye"));
    }

    #[tokio::test]
    async fn change_key_updates_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let mut script = Script::new(&["2", "NEWKEY0123456789ABCDEF", "3"]);
        run_menu(&mut session, &mut script, &AlwaysValid).await.unwrap();
        assert_eq!(session.api_key, "NEWKEY0123456789ABCDEF");
        assert!(script.saw("OLDKEY01...CDEF"));
    }
}
