//! Interactive API-key entry.
//!
//! Key entry runs as a small state machine:
//!
//! ```text
//! AwaitKey ──key──▶ Validating ──valid──────▶ Confirmed
//!    ▲                  │ invalid / unconfirmed
//!    │                  ▼
//!    └──── no ──── ConfirmUnverified ──yes──▶ Confirmed
//!
//! EOF (or empty input / rejection on reset) ──▶ Cancelled
//! ```
//!
//! A first-run setup keeps asking until a key is accepted. A reset asks once
//! and leaves the stored key alone unless the new one is accepted.

use std::future::Future;

use anyhow::Result;
use tcview::{ExplorerClient, KeyStatus};

use crate::config::ExplorerSettings;
use crate::credentials::{CredentialStore, mask_key};
use crate::prompt::Prompter;

/// Keys shorter than this are refused before any network call.
pub const MIN_KEY_LEN: usize = 20;

/// Checks a candidate key against the explorer.
pub trait KeyValidator {
    /// Check `key` against the explorer.
    fn validate(&self, key: &str) -> impl Future<Output = KeyStatus>;
}

/// Validates keys with a live explorer request.
#[derive(Debug, Clone)]
pub struct ExplorerValidator {
    settings: ExplorerSettings,
}

impl ExplorerValidator {
    /// Validator using `settings` for endpoint and timeouts.
    #[must_use]
    pub const fn new(settings: ExplorerSettings) -> Self {
        Self { settings }
    }
}

impl KeyValidator for ExplorerValidator {
    async fn validate(&self, key: &str) -> KeyStatus {
        match ExplorerClient::connect(self.settings.client_config(key)) {
            Ok(client) => client.check_key().await,
            Err(e) => KeyStatus::Unconfirmed(format!("validation error: {e}")),
        }
    }
}

/// Which flow is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupMode {
    /// No key is stored; keep asking until one is accepted.
    FirstRun,
    /// Replace the stored key; one attempt.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SetupState {
    AwaitKey,
    Validating(String),
    ConfirmUnverified { key: String, reason: String },
    Confirmed(String),
    Cancelled,
}

/// Drive the key-entry state machine.
///
/// Returns the accepted key (already saved to `store`), or `None` if entry
/// was cancelled.
///
/// # Errors
///
/// Returns an error on terminal I/O failure or if the key cannot be saved.
pub async fn run_setup<P, V>(
    mode: SetupMode,
    prompter: &mut P,
    validator: &V,
    store: &CredentialStore,
) -> Result<Option<String>>
where
    P: Prompter,
    V: KeyValidator,
{
    let mut state = SetupState::AwaitKey;
    loop {
        state = match state {
            SetupState::AwaitKey => {
                let question = match mode {
                    SetupMode::FirstRun => "Enter your Etherscan API key: ",
                    SetupMode::Reset => "> ",
                };
                match prompter.ask(question)? {
                    None => SetupState::Cancelled,
                    Some(key) if key.is_empty() => match mode {
                        SetupMode::FirstRun => {
                            prompter.say("API key cannot be empty. Please try again.\n")?;
                            SetupState::AwaitKey
                        }
                        SetupMode::Reset => {
                            prompter.say("Cancelled. No changes made.")?;
                            SetupState::Cancelled
                        }
                    },
                    Some(key) if mode == SetupMode::FirstRun && key.chars().count() < MIN_KEY_LEN => {
                        prompter.say(
                            "That doesn't look like a valid API key (too short). Please try again.\n",
                        )?;
                        SetupState::AwaitKey
                    }
                    Some(key) => SetupState::Validating(key),
                }
            }
            SetupState::Validating(key) => {
                prompter.say("\nValidating API key...")?;
                match validator.validate(&key).await {
                    KeyStatus::Valid => {
                        store.save_api_key(&key)?;
                        prompter.say(&format!(
                            "✓ API key validated and saved to {}\n",
                            store.path().display()
                        ))?;
                        SetupState::Confirmed(key)
                    }
                    KeyStatus::Invalid(reason) => match mode {
                        SetupMode::FirstRun => {
                            prompter.say(&format!("✗ {reason}. Please try again.\n"))?;
                            SetupState::AwaitKey
                        }
                        SetupMode::Reset => {
                            prompter.say(&format!("✗ {reason}. No changes made."))?;
                            SetupState::Cancelled
                        }
                    },
                    KeyStatus::Unconfirmed(reason) => SetupState::ConfirmUnverified { key, reason },
                }
            }
            SetupState::ConfirmUnverified { key, reason } => {
                prompter.say(&format!("⚠ {reason}"))?;
                if prompter.confirm("Save this API key anyway? (y/N): ")? {
                    store.save_api_key(&key)?;
                    prompter.say(&format!("API key saved to {}\n", store.path().display()))?;
                    SetupState::Confirmed(key)
                } else if mode == SetupMode::Reset {
                    prompter.say("No changes made.")?;
                    SetupState::Cancelled
                } else {
                    prompter.say("")?;
                    SetupState::AwaitKey
                }
            }
            SetupState::Confirmed(key) => return Ok(Some(key)),
            SetupState::Cancelled => return Ok(None),
        };
    }
}

/// Return the stored key, running first-run setup if there is none.
///
/// # Errors
///
/// Returns [`tcview::Error::Credential`] if entry is cancelled (e.g. stdin
/// closed), or any I/O error from the store or terminal.
pub async fn ensure_api_key<P, V>(
    prompter: &mut P,
    validator: &V,
    store: &CredentialStore,
) -> Result<String>
where
    P: Prompter,
    V: KeyValidator,
{
    if let Some(key) = store.api_key()? {
        return Ok(key);
    }

    let rule = "=".repeat(60);
    prompter.say(&format!("\n{rule}\nETHERSCAN API KEY SETUP\n{rule}"))?;
    prompter.say("\nNo API key found. You need an Etherscan API key to use this tool.")?;
    prompter.say("Get a free API key at: https://etherscan.io/apis\n")?;

    match run_setup(SetupMode::FirstRun, prompter, validator, store).await? {
        Some(key) => Ok(key),
        None => Err(tcview::Error::Credential("no API key entered".to_owned()).into()),
    }
}

/// Replace the stored key. Returns the new key if one was accepted.
///
/// # Errors
///
/// Returns an error on terminal I/O failure or if the key cannot be saved.
pub async fn reset_api_key<P, V>(
    prompter: &mut P,
    validator: &V,
    store: &CredentialStore,
) -> Result<Option<String>>
where
    P: Prompter,
    V: KeyValidator,
{
    let rule = "=".repeat(60);
    prompter.say(&format!("\n{rule}\nRESET ETHERSCAN API KEY\n{rule}"))?;
    if let Some(current) = store.api_key()? {
        prompter.say(&format!("\nCurrent API key: {}", mask_key(&current)))?;
    }
    prompter.say("\nEnter a new API key (or press Enter to cancel):")?;

    run_setup(SetupMode::Reset, prompter, validator, store).await
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;
    use crate::prompt::script::Script;

    const GOOD: &str = "GOODKEY0123456789ABCDEF";
    const OTHER: &str = "OTHERKEY0123456789ABCD";

    /// Returns queued statuses and records which keys were checked.
    #[derive(Default)]
    struct Canned {
        statuses: RefCell<VecDeque<KeyStatus>>,
        checked: RefCell<Vec<String>>,
    }

    impl Canned {
        fn new(statuses: impl IntoIterator<Item = KeyStatus>) -> Self {
            Self {
                statuses: RefCell::new(statuses.into_iter().collect()),
                checked: RefCell::default(),
            }
        }
    }

    impl KeyValidator for Canned {
        async fn validate(&self, key: &str) -> KeyStatus {
            self.checked.borrow_mut().push(key.to_owned());
            self.statuses
                .borrow_mut()
                .pop_front()
                .unwrap_or(KeyStatus::Valid)
        }
    }

    fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("config.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn first_run_reprompts_until_accepted() {
        let (_dir, store) = store();
        let mut script = Script::new(&["", "short", OTHER, GOOD]);
        let validator = Canned::new([KeyStatus::Invalid("Invalid API key".to_owned()), KeyStatus::Valid]);

        let key = ensure_api_key(&mut script, &validator, &store).await.unwrap();

        assert_eq!(key, GOOD);
        assert_eq!(*validator.checked.borrow(), vec![OTHER.to_owned(), GOOD.to_owned()]);
        assert!(script.saw("cannot be empty"));
        assert!(script.saw("too short"));
        assert!(script.saw("Invalid API key. Please try again."));
        assert_eq!(store.api_key().unwrap().as_deref(), Some(GOOD));
    }

    #[tokio::test]
    async fn stored_key_skips_setup() {
        let (_dir, store) = store();
        store.save_api_key(GOOD).unwrap();
        let mut script = Script::new(&[]);
        let validator = Canned::default();

        let key = ensure_api_key(&mut script, &validator, &store).await.unwrap();
        assert_eq!(key, GOOD);
        assert!(validator.checked.borrow().is_empty());
        assert!(script.transcript.is_empty());
    }

    #[tokio::test]
    async fn unconfirmed_key_needs_explicit_yes() {
        let (_dir, store) = store();
        let mut script = Script::new(&[OTHER, "n", GOOD, "y"]);
        let validator = Canned::new([
            KeyStatus::Unconfirmed("connection timeout".to_owned()),
            KeyStatus::Unconfirmed("connection timeout".to_owned()),
        ]);

        let key = run_setup(SetupMode::FirstRun, &mut script, &validator, &store)
            .await
            .unwrap();
        assert_eq!(key.as_deref(), Some(GOOD));
        assert!(script.saw("Save this API key anyway?"));
        assert_eq!(store.api_key().unwrap().as_deref(), Some(GOOD));
    }

    #[tokio::test]
    async fn closed_stdin_is_a_credential_error() {
        let (_dir, store) = store();
        let mut script = Script::new(&[]);
        let err = ensure_api_key(&mut script, &Canned::default(), &store)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<tcview::Error>(),
            Some(tcview::Error::Credential(_))
        ));
    }

    #[tokio::test]
    async fn reset_with_empty_input_keeps_old_key() {
        let (_dir, store) = store();
        store.save_api_key(GOOD).unwrap();
        let mut script = Script::new(&[""]);

        let key = reset_api_key(&mut script, &Canned::default(), &store).await.unwrap();
        assert_eq!(key, None);
        assert!(script.saw("GOODKEY0...CDEF"));
        assert!(script.saw("Cancelled"));
        assert_eq!(store.api_key().unwrap().as_deref(), Some(GOOD));
    }

    #[tokio::test]
    async fn reset_with_rejected_key_keeps_old_key() {
        let (_dir, store) = store();
        store.save_api_key(GOOD).unwrap();
        let mut script = Script::new(&[OTHER]);
        let validator = Canned::new([KeyStatus::Invalid("Invalid API key".to_owned())]);

        let key = reset_api_key(&mut script, &validator, &store).await.unwrap();
        assert_eq!(key, None);
        assert_eq!(script.remaining(), 0);
        assert_eq!(store.api_key().unwrap().as_deref(), Some(GOOD));
    }

    #[tokio::test]
    async fn reset_with_valid_key_replaces_it() {
        let (_dir, store) = store();
        store.save_api_key(GOOD).unwrap();
        let mut script = Script::new(&[OTHER]);

        let key = reset_api_key(&mut script, &Canned::default(), &store).await.unwrap();
        assert_eq!(key.as_deref(), Some(OTHER));
        assert_eq!(store.api_key().unwrap().as_deref(), Some(OTHER));
    }
}
