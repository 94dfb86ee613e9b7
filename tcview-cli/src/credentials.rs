//! Cached Etherscan API key.
//!
//! The key lives in `~/.tornado_viewer/config.json` as
//! `{"etherscan_api_key": "..."}`. Other fields in the file are kept when the
//! key is rewritten. The file is replaced atomically and is readable by its
//! owner only.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

/// JSON field holding the key.
pub const KEY_FIELD: &str = "etherscan_api_key";

/// Overrides the directory holding `config.json`.
pub const HOME_ENV: &str = "TORNADO_VIEWER_HOME";

const DIR_NAME: &str = ".tornado_viewer";
const FILE_NAME: &str = "config.json";

/// File-backed API key store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store backed by `path`.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Resolve the per-user location.
    ///
    /// Precedence: `TORNADO_VIEWER_HOME`, then `$HOME/.tornado_viewer`
    /// (`%USERPROFILE%` on Windows).
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn default_path() -> Result<PathBuf> {
        let non_empty = |var: &str| std::env::var_os(var).filter(|v| !v.is_empty());
        if let Some(dir) = non_empty(HOME_ENV) {
            return Ok(PathBuf::from(dir).join(FILE_NAME));
        }
        let Some(home) = non_empty("HOME").or_else(|| non_empty("USERPROFILE")) else {
            bail!("cannot locate a home directory; set {HOME_ENV} or pass --key-file");
        };
        Ok(PathBuf::from(home).join(DIR_NAME).join(FILE_NAME))
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_fields(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        match serde_json::from_str::<Map<String, Value>>(&data) {
            Ok(fields) => Ok(fields),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "corrupted credential file, ignoring it");
                Ok(Map::new())
            }
        }
    }

    /// The cached key, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn api_key(&self) -> Result<Option<String>> {
        Ok(self
            .read_fields()?
            .get(KEY_FIELD)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_owned))
    }

    /// Persist `key`, keeping any other fields already in the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save_api_key(&self, key: &str) -> Result<()> {
        let mut fields = self.read_fields()?;
        fields.insert(KEY_FIELD.to_owned(), Value::String(key.to_owned()));

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = owner_only(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        file.write_all(serde_json::to_string_pretty(&fields)?.as_bytes())
            .with_context(|| format!("writing {}", tmp.display()))?;
        drop(file);

        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming {} → {}", tmp.display(), self.path.display()))?;

        tracing::debug!(path = %self.path.display(), "API key saved");
        Ok(())
    }
}

#[cfg(unix)]
fn owner_only(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // An existing temp file keeps its old mode; force it.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn owner_only(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::File::create(path)
}

/// Show the first 8 and last 4 characters of a key.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars.iter().take(8).collect();
    let tail: String = chars.iter().skip(chars.len() - 4).collect();
    format!("{head}...{tail}")
}
