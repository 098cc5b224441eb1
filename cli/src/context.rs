//! # Command Context
//!
//! Opens the pieces of the engine a command needs, rooted at the data
//! directory:
//!
//! ```text
//! <data-dir>/settings.json   merchant settings (plain JSON)
//! <data-dir>/store/wallets   encrypted wallet registry
//! <data-dir>/store/history   transaction history
//! <data-dir>/secrets/master.key
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use trxsafe_protocol::config::Settings;
use trxsafe_protocol::history::HistoryLedger;
use trxsafe_protocol::network::TronClient;
use trxsafe_protocol::pipeline::PaymentEngine;
use trxsafe_protocol::storage::{BlobStore, FileBlobStore};
use trxsafe_protocol::vault::{FileMasterKey, KeyStore};

const SETTINGS_FILE: &str = "settings.json";

/// `~/x` becomes `$HOME/x`; other paths are returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

pub struct AppContext {
    data_dir: PathBuf,
    node_url: Option<String>,
}

impl AppContext {
    pub fn new(data_dir: &Path, node_url: Option<String>) -> Self {
        Self {
            data_dir: expand_home(data_dir),
            node_url,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    /// Stored settings, or `None` before the first `config set`.
    pub fn try_load_settings(&self) -> Result<Option<Settings>> {
        let path = self.settings_path();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(settings))
    }

    /// Stored settings with `--node-url` applied, validated.
    pub fn load_settings(&self) -> Result<Settings> {
        let Some(mut settings) = self.try_load_settings()? else {
            bail!(
                "no settings in {}; run `trxsafe config set --seller <address> --price <trx>` first",
                self.data_dir.display()
            );
        };
        if let Some(url) = &self.node_url {
            settings.node_url = url.clone();
        }
        settings.validate().context("settings.json is invalid")?;
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        settings.validate().context("refusing to save invalid settings")?;
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        let path = self.settings_path();
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Node endpoint: `--node-url`, then settings, then the default.
    pub fn node_url(&self) -> Result<String> {
        if let Some(url) = &self.node_url {
            return Ok(url.clone());
        }
        Ok(self
            .try_load_settings()?
            .map(|s| s.node_url)
            .unwrap_or_else(|| trxsafe_protocol::config::DEFAULT_NODE_URL.to_string()))
    }

    pub fn client(&self) -> Result<TronClient> {
        let url = self.node_url()?;
        TronClient::http(&url).with_context(|| format!("failed to create client for {url}"))
    }

    async fn store(&self, dir: &str) -> Result<Arc<dyn BlobStore>> {
        let path = self.data_dir.join(dir);
        let store = FileBlobStore::open(&path)
            .await
            .with_context(|| format!("failed to open store at {}", path.display()))?;
        Ok(Arc::new(store))
    }

    pub async fn keystore(&self) -> Result<Arc<KeyStore>> {
        let secrets = self.store("secrets").await?;
        let store = self.store("store").await?;
        Ok(Arc::new(KeyStore::new(store, Arc::new(FileMasterKey::new(secrets)))))
    }

    pub async fn ledger(&self) -> Result<Arc<HistoryLedger>> {
        let store = self.store("store").await?;
        let ledger = HistoryLedger::open(store)
            .await
            .context("failed to load transaction history")?;
        Ok(Arc::new(ledger))
    }

    pub async fn engine(&self) -> Result<PaymentEngine> {
        let settings = self.load_settings()?;
        let client = TronClient::http(&settings.node_url)
            .with_context(|| format!("failed to create client for {}", settings.node_url))?;
        Ok(PaymentEngine::new(
            self.keystore().await?,
            client,
            self.ledger().await?,
            settings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_home_paths_are_untouched() {
        assert_eq!(expand_home(Path::new("/var/trx")), PathBuf::from("/var/trx"));
        assert_eq!(expand_home(Path::new("rel/dir")), PathBuf::from("rel/dir"));
    }

    #[test]
    fn settings_round_trip_through_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::new(dir.path(), None);
        assert!(ctx.try_load_settings().unwrap().is_none());
        assert!(ctx.load_settings().is_err());

        let settings = Settings::new("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", 2_000_000, 2);
        ctx.save_settings(&settings).unwrap();
        assert_eq!(ctx.load_settings().unwrap(), settings);

        let overridden = AppContext::new(dir.path(), Some("http://127.0.0.1:8090".into()));
        assert_eq!(overridden.load_settings().unwrap().node_url, "http://127.0.0.1:8090");
    }

    #[test]
    fn invalid_settings_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::new(dir.path(), None);
        let settings = Settings::new("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", 2_000_000, 11);
        assert!(ctx.save_settings(&settings).is_err());
        assert!(ctx.try_load_settings().unwrap().is_none());
    }
}
