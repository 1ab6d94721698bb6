//! Configuration for the bot process.
//!
//! Everything the bot needs at startup lives in [`BotConfig`], built via
//! [`BotConfigBuilder`]. The binary maps CLI flags and environment variables
//! onto the builder; tests construct configs directly.

use crate::error::BotError;
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Telegram's download ceiling for bots: 20 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// Bot process configuration.
///
/// # Example
/// ```rust
/// use pdf_unlock_bot::BotConfig;
///
/// let config = BotConfig::builder()
///     .token("123456:ABC")
///     .port(8080)
///     .build()
///     .unwrap();
/// assert!(config.webhook_url.is_none());
/// ```
#[derive(Clone)]
pub struct BotConfig {
    /// Bot API credential. Required.
    pub token: String,

    /// HTTP listen port for webhook delivery. Required.
    pub port: u16,

    /// Externally reachable base URL. `Some` selects webhook delivery,
    /// `None` selects long polling.
    pub webhook_url: Option<Url>,

    /// Root of the inbound/outbound scratch directories. Default: `./data`.
    pub work_dir: PathBuf,

    /// Largest accepted upload in bytes. Default: 20 MiB.
    pub max_file_size: u64,

    /// Decryption program. Default: `qpdf` (resolved through `PATH`).
    pub qpdf_path: PathBuf,

    /// Upper bound on a single decryption run in seconds. Default: 60.
    pub decrypt_timeout_secs: u64,

    /// Timeout for fetching an uploaded file in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Startup sweep deletes scratch files older than this. `0` disables
    /// the sweep. Default: 3600.
    pub sweep_after_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            port: 0,
            webhook_url: None,
            work_dir: PathBuf::from("data"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            qpdf_path: PathBuf::from("qpdf"),
            decrypt_timeout_secs: 60,
            download_timeout_secs: 120,
            sweep_after_secs: 3600,
        }
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("port", &self.port)
            .field("webhook_url", &self.webhook_url.as_ref().map(Url::as_str))
            .field("work_dir", &self.work_dir)
            .field("max_file_size", &self.max_file_size)
            .field("qpdf_path", &self.qpdf_path)
            .field("decrypt_timeout_secs", &self.decrypt_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("sweep_after_secs", &self.sweep_after_secs)
            .finish()
    }
}

/// How updates reach the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Telegram pushes updates to this URL.
    Webhook { url: Url },
    /// The bot long-polls `getUpdates`.
    Polling,
}

impl BotConfig {
    /// Create a new builder for `BotConfig`.
    pub fn builder() -> BotConfigBuilder {
        BotConfigBuilder {
            config: Self::default(),
            webhook_url: None,
        }
    }

    /// Route the webhook listener serves. Derived from the token so the
    /// endpoint is not guessable.
    pub fn webhook_path(&self) -> String {
        format!("/bot{}", self.token)
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        match &self.webhook_url {
            Some(base) => {
                let full = format!(
                    "{}{}",
                    base.as_str().trim_end_matches('/'),
                    self.webhook_path()
                );
                // `base` already parsed and the suffix is path-safe.
                match Url::parse(&full) {
                    Ok(url) => DeliveryMode::Webhook { url },
                    Err(_) => DeliveryMode::Webhook { url: base.clone() },
                }
            }
            None => DeliveryMode::Polling,
        }
    }

    pub fn decrypt_timeout(&self) -> Duration {
        Duration::from_secs(self.decrypt_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// `None` when the startup sweep is disabled.
    pub fn sweep_after(&self) -> Option<Duration> {
        (self.sweep_after_secs > 0).then(|| Duration::from_secs(self.sweep_after_secs))
    }
}

/// Builder for [`BotConfig`].
#[derive(Debug)]
pub struct BotConfigBuilder {
    config: BotConfig,
    webhook_url: Option<String>,
}

impl BotConfigBuilder {
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = token.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Raw webhook base URL; validated in [`build`](Self::build). Blank
    /// strings count as unset.
    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.webhook_url = (!url.trim().is_empty()).then_some(url);
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn qpdf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.qpdf_path = path.into();
        self
    }

    pub fn decrypt_timeout_secs(mut self, secs: u64) -> Self {
        self.config.decrypt_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn sweep_after_secs(mut self, secs: u64) -> Self {
        self.config.sweep_after_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<BotConfig, BotError> {
        if self.config.token.trim().is_empty() {
            return Err(BotError::MissingSetting { name: "BOT_TOKEN" });
        }
        if self.config.port == 0 {
            return Err(BotError::MissingSetting { name: "PORT" });
        }
        if self.config.max_file_size == 0 {
            return Err(BotError::InvalidConfig(
                "max file size must be ≥ 1 byte".into(),
            ));
        }
        if self.config.decrypt_timeout_secs == 0 {
            return Err(BotError::InvalidConfig(
                "decrypt timeout must be ≥ 1s".into(),
            ));
        }
        if let Some(raw) = self.webhook_url.take() {
            let url = Url::parse(raw.trim()).map_err(|e| {
                BotError::InvalidConfig(format!("webhook URL '{raw}' is invalid: {e}"))
            })?;
            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(BotError::InvalidConfig(format!(
                    "webhook URL must be http(s), got '{}'",
                    url.scheme()
                )));
            }
            self.config.webhook_url = Some(url);
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BotConfigBuilder {
        BotConfig::builder().token("123:ABC").port(8080)
    }

    #[test]
    fn defaults() {
        let c = base().build().unwrap();
        assert_eq!(c.max_file_size, 20 * 1024 * 1024);
        assert_eq!(c.qpdf_path, PathBuf::from("qpdf"));
        assert_eq!(c.decrypt_timeout(), Duration::from_secs(60));
        assert_eq!(c.sweep_after(), Some(Duration::from_secs(3600)));
        assert_eq!(c.delivery_mode(), DeliveryMode::Polling);
    }

    #[test]
    fn token_required() {
        let err = BotConfig::builder().port(8080).build().unwrap_err();
        assert!(matches!(err, BotError::MissingSetting { name: "BOT_TOKEN" }));
    }

    #[test]
    fn port_required() {
        let err = BotConfig::builder().token("t").build().unwrap_err();
        assert!(matches!(err, BotError::MissingSetting { name: "PORT" }));
    }

    #[test]
    fn webhook_mode_appends_token_path() {
        let c = base().webhook_url("https://bot.example.com/").build().unwrap();
        match c.delivery_mode() {
            DeliveryMode::Webhook { url } => {
                assert_eq!(url.as_str(), "https://bot.example.com/bot123:ABC");
            }
            other => panic!("expected webhook mode, got {other:?}"),
        }
        assert_eq!(c.webhook_path(), "/bot123:ABC");
    }

    #[test]
    fn blank_webhook_means_polling() {
        let c = base().webhook_url("   ").build().unwrap();
        assert_eq!(c.delivery_mode(), DeliveryMode::Polling);
    }

    #[test]
    fn invalid_webhook_rejected() {
        let err = base().webhook_url("not a url").build().unwrap_err();
        assert!(matches!(err, BotError::InvalidConfig(_)));

        let err = base().webhook_url("ftp://example.com").build().unwrap_err();
        assert!(err.to_string().contains("http(s)"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = base().decrypt_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, BotError::InvalidConfig(_)));
    }

    #[test]
    fn zero_sweep_disables() {
        let c = base().sweep_after_secs(0).build().unwrap();
        assert_eq!(c.sweep_after(), None);
    }

    #[test]
    fn debug_redacts_token() {
        let c = base().build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("123:ABC"), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
    }
}
