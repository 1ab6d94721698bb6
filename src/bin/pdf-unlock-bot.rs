//! CLI binary for pdf-unlock-bot.
//!
//! Maps flags and environment variables to `BotConfig`, wires the
//! components together and runs the bot until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use pdf_unlock_bot::config::DEFAULT_MAX_FILE_SIZE;
use pdf_unlock_bot::telegram::{self, TelegramTransport};
use pdf_unlock_bot::{BotConfig, Controller, FileStore, InMemorySessionStore, QpdfDecryptor};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::Bot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"USAGE:
  Users send the bot an encrypted PDF, then the password as

      password: <secret>

  either in the upload caption or as a separate message. The bot replies
  with an unlocked copy and deletes both files.

DELIVERY:
  With --webhook-url set, the bot listens on 0.0.0.0:<PORT> and registers
  <WEBHOOK_URL>/bot<TOKEN> with Telegram. Without it, the bot long-polls.

REQUIREMENTS:
  qpdf must be installed (apt install qpdf / brew install qpdf).
"#;

/// Telegram bot that removes the password from PDF files.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-unlock-bot",
    version,
    about = "Telegram bot that removes the password from PDF files",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Telegram Bot API token.
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Port for the webhook listener.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Public base URL for webhook delivery. Polling is used when unset.
    #[arg(long, env = "WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Directory for uploaded and unlocked files.
    #[arg(long, env = "PDF_UNLOCK_WORK_DIR", default_value = "data")]
    work_dir: PathBuf,

    /// Largest accepted upload, in bytes.
    #[arg(long, env = "PDF_UNLOCK_MAX_FILE_SIZE", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    max_file_size: u64,

    /// qpdf executable.
    #[arg(long = "qpdf", env = "PDF_UNLOCK_QPDF", default_value = "qpdf")]
    qpdf_path: PathBuf,

    /// Seconds before a qpdf run is killed.
    #[arg(long, env = "PDF_UNLOCK_DECRYPT_TIMEOUT", default_value_t = 60)]
    decrypt_timeout: u64,

    /// Seconds allowed for downloading an upload.
    #[arg(long, env = "PDF_UNLOCK_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// On startup, delete leftover files older than this many seconds (0 disables).
    #[arg(long, env = "PDF_UNLOCK_SWEEP_AFTER", default_value_t = 3600)]
    sweep_after: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_UNLOCK_VERBOSE")]
    verbose: bool,

    /// Log errors only.
    #[arg(short, long, env = "PDF_UNLOCK_QUIET")]
    quiet: bool,
}

impl Cli {
    fn to_config(&self) -> Result<BotConfig> {
        let mut builder = BotConfig::builder()
            .token(self.token.clone().unwrap_or_default())
            .port(self.port.unwrap_or(0))
            .work_dir(&self.work_dir)
            .max_file_size(self.max_file_size)
            .qpdf_path(&self.qpdf_path)
            .decrypt_timeout_secs(self.decrypt_timeout)
            .download_timeout_secs(self.download_timeout)
            .sweep_after_secs(self.sweep_after);
        if let Some(url) = &self.webhook_url {
            builder = builder.webhook_url(url.clone());
        }
        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.to_config()?;
    info!("Starting with {:?}", config);

    // ── Storage ──────────────────────────────────────────────────────────
    let files = FileStore::new(&config.work_dir);
    if let Some(max_age) = config.sweep_after() {
        match files.sweep_stale(max_age).await {
            Ok(0) => {}
            Ok(n) => info!("Removed {} leftover file(s) from a previous run", n),
            Err(e) => warn!("Startup sweep failed: {}", e),
        }
    }

    // ── Components ───────────────────────────────────────────────────────
    let bot = Bot::new(config.token.clone());
    let transport = TelegramTransport::new(bot.clone(), config.download_timeout())
        .context("Failed to build Telegram transport")?;
    let controller = Arc::new(Controller::new(
        Arc::new(InMemorySessionStore::new()),
        files,
        Arc::new(QpdfDecryptor::new(
            config.qpdf_path.clone(),
            config.decrypt_timeout(),
        )),
        Arc::new(transport),
        config.max_file_size,
    ));

    // ── Run ──────────────────────────────────────────────────────────────
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl-C");
    };
    let result = telegram::run(bot, controller.clone(), &config, shutdown).await;

    controller.shutdown().await;
    result.context("Bot stopped with an error")?;
    info!("Bye");
    Ok(())
}
