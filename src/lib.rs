//! # pdf-unlock-bot
//!
//! A Telegram bot that removes the password from PDF files.
//!
//! A user uploads an encrypted PDF, supplies its password (in the upload
//! caption or a follow-up message, as `password: <secret>`), and gets back
//! an unencrypted copy. Decryption is done by the external `qpdf` tool; the
//! bot keeps per-user conversation state and deletes every file it wrote
//! once the conversation ends.
//!
//! ## Flow
//!
//! ```text
//! Telegram update
//!  │
//!  ├─ 1. Translate  teloxide Message / CallbackQuery → Inbound event
//!  ├─ 2. Route      Controller looks up the user's Session
//!  ├─ 3. Store      download the upload into <work_dir>/inbound
//!  ├─ 4. Parse      find `password: …` in caption or text
//!  ├─ 5. Decrypt    qpdf --decrypt --password-file=- in out (with timeout)
//!  └─ 6. Deliver    send unlocked_<name>.pdf, delete both files, end session
//! ```
//!
//! A wrong password keeps the upload and returns the session to waiting,
//! so the user can try again without re-sending the file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pdf_unlock_bot::{
//!     telegram, BotConfig, Controller, FileStore, InMemorySessionStore, QpdfDecryptor,
//! };
//! use teloxide::Bot;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BotConfig::builder().token("123:abc").port(8080).build()?;
//!     let bot = Bot::new(config.token.clone());
//!     let controller = Arc::new(Controller::new(
//!         Arc::new(InMemorySessionStore::new()),
//!         FileStore::new(&config.work_dir),
//!         Arc::new(QpdfDecryptor::new(config.qpdf_path.clone(), config.decrypt_timeout())),
//!         Arc::new(telegram::TelegramTransport::new(bot.clone(), config.download_timeout())?),
//!         config.max_file_size,
//!     ));
//!     telegram::run(bot, controller.clone(), &config, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     controller.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-unlock-bot` binary (clap + anyhow + tracing-subscriber) |
//!
//! ## External tools
//!
//! `qpdf` must be installed and on `PATH` (or pointed to with `--qpdf`).

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod directive;
pub mod error;
pub mod pipeline;
pub mod replies;
pub mod session;
pub mod telegram;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BotConfig, BotConfigBuilder, DeliveryMode};
pub use controller::Controller;
pub use directive::{parse_password_directive, Password, PasswordDirective};
pub use error::{BotError, DecryptFailure, FailureReason};
pub use pipeline::decrypt::{Decryptor, QpdfDecryptor};
pub use pipeline::files::FileStore;
pub use session::{
    InMemorySessionStore, PendingFile, Session, SessionState, SessionStore, Step, UserKey,
};
pub use transport::{
    Button, CallbackAction, ChatRef, Command, DocumentInfo, EventKind, Inbound, Keyboard,
    MessageRef, Reply, Sender, Transport,
};
