//! Telegram transport built on teloxide.
//!
//! Three jobs:
//!
//! 1. [`TelegramTransport`] implements [`Transport`] over the Bot API:
//!    HTML messages with inline keyboards, message edits, documents, and
//!    file downloads through `getFile` plus a plain `reqwest` GET against
//!    the file endpoint.
//! 2. [`event_from_message`] / [`event_from_callback`] translate teloxide
//!    updates into platform-neutral [`Inbound`] events.
//! 3. [`run`] wires a `Dispatcher` to the controller and serves updates by
//!    long polling or through teloxide's axum webhook listener, until the
//!    shutdown signal fires.

use crate::config::{BotConfig, DeliveryMode};
use crate::controller::Controller;
use crate::error::BotError;
use crate::transport::{
    CallbackAction, ChatRef, Command, DocumentInfo, EventKind, Inbound, Keyboard, MessageRef,
    Reply, Sender, Transport,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use teloxide::payloads::{EditMessageTextSetters, SendMessageSetters};
use teloxide::prelude::*;
use teloxide::types::{
    FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId, ParseMode,
};
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

/// Commands published to the Telegram client's command menu.
#[derive(BotCommands, Clone, Copy, Debug)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum MenuCommand {
    #[command(description = "start a new session")]
    Start,
    #[command(description = "show instructions")]
    Help,
    #[command(description = "check your current session")]
    Status,
    #[command(description = "cancel and delete your file")]
    Cancel,
}

/// [`Transport`] backed by a teloxide [`Bot`].
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
    http: reqwest::Client,
    file_base: String,
}

impl TelegramTransport {
    pub fn new(bot: Bot, download_timeout: Duration) -> Result<Self, BotError> {
        let http = reqwest::Client::builder()
            .timeout(download_timeout)
            .build()
            .map_err(|e| BotError::Internal(format!("HTTP client: {e}")))?;
        // Follows a custom Bot API server configured on the bot.
        let file_base = format!(
            "{}/file/bot{}",
            bot.api_url().as_str().trim_end_matches('/'),
            bot.token()
        );
        Ok(Self {
            bot,
            http,
            file_base,
        })
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/{}", self.file_base, file_path)
    }
}

fn markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.action.as_str()))
            .collect::<Vec<_>>()
    }))
}

fn send_failed(e: impl std::fmt::Display) -> BotError {
    BotError::SendFailed {
        reason: e.to_string(),
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, chat: ChatRef, reply: Reply) -> Result<MessageRef, BotError> {
        let mut request = self
            .bot
            .send_message(ChatId(chat.0), reply.text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = &reply.keyboard {
            request = request.reply_markup(markup(keyboard));
        }
        let sent = request.await.map_err(send_failed)?;
        Ok(MessageRef(sent.id.0))
    }

    async fn edit_text(
        &self,
        chat: ChatRef,
        message: MessageRef,
        reply: Reply,
    ) -> Result<(), BotError> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat.0), MessageId(message.0), reply.text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = &reply.keyboard {
            request = request.reply_markup(markup(keyboard));
        }
        request.await.map_err(send_failed)?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatRef,
        path: &Path,
        file_name: &str,
    ) -> Result<(), BotError> {
        let file = InputFile::file(path.to_path_buf()).file_name(file_name.to_string());
        self.bot
            .send_document(ChatId(chat.0), file)
            .await
            .map_err(send_failed)?;
        Ok(())
    }

    async fn download(&self, file_id: &str) -> Result<Bytes, BotError> {
        let failed = |reason: String| BotError::DownloadFailed {
            file_id: file_id.to_string(),
            reason,
        };

        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| failed(e.to_string()))?;

        let url = self.file_url(&file.path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| failed(e.without_url().to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| failed(e.without_url().to_string()))?;
        debug!("Downloaded {} bytes for {}", bytes.len(), file_id);
        Ok(bytes)
    }
}

// ── Update translation ───────────────────────────────────────────────────

/// Translate a message update. `None` for messages the bot ignores
/// (stickers, photos, unknown slash commands).
pub fn event_from_message(msg: &Message) -> Option<Inbound> {
    let sender = msg.from.as_ref().map(|u| Sender {
        id: u.id.0,
        first_name: u.first_name.clone(),
    });

    let kind = if let Some(doc) = msg.document() {
        EventKind::Document(DocumentInfo {
            file_id: doc.file.id.to_string(),
            file_name: doc.file_name.clone(),
            mime_type: doc.mime_type.as_ref().map(|m| m.to_string()),
            size: Some(u64::from(doc.file.size)).filter(|&s| s > 0),
            caption: msg.caption().map(str::to_string),
        })
    } else if let Some(text) = msg.text() {
        if text.trim_start().starts_with('/') {
            EventKind::Command(Command::parse(text)?)
        } else {
            EventKind::Text(text.to_string())
        }
    } else {
        return None;
    };

    Some(Inbound {
        chat: ChatRef(msg.chat.id.0),
        sender,
        kind,
    })
}

/// Translate a button press. `None` for unknown payloads.
pub fn event_from_callback(query: &CallbackQuery) -> Option<Inbound> {
    let action = CallbackAction::parse(query.data.as_deref()?)?;
    // Without the originating message, a private chat's id is the user's id.
    let chat = query
        .message
        .as_ref()
        .map(|m| m.chat().id.0)
        .unwrap_or(query.from.id.0 as i64);
    Some(Inbound {
        chat: ChatRef(chat),
        sender: Some(Sender {
            id: query.from.id.0,
            first_name: query.from.first_name.clone(),
        }),
        kind: EventKind::Callback(action),
    })
}

async fn on_message(msg: Message, controller: Arc<Controller>) -> ResponseResult<()> {
    match event_from_message(&msg) {
        Some(event) => controller.handle(event).await,
        None => debug!("Ignoring message {} in chat {}", msg.id.0, msg.chat.id.0),
    }
    Ok(())
}

async fn on_callback(
    bot: Bot,
    query: CallbackQuery,
    controller: Arc<Controller>,
) -> ResponseResult<()> {
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!("Failed to answer callback query: {}", e);
    }
    match event_from_callback(&query) {
        Some(event) => controller.handle(event).await,
        None => debug!("Ignoring callback payload {:?}", query.data),
    }
    Ok(())
}

// ── Delivery ─────────────────────────────────────────────────────────────

/// Serve updates until `shutdown` resolves.
///
/// Webhook mode binds `0.0.0.0:<port>` and registers the derived webhook
/// URL with Telegram; polling mode ignores the port.
pub async fn run(
    bot: Bot,
    controller: Arc<Controller>,
    config: &BotConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BotError> {
    if let Err(e) = bot.set_my_commands(MenuCommand::bot_commands()).await {
        warn!("Could not publish command list: {}", e);
    }

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![controller])
        .default_handler(|update| async move {
            debug!("Unhandled update {:?}", update.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .build();

    let token = dispatcher.shutdown_token();
    tokio::spawn(async move {
        shutdown.await;
        info!("Shutting down dispatcher");
        match token.shutdown() {
            Ok(done) => done.await,
            Err(e) => warn!("Dispatcher was not running: {}", e),
        }
    });

    match config.delivery_mode() {
        DeliveryMode::Webhook { url } => {
            let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
            info!("Bot running via webhook on {}", addr);
            let listener = webhooks::axum(bot, webhooks::Options::new(addr, url))
                .await
                .map_err(|e| BotError::Internal(format!("webhook setup failed: {e}")))?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("Webhook listener error"),
                )
                .await;
        }
        DeliveryMode::Polling => {
            info!("No webhook URL configured; bot running in polling mode");
            dispatcher.dispatch().await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Button;

    fn message(extra: &str) -> Message {
        let json = format!(
            r#"{{
                "message_id": 10,
                "date": 1700000000,
                "chat": {{"id": 42, "type": "private", "first_name": "Ann"}},
                "from": {{"id": 42, "is_bot": false, "first_name": "Ann"}},
                {extra}
            }}"#
        );
        serde_json::from_str(&json).expect("valid message JSON")
    }

    #[test]
    fn document_with_caption() {
        let msg = message(
            r#""document": {
                    "file_id": "BQAD",
                    "file_unique_id": "AgAD",
                    "file_name": "report.pdf",
                    "mime_type": "application/pdf",
                    "file_size": 2048
                },
                "caption": "password: correctpass""#,
        );
        let event = event_from_message(&msg).unwrap();
        assert_eq!(event.chat, ChatRef(42));
        assert_eq!(event.sender.as_ref().unwrap().id, 42);
        match event.kind {
            EventKind::Document(doc) => {
                assert_eq!(doc.file_id, "BQAD");
                assert_eq!(doc.file_name.as_deref(), Some("report.pdf"));
                assert_eq!(doc.mime_type.as_deref(), Some("application/pdf"));
                assert_eq!(doc.size, Some(2048));
                assert_eq!(doc.caption.as_deref(), Some("password: correctpass"));
            }
            other => panic!("expected document, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_and_commands() {
        let text = event_from_message(&message(r#""text": "password: abc""#)).unwrap();
        assert_eq!(text.kind, EventKind::Text("password: abc".into()));

        let cmd = event_from_message(&message(r#""text": "/status""#)).unwrap();
        assert_eq!(cmd.kind, EventKind::Command(Command::Status));

        assert!(event_from_message(&message(r#""text": "/frobnicate""#)).is_none());
    }

    #[test]
    fn callback_without_message_uses_sender_chat() {
        let query: CallbackQuery = serde_json::from_str(
            r#"{
                "id": "4382",
                "from": {"id": 42, "is_bot": false, "first_name": "Ann"},
                "chat_instance": "-1",
                "data": "cancel"
            }"#,
        )
        .unwrap();
        let event = event_from_callback(&query).unwrap();
        assert_eq!(event.chat, ChatRef(42));
        assert_eq!(event.kind, EventKind::Callback(CallbackAction::Cancel));
    }

    #[test]
    fn unknown_callback_ignored() {
        let query: CallbackQuery = serde_json::from_str(
            r#"{
                "id": "4383",
                "from": {"id": 42, "is_bot": false, "first_name": "Ann"},
                "chat_instance": "-1",
                "data": "launch-missiles"
            }"#,
        )
        .unwrap();
        assert!(event_from_callback(&query).is_none());
    }

    #[test]
    fn keyboard_markup_carries_payloads() {
        let kb = vec![vec![
            Button::new("Help", CallbackAction::Help),
            Button::new("Cancel", CallbackAction::Cancel),
        ]];
        let m = markup(&kb);
        assert_eq!(m.inline_keyboard.len(), 1);
        assert_eq!(m.inline_keyboard[0].len(), 2);
        assert_eq!(m.inline_keyboard[0][1].text, "Cancel");
    }

    #[test]
    fn file_url_uses_bot_api_server() {
        let hosted = TelegramTransport::new(Bot::new("123:abc"), Duration::from_secs(5)).unwrap();
        assert_eq!(
            hosted.file_url("documents/file_7.pdf"),
            "https://api.telegram.org/file/bot123:abc/documents/file_7.pdf"
        );

        let local = reqwest::Url::parse("http://localhost:8081").unwrap();
        let bot = Bot::new("123:abc").set_api_url(local);
        let own = TelegramTransport::new(bot, Duration::from_secs(5)).unwrap();
        assert_eq!(
            own.file_url("documents/file_7.pdf"),
            "http://localhost:8081/file/bot123:abc/documents/file_7.pdf"
        );
    }

    #[test]
    fn menu_lists_all_commands() {
        let names: Vec<String> = MenuCommand::bot_commands()
            .into_iter()
            .map(|c| c.command.trim_start_matches('/').to_string())
            .collect();
        assert_eq!(names, vec!["start", "help", "status", "cancel"]);
    }
}
