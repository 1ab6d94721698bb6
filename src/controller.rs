//! The conversation state machine.
//!
//! [`Controller::handle`] takes one [`Inbound`] event, consults the
//! session store, drives the file store and decryptor, writes the new
//! session state back and answers through the transport.
//!
//! ```text
//!            /start                upload (valid PDF)
//!  (none) ─────────▶ AwaitingFile ───────────────────▶ AwaitingPassword ◀──┐
//!     ▲                                                  │ password         │ failure
//!     │ success / cancel / error                         ▼                  │
//!     └──────────────────────────────────────────── Processing ─────────────┘
//! ```
//!
//! ## Failure handling
//!
//! Every external call is caught where it is made and turned into a reply.
//! Transport and storage errors end the session and delete its files; a
//! failed decryption keeps the uploaded file so the user can try another
//! password. Cleanup problems are logged and never surface to the user.
//!
//! ## Concurrency
//!
//! Handling is read-modify-write against the store across `.await` points
//! with no per-user lock. Two events for the same user handled at the same
//! time can interleave and the later write wins. The Telegram dispatcher
//! delivers one chat's updates in order, which keeps this from happening
//! in practice for private chats, but the controller itself does not
//! guarantee it.

use crate::directive::{parse_password_directive, Password, PasswordDirective};
use crate::pipeline::decrypt::Decryptor;
use crate::pipeline::files::{unlocked_name, FileStore};
use crate::replies;
use crate::session::{PendingFile, Session, SessionState, SessionStore, UserKey};
use crate::transport::{
    CallbackAction, ChatRef, Command, DocumentInfo, EventKind, Inbound, MessageRef, Reply, Sender,
    Transport,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const PDF_MIME: &str = "application/pdf";

pub struct Controller {
    sessions: Arc<dyn SessionStore>,
    files: FileStore,
    decryptor: Arc<dyn Decryptor>,
    transport: Arc<dyn Transport>,
    max_file_size: u64,
}

impl Controller {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        files: FileStore,
        decryptor: Arc<dyn Decryptor>,
        transport: Arc<dyn Transport>,
        max_file_size: u64,
    ) -> Self {
        Self {
            sessions,
            files,
            decryptor,
            transport,
            max_file_size,
        }
    }

    /// Handle one inbound event to completion.
    pub async fn handle(&self, event: Inbound) {
        let Inbound { chat, sender, kind } = event;

        // Informational events need no identity.
        match &kind {
            EventKind::Command(Command::Help) => {
                self.reply(chat, replies::help(self.max_file_size)).await;
                return;
            }
            EventKind::Callback(CallbackAction::Help) => {
                self.reply(chat, replies::quick_help()).await;
                return;
            }
            EventKind::Callback(CallbackAction::About) => {
                self.reply(chat, replies::about()).await;
                return;
            }
            EventKind::Callback(CallbackAction::Start) => {
                self.reply(chat, replies::start_prompt()).await;
                return;
            }
            _ => {}
        }

        let Some(sender) = sender else {
            warn!("Event without sender in chat {}", chat.0);
            self.reply(chat, replies::identify_error()).await;
            return;
        };
        let user = UserKey(sender.id);

        match kind {
            EventKind::Command(Command::Start) => self.on_start(chat, user, &sender).await,
            EventKind::Command(Command::Status) => self.on_status(chat, user).await,
            EventKind::Command(Command::Cancel) | EventKind::Callback(CallbackAction::Cancel) => {
                self.on_cancel(chat, user).await
            }
            EventKind::Document(doc) => self.on_document(chat, user, doc).await,
            EventKind::Text(text) => self.on_text(chat, user, &text).await,
            EventKind::Command(Command::Help)
            | EventKind::Callback(CallbackAction::Help)
            | EventKind::Callback(CallbackAction::About)
            | EventKind::Callback(CallbackAction::Start) => {}
        }
    }

    /// Delete every session's owned file. Called once on shutdown.
    pub async fn shutdown(&self) {
        info!("Cleaning up {} session(s)", self.sessions.len().await);
        for (user, session) in self.sessions.drain().await {
            if let Some(path) = session.pending_path() {
                self.files.delete(path).await;
                info!("Cleaned up file for user {}", user);
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────────

    async fn on_start(&self, chat: ChatRef, user: UserKey, sender: &Sender) {
        if let Some(old) = self.sessions.set(user, Session::awaiting_file()).await {
            self.discard(&old).await;
        }
        self.reply(chat, replies::welcome(&sender.first_name)).await;
    }

    async fn on_status(&self, chat: ChatRef, user: UserKey) {
        let reply = match self.sessions.get(user).await {
            Some(session) => replies::status(&session, Utc::now()),
            None => replies::no_session(),
        };
        self.reply(chat, reply).await;
    }

    async fn on_cancel(&self, chat: ChatRef, user: UserKey) {
        if let Some(session) = self.sessions.remove(user).await {
            self.discard(&session).await;
            info!("User {} cancelled", user);
        }
        self.reply(chat, replies::cancelled()).await;
    }

    // ── Uploads ──────────────────────────────────────────────────────────

    async fn on_document(&self, chat: ChatRef, user: UserKey, doc: DocumentInfo) {
        let is_pdf = doc
            .mime_type
            .as_deref()
            .is_some_and(|m| m.starts_with(PDF_MIME));
        let name = match doc.file_name.as_deref() {
            Some(name) if is_pdf && !doc.file_id.is_empty() => name.to_string(),
            _ => {
                debug!("User {} sent a non-PDF document", user);
                self.reply(chat, replies::invalid_file_type()).await;
                return;
            }
        };
        if let Some(size) = doc.size.filter(|&s| s > self.max_file_size) {
            info!("User {} sent {} bytes, over the limit", user, size);
            self.reply(chat, replies::file_too_large(size, self.max_file_size))
                .await;
            return;
        }

        let progress = self.send(chat, replies::downloading(&name, doc.size)).await;

        let stored = match self.transport.download(&doc.file_id).await {
            Ok(bytes) => self.files.store_inbound(&bytes, &name).await,
            Err(e) => Err(e),
        };
        let path = match stored {
            Ok(path) => path,
            Err(e) => {
                error!("Download for user {} failed: {}", user, e);
                self.reply(chat, replies::download_failed()).await;
                if let Some(session) = self.sessions.remove(user).await {
                    self.discard(&session).await;
                }
                return;
            }
        };
        info!("User {} uploaded '{}'", user, name);

        let session = Session::awaiting_password(PendingFile {
            path,
            name: name.clone(),
        });
        if let Some(old) = self.sessions.set(user, session.clone()).await {
            self.discard(&old).await;
        }

        if let Some(msg) = progress {
            self.edit(chat, msg, replies::download_complete(&name, doc.size))
                .await;
        }

        match doc.caption.as_deref().map(parse_password_directive) {
            Some(PasswordDirective::Found(password)) => {
                self.reply(chat, replies::password_in_caption()).await;
                self.attempt_unlock(chat, user, session, password).await;
            }
            Some(PasswordDirective::Empty) => {
                self.reply(chat, replies::empty_password()).await;
            }
            Some(PasswordDirective::Missing) | None => {
                self.reply(chat, replies::password_required(&name)).await;
            }
        }
    }

    // ── Text ─────────────────────────────────────────────────────────────

    async fn on_text(&self, chat: ChatRef, user: UserKey, text: &str) {
        let session = match self.sessions.get(user).await {
            Some(s) => s,
            None => {
                self.reply(chat, replies::no_pdf()).await;
                return;
            }
        };

        match session.state {
            SessionState::AwaitingFile => {
                self.reply(chat, replies::no_pdf()).await;
            }
            SessionState::Processing(_) => {
                self.reply(chat, replies::still_processing()).await;
            }
            SessionState::AwaitingPassword(_) => match parse_password_directive(text) {
                PasswordDirective::Found(password) => {
                    self.attempt_unlock(chat, user, session, password).await;
                }
                PasswordDirective::Empty => {
                    self.reply(chat, replies::empty_password()).await;
                }
                PasswordDirective::Missing => {
                    self.reply(chat, replies::invalid_format(text)).await;
                }
            },
        }
    }

    // ── Unlock attempt ───────────────────────────────────────────────────

    /// Run one attempt for a session that is waiting for a password.
    ///
    /// Success removes the session and both files. A decryption failure
    /// puts the session back to waiting with the attempt counted and the
    /// input kept. Any other failure removes the session and both files.
    async fn attempt_unlock(
        &self,
        chat: ChatRef,
        user: UserKey,
        session: Session,
        password: Password,
    ) {
        let Some(busy) = session.begin_attempt() else {
            warn!("User {} is not waiting for a password", user);
            return;
        };
        let Some(pending) = busy.pending().cloned() else {
            return;
        };
        self.sessions.set(user, busy.clone()).await;
        info!("User {}: attempt {} on '{}'", user, busy.attempts, pending.name);

        let progress = self
            .send(chat, replies::processing(&pending.name, password.char_count()))
            .await;

        let output = match self.files.reserve_outbound(&pending.name).await {
            Ok(path) => path,
            Err(e) => {
                error!("No output path for user {}: {}", user, e);
                self.abort(chat, user, &pending, progress).await;
                return;
            }
        };

        match self.decryptor.unlock(&pending.path, &output, &password).await {
            Ok(()) => {
                let sent = self
                    .transport
                    .send_document(chat, &output, &unlocked_name(&pending.name))
                    .await;
                self.files.delete(&output).await;
                match sent {
                    Ok(()) => {
                        self.files.delete(&pending.path).await;
                        self.sessions.remove(user).await;
                        info!("User {}: '{}' unlocked and sent", user, pending.name);
                        self.show(chat, progress, replies::unlocked(&pending.name))
                            .await;
                    }
                    Err(e) => {
                        error!("Sending unlocked file to user {} failed: {}", user, e);
                        self.abort(chat, user, &pending, progress).await;
                    }
                }
            }
            Err(failure) => {
                info!(
                    "User {}: attempt {} failed ({})",
                    user, busy.attempts, failure.reason
                );
                self.files.delete(&output).await;
                if let Some(waiting) = busy.retry() {
                    self.sessions.set(user, waiting).await;
                }
                self.show(
                    chat,
                    progress,
                    replies::unlock_failed(&pending.name, busy.attempts),
                )
                .await;
            }
        }
    }

    /// Tear down after an unexpected error mid-attempt.
    async fn abort(
        &self,
        chat: ChatRef,
        user: UserKey,
        pending: &PendingFile,
        progress: Option<MessageRef>,
    ) {
        self.files.delete(&pending.path).await;
        self.sessions.remove(user).await;
        self.show(chat, progress, replies::processing_error(&pending.name))
            .await;
    }

    /// Delete the file a discarded session owned.
    async fn discard(&self, session: &Session) {
        if let Some(path) = session.pending_path() {
            self.files.delete(path).await;
        }
    }

    // ── Transport helpers ────────────────────────────────────────────────

    async fn send(&self, chat: ChatRef, reply: Reply) -> Option<MessageRef> {
        match self.transport.send_text(chat, reply).await {
            Ok(msg) => Some(msg),
            Err(e) => {
                warn!("Failed to message chat {}: {}", chat.0, e);
                None
            }
        }
    }

    async fn reply(&self, chat: ChatRef, reply: Reply) {
        self.send(chat, reply).await;
    }

    async fn edit(&self, chat: ChatRef, message: MessageRef, reply: Reply) {
        if let Err(e) = self.transport.edit_text(chat, message, reply).await {
            warn!("Failed to edit message in chat {}: {}", chat.0, e);
        }
    }

    /// Edit the progress message into `reply`, or send it fresh if there
    /// is no progress message or the edit fails.
    async fn show(&self, chat: ChatRef, progress: Option<MessageRef>, reply: Reply) {
        if let Some(msg) = progress {
            match self.transport.edit_text(chat, msg, reply.clone()).await {
                Ok(()) => return,
                Err(e) => warn!("Failed to edit message in chat {}: {}", chat.0, e),
            }
        }
        self.reply(chat, reply).await;
    }
}
