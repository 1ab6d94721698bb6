//! The messaging seam: what the controller can ask of a chat platform, and
//! the platform-neutral shape of what arrives from it.
//!
//! [`crate::telegram`] implements [`Transport`] over the Bot API; the
//! integration tests implement it with a recorder.

use crate::error::BotError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

/// Conversation a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatRef(pub i64);

/// A message the bot sent earlier, for later edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef(pub i32);

/// Payload of an inline button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Help,
    About,
    Cancel,
    Start,
}

impl CallbackAction {
    pub fn as_str(self) -> &'static str {
        match self {
            CallbackAction::Help => "help",
            CallbackAction::About => "about",
            CallbackAction::Cancel => "cancel",
            CallbackAction::Start => "start",
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "help" => Some(CallbackAction::Help),
            "about" => Some(CallbackAction::About),
            "cancel" => Some(CallbackAction::Cancel),
            "start" => Some(CallbackAction::Start),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: CallbackAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: CallbackAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Rows of inline buttons.
pub type Keyboard = Vec<Vec<Button>>;

/// An outgoing text. `text` is HTML; anything user-supplied inside it must
/// already be escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Outbound operations the controller relies on.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, chat: ChatRef, reply: Reply) -> Result<MessageRef, BotError>;

    async fn edit_text(
        &self,
        chat: ChatRef,
        message: MessageRef,
        reply: Reply,
    ) -> Result<(), BotError>;

    /// Send the file at `path`, presented to the user as `file_name`.
    async fn send_document(
        &self,
        chat: ChatRef,
        path: &Path,
        file_name: &str,
    ) -> Result<(), BotError>;

    /// Fetch the contents of an uploaded file.
    async fn download(&self, file_id: &str) -> Result<Bytes, BotError>;
}

// ── Inbound events ───────────────────────────────────────────────────────

/// Who sent an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: u64,
    pub first_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Status,
    Cancel,
}

impl Command {
    /// Recognise a slash command in the first word of `text`.
    ///
    /// Accepts a `@botname` suffix and any letter case. Returns `None` for
    /// text that is not a command or names an unknown one.
    pub fn parse(text: &str) -> Option<Command> {
        let first = text.split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "status" => Some(Command::Status),
            "cancel" => Some(Command::Cancel),
            _ => None,
        }
    }
}

/// Metadata of an uploaded document, as announced before download.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentInfo {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    /// Declared size in bytes, when the platform reports one.
    pub size: Option<u64>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Command(Command),
    Document(DocumentInfo),
    Text(String),
    Callback(CallbackAction),
}

/// One inbound event, ready for the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub chat: ChatRef,
    pub sender: Option<Sender>,
    pub kind: EventKind,
}
