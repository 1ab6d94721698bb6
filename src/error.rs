//! Error types for the pdf-unlock-bot library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BotError`]: an operation around the unlock flow failed (bad
//!   configuration, storage I/O, a transport call). The controller turns
//!   these into a generic user-facing message and tears the session down.
//!
//! * [`DecryptFailure`]: a single unlock attempt failed (wrong password,
//!   damaged file, tool timed out). This is an expected outcome, returned
//!   in the decryptor's `Result`; the session survives and the user may try
//!   another password.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by configuration, storage and transport operations.
#[derive(Debug, Error)]
pub enum BotError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// A required setting was not supplied.
    #[error("{name} is required")]
    MissingSetting { name: &'static str },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Storage errors ────────────────────────────────────────────────────
    /// Could not create, write or inspect a temporary file.
    #[error("Storage error at '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Transport errors ──────────────────────────────────────────────────
    /// Fetching an uploaded file from the messaging platform failed.
    #[error("Failed to download file '{file_id}': {reason}")]
    DownloadFailed { file_id: String, reason: String },

    /// Sending or editing a message or document failed.
    #[error("Failed to send to chat: {reason}")]
    SendFailed { reason: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BotError::Storage {
            path: path.into(),
            source,
        }
    }
}

/// Why an unlock attempt failed.
///
/// Advisory only: it feeds logs, while the conversation treats every
/// failure the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The password was wrong, or the file needs one and none was given.
    WrongOrMissingPassword,
    /// The input could not be opened or is not a readable PDF.
    CorruptOrUnreadableInput,
    /// Anything else: tool missing, timeout, unexpected exit status.
    Other,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::WrongOrMissingPassword => "wrong or missing password",
            FailureReason::CorruptOrUnreadableInput => "corrupt or unreadable input",
            FailureReason::Other => "other",
        };
        f.write_str(s)
    }
}

/// A failed unlock attempt.
#[derive(Debug, Clone, Error)]
#[error("unlock failed ({reason}): {detail}")]
pub struct DecryptFailure {
    pub reason: FailureReason,
    pub detail: String,
}

impl DecryptFailure {
    pub fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_setting_display() {
        let e = BotError::MissingSetting { name: "BOT_TOKEN" };
        assert_eq!(e.to_string(), "BOT_TOKEN is required");
    }

    #[test]
    fn storage_display_includes_path() {
        let e = BotError::storage(
            "/tmp/inbound/x.pdf",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = e.to_string();
        assert!(msg.contains("/tmp/inbound/x.pdf"), "got: {msg}");
        assert!(msg.contains("denied"), "got: {msg}");
    }

    #[test]
    fn download_failed_display() {
        let e = BotError::DownloadFailed {
            file_id: "BQAD".into(),
            reason: "HTTP 404".into(),
        };
        assert!(e.to_string().contains("BQAD"));
        assert!(e.to_string().contains("HTTP 404"));
    }

    #[test]
    fn decrypt_failure_display() {
        let e = DecryptFailure::new(FailureReason::WrongOrMissingPassword, "invalid password");
        let msg = e.to_string();
        assert!(msg.contains("wrong or missing password"), "got: {msg}");
        assert!(msg.contains("invalid password"), "got: {msg}");
    }
}
