//! Password directive: the `password: <secret>` text users send.
//!
//! The same syntax is accepted in a plain message and in a document
//! caption. Matching is case-insensitive and line-based: the directive's
//! password is everything after the colon up to the end of that line,
//! trimmed.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use zeroize::Zeroizing;

static RE_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)password:[ \t]*([^\r\n]*)").unwrap());

/// A candidate PDF password. Wiped from memory on drop; never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(Zeroizing<String>);

impl Password {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Number of characters, for masked display.
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Result of scanning text for a password directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordDirective {
    /// Directive present with a non-empty password.
    Found(Password),
    /// Directive present but nothing after the colon.
    Empty,
    /// No directive in the text.
    Missing,
}

/// Scan `text` for the first `password:` directive.
pub fn parse_password_directive(text: &str) -> PasswordDirective {
    let Some(caps) = RE_DIRECTIVE.captures(text) else {
        return PasswordDirective::Missing;
    };
    let secret = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
    if secret.is_empty() {
        PasswordDirective::Empty
    } else {
        PasswordDirective::Found(Password::new(secret))
    }
}
