//! Per-user conversation state and the store that holds it.
//!
//! A [`Session`] records which step of the unlock flow a user is on. The
//! pending file travels inside the state variants that need it, so a
//! session waiting for a file cannot carry a stale path and a session
//! waiting for a password cannot lack one.
//!
//! The controller only sees the [`SessionStore`] trait. The shipped
//! [`InMemorySessionStore`] is a process-local `DashMap`: every operation is
//! atomic per key, nothing is persisted, and a restart forgets every
//! session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque identity of the user a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserKey(pub u64);

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flat view of a session's state, for status reporting and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    AwaitingFile,
    AwaitingPassword,
    Processing,
}

/// A stored upload waiting for its password. Owned by exactly one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub path: PathBuf,
    /// Name the user uploaded the file under.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    AwaitingFile,
    AwaitingPassword(PendingFile),
    Processing(PendingFile),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub state: SessionState,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session after `/start`.
    pub fn awaiting_file() -> Self {
        Self {
            state: SessionState::AwaitingFile,
            attempts: 0,
            created_at: Utc::now(),
        }
    }

    /// Fresh session for a newly stored upload.
    pub fn awaiting_password(file: PendingFile) -> Self {
        Self {
            state: SessionState::AwaitingPassword(file),
            attempts: 0,
            created_at: Utc::now(),
        }
    }

    pub fn step(&self) -> Step {
        match self.state {
            SessionState::AwaitingFile => Step::AwaitingFile,
            SessionState::AwaitingPassword(_) => Step::AwaitingPassword,
            SessionState::Processing(_) => Step::Processing,
        }
    }

    pub fn pending(&self) -> Option<&PendingFile> {
        match &self.state {
            SessionState::AwaitingFile => None,
            SessionState::AwaitingPassword(f) | SessionState::Processing(f) => Some(f),
        }
    }

    pub fn pending_path(&self) -> Option<&Path> {
        self.pending().map(|f| f.path.as_path())
    }

    /// Enter `Processing` for one unlock attempt, counting it.
    ///
    /// Returns `None` unless the session is waiting for a password.
    pub fn begin_attempt(&self) -> Option<Session> {
        match &self.state {
            SessionState::AwaitingPassword(f) => Some(Session {
                state: SessionState::Processing(f.clone()),
                attempts: self.attempts.saturating_add(1),
                created_at: self.created_at,
            }),
            _ => None,
        }
    }

    /// Leave `Processing` after a failed attempt, keeping the file and the
    /// attempt count.
    pub fn retry(&self) -> Option<Session> {
        match &self.state {
            SessionState::Processing(f) => Some(Session {
                state: SessionState::AwaitingPassword(f.clone()),
                attempts: self.attempts,
                created_at: self.created_at,
            }),
            _ => None,
        }
    }

    /// Whole seconds since the session was created.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds().max(0)
    }
}

/// Storage for sessions, keyed by user.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user: UserKey) -> Option<Session>;

    /// Insert or replace; returns the session that was replaced.
    async fn set(&self, user: UserKey, session: Session) -> Option<Session>;

    async fn remove(&self, user: UserKey) -> Option<Session>;

    /// Remove and return every session.
    async fn drain(&self) -> Vec<(UserKey, Session)>;

    async fn len(&self) -> usize;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<UserKey, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user: UserKey) -> Option<Session> {
        self.sessions.get(&user).map(|entry| entry.value().clone())
    }

    async fn set(&self, user: UserKey, session: Session) -> Option<Session> {
        self.sessions.insert(user, session)
    }

    async fn remove(&self, user: UserKey) -> Option<Session> {
        self.sessions.remove(&user).map(|(_, s)| s)
    }

    async fn drain(&self) -> Vec<(UserKey, Session)> {
        let keys: Vec<UserKey> = self.sessions.iter().map(|e| *e.key()).collect();
        keys.into_iter()
            .filter_map(|k| self.sessions.remove(&k))
            .collect()
    }

    async fn len(&self) -> usize {
        self.sessions.len()
    }
}
