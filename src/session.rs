//! # Session Store
//!
//! In-memory, per-user conversational state. Every user gets one
//! [`SessionHandle`]: the session itself behind an async mutex, plus a
//! non-blocking busy flag that rejects overlapping callback processing.
//!
//! Sessions live for the lifetime of the process and are never persisted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use teloxide::types::{ChatId, MessageId, UserId};
use tracing::debug;

use crate::dialogue::SessionMode;
use crate::navigator::ResultSet;

/// Where a product card was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CardRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Conversational state of one user
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    /// Language every outbound text is rendered in
    pub language: String,
    pub mode: SessionMode,
    pub results: ResultSet,
    /// The message currently showing the product card, if any
    ///
    /// A user may reach the bot from several chats, so the card is always
    /// addressed by the chat it was sent to.
    pub last_card: Option<CardRef>,
}

impl Session {
    pub fn new(user_id: UserId, language: &str) -> Self {
        Self {
            user_id,
            language: language.to_string(),
            mode: SessionMode::Idle,
            results: ResultSet::default(),
            last_card: None,
        }
    }
}

/// Shared handle to a user's session
#[derive(Debug)]
pub struct SessionHandle {
    user_id: UserId,
    busy: AtomicBool,
    state: tokio::sync::Mutex<Session>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self {
            user_id: session.user_id,
            busy: AtomicBool::new(false),
            state: tokio::sync::Mutex::new(session),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Lock the session for the duration of one event
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Session> {
        self.state.lock().await
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Marks a session as processing a callback until dropped
#[derive(Debug)]
pub struct ProcessingGuard {
    handle: Arc<SessionHandle>,
}

impl ProcessingGuard {
    pub fn release(self) {}
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.handle.busy.store(false, Ordering::Release);
        debug!(user_id = %self.handle.user_id, "Session released");
    }
}

/// Process-wide map from user to session
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Arc<SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // The map is only touched for lookups and inserts, so a poisoned lock
    // still holds a consistent map.
    fn sessions(&self) -> MutexGuard<'_, HashMap<UserId, Arc<SessionHandle>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The session of `user_id`, if one was created before
    pub fn get(&self, user_id: UserId) -> Option<Arc<SessionHandle>> {
        self.sessions().get(&user_id).cloned()
    }

    /// The session of `user_id`, created in `language` when absent
    ///
    /// When two events race to create the same session the first insert
    /// wins and both receive the same handle.
    pub fn get_or_create(&self, user_id: UserId, language: &str) -> Arc<SessionHandle> {
        let mut sessions = self.sessions();
        Arc::clone(sessions.entry(user_id).or_insert_with(|| {
            debug!(user_id = %user_id, language, "Session created");
            Arc::new(SessionHandle::new(Session::new(user_id, language)))
        }))
    }

    /// Atomically mark a session busy
    ///
    /// Returns `None` without waiting when another event already holds it.
    pub fn try_acquire(handle: &Arc<SessionHandle>) -> Option<ProcessingGuard> {
        handle
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProcessingGuard {
                handle: Arc::clone(handle),
            })
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}
