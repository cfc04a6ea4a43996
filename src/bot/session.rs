//! In-memory conversation sessions and pending receipt requests.
//!
//! Both maps are transient by design: a restart drops half-finished
//! conversations and unresolved receipt requests, while committed data lives
//! in the SQLite store.

use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::bot::texts::Language;

/// Where a conversation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingLanguage,
    AwaitingRoomNumber,
    AwaitingElectricity,
    AwaitingWater,
    AwaitingClearConfirm,
}

/// Readings collected so far during a submission flow.
#[derive(Debug, Clone, Default)]
pub struct PendingData {
    pub room_number: Option<String>,
    pub electricity: Option<f64>,
}

/// One user's in-flight conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub state: SessionState,
    pub language: Language,
    pub data: PendingData,
}

impl Session {
    pub fn new(state: SessionState, language: Language) -> Self {
        Self {
            state,
            language,
            data: PendingData::default(),
        }
    }
}

/// Sessions keyed by chat id.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<i64, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, chat_id: i64) -> Option<Session> {
        self.sessions.lock().await.get(&chat_id).cloned()
    }

    /// Insert or replace the session for a chat.
    pub async fn set(&self, chat_id: i64, session: Session) {
        self.sessions.lock().await.insert(chat_id, session);
    }

    pub async fn remove(&self, chat_id: i64) {
        self.sessions.lock().await.remove(&chat_id);
    }
}

/// A submission waiting for its receipt image to show up.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReceipt {
    pub room_number: String,
    pub language: Language,
}

/// Pending receipt requests keyed by chat id. A chat can wait for at most one
/// receipt; a new submission replaces the old request.
#[derive(Default)]
pub struct PendingReceipts {
    pending: Mutex<HashMap<i64, PendingReceipt>>,
}

impl PendingReceipts {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, chat_id: i64, room_number: String, language: Language) {
        let entry = PendingReceipt {
            room_number,
            language,
        };
        self.pending.lock().await.insert(chat_id, entry);
    }

    pub async fn remove(&self, chat_id: i64) {
        self.pending.lock().await.remove(&chat_id);
    }

    /// Copy of the current pending set. Dispatcher ticks iterate the copy so
    /// the lock is never held across awaits.
    pub async fn snapshot(&self) -> Vec<(i64, PendingReceipt)> {
        self.pending
            .lock()
            .await
            .iter()
            .map(|(chat_id, entry)| (*chat_id, entry.clone()))
            .collect()
    }

    #[cfg(test)]
    pub async fn contains(&self, chat_id: i64) -> bool {
        self.pending.lock().await.contains_key(&chat_id)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }
}
