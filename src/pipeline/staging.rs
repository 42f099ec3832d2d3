//! In-memory staging of extraction results awaiting a patient link.
//!
//! Each intake session holds at most one pending batch. Staging into a session
//! replaces whatever it held before; sessions do not affect each other.
//! A session also keeps the drug records a partial link still owes to
//! prescriptions it created. Nothing here survives a restart.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::linking::PendingDrugs;
use crate::models::ExtractionEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Default)]
pub struct StagingStore {
    sessions: Mutex<HashMap<SessionId, Vec<ExtractionEntry>>>,
    owed: Mutex<HashMap<SessionId, Vec<PendingDrugs>>>,
}

impl StagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Vec<ExtractionEntry>>> {
        // Entries are only ever replaced whole, so a poisoned map is still consistent.
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn owed(&self) -> MutexGuard<'_, HashMap<SessionId, Vec<PendingDrugs>>> {
        self.owed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mint a fresh session id. The session is empty until something is staged.
    pub fn open_session(&self) -> SessionId {
        SessionId::new()
    }

    /// Stage `entries` for `session`, discarding anything staged there before.
    /// Returns the number of discarded entries.
    pub fn stage(&self, session: SessionId, entries: Vec<ExtractionEntry>) -> usize {
        let staged = entries.len();
        let discarded = self
            .sessions()
            .insert(session, entries)
            .map(|prior| prior.len())
            .unwrap_or(0);
        if discarded > 0 {
            tracing::debug!(%session, discarded, "Replaced previously staged extraction");
        }
        tracing::debug!(%session, staged, "Extraction staged");
        discarded
    }

    /// Copy of the staged entries; empty when nothing is staged.
    pub fn current(&self, session: SessionId) -> Vec<ExtractionEntry> {
        self.sessions().get(&session).cloned().unwrap_or_default()
    }

    /// Remove and return the staged entries.
    pub fn take(&self, session: SessionId) -> Vec<ExtractionEntry> {
        self.sessions().remove(&session).unwrap_or_default()
    }

    /// Drop the staged entries and any drug records still owed.
    pub fn clear(&self, session: SessionId) {
        if self.sessions().remove(&session).is_some() {
            tracing::debug!(%session, "Staged extraction cleared");
        }
        if self.owed().remove(&session).is_some() {
            tracing::debug!(%session, "Pending drug records dropped");
        }
    }

    /// Keep `pending` for `session`, replacing what was kept before.
    /// An empty list forgets the session's pending drugs.
    pub fn hold_drugs(&self, session: SessionId, pending: Vec<PendingDrugs>) {
        let mut owed = self.owed();
        if pending.is_empty() {
            owed.remove(&session);
        } else {
            tracing::debug!(%session, prescriptions = pending.len(), "Pending drug records held");
            owed.insert(session, pending);
        }
    }

    pub fn pending_drugs(&self, session: SessionId) -> Vec<PendingDrugs> {
        self.owed().get(&session).cloned().unwrap_or_default()
    }

    pub fn take_pending_drugs(&self, session: SessionId) -> Vec<PendingDrugs> {
        self.owed().remove(&session).unwrap_or_default()
    }

    pub fn is_staged(&self, session: SessionId) -> bool {
        self.sessions().get(&session).is_some_and(|e| !e.is_empty())
    }

    /// Number of sessions with a staged batch.
    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }
}
