use super::errors::ServiceBusError;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Lock bookkeeping of a session-bound handler.
///
/// A lost lock is permanent: once [`mark_lock_lost`](Self::mark_lock_lost)
/// has been called the session handle can never be used again.
#[derive(Debug)]
pub struct SessionState {
    session_id: String,
    lock_lost: AtomicBool,
    locked_until: Mutex<Option<DateTime<Utc>>>,
    auto_renew_error: Mutex<Option<ServiceBusError>>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            lock_lost: AtomicBool::new(false),
            locked_until: Mutex::new(None),
            auto_renew_error: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_lock_lost(&self) -> bool {
        self.lock_lost.load(Ordering::SeqCst)
    }

    pub fn mark_lock_lost(&self) {
        self.lock_lost.store(true, Ordering::SeqCst);
    }

    pub fn locked_until(&self) -> Option<DateTime<Utc>> {
        *self
            .locked_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the lock expiry reported by the service (e.g. after a renew).
    pub fn set_locked_until(&self, locked_until: DateTime<Utc>) {
        *self
            .locked_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(locked_until);
    }

    /// A lock that has not been renewed past its expiry.
    pub fn is_lock_expired(&self) -> bool {
        self.locked_until()
            .is_some_and(|locked_until| locked_until <= Utc::now())
    }

    /// Last error observed by the lock auto-renewer, if any.
    pub fn auto_renew_error(&self) -> Option<ServiceBusError> {
        self.auto_renew_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_auto_renew_error(&self, error: ServiceBusError) {
        *self
            .auto_renew_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }
}
