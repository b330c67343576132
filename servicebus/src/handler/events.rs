//! Observability hooks.
//!
//! The handler never logs on its own; it reports what happens to an
//! injected [`HandlerEventSink`]. [`LogEventSink`] forwards everything to the
//! `log` facade and is what handlers use unless told otherwise.

use super::errors::ServiceBusError;
use std::time::Duration;

/// Something noteworthy happened inside a handler.
#[derive(Debug)]
pub enum HandlerEvent<'a> {
    LinkOpened {
        container_id: &'a str,
        entity_path: &'a str,
    },
    LinkClosed {
        container_id: &'a str,
    },
    /// Tearing down the link failed; the link is dropped regardless.
    LinkCloseFailed {
        container_id: &'a str,
        error: &'a ServiceBusError,
    },
    ManagementRequest {
        container_id: &'a str,
        operation: &'a str,
        node: &'a str,
    },
    /// A failed attempt will be retried after `delay`.
    Retrying {
        entity: &'a str,
        attempt: u32,
        delay: Duration,
        error: &'a ServiceBusError,
    },
    /// The retry budget is spent.
    RetryExhausted {
        entity: &'a str,
        attempts: u32,
        error: &'a ServiceBusError,
    },
    /// The next backoff would overrun the operation deadline.
    RetryTimedOut {
        entity: &'a str,
        error: &'a ServiceBusError,
    },
    SessionLockLost {
        container_id: &'a str,
        session_id: &'a str,
        error: &'a ServiceBusError,
    },
}

/// Structured event sink injected into every handler.
pub trait HandlerEventSink: Send + Sync {
    fn emit(&self, event: &HandlerEvent<'_>);
}

/// Forwards handler events to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogEventSink;

impl HandlerEventSink for LogEventSink {
    fn emit(&self, event: &HandlerEvent<'_>) {
        match event {
            HandlerEvent::LinkOpened {
                container_id,
                entity_path,
            } => log::debug!("{container_id} opened link to '{entity_path}'"),
            HandlerEvent::LinkClosed { container_id } => {
                log::debug!("{container_id} closed its link")
            }
            HandlerEvent::LinkCloseFailed {
                container_id,
                error,
            } => log::warn!("{container_id} failed to close its link cleanly: {error}"),
            HandlerEvent::ManagementRequest {
                container_id,
                operation,
                node,
            } => log::debug!("{container_id} sending management operation '{operation}' to {node}"),
            HandlerEvent::Retrying {
                entity,
                attempt,
                delay,
                error,
            } => log::info!(
                "{entity} has an exception ({error}). Retrying attempt {attempt} in {delay:?}..."
            ),
            HandlerEvent::RetryExhausted {
                entity,
                attempts,
                error,
            } => log::info!(
                "{entity} operation has exhausted retry after {attempts} attempts. Last exception: {error}."
            ),
            HandlerEvent::RetryTimedOut { entity, error } => log::info!(
                "{entity} operation has timed out. Last exception before timeout is ({error})"
            ),
            HandlerEvent::SessionLockLost {
                container_id,
                session_id,
                error,
            } => log::warn!(
                "{container_id} lost the lock on session '{session_id}': {error}. A new session receiver is required."
            ),
        }
    }
}
