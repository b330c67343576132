use std::fmt;
use thiserror::Error;

/// Broad category of a raw failure reported by the AMQP transport.
///
/// The transport reports what went wrong on the wire; turning that into a
/// [`ServiceBusError`](crate::handler::ServiceBusError) with retry semantics
/// is the job of the error classification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmqpErrorKind {
    /// The transport gave up waiting for a response.
    Timeout,
    /// The connection was closed by the peer or dropped.
    ConnectionClosed,
    /// The AMQP session ended underneath the link.
    SessionEnded,
    /// The link was detached by the service.
    LinkDetached,
    /// CBS token negotiation was rejected.
    AuthenticationFailed,
    /// Any other protocol level error.
    Protocol,
}

impl fmt::Display for AmqpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AmqpErrorKind::Timeout => "timeout",
            AmqpErrorKind::ConnectionClosed => "connection closed",
            AmqpErrorKind::SessionEnded => "session ended",
            AmqpErrorKind::LinkDetached => "link detached",
            AmqpErrorKind::AuthenticationFailed => "authentication failed",
            AmqpErrorKind::Protocol => "protocol",
        };
        f.write_str(name)
    }
}

/// Unclassified error raised by the AMQP transport collaborator.
///
/// # Examples
///
/// ```no_run
/// use servicebus::common::{AmqpError, AmqpErrorKind};
///
/// let error = AmqpError::new(AmqpErrorKind::LinkDetached, "link force detached")
///     .with_condition("amqp:link:detach-forced");
/// assert!(error.retryable);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("AMQP {kind} error: {description}")]
pub struct AmqpError {
    pub kind: AmqpErrorKind,
    /// Symbolic AMQP error condition, e.g. `com.microsoft:server-busy`.
    pub condition: Option<String>,
    pub description: String,
    /// Transport's own opinion on whether the failure is transient.
    pub retryable: bool,
}

impl AmqpError {
    pub fn new(kind: AmqpErrorKind, description: impl Into<String>) -> Self {
        let retryable = matches!(
            kind,
            AmqpErrorKind::Timeout
                | AmqpErrorKind::ConnectionClosed
                | AmqpErrorKind::SessionEnded
                | AmqpErrorKind::LinkDetached
        );
        Self {
            kind,
            condition: None,
            description: description.into(),
            retryable,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn timeout(description: impl Into<String>) -> Self {
        Self::new(AmqpErrorKind::Timeout, description)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == AmqpErrorKind::Timeout
    }

    /// Whether the failure tore down the connection, session or link.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self.kind,
            AmqpErrorKind::ConnectionClosed
                | AmqpErrorKind::SessionEnded
                | AmqpErrorKind::LinkDetached
        )
    }
}

impl From<tokio::time::error::Elapsed> for AmqpError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AmqpError::timeout(err.to_string())
    }
}
