use crate::common::constants::{
    CONDITION_ENTITY_NOT_FOUND, CONDITION_MESSAGE_LOCK_LOST, CONDITION_MESSAGE_SIZE_EXCEEDED,
    CONDITION_NOT_FOUND, CONDITION_SERVER_BUSY, CONDITION_SESSION_CANNOT_BE_LOCKED,
    CONDITION_SESSION_LOCK_LOST, CONDITION_TIMEOUT, CONDITION_UNAUTHORIZED_ACCESS,
    OPERATION_TIMEOUT_REMEDIATION, SESSION_LOCK_LOST_MESSAGE,
};
use crate::common::{AmqpError, AmqpErrorKind};
use thiserror::Error;

/// Typed error surfaced by the handler.
///
/// Every variant carries two classification flags, exposed through
/// [`retryable`](ServiceBusError::retryable) and
/// [`shutdown_handler`](ServiceBusError::shutdown_handler):
///
/// | Variant                 | retryable | shutdown_handler |
/// |-------------------------|-----------|------------------|
/// | `Connection`            | yes       | yes              |
/// | `ServerBusy`            | yes       | no               |
/// | `OperationTimeout`      | yes       | no               |
/// | `SessionCannotBeLocked` | yes       | yes              |
/// | `Authentication`        | no        | yes              |
/// | `EntityNotFound`        | no        | yes              |
/// | `SessionLockLost`       | no        | no               |
/// | `Transport`             | flag      | flag             |
/// | `Amqp` (unclassified)   | transport | yes              |
///
/// All remaining variants are neither retryable nor tear down the link.
///
/// Wrapped errors keep their origin in `caused_by`, which is also what
/// [`std::error::Error::source`] returns.
#[derive(Debug, Clone, Error)]
pub enum ServiceBusError {
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        caused_by: Option<Box<ServiceBusError>>,
    },

    #[error("Server busy: {message}")]
    ServerBusy { message: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Messaging entity not found: {message}")]
    EntityNotFound { message: String },

    #[error("Message lock lost: {message}")]
    MessageLockLost { message: String },

    #[error("Message size exceeded: {message}")]
    MessageSizeExceeded { message: String },

    #[error("Session lock lost: {message}")]
    SessionLockLost {
        message: String,
        #[source]
        caused_by: Option<Box<ServiceBusError>>,
    },

    #[error("Session cannot be locked: {message}")]
    SessionCannotBeLocked { message: String },

    #[error("Operation timeout: {message}")]
    OperationTimeout {
        message: String,
        #[source]
        caused_by: Option<Box<ServiceBusError>>,
    },

    /// The handler was closed; a new instance is required.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Transport-classified error with explicit flags.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        condition: Option<String>,
        retryable: bool,
        shutdown_handler: bool,
    },

    /// Raw transport error that has not been classified yet.
    #[error(transparent)]
    Amqp(#[from] AmqpError),

    /// The caller stopped an iteration; never retried.
    #[error("Iteration stopped")]
    IterationStopped,

    /// A required component is unavailable; never retried.
    #[error("Missing dependency: {0}")]
    MissingDependency(String),
}

impl ServiceBusError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            caused_by: None,
        }
    }

    pub fn operation_timeout(message: impl Into<String>) -> Self {
        Self::OperationTimeout {
            message: message.into(),
            caused_by: None,
        }
    }

    /// Wraps a timeout that exhausted the retry budget with remediation text.
    pub fn timeout_with_remediation(last_error: ServiceBusError) -> Self {
        Self::OperationTimeout {
            message: OPERATION_TIMEOUT_REMEDIATION.to_string(),
            caused_by: Some(Box::new(last_error)),
        }
    }

    /// Session lock lost, optionally carrying the last auto-renew failure.
    pub fn session_lock_lost(caused_by: Option<ServiceBusError>) -> Self {
        Self::SessionLockLost {
            message: SESSION_LOCK_LOST_MESSAGE.to_string(),
            caused_by: caused_by.map(Box::new),
        }
    }

    pub fn retryable(&self) -> bool {
        match self {
            Self::Connection { .. }
            | Self::ServerBusy { .. }
            | Self::OperationTimeout { .. }
            | Self::SessionCannotBeLocked { .. } => true,
            Self::Transport { retryable, .. } => *retryable,
            Self::Amqp(raw) => raw.retryable,
            _ => false,
        }
    }

    pub fn shutdown_handler(&self) -> bool {
        match self {
            Self::Connection { .. }
            | Self::SessionCannotBeLocked { .. }
            | Self::Authentication { .. }
            | Self::EntityNotFound { .. }
            | Self::Amqp(_) => true,
            Self::Transport {
                shutdown_handler, ..
            } => *shutdown_handler,
            _ => false,
        }
    }

    /// Signals that bypass retry handling entirely.
    pub fn is_abort_signal(&self) -> bool {
        matches!(self, Self::IterationStopped | Self::MissingDependency(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::OperationTimeout { .. })
    }

    /// Errors that invalidate a running session receiver.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::SessionLockLost { .. } | Self::Connection { .. })
    }

    pub fn caused_by(&self) -> Option<&ServiceBusError> {
        match self {
            Self::Connection { caused_by, .. }
            | Self::SessionLockLost { caused_by, .. }
            | Self::OperationTimeout { caused_by, .. } => caused_by.as_deref(),
            _ => None,
        }
    }
}

// Result type alias for convenience
pub type ServiceBusResult<T> = Result<T, ServiceBusError>;

/// Default mapping from raw transport failures to typed errors.
///
/// Already classified errors pass through untouched. Raw [`AmqpError`]s are
/// mapped by their AMQP condition first and by their kind second. When a
/// custom endpoint is configured, connection-class messages name it so the
/// caller can tell a proxy problem from a service problem.
pub fn create_servicebus_exception(
    error: ServiceBusError,
    custom_endpoint_address: Option<&str>,
) -> ServiceBusError {
    match error {
        ServiceBusError::Amqp(raw) => classify_amqp_error(raw, custom_endpoint_address),
        other => other,
    }
}

fn classify_amqp_error(raw: AmqpError, custom_endpoint_address: Option<&str>) -> ServiceBusError {
    let message = raw.description.clone();
    let condition = raw.condition.clone();

    match condition.as_deref() {
        Some(CONDITION_SERVER_BUSY) => return ServiceBusError::ServerBusy { message },
        Some(CONDITION_NOT_FOUND | CONDITION_ENTITY_NOT_FOUND) => {
            return ServiceBusError::EntityNotFound { message };
        }
        Some(CONDITION_SESSION_LOCK_LOST) => {
            return ServiceBusError::SessionLockLost {
                message,
                caused_by: Some(Box::new(ServiceBusError::Amqp(raw))),
            };
        }
        Some(CONDITION_SESSION_CANNOT_BE_LOCKED) => {
            return ServiceBusError::SessionCannotBeLocked { message };
        }
        Some(CONDITION_UNAUTHORIZED_ACCESS) => {
            return ServiceBusError::Authentication { message };
        }
        Some(CONDITION_MESSAGE_LOCK_LOST) => return ServiceBusError::MessageLockLost { message },
        Some(CONDITION_MESSAGE_SIZE_EXCEEDED) => {
            return ServiceBusError::MessageSizeExceeded { message };
        }
        Some(CONDITION_TIMEOUT) => {
            return ServiceBusError::OperationTimeout {
                message,
                caused_by: Some(Box::new(ServiceBusError::Amqp(raw))),
            };
        }
        _ => {}
    }

    let kind = raw.kind;
    match kind {
        AmqpErrorKind::Timeout => ServiceBusError::OperationTimeout {
            message,
            caused_by: Some(Box::new(ServiceBusError::Amqp(raw))),
        },
        _ if raw.is_connection_loss() => {
            let message = match custom_endpoint_address {
                Some(endpoint) => format!("{message} (custom endpoint address: {endpoint})"),
                None => message,
            };
            ServiceBusError::Connection {
                message,
                caused_by: Some(Box::new(ServiceBusError::Amqp(raw))),
            }
        }
        AmqpErrorKind::AuthenticationFailed => ServiceBusError::Authentication { message },
        _ => ServiceBusError::Transport {
            message,
            retryable: raw.retryable,
            shutdown_handler: true,
            condition,
        },
    }
}
