//! Protocol constants shared by the handler, the credential adapter and the
//! transport collaborator.

/// Token type announced to the CBS node for every SAS based credential.
pub const TOKEN_TYPE_SASTOKEN: &str = "servicebus.windows.net:sastoken";
/// Token type announced for externally issued (Azure AD) tokens.
pub const TOKEN_TYPE_JWT: &str = "jwt";

/// Operation type tag attached to every management request.
pub const MGMT_REQUEST_OP_TYPE_ENTITY_MGMT: &str = "entity-mgmt";
/// Application property carrying the name of the associated data-plane link.
pub const ASSOCIATED_LINK_PROPERTY_NAME: &str = "associated-link-name";
/// Appended to the entity path to address its management node.
pub const MANAGEMENT_PATH_SUFFIX: &str = "/$management";
pub const SUBSCRIPTION_PATH_SEGMENT: &str = "/Subscriptions/";

/// Prefix of every handler container id.
pub const CONTAINER_PREFIX: &str = "servicebus.rs-";
/// Number of UUID characters appended to [`CONTAINER_PREFIX`].
pub const CONTAINER_ID_SUFFIX_LEN: usize = 8;

/// Lifetime of SAS tokens generated from a shared key.
pub const DEFAULT_SAS_TOKEN_TTL_SECS: i64 = 3600;

pub const DEFAULT_RETRY_TOTAL: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_FACTOR: f64 = 0.8;
pub const DEFAULT_RETRY_BACKOFF_MAX: f64 = 120.0;
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// Guidance attached to a timeout that survived every retry.
pub const OPERATION_TIMEOUT_REMEDIATION: &str = "If trying to receive from the next available session, \
     use the max wait time option on the receiver to control the timeout.";

pub const SESSION_LOCK_LOST_MESSAGE: &str = "The lock on the session has expired. \
     Callers should request the session again.";

pub const HANDLER_SHUTDOWN_MESSAGE: &str = "The handler has already been shutdown. \
     Please use the client to create a new instance.";

// AMQP error conditions understood by the default error classification.
pub const CONDITION_SERVER_BUSY: &str = "com.microsoft:server-busy";
pub const CONDITION_NOT_FOUND: &str = "amqp:not-found";
pub const CONDITION_ENTITY_NOT_FOUND: &str = "com.microsoft:entity-not-found";
pub const CONDITION_SESSION_LOCK_LOST: &str = "com.microsoft:session-lock-lost";
pub const CONDITION_SESSION_CANNOT_BE_LOCKED: &str = "com.microsoft:session-cannot-be-locked";
pub const CONDITION_UNAUTHORIZED_ACCESS: &str = "amqp:unauthorized-access";
pub const CONDITION_MESSAGE_LOCK_LOST: &str = "com.microsoft:message-lock-lost";
pub const CONDITION_MESSAGE_SIZE_EXCEEDED: &str = "amqp:link:message-size-exceeded";
pub const CONDITION_TIMEOUT: &str = "com.microsoft:timeout";
