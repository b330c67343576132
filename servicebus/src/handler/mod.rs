//! The asynchronous base handler shared by Service Bus senders and receivers.
//!
//! - [`base`] - connection lifecycle and error classification ([`BaseHandler`])
//! - [`management`] - request/response exchanges with the `$management` node
//! - [`retry`] - bounded retry with fixed or exponential backoff
//! - [`errors`] - the typed error taxonomy
//! - [`config`] - options and the immutable per-handler configuration
//! - [`transport`] - traits a concrete AMQP transport implements
//! - [`events`] - observability hooks
//! - [`session`] - lock bookkeeping of session receivers

pub mod base;
pub mod config;
pub mod errors;
pub mod events;
pub mod management;
pub mod retry;
pub mod session;
pub mod transport;

pub use base::{BaseHandler, BaseHandlerBuilder, HandlerKind};
pub use config::{Configuration, HandlerOptions, RetryMode, TransportType};
pub use errors::{ServiceBusError, ServiceBusResult, create_servicebus_exception};
pub use events::{HandlerEvent, HandlerEventSink, LogEventSink};
pub use retry::{
    ExceptionHandler, RetryContext, RetryExecutor, RetryOptions, RetryPolicy, get_backoff_time,
};
pub use session::SessionState;
pub use transport::{
    AmqpLink, AmqpTransport, ApplicationProperties, LinkFactory, LinkRequest, ManagementCall,
    ManagementMessage, ManagementRequest, ManagementResponse,
};
