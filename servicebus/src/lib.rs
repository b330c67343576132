//! # Service Bus handler library
//!
//! Asynchronous core shared by Azure Service Bus senders and receivers:
//! connection lifecycle, credential normalisation, and a retry loop around
//! AMQP management request/response exchanges. The AMQP transport itself is
//! injected through the traits in [`handler::transport`].
//!
//! ## Modules
//!
//! - [`auth`] - Credentials, SAS token generation and connection strings
//! - [`handler`] - The base handler, retry executor and error taxonomy
//! - [`common`] - Constants and raw transport errors
//! - [`utils`] - Environment access and connection properties

pub mod auth;
pub mod common;
pub mod handler;
pub mod utils;

pub use handler::{BaseHandler, ServiceBusError, ServiceBusResult};
