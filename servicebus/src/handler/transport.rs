//! Capabilities the handler needs from an AMQP transport.
//!
//! Framing, TLS and the CBS token exchange live behind these traits; the
//! handler only drives them.

use super::config::Configuration;
use super::errors::{ServiceBusError, ServiceBusResult, create_servicebus_exception};
use super::session::SessionState;
use crate::auth::ServiceBusCredential;
use crate::utils::ConnectionProperties;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// AMQP application properties; values use their JSON mapping.
pub type ApplicationProperties = serde_json::Map<String, Value>;

/// Body and properties of a management request, before addressing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ManagementMessage {
    pub body: Value,
    pub application_properties: ApplicationProperties,
}

impl ManagementMessage {
    pub fn new(body: Value) -> Self {
        Self {
            body,
            application_properties: ApplicationProperties::new(),
        }
    }
}

/// Addressed management request, ready to be sent.
#[derive(Clone, Debug, PartialEq)]
pub struct ManagementRequest {
    pub body: Value,
    pub application_properties: ApplicationProperties,
    pub reply_to: String,
}

/// Raw response of the management node.
#[derive(Clone, Debug, PartialEq)]
pub struct ManagementResponse {
    pub status_code: u16,
    pub description: Option<String>,
    pub body: Value,
    pub application_properties: ApplicationProperties,
}

/// Routing data of one management exchange.
#[derive(Clone, Copy, Debug)]
pub struct ManagementCall<'a> {
    /// Service specific operation, e.g. `com.microsoft:renew-lock`.
    pub operation: &'a str,
    pub operation_type: &'a str,
    /// Management node address in the configured encoding.
    pub node: &'a [u8],
    pub timeout: Option<Duration>,
}

/// An open AMQP link owned by exactly one handler.
#[async_trait]
pub trait AmqpLink: Send + Sync {
    /// Name of the data-plane link, if it has one.
    fn name(&self) -> Option<String>;

    async fn close(&mut self) -> ServiceBusResult<()>;
}

/// Everything a link factory may need to establish a link.
#[derive(Clone, Copy)]
pub struct LinkRequest<'a> {
    pub container_id: &'a str,
    pub fully_qualified_namespace: &'a str,
    pub entity_path: &'a str,
    /// Audience for the CBS token, `sb://{namespace}/{entity_path}`.
    pub auth_uri: &'a str,
    pub credential: &'a ServiceBusCredential,
    pub config: &'a Configuration,
    pub properties: &'a ConnectionProperties,
    pub session: Option<&'a SessionState>,
}

/// Establishes the link of a concrete sender or receiver.
#[async_trait]
pub trait LinkFactory: Send + Sync {
    async fn create_link(&self, request: LinkRequest<'_>) -> ServiceBusResult<Box<dyn AmqpLink>>;
}

/// Transport collaborator.
///
/// Only [`mgmt_client_request`](AmqpTransport::mgmt_client_request) has to
/// be implemented; the remaining methods have defaults matching the
/// standard Service Bus conventions.
#[async_trait]
pub trait AmqpTransport: Send + Sync {
    /// Builds the management envelope.
    ///
    /// Properties passed in by the handler override properties already
    /// present on the message.
    fn create_mgmt_msg(
        &self,
        message: ManagementMessage,
        application_properties: ApplicationProperties,
        _config: &Configuration,
        reply_to: &str,
    ) -> ManagementRequest {
        let mut properties = message.application_properties;
        properties.extend(application_properties);
        ManagementRequest {
            body: message.body,
            application_properties: properties,
            reply_to: reply_to.to_string(),
        }
    }

    /// Sends `request` over `link` and waits for the response.
    async fn mgmt_client_request(
        &self,
        link: &mut dyn AmqpLink,
        request: ManagementRequest,
        call: ManagementCall<'_>,
    ) -> ServiceBusResult<ManagementResponse>;

    /// Maps raw transport failures to typed errors.
    fn create_servicebus_exception(
        &self,
        error: ServiceBusError,
        custom_endpoint_address: Option<&str>,
    ) -> ServiceBusError {
        create_servicebus_exception(error, custom_endpoint_address)
    }

    fn get_handler_link_name(&self, link: &dyn AmqpLink) -> Option<String> {
        link.name()
    }

    /// Marker check for the transport's own timeout error.
    fn is_timeout_error(&self, error: &ServiceBusError) -> bool {
        matches!(error, ServiceBusError::Amqp(raw) if raw.is_timeout())
    }
}
