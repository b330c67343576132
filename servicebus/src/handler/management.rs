//! Request/response exchanges with an entity's `$management` node.

use super::base::BaseHandler;
use super::errors::{ServiceBusError, ServiceBusResult};
use super::events::HandlerEvent;
use super::retry::RetryOptions;
use super::transport::{ApplicationProperties, ManagementCall, ManagementMessage, ManagementResponse};
use crate::common::AmqpError;
use crate::common::constants::{ASSOCIATED_LINK_PROPERTY_NAME, MGMT_REQUEST_OP_TYPE_ENTITY_MGMT};
use serde_json::Value;
use std::time::Duration;

impl BaseHandler {
    /// Sends one management request and hands the raw response to `callback`.
    ///
    /// The handler is opened first if needed; a failed open is returned to
    /// the caller, which decides whether to retry it. With `keep_alive_associated_link`
    /// the name of the current data-plane link travels along as
    /// `associated-link-name`; a handler without a named link sends the
    /// request without it.
    ///
    /// # Errors
    ///
    /// - [`ServiceBusError::InvalidState`] once the handler was closed
    /// - [`ServiceBusError::OperationTimeout`] when the transport times out or
    ///   `timeout` elapses, with the underlying error as cause
    /// - whatever opening the link, the transport or `callback` report
    pub async fn mgmt_request_response<T, F>(
        &self,
        operation: &str,
        message: ManagementMessage,
        callback: F,
        keep_alive_associated_link: bool,
        timeout: Option<Duration>,
    ) -> ServiceBusResult<T>
    where
        F: FnOnce(ManagementResponse) -> ServiceBusResult<T>,
    {
        self.check_live()?;
        self.open().await?;

        let mut guard = self.link.lock().await;
        let link = guard
            .as_deref_mut()
            .ok_or_else(|| ServiceBusError::connection("The handler link is not open."))?;

        let mut application_properties = ApplicationProperties::new();
        if keep_alive_associated_link {
            if let Some(name) = self.transport.get_handler_link_name(link) {
                application_properties
                    .insert(ASSOCIATED_LINK_PROPERTY_NAME.to_string(), Value::String(name));
            }
        }

        let request = self.transport.create_mgmt_msg(
            message,
            application_properties,
            self.config(),
            self.management_target(),
        );
        let node = self.config().encode(self.management_target())?;

        self.events.emit(&HandlerEvent::ManagementRequest {
            container_id: self.container_id(),
            operation,
            node: self.management_target(),
        });

        let call = ManagementCall {
            operation,
            operation_type: MGMT_REQUEST_OP_TYPE_ENTITY_MGMT,
            node: &node,
            timeout,
        };
        let sent = self.transport.mgmt_client_request(link, request, call);
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, sent).await {
                Ok(result) => result,
                Err(elapsed) => Err(AmqpError::from(elapsed).into()),
            },
            None => sent.await,
        };
        drop(guard);

        match result {
            Ok(response) => callback(response),
            Err(error) if self.transport.is_timeout_error(&error) => {
                Err(ServiceBusError::OperationTimeout {
                    message: format!("Management operation '{operation}' timed out."),
                    caused_by: Some(Box::new(error)),
                })
            }
            Err(error) => Err(error),
        }
    }

    /// [`mgmt_request_response`](Self::mgmt_request_response) under the
    /// handler's retry policy.
    ///
    /// `timeout` bounds all attempts together; every attempt is given what is
    /// left of it. A zero `timeout` means no limit. The associated link is
    /// always kept alive.
    pub async fn mgmt_request_response_with_retry<T, F>(
        &self,
        operation: &str,
        message: ManagementMessage,
        callback: F,
        timeout: Option<Duration>,
    ) -> ServiceBusResult<T>
    where
        F: Fn(ManagementResponse) -> ServiceBusResult<T>,
    {
        let callback = &callback;
        let message = &message;
        let timeout = timeout.filter(|t| !t.is_zero());
        self.do_retryable_operation(RetryOptions::with_timeout(timeout), move |context| {
            self.mgmt_request_response(operation, message.clone(), callback, true, context.timeout)
        })
        .await
    }
}
