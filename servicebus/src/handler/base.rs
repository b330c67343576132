use super::config::{Configuration, HandlerOptions};
use super::errors::{ServiceBusError, ServiceBusResult};
use super::events::{HandlerEvent, HandlerEventSink, LogEventSink};
use super::retry::{ExceptionHandler, RetryContext, RetryExecutor, RetryOptions};
use super::session::SessionState;
use super::transport::{AmqpLink, AmqpTransport, LinkFactory, LinkRequest};
use crate::auth::{ConnectionStringProperties, ServiceBusCredential};
use crate::common::constants::{
    CONTAINER_ID_SUFFIX_LEN, CONTAINER_PREFIX, HANDLER_SHUTDOWN_MESSAGE, MANAGEMENT_PATH_SUFFIX,
    SUBSCRIPTION_PATH_SEGMENT,
};
use crate::utils::{ConnectionProperties, create_properties, strip_protocol_from_uri};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Whether a handler is bound to a session.
#[derive(Debug, Clone, Default)]
pub enum HandlerKind {
    /// Plain queue, topic or subscription handler.
    #[default]
    Entity,
    /// Session receiver; lock loss makes the handler unusable.
    Session(Arc<SessionState>),
}

/// Builder for [`BaseHandler`].
///
/// # Examples
///
/// ```no_run
/// use servicebus::handler::{BaseHandler, HandlerOptions};
///
/// let handler = BaseHandler::builder(
///     "sb://contoso.servicebus.windows.net/",
///     "orders",
///     credential,
///     transport,
///     link_factory,
/// )
/// .options(HandlerOptions { retry_total: 5, ..Default::default() })
/// .build()?;
/// ```
pub struct BaseHandlerBuilder {
    fully_qualified_namespace: String,
    entity_name: String,
    credential: ServiceBusCredential,
    transport: Arc<dyn AmqpTransport>,
    link_factory: Arc<dyn LinkFactory>,
    options: HandlerOptions,
    kind: HandlerKind,
    events: Arc<dyn HandlerEventSink>,
}

impl BaseHandlerBuilder {
    pub fn options(mut self, options: HandlerOptions) -> Self {
        self.options = options;
        self
    }

    /// Binds the handler to a session.
    pub fn session(mut self, session: Arc<SessionState>) -> Self {
        self.kind = HandlerKind::Session(session);
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn HandlerEventSink>) -> Self {
        self.events = events;
        self
    }

    /// # Errors
    ///
    /// Returns [`ServiceBusError::InvalidArgument`] for an empty namespace or
    /// entity name and [`ServiceBusError::ConfigurationError`] for invalid
    /// options.
    pub fn build(self) -> ServiceBusResult<BaseHandler> {
        let fully_qualified_namespace = strip_protocol_from_uri(self.fully_qualified_namespace.trim())
            .trim_end_matches('/')
            .to_string();
        if fully_qualified_namespace.is_empty() {
            return Err(ServiceBusError::InvalidArgument(
                "fully_qualified_namespace must not be empty".to_string(),
            ));
        }
        if self.entity_name.trim().is_empty() {
            return Err(ServiceBusError::InvalidArgument(
                "entity_name must not be empty".to_string(),
            ));
        }

        let entity_path = match self.options.subscription_name.as_deref() {
            Some(subscription) if !subscription.is_empty() => {
                format!("{}{SUBSCRIPTION_PATH_SEGMENT}{subscription}", self.entity_name)
            }
            _ => self.entity_name.clone(),
        };
        let mgmt_target = format!("{entity_path}{MANAGEMENT_PATH_SUFFIX}");
        let auth_uri = format!("sb://{fully_qualified_namespace}/{entity_path}");

        let uuid = uuid::Uuid::new_v4().simple().to_string();
        let container_id = format!("{CONTAINER_PREFIX}{}", &uuid[..CONTAINER_ID_SUFFIX_LEN]);

        let config = Configuration::new(fully_qualified_namespace.clone(), &self.options)?;
        let properties = create_properties(config.user_agent());
        let retry = RetryExecutor::new(
            config.retry_policy(),
            container_id.clone(),
            self.events.clone(),
        );

        Ok(BaseHandler {
            fully_qualified_namespace,
            entity_name: self.entity_name,
            entity_path,
            mgmt_target,
            auth_uri,
            credential: self.credential,
            container_id,
            config: Arc::new(config),
            properties,
            transport: self.transport,
            link_factory: self.link_factory,
            events: self.events,
            retry,
            kind: self.kind,
            link: Mutex::new(None),
            running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }
}

/// Connection lifecycle, error classification and retry shared by every
/// sender and receiver.
///
/// States: unopened → open → closed. The link is opened lazily, may be
/// reopened after a failure tore it down, and is never reopened once
/// [`close`](BaseHandler::close) has been called.
pub struct BaseHandler {
    fully_qualified_namespace: String,
    entity_name: String,
    entity_path: String,
    mgmt_target: String,
    auth_uri: String,
    credential: ServiceBusCredential,
    container_id: String,
    config: Arc<Configuration>,
    properties: ConnectionProperties,
    pub(super) transport: Arc<dyn AmqpTransport>,
    link_factory: Arc<dyn LinkFactory>,
    pub(super) events: Arc<dyn HandlerEventSink>,
    retry: RetryExecutor,
    kind: HandlerKind,
    pub(super) link: Mutex<Option<Box<dyn AmqpLink>>>,
    running: AtomicBool,
    shutdown: CancellationToken,
}

impl BaseHandler {
    pub fn builder(
        fully_qualified_namespace: impl Into<String>,
        entity_name: impl Into<String>,
        credential: impl Into<ServiceBusCredential>,
        transport: Arc<dyn AmqpTransport>,
        link_factory: Arc<dyn LinkFactory>,
    ) -> BaseHandlerBuilder {
        BaseHandlerBuilder {
            fully_qualified_namespace: fully_qualified_namespace.into(),
            entity_name: entity_name.into(),
            credential: credential.into(),
            transport,
            link_factory,
            options: HandlerOptions::default(),
            kind: HandlerKind::Entity,
            events: Arc::new(LogEventSink),
        }
    }

    /// Starts a builder from a connection string.
    ///
    /// The entity comes from `entity_name`, from the string's `EntityPath`,
    /// or from both if they agree.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceBusError::InvalidArgument`] if the connection string is
    /// malformed, names no entity at all, or names a different entity than
    /// `entity_name`.
    pub fn from_connection_string(
        conn_str: &str,
        entity_name: Option<&str>,
        transport: Arc<dyn AmqpTransport>,
        link_factory: Arc<dyn LinkFactory>,
    ) -> ServiceBusResult<BaseHandlerBuilder> {
        let properties = ConnectionStringProperties::parse(conn_str)?;

        let entity_name = match (entity_name, properties.entity_path()) {
            (Some(given), Some(path)) if given != path => {
                return Err(ServiceBusError::InvalidArgument(
                    "The entity name provided does not match the EntityPath in the connection string."
                        .to_string(),
                ));
            }
            (Some(given), _) => given.to_string(),
            (None, Some(path)) => path.to_string(),
            (None, None) => {
                return Err(ServiceBusError::InvalidArgument(
                    "An entity name is required when the connection string has no EntityPath."
                        .to_string(),
                ));
            }
        };

        Ok(Self::builder(
            properties.fully_qualified_namespace(),
            entity_name,
            properties.credential()?,
            transport,
            link_factory,
        ))
    }

    pub fn fully_qualified_namespace(&self) -> &str {
        &self.fully_qualified_namespace
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn entity_path(&self) -> &str {
        &self.entity_path
    }

    /// Address of the entity's management node.
    pub fn management_target(&self) -> &str {
        &self.mgmt_target
    }

    pub fn auth_uri(&self) -> &str {
        &self.auth_uri
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn credential(&self) -> &ServiceBusCredential {
        &self.credential
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn properties(&self) -> &ConnectionProperties {
        &self.properties
    }

    pub fn kind(&self) -> &HandlerKind {
        &self.kind
    }

    pub fn session(&self) -> Option<&SessionState> {
        match &self.kind {
            HandlerKind::Session(session) => Some(session.as_ref()),
            HandlerKind::Entity => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Name of the current data-plane link, if one is open.
    pub async fn link_name(&self) -> Option<String> {
        let guard = self.link.lock().await;
        guard
            .as_deref()
            .and_then(|link| self.transport.get_handler_link_name(link))
    }

    /// Fails fast when the handler can no longer be used.
    ///
    /// # Errors
    ///
    /// - [`ServiceBusError::InvalidState`] once the handler was closed
    /// - [`ServiceBusError::SessionLockLost`] when the session lock was lost
    ///   or has expired, carrying the last auto-renew error
    pub fn check_live(&self) -> ServiceBusResult<()> {
        if self.is_shutdown() {
            return Err(ServiceBusError::InvalidState(
                HANDLER_SHUTDOWN_MESSAGE.to_string(),
            ));
        }
        if let Some(session) = self.session() {
            if session.is_lock_lost() || session.is_lock_expired() {
                return Err(ServiceBusError::session_lock_lost(
                    session.auto_renew_error(),
                ));
            }
        }
        Ok(())
    }

    /// Opens the link unless it is already open.
    ///
    /// # Errors
    ///
    /// [`ServiceBusError::InvalidState`] after shutdown; otherwise whatever
    /// the link factory reports.
    pub async fn open(&self) -> ServiceBusResult<()> {
        if self.is_shutdown() {
            return Err(ServiceBusError::InvalidState(
                HANDLER_SHUTDOWN_MESSAGE.to_string(),
            ));
        }

        let mut guard = self.link.lock().await;
        if self.is_running() && guard.is_some() {
            return Ok(());
        }

        let request = LinkRequest {
            container_id: &self.container_id,
            fully_qualified_namespace: &self.fully_qualified_namespace,
            entity_path: &self.entity_path,
            auth_uri: &self.auth_uri,
            credential: &self.credential,
            config: &self.config,
            properties: &self.properties,
            session: self.session(),
        };
        let link = self.link_factory.create_link(request).await?;
        *guard = Some(link);
        self.running.store(true, Ordering::SeqCst);

        self.events.emit(&HandlerEvent::LinkOpened {
            container_id: &self.container_id,
            entity_path: &self.entity_path,
        });
        Ok(())
    }

    pub async fn open_with_retry(&self) -> ServiceBusResult<()> {
        self.do_retryable_operation(RetryOptions::default(), |_| self.open())
            .await
    }

    /// Runs `operation` under the handler's retry policy, classifying each
    /// failure with [`handle_exception`](ExceptionHandler::handle_exception).
    pub async fn do_retryable_operation<T, F, Fut>(
        &self,
        options: RetryOptions,
        operation: F,
    ) -> ServiceBusResult<T>
    where
        F: FnMut(RetryContext) -> Fut,
        Fut: Future<Output = ServiceBusResult<T>>,
    {
        self.retry.execute(self, options, operation).await
    }

    /// Tears down the link, if any, and marks the handler as not running.
    ///
    /// Safe to call repeatedly. A failure while closing is reported to the
    /// event sink; the link is dropped either way.
    pub async fn close_handler(&self) {
        let link = self.link.lock().await.take();
        if let Some(mut link) = link {
            match link.close().await {
                Ok(()) => self.events.emit(&HandlerEvent::LinkClosed {
                    container_id: &self.container_id,
                }),
                Err(error) => self.events.emit(&HandlerEvent::LinkCloseFailed {
                    container_id: &self.container_id,
                    error: &error,
                }),
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Closes the handler for good. Later operations fail with
    /// [`ServiceBusError::InvalidState`].
    pub async fn close(&self) {
        self.close_handler().await;
        self.shutdown.cancel();
    }
}

#[async_trait]
impl ExceptionHandler for BaseHandler {
    async fn handle_exception(
        &self,
        error: ServiceBusError,
    ) -> Result<ServiceBusError, ServiceBusError> {
        let error = self
            .transport
            .create_servicebus_exception(error, self.config.custom_endpoint_address());

        // A running session receiver never retries on the same session: the
        // next attempt could silently land on another session.
        if let HandlerKind::Session(session) = &self.kind {
            if self.is_running() && error.is_session_fatal() {
                session.mark_lock_lost();
                self.events.emit(&HandlerEvent::SessionLockLost {
                    container_id: &self.container_id,
                    session_id: session.session_id(),
                    error: &error,
                });
                self.close_handler().await;
                return Err(error);
            }
        }

        if error.shutdown_handler() {
            self.close_handler().await;
        }
        if !error.retryable() {
            return Err(error);
        }
        Ok(error)
    }
}

impl std::fmt::Debug for BaseHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseHandler")
            .field("container_id", &self.container_id)
            .field("fully_qualified_namespace", &self.fully_qualified_namespace)
            .field("entity_path", &self.entity_path)
            .field("kind", &self.kind)
            .field("running", &self.is_running())
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}
