//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use servicebus::auth::SharedKeyCredential;
use servicebus::handler::{
    AmqpLink, AmqpTransport, ApplicationProperties, BaseHandler, HandlerEvent, HandlerEventSink,
    HandlerOptions, LinkFactory, LinkRequest, ManagementCall, ManagementRequest,
    ManagementResponse, RetryMode, ServiceBusError, ServiceBusResult, SessionState,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NAMESPACE: &str = "contoso.servicebus.windows.net";
pub const ENTITY: &str = "orders";

pub struct MockLink {
    name: Option<String>,
    closes: Arc<AtomicUsize>,
    close_error: Option<ServiceBusError>,
}

#[async_trait]
impl AmqpLink for MockLink {
    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn close(&mut self) -> ServiceBusResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        match self.close_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Hands out [`MockLink`]s and counts opens and closes.
#[derive(Default)]
pub struct MockLinkFactory {
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
    link_name: Mutex<Option<String>>,
    open_failures: Mutex<VecDeque<ServiceBusError>>,
    close_error: Mutex<Option<ServiceBusError>>,
    audiences: Mutex<Vec<String>>,
}

impl MockLinkFactory {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn set_link_name(&self, name: &str) {
        *self.link_name.lock().unwrap() = Some(name.to_string());
    }

    pub fn fail_next_open(&self, error: ServiceBusError) {
        self.open_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_next_close(&self, error: ServiceBusError) {
        *self.close_error.lock().unwrap() = Some(error);
    }

    pub fn audiences(&self) -> Vec<String> {
        self.audiences.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkFactory for MockLinkFactory {
    async fn create_link(&self, request: LinkRequest<'_>) -> ServiceBusResult<Box<dyn AmqpLink>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.audiences
            .lock()
            .unwrap()
            .push(request.auth_uri.to_string());

        let failure = self.open_failures.lock().unwrap().pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        let name = self.link_name.lock().unwrap().clone();
        let close_error = self.close_error.lock().unwrap().take();
        Ok(Box::new(MockLink {
            name,
            closes: self.closes.clone(),
            close_error,
        }))
    }
}

/// What the transport saw for one management call.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub request: ManagementRequest,
    pub operation: String,
    pub operation_type: String,
    pub node: Vec<u8>,
    pub timeout: Option<Duration>,
}

/// Replays queued responses; answers `{}` once the queue is empty.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<ServiceBusResult<ManagementResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub fn push_response(&self, response: ServiceBusResult<ManagementResponse>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Every request takes `delay` before it is answered.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AmqpTransport for MockTransport {
    async fn mgmt_client_request(
        &self,
        _link: &mut dyn AmqpLink,
        request: ManagementRequest,
        call: ManagementCall<'_>,
    ) -> ServiceBusResult<ManagementResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            request,
            operation: call.operation.to_string(),
            operation_type: call.operation_type.to_string(),
            node: call.node.to_vec(),
            timeout: call.timeout,
        });

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(ok_response(json!({}))))
    }
}

pub fn ok_response(body: Value) -> ManagementResponse {
    ManagementResponse {
        status_code: 200,
        description: None,
        body,
        application_properties: ApplicationProperties::new(),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Recorded {
    LinkOpened,
    LinkClosed,
    LinkCloseFailed,
    Management(String),
    Retrying { attempt: u32, delay: Duration },
    RetryExhausted { attempts: u32 },
    RetryTimedOut,
    SessionLockLost(String),
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn retry_delays(&self) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Recorded::Retrying { delay, .. } => Some(delay),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, expected: &Recorded) -> bool {
        self.events().contains(expected)
    }
}

impl HandlerEventSink for RecordingSink {
    fn emit(&self, event: &HandlerEvent<'_>) {
        let recorded = match event {
            HandlerEvent::LinkOpened { .. } => Recorded::LinkOpened,
            HandlerEvent::LinkClosed { .. } => Recorded::LinkClosed,
            HandlerEvent::LinkCloseFailed { .. } => Recorded::LinkCloseFailed,
            HandlerEvent::ManagementRequest { operation, .. } => {
                Recorded::Management(operation.to_string())
            }
            HandlerEvent::Retrying { attempt, delay, .. } => Recorded::Retrying {
                attempt: *attempt,
                delay: *delay,
            },
            HandlerEvent::RetryExhausted { attempts, .. } => Recorded::RetryExhausted {
                attempts: *attempts,
            },
            HandlerEvent::RetryTimedOut { .. } => Recorded::RetryTimedOut,
            HandlerEvent::SessionLockLost { session_id, .. } => {
                Recorded::SessionLockLost(session_id.to_string())
            }
        };
        self.events.lock().unwrap().push(recorded);
    }
}

/// A handler wired to in-memory collaborators.
pub struct Harness {
    pub handler: BaseHandler,
    pub transport: Arc<MockTransport>,
    pub links: Arc<MockLinkFactory>,
    pub events: Arc<RecordingSink>,
}

pub fn harness(options: HandlerOptions) -> Harness {
    build(options, None)
}

pub fn session_harness(options: HandlerOptions, session: Arc<SessionState>) -> Harness {
    build(options, Some(session))
}

fn build(options: HandlerOptions, session: Option<Arc<SessionState>>) -> Harness {
    let transport = Arc::new(MockTransport::default());
    let links = Arc::new(MockLinkFactory::default());
    let events = Arc::new(RecordingSink::default());

    let mut builder = BaseHandler::builder(
        format!("sb://{NAMESPACE}/"),
        ENTITY,
        SharedKeyCredential::new("RootManageSharedAccessKey", "secret"),
        transport.clone(),
        links.clone(),
    )
    .options(options)
    .event_sink(events.clone());
    if let Some(session) = session {
        builder = builder.session(session);
    }

    Harness {
        handler: builder.build().unwrap(),
        transport,
        links,
        events,
    }
}

/// Fixed one second backoff, capped at ten.
pub fn fixed_options(retry_total: u32) -> HandlerOptions {
    HandlerOptions {
        retry_total,
        retry_mode: RetryMode::Fixed,
        retry_backoff_factor: 1.0,
        retry_backoff_max: 10.0,
        ..Default::default()
    }
}

pub fn server_busy() -> ServiceBusError {
    ServiceBusError::ServerBusy {
        message: "The server is busy.".to_string(),
    }
}
