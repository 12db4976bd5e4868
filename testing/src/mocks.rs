//! Mock implementations of the transport and event-source seams.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use shopsync_client::transport::{ApiRequest, ApiResponse, Transport, TransportError};
use shopsync_core::clock::Clock;
use shopsync_core::event::PushEnvelope;
use shopsync_core::role::Role;
use shopsync_core::session::{AccessToken, RefreshToken, Session};
use shopsync_stream::source::{EventSource, EventStream, StreamError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Fixed clock for deterministic tests.
///
/// Always returns the same time until [`FixedClock::advance`] moves it.
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    /// Creates a clock pinned at `time`.
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        *time += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct TransportState {
    valid_token: String,
    responses: VecDeque<Result<ApiResponse, TransportError>>,
    renewals: VecDeque<Result<Session, TransportError>>,
    renew_delay: Duration,
    auto_accept_renewed: bool,
    authed_requests: Vec<ApiRequest>,
    execute_calls: u64,
    renew_calls: u64,
}

/// Scripted transport.
///
/// `execute` rejects any token other than the currently valid one with
/// [`TransportError::CredentialExpired`], then pops the next scripted
/// response (default: `200` with a null body). `renew` sleeps an optional
/// delay (to let concurrent callers pile up on the single-flight slot),
/// pops the next scripted outcome and, on success, makes the renewed
/// access token the valid one.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    /// Creates a transport accepting `valid_token`.
    #[must_use]
    pub fn new(valid_token: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(TransportState {
                valid_token: valid_token.to_string(),
                responses: VecDeque::new(),
                renewals: VecDeque::new(),
                renew_delay: Duration::ZERO,
                auto_accept_renewed: true,
                authed_requests: Vec::new(),
                execute_calls: 0,
                renew_calls: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TransportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a response for the next authenticated `execute`.
    pub fn push_response(&self, response: Result<ApiResponse, TransportError>) {
        self.lock().responses.push_back(response);
    }

    /// Queues a JSON `200` response.
    pub fn push_ok(&self, body: serde_json::Value) {
        self.push_response(Ok(ApiResponse { status: 200, body }));
    }

    /// Queues an outcome for the next `renew` call.
    pub fn push_renewal(&self, outcome: Result<Session, TransportError>) {
        self.lock().renewals.push_back(outcome);
    }

    /// Delays every `renew` call, so concurrent senders overlap on it.
    pub fn set_renew_delay(&self, delay: Duration) {
        self.lock().renew_delay = delay;
    }

    /// Changes which access token the server accepts.
    pub fn set_valid_token(&self, token: &str) {
        self.lock().valid_token = token.to_string();
    }

    /// Stops successful renewals from making their token the valid one,
    /// simulating a server that rejects even freshly renewed credentials.
    pub fn set_auto_accept_renewed(&self, accept: bool) {
        self.lock().auto_accept_renewed = accept;
    }

    /// Number of `renew` calls issued.
    #[must_use]
    pub fn renew_calls(&self) -> u64 {
        self.lock().renew_calls
    }

    /// Number of `execute` calls issued (with any token).
    #[must_use]
    pub fn execute_calls(&self) -> u64 {
        self.lock().execute_calls
    }

    /// Requests that passed authentication, in order.
    #[must_use]
    pub fn authed_requests(&self) -> Vec<ApiRequest> {
        self.lock().authed_requests.clone()
    }
}

impl Transport for MockTransport {
    async fn execute(
        &self,
        request: &ApiRequest,
        token: &AccessToken,
    ) -> Result<ApiResponse, TransportError> {
        let mut state = self.lock();
        state.execute_calls += 1;
        if token.as_str() != state.valid_token {
            return Err(TransportError::CredentialExpired);
        }
        state.authed_requests.push(request.clone());
        state.responses.pop_front().unwrap_or(Ok(ApiResponse {
            status: 200,
            body: serde_json::Value::Null,
        }))
    }

    async fn renew(&self, _refresh: &RefreshToken) -> Result<Session, TransportError> {
        let delay = {
            let mut state = self.lock();
            state.renew_calls += 1;
            state.renew_delay
        };
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        let outcome = state.renewals.pop_front().unwrap_or(Err(
            TransportError::Rejected {
                status: 401,
                reason: "renewal script exhausted".to_string(),
            },
        ));
        if state.auto_accept_renewed {
            if let Ok(session) = &outcome {
                state.valid_token = session.access.as_str().to_string();
            }
        }
        outcome
    }
}

/// One scripted push-channel connect attempt.
pub enum ConnectScript {
    /// Connect succeeds; the stream yields these envelopes and then drops.
    Events(Vec<PushEnvelope>),
    /// Connect succeeds; the stream yields these envelopes and then stays
    /// open forever.
    EventsThenOpen(Vec<PushEnvelope>),
    /// Connect fails outright.
    Fail(StreamError),
}

struct EventSourceState {
    script: VecDeque<ConnectScript>,
    connect_calls: u64,
}

/// Scripted event source.
///
/// Each `connect` pops the next [`ConnectScript`]; once the script is
/// exhausted, connects succeed with a stream that stays open and silent.
#[derive(Clone)]
pub struct MockEventSource {
    state: Arc<Mutex<EventSourceState>>,
}

impl MockEventSource {
    /// Creates an event source with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EventSourceState {
                script: VecDeque::new(),
                connect_calls: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EventSourceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a connect attempt to the script.
    pub fn push_connect(&self, script: ConnectScript) {
        self.lock().script.push_back(script);
    }

    /// Appends `count` failing connects.
    pub fn push_failures(&self, count: usize) {
        for _ in 0..count {
            self.push_connect(ConnectScript::Fail(StreamError::Connect(
                "connection refused".to_string(),
            )));
        }
    }

    /// Number of connect attempts observed.
    #[must_use]
    pub fn connect_calls(&self) -> u64 {
        self.lock().connect_calls
    }
}

impl Default for MockEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for MockEventSource {
    async fn connect(
        &self,
        _token: &AccessToken,
        _role: Role,
    ) -> Result<EventStream, StreamError> {
        let script = {
            let mut state = self.lock();
            state.connect_calls += 1;
            state.script.pop_front()
        };

        match script {
            Some(ConnectScript::Fail(err)) => Err(err),
            Some(ConnectScript::Events(events)) => {
                Ok(futures::stream::iter(events.into_iter().map(Ok)).boxed())
            }
            Some(ConnectScript::EventsThenOpen(events)) => {
                Ok(futures::stream::iter(events.into_iter().map(Ok))
                    .chain(futures::stream::pending())
                    .boxed())
            }
            None => Ok(futures::stream::pending().boxed()),
        }
    }
}
