use axum::{
    debug_handler,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::{counter, gauge};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use wavecrest_core::{CredentialPool, EventPublisher, PublishError, SyntheticEvent, HEARTBEAT_PAYLOAD};

/// Session bootstrap the real backend pushes right after the upgrade.
const INIT_PAYLOAD: &str = r#"{"messageType":0,"extendData":{"chatSessionList":[],"chatMessageList":[]}}"#;

/// In-process stand-in for the messaging backend.
///
/// Authenticates `?token=` against a fixed table, routes `U`-prefixed targets
/// to the matching user's sockets and counts the heartbeats it sees.
pub struct MockService {
    addr: SocketAddr,
    state: Arc<ServiceState>,
    task: JoinHandle<()>,
}

impl MockService {
    pub fn builder() -> MockServiceBuilder {
        MockServiceBuilder::default()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn broker(&self) -> MockBroker {
        MockBroker::new(self.state.clone())
    }

    /// Sessions currently open.
    pub fn connected(&self) -> usize {
        self.state.sessions().len()
    }

    pub fn heartbeats(&self) -> u64 {
        self.state.heartbeats.load(Ordering::Relaxed)
    }

    /// Upgrades refused for an unknown token or the accept-rate limit.
    pub fn rejected(&self) -> u64 {
        self.state.rejected.load(Ordering::Relaxed)
    }

    /// Close every session of `user_id` from the server side.
    pub fn disconnect_user(&self, user_id: &str) -> usize {
        self.state.send_to(user_id, || Outbound::Close)
    }

    /// Serve until the task is dropped.
    pub async fn wait(mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Default)]
pub struct MockServiceBuilder {
    users: HashMap<String, String>,
    stall_handshakes: bool,
    accept_rate: Option<NonZeroU32>,
    init_push: bool,
}

impl MockServiceBuilder {
    /// Accept every credential in the pool as its provisioned user.
    pub fn credentials(mut self, pool: &CredentialPool) -> Self {
        for credential in pool.iter() {
            self.users.insert(
                credential.token().to_string(),
                credential.provisioned_user_id(),
            );
        }
        self
    }

    pub fn user(mut self, token: &str, user_id: &str) -> Self {
        self.users.insert(token.to_string(), user_id.to_string());
        self
    }

    /// Accept TCP connections but never answer the upgrade request.
    pub fn stall_handshakes(mut self) -> Self {
        self.stall_handshakes = true;
        self
    }

    /// Refuse upgrades above `per_second` with 503.
    pub fn accept_rate(mut self, per_second: NonZeroU32) -> Self {
        self.accept_rate = Some(per_second);
        self
    }

    pub fn init_push(mut self, enabled: bool) -> Self {
        self.init_push = enabled;
        self
    }

    /// Bind an ephemeral loopback port and start serving.
    pub async fn spawn(self) -> std::io::Result<MockService> {
        self.bind(SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    pub async fn bind(self, addr: SocketAddr) -> std::io::Result<MockService> {
        let state = Arc::new(ServiceState {
            users: self.users,
            stall_handshakes: self.stall_handshakes,
            limiter: self.accept_rate.map(|rate| RateLimiter::direct(Quota::per_second(rate))),
            init_push: self.init_push,
            sessions: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(0),
            heartbeats: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        });

        let app = Router::new()
            .route("/ws", get(upgrade))
            .layer(TraceLayer::new_for_http())
            .with_state(state.clone());

        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        info!("Mock service listening on {addr}");

        let task = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                tracing::error!("Mock service stopped: {err}");
            }
        });

        Ok(MockService { addr, state, task })
    }
}

enum Outbound {
    Text(String),
    Close,
}

struct Session {
    user_id: String,
    tx: UnboundedSender<Outbound>,
}

struct ServiceState {
    users: HashMap<String, String>,
    stall_handshakes: bool,
    limiter: Option<DefaultDirectRateLimiter>,
    init_push: bool,
    sessions: Mutex<HashMap<u64, Session>>,
    next_session: AtomicU64,
    heartbeats: AtomicU64,
    rejected: AtomicU64,
}

impl ServiceState {
    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send_to(&self, user_id: &str, make: impl Fn() -> Outbound) -> usize {
        self.sessions()
            .values()
            .filter(|session| session.user_id == user_id)
            .filter(|session| session.tx.send(make()).is_ok())
            .count()
    }

    fn reject(&self, status: StatusCode) -> Response {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        counter!("mock_service_rejected").increment(1);
        status.into_response()
    }
}

#[derive(Deserialize)]
struct ConnectParams {
    token: Option<String>,
}

#[debug_handler]
async fn upgrade(
    State(state): State<Arc<ServiceState>>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    if state.stall_handshakes {
        return std::future::pending().await;
    }

    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            debug!("Accept rate exceeded");
            return state.reject(StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    let Some(user_id) = params.token.and_then(|token| state.users.get(&token).cloned()) else {
        debug!("Unknown token");
        return state.reject(StatusCode::UNAUTHORIZED);
    };

    ws.on_upgrade(move |socket| session(socket, user_id, state))
}

async fn session(socket: WebSocket, user_id: String, state: Arc<ServiceState>) {
    let (tx, mut rx) = unbounded_channel();
    let id = state.next_session.fetch_add(1, Ordering::Relaxed);
    state.sessions().insert(
        id,
        Session {
            user_id: user_id.clone(),
            tx,
        },
    );
    gauge!("mock_service_sessions").increment(1.0);
    debug!("{user_id} connected as session {id}");

    let (mut sink, mut stream) = socket.split();

    if state.init_push && sink.send(Message::Text(INIT_PAYLOAD.to_string())).await.is_err() {
        state.sessions().remove(&id);
        gauge!("mock_service_sessions").decrement(1.0);
        return;
    }

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(Outbound::Text(text)) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) if text == HEARTBEAT_PAYLOAD => {
                    state.heartbeats.fetch_add(1, Ordering::Relaxed);
                    counter!("mock_service_heartbeats").increment(1);
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.sessions().remove(&id);
    gauge!("mock_service_sessions").decrement(1.0);
    debug!("{user_id} session {id} closed");
}

type DropFilter = Arc<dyn Fn(u64) -> bool + Send + Sync>;

/// Publisher that routes straight into the mock's sessions.
///
/// Delivery happens on a spawned task after the configured delay, so
/// `publish` returns as soon as the event is accepted, like a real broker.
#[derive(Clone)]
pub struct MockBroker {
    state: Arc<ServiceState>,
    delay: Duration,
    drop_filter: Option<DropFilter>,
}

impl MockBroker {
    fn new(state: Arc<ServiceState>) -> Self {
        Self {
            state,
            delay: Duration::ZERO,
            drop_filter: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Silently drop every event whose sequence number matches.
    pub fn drop_when<F>(mut self, filter: F) -> Self
    where
        F: Fn(u64) -> bool + Send + Sync + 'static,
    {
        self.drop_filter = Some(Arc::new(filter));
        self
    }
}

impl EventPublisher for MockBroker {
    async fn publish(&mut self, event: &SyntheticEvent) -> Result<(), PublishError> {
        let payload = event.encode()?;

        if self.drop_filter.as_ref().is_some_and(|filter| filter(event.sequence)) {
            debug!("Dropping event {}", event.sequence);
            return Ok(());
        }

        // Only user-prefixed targets are routed to a socket.
        if !event.target.starts_with('U') {
            debug!("Unroutable target {}", event.target);
            return Ok(());
        }

        let state = self.state.clone();
        let target = event.target.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            state.send_to(&target, || Outbound::Text(payload.clone()));
        });
        Ok(())
    }
}
