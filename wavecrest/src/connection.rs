use crate::error::ConnectError;
use crate::heartbeat::Heartbeat;
use crate::tracker::ConnectionTracker;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};
use url::Url;
use wavecrest_core::HEARTBEAT_PAYLOAD;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnState {
    Connecting = 0,
    HandshakeComplete = 1,
    Disconnected = 2,
    Failed = 3,
}

impl ConnState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::HandshakeComplete,
            2 => Self::Disconnected,
            _ => Self::Failed,
        }
    }
}

/// Shared handle to one client connection.
///
/// Every transition is a compare-and-swap on the state, and a transition that
/// wins is the only thing allowed to touch the tracker. Losing a race (closing
/// twice, failing after a close) is a silent no-op.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: usize,
    state: AtomicU8,
    tracker: Arc<ConnectionTracker>,
    shutdown: watch::Sender<bool>,
}

impl ConnectionHandle {
    /// Creating a handle counts as an attempt.
    pub fn new(id: usize, tracker: Arc<ConnectionTracker>) -> Self {
        tracker.record_attempt();
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(HandleInner {
                id,
                state: AtomicU8::new(ConnState::Connecting as u8),
                tracker,
                shutdown,
            }),
        }
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn state(&self) -> ConnState {
        ConnState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    pub fn is_live(&self) -> bool {
        self.state() == ConnState::HandshakeComplete && !*self.inner.shutdown.borrow()
    }

    /// Ask the connection to close. Safe to call any number of times.
    pub fn close(&self) {
        self.inner.shutdown.send_replace(true);
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        let mut rx = self.inner.shutdown.subscribe();
        shutdown_requested(&mut rx).await;
    }

    pub(crate) fn mark_handshake_complete(&self) -> bool {
        let won = self.transition(ConnState::Connecting, ConnState::HandshakeComplete);
        if won {
            self.inner.tracker.record_success();
        }
        won
    }

    pub(crate) fn mark_failed(&self) -> bool {
        let won = self.transition(ConnState::Connecting, ConnState::Failed);
        if won {
            self.inner.tracker.record_failure();
        }
        won
    }

    pub(crate) fn mark_disconnected(&self) -> bool {
        let won = self.transition(ConnState::HandshakeComplete, ConnState::Disconnected);
        if won {
            self.inner.tracker.record_disconnect();
        }
        won
    }

    fn transition(&self, from: ConnState, to: ConnState) -> bool {
        self.inner
            .state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    // A dropped sender means the handle is gone, which is as good as closed.
    let _ = rx.wait_for(|closed| *closed).await;
}

/// The endpoint for one credential: `token` is appended to any existing query.
pub fn endpoint_for(base: &Url, token: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair("token", token);
    url
}

/// TCP connect plus WebSocket upgrade, bounded by `connect_timeout`.
pub async fn open(url: &Url, connect_timeout: Duration) -> Result<WsStream, ConnectError> {
    let (ws, _response) = tokio::time::timeout(connect_timeout, connect_async(url.as_str()))
        .await
        .map_err(|_| ConnectError::Timeout(connect_timeout))??;
    Ok(ws)
}

/// Run the handshake for `handle` and record its outcome.
///
/// A close requested while the handshake is in flight abandons it, and the
/// attempt is counted as failed.
pub async fn establish(
    handle: &ConnectionHandle,
    url: &Url,
    connect_timeout: Duration,
) -> Result<WsStream, ConnectError> {
    let mut shutdown = handle.shutdown_signal();
    let res = tokio::select! {
        res = open(url, connect_timeout) => res,
        _ = shutdown_requested(&mut shutdown) => Err(ConnectError::Cancelled),
    };

    match res {
        Ok(ws) if handle.mark_handshake_complete() => Ok(ws),
        Ok(_) => Err(ConnectError::Cancelled),
        Err(err) => {
            handle.mark_failed();
            Err(err)
        }
    }
}

/// Pump an open connection until it is closed from either side.
///
/// Heartbeats go out on schedule, text frames are handed to `on_text`, and the
/// connection is counted as disconnected exactly once on the way out.
pub async fn drive<F>(mut ws: WsStream, handle: ConnectionHandle, mut heartbeat: Heartbeat, mut on_text: F)
where
    F: FnMut(&str),
{
    let mut shutdown = handle.shutdown_signal();

    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => {
                if let Err(err) = ws.close(None).await {
                    trace!("Connection {} close frame not delivered: {err}", handle.id());
                }
                break;
            }
            _ = heartbeat.tick() => {
                if !handle.is_live() {
                    continue;
                }
                if let Err(err) = ws.send(Message::Text(HEARTBEAT_PAYLOAD.to_string())).await {
                    debug!("Connection {} heartbeat failed: {err}", handle.id());
                    break;
                }
            }
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => on_text(&text),
                Some(Ok(Message::Close(frame))) => {
                    debug!("Connection {} closed by server: {frame:?}", handle.id());
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!("Connection {} transport error: {err}", handle.id());
                    break;
                }
                None => break,
            },
        }
    }

    handle.mark_disconnected();
}

/// Every handle created during a run, so shutdown can reach all of them.
#[derive(Default)]
pub struct ConnectionRegistry {
    handles: Mutex<Vec<ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: ConnectionHandle) {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn live(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| h.is_live())
            .count()
    }

    pub fn close_all(&self) {
        let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("Closing {} connections", handles.len());
        for handle in handles.iter() {
            handle.close();
        }
    }
}
