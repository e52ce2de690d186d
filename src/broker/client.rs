/// cTrader Open API streaming client: TLS WebSocket lifecycle, app and
/// account authentication, request/response correlation, heartbeat and
/// reconnection with linear backoff.
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};

use crate::broker::codec::{
    decode_envelope, decode_error_res, decode_payload, encode_envelope, encode_payload,
    PayloadType,
};
use crate::broker::messages::{
    AccountAuthReq, AccountAuthRes, ApplicationAuthReq, ClientDisconnectEvent, ExecutionEvent,
    GetAccountsByTokenReq, GetAccountsByTokenRes, OrderErrorEvent, ProtoHeartbeatEvent,
    ProtoMessage, SpotEvent, TraderUpdateEvent,
};
use crate::error::{BotError, Result};
use crate::types::Credentials;

const DEMO_URL: &str = "wss://demo.ctraderapi.com:5035";
const LIVE_URL: &str = "wss://live.ctraderapi.com:5035";

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 10;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Typed fan-out of everything the broker pushes at us
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    Authenticated { account_id: i64 },
    Spot(SpotEvent),
    Execution(ExecutionEvent),
    OrderError(OrderErrorEvent),
    TraderUpdate(TraderUpdateEvent),
    ClientDisconnect { reason: Option<String> },
    Disconnected { reason: String },
    /// Unknown payload types are delivered opaquely
    Message { payload_type: u32, payload: Vec<u8> },
}

struct PendingRequest {
    expected_type: u32,
    response_tx: oneshot::Sender<Result<ProtoMessage>>,
}

struct Shared {
    credentials: RwLock<Option<Credentials>>,
    account_id: RwLock<Option<i64>>,
    authenticated: RwLock<bool>,

    /// Identity of the live socket; every socket task checks this before
    /// touching state so stale callbacks from dead sockets are ignored
    generation: AtomicU64,
    writer: RwLock<Option<mpsc::UnboundedSender<Message>>>,

    pending: Mutex<HashMap<String, PendingRequest>>,
    events_tx: broadcast::Sender<BrokerEvent>,

    reconnecting: AtomicBool,
    reconnect_attempts: AtomicU32,
    request_timeout: Duration,
}

pub struct BrokerClient {
    shared: Arc<Shared>,
}

impl BrokerClient {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(1024);
        BrokerClient {
            shared: Arc::new(Shared {
                credentials: RwLock::new(None),
                account_id: RwLock::new(None),
                authenticated: RwLock::new(false),
                generation: AtomicU64::new(0),
                writer: RwLock::new(None),
                pending: Mutex::new(HashMap::new()),
                events_tx,
                reconnecting: AtomicBool::new(false),
                reconnect_attempts: AtomicU32::new(0),
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            }),
        }
    }

    /// Connect, authenticate the application and the account, and emit
    /// `Authenticated`. Authentication failures are non-retryable and
    /// surface here; transport failures after this point go through the
    /// reconnect loop.
    pub async fn connect(&self, credentials: Credentials) -> Result<()> {
        {
            let mut creds = self.shared.credentials.write().await;
            *creds = Some(credentials);
        }

        Self::open_socket(Arc::clone(&self.shared)).await?;

        match Self::authenticate(&self.shared).await {
            Ok(account_id) => {
                info!("✅ Broker session authenticated (account {})", account_id);
                Ok(())
            }
            Err(e) => {
                // Do not keep credentials: a bad secret must not reconnect-loop
                {
                    let mut creds = self.shared.credentials.write().await;
                    *creds = None;
                }
                Self::teardown_socket(&self.shared, "authentication failed").await;
                Err(e)
            }
        }
    }

    /// Cancel heartbeat, close the socket, fail all pending requests and
    /// reset auth state.
    pub async fn disconnect(&self) {
        {
            let mut creds = self.shared.credentials.write().await;
            *creds = None;
        }
        Self::teardown_socket(&self.shared, "client disconnect").await;
        info!("🔌 Broker client disconnected");
    }

    /// Correlated request/response with a per-request deadline
    pub async fn request(
        &self,
        request_type: PayloadType,
        payload: Vec<u8>,
    ) -> Result<ProtoMessage> {
        let expected = request_type
            .response_type()
            .ok_or_else(|| BotError::Internal(format!("{} has no response", request_type.as_str())))?;
        Self::request_inner(&self.shared, request_type, payload, expected).await
    }

    /// Fire-and-forget write (orders are confirmed via execution events)
    pub async fn send(&self, payload_type: PayloadType, payload: Vec<u8>) -> Result<()> {
        let writer = {
            let guard = self.shared.writer.read().await;
            guard.clone()
        };
        let writer = writer.ok_or_else(|| BotError::Disconnected("no active socket".to_string()))?;
        let frame = encode_envelope(payload_type, payload, None);
        writer
            .send(Message::Binary(frame))
            .map_err(|_| BotError::Disconnected("writer closed".to_string()))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BrokerEvent> {
        self.shared.events_tx.subscribe()
    }

    pub async fn account_id(&self) -> Option<i64> {
        let id = self.shared.account_id.read().await;
        *id
    }

    pub async fn is_authenticated(&self) -> bool {
        let auth = self.shared.authenticated.read().await;
        *auth
    }

    // ---- internals ----

    fn open_socket(shared: Arc<Shared>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
        Box::pin(Self::open_socket_inner(shared))
    }

    async fn open_socket_inner(shared: Arc<Shared>) -> Result<()> {
        let url = {
            let creds = shared.credentials.read().await;
            let creds = creds
                .as_ref()
                .ok_or_else(|| BotError::Internal("connect without credentials".to_string()))?;
            if creds.is_demo { DEMO_URL } else { LIVE_URL }
        };

        info!("🔌 Connecting to {}", url);

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| BotError::Handshake(format!("{}", e)))?;

        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (mut write, mut read) = ws_stream.split();
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Message>();

        {
            let mut writer = shared.writer.write().await;
            *writer = Some(writer_tx);
        }

        // Single writer serializes all outbound frames
        let writer_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(msg) = writer_rx.recv().await {
                if writer_shared.generation.load(Ordering::SeqCst) != generation {
                    break;
                }
                if let Err(e) = write.send(msg).await {
                    warn!("WebSocket write failed: {}", e);
                    break;
                }
            }
            debug!("Writer task ended (generation {})", generation);
        });

        // Single reader demultiplexes all inbound frames
        let reader_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                if reader_shared.generation.load(Ordering::SeqCst) != generation {
                    debug!("Dropping frame from stale socket");
                    return;
                }
                match msg {
                    Ok(Message::Binary(data)) => {
                        Self::handle_frame(&reader_shared, &data).await;
                    }
                    Ok(Message::Close(_)) => {
                        warn!("WebSocket closed by server");
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(_) => {}
                    Err(e) => {
                        error!("WebSocket read error: {}", e);
                        break;
                    }
                }
            }
            Self::handle_socket_closed(reader_shared, generation, "socket closed".to_string())
                .await;
        });

        // Heartbeat every 10s while this socket is current
        let hb_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                if hb_shared.generation.load(Ordering::SeqCst) != generation {
                    break;
                }
                let writer = {
                    let guard = hb_shared.writer.read().await;
                    guard.clone()
                };
                let Some(writer) = writer else { break };
                let frame = encode_envelope(
                    PayloadType::HeartbeatEvent,
                    encode_payload(&ProtoHeartbeatEvent {}),
                    None,
                );
                if writer.send(Message::Binary(frame)).is_err() {
                    break;
                }
                debug!("💓 Heartbeat sent");
            }
        });

        Ok(())
    }

    /// AppAuth -> GetAccounts -> AccountAuth
    async fn authenticate(shared: &Arc<Shared>) -> Result<i64> {
        let creds = {
            let guard = shared.credentials.read().await;
            guard
                .clone()
                .ok_or_else(|| BotError::Internal("authenticate without credentials".to_string()))?
        };

        let app_auth = ApplicationAuthReq {
            client_id: creds.client_id.clone(),
            client_secret: creds.client_secret.clone(),
        };
        Self::request_inner(
            shared,
            PayloadType::ApplicationAuthReq,
            encode_payload(&app_auth),
            PayloadType::ApplicationAuthRes,
        )
        .await
        .map_err(auth_error)?;
        debug!("Application authenticated");

        let account_id = match creds.account_id {
            Some(id) => id,
            None => {
                let req = GetAccountsByTokenReq {
                    access_token: creds.access_token.clone(),
                };
                let res = Self::request_inner(
                    shared,
                    PayloadType::GetAccountsByTokenReq,
                    encode_payload(&req),
                    PayloadType::GetAccountsByTokenRes,
                )
                .await
                .map_err(auth_error)?;
                let accounts: GetAccountsByTokenRes =
                    decode_payload(res.payload.as_deref().unwrap_or_default())?;
                accounts
                    .accounts
                    .first()
                    .map(|a| a.ctid_trader_account_id)
                    .ok_or_else(|| BotError::Auth("no trading accounts for token".to_string()))?
            }
        };

        let account_auth = AccountAuthReq {
            ctid_trader_account_id: account_id,
            access_token: creds.access_token.clone(),
        };
        let res = Self::request_inner(
            shared,
            PayloadType::AccountAuthReq,
            encode_payload(&account_auth),
            PayloadType::AccountAuthRes,
        )
        .await
        .map_err(auth_error)?;
        let auth_res: AccountAuthRes = decode_payload(res.payload.as_deref().unwrap_or_default())?;

        {
            let mut id = shared.account_id.write().await;
            *id = Some(auth_res.ctid_trader_account_id);
        }
        {
            let mut auth = shared.authenticated.write().await;
            *auth = true;
        }
        shared.reconnect_attempts.store(0, Ordering::SeqCst);

        let _ = shared.events_tx.send(BrokerEvent::Authenticated {
            account_id: auth_res.ctid_trader_account_id,
        });

        Ok(auth_res.ctid_trader_account_id)
    }

    async fn request_inner(
        shared: &Arc<Shared>,
        request_type: PayloadType,
        payload: Vec<u8>,
        expected: PayloadType,
    ) -> Result<ProtoMessage> {
        let writer = {
            let guard = shared.writer.read().await;
            guard.clone()
        };
        let writer = writer.ok_or_else(|| BotError::Disconnected("no active socket".to_string()))?;

        let client_msg_id = uuid::Uuid::new_v4().simple().to_string();
        let (response_tx, response_rx) = oneshot::channel();

        {
            let mut pending = shared.pending.lock().await;
            pending.insert(
                client_msg_id.clone(),
                PendingRequest {
                    expected_type: expected.id(),
                    response_tx,
                },
            );
        }

        let frame = encode_envelope(request_type, payload, Some(client_msg_id.clone()));
        if writer.send(Message::Binary(frame)).is_err() {
            let mut pending = shared.pending.lock().await;
            pending.remove(&client_msg_id);
            return Err(BotError::Disconnected("writer closed".to_string()));
        }

        match tokio::time::timeout(shared.request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BotError::Disconnected("response channel dropped".to_string())),
            Err(_) => {
                let mut pending = shared.pending.lock().await;
                pending.remove(&client_msg_id);
                Err(BotError::Timeout(format!(
                    "{} deadline exceeded",
                    request_type.as_str()
                )))
            }
        }
    }

    async fn handle_frame(shared: &Arc<Shared>, data: &[u8]) {
        let envelope = match decode_envelope(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Undecodable frame: {}", e);
                return;
            }
        };

        // Matched response path
        if let Some(msg_id) = envelope.client_msg_id.clone() {
            let slot = {
                let mut pending = shared.pending.lock().await;
                pending.remove(&msg_id)
            };
            if let Some(slot) = slot {
                let result = if envelope.payload_type == PayloadType::ErrorRes.id() {
                    let (code, description) =
                        decode_error_res(envelope.payload.as_deref().unwrap_or_default());
                    Err(BotError::Broker { code, description })
                } else if envelope.payload_type != slot.expected_type {
                    Err(BotError::Codec(format!(
                        "expected payload type {} got {}",
                        slot.expected_type, envelope.payload_type
                    )))
                } else {
                    Ok(envelope)
                };
                let _ = slot.response_tx.send(result);
                return;
            }
        }

        Self::dispatch_event(shared, envelope);
    }

    /// Push-path demultiplexer. Emitting never holds internal locks.
    fn dispatch_event(shared: &Arc<Shared>, envelope: ProtoMessage) {
        let payload = envelope.payload.unwrap_or_default();
        let event = match PayloadType::from_id(envelope.payload_type) {
            Some(PayloadType::SpotEvent) => match decode_payload::<SpotEvent>(&payload) {
                Ok(spot) => BrokerEvent::Spot(spot),
                Err(e) => {
                    warn!("Bad spot event: {}", e);
                    return;
                }
            },
            Some(PayloadType::ExecutionEvent) => match decode_payload::<ExecutionEvent>(&payload) {
                Ok(exec) => BrokerEvent::Execution(exec),
                Err(e) => {
                    warn!("Bad execution event: {}", e);
                    return;
                }
            },
            Some(PayloadType::OrderErrorEvent) => {
                match decode_payload::<OrderErrorEvent>(&payload) {
                    Ok(err) => BrokerEvent::OrderError(err),
                    Err(e) => {
                        warn!("Bad order error event: {}", e);
                        return;
                    }
                }
            }
            Some(PayloadType::TraderUpdateEvent) => {
                match decode_payload::<TraderUpdateEvent>(&payload) {
                    Ok(update) => BrokerEvent::TraderUpdate(update),
                    Err(e) => {
                        warn!("Bad trader update: {}", e);
                        return;
                    }
                }
            }
            Some(PayloadType::ClientDisconnectEvent) => {
                let reason = decode_payload::<ClientDisconnectEvent>(&payload)
                    .ok()
                    .and_then(|e| e.reason);
                warn!("⚠️  Broker requested disconnect: {:?}", reason);
                BrokerEvent::ClientDisconnect { reason }
            }
            Some(PayloadType::HeartbeatEvent) => {
                debug!("💓 Heartbeat received");
                return;
            }
            _ => BrokerEvent::Message {
                payload_type: envelope.payload_type,
                payload,
            },
        };
        let _ = shared.events_tx.send(event);
    }

    async fn teardown_socket(shared: &Arc<Shared>, reason: &str) {
        // Bumping the generation detaches reader/writer/heartbeat tasks
        shared.generation.fetch_add(1, Ordering::SeqCst);
        {
            let mut writer = shared.writer.write().await;
            *writer = None;
        }
        {
            let mut auth = shared.authenticated.write().await;
            *auth = false;
        }
        Self::fail_all_pending(shared, reason).await;
    }

    async fn fail_all_pending(shared: &Arc<Shared>, reason: &str) {
        let drained: Vec<PendingRequest> = {
            let mut pending = shared.pending.lock().await;
            pending.drain().map(|(_, slot)| slot).collect()
        };
        let count = drained.len();
        for slot in drained {
            let _ = slot
                .response_tx
                .send(Err(BotError::Disconnected(reason.to_string())));
        }
        if count > 0 {
            warn!("Failed {} pending requests: {}", count, reason);
        }
    }

    async fn handle_socket_closed(shared: Arc<Shared>, generation: u64, reason: String) {
        if shared.generation.load(Ordering::SeqCst) != generation {
            // A newer socket already exists; this callback is stale
            return;
        }

        warn!("📴 Socket closed: {}", reason);
        Self::teardown_socket(&shared, &reason).await;
        let _ = shared.events_tx.send(BrokerEvent::Disconnected {
            reason: reason.clone(),
        });

        let has_credentials = {
            let creds = shared.credentials.read().await;
            creds.is_some()
        };
        if !has_credentials {
            return;
        }
        if shared
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        tokio::spawn(async move {
            loop {
                let attempt = shared.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt > MAX_RECONNECT_ATTEMPTS {
                    error!("❌ Gave up reconnecting after {} attempts", attempt - 1);
                    break;
                }

                let delay = RECONNECT_BASE_DELAY * attempt;
                warn!(
                    "Reconnecting (attempt {}/{}) in {}s...",
                    attempt,
                    MAX_RECONNECT_ATTEMPTS,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;

                {
                    let creds = shared.credentials.read().await;
                    if creds.is_none() {
                        break;
                    }
                }

                match Self::open_socket(Arc::clone(&shared)).await {
                    Ok(_) => match Self::authenticate(&shared).await {
                        Ok(account_id) => {
                            info!("✅ Reconnected and re-authenticated (account {})", account_id);
                            break;
                        }
                        Err(e) if e.is_fatal() => {
                            error!("❌ Re-authentication failed permanently: {}", e);
                            let mut creds = shared.credentials.write().await;
                            *creds = None;
                            break;
                        }
                        Err(e) => {
                            warn!("Re-authentication failed: {}", e);
                        }
                    },
                    Err(e) => {
                        warn!("Reconnect attempt {} failed: {}", attempt, e);
                    }
                }
            }
            shared.reconnecting.store(false, Ordering::SeqCst);
        });
    }
}

impl Default for BrokerClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Broker rejections during the auth chain are authentication failures
fn auth_error(e: BotError) -> BotError {
    match e {
        BotError::Broker { code, description } => {
            BotError::Auth(format!("{}: {}", code, description))
        }
        other => other,
    }
}

#[cfg(test)]
impl BrokerClient {
    /// Install a writer channel without a socket, for correlation tests
    pub(crate) async fn test_install_writer(&self) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut writer = self.shared.writer.write().await;
        *writer = Some(tx);
        rx
    }

    pub(crate) async fn test_inject_frame(&self, data: &[u8]) {
        Self::handle_frame(&self.shared, data).await;
    }

    pub(crate) async fn test_fail_pending(&self, reason: &str) {
        Self::fail_all_pending(&self.shared, reason).await;
    }
}
