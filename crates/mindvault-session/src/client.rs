//! Client role: one TCP connection to a host, inbound lines turned into
//! typed events.
//!
//! The agent owns exactly one connection and one background read loop. Sends
//! are fire-and-forget enqueues onto the connection's writer task, so they
//! never block the read loop. The agent caches its own id (from `WELCOME`)
//! and a roster mirror keyed by participant id, letting the UI render a
//! consistent participant list without re-querying the host.
//!
//! # Lifecycle
//!
//! ```text
//! 1. discover_host(code, timeout)        (mindvault-discovery)
//! 2. ClientSession::connect(endpoint)    — idempotent when already connected
//! 3. send_join(name, avatar) → Welcome / PJoin events flow
//! 4. send_ready(true) / send_buzz() / send_leave()
//! 5. HostLeft event (explicit HOSTLEFT or stream termination) → disconnect()
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use mindvault_core::{GameOverPayload, ParticipantInfo, SessionError};
use mindvault_protocol::{ClientCommand, HostMessage};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

// ── Events ────────────────────────────────────────────────────────────────────

/// Client-side events, one per client-bound protocol command, plus the
/// synthesized terminal [`HostLeft`](ClientEvent::HostLeft) — distinct from
/// an ordinary participant departure.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The host assigned this connection its id.
    Welcome { id: String },
    ParticipantJoined(ParticipantInfo),
    ParticipantLeft { id: String },
    ReadyChanged { id: String, ready: bool },
    GameStarted,
    /// Floor granted to a participant; `deadline_ticks` is Unix millis.
    BuzzWinner { id: String, name: String, deadline_ticks: i64 },
    BuzzReset,
    ScoreUpdated { id: String, score: i32 },
    /// `id` is `"*"` when every buzzer was re-enabled at once.
    BuzzerEnabledChanged { id: String, enabled: bool },
    QuestionState { index: u32, total: u32 },
    TimeUp { id: String },
    StopTimer { id: String },
    CorrectAnswer { answer: String },
    Wrong { id: String, name: String },
    GameOver(GameOverPayload),
    /// The session is permanently over: the host said so, or the stream died.
    HostLeft,
}

// ── Internal state ────────────────────────────────────────────────────────────

struct Conn {
    outbound: mpsc::UnboundedSender<String>,
    read_task: JoinHandle<()>,
}

struct ClientShared {
    conn: Mutex<Option<Conn>>,
    connected: AtomicBool,
    participants: Mutex<HashMap<String, ParticipantInfo>>,
    self_id: Mutex<Option<String>>,
    game_started: AtomicBool,
    events: broadcast::Sender<ClientEvent>,
}

// ── ClientSession ─────────────────────────────────────────────────────────────

/// Thin session agent connecting one device to a discovered host.
pub struct ClientSession {
    shared: Arc<ClientShared>,
}

impl ClientSession {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(ClientShared {
                conn: Mutex::new(None),
                connected: AtomicBool::new(false),
                participants: Mutex::new(HashMap::new()),
                self_id: Mutex::new(None),
                game_started: AtomicBool::new(false),
                events,
            }),
        }
    }

    /// Subscribe to inbound events. Each subscriber gets its own cursor.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.shared.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn game_started(&self) -> bool {
        self.shared.game_started.load(Ordering::SeqCst)
    }

    /// The id the host assigned to this connection, once `WELCOME` arrived.
    pub fn self_id(&self) -> Option<String> {
        self.shared.self_id.lock().unwrap().clone()
    }

    /// Snapshot of every participant currently known to this client.
    pub fn participants(&self) -> Vec<ParticipantInfo> {
        self.shared.participants.lock().unwrap().values().cloned().collect()
    }

    /// Open the TCP connection and start the read loop.
    ///
    /// Calling connect while already connected is a no-op success.
    pub async fn connect(&self, endpoint: SocketAddr) -> Result<(), SessionError> {
        if self.is_connected() {
            return Ok(());
        }

        let stream = TcpStream::connect(endpoint).await.map_err(|e| {
            SessionError::ConnectionFailed { reason: format!("{endpoint}: {e}") }
        })?;
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(writer_loop(write_half, outbound_rx));
        let read_task = tokio::spawn(read_loop(Arc::clone(&self.shared), read_half));

        *self.shared.conn.lock().unwrap() = Some(Conn { outbound: outbound_tx, read_task });
        self.shared.connected.store(true, Ordering::SeqCst);
        info!("[Client] Connected to host at {}", endpoint);
        Ok(())
    }

    /// Request to join the room with display metadata.
    pub fn send_join(&self, name: &str, avatar: &str) -> Result<(), SessionError> {
        self.send(&ClientCommand::Join { name: name.to_owned(), avatar: avatar.to_owned() })
    }

    /// Toggle this participant's ready flag.
    pub fn send_ready(&self, ready: bool) -> Result<(), SessionError> {
        self.send(&ClientCommand::Ready { id: None, ready })
    }

    /// Attempt to claim the floor for the current question.
    pub fn send_buzz(&self) -> Result<(), SessionError> {
        self.send(&ClientCommand::Buzz)
    }

    /// Announce a graceful departure; the host removes us on receipt.
    pub fn send_leave(&self) -> Result<(), SessionError> {
        self.send(&ClientCommand::Leave)
    }

    /// Drop the connection and clear all cached session state.
    pub fn disconnect(&self) {
        if let Some(conn) = self.shared.conn.lock().unwrap().take() {
            conn.read_task.abort();
            // Dropping `outbound` ends the writer task and closes the socket.
        }
        clear_session_state(&self.shared);
    }

    fn send(&self, cmd: &ClientCommand) -> Result<(), SessionError> {
        let conn = self.shared.conn.lock().unwrap();
        let Some(conn) = conn.as_ref() else {
            return Err(SessionError::NotConnected);
        };
        conn.outbound
            .send(format!("{}\n", cmd.encode()))
            .map_err(|e| SessionError::SendFailed { reason: e.to_string() })
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ── Connection tasks ──────────────────────────────────────────────────────────

async fn writer_loop(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        if write_half.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
    let _ = write_half.shutdown().await;
}

async fn read_loop(shared: Arc<ClientShared>, read_half: OwnedReadHalf) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) | Err(_) => break,
        };
        let Some(msg) = HostMessage::parse(&line) else {
            debug!("[Client] Dropping unrecognized line: {:?}", line);
            continue;
        };
        let terminal = matches!(msg, HostMessage::HostLeft);
        apply_message(&shared, msg);
        if terminal {
            clear_session_state(&shared);
            return;
        }
    }

    // Stream ended without HOSTLEFT: surface the same terminal signal so the
    // UI can distinguish "session over" from an ordinary PLEFT.
    let _ = shared.events.send(ClientEvent::HostLeft);
    clear_session_state(&shared);
    debug!("[Client] Stream terminated; session over");
}

/// Reset the agent to its pre-connect state: drop the connection handle and
/// every cached piece of the old session, so a later connect to a different
/// host does not start with a ghost roster or a stale self-id. Taking the
/// `Conn` closes the outbound queue; the writer task drains and exits.
fn clear_session_state(shared: &Arc<ClientShared>) {
    let _ = shared.conn.lock().unwrap().take();
    shared.connected.store(false, Ordering::SeqCst);
    shared.participants.lock().unwrap().clear();
    *shared.self_id.lock().unwrap() = None;
    shared.game_started.store(false, Ordering::SeqCst);
}

/// Apply one inbound message: update the roster mirror / cached state, then
/// emit the corresponding event.
fn apply_message(shared: &Arc<ClientShared>, msg: HostMessage) {
    let event = match msg {
        HostMessage::Welcome { id } => {
            *shared.self_id.lock().unwrap() = Some(id.clone());
            ClientEvent::Welcome { id }
        }
        HostMessage::PJoin { id, name, avatar, ready } => {
            let info = ParticipantInfo { id: id.clone(), name, avatar, ready };
            shared.participants.lock().unwrap().insert(id, info.clone());
            ClientEvent::ParticipantJoined(info)
        }
        HostMessage::PLeft { id } => {
            shared.participants.lock().unwrap().remove(&id);
            ClientEvent::ParticipantLeft { id }
        }
        HostMessage::PReady { id, ready } => {
            if let Some(p) = shared.participants.lock().unwrap().get_mut(&id) {
                p.ready = ready;
            }
            ClientEvent::ReadyChanged { id, ready }
        }
        HostMessage::Start => {
            shared.game_started.store(true, Ordering::SeqCst);
            ClientEvent::GameStarted
        }
        HostMessage::BuzzWin { id, name, deadline_ticks } => {
            ClientEvent::BuzzWinner { id, name, deadline_ticks }
        }
        HostMessage::BuzzReset => ClientEvent::BuzzReset,
        HostMessage::Score { id, score } => ClientEvent::ScoreUpdated { id, score },
        HostMessage::DisableUser { id } => {
            ClientEvent::BuzzerEnabledChanged { id, enabled: false }
        }
        HostMessage::EnableAll => {
            ClientEvent::BuzzerEnabledChanged { id: "*".to_owned(), enabled: true }
        }
        HostMessage::State { index, total } => ClientEvent::QuestionState { index, total },
        HostMessage::TimeUp { id } => ClientEvent::TimeUp { id },
        HostMessage::StopTimer { id } => ClientEvent::StopTimer { id },
        HostMessage::Correct { answer } => ClientEvent::CorrectAnswer { answer },
        HostMessage::Wrong { id, name } => ClientEvent::Wrong { id, name },
        HostMessage::GameOver { json } => {
            shared.game_started.store(false, Ordering::SeqCst);
            match serde_json::from_str::<GameOverPayload>(&json) {
                Ok(payload) => ClientEvent::GameOver(payload),
                Err(e) => {
                    // Soft-fail: a bad snapshot must not kill the read loop.
                    debug!("[Client] Undecodable game-over payload: {}", e);
                    return;
                }
            }
        }
        HostMessage::HostLeft => {
            shared.game_started.store(false, Ordering::SeqCst);
            ClientEvent::HostLeft
        }
    };
    let _ = shared.events.send(event);
}
