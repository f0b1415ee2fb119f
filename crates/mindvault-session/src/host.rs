//! Host role: authoritative session state for one quiz room.
//!
//! # Concurrency
//!
//! The host runs N+2 tasks: one accept loop, one beacon loop, and one read
//! loop per connected client, plus one writer task per connection draining
//! an unbounded outbound queue (a slow client never stalls a broadcast).
//! Shared state lives behind independent locks matching the structure being
//! touched — registry, scores, buzz arbiter, debounce map — and broadcasts
//! snapshot the live connections under the registry lock, then enqueue
//! outside it. Nothing awaits while holding a lock.
//!
//! # Lifecycle
//!
//! [`HostSession::start`] binds an ephemeral TCP port and starts the beacon;
//! [`HostSession::shutdown`] broadcasts `HOSTLEFT`, cancels every loop,
//! closes every socket and clears all in-memory state. That is the only path
//! that tells clients the session is permanently over.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use mindvault_core::{GameOverPayload, ParticipantInfo, QuestionCursor, SessionError};
use mindvault_discovery::RoomBeacon;
use mindvault_protocol::{ClientCommand, HostMessage};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::gameover;

/// Default answer window granted to a buzz winner.
pub const ANSWER_WINDOW: Duration = Duration::from_secs(10);

/// Anti-spam window: repeat buzzes from one participant inside it are dropped.
pub const BUZZ_DEBOUNCE: Duration = Duration::from_millis(250);

/// Deadline estimate sent to a late joiner while the floor is locked. The
/// true remaining time is not tracked per-connection; this is best-effort.
const RECONNECT_DEADLINE_ESTIMATE: Duration = Duration::from_secs(5);

// ── Events ────────────────────────────────────────────────────────────────────

/// Host-side events for the lobby/judge UI. Fire-and-forget: delivered to
/// every live subscriber, dropped when nobody listens.
#[derive(Debug, Clone)]
pub enum HostEvent {
    ParticipantJoined(ParticipantInfo),
    ParticipantLeft { id: String },
    ReadyChanged { id: String, ready: bool },
    BuzzWinner(ParticipantInfo),
    GameOver(GameOverPayload),
}

// ── Internal state ────────────────────────────────────────────────────────────

struct Peer {
    info: ParticipantInfo,
    outbound: mpsc::UnboundedSender<String>,
}

impl Peer {
    fn send(&self, msg: &HostMessage) {
        // Enqueue only; the connection's writer task performs the I/O.
        let _ = self.outbound.send(format!("{}\n", msg.encode()));
    }
}

#[derive(Default)]
struct BuzzState {
    locked: bool,
    winner_id: Option<String>,
    winner_name: Option<String>,
    disabled: HashSet<String>,
    timer: Option<JoinHandle<()>>,
}

impl BuzzState {
    fn unlock(&mut self) {
        self.locked = false;
        self.winner_id = None;
        self.winner_name = None;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct HostShared {
    room_code: String,
    port: u16,
    registry: Mutex<HashMap<String, Peer>>,
    scores: Mutex<HashMap<String, i32>>,
    buzz: Mutex<BuzzState>,
    last_buzz_at: Mutex<HashMap<String, Instant>>,
    question: Mutex<QuestionCursor>,
    deck: Mutex<(Option<i64>, String)>,
    answer_window: Duration,
    game_started: AtomicBool,
    events: broadcast::Sender<HostEvent>,
    shutdown_tx: watch::Sender<bool>,
}

// ── HostSession ───────────────────────────────────────────────────────────────

/// Authoritative session manager for one hosted room.
pub struct HostSession {
    shared: Arc<HostShared>,
    accept_task: JoinHandle<()>,
    beacon: Mutex<Option<RoomBeacon>>,
}

impl HostSession {
    /// Bind an ephemeral TCP port, start accepting participants, and begin
    /// advertising `code` on the discovery beacon.
    pub async fn start(code: &str) -> Result<Self, SessionError> {
        Self::start_with_answer_window(code, ANSWER_WINDOW).await
    }

    /// Like [`start`](Self::start), but buzz winners get `answer_window` to
    /// answer instead of the default [`ANSWER_WINDOW`].
    pub async fn start_with_answer_window(
        code: &str,
        answer_window: Duration,
    ) -> Result<Self, SessionError> {
        let listener = TcpListener::bind(("0.0.0.0", 0)).await?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, _) = watch::channel(false);
        let (events, _) = broadcast::channel(64);
        let shared = Arc::new(HostShared {
            room_code: code.to_owned(),
            port,
            registry: Mutex::new(HashMap::new()),
            scores: Mutex::new(HashMap::new()),
            buzz: Mutex::new(BuzzState::default()),
            last_buzz_at: Mutex::new(HashMap::new()),
            question: Mutex::new(QuestionCursor::default()),
            deck: Mutex::new((None, String::new())),
            answer_window,
            game_started: AtomicBool::new(false),
            events,
            shutdown_tx,
        });

        // A failed beacon leaves the room joinable by manual endpoint entry,
        // so hosting proceeds without it.
        let beacon = match RoomBeacon::start(code, port).await {
            Ok(b) => Some(b),
            Err(e) => {
                warn!("[Host] Beacon unavailable: {} — room '{}' not discoverable", e, code);
                None
            }
        };

        let accept_task = tokio::spawn(accept_loop(Arc::clone(&shared), listener));
        info!("[Host] Room '{}' hosting on TCP port {}", code, port);

        Ok(Self { shared, accept_task, beacon: Mutex::new(beacon) })
    }

    /// TCP port participants connect to (also advertised by the beacon).
    pub fn port(&self) -> u16 {
        self.shared.port
    }

    pub fn room_code(&self) -> &str {
        &self.shared.room_code
    }

    pub fn game_started(&self) -> bool {
        self.shared.game_started.load(Ordering::SeqCst)
    }

    /// Subscribe to host-side events. Each subscriber gets its own cursor.
    pub fn events(&self) -> broadcast::Receiver<HostEvent> {
        self.shared.events.subscribe()
    }

    /// Snapshot of the currently connected participants.
    pub fn participants(&self) -> Vec<ParticipantInfo> {
        let registry = self.shared.registry.lock().unwrap();
        registry.values().map(|p| p.info.clone()).collect()
    }

    /// True when at least one participant is connected and all are ready.
    pub fn are_all_ready(&self) -> bool {
        let registry = self.shared.registry.lock().unwrap();
        !registry.is_empty() && registry.values().all(|p| p.info.ready)
    }

    /// Remember the active deck for rematch/navigation convenience.
    pub fn set_current_deck(&self, id: i64, title: &str) {
        *self.shared.deck.lock().unwrap() = (Some(id), title.to_owned());
    }

    pub fn current_deck(&self) -> (Option<i64>, String) {
        self.shared.deck.lock().unwrap().clone()
    }

    /// Start the game, provided the lobby is non-empty and everyone is ready.
    ///
    /// On success every client receives `START`, `BUZZRESET`, `ENABLEALL`.
    /// On rejection no state changes occur.
    pub fn try_start_game(&self) -> Result<(), SessionError> {
        if !self.are_all_ready() {
            return Err(SessionError::NotAllReady);
        }
        self.shared.game_started.store(true, Ordering::SeqCst);
        self.shared.reset_buzz_state();
        self.shared.broadcast(&HostMessage::Start);
        self.shared.broadcast(&HostMessage::BuzzReset);
        self.shared.broadcast(&HostMessage::EnableAll);
        Ok(())
    }

    /// Fully reopen the floor: clear all disablement and unlock the arbiter.
    /// Used when advancing to a new question.
    pub fn open_buzz_for_all(&self) {
        self.shared.reset_buzz_state();
        self.shared.broadcast(&HostMessage::EnableAll);
    }

    /// Reject the current winner's answer: unlock the floor but bar the
    /// loser from re-buzzing, giving everyone else a chance to steal.
    pub fn reopen_buzz_except_winner(&self) {
        let loser = {
            let mut buzz = self.shared.buzz.lock().unwrap();
            let loser = buzz.winner_id.take();
            buzz.unlock();
            if let Some(id) = &loser {
                buzz.disabled.insert(id.clone());
            }
            loser
        };
        if let Some(id) = loser {
            let name = {
                let registry = self.shared.registry.lock().unwrap();
                registry.get(&id).map(|p| p.info.name.clone()).unwrap_or_default()
            };
            self.shared.broadcast(&HostMessage::DisableUser { id: id.clone() });
            self.shared.broadcast(&HostMessage::Wrong { id, name });
        }
        self.shared.broadcast(&HostMessage::BuzzReset);
    }

    /// Mutate the score table (floor 0) and broadcast the new value.
    pub fn award_point(&self, id: &str, delta: i32) -> i32 {
        let score = {
            let mut scores = self.shared.scores.lock().unwrap();
            let entry = scores.entry(id.to_owned()).or_insert(0);
            *entry = (*entry + delta).max(0);
            *entry
        };
        self.shared.broadcast(&HostMessage::Score { id: id.to_owned(), score });
        score
    }

    /// Cancel the in-flight answer countdown without changing any score.
    pub fn stop_timer_for(&self, id: &str) {
        {
            let mut buzz = self.shared.buzz.lock().unwrap();
            if let Some(timer) = buzz.timer.take() {
                timer.abort();
            }
        }
        self.shared.broadcast(&HostMessage::StopTimer { id: id.to_owned() });
    }

    /// Reveal the correct answer text to every client.
    pub fn announce_correct_answer(&self, answer: &str) {
        self.shared.broadcast(&HostMessage::Correct { answer: answer.to_owned() });
    }

    /// Push the question cursor (1-based index / total) to every client.
    pub fn update_question_state(&self, index: u32, total: u32) {
        *self.shared.question.lock().unwrap() = QuestionCursor { index, total };
        self.shared.broadcast(&HostMessage::State { index, total });
    }

    /// Finalize the game: broadcast the scoreboard snapshot once, then
    /// return to the not-started state ready for a rematch.
    pub fn game_over(&self, deck_title: &str) -> GameOverPayload {
        let connected = self.participants();
        let payload = {
            let scores = self.shared.scores.lock().unwrap();
            gameover::build_snapshot(
                &connected,
                |id| scores.get(id).copied().unwrap_or(0),
                deck_title,
            )
        };

        match serde_json::to_string(&payload) {
            Ok(json) => self.shared.broadcast(&HostMessage::GameOver { json }),
            Err(e) => warn!("[Host] Game-over payload failed to serialize: {}", e),
        }
        let _ = self.shared.events.send(HostEvent::GameOver(payload.clone()));

        self.shared.game_started.store(false, Ordering::SeqCst);
        self.shared.reset_buzz_state();
        self.shared.broadcast(&HostMessage::EnableAll);
        payload
    }

    /// Zero the scores of currently connected participants (stale scores of
    /// departed players are purged) and immediately re-enter the started
    /// state.
    pub fn start_rematch(&self) {
        let ids: Vec<String> = {
            let registry = self.shared.registry.lock().unwrap();
            registry.keys().cloned().collect()
        };
        {
            let mut scores = self.shared.scores.lock().unwrap();
            scores.retain(|id, _| ids.contains(id));
            for id in &ids {
                scores.insert(id.clone(), 0);
            }
        }
        for id in &ids {
            self.shared.broadcast(&HostMessage::Score { id: id.clone(), score: 0 });
        }

        self.shared.game_started.store(true, Ordering::SeqCst);
        self.shared.reset_buzz_state();
        self.shared.broadcast(&HostMessage::BuzzReset);
        self.shared.broadcast(&HostMessage::EnableAll);
        self.shared.broadcast(&HostMessage::Start);
    }

    /// Tear the room down: `HOSTLEFT` to every client, cancel the accept and
    /// beacon loops, close every socket, clear all in-memory state.
    pub fn shutdown(&self) {
        info!("[Host] Shutting down room '{}'", self.shared.room_code);
        self.shared.broadcast(&HostMessage::HostLeft);

        let _ = self.shared.shutdown_tx.send(true);
        self.accept_task.abort();
        if let Some(beacon) = self.beacon.lock().unwrap().take() {
            beacon.stop();
        }

        // Dropping the peers closes their outbound queues; each writer task
        // drains what is already enqueued (HOSTLEFT included) and exits,
        // closing the socket.
        self.shared.registry.lock().unwrap().clear();
        self.shared.scores.lock().unwrap().clear();
        self.shared.reset_buzz_state();
        self.shared.last_buzz_at.lock().unwrap().clear();
        *self.shared.question.lock().unwrap() = QuestionCursor::default();
        self.shared.game_started.store(false, Ordering::SeqCst);
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Shared-state helpers ──────────────────────────────────────────────────────

impl HostShared {
    /// Enqueue one message to every connected client. The connection snapshot
    /// is taken under the registry lock; enqueueing never blocks on I/O.
    fn broadcast(&self, msg: &HostMessage) {
        let line = format!("{}\n", msg.encode());
        let senders: Vec<mpsc::UnboundedSender<String>> = {
            let registry = self.registry.lock().unwrap();
            registry.values().map(|p| p.outbound.clone()).collect()
        };
        for tx in senders {
            let _ = tx.send(line.clone());
        }
    }

    /// Unlock the arbiter, clear every disablement, cancel the answer timer.
    fn reset_buzz_state(&self) {
        let mut buzz = self.buzz.lock().unwrap();
        buzz.unlock();
        buzz.disabled.clear();
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

async fn accept_loop(shared: Arc<HostShared>, listener: TcpListener) {
    let mut shutdown_rx = shared.shutdown_tx.subscribe();
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!("[Host] Connection from {}", addr);
                    tokio::spawn(handle_connection(Arc::clone(&shared), stream));
                }
                Err(e) => {
                    warn!("[Host] Accept failed: {}", e);
                }
            },
        }
    }
    debug!("[Host] Accept loop exited");
}

// ── Per-connection handling ───────────────────────────────────────────────────

async fn writer_loop(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        if write_half.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
    let _ = write_half.shutdown().await;
}

async fn handle_connection(shared: Arc<HostShared>, stream: TcpStream) {
    let _ = stream.set_nodelay(true);
    let (read_half, write_half) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(writer_loop(write_half, outbound_rx));

    let mut lines = BufReader::new(read_half).lines();
    let mut shutdown_rx = shared.shutdown_tx.subscribe();

    // First line must be JOIN; anything else discards the connection silently.
    let joined = join_handshake(&shared, &mut lines, &outbound_tx, &mut shutdown_rx).await;
    let Some(id) = joined else {
        drop(outbound_tx);
        let _ = writer.await;
        return;
    };

    // Steady-state read loop for this participant.
    loop {
        let line = tokio::select! {
            _ = shutdown_rx.changed() => break,
            line = lines.next_line() => line,
        };
        let msg = match line {
            Ok(Some(l)) => l,
            // Peer departure is a normal state transition, not an error.
            Ok(None) | Err(_) => break,
        };
        match ClientCommand::parse(&msg) {
            Some(ClientCommand::Ready { id: target, ready }) => {
                handle_ready(&shared, &id, target, ready);
            }
            Some(ClientCommand::Buzz) => {
                handle_buzz(&shared, &id);
            }
            Some(ClientCommand::Leave) => break,
            // A second JOIN on a live connection is meaningless; drop it,
            // along with anything unparseable.
            Some(ClientCommand::Join { .. }) | None => {
                debug!("[Host] Ignoring line from {}: {:?}", id, msg);
            }
        }
    }

    drop(outbound_tx);
    let _ = writer.await;

    // During shutdown the registry is cleared wholesale; no departure fanout.
    if !*shutdown_rx.borrow() {
        remove_participant(&shared, &id);
    }
}

/// Run the JOIN handshake: assign an id, register the participant, reply
/// `WELCOME`, replay the full room state to the new client, then announce the
/// newcomer to everyone. Returns the assigned id, or `None` when the first
/// line is missing or not a JOIN.
async fn join_handshake(
    shared: &Arc<HostShared>,
    lines: &mut tokio::io::Lines<BufReader<OwnedReadHalf>>,
    outbound_tx: &mpsc::UnboundedSender<String>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Option<String> {
    let first = tokio::select! {
        _ = shutdown_rx.changed() => return None,
        line = lines.next_line() => line.ok().flatten()?,
    };
    let Some(ClientCommand::Join { name, avatar }) = ClientCommand::parse(&first) else {
        debug!("[Host] First line was not JOIN — discarding connection");
        return None;
    };

    let id = uuid::Uuid::new_v4().simple().to_string();
    let info = {
        let mut registry = shared.registry.lock().unwrap();
        let name = if name.is_empty() {
            format!("Player{}", registry.len() + 1)
        } else {
            name
        };
        let mut info = ParticipantInfo::new(id.clone(), name, avatar);
        info.ready = false;
        registry.insert(
            id.clone(),
            Peer { info: info.clone(), outbound: outbound_tx.clone() },
        );
        info
    };
    shared.scores.lock().unwrap().entry(id.clone()).or_insert(0);

    let send = |msg: &HostMessage| {
        let _ = outbound_tx.send(format!("{}\n", msg.encode()));
    };
    send(&HostMessage::Welcome { id: id.clone() });

    let _ = shared.events.send(HostEvent::ParticipantJoined(info.clone()));
    info!("[Host] {} joined as {}", info.name, id);

    // Bootstrap: replay the whole room so a late joiner renders a consistent
    // roster, scoreboard, question cursor and buzz state immediately.
    {
        let registry = shared.registry.lock().unwrap();
        for peer in registry.values() {
            send(&HostMessage::PJoin {
                id: peer.info.id.clone(),
                name: peer.info.name.clone(),
                avatar: peer.info.avatar.clone(),
                ready: peer.info.ready,
            });
        }
    }
    {
        let scores = shared.scores.lock().unwrap();
        for (sid, score) in scores.iter() {
            send(&HostMessage::Score { id: sid.clone(), score: *score });
        }
    }
    {
        let cursor = *shared.question.lock().unwrap();
        if cursor.in_progress() {
            send(&HostMessage::State { index: cursor.index, total: cursor.total });
        }
    }
    {
        let buzz = shared.buzz.lock().unwrap();
        if buzz.locked {
            if let (Some(wid), Some(wname)) = (&buzz.winner_id, &buzz.winner_name) {
                // The exact remaining time is not tracked; estimate.
                send(&HostMessage::BuzzWin {
                    id: wid.clone(),
                    name: wname.clone(),
                    deadline_ticks: unix_millis_from_now(RECONNECT_DEADLINE_ESTIMATE),
                });
            }
        }
        for did in &buzz.disabled {
            send(&HostMessage::DisableUser { id: did.clone() });
        }
    }
    if shared.game_started.load(Ordering::SeqCst) {
        send(&HostMessage::Start);
        send(&HostMessage::BuzzReset);
        send(&HostMessage::EnableAll);
    }

    shared.broadcast(&HostMessage::PJoin {
        id: info.id.clone(),
        name: info.name.clone(),
        avatar: info.avatar.clone(),
        ready: false,
    });

    Some(id)
}

fn handle_ready(shared: &Arc<HostShared>, sender_id: &str, target: Option<String>, ready: bool) {
    let pid = target.unwrap_or_else(|| sender_id.to_owned());
    let known = {
        let mut registry = shared.registry.lock().unwrap();
        match registry.get_mut(&pid) {
            Some(peer) => {
                peer.info.ready = ready;
                true
            }
            None => false,
        }
    };
    if known {
        let _ = shared.events.send(HostEvent::ReadyChanged { id: pid.clone(), ready });
        shared.broadcast(&HostMessage::PReady { id: pid, ready });
    }
}

/// Buzz arbitration: disabled check, 250 ms debounce, then first-to-buzz
/// wins while the arbiter is open. Concurrent buzzes are serialized by the
/// arbiter lock, so exactly one participant ever takes the floor.
fn handle_buzz(shared: &Arc<HostShared>, pid: &str) {
    // Fast path only; the authoritative disabled check happens inside
    // try_take_floor, under the same acquisition that flips the lock.
    if shared.buzz.lock().unwrap().disabled.contains(pid) {
        return;
    }
    {
        let now = Instant::now();
        let mut last = shared.last_buzz_at.lock().unwrap();
        if let Some(prev) = last.get(pid) {
            if now.duration_since(*prev) < BUZZ_DEBOUNCE {
                return;
            }
        }
        last.insert(pid.to_owned(), now);
    }

    let winner = {
        let registry = shared.registry.lock().unwrap();
        match registry.get(pid) {
            Some(peer) => peer.info.clone(),
            None => return,
        }
    };

    if !try_take_floor(shared, &winner) {
        return;
    }

    let _ = shared.events.send(HostEvent::BuzzWinner(winner.clone()));
    shared.broadcast(&HostMessage::BuzzWin {
        id: winner.id,
        name: winner.name,
        deadline_ticks: unix_millis_from_now(shared.answer_window),
    });
}

/// Critical section of buzz arbitration: lock the floor to `winner` if it is
/// open. The disabled set is re-checked here because a judge may bar this
/// participant between the fast-path check and this acquisition; a barred
/// buzzer must never lock the floor.
fn try_take_floor(shared: &Arc<HostShared>, winner: &ParticipantInfo) -> bool {
    let mut buzz = shared.buzz.lock().unwrap();
    if buzz.locked || buzz.disabled.contains(&winner.id) {
        return false; // first lock wins, no queueing
    }
    buzz.locked = true;
    buzz.winner_id = Some(winner.id.clone());
    buzz.winner_name = Some(winner.name.clone());
    if let Some(old) = buzz.timer.take() {
        old.abort();
    }
    buzz.timer = Some(spawn_answer_timer(Arc::clone(shared), winner.id.clone()));
    true
}

/// Fires `TIMEUP` if the answer window elapses while the floor is still
/// locked to the same winner. Cancelled by judgment or a buzz reset.
fn spawn_answer_timer(shared: Arc<HostShared>, winner_id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(shared.answer_window).await;
        let still_winner = {
            let buzz = shared.buzz.lock().unwrap();
            buzz.locked && buzz.winner_id.as_deref() == Some(winner_id.as_str())
        };
        if still_winner {
            debug!("[Host] Answer window expired for {}", winner_id);
            shared.broadcast(&HostMessage::TimeUp { id: winner_id });
        }
    })
}

/// Remove a departed participant atomically and fan the departure out:
/// `PLEFT` to everyone, `BUZZRESET` if the departed held the floor, and a
/// purge of its score and debounce entries. A rejoin is a new identity.
fn remove_participant(shared: &Arc<HostShared>, id: &str) {
    let removed = {
        let mut registry = shared.registry.lock().unwrap();
        registry.remove(id)
    };
    let Some(peer) = removed else { return };

    info!("[Host] {} ({}) left", peer.info.name, id);
    let _ = shared.events.send(HostEvent::ParticipantLeft { id: id.to_owned() });
    shared.broadcast(&HostMessage::PLeft { id: id.to_owned() });

    let held_floor = {
        let mut buzz = shared.buzz.lock().unwrap();
        let held = buzz.winner_id.as_deref() == Some(id);
        if held {
            buzz.unlock();
        }
        buzz.disabled.remove(id);
        held
    };
    if held_floor {
        shared.broadcast(&HostMessage::BuzzReset);
    }

    shared.scores.lock().unwrap().remove(id);
    shared.last_buzz_at.lock().unwrap().remove(id);
}

fn unix_millis_from_now(from_now: Duration) -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    (now + from_now).as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_with(pid: &str, name: &str) -> Arc<HostShared> {
        let (shutdown_tx, _) = watch::channel(false);
        let (events, _) = broadcast::channel(8);
        let shared = Arc::new(HostShared {
            room_code: "AB12C".to_owned(),
            port: 0,
            registry: Mutex::new(HashMap::new()),
            scores: Mutex::new(HashMap::new()),
            buzz: Mutex::new(BuzzState::default()),
            last_buzz_at: Mutex::new(HashMap::new()),
            question: Mutex::new(QuestionCursor::default()),
            deck: Mutex::new((None, String::new())),
            answer_window: ANSWER_WINDOW,
            game_started: AtomicBool::new(false),
            events,
            shutdown_tx,
        });
        let (tx, _rx) = mpsc::unbounded_channel();
        shared.registry.lock().unwrap().insert(
            pid.to_owned(),
            Peer { info: ParticipantInfo::new(pid, name, ""), outbound: tx },
        );
        shared
    }

    #[tokio::test]
    async fn barred_buzzer_never_locks_the_floor() {
        let shared = shared_with("p1", "Ana");
        let winner = ParticipantInfo::new("p1", "Ana", "");

        // The bar may land after the fast-path check has already passed;
        // the arbiter itself must still refuse.
        shared.buzz.lock().unwrap().disabled.insert("p1".to_owned());
        assert!(!try_take_floor(&shared, &winner));

        let buzz = shared.buzz.lock().unwrap();
        assert!(!buzz.locked);
        assert!(buzz.winner_id.is_none());
        assert!(buzz.timer.is_none());
    }

    #[tokio::test]
    async fn open_floor_is_taken_exactly_once() {
        let shared = shared_with("p1", "Ana");
        let winner = ParticipantInfo::new("p1", "Ana", "");

        assert!(try_take_floor(&shared, &winner));
        assert!(!try_take_floor(&shared, &winner));

        let buzz = shared.buzz.lock().unwrap();
        assert!(buzz.locked);
        assert_eq!(buzz.winner_id.as_deref(), Some("p1"));
    }
}
