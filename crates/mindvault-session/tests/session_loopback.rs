//! End-to-end session tests over loopback TCP: a real `HostSession` with
//! real `ClientSession`s, exercising the join handshake, the ready gate,
//! buzz arbitration, the steal flow, disconnect handling, scoring, and the
//! game-over snapshot.

use std::net::SocketAddr;
use std::time::Duration;

use mindvault_session::{ClientEvent, ClientSession, HostEvent, HostSession, SessionError};
use tokio::sync::broadcast;

const EVENT_WAIT: Duration = Duration::from_secs(2);
const QUIET_WAIT: Duration = Duration::from_millis(300);

async fn next<T: Clone>(rx: &mut broadcast::Receiver<T>) -> T {
    tokio::time::timeout(EVENT_WAIT, rx.recv())
        .await
        .expect("event within deadline")
        .expect("event channel open")
}

async fn wait_client(
    rx: &mut broadcast::Receiver<ClientEvent>,
    mut pred: impl FnMut(&ClientEvent) -> bool,
) -> ClientEvent {
    loop {
        let ev = next(rx).await;
        if pred(&ev) {
            return ev;
        }
    }
}

async fn wait_host(
    rx: &mut broadcast::Receiver<HostEvent>,
    mut pred: impl FnMut(&HostEvent) -> bool,
) -> HostEvent {
    loop {
        let ev = next(rx).await;
        if pred(&ev) {
            return ev;
        }
    }
}

/// Assert that no `BuzzWinner` host event arrives within a quiet window.
async fn assert_no_buzz_winner(rx: &mut broadcast::Receiver<HostEvent>) {
    let quiet = async {
        loop {
            if let Ok(ev) = rx.recv().await {
                assert!(
                    !matches!(ev, HostEvent::BuzzWinner(_)),
                    "unexpected buzz winner: {ev:?}"
                );
            }
        }
    };
    // The quiet window elapsing is the success path.
    let _ = tokio::time::timeout(QUIET_WAIT, quiet).await;
}

fn endpoint(host: &HostSession) -> SocketAddr {
    ([127, 0, 0, 1], host.port()).into()
}

/// Connect a client, join with `name`, and return it together with its event
/// stream and host-assigned id.
async fn join_room(
    host: &HostSession,
    name: &str,
) -> (ClientSession, broadcast::Receiver<ClientEvent>, String) {
    let client = ClientSession::new();
    let mut rx = client.events();
    client.connect(endpoint(host)).await.expect("loopback connect");
    client.send_join(name, "owl.png").expect("send join");
    let ev = wait_client(&mut rx, |e| matches!(e, ClientEvent::Welcome { .. })).await;
    let ClientEvent::Welcome { id } = ev else { unreachable!() };
    (client, rx, id)
}

#[tokio::test]
async fn join_assigns_unique_ids_and_registry_tracks_connections() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    let mut host_rx = host.events();

    let (_p1, mut rx1, id1) = join_room(&host, "Ana").await;
    let (p2, _rx2, id2) = join_room(&host, "Ben").await;

    assert_ne!(id1, id2, "host must assign distinct ids");
    wait_host(&mut host_rx, |e| {
        matches!(e, HostEvent::ParticipantJoined(p) if p.name == "Ben")
    })
    .await;
    assert_eq!(host.participants().len(), 2);

    // P1's mirror converges on the full roster.
    wait_client(&mut rx1, |e| {
        matches!(e, ClientEvent::ParticipantJoined(p) if p.name == "Ben")
    })
    .await;

    // Graceful departure removes exactly one registry entry and fans out PLEFT.
    p2.send_leave().expect("send leave");
    wait_host(&mut host_rx, |e| matches!(e, HostEvent::ParticipantLeft { id } if *id == id2))
        .await;
    assert_eq!(host.participants().len(), 1);
    wait_client(&mut rx1, |e| matches!(e, ClientEvent::ParticipantLeft { id } if *id == id2))
        .await;
}

#[tokio::test]
async fn non_join_first_line_discards_the_connection_silently() {
    use tokio::io::AsyncWriteExt;

    let host = HostSession::start("AB12C").await.expect("host starts");
    let mut raw = tokio::net::TcpStream::connect(endpoint(&host)).await.expect("connect");
    raw.write_all(b"BUZZ\n").await.expect("write");

    tokio::time::sleep(QUIET_WAIT).await;
    assert!(host.participants().is_empty(), "handshake must require JOIN first");
}

#[tokio::test]
async fn ready_gate_rejects_until_everyone_is_ready() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    let mut host_rx = host.events();

    let (p1, mut rx1, _id1) = join_room(&host, "Ana").await;
    let (p2, mut rx2, id2) = join_room(&host, "Ben").await;

    p1.send_ready(true).expect("ready");
    wait_host(&mut host_rx, |e| matches!(e, HostEvent::ReadyChanged { ready: true, .. }))
        .await;

    assert!(matches!(host.try_start_game(), Err(SessionError::NotAllReady)));
    assert!(!host.game_started(), "rejection must not mutate state");

    p2.send_ready(true).expect("ready");
    wait_host(&mut host_rx, |e| {
        matches!(e, HostEvent::ReadyChanged { id, ready: true } if *id == id2)
    })
    .await;
    assert!(host.are_all_ready());
    host.try_start_game().expect("all ready");

    // Every client sees START, then BUZZRESET, then ENABLEALL, in order.
    for rx in [&mut rx1, &mut rx2] {
        wait_client(rx, |e| matches!(e, ClientEvent::GameStarted)).await;
        assert!(matches!(next(rx).await, ClientEvent::BuzzReset));
        assert!(matches!(
            next(rx).await,
            ClientEvent::BuzzerEnabledChanged { enabled: true, .. }
        ));
    }
}

#[tokio::test]
async fn empty_lobby_cannot_start() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    assert!(matches!(host.try_start_game(), Err(SessionError::NotAllReady)));
}

#[tokio::test]
async fn first_buzz_takes_the_floor_and_later_buzzes_are_dropped() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    let mut host_rx = host.events();
    let (p1, _rx1, id1) = join_room(&host, "Ana").await;
    let (p2, mut rx2, _id2) = join_room(&host, "Ben").await;

    p1.send_buzz().expect("buzz");
    let ev = wait_host(&mut host_rx, |e| matches!(e, HostEvent::BuzzWinner(_))).await;
    let HostEvent::BuzzWinner(winner) = ev else { unreachable!() };
    assert_eq!(winner.id, id1);

    // Second buzz while locked: ignored, no double-lock.
    p2.send_buzz().expect("buzz");
    assert_no_buzz_winner(&mut host_rx).await;

    // Clients only ever saw Ana's win.
    let ev = wait_client(&mut rx2, |e| matches!(e, ClientEvent::BuzzWinner { .. })).await;
    let ClientEvent::BuzzWinner { id, name, deadline_ticks } = ev else { unreachable!() };
    assert_eq!(id, id1);
    assert_eq!(name, "Ana");
    assert!(deadline_ticks > 0);
}

#[tokio::test]
async fn rapid_rebuzz_from_same_participant_is_debounced() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    let mut host_rx = host.events();
    let (p1, _rx1, _id1) = join_room(&host, "Ana").await;

    p1.send_buzz().expect("buzz");
    wait_host(&mut host_rx, |e| matches!(e, HostEvent::BuzzWinner(_))).await;

    // Floor reopened, but the second buzz lands inside the 250 ms window.
    host.open_buzz_for_all();
    p1.send_buzz().expect("buzz");
    assert_no_buzz_winner(&mut host_rx).await;

    // After the window, buzzing works again.
    tokio::time::sleep(Duration::from_millis(300)).await;
    p1.send_buzz().expect("buzz");
    wait_host(&mut host_rx, |e| matches!(e, HostEvent::BuzzWinner(_))).await;
}

#[tokio::test]
async fn answer_window_expiry_broadcasts_timeup_for_the_winner() {
    // A short window keeps the test fast; the timer path is identical.
    let host = HostSession::start_with_answer_window("AB12C", Duration::from_millis(150))
        .await
        .expect("host starts");
    let mut host_rx = host.events();
    let (p1, mut rx1, id1) = join_room(&host, "Ana").await;

    p1.send_buzz().expect("buzz");
    wait_host(&mut host_rx, |e| matches!(e, HostEvent::BuzzWinner(_))).await;

    let ev = wait_client(&mut rx1, |e| matches!(e, ClientEvent::TimeUp { .. })).await;
    let ClientEvent::TimeUp { id } = ev else { unreachable!() };
    assert_eq!(id, id1);
}

#[tokio::test]
async fn stop_timer_suppresses_timeup() {
    let host = HostSession::start_with_answer_window("AB12C", Duration::from_millis(150))
        .await
        .expect("host starts");
    let mut host_rx = host.events();
    let (p1, mut rx1, id1) = join_room(&host, "Ana").await;

    p1.send_buzz().expect("buzz");
    wait_host(&mut host_rx, |e| matches!(e, HostEvent::BuzzWinner(_))).await;

    host.stop_timer_for(&id1);
    wait_client(&mut rx1, |e| matches!(e, ClientEvent::StopTimer { id } if *id == id1)).await;

    // Well past the window: the cancelled countdown must stay silent.
    let quiet = async {
        loop {
            if let Ok(ev) = rx1.recv().await {
                assert!(!matches!(ev, ClientEvent::TimeUp { .. }), "timer fired: {ev:?}");
            }
        }
    };
    let _ = tokio::time::timeout(Duration::from_millis(400), quiet).await;
}

#[tokio::test]
async fn rejected_winner_is_barred_until_buzzers_reopen() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    let mut host_rx = host.events();
    let (p1, mut rx1, id1) = join_room(&host, "Ana").await;
    let (p2, _rx2, id2) = join_room(&host, "Ben").await;

    p1.send_buzz().expect("buzz");
    wait_host(&mut host_rx, |e| matches!(e, HostEvent::BuzzWinner(_))).await;

    // Wrong answer: Ana loses the floor and is barred; everyone may steal.
    host.reopen_buzz_except_winner();
    wait_client(&mut rx1, |e| {
        matches!(e, ClientEvent::BuzzerEnabledChanged { id, enabled: false } if *id == id1)
    })
    .await;
    wait_client(&mut rx1, |e| matches!(e, ClientEvent::Wrong { id, .. } if *id == id1)).await;
    wait_client(&mut rx1, |e| matches!(e, ClientEvent::BuzzReset)).await;

    // Ana's next buzz is ignored even after the debounce window has passed.
    tokio::time::sleep(Duration::from_millis(300)).await;
    p1.send_buzz().expect("buzz");
    assert_no_buzz_winner(&mut host_rx).await;

    // Ben can steal.
    p2.send_buzz().expect("buzz");
    let ev = wait_host(&mut host_rx, |e| matches!(e, HostEvent::BuzzWinner(_))).await;
    let HostEvent::BuzzWinner(winner) = ev else { unreachable!() };
    assert_eq!(winner.id, id2);

    // A full reopen lifts Ana's bar.
    host.open_buzz_for_all();
    tokio::time::sleep(Duration::from_millis(300)).await;
    p1.send_buzz().expect("buzz");
    let ev = wait_host(&mut host_rx, |e| matches!(e, HostEvent::BuzzWinner(_))).await;
    let HostEvent::BuzzWinner(winner) = ev else { unreachable!() };
    assert_eq!(winner.id, id1);
}

#[tokio::test]
async fn winner_disconnect_unlocks_the_floor() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    let mut host_rx = host.events();
    let (p1, _rx1, id1) = join_room(&host, "Ana").await;
    let (p2, mut rx2, id2) = join_room(&host, "Ben").await;

    p1.send_buzz().expect("buzz");
    wait_host(&mut host_rx, |e| matches!(e, HostEvent::BuzzWinner(_))).await;

    p1.disconnect();
    wait_host(&mut host_rx, |e| matches!(e, HostEvent::ParticipantLeft { id } if *id == id1))
        .await;
    wait_client(&mut rx2, |e| matches!(e, ClientEvent::ParticipantLeft { id } if *id == id1))
        .await;
    wait_client(&mut rx2, |e| matches!(e, ClientEvent::BuzzReset)).await;

    // Arbiter is open again: Ben can take the floor.
    p2.send_buzz().expect("buzz");
    let ev = wait_host(&mut host_rx, |e| matches!(e, HostEvent::BuzzWinner(_))).await;
    let HostEvent::BuzzWinner(winner) = ev else { unreachable!() };
    assert_eq!(winner.id, id2);
}

#[tokio::test]
async fn scores_never_drop_below_zero() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    let (_p1, mut rx1, id1) = join_room(&host, "Ana").await;

    assert_eq!(host.award_point(&id1, -5), 0);
    assert_eq!(host.award_point(&id1, 3), 3);
    assert_eq!(host.award_point(&id1, -10), 0);
    assert_eq!(host.award_point(&id1, 2), 2);

    // Clients see every authoritative update (including the bootstrap zero);
    // none is ever negative, and the stream ends on the final value.
    loop {
        let ev = wait_client(&mut rx1, |e| matches!(e, ClientEvent::ScoreUpdated { .. })).await;
        let ClientEvent::ScoreUpdated { id, score } = ev else { unreachable!() };
        assert_eq!(id, id1);
        assert!(score >= 0);
        if score == 2 {
            break;
        }
    }
}

#[tokio::test]
async fn game_over_reports_connected_players_and_all_tied_winners() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    let mut host_rx = host.events();
    let (_p1, mut rx1, id1) = join_room(&host, "Ana").await;
    let (_p2, _rx2, id2) = join_room(&host, "Ben").await;
    let (p3, _rx3, id3) = join_room(&host, "Cleo").await;

    host.award_point(&id1, 2);
    host.award_point(&id2, 2);
    host.award_point(&id3, 7);

    // Cleo drops before the end: her score must not be reported.
    p3.disconnect();
    wait_host(&mut host_rx, |e| matches!(e, HostEvent::ParticipantLeft { id } if *id == id3))
        .await;

    let payload = host.game_over("Biology");
    assert_eq!(payload.deck_title, "Biology");
    assert_eq!(payload.final_scores.len(), 2);
    assert!(payload.final_scores.iter().all(|r| r.id != id3));
    assert_eq!(payload.winners.len(), 2, "both tied at the max score");
    assert!(!host.game_started());

    // The broadcast snapshot decodes on the client to the identical payload.
    let ev = wait_client(&mut rx1, |e| matches!(e, ClientEvent::GameOver(_))).await;
    let ClientEvent::GameOver(received) = ev else { unreachable!() };
    assert_eq!(received, payload);
}

#[tokio::test]
async fn rematch_zeroes_scores_and_restarts() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    let (p1, mut rx1, id1) = join_room(&host, "Ana").await;
    let mut host_rx = host.events();

    p1.send_ready(true).expect("ready");
    wait_host(&mut host_rx, |e| matches!(e, HostEvent::ReadyChanged { .. })).await;
    host.try_start_game().expect("all ready");
    host.award_point(&id1, 4);
    host.game_over("Bio");
    wait_client(&mut rx1, |e| matches!(e, ClientEvent::GameOver(_))).await;

    host.start_rematch();
    let ev =
        wait_client(&mut rx1, |e| matches!(e, ClientEvent::ScoreUpdated { .. })).await;
    let ClientEvent::ScoreUpdated { id, score } = ev else { unreachable!() };
    assert_eq!(id, id1);
    assert_eq!(score, 0);
    wait_client(&mut rx1, |e| matches!(e, ClientEvent::GameStarted)).await;
    assert!(host.game_started());
}

#[tokio::test]
async fn late_joiner_bootstraps_into_a_running_game() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    let mut host_rx = host.events();
    let (p1, _rx1, id1) = join_room(&host, "Ana").await;

    p1.send_ready(true).expect("ready");
    wait_host(&mut host_rx, |e| matches!(e, HostEvent::ReadyChanged { .. })).await;
    host.try_start_game().expect("all ready");
    host.update_question_state(3, 10);
    host.award_point(&id1, 1);

    p1.send_buzz().expect("buzz");
    wait_host(&mut host_rx, |e| matches!(e, HostEvent::BuzzWinner(_))).await;

    // Ben joins mid-game and must bootstrap cleanly. Replay order on the
    // wire: roster, scores, question cursor, current floor holder, then the
    // started-state trio.
    let (p2, mut rx2, _id2) = join_room(&host, "Ben").await;
    wait_client(&mut rx2, |e| {
        matches!(e, ClientEvent::ScoreUpdated { id, score: 1 } if *id == id1)
    })
    .await;
    wait_client(&mut rx2, |e| {
        matches!(e, ClientEvent::QuestionState { index: 3, total: 10 })
    })
    .await;
    wait_client(&mut rx2, |e| {
        matches!(e, ClientEvent::BuzzWinner { id, .. } if *id == id1)
    })
    .await;
    wait_client(&mut rx2, |e| matches!(e, ClientEvent::GameStarted)).await;
    assert!(p2.game_started());
    assert_eq!(p2.participants().len(), 2);
}

#[tokio::test]
async fn host_shutdown_sends_hostleft_and_terminates_clients() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    let (p1, mut rx1, _id1) = join_room(&host, "Ana").await;

    host.shutdown();
    wait_client(&mut rx1, |e| matches!(e, ClientEvent::HostLeft)).await;
    assert!(host.participants().is_empty());

    // The agent noticed the terminal signal.
    tokio::time::sleep(QUIET_WAIT).await;
    assert!(!p1.is_connected());
}

#[tokio::test]
async fn host_departure_clears_cached_state_for_a_fresh_join() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    let (p1, mut rx1, old_id) = join_room(&host, "Ana").await;

    host.shutdown();
    wait_client(&mut rx1, |e| matches!(e, ClientEvent::HostLeft)).await;

    // The old session leaves nothing behind.
    assert!(!p1.is_connected());
    assert!(p1.participants().is_empty(), "ghost roster survived the host");
    assert!(p1.self_id().is_none());
    assert!(!p1.game_started());

    // The same agent joins a brand-new room from a clean slate.
    let host2 = HostSession::start("XY99Z").await.expect("second host starts");
    p1.connect(endpoint(&host2)).await.expect("reconnect");
    p1.send_join("Ana", "").expect("send join");
    wait_client(&mut rx1, |e| {
        matches!(e, ClientEvent::ParticipantJoined(p) if p.name == "Ana")
    })
    .await;
    assert_eq!(p1.participants().len(), 1);
    let new_id = p1.self_id().expect("welcomed by the new host");
    assert_ne!(new_id, old_id, "a rejoin is a new identity");
}

#[tokio::test]
async fn connect_is_idempotent_while_connected() {
    let host = HostSession::start("AB12C").await.expect("host starts");
    let (p1, _rx1, _id) = join_room(&host, "Ana").await;

    p1.connect(endpoint(&host)).await.expect("second connect is a no-op");
    tokio::time::sleep(QUIET_WAIT).await;
    assert_eq!(host.participants().len(), 1, "no duplicate session");
}

#[tokio::test]
async fn sends_before_connect_report_not_connected() {
    let client = ClientSession::new();
    assert!(matches!(client.send_buzz(), Err(SessionError::NotConnected)));
    assert!(matches!(client.send_join("Ana", ""), Err(SessionError::NotConnected)));
}
