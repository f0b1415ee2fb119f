//! Terminal front-end for MindVault multiplayer.
//!
//! ```text
//! mindvault host [deck-title]        — host a room, judge from the keyboard
//! mindvault join <CODE> <name>       — discover the room and play in it
//! ```
//!
//! The real product drives the session layer from UI pages; this binary
//! exercises the same public surface from stdin so a room can be hosted and
//! played entirely from terminals on one LAN.

use anyhow::{bail, Context, Result};
use mindvault_discovery::{
    detect_local_ip, discover_host, generate_room_code, has_local_network_path,
    local_network_status,
};
use mindvault_session::{ClientEvent, ClientSession, HostEvent, HostSession};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

pub async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("host") => run_host(args.get(1).cloned().unwrap_or_default()).await,
        Some("join") => {
            let code = args.get(1).context("usage: mindvault join <CODE> <name>")?;
            let name = args.get(2).context("usage: mindvault join <CODE> <name>")?;
            run_client(code, name).await
        }
        _ => {
            bail!("usage: mindvault host [deck-title] | mindvault join <CODE> <name>");
        }
    }
}

// ── Host role ─────────────────────────────────────────────────────────────────

async fn run_host(deck_title: String) -> Result<()> {
    if !has_local_network_path() {
        warn!("No Wi-Fi/Ethernet path detected ({}); clients may not find this room", local_network_status());
    }

    let code = generate_room_code();
    let host = HostSession::start(&code).await?;
    let ip = detect_local_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "<unknown>".to_owned());
    if !deck_title.is_empty() {
        host.set_current_deck(0, &deck_title);
    }

    info!("Hosting room {} on {}:{}", code, ip, host.port());
    println!("Room code: {code}");
    println!(
        "Commands: start | state <i> <t> | award <n> <delta> | stoptimer <n> | \
         wrong | reopen | reveal <answer> | over | rematch | quit"
    );

    let mut events = host.events();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            ev = events.recv() => {
                let Ok(ev) = ev else { continue };
                match ev {
                    HostEvent::ParticipantJoined(p) => println!("+ {} joined", p.name),
                    HostEvent::ParticipantLeft { id } => println!("- {id} left"),
                    HostEvent::ReadyChanged { id, ready } => {
                        println!("  {id} is {}", if ready { "ready" } else { "not ready" });
                    }
                    HostEvent::BuzzWinner(p) => println!("! {} buzzed first", p.name),
                    HostEvent::GameOver(payload) => {
                        println!("Game over — winners: {}", payload.winners.join(", "));
                        for row in &payload.final_scores {
                            println!("  {} — {}", row.name, row.score);
                        }
                    }
                }
            }
            line = stdin.next_line() => {
                let Ok(Some(line)) = line else { break };
                if !handle_host_command(&host, &deck_title, line.trim()) {
                    break;
                }
            }
        }
    }

    host.shutdown();
    Ok(())
}

/// Run one judge command. Returns false when the host should quit.
/// Participants are addressed by 1-based roster position to spare the judge
/// from typing ids.
fn handle_host_command(host: &HostSession, deck_title: &str, line: &str) -> bool {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let nth_id = |n: &str| -> Option<String> {
        let idx: usize = n.parse().ok()?;
        host.participants().get(idx.checked_sub(1)?).map(|p| p.id.clone())
    };

    match parts.as_slice() {
        ["start"] => match host.try_start_game() {
            Ok(()) => println!("Game started."),
            Err(e) => println!("Cannot start: {e}"),
        },
        ["state", i, t] => {
            if let (Ok(i), Ok(t)) = (i.parse(), t.parse()) {
                host.update_question_state(i, t);
            }
        }
        ["award", n, delta] => {
            if let (Some(id), Ok(delta)) = (nth_id(n), delta.parse()) {
                let score = host.award_point(&id, delta);
                host.stop_timer_for(&id);
                println!("Score now {score}.");
            }
        }
        ["stoptimer", n] => {
            if let Some(id) = nth_id(n) {
                host.stop_timer_for(&id);
            }
        }
        ["wrong"] | ["reopen"] => host.reopen_buzz_except_winner(),
        ["reveal", rest @ ..] => host.announce_correct_answer(&rest.join(" ")),
        ["over"] => {
            host.game_over(deck_title);
        }
        ["rematch"] => host.start_rematch(),
        ["quit"] => return false,
        [] => {}
        _ => println!("Unknown command: {line}"),
    }
    true
}

// ── Client role ───────────────────────────────────────────────────────────────

async fn run_client(code: &str, name: &str) -> Result<()> {
    if !has_local_network_path() {
        warn!("No Wi-Fi/Ethernet path detected ({})", local_network_status());
    }

    let endpoint = discover_host(code, None)
        .await
        .with_context(|| format!("discovering room {code}"))?;

    let client = ClientSession::new();
    let mut events = client.events();
    client.connect(endpoint).await?;
    client.send_join(name, "")?;

    println!("Joined room {code}. Commands: ready | unready | buzz | leave");
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            ev = events.recv() => {
                let Ok(ev) = ev else { continue };
                if !print_client_event(&client, ev) {
                    break;
                }
            }
            line = stdin.next_line() => {
                let Ok(Some(line)) = line else { break };
                match line.trim() {
                    "ready" => client.send_ready(true)?,
                    "unready" => client.send_ready(false)?,
                    "buzz" => client.send_buzz()?,
                    "leave" => {
                        let _ = client.send_leave();
                        break;
                    }
                    "" => {}
                    other => println!("Unknown command: {other}"),
                }
            }
        }
    }

    client.disconnect();
    Ok(())
}

/// Print one inbound event. Returns false when the session is over.
fn print_client_event(client: &ClientSession, ev: ClientEvent) -> bool {
    match ev {
        ClientEvent::Welcome { id } => println!("You are {id}"),
        ClientEvent::ParticipantJoined(p) => println!("+ {} joined", p.name),
        ClientEvent::ParticipantLeft { id } => println!("- {id} left"),
        ClientEvent::ReadyChanged { id, ready } => {
            println!("  {id} is {}", if ready { "ready" } else { "not ready" });
        }
        ClientEvent::GameStarted => println!("Game on!"),
        ClientEvent::BuzzWinner { name, .. } => println!("! {name} has the floor"),
        ClientEvent::BuzzReset => println!("Floor open."),
        ClientEvent::ScoreUpdated { id, score } => {
            let tag = if Some(&id) == client.self_id().as_ref() { " (you)" } else { "" };
            println!("  {id}{tag}: {score} pts");
        }
        ClientEvent::BuzzerEnabledChanged { id, enabled } => {
            println!("  buzzer {} for {id}", if enabled { "enabled" } else { "disabled" });
        }
        ClientEvent::QuestionState { index, total } => println!("Question {index}/{total}"),
        ClientEvent::TimeUp { id } => println!("Time up for {id}!"),
        ClientEvent::StopTimer { .. } => println!("Timer stopped."),
        ClientEvent::CorrectAnswer { answer } => println!("Answer: {answer}"),
        ClientEvent::Wrong { name, .. } => println!("{name} was wrong — steal!"),
        ClientEvent::GameOver(payload) => {
            println!("Game over — winners: {}", payload.winners.join(", "));
            for row in &payload.final_scores {
                println!("  {} — {}", row.name, row.score);
            }
        }
        ClientEvent::HostLeft => {
            println!("Host left; session over.");
            return false;
        }
    }
    true
}
