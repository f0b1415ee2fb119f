//! mindvault-protocol — the line protocol spoken between host and clients.
//!
//! Every message is one line of UTF-8 text: fields separated by `|`,
//! terminated by a single `\n`. There is no framing beyond the line boundary;
//! readers buffer until a newline arrives. Decoding is purely syntactic —
//! malformed or unrecognized lines parse to `None` and are dropped by the
//! read loops, never crashing them.
//!
//! # Command vocabulary
//!
//! ```text
//! Client → Host                        Host → Clients
//! ─────────────────────────────        ────────────────────────────────────
//! JOIN|name|avatar                     WELCOME|id
//! READY|ready     (or READY|id|ready)  PJOIN|id|name|avatar|ready
//! BUZZ                                 PLEFT|id
//! LEAVE                                PREADY|id|ready
//!                                      SCORE|id|score
//!                                      STATE|index|total
//!                                      START
//!                                      BUZZWIN|id|name|deadlineTicks
//!                                      BUZZRESET / ENABLEALL / DISABLEUSER|id
//!                                      STOPTIMER|id / TIMEUP|id
//!                                      CORRECT|base64(text)
//!                                      WRONG|id|name
//!                                      GAMEOVER|base64(json)
//!                                      HOSTLEFT
//! ```
//!
//! Structured payloads (`CORRECT`, `GAMEOVER`) are base64-wrapped so one
//! framing discipline (newline-delimited) covers the whole protocol.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

// ── Client → Host commands ────────────────────────────────────────────────────

/// A command a client sends to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Request to join the room; the host assigns the id.
    Join { name: String, avatar: String },
    /// Toggle the ready flag. `id` is optional — the host falls back to the
    /// sender's own id when it is absent.
    Ready { id: Option<String>, ready: bool },
    /// Claim the floor for answering the current question.
    Buzz,
    /// Graceful departure.
    Leave,
}

impl ClientCommand {
    /// Render as one protocol line (without the trailing newline).
    pub fn encode(&self) -> String {
        match self {
            Self::Join { name, avatar } => format!("JOIN|{name}|{avatar}"),
            Self::Ready { id: Some(id), ready } => {
                format!("READY|{id}|{}", flag(*ready))
            }
            Self::Ready { id: None, ready } => format!("READY|{}", flag(*ready)),
            Self::Buzz => "BUZZ".to_owned(),
            Self::Leave => "LEAVE".to_owned(),
        }
    }

    /// Parse one line. Unknown or malformed lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('|').collect();
        match parts[0] {
            "JOIN" if parts.len() >= 2 => Some(Self::Join {
                name: parts[1].to_owned(),
                avatar: parts.get(2).copied().unwrap_or_default().to_owned(),
            }),
            // Accept both READY|1 and READY|id|1
            "READY" if parts.len() == 2 => Some(Self::Ready {
                id: None,
                ready: parts[1] == "1",
            }),
            "READY" if parts.len() > 2 => Some(Self::Ready {
                id: Some(parts[1].to_owned()),
                ready: parts[2] == "1",
            }),
            "BUZZ" => Some(Self::Buzz),
            "LEAVE" => Some(Self::Leave),
            _ => None,
        }
    }
}

// ── Host → Client messages ────────────────────────────────────────────────────

/// A message the host sends to one or all clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMessage {
    /// Id assignment for the connection that just joined.
    Welcome { id: String },
    /// A participant is now known to everyone (also used for bootstrap replay).
    PJoin { id: String, name: String, avatar: String, ready: bool },
    /// A participant disconnected or left.
    PLeft { id: String },
    /// A participant's ready flag changed.
    PReady { id: String, ready: bool },
    /// Authoritative score update.
    Score { id: String, score: i32 },
    /// Question-progress update (index/total).
    State { index: u32, total: u32 },
    /// Game has begun or resumed.
    Start,
    /// Floor granted; `deadline_ticks` is the answer deadline in Unix millis.
    BuzzWin { id: String, name: String, deadline_ticks: i64 },
    /// Floor is open again; clear any winner display.
    BuzzReset,
    /// Lift all buzz disablement.
    EnableAll,
    /// One participant barred from buzzing.
    DisableUser { id: String },
    /// Host cancelled the in-flight answer countdown.
    StopTimer { id: String },
    /// Answer window expired with no judgment.
    TimeUp { id: String },
    /// The correct answer text is revealed.
    Correct { answer: String },
    /// Named participant answered incorrectly; others may steal.
    Wrong { id: String, name: String },
    /// Final scoreboard, JSON inside base64. The session layer deserializes.
    GameOver { json: String },
    /// Host is shutting down; clients must disconnect.
    HostLeft,
}

impl HostMessage {
    /// Render as one protocol line (without the trailing newline).
    pub fn encode(&self) -> String {
        match self {
            Self::Welcome { id } => format!("WELCOME|{id}"),
            Self::PJoin { id, name, avatar, ready } => {
                format!("PJOIN|{id}|{name}|{avatar}|{}", flag(*ready))
            }
            Self::PLeft { id } => format!("PLEFT|{id}"),
            Self::PReady { id, ready } => format!("PREADY|{id}|{}", flag(*ready)),
            Self::Score { id, score } => format!("SCORE|{id}|{score}"),
            Self::State { index, total } => format!("STATE|{index}|{total}"),
            Self::Start => "START".to_owned(),
            Self::BuzzWin { id, name, deadline_ticks } => {
                format!("BUZZWIN|{id}|{name}|{deadline_ticks}")
            }
            Self::BuzzReset => "BUZZRESET".to_owned(),
            Self::EnableAll => "ENABLEALL".to_owned(),
            Self::DisableUser { id } => format!("DISABLEUSER|{id}"),
            Self::StopTimer { id } => format!("STOPTIMER|{id}"),
            Self::TimeUp { id } => format!("TIMEUP|{id}"),
            Self::Correct { answer } => {
                format!("CORRECT|{}", BASE64.encode(answer.as_bytes()))
            }
            Self::Wrong { id, name } => format!("WRONG|{id}|{name}"),
            Self::GameOver { json } => {
                format!("GAMEOVER|{}", BASE64.encode(json.as_bytes()))
            }
            Self::HostLeft => "HOSTLEFT".to_owned(),
        }
    }

    /// Parse one line. Unknown or malformed lines yield `None`.
    ///
    /// Tolerates short splits the way the reference clients do: missing
    /// trailing fields default to empty / zero rather than rejecting the line.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let parts: Vec<&str> = line.split('|').collect();
        let field = |i: usize| parts.get(i).copied().unwrap_or_default().to_owned();

        match parts[0] {
            "WELCOME" if parts.len() >= 2 => Some(Self::Welcome { id: field(1) }),
            "PJOIN" if parts.len() >= 2 => Some(Self::PJoin {
                id: field(1),
                name: field(2),
                avatar: field(3),
                ready: parts.get(4).copied() == Some("1"),
            }),
            "PLEFT" if parts.len() >= 2 => Some(Self::PLeft { id: field(1) }),
            "PREADY" if parts.len() >= 2 => Some(Self::PReady {
                id: field(1),
                ready: parts.get(2).copied() == Some("1"),
            }),
            "SCORE" if parts.len() >= 2 => Some(Self::Score {
                id: field(1),
                score: parts.get(2).and_then(|s| s.parse().ok()).unwrap_or(0),
            }),
            "STATE" if parts.len() >= 3 => {
                let index = parts[1].parse().ok()?;
                let total = parts[2].parse().ok()?;
                Some(Self::State { index, total })
            }
            "START" => Some(Self::Start),
            "BUZZWIN" if parts.len() >= 2 => Some(Self::BuzzWin {
                id: field(1),
                name: field(2),
                deadline_ticks: parts.get(3).and_then(|s| s.parse().ok()).unwrap_or(0),
            }),
            "BUZZRESET" => Some(Self::BuzzReset),
            "ENABLEALL" => Some(Self::EnableAll),
            "DISABLEUSER" if parts.len() >= 2 => Some(Self::DisableUser { id: field(1) }),
            "STOPTIMER" if parts.len() >= 2 => Some(Self::StopTimer { id: field(1) }),
            "TIMEUP" if parts.len() >= 2 => Some(Self::TimeUp { id: field(1) }),
            "CORRECT" if parts.len() >= 2 => Some(Self::Correct {
                // Undecodable payloads still reveal *something*: an empty answer.
                answer: decode_b64(parts[1]).unwrap_or_default(),
            }),
            "WRONG" if parts.len() >= 2 => Some(Self::Wrong {
                id: field(1),
                name: field(2),
            }),
            "GAMEOVER" if parts.len() >= 2 => {
                Some(Self::GameOver { json: decode_b64(parts[1])? })
            }
            "HOSTLEFT" => Some(Self::HostLeft),
            _ => None,
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn flag(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

fn decode_b64(s: &str) -> Option<String> {
    let bytes = BASE64.decode(s).ok()?;
    String::from_utf8(bytes).ok()
}
