//! mindvault-session — the session layer of MindVault multiplayer quiz games.
//!
//! One device hosts the authoritative game state; the others are thin
//! display/input terminals that buzz in over TCP. No broker, no server:
//! discovery is a UDP beacon (`mindvault-discovery`) and the session itself
//! is the line protocol from `mindvault-protocol` over plain TCP.
//!
//! ```text
//! Host device                              Client devices
//! ─────────────────────────────            ──────────────────────────
//! HostSession ── UDP beacon ─────────────► discover_host(code)
//!     │  accept loop (TCP, ephemeral port)     │
//!     ├─ per-client read loop ◄── JOIN/READY/BUZZ/LEAVE ── ClientSession
//!     └─ per-client writer task ── WELCOME/PJOIN/BUZZWIN/… ──► read loop
//! ```
//!
//! The host is the sole authority for scores, the buzz arbiter, and question
//! progress; clients render whatever the host pushes. Both sides surface
//! their state changes as events on `tokio::sync::broadcast` channels, so
//! any number of UI layers can subscribe fire-and-forget.

pub mod client;
pub mod gameover;
pub mod host;

pub use client::{ClientEvent, ClientSession};
pub use host::{HostEvent, HostSession, ANSWER_WINDOW, BUZZ_DEBOUNCE};

pub use mindvault_core::{
    FinalScore, GameOverPayload, ParticipantInfo, QuestionCursor, SessionError,
};
