use serde::{Deserialize, Serialize};

// MARK: - ParticipantInfo

/// Identity of one connected player, as tracked by both host and client.
///
/// The `id` is assigned by the host when the `JOIN` handshake is accepted;
/// clients never choose their own id. Ids are not stable across reconnects —
/// a rejoin is a brand-new participant with a zero score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub ready: bool,
}

impl ParticipantInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: avatar.into(),
            ready: false,
        }
    }
}

// MARK: - FinalScore

/// One row of the end-of-game scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalScore {
    pub id: String,
    pub name: String,
    pub score: i32,
    pub avatar: String,
}

// MARK: - GameOverPayload

/// Final scoreboard snapshot, computed once per game by the host and
/// broadcast inside a single `GAMEOVER` line (JSON, base64-wrapped).
///
/// `winners` holds the display name (or id, when the name is empty) of every
/// participant tied at the maximum score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverPayload {
    pub final_scores: Vec<FinalScore>,
    pub winners: Vec<String>,
    pub deck_title: String,
}

// MARK: - LocalNetworkStatus

/// Network connectivity state used by hosting/join flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalNetworkStatus {
    Wifi,
    Ethernet,
    Cellular,
    Unknown,
}

impl std::fmt::Display for LocalNetworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wifi => write!(f, "Wi-Fi"),
            Self::Ethernet => write!(f, "Ethernet"),
            Self::Cellular => write!(f, "Cellular"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

// MARK: - QuestionCursor

/// Progress through the active deck — purely informational for clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuestionCursor {
    /// 1-based index of the current card; 0 before the first question.
    pub index: u32,
    pub total: u32,
}

impl QuestionCursor {
    pub fn in_progress(&self) -> bool {
        self.total > 0
    }
}
