//! End-of-game score finalization.
//!
//! The host computes one immutable snapshot per game: a row for every
//! *currently connected* participant (scores of players who dropped out are
//! not reported), sorted descending by score, plus the winner set — every
//! row tied at the maximum. The snapshot travels inside a single `GAMEOVER`
//! protocol line as base64-wrapped JSON.

use mindvault_core::{FinalScore, GameOverPayload, ParticipantInfo};

/// Build the final scoreboard from the connected roster and the score table.
///
/// `lookup_score` resolves a participant id to its current score; ids with
/// no score entry count as 0. Winners are listed by display name, falling
/// back to the id when the name is empty.
pub fn build_snapshot(
    connected: &[ParticipantInfo],
    lookup_score: impl Fn(&str) -> i32,
    deck_title: &str,
) -> GameOverPayload {
    let mut rows: Vec<FinalScore> = connected
        .iter()
        .map(|p| FinalScore {
            id: p.id.clone(),
            name: p.name.clone(),
            score: lookup_score(&p.id),
            avatar: p.avatar.clone(),
        })
        .collect();
    rows.sort_by(|a, b| b.score.cmp(&a.score));

    let top = rows.first().map(|r| r.score).unwrap_or(0);
    let winners = rows
        .iter()
        .filter(|r| r.score == top)
        .map(|r| if r.name.is_empty() { r.id.clone() } else { r.name.clone() })
        .collect();

    GameOverPayload {
        final_scores: rows,
        winners,
        deck_title: deck_title.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(entries: &[(&str, &str)]) -> Vec<ParticipantInfo> {
        entries
            .iter()
            .map(|(id, name)| ParticipantInfo::new(*id, *name, ""))
            .collect()
    }

    #[test]
    fn rows_sorted_descending_and_winners_are_all_max_rows() {
        let connected = roster(&[("a", "Ana"), ("b", "Ben"), ("c", "Cleo")]);
        let scores = [("a", 2), ("b", 5), ("c", 5)];
        let payload = build_snapshot(
            &connected,
            |id| scores.iter().find(|(k, _)| *k == id).map(|(_, v)| *v).unwrap_or(0),
            "Chemistry",
        );

        let ordered: Vec<i32> = payload.final_scores.iter().map(|r| r.score).collect();
        assert_eq!(ordered, vec![5, 5, 2]);
        assert_eq!(payload.winners.len(), 2);
        assert!(payload.winners.contains(&"Ben".to_owned()));
        assert!(payload.winners.contains(&"Cleo".to_owned()));
        assert_eq!(payload.deck_title, "Chemistry");
    }

    #[test]
    fn disconnected_participants_are_not_reported() {
        // Score table still holds "ghost", but only the connected roster counts.
        let connected = roster(&[("a", "Ana")]);
        let payload = build_snapshot(&connected, |_| 3, "Bio");
        assert_eq!(payload.final_scores.len(), 1);
        assert_eq!(payload.final_scores[0].id, "a");
    }

    #[test]
    fn winner_falls_back_to_id_when_name_is_empty() {
        let connected = roster(&[("anon-1", "")]);
        let payload = build_snapshot(&connected, |_| 0, "");
        assert_eq!(payload.winners, vec!["anon-1".to_owned()]);
    }

    #[test]
    fn empty_roster_yields_empty_snapshot() {
        let payload = build_snapshot(&[], |_| 0, "Empty");
        assert!(payload.final_scores.is_empty());
        assert!(payload.winners.is_empty());
    }
}
