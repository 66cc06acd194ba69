//! Scoreboard snapshots for HTTP readers

use serde::Serialize;
use uuid::Uuid;

use crate::ws::protocol::{Position, TeamColor, TeamId};

use super::ledger::ScoreLedger;
use super::registry::SessionRegistry;

/// Point-in-time view of the arena
#[derive(Debug, Clone, Default, Serialize)]
pub struct Scoreboard {
    pub score_to_win: u32,
    pub game_over: bool,
    pub winning_team_id: Option<TeamId>,
    pub winning_team_name: Option<String>,
    pub teams: Vec<TeamEntry>,
    pub participants: Vec<ParticipantEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamEntry {
    pub team_id: TeamId,
    pub name: String,
    pub color: TeamColor,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantEntry {
    pub session_id: Uuid,
    pub display_name: String,
    pub team_id: TeamId,
    pub alive: bool,
    pub health: f32,
    pub position: Position,
    pub kills: u32,
    pub deaths: u32,
}

/// Rebuilds the scoreboard only when state changed
#[derive(Debug)]
pub struct ScoreboardBuilder {
    dirty: bool,
}

impl ScoreboardBuilder {
    pub fn new() -> Self {
        // First publish always happens
        Self { dirty: true }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Build a snapshot if anything changed since the last one
    pub fn build_if_dirty(
        &mut self,
        registry: &SessionRegistry,
        ledger: &ScoreLedger,
    ) -> Option<Scoreboard> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(build(registry, ledger))
    }
}

impl Default for ScoreboardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a scoreboard from authority state
pub fn build(registry: &SessionRegistry, ledger: &ScoreLedger) -> Scoreboard {
    let state = ledger.match_state();

    let mut participants: Vec<ParticipantEntry> = registry
        .iter()
        .map(|p| ParticipantEntry {
            session_id: p.session_id,
            display_name: p.display_name.clone(),
            team_id: p.team,
            alive: p.alive,
            health: p.health,
            position: p.position,
            kills: p.kills,
            deaths: p.deaths,
        })
        .collect();

    // Most kills first, fewest deaths breaks ties
    participants.sort_by(|a, b| {
        b.kills
            .cmp(&a.kills)
            .then_with(|| a.deaths.cmp(&b.deaths))
            .then_with(|| a.session_id.cmp(&b.session_id))
    });

    Scoreboard {
        score_to_win: ledger.score_to_win(),
        game_over: state.game_over,
        winning_team_id: state.winning_team,
        winning_team_name: state.winning_team_name.clone(),
        teams: ledger
            .teams()
            .iter()
            .map(|t| TeamEntry {
                team_id: t.id,
                name: t.name.clone(),
                color: t.color,
                score: t.score,
            })
            .collect(),
        participants,
    }
}
