//! Team score ledger - authoritative scores and match outcome

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::ws::protocol::{ServerMsg, TeamColor, TeamId};

use super::{GameError, Role, SessionId};

/// Maximum number of teams an arena supports
pub const MAX_TEAMS: u8 = 4;

/// Unique identifier of a death event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KillId {
    pub attacker: SessionId,
    pub target: SessionId,
    /// Life counter of the target when it died
    pub target_life: u32,
}

/// Team metadata and score
#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub color: TeamColor,
    pub score: u32,
}

impl Team {
    fn with_defaults(id: TeamId) -> Self {
        let color = match id.0 {
            1 => TeamColor::RED,
            2 => TeamColor::BLUE,
            3 => TeamColor::GREEN,
            _ => TeamColor::YELLOW,
        };
        Self {
            id,
            name: color.palette_name().to_string(),
            color,
            score: 0,
        }
    }
}

/// Match outcome state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchState {
    pub game_over: bool,
    pub winning_team: Option<TeamId>,
    pub winning_team_name: Option<String>,
}

/// Result of a kill credit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Score incremented
    Credited { team: TeamId, score: u32 },
    /// Same death already credited within the de-dup window
    Duplicate,
    /// Team id outside the configured range
    InvalidTeam,
}

/// Authoritative team score ledger
pub struct ScoreLedger {
    role: Role,
    teams: Vec<Team>,
    score_to_win: u32,
    state: MatchState,
    /// Recently credited kills and when they were credited
    recent_kills: HashMap<KillId, u64>,
    dedup_window_ms: u64,
    pending: Vec<ServerMsg>,
}

impl ScoreLedger {
    pub fn new(role: Role, team_count: u8, score_to_win: u32, dedup_window_ms: u64) -> Self {
        let team_count = team_count.clamp(1, MAX_TEAMS);
        Self {
            role,
            teams: (1..=team_count).map(|id| Team::with_defaults(TeamId(id))).collect(),
            score_to_win: score_to_win.max(1),
            state: MatchState::default(),
            recent_kills: HashMap::new(),
            dedup_window_ms,
            pending: Vec::new(),
        }
    }

    fn ensure_authority(&self) -> Result<(), GameError> {
        if self.role.is_authority() {
            Ok(())
        } else {
            Err(GameError::NotAuthoritative)
        }
    }

    fn team_index(&self, team: TeamId) -> Option<usize> {
        let idx = (team.0 as usize).checked_sub(1)?;
        (idx < self.teams.len()).then_some(idx)
    }

    /// Credit a kill to a team: exactly +1, once per death event
    pub fn credit_kill(
        &mut self,
        team: TeamId,
        kill: KillId,
        now_ms: u64,
    ) -> Result<CreditOutcome, GameError> {
        self.ensure_authority()?;

        let Some(idx) = self.team_index(team) else {
            warn!(team = %team, "Kill credit for unknown team ignored");
            return Ok(CreditOutcome::InvalidTeam);
        };

        let window = self.dedup_window_ms;
        self.recent_kills
            .retain(|_, credited_at| now_ms.saturating_sub(*credited_at) < window);

        if self.recent_kills.contains_key(&kill) {
            debug!(
                attacker = %kill.attacker,
                target = %kill.target,
                "Duplicate kill credit suppressed"
            );
            return Ok(CreditOutcome::Duplicate);
        }
        self.recent_kills.insert(kill, now_ms);

        let entry = &mut self.teams[idx];
        entry.score += 1;
        let score = entry.score;
        info!(team = %team, score, "Kill credited");

        self.pending.push(ServerMsg::ScoreChanged {
            team_id: team,
            score,
        });
        self.check_win_condition();

        Ok(CreditOutcome::Credited { team, score })
    }

    /// First team in id order at or above the winning score takes the match
    fn check_win_condition(&mut self) {
        if self.state.game_over {
            return;
        }

        let Some(winner) = self.teams.iter().find(|t| t.score >= self.score_to_win) else {
            return;
        };

        info!(team = %winner.id, name = %winner.name, "Match over");
        self.state = MatchState {
            game_over: true,
            winning_team: Some(winner.id),
            winning_team_name: Some(winner.name.clone()),
        };
        self.pending.push(ServerMsg::MatchOver {
            winning_team_id: winner.id,
            winning_team_name: winner.name.clone(),
        });
    }

    /// Zero all scores and clear the outcome
    pub fn reset(&mut self) -> Result<(), GameError> {
        self.ensure_authority()?;

        for team in &mut self.teams {
            team.score = 0;
        }
        self.state = MatchState::default();
        self.recent_kills.clear();

        info!("Scores reset");
        self.pending.push(ServerMsg::MatchReset);
        for team in &self.teams {
            self.pending.push(ServerMsg::ScoreChanged {
                team_id: team.id,
                score: 0,
            });
        }
        Ok(())
    }

    /// Change a team's display color; the name follows the palette
    pub fn set_team_color(&mut self, team: TeamId, color: TeamColor) -> Result<(), GameError> {
        self.ensure_authority()?;

        let idx = self.team_index(team).ok_or(GameError::InvalidTeamId(team.0))?;
        if self.teams[idx].color == color {
            return Ok(());
        }

        // Team names stay unique so the winner announcement is unambiguous
        let name = color.palette_name();
        if self.teams.iter().any(|t| t.id != team && t.name == name) {
            return Err(GameError::ColorTaken(name.to_string()));
        }

        let entry = &mut self.teams[idx];
        entry.color = color;
        entry.name = name.to_string();
        debug!(team = %team, name = %entry.name, "Team color changed");

        let msg = team_info(entry);
        self.pending.push(msg);
        Ok(())
    }

    /// Full team state for periodic resync
    pub fn team_info_sync(&self) -> Vec<ServerMsg> {
        let mut msgs: Vec<ServerMsg> = self.teams.iter().map(team_info).collect();

        if let (Some(team), Some(name)) = (self.state.winning_team, &self.state.winning_team_name) {
            msgs.push(ServerMsg::MatchOver {
                winning_team_id: team,
                winning_team_name: name.clone(),
            });
        }
        msgs
    }

    /// Drain notifications queued since the last call
    pub fn take_notifications(&mut self) -> Vec<ServerMsg> {
        std::mem::take(&mut self.pending)
    }

    /// Overwrite local state from an authority notification (mirror side)
    pub(crate) fn apply_remote(&mut self, msg: &ServerMsg) {
        match msg {
            ServerMsg::ScoreChanged { team_id, score } => {
                if let Some(idx) = self.team_index(*team_id) {
                    self.teams[idx].score = *score;
                }
            }
            ServerMsg::TeamInfoSync {
                team_id,
                name,
                color,
                score,
            } => {
                if let Some(idx) = self.team_index(*team_id) {
                    let team = &mut self.teams[idx];
                    team.name = name.clone();
                    team.color = *color;
                    team.score = *score;
                }
            }
            ServerMsg::MatchOver {
                winning_team_id,
                winning_team_name,
            } => {
                self.state = MatchState {
                    game_over: true,
                    winning_team: Some(*winning_team_id),
                    winning_team_name: Some(winning_team_name.clone()),
                };
            }
            ServerMsg::MatchReset => {
                for team in &mut self.teams {
                    team.score = 0;
                }
                self.state = MatchState::default();
            }
            _ => {}
        }
    }

    pub fn score(&self, team: TeamId) -> Option<u32> {
        self.team_index(team).map(|idx| self.teams[idx].score)
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn match_state(&self) -> &MatchState {
        &self.state
    }

    pub fn score_to_win(&self) -> u32 {
        self.score_to_win
    }
}

fn team_info(team: &Team) -> ServerMsg {
    ServerMsg::TeamInfoSync {
        team_id: team.id,
        name: team.name.clone(),
        color: team.color,
        score: team.score,
    }
}
