//! Read-only replica of authority state, driven by notifications

use std::collections::HashMap;
use uuid::Uuid;

use crate::ws::protocol::{Position, ServerMsg, TeamId};

use super::ledger::{MatchState, ScoreLedger, Team};
use super::Role;

/// Participant as seen by a peer
#[derive(Debug, Clone, PartialEq)]
pub struct MirroredParticipant {
    pub display_name: String,
    pub team: TeamId,
    pub health: f32,
    pub alive: bool,
    pub position: Position,
    /// Seconds until respawn while dead
    pub respawn_in: Option<u32>,
}

/// Peer-side mirror of the arena
pub struct ArenaMirror {
    ledger: ScoreLedger,
    participants: HashMap<Uuid, MirroredParticipant>,
}

impl ArenaMirror {
    pub fn new(team_count: u8, score_to_win: u32) -> Self {
        Self {
            ledger: ScoreLedger::new(Role::Mirror, team_count, score_to_win, 0),
            participants: HashMap::new(),
        }
    }

    /// Apply one authority notification
    pub fn apply(&mut self, msg: &ServerMsg) {
        self.ledger.apply_remote(msg);

        match msg {
            ServerMsg::ParticipantJoined {
                session_id,
                display_name,
                team_id,
                health,
                position,
            } => {
                let entry = self
                    .participants
                    .entry(*session_id)
                    .or_insert_with(|| MirroredParticipant {
                        display_name: display_name.clone(),
                        team: *team_id,
                        health: *health,
                        alive: *health > 0.0,
                        position: *position,
                        respawn_in: None,
                    });
                entry.display_name = display_name.clone();
                entry.team = *team_id;
            }
            ServerMsg::ParticipantLeft { session_id } => {
                self.participants.remove(session_id);
            }
            ServerMsg::HealthChanged { session_id, health } => {
                if let Some(p) = self.participants.get_mut(session_id) {
                    p.health = *health;
                }
            }
            ServerMsg::ParticipantDied { session_id, .. } => {
                if let Some(p) = self.participants.get_mut(session_id) {
                    p.alive = false;
                    p.health = 0.0;
                }
            }
            ServerMsg::RespawnCountdown {
                session_id,
                seconds_remaining,
            } => {
                if let Some(p) = self.participants.get_mut(session_id) {
                    p.respawn_in = Some(*seconds_remaining);
                }
            }
            ServerMsg::ParticipantRespawned {
                session_id,
                position,
                health,
            } => {
                if let Some(p) = self.participants.get_mut(session_id) {
                    p.alive = true;
                    p.health = *health;
                    p.position = *position;
                    p.respawn_in = None;
                }
            }
            _ => {}
        }
    }

    pub fn score(&self, team: TeamId) -> Option<u32> {
        self.ledger.score(team)
    }

    pub fn teams(&self) -> &[Team] {
        self.ledger.teams()
    }

    pub fn match_state(&self) -> &MatchState {
        self.ledger.match_state()
    }

    pub fn participant(&self, session_id: Uuid) -> Option<&MirroredParticipant> {
        self.participants.get(&session_id)
    }

    /// Ledger replica; every mutating call on it fails with `NotAuthoritative`
    pub fn ledger_mut(&mut self) -> &mut ScoreLedger {
        &mut self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ledger::KillId;
    use crate::game::GameError;
    use crate::ws::protocol::TeamColor;
    use tokio_test::assert_err;

    #[test]
    fn mirror_follows_incremental_updates() {
        let mut mirror = ArenaMirror::new(2, 5);
        let a = Uuid::from_u128(2);

        mirror.apply(&ServerMsg::ParticipantJoined {
            session_id: a,
            display_name: "alpha".to_string(),
            team_id: TeamId(1),
            health: 100.0,
            position: Position::default(),
        });
        mirror.apply(&ServerMsg::HealthChanged {
            session_id: a,
            health: 0.0,
        });
        mirror.apply(&ServerMsg::ParticipantDied {
            session_id: a,
            killer_id: None,
        });
        mirror.apply(&ServerMsg::RespawnCountdown {
            session_id: a,
            seconds_remaining: 2,
        });
        assert_eq!(mirror.participant(a).unwrap().respawn_in, Some(2));
        assert!(!mirror.participant(a).unwrap().alive);

        mirror.apply(&ServerMsg::ParticipantRespawned {
            session_id: a,
            position: Position::new(3.0, 4.0),
            health: 100.0,
        });
        let p = mirror.participant(a).unwrap();
        assert!(p.alive);
        assert_eq!(p.position, Position::new(3.0, 4.0));
        assert_eq!(p.respawn_in, None);

        mirror.apply(&ServerMsg::ParticipantLeft { session_id: a });
        assert!(mirror.participant(a).is_none());
    }

    #[test]
    fn resync_repairs_missed_score_update() {
        let mut mirror = ArenaMirror::new(2, 5);
        mirror.apply(&ServerMsg::ScoreChanged {
            team_id: TeamId(1),
            score: 1,
        });
        // ScoreChanged to 2 was lost in transit
        mirror.apply(&ServerMsg::TeamInfoSync {
            team_id: TeamId(1),
            name: "Green Team".to_string(),
            color: TeamColor::GREEN,
            score: 2,
        });
        assert_eq!(mirror.score(TeamId(1)), Some(2));
        assert_eq!(mirror.teams()[0].name, "Green Team");
    }

    #[test]
    fn match_over_and_reset_are_mirrored() {
        let mut mirror = ArenaMirror::new(2, 5);
        mirror.apply(&ServerMsg::MatchOver {
            winning_team_id: TeamId(2),
            winning_team_name: "Blue Team".to_string(),
        });
        assert!(mirror.match_state().game_over);
        assert_eq!(mirror.match_state().winning_team, Some(TeamId(2)));

        mirror.apply(&ServerMsg::MatchReset);
        assert!(!mirror.match_state().game_over);
    }

    #[test]
    fn mirror_cannot_mutate_scores() {
        let mut mirror = ArenaMirror::new(2, 5);
        let kill = KillId {
            attacker: Uuid::from_u128(1),
            target: Uuid::from_u128(2),
            target_life: 0,
        };
        let err = assert_err!(mirror.ledger_mut().credit_kill(TeamId(1), kill, 0));
        assert!(matches!(err, GameError::NotAuthoritative));
        assert!(matches!(
            assert_err!(mirror.ledger_mut().reset()),
            GameError::NotAuthoritative
        ));
        assert_eq!(mirror.score(TeamId(1)), Some(0));
    }
}
