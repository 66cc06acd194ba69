//! Session registry - participants and their team assignment

use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::{Position, TeamId};

use super::{GameError, SessionId};

/// Longest display name kept after sanitizing
pub const MAX_NAME_LEN: usize = 24;

/// Participant state (authoritative)
#[derive(Debug, Clone)]
pub struct Participant {
    pub session_id: SessionId,
    pub display_name: String,
    pub team: TeamId,

    // Combat
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    pub last_attacker: Option<SessionId>,
    /// Incremented on every revive; identifies the current life in kill ids
    pub life: u32,

    pub position: Position,

    // Stats
    pub kills: u32,
    pub deaths: u32,
    pub joined_at: u64,
}

impl Participant {
    fn new(session_id: SessionId, display_name: String, team: TeamId, max_health: f32) -> Self {
        Self {
            session_id,
            display_name,
            team,
            health: max_health,
            max_health,
            alive: true,
            last_attacker: None,
            life: 0,
            position: Position::default(),
            kills: 0,
            deaths: 0,
            joined_at: unix_millis(),
        }
    }
}

/// Result of a register call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// New participant created
    Joined,
    /// Existing participant renamed
    Renamed,
}

/// Registry of connected participants
pub struct SessionRegistry {
    participants: HashMap<SessionId, Participant>,
    team_count: u8,
    max_players: usize,
    starting_health: f32,
}

impl SessionRegistry {
    pub fn new(team_count: u8, max_players: usize, starting_health: f32) -> Self {
        Self {
            participants: HashMap::new(),
            team_count: team_count.max(1),
            max_players,
            starting_health,
        }
    }

    /// Deterministic team assignment: session id modulo team count
    pub fn team_for(&self, session_id: SessionId) -> TeamId {
        let slot = session_id.as_u128() % self.team_count as u128;
        TeamId(slot as u8 + 1)
    }

    /// Create or rename a participant. The team is assigned once and kept.
    pub fn register(
        &mut self,
        session_id: SessionId,
        display_name: &str,
    ) -> Result<Registration, GameError> {
        let name = sanitize_name(session_id, display_name);

        if let Some(existing) = self.participants.get_mut(&session_id) {
            debug!(session_id = %session_id, old = %existing.display_name, new = %name, "Participant renamed");
            existing.display_name = name;
            return Ok(Registration::Renamed);
        }

        if self.participants.len() >= self.max_players {
            return Err(GameError::SessionFull {
                max: self.max_players,
            });
        }

        let team = self.team_for(session_id);
        let participant = Participant::new(session_id, name, team, self.starting_health);
        info!(
            session_id = %session_id,
            name = %participant.display_name,
            team = %team,
            "Participant registered"
        );
        self.participants.insert(session_id, participant);
        Ok(Registration::Joined)
    }

    pub fn get_team(&self, session_id: SessionId) -> Result<TeamId, GameError> {
        self.participants
            .get(&session_id)
            .map(|p| p.team)
            .ok_or(GameError::UnknownParticipant(session_id))
    }

    /// Team of a participant, falling back to the deterministic rule
    pub fn team_or_default(&self, session_id: SessionId) -> TeamId {
        self.get_team(session_id)
            .unwrap_or_else(|_| self.team_for(session_id))
    }

    /// Remove a participant; no-op when absent
    pub fn unregister(&mut self, session_id: SessionId) -> Option<Participant> {
        let removed = self.participants.remove(&session_id);
        if removed.is_some() {
            info!(session_id = %session_id, remaining = self.participants.len(), "Participant unregistered");
        }
        removed
    }

    pub fn get(&self, session_id: SessionId) -> Option<&Participant> {
        self.participants.get(&session_id)
    }

    pub fn get_mut(&mut self, session_id: SessionId) -> Option<&mut Participant> {
        self.participants.get_mut(&session_id)
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.participants.contains_key(&session_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn starting_health(&self) -> f32 {
        self.starting_health
    }

    /// Positions of alive participants other than `excluding`
    pub fn alive_positions(&self, excluding: SessionId) -> Vec<Position> {
        self.participants
            .values()
            .filter(|p| p.alive && p.session_id != excluding)
            .map(|p| p.position)
            .collect()
    }
}

fn sanitize_name(session_id: Uuid, name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return default_name(session_id);
    }
    trimmed.chars().take(MAX_NAME_LEN).collect()
}

/// Name used until a peer registers its own
pub fn default_name(session_id: Uuid) -> String {
    format!("Player_{}", &session_id.to_string()[..8])
}
