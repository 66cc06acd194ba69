//! WebSocket protocol message definitions
//! These are the wire types for peer-authority communication

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Team identifier (1-based, at most 4 teams)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub u8);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position on the horizontal plane of the arena
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }
}

/// Team display color. Purely cosmetic, never used to identify a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl TeamColor {
    pub const RED: TeamColor = TeamColor { r: 255, g: 0, b: 0 };
    pub const BLUE: TeamColor = TeamColor { r: 0, g: 0, b: 255 };
    pub const GREEN: TeamColor = TeamColor { r: 0, g: 255, b: 0 };
    pub const YELLOW: TeamColor = TeamColor { r: 255, g: 255, b: 0 };
    pub const MAGENTA: TeamColor = TeamColor { r: 255, g: 0, b: 255 };

    const PALETTE: [(TeamColor, &'static str); 5] = [
        (TeamColor::RED, "Red Team"),
        (TeamColor::BLUE, "Blue Team"),
        (TeamColor::GREEN, "Green Team"),
        (TeamColor::YELLOW, "Yellow Team"),
        (TeamColor::MAGENTA, "Magenta Team"),
    ];

    /// Display name of the nearest palette color
    pub fn palette_name(&self) -> &'static str {
        Self::PALETTE
            .iter()
            .min_by_key(|(color, _)| self.distance_sq(color))
            .map(|(_, name)| *name)
            .unwrap_or("Unknown Team")
    }

    fn distance_sq(&self, other: &TeamColor) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }
}

/// Messages sent from peer to authority
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Register or rename the sending session
    RegisterName { name: String },

    /// Damage observed by the peer (projectile hit, collision, ...)
    ReportDamage {
        target_id: Uuid,
        amount: f32,
        /// Must be the reporting session, or absent for unattributed damage
        #[serde(default)]
        attacker_id: Option<Uuid>,
    },

    /// Reset scores and match outcome (privileged)
    RequestReset,

    /// Change the display color of the sender's team
    SelectColor { r: u8, g: u8, b: u8 },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the arena
    Leave,
}

/// Messages sent from authority to peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { session_id: Uuid, server_time: u64 },

    /// A participant registered or changed name
    ParticipantJoined {
        session_id: Uuid,
        display_name: String,
        team_id: TeamId,
        health: f32,
        position: Position,
    },

    /// A participant left the arena
    ParticipantLeft { session_id: Uuid },

    /// Health after a damage event
    HealthChanged { session_id: Uuid, health: f32 },

    /// A participant died
    ParticipantDied {
        session_id: Uuid,
        killer_id: Option<Uuid>,
    },

    /// Team score changed
    ScoreChanged { team_id: TeamId, score: u32 },

    /// A team reached the winning score
    MatchOver {
        winning_team_id: TeamId,
        winning_team_name: String,
    },

    /// Scores and outcome were reset
    MatchReset,

    /// Respawn countdown tick
    RespawnCountdown {
        session_id: Uuid,
        seconds_remaining: u32,
    },

    /// Participant revived at a new position
    ParticipantRespawned {
        session_id: Uuid,
        position: Position,
        health: f32,
    },

    /// Full team state, re-sent periodically
    TeamInfoSync {
        team_id: TeamId,
        name: String,
        color: TeamColor,
        score: u32,
    },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Delivery target for an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    Session(Uuid),
}

/// Outbound message with its delivery target
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub msg: ServerMsg,
}

impl Outbound {
    pub fn all(msg: ServerMsg) -> Self {
        Self {
            to: Recipient::All,
            msg,
        }
    }

    pub fn to(session_id: Uuid, msg: ServerMsg) -> Self {
        Self {
            to: Recipient::Session(session_id),
            msg,
        }
    }

    /// Whether the given session should receive this message
    pub fn is_for(&self, session_id: Uuid) -> bool {
        match self.to {
            Recipient::All => true,
            Recipient::Session(id) => id == session_id,
        }
    }
}
