//! Authoritative arena modules

pub mod arena;
pub mod combat;
pub mod ledger;
pub mod mirror;
pub mod registry;
pub mod respawn;
pub mod scoreboard;

pub use arena::{Arena, ArenaHandle, ArenaState, JoinError};

use crate::ws::protocol::ClientMsg;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Opaque participant session identifier
pub type SessionId = Uuid;

/// Whether this node's state is canonical
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owns and mutates shared state
    Authority,
    /// Read-only replica updated from notifications
    Mirror,
}

impl Role {
    pub fn is_authority(self) -> bool {
        matches!(self, Role::Authority)
    }
}

/// Request received from a peer transport
#[derive(Debug)]
pub struct ArenaRequest {
    pub session_id: SessionId,
    /// Peer may trigger privileged operations (reset)
    pub privileged: bool,
    pub msg: ClientMsg,
    pub received_at: u64,
    /// Set only on the join request of a new connection; the arena answers
    /// here instead of with an error message
    pub reply: Option<oneshot::Sender<Result<(), GameError>>>,
}

/// Game errors
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Mutation rejected: this node is not the authority")]
    NotAuthoritative,

    #[error("Unknown participant: {0}")]
    UnknownParticipant(SessionId),

    #[error("Invalid team id: {0}")]
    InvalidTeamId(u8),

    #[error("Invalid damage amount: {0}")]
    InvalidDamage(f32),

    #[error("Arena is full ({max} players)")]
    SessionFull { max: usize },

    #[error("Session {0} is already connected")]
    AlreadyConnected(SessionId),

    #[error("{0} is already taken by another team")]
    ColorTaken(String),
}

impl GameError {
    /// Short machine-readable code for error messages to peers
    pub fn code(&self) -> &'static str {
        match self {
            GameError::NotAuthoritative => "not_authoritative",
            GameError::UnknownParticipant(_) => "unknown_participant",
            GameError::InvalidTeamId(_) => "invalid_team",
            GameError::InvalidDamage(_) => "invalid_damage",
            GameError::SessionFull { .. } => "arena_full",
            GameError::AlreadyConnected(_) => "already_connected",
            GameError::ColorTaken(_) => "color_taken",
        }
    }
}
