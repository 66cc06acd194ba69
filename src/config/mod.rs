//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::respawn::{SpawnConstraints, DEFAULT_MAX_ATTEMPTS};
use crate::ws::protocol::Position;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// HS256 secret for peer tokens; anonymous sessions when unset
    pub jwt_secret: Option<String>,
    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,

    /// Game rules
    pub arena: ArenaConfig,
}

/// Game rules for an arena
#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Number of teams (1-4)
    pub team_count: u8,
    /// Kills needed to win
    pub score_to_win: u32,
    /// Connection cap
    pub max_players: usize,
    /// Health on join and respawn
    pub starting_health: f32,
    /// Seconds between death and respawn
    pub respawn_delay_secs: u32,
    /// How long a credited kill id is remembered
    pub kill_dedup_window_ms: u64,
    /// Period of the full team resync
    pub team_sync_interval_ms: u64,
    /// Award a point when a participant kills itself
    pub credit_self_kills: bool,
    /// RNG seed for spawn placement (random when unset)
    pub seed: Option<u64>,
    pub spawn: SpawnConstraints,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            team_count: 2,
            score_to_win: 5,
            max_players: 4,
            starting_health: 100.0,
            respawn_delay_secs: 3,
            kill_dedup_window_ms: 500,
            team_sync_interval_ms: 2_000,
            credit_self_kills: false,
            seed: None,
            spawn: SpawnConstraints::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            jwt_secret: env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),

            arena: ArenaConfig::from_env()?,
        })
    }
}

impl ArenaConfig {
    /// Load game rules from `ARENA_*` variables, defaulting each one
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ArenaConfig::default();
        let spawn_defaults = defaults.spawn.clone();

        let team_count: u8 = parse_or(&lookup, "ARENA_TEAM_COUNT", defaults.team_count)?;
        if !(1..=4).contains(&team_count) {
            return Err(ConfigError::Invalid("ARENA_TEAM_COUNT"));
        }

        let spawn_points = match lookup("ARENA_SPAWN_POINTS") {
            Some(raw) => parse_spawn_points(&raw)?,
            None => spawn_defaults.spawn_points,
        };

        Ok(Self {
            team_count,
            score_to_win: parse_or(&lookup, "ARENA_SCORE_TO_WIN", defaults.score_to_win)?,
            max_players: parse_or(&lookup, "ARENA_MAX_PLAYERS", defaults.max_players)?,
            starting_health: parse_positive(&lookup, "ARENA_STARTING_HEALTH", defaults.starting_health)?,
            respawn_delay_secs: parse_or(
                &lookup,
                "ARENA_RESPAWN_DELAY_SECS",
                defaults.respawn_delay_secs,
            )?,
            kill_dedup_window_ms: parse_or(
                &lookup,
                "ARENA_KILL_DEDUP_WINDOW_MS",
                defaults.kill_dedup_window_ms,
            )?,
            team_sync_interval_ms: parse_or(
                &lookup,
                "ARENA_TEAM_SYNC_INTERVAL_MS",
                defaults.team_sync_interval_ms,
            )?,
            credit_self_kills: parse_or(
                &lookup,
                "ARENA_CREDIT_SELF_KILLS",
                defaults.credit_self_kills,
            )?,
            seed: lookup("ARENA_SEED")
                .map(|s| s.parse().map_err(|_| ConfigError::Invalid("ARENA_SEED")))
                .transpose()?,
            spawn: SpawnConstraints {
                min_distance: parse_non_negative(
                    &lookup,
                    "ARENA_MIN_SPAWN_DISTANCE",
                    spawn_defaults.min_distance,
                )?,
                max_distance: match lookup("ARENA_MAX_SPAWN_DISTANCE") {
                    Some(_) => Some(parse_non_negative(&lookup, "ARENA_MAX_SPAWN_DISTANCE", 0.0)?),
                    None => None,
                },
                map_half_extent: parse_positive(
                    &lookup,
                    "ARENA_MAP_HALF_EXTENT",
                    spawn_defaults.map_half_extent,
                )?,
                margin: parse_non_negative(&lookup, "ARENA_SPAWN_MARGIN", spawn_defaults.margin)?,
                spawn_points,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                fixed_point_attempts: None,
            },
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Finite float `>= 0`
fn parse_non_negative(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: f32,
) -> Result<f32, ConfigError> {
    let value: f32 = parse_or(lookup, key, default)?;
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Invalid(key));
    }
    Ok(value)
}

/// Finite float `> 0`
fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: f32,
) -> Result<f32, ConfigError> {
    let value = parse_non_negative(lookup, key, default)?;
    if value == 0.0 {
        return Err(ConfigError::Invalid(key));
    }
    Ok(value)
}

/// Parse `x:z;x:z` into positions
fn parse_spawn_points(raw: &str) -> Result<Vec<Position>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| -> Result<Position, ConfigError> {
            let (x, z) = pair
                .split_once(':')
                .ok_or(ConfigError::Invalid("ARENA_SPAWN_POINTS"))?;
            let x: f32 = x.trim().parse().map_err(|_| ConfigError::Invalid("ARENA_SPAWN_POINTS"))?;
            let z: f32 = z.trim().parse().map_err(|_| ConfigError::Invalid("ARENA_SPAWN_POINTS"))?;
            if !x.is_finite() || !z.is_finite() {
                return Err(ConfigError::Invalid("ARENA_SPAWN_POINTS"));
            }
            Ok(Position::new(x, z))
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
