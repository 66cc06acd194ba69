//! Time utilities for the arena loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Arena loop rate. Respawn countdowns resolve to one tick.
pub const ARENA_TPS: u32 = 10;
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / ARENA_TPS as u64;

/// Duration of one arena tick
pub fn tick_duration() -> Duration {
    Duration::from_micros(TICK_DURATION_MICROS)
}
