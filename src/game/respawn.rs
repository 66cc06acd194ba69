//! Respawn coordination - countdown and safe spawn placement

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::ws::protocol::{Position, ServerMsg};

use super::registry::SessionRegistry;
use super::SessionId;

/// Random samples tried before giving up on the distance constraint
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

/// Spawn placement constraints
#[derive(Debug, Clone)]
pub struct SpawnConstraints {
    /// Minimum distance to every alive participant
    pub min_distance: f32,
    /// When set, random samples come from the ring [min_distance, max_distance]
    /// around the map center instead of the whole square
    pub max_distance: Option<f32>,
    /// Half size of the square map
    pub map_half_extent: f32,
    /// Keep-out band along the map edge
    pub margin: f32,
    /// Fixed spawn points; random sampling is used when empty
    pub spawn_points: Vec<Position>,
    /// Random sample budget
    pub max_attempts: usize,
    /// Fixed point budget (defaults to the point count)
    pub fixed_point_attempts: Option<usize>,
}

impl Default for SpawnConstraints {
    fn default() -> Self {
        Self {
            min_distance: 10.0,
            max_distance: None,
            map_half_extent: 40.0,
            margin: 5.0,
            spawn_points: Vec::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            fixed_point_attempts: None,
        }
    }
}

impl SpawnConstraints {
    /// Usable range on each horizontal axis
    fn axis_bound(&self) -> f32 {
        (self.map_half_extent - self.margin).max(0.0)
    }
}

/// Chosen spawn location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Position,
    /// Candidates evaluated against the distance constraint
    pub attempts: usize,
    /// The constraint could not be met within budget
    pub relaxed: bool,
}

/// Per-participant respawn phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespawnPhase {
    Alive,
    Dead { seconds_remaining: u32 },
    Reviving,
}

#[derive(Debug, Clone, Copy)]
struct Countdown {
    seconds_remaining: u32,
    next_tick_at: u64,
    reviving: bool,
}

/// Revives dead participants after a fixed delay
pub struct RespawnCoordinator {
    delay_secs: u32,
    constraints: SpawnConstraints,
    rng: ChaCha8Rng,
    countdowns: HashMap<SessionId, Countdown>,
    pending: Vec<ServerMsg>,
}

impl RespawnCoordinator {
    pub fn new(delay_secs: u32, constraints: SpawnConstraints, seed: u64) -> Self {
        Self {
            delay_secs,
            constraints,
            rng: ChaCha8Rng::seed_from_u64(seed),
            countdowns: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Start the countdown for a participant that just died
    pub fn begin(&mut self, session_id: SessionId, now_ms: u64) {
        if self.countdowns.contains_key(&session_id) {
            return;
        }

        self.countdowns.insert(
            session_id,
            Countdown {
                seconds_remaining: self.delay_secs,
                next_tick_at: now_ms + 1_000,
                reviving: self.delay_secs == 0,
            },
        );
        if self.delay_secs > 0 {
            self.pending.push(ServerMsg::RespawnCountdown {
                session_id,
                seconds_remaining: self.delay_secs,
            });
        }
        debug!(session_id = %session_id, delay_secs = self.delay_secs, "Respawn countdown started");
    }

    /// Advance countdowns; returns participants ready to be revived
    pub fn tick(&mut self, now_ms: u64) -> Vec<SessionId> {
        let mut due = Vec::new();

        for (session_id, countdown) in self.countdowns.iter_mut() {
            while !countdown.reviving && now_ms >= countdown.next_tick_at {
                countdown.seconds_remaining -= 1;
                countdown.next_tick_at += 1_000;
                if countdown.seconds_remaining == 0 {
                    countdown.reviving = true;
                } else {
                    self.pending.push(ServerMsg::RespawnCountdown {
                        session_id: *session_id,
                        seconds_remaining: countdown.seconds_remaining,
                    });
                }
            }
            if countdown.reviving {
                due.push(*session_id);
            }
        }

        due.sort();
        due
    }

    pub fn phase(&self, session_id: SessionId) -> RespawnPhase {
        match self.countdowns.get(&session_id) {
            None => RespawnPhase::Alive,
            Some(c) if c.reviving => RespawnPhase::Reviving,
            Some(c) => RespawnPhase::Dead {
                seconds_remaining: c.seconds_remaining,
            },
        }
    }

    /// Forget a participant that left
    pub fn cancel(&mut self, session_id: SessionId) {
        self.countdowns.remove(&session_id);
    }

    /// Place and revive a participant whose countdown completed
    pub fn revive(
        &mut self,
        registry: &mut SessionRegistry,
        session_id: SessionId,
    ) -> Option<Placement> {
        self.countdowns.remove(&session_id);

        if !registry.contains(session_id) {
            debug!(session_id = %session_id, "Participant left before respawn");
            return None;
        }

        let placement = self.place(registry, session_id);
        let starting_health = registry.starting_health();
        let participant = registry.get_mut(session_id)?;

        participant.health = starting_health;
        participant.alive = true;
        participant.last_attacker = None;
        participant.life += 1;
        participant.position = placement.position;

        info!(
            session_id = %session_id,
            x = placement.position.x,
            z = placement.position.z,
            attempts = placement.attempts,
            relaxed = placement.relaxed,
            "Participant respawned"
        );
        self.pending.push(ServerMsg::ParticipantRespawned {
            session_id,
            position: placement.position,
            health: starting_health,
        });

        Some(placement)
    }

    /// Pick a position away from alive participants. Always returns a position.
    pub fn place(&mut self, registry: &SessionRegistry, session_id: SessionId) -> Placement {
        let others = registry.alive_positions(session_id);

        let placement = if self.constraints.spawn_points.is_empty() {
            self.place_random(&others)
        } else {
            self.place_fixed(&others)
        };

        if placement.relaxed {
            warn!(
                session_id = %session_id,
                attempts = placement.attempts,
                "No spawn satisfied the distance constraint, using fallback"
            );
        }
        placement
    }

    /// Initial placement for a newly joined participant
    pub fn initial_position(&mut self, registry: &SessionRegistry, session_id: SessionId) -> Position {
        self.place(registry, session_id).position
    }

    fn is_clear(&self, candidate: &Position, others: &[Position]) -> bool {
        others
            .iter()
            .all(|p| p.distance(candidate) >= self.constraints.min_distance)
    }

    fn place_fixed(&mut self, others: &[Position]) -> Placement {
        let points = &self.constraints.spawn_points;
        let budget = self
            .constraints
            .fixed_point_attempts
            .unwrap_or(points.len())
            .min(points.len());

        let mut order: Vec<usize> = (0..points.len()).collect();
        order.shuffle(&mut self.rng);

        for (attempt, idx) in order.iter().take(budget).enumerate() {
            let candidate = self.constraints.spawn_points[*idx];
            if self.is_clear(&candidate, others) {
                return Placement {
                    position: candidate,
                    attempts: attempt + 1,
                    relaxed: false,
                };
            }
        }

        let idx = self.rng.gen_range(0..self.constraints.spawn_points.len());
        Placement {
            position: self.constraints.spawn_points[idx],
            attempts: budget,
            relaxed: true,
        }
    }

    fn place_random(&mut self, others: &[Position]) -> Placement {
        let budget = self.constraints.max_attempts.max(1);
        let mut last = Position::default();

        for attempt in 1..=budget {
            last = self.sample();
            if self.is_clear(&last, others) {
                return Placement {
                    position: last,
                    attempts: attempt,
                    relaxed: false,
                };
            }
        }

        Placement {
            position: last,
            attempts: budget,
            relaxed: true,
        }
    }

    fn sample(&mut self) -> Position {
        let bound = self.constraints.axis_bound();

        match self.constraints.max_distance {
            Some(max_distance) => {
                let inner = self.constraints.min_distance.min(max_distance).max(0.0);
                let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
                let radius = self.rng.gen_range(inner..=max_distance.max(inner));
                Position::new(
                    (angle.cos() * radius).clamp(-bound, bound),
                    (angle.sin() * radius).clamp(-bound, bound),
                )
            }
            None => Position::new(
                self.rng.gen_range(-bound..=bound),
                self.rng.gen_range(-bound..=bound),
            ),
        }
    }

    /// Drain notifications queued since the last call
    pub fn take_notifications(&mut self) -> Vec<ServerMsg> {
        std::mem::take(&mut self.pending)
    }
}
