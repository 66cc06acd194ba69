//! Arena state and authoritative request loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ArenaConfig;
use crate::util::time::{tick_duration, unix_millis};
use crate::ws::protocol::{ClientMsg, Outbound, Recipient, ServerMsg, TeamColor};

use super::combat::{CombatResolver, DamageOutcome};
use super::ledger::ScoreLedger;
use super::registry::{Participant, Registration, SessionRegistry};
use super::respawn::RespawnCoordinator;
use super::scoreboard::{Scoreboard, ScoreboardBuilder};
use super::{ArenaRequest, GameError, Role, SessionId};

/// All authoritative state, mutated only through `handle` and `tick`
pub struct ArenaState {
    config: ArenaConfig,
    registry: SessionRegistry,
    ledger: ScoreLedger,
    combat: CombatResolver,
    respawn: RespawnCoordinator,
    scoreboard: ScoreboardBuilder,
    last_sync_at: u64,
}

impl ArenaState {
    pub fn new(config: ArenaConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        info!(
            teams = config.team_count,
            score_to_win = config.score_to_win,
            seed,
            "Arena created"
        );

        Self {
            registry: SessionRegistry::new(
                config.team_count,
                config.max_players,
                config.starting_health,
            ),
            ledger: ScoreLedger::new(
                Role::Authority,
                config.team_count,
                config.score_to_win,
                config.kill_dedup_window_ms,
            ),
            combat: CombatResolver::new(Role::Authority, config.credit_self_kills),
            respawn: RespawnCoordinator::new(
                config.respawn_delay_secs,
                config.spawn.clone(),
                seed,
            ),
            scoreboard: ScoreboardBuilder::new(),
            last_sync_at: 0,
            config,
        }
    }

    /// Apply one peer request
    pub fn handle(&mut self, request: ArenaRequest, now_ms: u64) -> Vec<Outbound> {
        let ArenaRequest {
            session_id,
            privileged,
            msg,
            received_at,
            reply,
        } = request;
        let mut out = Vec::new();
        debug!(
            session_id = %session_id,
            queued_ms = now_ms.saturating_sub(received_at),
            "Handling request"
        );

        let result = match msg {
            ClientMsg::RegisterName { name } if reply.is_some() => {
                self.handle_join(session_id, &name, &mut out)
            }
            ClientMsg::RegisterName { name } => self.handle_register(session_id, &name, &mut out),
            ClientMsg::ReportDamage {
                target_id,
                amount,
                attacker_id,
            } => self.handle_damage(session_id, target_id, amount, attacker_id, now_ms, &mut out),
            ClientMsg::RequestReset => self.handle_reset(session_id, privileged, &mut out),
            ClientMsg::SelectColor { r, g, b } => self.handle_select_color(session_id, TeamColor { r, g, b }),
            ClientMsg::Ping { t } => {
                out.push(Outbound::to(session_id, ServerMsg::Pong { t }));
                Ok(())
            }
            ClientMsg::Leave => {
                self.handle_leave(session_id, &mut out);
                Ok(())
            }
        };

        if let Err(e) = &result {
            debug!(session_id = %session_id, error = %e, "Request rejected");
        }
        match (result, reply) {
            (result, Some(reply)) => {
                // Transport is gone if the receiver dropped
                let _ = reply.send(result);
            }
            (Err(e), None) => {
                out.push(Outbound::to(session_id, ServerMsg::error(e.code(), e.to_string())));
            }
            (Ok(()), None) => {}
        }

        self.collect_notifications(&mut out);
        out
    }

    /// First registration of a new connection. A session id may back only one connection.
    fn handle_join(
        &mut self,
        session_id: SessionId,
        name: &str,
        out: &mut Vec<Outbound>,
    ) -> Result<(), GameError> {
        if self.registry.contains(session_id) {
            warn!(session_id = %session_id, "Second connection for a live session refused");
            return Err(GameError::AlreadyConnected(session_id));
        }
        self.handle_register(session_id, name, out)
    }

    fn handle_register(
        &mut self,
        session_id: SessionId,
        name: &str,
        out: &mut Vec<Outbound>,
    ) -> Result<(), GameError> {
        let registration = self.registry.register(session_id, name)?;

        if registration == Registration::Joined {
            let position = self.respawn.initial_position(&self.registry, session_id);
            if let Some(p) = self.registry.get_mut(session_id) {
                p.position = position;
            }

            // Bring the newcomer up to date before it sees incremental updates
            for other in self.registry.iter().filter(|p| p.session_id != session_id) {
                out.push(Outbound::to(session_id, joined_msg(other)));
            }
            for msg in self.ledger.team_info_sync() {
                out.push(Outbound::to(session_id, msg));
            }
        }

        if let Some(p) = self.registry.get(session_id) {
            out.push(Outbound::all(joined_msg(p)));
        }
        Ok(())
    }

    fn handle_damage(
        &mut self,
        reporter: SessionId,
        target_id: SessionId,
        amount: f32,
        attacker_id: Option<SessionId>,
        now_ms: u64,
        out: &mut Vec<Outbound>,
    ) -> Result<(), GameError> {
        if !self.registry.contains(reporter) {
            return Err(GameError::UnknownParticipant(reporter));
        }
        if let Some(attacker) = attacker_id {
            if attacker != reporter {
                warn!(reporter = %reporter, claimed = %attacker, "Damage report with spoofed attacker");
                out.push(Outbound::to(
                    reporter,
                    ServerMsg::error("spoofed_attacker", "Attacker must be the reporting session"),
                ));
                return Ok(());
            }
        }

        let outcome = self.combat.apply_damage(
            &mut self.registry,
            &mut self.ledger,
            target_id,
            amount,
            attacker_id,
            now_ms,
        )?;

        if let DamageOutcome::Killed { .. } = outcome {
            self.respawn.begin(target_id, now_ms);
        }
        Ok(())
    }

    fn handle_reset(
        &mut self,
        session_id: SessionId,
        privileged: bool,
        out: &mut Vec<Outbound>,
    ) -> Result<(), GameError> {
        if !privileged {
            warn!(session_id = %session_id, "Unprivileged reset request");
            out.push(Outbound::to(
                session_id,
                ServerMsg::error("forbidden", "Reset requires a privileged session"),
            ));
            return Ok(());
        }
        self.reset()
    }

    /// Zero scores and per-participant stats
    pub fn reset(&mut self) -> Result<(), GameError> {
        self.ledger.reset()?;
        let ids: Vec<SessionId> = self.registry.iter().map(|p| p.session_id).collect();
        for id in ids {
            if let Some(p) = self.registry.get_mut(id) {
                p.kills = 0;
                p.deaths = 0;
            }
        }
        self.scoreboard.mark_dirty();
        Ok(())
    }

    fn handle_select_color(&mut self, session_id: SessionId, color: TeamColor) -> Result<(), GameError> {
        let team = self.registry.get_team(session_id)?;
        self.ledger.set_team_color(team, color)
    }

    fn handle_leave(&mut self, session_id: SessionId, out: &mut Vec<Outbound>) {
        self.respawn.cancel(session_id);
        if self.registry.unregister(session_id).is_some() {
            out.push(Outbound::all(ServerMsg::ParticipantLeft { session_id }));
        }
    }

    /// Advance timers: respawn countdowns, revives and the periodic resync
    pub fn tick(&mut self, now_ms: u64) -> Vec<Outbound> {
        let mut out = Vec::new();

        for session_id in self.respawn.tick(now_ms) {
            self.respawn.revive(&mut self.registry, session_id);
        }
        self.collect_notifications(&mut out);

        if now_ms.saturating_sub(self.last_sync_at) >= self.config.team_sync_interval_ms {
            self.last_sync_at = now_ms;
            out.extend(self.resync());
        }
        out
    }

    /// Full team state for every peer
    pub fn resync(&self) -> Vec<Outbound> {
        self.ledger
            .team_info_sync()
            .into_iter()
            .map(Outbound::all)
            .collect()
    }

    fn collect_notifications(&mut self, out: &mut Vec<Outbound>) {
        out.extend(self.combat.take_notifications().into_iter().map(Outbound::all));
        out.extend(self.ledger.take_notifications().into_iter().map(Outbound::all));
        out.extend(self.respawn.take_notifications().into_iter().map(Outbound::all));

        if out.iter().any(|o| o.to == Recipient::All) {
            self.scoreboard.mark_dirty();
        }
    }

    pub fn scoreboard_if_dirty(&mut self) -> Option<Scoreboard> {
        self.scoreboard.build_if_dirty(&self.registry, &self.ledger)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    pub fn respawn(&self) -> &RespawnCoordinator {
        &self.respawn
    }
}

fn joined_msg(p: &Participant) -> ServerMsg {
    ServerMsg::ParticipantJoined {
        session_id: p.session_id,
        display_name: p.display_name.clone(),
        team_id: p.team,
        health: p.health,
        position: p.position,
    }
}

/// Handle to the running arena
#[derive(Clone)]
pub struct ArenaHandle {
    pub input_tx: mpsc::Sender<ArenaRequest>,
    pub events_tx: broadcast::Sender<Outbound>,
    pub scoreboard_rx: watch::Receiver<Scoreboard>,
    pub participant_count: Arc<AtomicUsize>,
}

impl ArenaHandle {
    pub fn participant_count(&self) -> usize {
        self.participant_count.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.events_tx.subscribe()
    }

    /// Latest published scoreboard
    pub fn scoreboard(&self) -> Scoreboard {
        self.scoreboard_rx.borrow().clone()
    }

    /// Queue a request for the arena loop
    pub async fn submit(&self, request: ArenaRequest) -> Result<(), ArenaClosed> {
        self.input_tx.send(request).await.map_err(|_| ArenaClosed)
    }

    /// Register a new connection and wait for the arena to admit it
    pub async fn join(
        &self,
        session_id: SessionId,
        name: String,
        privileged: bool,
    ) -> Result<(), JoinError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(ArenaRequest {
            session_id,
            privileged,
            msg: ClientMsg::RegisterName { name },
            received_at: unix_millis(),
            reply: Some(reply_tx),
        })
        .await?;

        reply_rx.await.map_err(|_| ArenaClosed)??;
        Ok(())
    }
}

/// The arena loop has stopped
#[derive(Debug, thiserror::Error)]
#[error("Arena loop is no longer running")]
pub struct ArenaClosed;

/// Why a connection was not admitted
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error(transparent)]
    Rejected(#[from] GameError),

    #[error(transparent)]
    Closed(#[from] ArenaClosed),
}

/// The authoritative arena task
pub struct Arena {
    state: ArenaState,
    input_rx: mpsc::Receiver<ArenaRequest>,
    events_tx: broadcast::Sender<Outbound>,
    scoreboard_tx: watch::Sender<Scoreboard>,
    participant_count: Arc<AtomicUsize>,
}

impl Arena {
    /// Create a new arena
    pub fn new(config: ArenaConfig) -> (Self, ArenaHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (events_tx, _) = broadcast::channel(256);
        let (scoreboard_tx, scoreboard_rx) = watch::channel(Scoreboard::default());
        let participant_count = Arc::new(AtomicUsize::new(0));

        let handle = ArenaHandle {
            input_tx,
            events_tx: events_tx.clone(),
            scoreboard_rx,
            participant_count: participant_count.clone(),
        };

        let arena = Self {
            state: ArenaState::new(config),
            input_rx,
            events_tx,
            scoreboard_tx,
            participant_count,
        };

        (arena, handle)
    }

    /// Run the authoritative loop until every request sender is gone
    pub async fn run(mut self) {
        info!("Arena loop started");

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain request queue
            let open = self.process_inputs();

            let out = self.state.tick(unix_millis());
            self.publish(out);

            if !open {
                info!("All request senders dropped, stopping arena");
                break;
            }
        }
    }

    /// Apply queued requests; returns false once the queue is closed
    fn process_inputs(&mut self) -> bool {
        loop {
            match self.input_rx.try_recv() {
                Ok(request) => {
                    let out = self.state.handle(request, unix_millis());
                    self.publish(out);
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn publish(&mut self, out: Vec<Outbound>) {
        for msg in out {
            // No subscribers is not an error
            let _ = self.events_tx.send(msg);
        }

        self.participant_count
            .store(self.state.registry().len(), Ordering::Relaxed);

        if let Some(board) = self.state.scoreboard_if_dirty() {
            self.scoreboard_tx.send_replace(board);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::respawn::RespawnPhase;
    use std::time::Duration;
    use uuid::Uuid;

    const A: Uuid = Uuid::from_u128(2);
    const B: Uuid = Uuid::from_u128(3);

    fn config() -> ArenaConfig {
        ArenaConfig {
            seed: Some(7),
            ..ArenaConfig::default()
        }
    }

    fn request(session_id: Uuid, msg: ClientMsg) -> ArenaRequest {
        ArenaRequest {
            session_id,
            privileged: false,
            msg,
            received_at: 0,
            reply: None,
        }
    }

    fn register(state: &mut ArenaState, id: Uuid, name: &str) -> Vec<Outbound> {
        state.handle(
            request(
                id,
                ClientMsg::RegisterName {
                    name: name.to_string(),
                },
            ),
            0,
        )
    }

    fn damage(state: &mut ArenaState, from: Uuid, target: Uuid, amount: f32, now: u64) -> Vec<Outbound> {
        state.handle(
            request(
                from,
                ClientMsg::ReportDamage {
                    target_id: target,
                    amount,
                    attacker_id: Some(from),
                },
            ),
            now,
        )
    }

    fn has_error(out: &[Outbound], session: Uuid, code: &str) -> bool {
        out.iter().any(|o| {
            o.to == Recipient::Session(session)
                && matches!(&o.msg, ServerMsg::Error { code: c, .. } if c == code)
        })
    }

    #[test]
    fn five_kill_scenario_ends_the_match() {
        let mut state = ArenaState::new(config());
        register(&mut state, A, "alpha");
        register(&mut state, B, "bravo");
        assert_eq!(state.registry().get_team(A).unwrap().0, 1);
        assert_eq!(state.registry().get_team(B).unwrap().0, 2);

        let mut now = 1_000;
        let mut match_over = 0;
        for round in 1..=5u32 {
            let out = damage(&mut state, A, B, 100.0, now);
            match_over += out
                .iter()
                .filter(|o| matches!(o.msg, ServerMsg::MatchOver { .. }))
                .count();
            assert_eq!(state.ledger().score(crate::ws::protocol::TeamId(1)), Some(round));
            assert_eq!(state.ledger().match_state().game_over, round == 5);

            // Revive B before the next round
            now += 3_000;
            state.tick(now);
            assert!(state.registry().get(B).unwrap().alive);
            now += 1_000;
        }

        assert_eq!(match_over, 1);
        let outcome = state.ledger().match_state();
        assert_eq!(outcome.winning_team.map(|t| t.0), Some(1));
        assert_eq!(outcome.winning_team_name.as_deref(), Some("Red Team"));
    }

    #[test]
    fn death_starts_countdown_and_respawn_follows() {
        let mut state = ArenaState::new(config());
        register(&mut state, A, "alpha");
        register(&mut state, B, "bravo");

        let out = damage(&mut state, A, B, 100.0, 10_000);
        assert!(out.iter().any(|o| matches!(
            o.msg,
            ServerMsg::RespawnCountdown { seconds_remaining: 3, .. }
        )));
        assert_eq!(
            state.respawn().phase(B),
            RespawnPhase::Dead { seconds_remaining: 3 }
        );

        // Other requests keep being served during the countdown
        let pong = state.handle(request(A, ClientMsg::Ping { t: 9 }), 11_500);
        assert_eq!(pong, vec![Outbound::to(A, ServerMsg::Pong { t: 9 })]);

        let out = state.tick(13_000);
        assert!(out
            .iter()
            .any(|o| matches!(o.msg, ServerMsg::ParticipantRespawned { session_id, .. } if session_id == B)));
        let b = state.registry().get(B).unwrap();
        assert!(b.alive);
        assert_eq!(b.health, 100.0);
    }

    #[test]
    fn newcomer_receives_existing_state() {
        let mut state = ArenaState::new(config());
        register(&mut state, A, "alpha");
        let out = register(&mut state, B, "bravo");

        let to_b: Vec<&ServerMsg> = out
            .iter()
            .filter(|o| o.to == Recipient::Session(B))
            .map(|o| &o.msg)
            .collect();
        assert!(to_b
            .iter()
            .any(|m| matches!(m, ServerMsg::ParticipantJoined { session_id, .. } if *session_id == A)));
        assert_eq!(
            to_b.iter()
                .filter(|m| matches!(m, ServerMsg::TeamInfoSync { .. }))
                .count(),
            2
        );
        assert!(out
            .iter()
            .any(|o| o.to == Recipient::All
                && matches!(o.msg, ServerMsg::ParticipantJoined { session_id, .. } if session_id == B)));
    }

    #[test]
    fn spoofed_attacker_is_rejected() {
        let mut state = ArenaState::new(config());
        register(&mut state, A, "alpha");
        register(&mut state, B, "bravo");

        let out = state.handle(
            request(
                A,
                ClientMsg::ReportDamage {
                    target_id: A,
                    amount: 100.0,
                    attacker_id: Some(B),
                },
            ),
            0,
        );
        assert!(has_error(&out, A, "spoofed_attacker"));
        assert!(state.registry().get(A).unwrap().alive);
    }

    #[test]
    fn unregistered_reporter_and_bad_amount_get_errors() {
        let mut state = ArenaState::new(config());
        register(&mut state, B, "bravo");
        let stranger = Uuid::from_u128(40);

        let out = damage(&mut state, stranger, B, 10.0, 0);
        assert!(has_error(&out, stranger, "unknown_participant"));

        register(&mut state, A, "alpha");
        let out = damage(&mut state, A, B, -5.0, 0);
        assert!(has_error(&out, A, "invalid_damage"));
        assert_eq!(state.registry().get(B).unwrap().health, 100.0);
    }

    #[test]
    fn reset_requires_privilege() {
        let mut state = ArenaState::new(config());
        register(&mut state, A, "alpha");
        register(&mut state, B, "bravo");
        damage(&mut state, A, B, 100.0, 0);

        let out = state.handle(request(A, ClientMsg::RequestReset), 10);
        assert!(has_error(&out, A, "forbidden"));
        assert_eq!(state.ledger().score(crate::ws::protocol::TeamId(1)), Some(1));

        let privileged = ArenaRequest {
            privileged: true,
            ..request(A, ClientMsg::RequestReset)
        };
        let out = state.handle(privileged, 20);
        assert!(out.iter().any(|o| o.msg == ServerMsg::MatchReset));
        assert_eq!(state.ledger().score(crate::ws::protocol::TeamId(1)), Some(0));
        assert_eq!(state.registry().get(A).unwrap().kills, 0);
    }

    #[test]
    fn select_color_updates_own_team() {
        let mut state = ArenaState::new(config());
        register(&mut state, B, "bravo");
        let out = state.handle(request(B, ClientMsg::SelectColor { r: 0, g: 250, b: 0 }), 0);
        assert!(out.iter().any(|o| matches!(
            &o.msg,
            ServerMsg::TeamInfoSync { team_id, name, .. } if team_id.0 == 2 && name == "Green Team"
        )));
    }

    #[test]
    fn leave_evicts_and_cancels_countdown() {
        let mut state = ArenaState::new(config());
        register(&mut state, A, "alpha");
        register(&mut state, B, "bravo");
        damage(&mut state, A, B, 100.0, 0);

        let out = state.handle(request(B, ClientMsg::Leave), 10);
        assert!(out
            .iter()
            .any(|o| o.msg == ServerMsg::ParticipantLeft { session_id: B }));
        assert!(state.registry().get(B).is_none());
        assert_eq!(state.respawn().phase(B), RespawnPhase::Alive);

        // Second leave is a no-op
        assert!(state.handle(request(B, ClientMsg::Leave), 20).is_empty());
    }

    fn join_request(session_id: Uuid) -> (ArenaRequest, oneshot::Receiver<Result<(), GameError>>) {
        let (tx, rx) = oneshot::channel();
        let request = ArenaRequest {
            reply: Some(tx),
            ..request(
                session_id,
                ClientMsg::RegisterName {
                    name: "tank".to_string(),
                },
            )
        };
        (request, rx)
    }

    #[test]
    fn join_refuses_second_connection_for_live_session() {
        let mut state = ArenaState::new(config());

        let (first, mut first_rx) = join_request(A);
        state.handle(first, 0);
        assert!(matches!(first_rx.try_recv(), Ok(Ok(()))));

        let (second, mut second_rx) = join_request(A);
        let out = state.handle(second, 10);
        assert!(matches!(
            second_rx.try_recv(),
            Ok(Err(GameError::AlreadyConnected(id))) if id == A
        ));
        assert!(out.is_empty());
        assert_eq!(state.registry().len(), 1);

        // Renames from the admitted connection still work
        register(&mut state, A, "renamed");
        assert_eq!(state.registry().get(A).unwrap().display_name, "renamed");
    }

    #[test]
    fn join_is_refused_when_arena_is_full() {
        let mut state = ArenaState::new(ArenaConfig {
            max_players: 1,
            ..config()
        });

        let (first, mut first_rx) = join_request(A);
        state.handle(first, 0);
        assert!(matches!(first_rx.try_recv(), Ok(Ok(()))));

        let (second, mut second_rx) = join_request(B);
        let out = state.handle(second, 10);
        assert!(matches!(
            second_rx.try_recv(),
            Ok(Err(GameError::SessionFull { max: 1 }))
        ));
        assert!(out.is_empty());
        assert!(state.registry().get(B).is_none());
    }

    #[test]
    fn periodic_resync_runs_on_interval() {
        let mut state = ArenaState::new(config());
        let count_syncs = |out: &[Outbound]| {
            out.iter()
                .filter(|o| matches!(o.msg, ServerMsg::TeamInfoSync { .. }))
                .count()
        };

        assert_eq!(count_syncs(&state.tick(5_000)), 2);
        assert_eq!(count_syncs(&state.tick(6_000)), 0);
        assert_eq!(count_syncs(&state.tick(7_000)), 2);
    }

    #[tokio::test]
    async fn arena_loop_broadcasts_kill_credit() {
        let (arena, handle) = Arena::new(config());
        let mut events = handle.subscribe();
        let task = tokio::spawn(arena.run());

        for (id, name) in [(A, "alpha"), (B, "bravo")] {
            handle
                .submit(request(id, ClientMsg::RegisterName { name: name.to_string() }))
                .await
                .unwrap();
        }
        handle
            .submit(request(
                A,
                ClientMsg::ReportDamage {
                    target_id: B,
                    amount: 100.0,
                    attacker_id: Some(A),
                },
            ))
            .await
            .unwrap();

        let score = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match events.recv().await {
                    Ok(Outbound {
                        msg: ServerMsg::ScoreChanged { team_id, score },
                        ..
                    }) => break (team_id.0, score),
                    Ok(_) => continue,
                    Err(e) => panic!("event channel failed: {e}"),
                }
            }
        })
        .await
        .expect("score change not broadcast");
        assert_eq!(score, (1, 1));

        let mut scoreboard = handle.scoreboard_rx.clone();
        tokio::time::timeout(
            Duration::from_secs(2),
            scoreboard.wait_for(|board| board.teams.first().map(|t| t.score) == Some(1)),
        )
        .await
        .expect("scoreboard not published")
        .unwrap();
        assert_eq!(handle.participant_count(), 2);

        let err = handle
            .join(A, "again".to_string(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, JoinError::Rejected(GameError::AlreadyConnected(_))));
        assert_eq!(handle.participant_count(), 2);

        drop(handle);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("arena did not stop")
            .unwrap();
    }
}
