//! Combat resolution - damage, death detection and kill attribution

use tracing::{debug, info};

use crate::ws::protocol::{ServerMsg, TeamId};

use super::ledger::{CreditOutcome, KillId, ScoreLedger};
use super::registry::SessionRegistry;
use super::{GameError, Role, SessionId};

/// Outcome of a damage event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// Target was already dead; nothing changed
    Ignored,
    /// Target survived with the given health
    Damaged { health: f32 },
    /// Target died from this event
    Killed {
        killer: Option<SessionId>,
        credited: Option<TeamId>,
    },
}

/// Apply damage to current health, returns (new_health, is_dead)
pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
    let new_health = (current_health - damage).max(0.0);
    (new_health, new_health <= 0.0)
}

/// Resolves damage events against the registry and credits kills
pub struct CombatResolver {
    role: Role,
    credit_self_kills: bool,
    pending: Vec<ServerMsg>,
}

impl CombatResolver {
    pub fn new(role: Role, credit_self_kills: bool) -> Self {
        Self {
            role,
            credit_self_kills,
            pending: Vec::new(),
        }
    }

    /// Apply `amount` damage from `attacker` to `target`
    pub fn apply_damage(
        &mut self,
        registry: &mut SessionRegistry,
        ledger: &mut ScoreLedger,
        target_id: SessionId,
        amount: f32,
        attacker: Option<SessionId>,
        now_ms: u64,
    ) -> Result<DamageOutcome, GameError> {
        if !self.role.is_authority() {
            return Err(GameError::NotAuthoritative);
        }
        if !amount.is_finite() || amount < 0.0 {
            return Err(GameError::InvalidDamage(amount));
        }

        let target = registry
            .get_mut(target_id)
            .ok_or(GameError::UnknownParticipant(target_id))?;

        // Death is edge-triggered; further damage waits for the revive
        if !target.alive {
            debug!(target = %target_id, "Damage on dead participant ignored");
            return Ok(DamageOutcome::Ignored);
        }

        let (health, killed) = apply_damage(target.health, amount);
        target.health = health;
        target.last_attacker = attacker;
        self.pending.push(ServerMsg::HealthChanged {
            session_id: target_id,
            health,
        });

        if !killed {
            return Ok(DamageOutcome::Damaged { health });
        }

        target.alive = false;
        target.deaths += 1;
        let target_life = target.life;
        // Credit follows the lethal event only
        let killer = attacker;

        info!(target = %target_id, killer = ?killer, "Participant killed");
        self.pending.push(ServerMsg::ParticipantDied {
            session_id: target_id,
            killer_id: killer,
        });

        let credited = match killer {
            Some(killer) => self.credit(registry, ledger, killer, target_id, target_life, now_ms)?,
            None => None,
        };

        Ok(DamageOutcome::Killed { killer, credited })
    }

    fn credit(
        &mut self,
        registry: &mut SessionRegistry,
        ledger: &mut ScoreLedger,
        killer: SessionId,
        target: SessionId,
        target_life: u32,
        now_ms: u64,
    ) -> Result<Option<TeamId>, GameError> {
        if killer == target && !self.credit_self_kills {
            debug!(session_id = %killer, "Self-kill earns no credit");
            return Ok(None);
        }

        let team = match registry.get_team(killer) {
            Ok(team) => team,
            Err(_) => {
                debug!(killer = %killer, "Killer no longer registered, no credit");
                return Ok(None);
            }
        };

        let kill = KillId {
            attacker: killer,
            target,
            target_life,
        };
        match ledger.credit_kill(team, kill, now_ms)? {
            CreditOutcome::Credited { .. } => {
                if let Some(p) = registry.get_mut(killer) {
                    p.kills += 1;
                }
                Ok(Some(team))
            }
            CreditOutcome::Duplicate | CreditOutcome::InvalidTeam => Ok(None),
        }
    }

    /// Drain notifications queued since the last call
    pub fn take_notifications(&mut self) -> Vec<ServerMsg> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    // Even ids land on team 1, odd ids on team 2
    const A: Uuid = Uuid::from_u128(2);
    const B: Uuid = Uuid::from_u128(3);

    struct Fixture {
        registry: SessionRegistry,
        ledger: ScoreLedger,
        combat: CombatResolver,
    }

    impl Fixture {
        fn new(credit_self_kills: bool) -> Self {
            let mut registry = SessionRegistry::new(2, 4, 100.0);
            registry.register(A, "alpha").unwrap();
            registry.register(B, "bravo").unwrap();
            Self {
                registry,
                ledger: ScoreLedger::new(Role::Authority, 2, 5, 500),
                combat: CombatResolver::new(Role::Authority, credit_self_kills),
            }
        }

        fn hit(&mut self, target: Uuid, amount: f32, attacker: Option<Uuid>) -> Result<DamageOutcome, GameError> {
            self.combat.apply_damage(
                &mut self.registry,
                &mut self.ledger,
                target,
                amount,
                attacker,
                0,
            )
        }

        fn revive(&mut self, id: Uuid) {
            let p = self.registry.get_mut(id).unwrap();
            p.health = p.max_health;
            p.alive = true;
            p.last_attacker = None;
            p.life += 1;
        }
    }

    #[test]
    fn apply_damage_clamps_at_zero() {
        assert_eq!(apply_damage(100.0, 30.0), (70.0, false));
        assert_eq!(apply_damage(20.0, 30.0), (0.0, true));
        assert_eq!(apply_damage(30.0, 30.0), (0.0, true));
    }

    #[test]
    fn non_lethal_damage_records_attacker() {
        let mut fx = Fixture::new(false);
        let outcome = fx.hit(B, 40.0, Some(A)).unwrap();
        assert_eq!(outcome, DamageOutcome::Damaged { health: 60.0 });
        let b = fx.registry.get(B).unwrap();
        assert_eq!(b.last_attacker, Some(A));
        assert!(b.alive);
    }

    #[test]
    fn lethal_damage_credits_attacker_team() {
        let mut fx = Fixture::new(false);
        let outcome = fx.hit(B, 100.0, Some(A)).unwrap();
        assert_eq!(
            outcome,
            DamageOutcome::Killed {
                killer: Some(A),
                credited: Some(TeamId(1)),
            }
        );
        assert!(!fx.registry.get(B).unwrap().alive);
        assert_eq!(fx.registry.get(B).unwrap().deaths, 1);
        assert_eq!(fx.registry.get(A).unwrap().kills, 1);
        assert_eq!(fx.ledger.score(TeamId(1)), Some(1));
        assert!(!fx.ledger.match_state().game_over);

        let msgs = fx.combat.take_notifications();
        assert!(msgs.contains(&ServerMsg::ParticipantDied {
            session_id: B,
            killer_id: Some(A),
        }));
    }

    #[test]
    fn death_fires_once_for_any_split_of_lethal_damage() {
        let splits: [&[f32]; 4] = [
            &[100.0],
            &[50.0, 50.0],
            &[10.0, 85.0, 30.0, 40.0],
            &[99.0, 0.0, 1.0, 1.0, 500.0],
        ];
        for split in splits {
            let mut fx = Fixture::new(false);
            let mut deaths = 0;
            for amount in split {
                if let DamageOutcome::Killed { .. } = fx.hit(B, *amount, Some(A)).unwrap() {
                    deaths += 1;
                }
            }
            assert_eq!(deaths, 1, "split {:?}", split);
            assert_eq!(fx.ledger.score(TeamId(1)), Some(1));
        }
    }

    #[test]
    fn damage_after_death_is_ignored() {
        let mut fx = Fixture::new(false);
        assert_ok!(fx.hit(B, 150.0, Some(A)));
        assert_eq!(fx.hit(B, 10.0, Some(A)).unwrap(), DamageOutcome::Ignored);
        assert_eq!(fx.registry.get(B).unwrap().deaths, 1);
        assert_eq!(fx.ledger.score(TeamId(1)), Some(1));
    }

    #[test]
    fn unattributed_death_earns_no_credit() {
        let mut fx = Fixture::new(false);
        let outcome = fx.hit(B, 100.0, None).unwrap();
        assert_eq!(
            outcome,
            DamageOutcome::Killed {
                killer: None,
                credited: None,
            }
        );
        assert!(fx.ledger.teams().iter().all(|t| t.score == 0));
    }

    #[test]
    fn unattributed_finishing_blow_does_not_credit_earlier_attacker() {
        let mut fx = Fixture::new(false);
        assert_ok!(fx.hit(B, 10.0, Some(A)));
        let outcome = fx.hit(B, 90.0, None).unwrap();
        assert_eq!(
            outcome,
            DamageOutcome::Killed {
                killer: None,
                credited: None,
            }
        );
        assert_eq!(fx.ledger.score(TeamId(1)), Some(0));
        assert_eq!(fx.registry.get(A).unwrap().kills, 0);
        assert_eq!(fx.registry.get(B).unwrap().last_attacker, None);
    }

    #[test]
    fn unregistered_killer_earns_no_credit() {
        let mut fx = Fixture::new(false);
        let ghost = Uuid::from_u128(40);
        let outcome = fx.hit(B, 100.0, Some(ghost)).unwrap();
        assert_eq!(
            outcome,
            DamageOutcome::Killed {
                killer: Some(ghost),
                credited: None,
            }
        );
        assert!(fx.ledger.teams().iter().all(|t| t.score == 0));
    }

    #[test]
    fn self_damage_applies_but_self_kill_is_not_credited_by_default() {
        let mut fx = Fixture::new(false);
        assert_eq!(
            fx.hit(A, 30.0, Some(A)).unwrap(),
            DamageOutcome::Damaged { health: 70.0 }
        );
        let outcome = fx.hit(A, 70.0, Some(A)).unwrap();
        assert_eq!(
            outcome,
            DamageOutcome::Killed {
                killer: Some(A),
                credited: None,
            }
        );
        assert_eq!(fx.ledger.score(TeamId(1)), Some(0));
    }

    #[test]
    fn self_kill_credit_is_configurable() {
        let mut fx = Fixture::new(true);
        let outcome = fx.hit(A, 100.0, Some(A)).unwrap();
        assert_eq!(
            outcome,
            DamageOutcome::Killed {
                killer: Some(A),
                credited: Some(TeamId(1)),
            }
        );
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let mut fx = Fixture::new(false);
        assert!(matches!(assert_err!(fx.hit(B, -1.0, Some(A))), GameError::InvalidDamage(_)));
        assert!(matches!(assert_err!(fx.hit(B, f32::NAN, Some(A))), GameError::InvalidDamage(_)));
        assert!(matches!(
            assert_err!(fx.hit(Uuid::from_u128(99), 10.0, Some(A))),
            GameError::UnknownParticipant(_)
        ));

        let mut mirror = CombatResolver::new(Role::Mirror, false);
        let err = assert_err!(mirror.apply_damage(&mut fx.registry, &mut fx.ledger, B, 10.0, Some(A), 0));
        assert!(matches!(err, GameError::NotAuthoritative));
        assert_eq!(fx.registry.get(B).unwrap().health, 100.0);
    }

    #[test]
    fn five_kills_win_the_match() {
        let mut fx = Fixture::new(false);
        for round in 1..=5 {
            let outcome = fx.hit(B, 100.0, Some(A)).unwrap();
            assert!(matches!(outcome, DamageOutcome::Killed { credited: Some(TeamId(1)), .. }));
            assert_eq!(fx.ledger.score(TeamId(1)), Some(round));
            assert_eq!(fx.ledger.match_state().game_over, round == 5);
            fx.revive(B);
        }
        assert_eq!(fx.ledger.match_state().winning_team, Some(TeamId(1)));
        assert_eq!(fx.ledger.match_state().winning_team_name.as_deref(), Some("Red Team"));
    }
}
