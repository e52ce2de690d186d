/// Seven-state institutional entry FSM. State and event are closed
/// enums and the transition function is a total match: every
/// (state, event) pair either transitions or is an explicit no-op.
use std::collections::VecDeque;

use serde::Serialize;

use crate::config::SmcConfig;
use crate::smc::ZoneDirection;

const TRANSITION_HISTORY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstState {
    Idle,
    WaitSweep,
    WaitChoch,
    WaitFvg,
    WaitMitigation,
    WaitEntry,
    Cooldown,
}

impl InstState {
    pub fn as_str(&self) -> &str {
        match self {
            InstState::Idle => "IDLE",
            InstState::WaitSweep => "WAIT_SWEEP",
            InstState::WaitChoch => "WAIT_CHOCH",
            InstState::WaitFvg => "WAIT_FVG",
            InstState::WaitMitigation => "WAIT_MITIGATION",
            InstState::WaitEntry => "WAIT_ENTRY",
            InstState::Cooldown => "COOLDOWN",
        }
    }
}

/// Inputs the orchestrator feeds the machine. Only closed-candle
/// evidence ever becomes an event.
#[derive(Debug, Clone)]
pub enum InstEvent {
    /// Previous session present and context allows trading
    ContextReady,
    /// Context degraded to NO_TRADE
    ContextRejected,
    SweepConfirmed { direction: ZoneDirection },
    ChochConfirmed { direction: ZoneDirection },
    FvgFormed,
    FvgMitigated,
    FvgInvalidated,
    TradeExecuted,
    StateTimeout,
    CooldownElapsed,
    SessionRollover,
}

impl InstEvent {
    pub fn as_str(&self) -> &str {
        match self {
            InstEvent::ContextReady => "context_ready",
            InstEvent::ContextRejected => "context_rejected",
            InstEvent::SweepConfirmed { .. } => "sweep_confirmed",
            InstEvent::ChochConfirmed { .. } => "choch_confirmed",
            InstEvent::FvgFormed => "fvg_formed",
            InstEvent::FvgMitigated => "fvg_mitigated",
            InstEvent::FvgInvalidated => "fvg_invalidated",
            InstEvent::TradeExecuted => "trade_executed",
            InstEvent::StateTimeout => "state_timeout",
            InstEvent::CooldownElapsed => "cooldown_elapsed",
            InstEvent::SessionRollover => "session_rollover",
        }
    }
}

/// Terminal outcome attached to a transition, when one exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NoTrade { reason: &'static str },
    Expire,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionRecord {
    pub from: String,
    pub to: String,
    pub trigger: String,
    pub at_ms: i64,
}

/// Total transition function. Unlisted pairs are deliberate no-ops
/// (stay in place, no outcome).
pub fn transition(state: InstState, event: &InstEvent) -> (InstState, Option<Outcome>) {
    use InstEvent::*;
    use InstState::*;

    match (state, event) {
        (Idle, ContextReady) => (WaitSweep, None),

        (WaitSweep, SweepConfirmed { .. }) => (WaitChoch, None),
        (WaitChoch, ChochConfirmed { .. }) => (WaitFvg, None),
        (WaitFvg, FvgFormed) => (WaitMitigation, None),
        (WaitMitigation, FvgMitigated) => (WaitEntry, None),
        (WaitMitigation, FvgInvalidated) => (
            Idle,
            Some(Outcome::NoTrade {
                reason: "fvg_invalidated",
            }),
        ),
        (WaitEntry, TradeExecuted) => (Cooldown, None),
        (Cooldown, CooldownElapsed) => (Idle, None),

        // Any armed state collapses on timeout, context loss or rollover
        (s, StateTimeout) if s != Idle => (Idle, Some(Outcome::Expire)),
        (s, ContextRejected) if s != Idle => (
            Idle,
            Some(Outcome::NoTrade {
                reason: "context_reject",
            }),
        ),
        (s, SessionRollover) if s != Idle => (Idle, None),

        // Everything else is a documented no-op
        (s, _) => (s, None),
    }
}

/// Per-state timeout in minutes; None means the state never expires
pub fn state_timeout_min(state: InstState, config: &SmcConfig) -> Option<i64> {
    match state {
        InstState::Idle => None,
        InstState::WaitSweep => Some(config.wait_sweep_timeout_min),
        InstState::WaitChoch => Some(config.wait_choch_timeout_min),
        InstState::WaitFvg => Some(config.wait_fvg_timeout_min),
        InstState::WaitMitigation => Some(config.wait_mitigation_timeout_min),
        InstState::WaitEntry => Some(config.wait_entry_timeout_min),
        InstState::Cooldown => Some(config.cooldown_min),
    }
}

/// Bounded transition journal (last 20)
#[derive(Default)]
pub struct TransitionLog {
    records: VecDeque<TransitionRecord>,
}

impl TransitionLog {
    pub fn push(&mut self, record: TransitionRecord) {
        if self.records.len() >= TRANSITION_HISTORY {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [InstState; 7] = [
        InstState::Idle,
        InstState::WaitSweep,
        InstState::WaitChoch,
        InstState::WaitFvg,
        InstState::WaitMitigation,
        InstState::WaitEntry,
        InstState::Cooldown,
    ];

    fn all_events() -> Vec<InstEvent> {
        vec![
            InstEvent::ContextReady,
            InstEvent::ContextRejected,
            InstEvent::SweepConfirmed {
                direction: ZoneDirection::Bearish,
            },
            InstEvent::ChochConfirmed {
                direction: ZoneDirection::Bearish,
            },
            InstEvent::FvgFormed,
            InstEvent::FvgMitigated,
            InstEvent::FvgInvalidated,
            InstEvent::TradeExecuted,
            InstEvent::StateTimeout,
            InstEvent::CooldownElapsed,
            InstEvent::SessionRollover,
        ]
    }

    #[test]
    fn test_happy_path_traversal() {
        let mut state = InstState::Idle;
        let steps: Vec<InstEvent> = vec![
            InstEvent::ContextReady,
            InstEvent::SweepConfirmed {
                direction: ZoneDirection::Bearish,
            },
            InstEvent::ChochConfirmed {
                direction: ZoneDirection::Bearish,
            },
            InstEvent::FvgFormed,
            InstEvent::FvgMitigated,
            InstEvent::TradeExecuted,
            InstEvent::CooldownElapsed,
        ];
        let expected = [
            InstState::WaitSweep,
            InstState::WaitChoch,
            InstState::WaitFvg,
            InstState::WaitMitigation,
            InstState::WaitEntry,
            InstState::Cooldown,
            InstState::Idle,
        ];
        for (event, want) in steps.iter().zip(expected.iter()) {
            let (next, outcome) = transition(state, event);
            assert_eq!(next, *want);
            assert!(outcome.is_none());
            state = next;
        }
    }

    #[test]
    fn test_totality_every_pair_is_defined() {
        // The match is total by construction; make sure no pair panics
        // and no-ops really stay in place
        for state in ALL_STATES {
            for event in all_events() {
                let (next, _) = transition(state, &event);
                // next is always a member of the closed enum; reaching
                // here without panic is the property
                let _ = next.as_str();
            }
        }
        // Spot-check a no-op: a sweep cannot fire while idle
        let (next, outcome) = transition(
            InstState::Idle,
            &InstEvent::SweepConfirmed {
                direction: ZoneDirection::Bullish,
            },
        );
        assert_eq!(next, InstState::Idle);
        assert!(outcome.is_none());
    }

    #[test]
    fn test_fvg_invalidation_emits_no_trade() {
        let (next, outcome) = transition(InstState::WaitMitigation, &InstEvent::FvgInvalidated);
        assert_eq!(next, InstState::Idle);
        assert_eq!(
            outcome,
            Some(Outcome::NoTrade {
                reason: "fvg_invalidated"
            })
        );
    }

    #[test]
    fn test_timeout_expires_every_armed_state() {
        for state in ALL_STATES {
            let (next, outcome) = transition(state, &InstEvent::StateTimeout);
            if state == InstState::Idle {
                assert_eq!(next, InstState::Idle);
                assert!(outcome.is_none());
            } else {
                assert_eq!(next, InstState::Idle);
                assert_eq!(outcome, Some(Outcome::Expire));
            }
        }
    }

    #[test]
    fn test_context_rejection_resets_with_reason() {
        let (next, outcome) = transition(InstState::WaitFvg, &InstEvent::ContextRejected);
        assert_eq!(next, InstState::Idle);
        assert_eq!(
            outcome,
            Some(Outcome::NoTrade {
                reason: "context_reject"
            })
        );
    }

    #[test]
    fn test_rollover_resets_silently() {
        let (next, outcome) = transition(InstState::WaitEntry, &InstEvent::SessionRollover);
        assert_eq!(next, InstState::Idle);
        assert!(outcome.is_none());
    }

    #[test]
    fn test_transition_log_is_bounded() {
        let mut log = TransitionLog::default();
        for i in 0..30 {
            log.push(TransitionRecord {
                from: "IDLE".to_string(),
                to: "WAIT_SWEEP".to_string(),
                trigger: format!("t{}", i),
                at_ms: i,
            });
        }
        assert_eq!(log.len(), 20);
        // Oldest entries were dropped
        assert_eq!(log.records().next().unwrap().trigger, "t10");
    }
}
