//! Friction gate: the deliberate-disable flow for an active block.
//!
//! Disabling is a state machine, not a button: a countdown the caller ticks
//! once per second, then a confirmation phrase typed verbatim. Only a
//! correct phrase deactivates the block, and every confirmed pass is
//! recorded as a bypass.

use crate::blocking::BlockingService;
use crate::constants::{DEFAULT_FRICTION_DELAY_SECS, REQUIRED_PHRASE};
use crate::models::{BypassType, HostBlock};
use log::info;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Seconds remaining before the phrase prompt unlocks.
    CountingDown(u16),
    AwaitingPhrase,
    Confirmed,
    Cancelled,
}

pub struct FrictionGate {
    blocking: Arc<BlockingService>,
    block: HostBlock,
    state: GateState,
}

impl FrictionGate {
    /// Open a gate for `block`. `delay_secs` normally comes from settings; a
    /// zero delay still goes through one tick before unlocking.
    pub fn new(blocking: Arc<BlockingService>, block: HostBlock, delay_secs: u16) -> Self {
        let delay = if delay_secs == 0 {
            DEFAULT_FRICTION_DELAY_SECS
        } else {
            delay_secs
        };
        Self {
            blocking,
            block,
            state: GateState::CountingDown(delay),
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn host_name(&self) -> &str {
        &self.block.host_name
    }

    /// Advance the countdown by one second. Ticks in any other state are
    /// no-ops; there is no way to skip ahead.
    pub fn tick(&mut self) -> GateState {
        if let GateState::CountingDown(remaining) = self.state {
            self.state = match remaining.saturating_sub(1) {
                0 => GateState::AwaitingPhrase,
                left => GateState::CountingDown(left),
            };
        }
        self.state
    }

    /// Check `input` against the required phrase. Comparison trims
    /// whitespace and ignores case; anything else must match exactly.
    ///
    /// A correct phrase deactivates the block and records the bypass; if
    /// the hosts-file mutation fails the gate stays open so the user can
    /// retry. A wrong phrase, or a submission outside `AwaitingPhrase`,
    /// changes nothing.
    pub fn submit(&mut self, input: &str) -> rusqlite::Result<GateState> {
        if self.state != GateState::AwaitingPhrase {
            return Ok(self.state);
        }
        if !phrase_matches(input) {
            return Ok(self.state);
        }

        if !self.blocking.deactivate(&mut self.block)? {
            return Ok(self.state);
        }

        self.blocking
            .record_bypass(&self.block.host_name, BypassType::FrictionOverride, None)?;
        info!("Friction gate confirmed for {}", self.block.host_name);
        self.state = GateState::Confirmed;
        Ok(self.state)
    }

    /// Abandon the flow. The block stays active and nothing is recorded.
    /// Terminal states are unaffected.
    pub fn cancel(&mut self) -> GateState {
        if matches!(
            self.state,
            GateState::CountingDown(_) | GateState::AwaitingPhrase
        ) {
            self.state = GateState::Cancelled;
        }
        self.state
    }
}

fn phrase_matches(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(REQUIRED_PHRASE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock;
    use crate::db::{migrations, Database};
    use crate::events::EventBus;
    use crate::models::BypassEvent;
    use crate::test_support::{failing_hosts_manager, working_hosts_manager};
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        blocking: Arc<BlockingService>,
        db: Arc<Mutex<Database>>,
        dir: TempDir,
    }

    fn setup(hosts_work: bool) -> Fixture {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        migrations::run(db.connection()).unwrap();
        let db = Arc::new(Mutex::new(db));

        let hosts = if hosts_work {
            working_hosts_manager(dir.path())
        } else {
            failing_hosts_manager(dir.path())
        };

        let blocking = Arc::new(BlockingService::new(
            Arc::clone(&db),
            hosts,
            Arc::new(EventBus::new()),
        ));
        Fixture { blocking, db, dir }
    }

    fn active_block(f: &Fixture, host: &str) -> HostBlock {
        f.blocking.activate(host, None).unwrap();
        f.blocking.active_blocks().unwrap().remove(0)
    }

    fn gate(f: &Fixture, host: &str, delay: u16) -> FrictionGate {
        FrictionGate::new(Arc::clone(&f.blocking), active_block(f, host), delay)
    }

    fn bypass_count(f: &Fixture) -> i64 {
        let db = f.db.lock().unwrap();
        BypassEvent::today_count(db.connection(), clock::now_secs()).unwrap()
    }

    #[test]
    fn test_countdown_runs_full_length() {
        let f = setup(true);
        let mut gate = gate(&f, "reddit.com", 3);

        assert_eq!(gate.state(), GateState::CountingDown(3));
        assert_eq!(gate.tick(), GateState::CountingDown(2));
        assert_eq!(gate.tick(), GateState::CountingDown(1));
        assert_eq!(gate.tick(), GateState::AwaitingPhrase);
        // Extra ticks are no-ops
        assert_eq!(gate.tick(), GateState::AwaitingPhrase);
    }

    #[test]
    fn test_submit_during_countdown_is_ignored() {
        let f = setup(true);
        let mut gate = gate(&f, "reddit.com", 5);

        let state = gate.submit(REQUIRED_PHRASE).unwrap();
        assert_eq!(state, GateState::CountingDown(5));
        assert!(f.blocking.is_host_blocked("reddit.com").unwrap());
    }

    #[test]
    fn test_wrong_phrase_keeps_block_active() {
        let f = setup(true);
        let mut gate = gate(&f, "reddit.com", 1);
        gate.tick();

        for attempt in ["unblock", "I want to disable", "I want to disable this block!"] {
            assert_eq!(gate.submit(attempt).unwrap(), GateState::AwaitingPhrase);
        }
        assert!(f.blocking.is_host_blocked("reddit.com").unwrap());
        assert_eq!(bypass_count(&f), 0);
    }

    #[test]
    fn test_correct_phrase_disables_and_records_once() {
        let f = setup(true);
        let mut gate = gate(&f, "reddit.com", 1);
        gate.tick();

        // Case and surrounding whitespace are tolerated
        let state = gate.submit("  i WANT to disable this block \n").unwrap();
        assert_eq!(state, GateState::Confirmed);
        assert!(!f.blocking.is_host_blocked("reddit.com").unwrap());
        assert_eq!(bypass_count(&f), 1);

        // Terminal: a second submission does nothing
        assert_eq!(gate.submit(REQUIRED_PHRASE).unwrap(), GateState::Confirmed);
        assert_eq!(bypass_count(&f), 1);
    }

    #[test]
    fn test_cancel_leaves_block_active() {
        let f = setup(true);
        let mut gate = gate(&f, "reddit.com", 2);
        gate.tick();

        assert_eq!(gate.cancel(), GateState::Cancelled);
        assert!(f.blocking.is_host_blocked("reddit.com").unwrap());
        assert_eq!(bypass_count(&f), 0);

        // Cancelled is terminal too
        assert_eq!(gate.submit(REQUIRED_PHRASE).unwrap(), GateState::Cancelled);
        assert!(f.blocking.is_host_blocked("reddit.com").unwrap());
    }

    #[test]
    fn test_mutation_failure_keeps_gate_open() {
        let f = setup(true);
        let block = active_block(&f, "reddit.com");

        // Same ledger and hosts file, but a mutator that refuses
        let failing = Arc::new(BlockingService::new(
            Arc::clone(&f.db),
            failing_hosts_manager(f.dir.path()),
            Arc::new(EventBus::new()),
        ));
        let mut gate = FrictionGate::new(failing, block, 1);
        gate.tick();

        assert_eq!(gate.submit(REQUIRED_PHRASE).unwrap(), GateState::AwaitingPhrase);
        assert_eq!(f.blocking.active_blocks().unwrap().len(), 1);
        assert_eq!(bypass_count(&f), 0);
    }

    #[test]
    fn test_zero_delay_falls_back_to_default() {
        let f = setup(true);
        let gate = gate(&f, "reddit.com", 0);
        assert_eq!(
            gate.state(),
            GateState::CountingDown(DEFAULT_FRICTION_DELAY_SECS)
        );
    }
}
