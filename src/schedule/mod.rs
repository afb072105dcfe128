//! Schedule engine: evaluates recurring windows once a minute and drives the
//! blocking orchestrator at window edges.
//!
//! Two pieces of in-memory state keep the tick idempotent: `tracked` maps a
//! schedule to the block it activated (so a live window is not re-activated
//! every minute), and `failed` remembers schedules whose activation failed
//! (so a declined elevation prompt does not re-prompt every minute). Both
//! reset when the window closes.

use crate::blocking::BlockingService;
use crate::clock;
use crate::constants::TICK_INTERVAL_SECS;
use crate::db::Database;
use crate::error::AppError;
use crate::events::{AppEvent, EventBus};
use crate::hosts::normalize_host;
use crate::models::{HostBlock, Schedule};
use crate::validation;
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

pub struct ScheduleManager {
    db: Arc<Mutex<Database>>,
    blocking: Arc<BlockingService>,
    events: Arc<EventBus>,
    /// schedule id -> block id it activated.
    tracked: Mutex<HashMap<i64, i64>>,
    /// Schedules whose activation failed this window.
    failed: Mutex<HashSet<i64>>,
    ticking: Arc<AtomicBool>,
}

impl ScheduleManager {
    pub fn new(
        db: Arc<Mutex<Database>>,
        blocking: Arc<BlockingService>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            db,
            blocking,
            events,
            tracked: Mutex::new(HashMap::new()),
            failed: Mutex::new(HashSet::new()),
            ticking: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock_db(&self) -> MutexGuard<'_, Database> {
        match self.db.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("ScheduleManager: database mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn tracked(&self) -> MutexGuard<'_, HashMap<i64, i64>> {
        self.tracked.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn failed(&self) -> MutexGuard<'_, HashSet<i64>> {
        self.failed.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Validate and persist a new schedule. If its window is already live it
    /// takes effect on the next tick, not here.
    pub fn create_schedule(
        &self,
        host_name: &str,
        start_minute: u32,
        end_minute: u32,
        days_of_week: &str,
    ) -> Result<Schedule, AppError> {
        validation::validate_host_name(host_name)?;
        validation::validate_minute_of_day(start_minute)?;
        validation::validate_minute_of_day(end_minute)?;
        validation::validate_days_of_week(days_of_week)?;

        let host = normalize_host(host_name);
        let mut schedule = Schedule::new(&host, start_minute, end_minute, days_of_week);
        {
            let db = self.lock_db();
            schedule.save(db.connection())?;
        }
        info!(
            "Schedule created for {} ({:02}:{:02}-{:02}:{:02} on {})",
            host,
            start_minute / 60,
            start_minute % 60,
            end_minute / 60,
            end_minute % 60,
            days_of_week
        );
        Ok(schedule)
    }

    /// Persist edits to an existing schedule. If the edit moves the window
    /// off the current minute, the next tick (or the orchestrator's sweep)
    /// deactivates the tracked block.
    pub fn update_schedule(&self, schedule: &Schedule) -> Result<(), AppError> {
        validation::validate_host_name(&schedule.host_name)?;
        validation::validate_minute_of_day(schedule.start_minute)?;
        validation::validate_minute_of_day(schedule.end_minute)?;
        validation::validate_days_of_week(&schedule.days_of_week)?;

        let db = self.lock_db();
        schedule.update(db.connection())?;
        Ok(())
    }

    /// Delete a schedule, deactivating its block first if one is live.
    pub fn delete_schedule(&self, schedule_id: i64) -> Result<bool, AppError> {
        self.deactivate_tracked(schedule_id)?;
        self.failed().remove(&schedule_id);

        let db = self.lock_db();
        Ok(Schedule::delete(db.connection(), schedule_id)?)
    }

    /// Enable or disable a schedule. Disabling deactivates its live block
    /// immediately rather than waiting for the next tick.
    pub fn set_enabled(&self, schedule_id: i64, enabled: bool) -> Result<(), AppError> {
        let schedule = {
            let db = self.lock_db();
            Schedule::find_by_id(db.connection(), schedule_id)?
        };
        let mut schedule = schedule.ok_or(AppError::NotFound { entity: "schedule" })?;

        schedule.enabled = enabled;
        {
            let db = self.lock_db();
            schedule.update(db.connection())?;
        }

        if !enabled {
            self.deactivate_tracked(schedule_id)?;
            self.failed().remove(&schedule_id);
        }
        Ok(())
    }

    pub fn schedules(&self) -> rusqlite::Result<Vec<Schedule>> {
        let db = self.lock_db();
        Schedule::find_all(db.connection())
    }

    /// One evaluation pass at the given local day (1=Monday) and minute.
    ///
    /// Window opens: activate the block once; a failure is remembered and
    /// not retried until the window closes. Window closes (or the schedule
    /// is disabled, edited away, or deleted): deactivate the tracked block
    /// and forget any failure.
    pub fn tick(&self, day: u32, minute: u32) -> rusqlite::Result<()> {
        let schedules = {
            let db = self.lock_db();
            Schedule::find_all(db.connection())?
        };

        let mut seen = HashSet::new();
        for schedule in &schedules {
            let Some(id) = schedule.id else { continue };
            seen.insert(id);

            if schedule.should_be_active(day, minute) {
                let already_tracked = self.tracked().contains_key(&id);
                let already_failed = self.failed().contains(&id);
                if already_tracked || already_failed {
                    continue;
                }

                match self.adopt_or_activate(schedule, id)? {
                    Some(block_id) => {
                        self.tracked().insert(id, block_id);
                        self.events
                            .publish(&AppEvent::ScheduleActivated { schedule_id: id });
                    }
                    None => {
                        warn!(
                            "Schedule {} failed to activate for {}; will not retry this window",
                            id, schedule.host_name
                        );
                        self.failed().insert(id);
                    }
                }
            } else {
                if self.deactivate_tracked(id)? {
                    self.events
                        .publish(&AppEvent::ScheduleDeactivated { schedule_id: id });
                }
                self.failed().remove(&id);
            }
        }

        // Schedules deleted out from under a live block
        let orphaned: Vec<i64> = self
            .tracked()
            .keys()
            .filter(|id| !seen.contains(id))
            .copied()
            .collect();
        for id in orphaned {
            if self.deactivate_tracked(id)? {
                self.events
                    .publish(&AppEvent::ScheduleDeactivated { schedule_id: id });
            }
            self.failed().remove(&id);
        }

        Ok(())
    }

    /// Activate `schedule`'s block, or adopt one that already exists (left
    /// over from a previous run).
    fn adopt_or_activate(&self, schedule: &Schedule, id: i64) -> rusqlite::Result<Option<i64>> {
        let existing = {
            let db = self.lock_db();
            HostBlock::find_active_scheduled(db.connection())?
                .into_iter()
                .find(|b| b.schedule_id == Some(id))
        };

        if let Some(block) = existing {
            info!("Adopting existing block for schedule {}", id);
            return Ok(block.id);
        }

        self.blocking.activate_scheduled(&schedule.host_name, id)
    }

    /// Deactivate the block tracked for `schedule_id`, if any. Returns
    /// whether a block was deactivated. On mutation failure the block stays
    /// tracked so the next tick retries.
    fn deactivate_tracked(&self, schedule_id: i64) -> rusqlite::Result<bool> {
        let Some(block_id) = self.tracked().get(&schedule_id).copied() else {
            return Ok(false);
        };

        let block = {
            let db = self.lock_db();
            HostBlock::find_by_id(db.connection(), block_id)?
        };

        let deactivated = match block {
            Some(mut block) if block.is_active => self.blocking.deactivate(&mut block)?,
            // Row already gone or inactive; nothing left to undo.
            _ => true,
        };

        if deactivated {
            self.tracked().remove(&schedule_id);
        }
        Ok(deactivated)
    }

    /// Evaluate schedules every minute until `stop_ticker`. The first pass
    /// runs immediately so blocks whose window is already open do not wait a
    /// full interval.
    pub fn start_ticker(self: &Arc<Self>) -> thread::JoinHandle<()> {
        self.ticking.store(true, Ordering::SeqCst);
        let manager = Arc::clone(self);

        thread::spawn(move || {
            while manager.ticking.load(Ordering::SeqCst) {
                let (day, minute) = clock::weekday_and_minute(clock::now_secs());
                if let Err(e) = manager.tick(day, minute) {
                    log::error!("Schedule tick failed: {}", e);
                }
                thread::sleep(Duration::from_secs(TICK_INTERVAL_SECS));
            }
        })
    }

    pub fn stop_ticker(&self) {
        self.ticking.store(false, Ordering::SeqCst);
    }
}
