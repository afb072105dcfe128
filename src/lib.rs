//! FocusGuard: temporary and scheduled website blocking through the system
//! hosts file.
//!
//! The daemon owns a SQLite ledger of blocking intent and converges the
//! hosts file toward it: manual blocks with optional expiry, recurring
//! schedules evaluated once a minute, and a typed-phrase friction gate in
//! front of every disable. Mutations go through the privileged helper when
//! it is installed and fall back to an interactive elevated shell when it
//! is not.

pub mod blocking;
pub mod clock;
pub mod constants;
pub mod db;
pub mod error;
pub mod events;
pub mod friction;
pub mod helper;
pub mod hosts;
pub mod models;
pub mod platform;
pub mod schedule;
pub mod validation;

#[cfg(test)]
mod test_support;

use crate::blocking::BlockingService;
use crate::constants::HOSTS_PATH;
use crate::db::{migrations, with_connection, Database};
use crate::error::AppError;
use crate::events::EventBus;
use crate::friction::FrictionGate;
use crate::helper::{HelperChannel, HelperClient};
use crate::hosts::HostsManager;
use crate::models::{DailyStats, HostBlock, Settings, UsageSession};
use crate::platform::ShellElevator;
use crate::schedule::ScheduleManager;
use directories::ProjectDirs;
use log::info;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

fn database_path() -> Result<PathBuf, AppError> {
    let dirs = ProjectDirs::from("com", "focusguard", "FocusGuard")
        .ok_or_else(|| AppError::Internal("could not determine data directory".to_string()))?;
    std::fs::create_dir_all(dirs.data_dir())?;
    Ok(dirs.data_dir().join("focusguard.db"))
}

/// The long-running engine process: ledger, mutator, orchestrator, schedule
/// ticker, and expiration sweep, wired together.
pub struct Daemon {
    db: Arc<Mutex<Database>>,
    blocking: Arc<BlockingService>,
    schedules: Arc<ScheduleManager>,
    events: Arc<EventBus>,
    handles: Vec<JoinHandle<()>>,
}

impl Daemon {
    /// Start against the default database and `/etc/hosts`, with the
    /// privileged helper as the preferred transport.
    pub fn start() -> Result<Self, AppError> {
        let channel: Box<dyn HelperChannel> = Box::new(HelperClient::new());
        Self::start_with(
            &database_path()?,
            Path::new(HOSTS_PATH),
            Some(channel),
        )
    }

    /// Start with explicit paths and transport. Used by tests and by
    /// embedders that manage their own layout.
    pub fn start_with(
        db_path: &Path,
        hosts_path: &Path,
        channel: Option<Box<dyn HelperChannel>>,
    ) -> Result<Self, AppError> {
        let db = Database::open(db_path)?;
        migrations::run(db.connection())?;
        let db = Arc::new(Mutex::new(db));

        let events = Arc::new(EventBus::new());
        let hosts = Arc::new(HostsManager::new(
            hosts_path,
            channel,
            Box::new(ShellElevator::new()),
        ));
        let blocking = Arc::new(BlockingService::new(
            Arc::clone(&db),
            hosts,
            Arc::clone(&events),
        ));
        let schedules = Arc::new(ScheduleManager::new(
            Arc::clone(&db),
            Arc::clone(&blocking),
            Arc::clone(&events),
        ));

        // Converge a hosts file wiped while we were not running
        blocking.reapply_on_startup()?;

        let handles = vec![blocking.start_sweep(), schedules.start_ticker()];
        info!("Daemon started (database {})", db_path.display());

        Ok(Self {
            db,
            blocking,
            schedules,
            events,
            handles,
        })
    }

    pub fn blocking(&self) -> &Arc<BlockingService> {
        &self.blocking
    }

    pub fn schedules(&self) -> &Arc<ScheduleManager> {
        &self.schedules
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Open a friction gate for the first active block matching `host_name`,
    /// with the countdown length taken from settings. `None` when nothing
    /// matching is blocked.
    pub fn open_friction_gate(&self, host_name: &str) -> Result<Option<FrictionGate>, String> {
        let block = with_connection(&self.db, "find block to disable", |conn| {
            HostBlock::find_active_matching(conn, host_name)
        })?;
        let Some(block) = block else {
            return Ok(None);
        };

        let settings = with_connection(&self.db, "load settings", Settings::get)?;
        Ok(Some(FrictionGate::new(
            Arc::clone(&self.blocking),
            block,
            settings.friction_delay_secs,
        )))
    }

    pub fn settings(&self) -> Result<Settings, String> {
        with_connection(&self.db, "load settings", Settings::get)
    }

    pub fn update_settings(&self, settings: &Settings) -> Result<(), String> {
        validation::validate_friction_delay(settings.friction_delay_secs)
            .map_err(String::from)?;
        with_connection(&self.db, "save settings", |conn| settings.save(conn))
    }

    /// Daily counters for the trailing week, newest first.
    pub fn weekly_stats(&self) -> Result<Vec<DailyStats>, String> {
        with_connection(&self.db, "load weekly stats", |conn| {
            DailyStats::last_week(conn, clock::now_secs())
        })
    }

    /// Today's tracked seconds per host.
    pub fn today_usage(&self) -> Result<HashMap<String, i64>, String> {
        with_connection(&self.db, "load today's usage", |conn| {
            UsageSession::today_usage_by_host(conn, clock::now_secs())
        })
    }

    /// Signal both background loops to exit after their current sleep.
    pub fn stop(&self) {
        self.blocking.stop_sweep();
        self.schedules.stop_ticker();
        info!("Daemon stopping");
    }

    /// Block until the background loops exit. They only do so after
    /// [`stop`](Self::stop), so calling this without it parks forever.
    pub fn wait(mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
