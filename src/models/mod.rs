mod bypass_event;
mod daily_stats;
mod host_block;
mod schedule;
mod settings;
mod usage_session;

pub use bypass_event::{BypassEvent, BypassType};
pub use daily_stats::DailyStats;
pub use host_block::HostBlock;
pub use schedule::Schedule;
pub use settings::Settings;
pub use usage_session::UsageSession;
