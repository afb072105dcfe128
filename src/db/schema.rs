pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS host_blocks (
    id INTEGER PRIMARY KEY,
    host_name TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    expires_at INTEGER,
    is_scheduled INTEGER NOT NULL DEFAULT 0,
    schedule_id INTEGER
);

CREATE TABLE IF NOT EXISTS schedules (
    id INTEGER PRIMARY KEY,
    host_name TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    start_minute INTEGER NOT NULL,
    end_minute INTEGER NOT NULL,
    days_of_week TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS bypass_events (
    id INTEGER PRIMARY KEY,
    host_name TEXT NOT NULL,
    bypass_type TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    reason_given TEXT
);

CREATE TABLE IF NOT EXISTS usage_sessions (
    id INTEGER PRIMARY KEY,
    host_name TEXT NOT NULL,
    duration_secs INTEGER NOT NULL,
    was_blocked INTEGER NOT NULL DEFAULT 0,
    timestamp INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS daily_stats (
    id INTEGER PRIMARY KEY,
    day_start INTEGER NOT NULL UNIQUE,
    bypass_count INTEGER NOT NULL DEFAULT 0,
    block_activation_count INTEGER NOT NULL DEFAULT 0,
    wasted_secs INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    friction_delay_secs INTEGER NOT NULL DEFAULT 10,
    morning_prompt_enabled INTEGER NOT NULL DEFAULT 1,
    morning_prompt_hour INTEGER NOT NULL DEFAULT 9,
    morning_prompt_minute INTEGER NOT NULL DEFAULT 0,
    show_shame_stats INTEGER NOT NULL DEFAULT 1,
    show_notifications INTEGER NOT NULL DEFAULT 1,
    launch_at_login INTEGER NOT NULL DEFAULT 1,
    require_typing_to_disable INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_host_blocks_active ON host_blocks(is_active);
CREATE INDEX IF NOT EXISTS idx_bypass_events_timestamp ON bypass_events(timestamp);
CREATE INDEX IF NOT EXISTS idx_usage_sessions_timestamp ON usage_sessions(timestamp);
"#;
