// src/constants.rs

/// Seconds in one day (24 * 60 * 60)
pub const SECS_PER_DAY: i64 = 86400;

/// Minutes in one day; schedule window minutes are 0..MINUTES_PER_DAY
pub const MINUTES_PER_DAY: u32 = 1440;

/// Path of the shared hosts file this engine mutates
pub const HOSTS_PATH: &str = "/etc/hosts";

/// Where the elevated fallback copies the hosts file before mutating it
pub const HOSTS_BACKUP_PATH: &str = "/tmp/hosts.backup";

/// Marker appended to every line we write; listing and removal filter on it
pub const MANAGED_MARKER: &str = "# FocusGuard Managed";

/// Loopback address block entries point at
pub const BLOCK_ADDR: &str = "127.0.0.1";

/// Unix socket the privileged helper listens on
pub const HELPER_SOCKET_PATH: &str = "/var/run/focusguard-helper.sock";

/// Helper version reported by get_version
pub const HELPER_VERSION: &str = "1.0.0";

/// Bounded wait for a helper reply before falling back to the elevated shell
pub const HELPER_TIMEOUT_SECS: u64 = 5;

/// Period of the expiration sweep and the schedule tick
pub const TICK_INTERVAL_SECS: u64 = 60;

/// Countdown seconds when settings are unavailable
pub const DEFAULT_FRICTION_DELAY_SECS: u16 = 10;

/// Phrase the user must type to confirm disabling a block
pub const REQUIRED_PHRASE: &str = "I want to disable this block";

/// Maximum host name length accepted by validation (RFC 1035 limit)
pub const MAX_HOST_NAME_LEN: usize = 253;

/// Upper bound on the configurable friction delay
pub const MAX_FRICTION_DELAY_SECS: u16 = 300;
