use rusqlite::{params, Connection, Result};

/// Singleton row of user preferences. `get` creates it with defaults if the
/// migration seed is somehow missing.
#[derive(Debug, Clone)]
pub struct Settings {
    pub friction_delay_secs: u16,
    pub morning_prompt_enabled: bool,
    pub morning_prompt_hour: u8,
    pub morning_prompt_minute: u8,
    pub show_shame_stats: bool,
    pub show_notifications: bool,
    pub launch_at_login: bool,
    pub require_typing_to_disable: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            friction_delay_secs: 10,
            morning_prompt_enabled: true,
            morning_prompt_hour: 9,
            morning_prompt_minute: 0,
            show_shame_stats: true,
            show_notifications: true,
            launch_at_login: true,
            require_typing_to_disable: true,
        }
    }
}

impl Settings {
    pub fn get(conn: &Connection) -> Result<Self> {
        conn.execute("INSERT OR IGNORE INTO settings (id) VALUES (1)", [])?;
        conn.query_row(
            "SELECT friction_delay_secs, morning_prompt_enabled, morning_prompt_hour,
                    morning_prompt_minute, show_shame_stats, show_notifications,
                    launch_at_login, require_typing_to_disable
             FROM settings WHERE id = 1",
            [],
            |row| {
                Ok(Self {
                    friction_delay_secs: row.get(0)?,
                    morning_prompt_enabled: row.get::<_, i32>(1)? != 0,
                    morning_prompt_hour: row.get(2)?,
                    morning_prompt_minute: row.get(3)?,
                    show_shame_stats: row.get::<_, i32>(4)? != 0,
                    show_notifications: row.get::<_, i32>(5)? != 0,
                    launch_at_login: row.get::<_, i32>(6)? != 0,
                    require_typing_to_disable: row.get::<_, i32>(7)? != 0,
                })
            },
        )
    }

    pub fn save(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE settings SET friction_delay_secs = ?1, morning_prompt_enabled = ?2,
                    morning_prompt_hour = ?3, morning_prompt_minute = ?4,
                    show_shame_stats = ?5, show_notifications = ?6,
                    launch_at_login = ?7, require_typing_to_disable = ?8
             WHERE id = 1",
            params![
                self.friction_delay_secs,
                self.morning_prompt_enabled as i32,
                self.morning_prompt_hour,
                self.morning_prompt_minute,
                self.show_shame_stats as i32,
                self.show_notifications as i32,
                self.launch_at_login as i32,
                self.require_typing_to_disable as i32,
            ],
        )?;
        Ok(())
    }
}
