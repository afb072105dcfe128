//! OS-specific elevation and resolver-cache plumbing.
//!
//! The fallback mutation path runs one elevated shell command per
//! apply/remove: backup, mutate, flush cache. One authorization prompt, not
//! one per line.

use crate::constants::{HOSTS_BACKUP_PATH, HOSTS_PATH, MANAGED_MARKER};
use std::path::PathBuf;
use std::process::Command;

/// Interactive elevated fallback for hosts-file mutations. Each method is a
/// single elevated invocation; `false` means the user declined or the
/// command failed.
pub trait Elevator: Send + Sync {
    fn append_entries(&self, lines: &[String]) -> bool;
    fn strip_hosts(&self, entries: &[String]) -> bool;
    fn strip_all(&self) -> bool;
}

/// Production elevator: builds a one-shot shell command and runs it through
/// the platform's graphical elevation prompt.
pub struct ShellElevator {
    hosts_path: PathBuf,
    backup_path: PathBuf,
}

impl ShellElevator {
    pub fn new() -> Self {
        Self {
            hosts_path: PathBuf::from(HOSTS_PATH),
            backup_path: PathBuf::from(HOSTS_BACKUP_PATH),
        }
    }

    fn backup_step(&self) -> String {
        format!(
            "cp {} {}",
            self.hosts_path.display(),
            self.backup_path.display()
        )
    }

    fn append_script(&self, lines: &[String]) -> String {
        let quoted: Vec<String> = lines.iter().map(|l| format!("'{}'", l)).collect();
        format!(
            "{} && printf '%s\\n' {} >> {} && {}",
            self.backup_step(),
            quoted.join(" "),
            self.hosts_path.display(),
            flush_script()
        )
    }

    fn strip_script(&self, entries: &[String]) -> String {
        let patterns: Vec<String> = entries.iter().map(|e| format!("-e '{}'", e)).collect();
        format!(
            "{} && grep -v -F {} {} > /tmp/hosts.new && mv /tmp/hosts.new {} && {}",
            self.backup_step(),
            patterns.join(" "),
            self.hosts_path.display(),
            self.hosts_path.display(),
            flush_script()
        )
    }
}

impl Default for ShellElevator {
    fn default() -> Self {
        Self::new()
    }
}

impl Elevator for ShellElevator {
    fn append_entries(&self, lines: &[String]) -> bool {
        run_elevated(&self.append_script(lines))
    }

    fn strip_hosts(&self, entries: &[String]) -> bool {
        run_elevated(&self.strip_script(entries))
    }

    fn strip_all(&self) -> bool {
        run_elevated(&self.strip_script(&[MANAGED_MARKER.to_string()]))
    }
}

fn flush_script() -> &'static str {
    if cfg!(target_os = "macos") {
        "dscacheutil -flushcache && killall -HUP mDNSResponder 2>/dev/null || true"
    } else {
        "resolvectl flush-caches 2>/dev/null || true"
    }
}

/// Run `script` through the platform's interactive elevation prompt.
fn run_elevated(script: &str) -> bool {
    let status = if cfg!(target_os = "macos") {
        let applescript = format!(
            "do shell script \"{}\" with administrator privileges",
            script.replace('\\', "\\\\").replace('"', "\\\"")
        );
        Command::new("osascript").arg("-e").arg(applescript).status()
    } else {
        Command::new("pkexec").arg("sh").arg("-c").arg(script).status()
    };

    match status {
        Ok(status) if status.success() => true,
        Ok(status) => {
            log::warn!("Elevated command exited with {}", status);
            false
        }
        Err(e) => {
            log::error!("Failed to run elevated command: {}", e);
            false
        }
    }
}

/// Flush the local resolver cache after a direct (already privileged)
/// mutation. Failures are logged and ignored; blocking still works, it just
/// takes effect on the next lookup.
pub fn flush_dns_cache() {
    let results = if cfg!(target_os = "macos") {
        vec![
            Command::new("dscacheutil").arg("-flushcache").status(),
            Command::new("killall").args(["-HUP", "mDNSResponder"]).status(),
        ]
    } else {
        vec![Command::new("resolvectl").arg("flush-caches").status()]
    };

    for result in results {
        if let Err(e) = result {
            log::debug!("DNS cache flush command failed: {}", e);
        }
    }
}
