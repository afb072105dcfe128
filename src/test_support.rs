//! Shared fixtures for service-level tests: hosts managers backed by a plain
//! temp file instead of the privileged channel or an elevation prompt.

use crate::hosts::{parse_entry, HostsFile, HostsManager};
use crate::platform::Elevator;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BASE: &str = "127.0.0.1 localhost\n::1 localhost\n";

/// Elevator that writes the hosts file directly, no prompt involved.
struct DirectElevator {
    file: HostsFile,
}

impl Elevator for DirectElevator {
    fn append_entries(&self, lines: &[String]) -> bool {
        let hosts: Vec<String> = lines
            .iter()
            .filter_map(|l| parse_entry(l).map(str::to_string))
            .collect();
        self.file.append_entries(&hosts).is_ok()
    }

    fn strip_hosts(&self, entries: &[String]) -> bool {
        let hosts: Vec<String> = entries
            .iter()
            .filter_map(|l| parse_entry(l).map(str::to_string))
            .collect();
        self.file.strip_hosts(&hosts).is_ok()
    }

    fn strip_all(&self) -> bool {
        self.file.strip_all().is_ok()
    }
}

/// Elevator that refuses every mutation, as if the user declined the
/// prompt, counting how often it was asked.
struct RefusingElevator {
    calls: Arc<AtomicUsize>,
}

impl Elevator for RefusingElevator {
    fn append_entries(&self, _lines: &[String]) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        false
    }

    fn strip_hosts(&self, _entries: &[String]) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        false
    }

    fn strip_all(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        false
    }
}

fn hosts_path(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("hosts");
    if !path.exists() {
        fs::write(&path, BASE).unwrap();
    }
    path
}

/// Manager whose mutations land directly in `<dir>/hosts`.
pub fn working_hosts_manager(dir: &Path) -> Arc<HostsManager> {
    let path = hosts_path(dir);
    let elevator = Box::new(DirectElevator {
        file: HostsFile::new(&path),
    });
    Arc::new(HostsManager::new(&path, None, elevator))
}

/// Manager whose mutations always fail.
pub fn failing_hosts_manager(dir: &Path) -> Arc<HostsManager> {
    counting_failing_hosts_manager(dir).0
}

/// Failing manager plus a counter of mutation attempts that reached the
/// elevator.
pub fn counting_failing_hosts_manager(dir: &Path) -> (Arc<HostsManager>, Arc<AtomicUsize>) {
    let path = hosts_path(dir);
    let calls = Arc::new(AtomicUsize::new(0));
    let elevator = Box::new(RefusingElevator {
        calls: Arc::clone(&calls),
    });
    (Arc::new(HostsManager::new(&path, None, elevator)), calls)
}
