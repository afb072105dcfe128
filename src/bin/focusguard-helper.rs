//! Privileged helper: a root-owned process that answers hosts-file mutation
//! requests over a unix socket so the daemon never needs to prompt.

use focusguard::constants::{HELPER_SOCKET_PATH, HELPER_VERSION, HOSTS_PATH};
use focusguard::helper::HelperService;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixListener;
use std::path::Path;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let socket_path = Path::new(HELPER_SOCKET_PATH);
    // A previous run's socket would make bind fail with AddrInUse
    if socket_path.exists() {
        if let Err(e) = fs::remove_file(socket_path) {
            log::error!("Failed to remove stale socket {}: {}", socket_path.display(), e);
            std::process::exit(1);
        }
    }

    let listener = match UnixListener::bind(socket_path) {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Failed to bind {}: {}", socket_path.display(), e);
            std::process::exit(1);
        }
    };

    // The daemon runs unprivileged and must be able to connect
    if let Err(e) = fs::set_permissions(socket_path, fs::Permissions::from_mode(0o666)) {
        log::warn!("Failed to set socket permissions: {}", e);
    }

    log::info!(
        "Helper {} listening on {}",
        HELPER_VERSION,
        socket_path.display()
    );

    let service = HelperService::new(Path::new(HOSTS_PATH));
    if let Err(e) = service.serve(listener) {
        log::error!("Helper terminated: {}", e);
        std::process::exit(1);
    }
}
