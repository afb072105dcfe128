use focusguard::Daemon;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Daemon::start() {
        Ok(daemon) => daemon.wait(),
        Err(e) => {
            log::error!("Failed to start daemon: {}", e);
            std::process::exit(1);
        }
    }
}
