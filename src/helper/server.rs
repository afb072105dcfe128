use super::{read_frame, write_frame, HelperReply, HelperRequest};
use crate::constants::HELPER_VERSION;
use crate::hosts::HostsFile;
use crate::platform;
use std::io;
use std::os::unix::net::UnixListener;
use std::path::Path;

/// Server side of the privileged channel.
///
/// Runs inside the root-owned helper process, so it mutates the hosts file
/// directly; no elevation and no prompts.
pub struct HelperService {
    hosts: HostsFile,
    flush_cache: bool,
}

impl HelperService {
    pub fn new(hosts_path: &Path) -> Self {
        Self {
            hosts: HostsFile::new(hosts_path),
            flush_cache: true,
        }
    }

    /// Disable the resolver-cache flush after mutations (useful outside a
    /// privileged environment).
    pub fn flush_cache(mut self, enabled: bool) -> Self {
        self.flush_cache = enabled;
        self
    }

    pub fn handle(&self, request: &HelperRequest) -> HelperReply {
        match request {
            HelperRequest::BlockUrls { urls } => self.mutate(|| self.hosts.append_entries(urls)),
            HelperRequest::UnblockUrls { urls } => self.mutate(|| self.hosts.strip_hosts(urls)),
            HelperRequest::RemoveAllBlocks => self.mutate(|| self.hosts.strip_all()),
            HelperRequest::GetVersion => HelperReply::with_version(HELPER_VERSION),
        }
    }

    fn mutate<F: FnOnce() -> io::Result<()>>(&self, f: F) -> HelperReply {
        match f() {
            Ok(()) => {
                if self.flush_cache {
                    platform::flush_dns_cache();
                }
                HelperReply::ok()
            }
            Err(e) => {
                log::error!("Hosts file mutation failed: {}", e);
                HelperReply::failure(&e.to_string())
            }
        }
    }

    /// Accept connections forever, answering frames until each client hangs up.
    pub fn serve(&self, listener: UnixListener) -> io::Result<()> {
        for stream in listener.incoming() {
            let mut stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    log::warn!("Failed to accept helper connection: {}", e);
                    continue;
                }
            };

            loop {
                let payload = match read_frame(&mut stream) {
                    Ok(p) => p,
                    Err(_) => break, // client disconnected
                };

                let reply = match serde_json::from_slice::<HelperRequest>(&payload) {
                    Ok(request) => self.handle(&request),
                    Err(e) => HelperReply::failure(&format!("invalid request: {}", e)),
                };

                if let Err(e) = write_frame(&mut stream, &reply) {
                    log::warn!("Failed to write helper reply: {}", e);
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> (HelperService, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hosts");
        fs::write(&path, "127.0.0.1 localhost\n").unwrap();
        (HelperService::new(&path).flush_cache(false), dir)
    }

    #[test]
    fn test_block_and_unblock() {
        let (service, _dir) = setup();

        let reply = service.handle(&HelperRequest::BlockUrls {
            urls: vec!["reddit.com".into(), "www.reddit.com".into()],
        });
        assert!(reply.success);
        assert_eq!(service.hosts.managed_hosts().len(), 2);

        let reply = service.handle(&HelperRequest::UnblockUrls {
            urls: vec!["reddit.com".into()],
        });
        assert!(reply.success);
        let hosts = service.hosts.managed_hosts();
        assert!(!hosts.contains("reddit.com"));
        assert!(hosts.contains("www.reddit.com"));
    }

    #[test]
    fn test_remove_all_blocks() {
        let (service, _dir) = setup();

        service.handle(&HelperRequest::BlockUrls {
            urls: vec!["reddit.com".into(), "youtube.com".into()],
        });
        let reply = service.handle(&HelperRequest::RemoveAllBlocks);
        assert!(reply.success);
        assert!(service.hosts.managed_hosts().is_empty());
    }

    #[test]
    fn test_get_version() {
        let (service, _dir) = setup();
        let reply = service.handle(&HelperRequest::GetVersion);
        assert!(reply.success);
        assert_eq!(reply.version.as_deref(), Some(HELPER_VERSION));
    }

    #[test]
    fn test_missing_hosts_file_reports_failure() {
        let dir = tempdir().unwrap();
        let service = HelperService::new(&dir.path().join("missing")).flush_cache(false);

        let reply = service.handle(&HelperRequest::BlockUrls {
            urls: vec!["reddit.com".into()],
        });
        assert!(!reply.success);
        assert!(reply.error.is_some());
    }
}
