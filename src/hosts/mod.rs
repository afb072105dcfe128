//! Resource mutator: turns host names into blockable variants and applies
//! them to the shared hosts file, privileged channel first, interactive
//! elevated shell as fallback.

mod file;

pub use file::{format_entry, parse_entry, HostsFile};

use crate::helper::{HelperChannel, HelperReply, HelperRequest};
use crate::platform::Elevator;
use std::collections::BTreeSet;
use std::path::Path;

/// Strip scheme, path, and trailing slash; lowercase.
pub fn normalize_host(raw: &str) -> String {
    let trimmed = raw.trim().to_lowercase();

    let host = if trimmed.contains("://") {
        match url::Url::parse(&trimmed) {
            Ok(parsed) => parsed.host_str().unwrap_or("").to_string(),
            Err(_) => trimmed,
        }
    } else {
        trimmed
    };

    host.split('/').next().unwrap_or("").to_string()
}

/// The blockable variant set for one host: the bare name plus its `www.`
/// toggle. `x.com` additionally pulls in `twitter.com` (the pre-rebrand
/// name) and its `www.` variant.
pub fn host_variants(raw: &str) -> BTreeSet<String> {
    let clean = normalize_host(raw);
    let mut variants = BTreeSet::new();
    if clean.is_empty() {
        return variants;
    }

    match clean.strip_prefix("www.") {
        Some(bare) => {
            variants.insert(bare.to_string());
        }
        None => {
            variants.insert(format!("www.{}", clean));
        }
    }
    variants.insert(clean.clone());

    if clean == "x.com" || clean == "www.x.com" {
        variants.insert("twitter.com".to_string());
        variants.insert("www.twitter.com".to_string());
    }

    variants
}

pub struct HostsManager {
    file: HostsFile,
    channel: Option<Box<dyn HelperChannel>>,
    elevator: Box<dyn Elevator>,
}

impl HostsManager {
    pub fn new(
        hosts_path: &Path,
        channel: Option<Box<dyn HelperChannel>>,
        elevator: Box<dyn Elevator>,
    ) -> Self {
        Self {
            file: HostsFile::new(hosts_path),
            channel,
            elevator,
        }
    }

    /// Block every variant of every given host. Already-present variants are
    /// skipped; if nothing is left to write, no transport is touched and the
    /// call succeeds.
    pub fn apply(&self, host_names: &BTreeSet<String>) -> bool {
        let present = self.file.managed_hosts();
        let to_add: Vec<String> = expand(host_names)
            .into_iter()
            .filter(|h| !present.contains(h))
            .collect();

        if to_add.is_empty() {
            return true;
        }

        match self.try_channel(&HelperRequest::BlockUrls { urls: to_add.clone() }) {
            Some(reply) => reply.success,
            None => {
                let lines: Vec<String> = to_add.iter().map(|h| format_entry(h)).collect();
                self.elevator.append_entries(&lines)
            }
        }
    }

    /// Unblock every variant of every given host. Variants not present are
    /// skipped; removing nothing succeeds without touching a transport.
    pub fn remove(&self, host_names: &BTreeSet<String>) -> bool {
        let present = self.file.managed_hosts();
        let to_remove: Vec<String> = expand(host_names)
            .into_iter()
            .filter(|h| present.contains(h))
            .collect();

        if to_remove.is_empty() {
            return true;
        }

        match self.try_channel(&HelperRequest::UnblockUrls { urls: to_remove.clone() }) {
            Some(reply) => reply.success,
            None => {
                let lines: Vec<String> = to_remove.iter().map(|h| format_entry(h)).collect();
                self.elevator.strip_hosts(&lines)
            }
        }
    }

    /// Strip every marked line in one pass.
    pub fn remove_all(&self) -> bool {
        match self.try_channel(&HelperRequest::RemoveAllBlocks) {
            Some(reply) => reply.success,
            None => self.elevator.strip_all(),
        }
    }

    /// Hosts currently blocked by marked lines. Never fails; read errors
    /// degrade to the empty set.
    pub fn list_blocked(&self) -> BTreeSet<String> {
        self.file.managed_hosts()
    }

    /// Try the privileged channel. `None` means no definitive reply
    /// (not installed, unreachable, or timed out) and the caller must fall
    /// back; a definitive failure reply is returned as-is and is final.
    fn try_channel(&self, request: &HelperRequest) -> Option<HelperReply> {
        let channel = self.channel.as_ref()?;
        match channel.call(request) {
            Ok(reply) => {
                if !reply.success {
                    log::error!(
                        "Helper refused mutation: {}",
                        reply.error.as_deref().unwrap_or("unknown error")
                    );
                }
                Some(reply)
            }
            Err(e) => {
                log::warn!("Helper channel failed ({}), falling back to elevated shell", e);
                None
            }
        }
    }
}

fn expand(host_names: &BTreeSet<String>) -> BTreeSet<String> {
    host_names.iter().flat_map(|h| host_variants(h)).collect()
}
