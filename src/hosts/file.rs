//! Unprivileged primitives over the shared hosts file.
//!
//! Every line this engine writes carries `MANAGED_MARKER`, and every read or
//! strip filters on it, so unrelated content is never touched.

use crate::constants::{BLOCK_ADDR, MANAGED_MARKER};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Format the marked line for a host.
pub fn format_entry(host: &str) -> String {
    format!("{} {} {}", BLOCK_ADDR, host, MANAGED_MARKER)
}

/// Extract the host field from a marked line, if it is one of ours.
pub fn parse_entry(line: &str) -> Option<&str> {
    if !line.contains(MANAGED_MARKER) {
        return None;
    }
    let mut fields = line.split_whitespace();
    let _addr = fields.next()?;
    fields.next()
}

pub struct HostsFile {
    path: PathBuf,
}

impl HostsFile {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> io::Result<String> {
        fs::read_to_string(&self.path)
    }

    /// Hosts currently blocked by marked lines. Read errors degrade to the
    /// empty set; callers treat that as "nothing confirmed blocked".
    pub fn managed_hosts(&self) -> BTreeSet<String> {
        match self.read() {
            Ok(content) => content.lines().filter_map(|l| parse_entry(l).map(str::to_string)).collect(),
            Err(e) => {
                log::warn!("Failed to read hosts file {}: {}", self.path.display(), e);
                BTreeSet::new()
            }
        }
    }

    /// Whether the exact marked line for `host` is already present.
    pub fn contains_entry(&self, host: &str) -> bool {
        let entry = format_entry(host);
        match self.read() {
            Ok(content) => content.lines().any(|l| l.trim() == entry),
            Err(_) => false,
        }
    }

    /// Append marked lines for hosts not already present. Requires write
    /// access to the file; the caller handles elevation.
    pub fn append_entries(&self, hosts: &[String]) -> io::Result<()> {
        let mut content = self.read()?;

        let new_lines: Vec<String> = hosts
            .iter()
            .map(|h| format_entry(h))
            .filter(|entry| !content.lines().any(|l| l.trim() == *entry))
            .collect();

        if new_lines.is_empty() {
            return Ok(());
        }

        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        for line in &new_lines {
            content.push_str(line);
            content.push('\n');
        }
        fs::write(&self.path, content)
    }

    /// Remove marked lines whose host field matches any of `hosts`.
    pub fn strip_hosts(&self, hosts: &[String]) -> io::Result<()> {
        let content = self.read()?;
        let kept: Vec<&str> = content
            .lines()
            .filter(|line| match parse_entry(line) {
                Some(host) => !hosts.iter().any(|h| h == host),
                None => true,
            })
            .collect();
        self.write_lines(&kept)
    }

    /// Remove every marked line in one pass.
    pub fn strip_all(&self) -> io::Result<()> {
        let content = self.read()?;
        let kept: Vec<&str> = content
            .lines()
            .filter(|line| !line.contains(MANAGED_MARKER))
            .collect();
        self.write_lines(&kept)
    }

    fn write_lines(&self, lines: &[&str]) -> io::Result<()> {
        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        fs::write(&self.path, out)
    }
}
