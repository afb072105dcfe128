//! Wire protocol and channel abstraction for the privileged helper.
//!
//! Frames are 4-byte little-endian length prefix + JSON, the same framing
//! the browser-extension native host uses.

mod client;
mod server;

pub use client::HelperClient;
pub use server::HelperService;

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

/// 1MB cap per frame; anything larger is a protocol violation.
const MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HelperRequest {
    #[serde(rename = "block_urls")]
    BlockUrls { urls: Vec<String> },
    #[serde(rename = "unblock_urls")]
    UnblockUrls { urls: Vec<String> },
    #[serde(rename = "remove_all_blocks")]
    RemoveAllBlocks,
    #[serde(rename = "get_version")]
    GetVersion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl HelperReply {
    pub fn ok() -> Self {
        Self { success: true, error: None, version: None }
    }

    pub fn failure(message: &str) -> Self {
        Self { success: false, error: Some(message.to_string()), version: None }
    }

    pub fn with_version(version: &str) -> Self {
        Self { success: true, error: None, version: Some(version.to_string()) }
    }
}

/// Why a channel call produced no definitive reply. Callers treat every
/// variant the same way: fall back to the interactive path.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("helper unavailable: {0}")]
    Unavailable(String),
    #[error("helper call timed out")]
    Timeout,
    #[error("helper protocol error: {0}")]
    Protocol(String),
}

/// Abstract bidirectional call to the out-of-process privileged agent.
pub trait HelperChannel: Send + Sync {
    fn call(&self, request: &HelperRequest) -> Result<HelperReply, ChannelError>;
}

pub(crate) fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> std::io::Result<()> {
    let json = serde_json::to_vec(message)?;
    let len = json.len() as u32;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&json)?;
    writer.flush()
}

pub(crate) fn read_frame<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Frame too large: {} bytes (max: {} bytes)", len, MAX_FRAME_SIZE),
        ));
    }

    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}
