use super::{read_frame, write_frame, ChannelError, HelperChannel, HelperReply, HelperRequest};
use crate::constants::{HELPER_SOCKET_PATH, HELPER_TIMEOUT_SECS};
use std::io::ErrorKind;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Client side of the privileged channel.
///
/// The connection is established lazily on first call and torn down after
/// any error so the next call reconnects transparently. Every call is
/// bounded by a read/write timeout; a hung helper surfaces as
/// `ChannelError::Timeout` and the caller falls back.
pub struct HelperClient {
    socket_path: PathBuf,
    timeout: Duration,
    stream: Mutex<Option<UnixStream>>,
}

impl HelperClient {
    pub fn new() -> Self {
        Self::with_socket(Path::new(HELPER_SOCKET_PATH), Duration::from_secs(HELPER_TIMEOUT_SECS))
    }

    pub fn with_socket(socket_path: &Path, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.to_path_buf(),
            timeout,
            stream: Mutex::new(None),
        }
    }

    fn connect(&self) -> Result<UnixStream, ChannelError> {
        let stream = UnixStream::connect(&self.socket_path)
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.timeout)))
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;
        Ok(stream)
    }

    fn classify(e: std::io::Error) -> ChannelError {
        match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => ChannelError::Timeout,
            _ => ChannelError::Unavailable(e.to_string()),
        }
    }
}

impl Default for HelperClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HelperChannel for HelperClient {
    fn call(&self, request: &HelperRequest) -> Result<HelperReply, ChannelError> {
        let mut guard = self.stream.lock().unwrap_or_else(|p| p.into_inner());

        if guard.is_none() {
            *guard = Some(self.connect()?);
        }

        let result = (|| {
            let stream = guard.as_mut().ok_or_else(|| {
                ChannelError::Unavailable("no connection".to_string())
            })?;
            write_frame(stream, request).map_err(Self::classify)?;
            let payload = read_frame(stream).map_err(Self::classify)?;
            serde_json::from_slice::<HelperReply>(&payload)
                .map_err(|e| ChannelError::Protocol(e.to_string()))
        })();

        if result.is_err() {
            // Drop the stream; the next call reconnects.
            *guard = None;
        }
        result
    }
}
