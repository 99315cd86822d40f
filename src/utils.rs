//! Common utilities shared amongst the project.

use std::{
    io::{self, Write},
    sync::{Arc, Mutex, MutexGuard},
};

/// Write a complete, preformatted line to `sink` with a single `write_all`.
///
/// Best-effort: a failed write is logged and otherwise ignored.
pub fn write_line<W: Write + ?Sized>(sink: &mut W, line: &str) {
    if let Err(err) = sink.write_all(line.as_bytes()) {
        tracing::debug!("failed to write line: {err}");
    }
}

/// In-memory sink that can be handed to a handler while a clone is kept to
/// read back what was written.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Create an empty [SharedBuffer].
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, decoded lossily.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).to_string()
    }

    /// Everything written so far, split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A writer that panicked mid-write leaves plain bytes behind, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
