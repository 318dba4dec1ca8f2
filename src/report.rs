//! Operator-facing console output
//!
//! Progress text is written to a [`Console`] rather than straight to stdout so
//! tests can capture exactly what an operator would read.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Line-oriented sink for console messages
pub struct Console {
    writer: Box<dyn Write + Send>,
}

impl Console {
    /// Console writing to the process's stdout
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    /// Console writing into a shared in-memory buffer
    pub fn buffered() -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (Self::new(buffer.clone()), buffer)
    }

    /// Write one line
    ///
    /// A broken console must not abort the run, so write errors are only logged.
    pub fn line(&mut self, message: impl Display) {
        if let Err(e) = writeln!(self.writer, "{}", message) {
            tracing::debug!(error = %e, "Console write failed");
        }
    }

    /// Write an empty line followed by `message`
    pub fn section(&mut self, message: impl Display) {
        self.line("");
        self.line(message);
    }

    /// Write each line of a block of captured program output
    pub fn block(&mut self, text: &str) {
        for line in text.lines() {
            self.line(line);
        }
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::debug!(error = %e, "Console flush failed");
        }
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

/// Cloneable in-memory writer
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Everything written so far, lossily decoded
    #[must_use]
    pub fn contents(&self) -> String {
        match self.inner.lock() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }

    /// Written text split into lines
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "console buffer poisoned"))?;
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
