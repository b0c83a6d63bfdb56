//! The destination for mirrored wire traffic.
//!
//! A [`Sink`] is a cheaply cloneable handle to a single writer. Every clone
//! writes to the same destination, and each call to [`Sink::write`] is
//! performed under one lock, so concurrent connections interleave at the
//! granularity of individual reads and writes.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Banner written to the sink whenever a new connection is established.
pub const SEPARATOR: &str = "\n--------------------------------------------------------------------------------\n\n";

type Writer = Box<dyn Write + Send + 'static>;

/// Shared, append-only destination for diagnostic byte output.
#[derive(Clone)]
pub struct Sink {
    writer: Arc<Mutex<Writer>>,
    name: &'static str,
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sink").field(&self.name).finish()
    }
}

impl Default for Sink {
    fn default() -> Self {
        Sink::stderr()
    }
}

impl Sink {
    /// Create a sink which writes to the given writer.
    pub fn new<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
            name: "writer",
        }
    }

    /// A sink attached to the process' standard error.
    pub fn stderr() -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(io::stderr()))),
            name: "stderr",
        }
    }

    /// Create a sink which collects into memory, along with a handle
    /// for reading back what was written.
    pub fn capture() -> (Self, Capture) {
        let capture = Capture::default();
        let sink = Self {
            writer: Arc::new(Mutex::new(Box::new(capture.clone()))),
            name: "capture",
        };
        (sink, capture)
    }

    /// Append bytes to the sink.
    ///
    /// Failures are logged and otherwise ignored: the sink must never
    /// interfere with the connection it observes.
    pub fn write(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }

        let mut writer = self.writer.lock();
        if let Err(error) = writer.write_all(bytes).and_then(|_| writer.flush()) {
            tracing::warn!(sink = self.name, %error, "failed to write to sink");
        }
    }

    /// Write the connection separator banner.
    pub fn separator(&self) {
        self.write(SEPARATOR.as_bytes());
    }
}

/// In-memory sink contents, shared with the [`Sink`] created by [`Sink::capture`].
#[derive(Debug, Clone, Default)]
pub struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Capture {
    /// A copy of all bytes captured so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }

    /// The captured bytes, lossily decoded as UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    /// Number of bytes captured.
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Whether nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Discard everything captured so far.
    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
