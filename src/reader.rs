//! Line reader shared by every protocol.
//!
//! One `LineReader` lives for the whole connection. Bytes that arrive past
//! the end of a line stay in its buffer for the next call.

use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::config::ConnectionOptions;

/// Read buffer size
const BUFFER_SIZE: usize = 4 * 1024;

/// Buffers a byte stream and yields newline-terminated lines.
pub struct LineReader<R> {
    inner: R,
    buffer: BytesMut,
    /// Prefix of `buffer` already known to hold no `\n`.
    scanned: usize,
    options: ConnectionOptions,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R, options: ConnectionOptions) -> Self {
        LineReader {
            inner,
            buffer: BytesMut::with_capacity(BUFFER_SIZE),
            scanned: 0,
            options,
        }
    }

    /// Return the next line with its terminator and surrounding whitespace
    /// removed.
    ///
    /// `Ok(None)` means the peer closed the stream. Any bytes received after
    /// the last `\n` are dropped in that case.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
                let line = self.buffer.split_to(self.scanned + offset + 1);
                self.scanned = 0;
                self.check_length(strip_terminator(&line).len())?;
                return Ok(Some(decode_line(&line)));
            }
            self.scanned = self.buffer.len();

            // Leave room for a `\r` whose `\n` has not arrived yet.
            self.check_length(self.buffer.len().saturating_sub(1))?;

            if self.fill().await? == 0 {
                if !self.buffer.is_empty() {
                    trace!(bytes = self.buffer.len(), "Discarding unterminated data at EOF");
                    self.buffer.clear();
                    self.scanned = 0;
                }
                return Ok(None);
            }
        }
    }

    fn check_length(&self, len: usize) -> io::Result<()> {
        match self.options.max_line_length {
            Some(max) if len > max => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line exceeds {max} bytes"),
            )),
            _ => Ok(()),
        }
    }

    /// Read more data into the buffer, honouring the read deadline.
    async fn fill(&mut self) -> io::Result<usize> {
        self.buffer.reserve(BUFFER_SIZE);

        match self.options.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.read_buf(&mut self.buffer))
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no data received for {}s", limit.as_secs_f64()),
                    )
                })?,
            None => self.inner.read_buf(&mut self.buffer).await,
        }
    }
}

fn strip_terminator(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}
