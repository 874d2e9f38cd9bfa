//! Verbatim protocol connection handler.

use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::config::ConnectionOptions;
use crate::envelope::{self, Envelope};
use crate::reader::LineReader;

/// Message sent with every echoed line.
pub const RECEIVED_MESSAGE: &str = "received";

/// Handle a verbatim protocol connection.
pub async fn handle_connection<S>(stream: S, options: ConnectionOptions) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = LineReader::new(reader, options);

    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            trace!("Blank line, closing connection");
            return writer.shutdown().await;
        }

        trace!(len = line.len(), "Echoing line");
        envelope::send(&mut writer, &Envelope::success(RECEIVED_MESSAGE, line.as_str())).await?;
    }

    trace!("Connection closed by client");
    Ok(())
}
