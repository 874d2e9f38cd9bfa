//! Head protocol connection handler.

use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use super::parser::parse;
use crate::config::ConnectionOptions;
use crate::envelope::{self, Envelope, CODE_PARSE_FAILURE};
use crate::reader::LineReader;

/// Message sent with a parsed request.
pub const SUCCESS_MESSAGE: &str = "Hello, world.";

/// Message sent when the request head cannot be parsed.
pub const PARSE_FAILURE_MESSAGE: &str = "failed to parse http query.";

/// Handle a head protocol connection.
///
/// Reads one request, answers it with a single envelope line and returns,
/// which closes the connection. A peer that disconnects before the blank
/// line gets no response.
pub async fn handle_connection<S>(stream: S, options: ConnectionOptions) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = LineReader::new(reader, options);

    let Some(request) = read_request(&mut lines).await? else {
        trace!("Connection closed before request was complete");
        return Ok(());
    };

    match parse(&request) {
        Ok(req) => {
            debug!(
                method = %req.method,
                path = %req.path,
                headers = req.headers.len(),
                "Parsed request"
            );
            envelope::send(&mut writer, &Envelope::success(SUCCESS_MESSAGE, req)).await?;
        }
        Err(e) => {
            debug!(error = %e, "Parse error");
            let response: Envelope<'_, ()> =
                Envelope::failure(PARSE_FAILURE_MESSAGE, CODE_PARSE_FAILURE);
            envelope::send(&mut writer, &response).await?;
        }
    }

    writer.shutdown().await
}

/// Accumulate lines until a blank line.
///
/// Returns `Ok(None)` if the stream ends first. The blank line itself is not
/// part of the returned request.
pub async fn read_request<R>(lines: &mut LineReader<R>) -> io::Result<Option<Vec<String>>>
where
    R: AsyncRead + Unpin,
{
    let mut request = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            return Ok(Some(request));
        }
        request.push(line);
    }

    Ok(None)
}
