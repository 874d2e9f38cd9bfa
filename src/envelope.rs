//! Response envelope shared by every protocol.
//!
//! Every response is one JSON object followed by `\n`:
//!
//! ```text
//! {"message":"received","code":1,"data":"hello"}
//! {"message":"failed to parse http query.","code":400,"data":null}
//! ```
//!
//! `code` is an application status, not an HTTP status code.

use serde::Serialize;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

/// Request was understood.
pub const CODE_OK: i32 = 1;

/// Request could not be parsed.
pub const CODE_PARSE_FAILURE: i32 = 400;

/// The three-field response wrapper.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T> {
    pub message: &'a str,
    pub code: i32,
    pub data: Option<T>,
}

impl<'a, T: Serialize> Envelope<'a, T> {
    pub fn success(message: &'a str, data: T) -> Self {
        Envelope {
            message,
            code: CODE_OK,
            data: Some(data),
        }
    }

    pub fn failure(message: &'a str, code: i32) -> Self {
        Envelope {
            message,
            code,
            data: None,
        }
    }

    /// Serialize to a single JSON line including the trailing `\n`.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        let mut out = serde_json::to_vec(self)?;
        out.push(b'\n');
        Ok(out)
    }
}

/// Encode `envelope` and write it to the peer.
///
/// An envelope that fails to serialize is logged and skipped. Write errors
/// are returned to the caller.
pub async fn send<W, T>(writer: &mut W, envelope: &Envelope<'_, T>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    match envelope.encode() {
        Ok(bytes) => {
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        Err(e) => {
            warn!(error = %e, "Could not encode response envelope");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tokio_test::io::Builder;

    #[test]
    fn test_encode_success() {
        let envelope = Envelope::success("received", "hello");
        assert_eq!(
            envelope.encode().unwrap(),
            b"{\"message\":\"received\",\"code\":1,\"data\":\"hello\"}\n"
        );
    }

    #[test]
    fn test_encode_failure_has_null_data() {
        let envelope: Envelope<'_, String> =
            Envelope::failure("failed to parse http query.", CODE_PARSE_FAILURE);
        assert_eq!(
            envelope.encode().unwrap(),
            b"{\"message\":\"failed to parse http query.\",\"code\":400,\"data\":null}\n"
        );
    }

    #[test]
    fn test_encode_escapes_payload() {
        let envelope = Envelope::success("received", "say \"hi\"\\");
        assert_eq!(
            envelope.encode().unwrap(),
            b"{\"message\":\"received\",\"code\":1,\"data\":\"say \\\"hi\\\"\\\\\"}\n"
        );
    }

    #[tokio::test]
    async fn test_send_writes_line() {
        let mut mock = Builder::new()
            .write(b"{\"message\":\"received\",\"code\":1,\"data\":\"x\"}\n")
            .build();
        send(&mut mock, &Envelope::success("received", "x"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_drops_unencodable_envelope() {
        // JSON object keys must be strings.
        let mut data = BTreeMap::new();
        data.insert((1, 2), 3);
        let envelope = Envelope::success("received", data);
        assert!(envelope.encode().is_err());

        // No writes are scripted, so any write would fail the mock.
        let mut mock = Builder::new().build();
        send(&mut mock, &envelope).await.unwrap();
    }
}
