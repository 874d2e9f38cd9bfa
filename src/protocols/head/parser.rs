//! HTTP request head parser.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// The only protocol version accepted on the request line.
pub const SUPPORTED_VERSION: &str = "HTTP/1.1";

/// Parsed request head.
///
/// Field names and order match the JSON the server sends back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HttpRequest {
    pub path: String,
    pub method: String,
    pub version: String,
    pub headers: BTreeMap<String, String>,
}

/// Reasons a request head is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty request")]
    EmptyRequest,
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),
    #[error("unsupported HTTP version: {0:?}")]
    UnsupportedVersion(String),
}

/// Parse a framed request: the request line followed by header lines.
///
/// Header lines without a `": "` separator are skipped. Repeated header
/// names keep the last value.
pub fn parse<S: AsRef<str>>(lines: &[S]) -> Result<HttpRequest, ParseError> {
    let (head, header_lines) = lines.split_first().ok_or(ParseError::EmptyRequest)?;
    let head: &str = head.as_ref();

    let mut parts = head.split(' ');
    let (method, path, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(path), Some(version), None)
            if !method.is_empty() && !path.is_empty() =>
        {
            (method, path, version)
        }
        _ => return Err(ParseError::MalformedRequestLine(head.to_string())),
    };

    if version != SUPPORTED_VERSION {
        return Err(ParseError::UnsupportedVersion(version.to_string()));
    }

    let mut headers = BTreeMap::new();
    for line in header_lines {
        let line: &str = line.as_ref();
        match line.split_once(": ") {
            Some((key, value)) => {
                headers.insert(key.to_string(), value.to_string());
            }
            None => debug!(line, "Skipping header line without separator"),
        }
    }

    Ok(HttpRequest {
        path: path.to_string(),
        method: method.to_string(),
        version: version.to_string(),
        headers,
    })
}
