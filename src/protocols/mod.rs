//! Protocol implementations.
//!
//! Each protocol owns a connection for its whole lifetime and shares the
//! line reader and the response envelope.
//!
//! - `head`: HTTP/1.1 request head, answered with the parsed structure
//! - `verbatim`: every line echoed back as it arrives

pub mod head;
pub mod verbatim;
