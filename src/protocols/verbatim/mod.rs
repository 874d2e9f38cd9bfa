//! Verbatim protocol implementation.
//!
//! Every line is a complete request and is echoed back at once:
//!
//! ```text
//! Request:  hello\n
//! Response: {"message":"received","code":1,"data":"hello"}\n
//! ```
//!
//! Responses are written in request order before the next line is read.
//! An empty line closes the connection.

pub mod handler;

pub use handler::handle_connection;
