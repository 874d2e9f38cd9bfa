//! Head protocol implementation.
//!
//! The client sends an HTTP/1.1 style request head and the server echoes
//! the parsed structure back inside a JSON envelope.
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  GET /foo HTTP/1.1\n
//!           Accept: text/plain\n
//!           \n
//! Response: {"message":"Hello, world.","code":1,"data":{"Path":"/foo","Method":"GET","Version":"HTTP/1.1","Headers":{"Accept":"text/plain"}}}\n
//!
//! Request:  GET /foo HTTP/2\n
//!           \n
//! Response: {"message":"failed to parse http query.","code":400,"data":null}\n
//! ```
//!
//! Header lines are split on the first `": "`; lines without it are ignored.
//! One request is served per connection. Bodies are not read.

pub mod handler;
pub mod parser;

pub use handler::handle_connection;
