//! # Server Module
//!
//! The request/response abstraction the dispatcher consumes. Socket
//! listening, TLS and HTTP parsing belong to the transport; this module only
//! describes what the core needs from it:
//!
//! - [`Request`]: method, URI, headers and a byte-stream [`Body`]
//! - [`Response`]: a sink with status, header and terminal body writes, and a
//!   `finished` flag the dispatcher consults to stop a handler chain

mod request;
mod response;

pub use request::{
    content_length, media_type, normalize_media_type, parse_query_params, Body, Request,
};
pub use response::{Response, ResponseState};
