//! `seqmock` is an HTTP server double for tests that checks a client's outgoing requests
//! one by one and answers each of them with a scripted response.
//!
//! A test declares the exchanges it expects as an ordered list of [`RequestHandler`]s. The
//! n-th request that reaches the [`MockServer`] is validated against the n-th handler and
//! answered with that handler's response. Once the list is exhausted, the last handler keeps
//! serving every further request.
//!
//! # Getting Started
//! ```no_run
//! use seqmock::prelude::*;
//!
//! let server = MockServer::start_on(
//!     "http://127.0.0.1:0/",
//!     vec![
//!         RequestHandler::new()
//!             .method("POST")
//!             .path_and_query("/v1/users/u-1/calls")
//!             .header("Content-Type", "application/json")
//!             .body(r#"{"from":"+1000","to":"+2000"}"#)
//!             .send_header("Location", "/v1/users/u-1/calls/c-1")
//!             .status(201),
//!         RequestHandler::new()
//!             .path_and_query("/v1/users/u-1/calls/c-1")
//!             .content(ResponseContent::json(serde_json::json!({ "id": "c-1" }))),
//!     ],
//! )
//! .unwrap();
//!
//! // Point the client under test at `server.base_url()` and exercise it here.
//!
//! server.assert_no_errors();
//! server.assert_request_count(2);
//! ```
//!
//! # Failures
//! Requests are validated on the server thread, where a failed check cannot fail the test
//! itself. Every failure is recorded instead and the client receives an empty `200` response
//! without any of the scripted headers. Inspect failures with [`MockServer::error`] and [`MockServer::errors`], or
//! call [`MockServer::assert_no_errors`] to panic with a readable report.
//!
//! # Shutdown
//! Dropping the server (or calling [`MockServer::dispose`]) stops accepting connections,
//! releases the port and lets requests that are already being handled finish.
//!
//! # Configuration
//! The default prefix is `http://localhost:3001/`. It can be overridden with the
//! `SEQMOCK_PREFIX` environment variable or per server with [`MockServer::start_on`] or
//! [`MockServerBuilder::prefix`]. Use port `0` to let the operating system pick a free port.
//! `SEQMOCK_SHUTDOWN_TIMEOUT_MS` bounds how long disposal waits for open connections.
//!
//! # Debugging
//! `seqmock` logs through `tracing`, which forwards to the `log` crate when no subscriber is
//! installed. With `env_logger`, set `RUST_LOG=seqmock=trace` and call `env_logger::try_init()`.
mod api;
mod common;
mod server;

pub use api::MockServer;
pub use common::data::{ExpectationSet, RequestHandler, ResponseContent};
pub use server::{
    builder::MockServerBuilder,
    handler::{Error as DispatchError, MismatchField},
    server::Error,
};

pub mod prelude {
    #[doc(no_inline)]
    pub use crate::{
        DispatchError, ExpectationSet, MismatchField, MockServer, MockServerBuilder,
        RequestHandler, ResponseContent,
    };
}
