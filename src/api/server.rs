use std::{
    net::SocketAddr,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tokio::sync::oneshot;

use crate::{
    api::output,
    common::{data::ExpectationSet, runtime, util::BlockOn},
    server::{
        builder::{MockServerBuilder, MockServerConfig},
        handler,
        server::{start_server, Error},
        state::ServerState,
    },
};

type AddressReceiver = oneshot::Receiver<Result<SocketAddr, Error>>;

/// An HTTP server that plays back a fixed sequence of expected exchanges.
///
/// The n-th request the server receives is validated against the n-th [`RequestHandler`] and
/// answered with its scripted response. Requests beyond the configured sequence are handled
/// by the last handler. Validation failures do not fail the calling test directly because they
/// happen on the server thread; they are collected and can be inspected with
/// [`MockServer::error`], [`MockServer::errors`] or [`MockServer::assert_no_errors`].
///
/// The server starts listening when it is created and stops when it is disposed or dropped.
///
/// **Example**:
/// ```no_run
/// use seqmock::prelude::*;
///
/// let server = MockServer::start_on(
///     "http://127.0.0.1:0/",
///     RequestHandler::new()
///         .path_and_query("/v1/calls")
///         .send_header("X-Test", "1")
///         .content(ResponseContent::text("hello"))
///         .status(201),
/// )
/// .unwrap();
///
/// // ... let the code under test call server.url("/v1/calls") ...
///
/// server.assert_no_errors();
/// assert_eq!(server.request_count(), 1);
/// ```
///
/// [`RequestHandler`]: crate::RequestHandler
pub struct MockServer {
    state: Arc<ServerState>,
    address: SocketAddr,
    prefix_path: String,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Starts a server on the default prefix (`SEQMOCK_PREFIX`, or `http://localhost:3001/`).
    ///
    /// `handlers` is a single [`RequestHandler`](crate::RequestHandler) or any sequence of them.
    pub fn start<E: Into<ExpectationSet>>(handlers: E) -> Result<Self, Error> {
        MockServerBuilder::new().start(handlers)
    }

    /// Starts a server listening on the given URL prefix.
    pub fn start_on<S, E>(prefix: S, handlers: E) -> Result<Self, Error>
    where
        S: Into<String>,
        E: Into<ExpectationSet>,
    {
        MockServerBuilder::new().prefix(prefix).start(handlers)
    }

    /// Asynchronous variant of [`MockServer::start`].
    pub async fn start_async<E: Into<ExpectationSet>>(handlers: E) -> Result<Self, Error> {
        MockServerBuilder::new().start_async(handlers).await
    }

    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::new()
    }

    pub(crate) fn start_with_config(
        config: MockServerConfig,
        expectations: ExpectationSet,
    ) -> Result<Self, Error> {
        let (launch, address_receiver) = Launch::spawn(config, expectations)?;
        launch.finish(address_receiver.block_on())
    }

    pub(crate) async fn start_with_config_async(
        config: MockServerConfig,
        expectations: ExpectationSet,
    ) -> Result<Self, Error> {
        let (launch, address_receiver) = Launch::spawn(config, expectations)?;
        launch.finish(address_receiver.await)
    }

    /// Number of requests the server has fully handled so far, successful or not.
    pub fn request_count(&self) -> usize {
        self.state.request_count()
    }

    /// The most recently captured failure, if any.
    pub fn error(&self) -> Option<Arc<handler::Error>> {
        self.state.last_error()
    }

    /// All captured failures in the order they occurred.
    pub fn errors(&self) -> Vec<Arc<handler::Error>> {
        self.state.errors()
    }

    /// Whether the server still accepts requests, i.e. has not been disposed.
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// The socket address the server is bound to.
    pub fn address(&self) -> &SocketAddr {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    /// Builds the URL for a path on this server, e.g. `server.url("/v1/calls")`.
    pub fn url<S: Into<String>>(&self, path: S) -> String {
        format!("http://{}{}", self.address, path.into())
    }

    /// The URL of the prefix the server serves, without a trailing slash.
    pub fn base_url(&self) -> String {
        self.url(self.prefix_path.trim_end_matches('/'))
    }

    /// Panics with a report of every captured failure, if there are any.
    pub fn assert_no_errors(&self) {
        let errors = self.errors();
        if !errors.is_empty() {
            output::fail_with(self.request_count(), &errors);
        }
    }

    /// Panics unless exactly `expected` requests have been handled. Captured failures are
    /// included in the panic message.
    pub fn assert_request_count(&self, expected: usize) {
        let actual = self.request_count();
        if actual != expected {
            let report = output::render_report(actual, &self.errors());
            panic!(
                "expected {} requests but the server handled {}\n{}",
                expected, actual, report
            );
        }
    }

    /// Blocks until at least `expected` requests have been handled or `timeout` elapses.
    /// Returns whether the count was reached.
    pub fn wait_for_request_count(&self, expected: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.request_count() >= expected {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Stops the server: no further requests are dispatched, the listening socket is released
    /// and open connections get the configured shutdown timeout to finish. Calling this more
    /// than once is harmless; it also runs when the server is dropped.
    pub fn dispose(&mut self) {
        if self.state.deactivate() {
            tracing::debug!("disposing mock server on {}", self.address);
        }

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("mock server thread on {} panicked", self.address);
            }
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A server thread that has been spawned but has not reported its address yet.
struct Launch {
    state: Arc<ServerState>,
    prefix_path: String,
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

impl Launch {
    fn spawn(
        config: MockServerConfig,
        expectations: ExpectationSet,
    ) -> Result<(Self, AddressReceiver), Error> {
        let (addr_sender, addr_receiver) = oneshot::channel::<Result<SocketAddr, Error>>();
        let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();

        let prefix_path = config.prefix_path.clone();
        let state = Arc::new(ServerState::new(expectations, config.prefix_path.clone()));
        let server_state = state.clone();

        let thread = thread::Builder::new()
            .name(format!("seqmock-{}", config.addr))
            .spawn(move || {
                let runtime = match runtime::new_current_thread() {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = addr_sender.send(Err(Error::RuntimeError(err)));
                        return;
                    }
                };

                // Resolves on an explicit signal and when the sender is dropped.
                let shutdown = async move {
                    let _ = shutdown_receiver.await;
                };

                runtime.block_on(start_server(config, server_state, addr_sender, shutdown));
            })
            .map_err(Error::RuntimeError)?;

        let launch = Launch {
            state,
            prefix_path,
            shutdown: shutdown_sender,
            thread,
        };

        Ok((launch, addr_receiver))
    }

    fn finish(
        self,
        address: Result<Result<SocketAddr, Error>, oneshot::error::RecvError>,
    ) -> Result<MockServer, Error> {
        let address = match address {
            Ok(Ok(address)) => address,
            Ok(Err(err)) => {
                let _ = self.thread.join();
                return Err(err);
            }
            Err(_) => {
                let _ = self.thread.join();
                return Err(Error::StartupError);
            }
        };

        Ok(MockServer {
            state: self.state,
            address,
            prefix_path: self.prefix_path,
            shutdown: Some(self.shutdown),
            thread: Some(self.thread),
        })
    }
}
