use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use hyper::service::service_fn;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::{conn::auto::Builder as ServerBuilder, graceful::GracefulShutdown},
};
use thiserror::Error;
use tokio::{net::TcpListener, sync::oneshot::Sender, task::spawn};

use crate::server::{
    builder::MockServerConfig,
    handler::{self, dispatch},
    server::Error::{LocalSocketAddrError, SocketBindError},
    state::ServerState,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that prevent a mock server from starting.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid prefix: {0}")]
    InvalidPrefix(#[from] url::ParseError),
    #[error("unsupported scheme {0}: only http prefixes can be served")]
    UnsupportedScheme(String),
    #[error("cannot resolve a socket address for prefix {0}")]
    AddressResolveError(String),
    #[error("cannot bind to socket addr {0}: {1}")]
    SocketBindError(SocketAddr, std::io::Error),
    #[error("cannot obtain local address: {0}")]
    LocalSocketAddrError(std::io::Error),
    #[error("cannot start server runtime: {0}")]
    RuntimeError(std::io::Error),
    #[error("server thread stopped before it started listening")]
    StartupError,
}

/// Binds the listener, reports the bound address (or the bind failure) through
/// `addr_sender` and then serves until `shutdown` resolves.
pub(crate) async fn start_server<F>(
    config: MockServerConfig,
    state: Arc<ServerState>,
    addr_sender: Sender<Result<SocketAddr, Error>>,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let listener = match TcpListener::bind(config.addr).await {
        Ok(listener) => listener,
        Err(err) => {
            let _ = addr_sender.send(Err(SocketBindError(config.addr, err)));
            return;
        }
    };

    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => {
            let _ = addr_sender.send(Err(LocalSocketAddrError(err)));
            return;
        }
    };

    if addr_sender.send(Ok(addr)).is_err() {
        tracing::trace!("nobody is waiting for the server on {} anymore", addr);
        return;
    }

    tracing::debug!("Listening on {}", addr);
    run_accept_loop(listener, state, config.shutdown_timeout, shutdown).await
}

/// Accepts connections until `shutdown` resolves. Every connection is served on its own
/// task so the next accept is armed right away. On shutdown the listener is closed first and
/// open connections get `shutdown_timeout` to finish.
pub(crate) async fn run_accept_loop<F>(
    listener: TcpListener,
    state: Arc<ServerState>,
    shutdown_timeout: Duration,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let server_builder = ServerBuilder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((tcp_stream, remote_address)) => {
                        tracing::trace!("new TCP connection from {}", remote_address);

                        let service_state = state.clone();
                        let connection = server_builder
                            .serve_connection(
                                TokioIo::new(tcp_stream),
                                service_fn(move |req| dispatch(service_state.clone(), req)),
                            )
                            .into_owned();
                        let connection = graceful.watch(connection);

                        let state = state.clone();
                        spawn(async move {
                            if let Err(err) = connection.await {
                                record_connection_error(&state, err);
                            }
                        });
                    },
                    Err(err) => {
                        tracing::trace!("dropping failed accept: {:?}", err);
                    },
                }
            }
            _ = &mut shutdown => {
                break;
            }
        }
    }

    let addr = listener.local_addr().ok();
    drop(listener);
    tracing::debug!("listener on {:?} closed, draining open connections", addr);

    tokio::select! {
        _ = graceful.shutdown() => {
            tracing::debug!("all connections closed");
        },
        _ = tokio::time::sleep(shutdown_timeout) => {
            tracing::warn!("open connections did not finish within {:?}", shutdown_timeout);
        }
    }
}

fn record_connection_error(state: &ServerState, err: BoxError) {
    if !state.is_active() {
        tracing::trace!("connection failed during shutdown: {}", err);
        return;
    }

    if is_client_hangup(err.as_ref()) {
        tracing::trace!("client closed the connection early: {}", err);
        return;
    }

    state.record(handler::Error::Connection(err));
}

fn is_client_hangup(err: &(dyn std::error::Error + 'static)) -> bool {
    if let Some(err) = err.downcast_ref::<hyper::Error>() {
        return err.is_incomplete_message();
    }

    if let Some(err) = err.downcast_ref::<std::io::Error>() {
        return err.kind() == std::io::ErrorKind::UnexpectedEof;
    }

    false
}
