use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs},
    time::Duration,
};

use url::Url;

use crate::{
    api::MockServer,
    common::{data::ExpectationSet, util::env_var},
    server::server::Error::{self, AddressResolveError, UnsupportedScheme},
};

pub(crate) const DEFAULT_PREFIX: &str = "http://localhost:3001/";
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolved settings a mock server is started with.
#[derive(Debug, Clone)]
pub(crate) struct MockServerConfig {
    pub addr: SocketAddr,
    pub prefix_path: String,
    pub shutdown_timeout: Duration,
}

/// Configures and starts a [`MockServer`].
///
/// Unset values fall back to the `SEQMOCK_PREFIX` and `SEQMOCK_SHUTDOWN_TIMEOUT_MS`
/// environment variables and then to `http://localhost:3001/` and five seconds.
#[derive(Debug, Clone, Default)]
pub struct MockServerBuilder {
    prefix: Option<String>,
    shutdown_timeout: Option<Duration>,
}

impl MockServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the URL prefix to listen on, e.g. `http://127.0.0.1:0/` for a free port or
    /// `http://localhost:3001/api/` to only dispatch requests below `/api/`.
    pub fn prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn prefix_option(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    /// How long disposal waits for open connections to finish before dropping them.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    pub(crate) fn build_config(&self) -> Result<MockServerConfig, Error> {
        let prefix = self
            .prefix
            .clone()
            .or_else(|| env_var::<String>("SEQMOCK_PREFIX"))
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        let shutdown_timeout = self
            .shutdown_timeout
            .or_else(|| env_var::<u64>("SEQMOCK_SHUTDOWN_TIMEOUT_MS").map(Duration::from_millis))
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        let (addr, prefix_path) = parse_prefix(&prefix)?;

        Ok(MockServerConfig {
            addr,
            prefix_path,
            shutdown_timeout,
        })
    }

    /// Starts the server and blocks until it is listening.
    pub fn start<E: Into<ExpectationSet>>(self, handlers: E) -> Result<MockServer, Error> {
        MockServer::start_with_config(self.build_config()?, handlers.into())
    }

    /// Starts the server and waits asynchronously until it is listening.
    pub async fn start_async<E: Into<ExpectationSet>>(
        self,
        handlers: E,
    ) -> Result<MockServer, Error> {
        MockServer::start_with_config_async(self.build_config()?, handlers.into()).await
    }
}

/// Splits a prefix such as `http://localhost:3001/api/` into the socket address to bind and
/// the path prefix (always ending with `/`).
fn parse_prefix(prefix: &str) -> Result<(SocketAddr, String), Error> {
    let url = Url::parse(prefix)?;

    if url.scheme() != "http" {
        return Err(UnsupportedScheme(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .ok_or_else(|| AddressResolveError(prefix.to_string()))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| AddressResolveError(prefix.to_string()))?;

    let addr = match host {
        "+" | "*" => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        _ => resolve(host, port).ok_or_else(|| AddressResolveError(prefix.to_string()))?,
    };

    let mut path = url.path().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }

    Ok((addr, path))
}

fn resolve(host: &str, port: u16) -> Option<SocketAddr> {
    // IPv6 literals keep their brackets in the URL host.
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs().ok()?.collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}
