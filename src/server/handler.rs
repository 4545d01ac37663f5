use std::{fmt, sync::Arc};

use bytes::Bytes;
use http::{
    header::CONTENT_TYPE, request::Parts, HeaderMap, HeaderName, HeaderValue, Request, Response,
    StatusCode,
};
use http_body_util::{BodyExt, Full};
use thiserror::Error;

use crate::common::data::RequestHandler;
use crate::server::{
    handler::Error::{
        BodyReadError, InvalidHeader, InvalidStatusCode, ListenerStopped, Mismatch, NoExpectations,
    },
    state::ServerState,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failure captured while the server was handling a request.
#[derive(Error, Debug)]
pub enum Error {
    #[error("request[{index}]: {field} mismatch: expected {expected:?}, received {}", format_actual(.actual))]
    Mismatch {
        index: usize,
        field: MismatchField,
        expected: String,
        actual: Option<String>,
    },
    #[error("no expectations configured")]
    NoExpectations,
    #[error("cannot read request body: {0}")]
    BodyReadError(BoxError),
    #[error("invalid status code: {0}")]
    InvalidStatusCode(u16),
    #[error("invalid response header: {0}")]
    InvalidHeader(String),
    #[error("listener is no longer active")]
    ListenerStopped,
    #[error("connection error: {0}")]
    Connection(BoxError),
}

fn format_actual(actual: &Option<String>) -> String {
    match actual {
        Some(value) => format!("{:?}", value),
        None => "<absent>".to_string(),
    }
}

/// The request aspect a [`Error::Mismatch`] refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchField {
    Method,
    PathAndQuery,
    Body,
    Header(String),
}

impl fmt::Display for MismatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchField::Method => write!(f, "method"),
            MismatchField::PathAndQuery => write!(f, "path and query"),
            MismatchField::Body => write!(f, "body"),
            MismatchField::Header(name) => write!(f, "header '{}'", name),
        }
    }
}

/// Handles one request: resolves its expectation, validates it and builds the scripted
/// response. Failures are recorded on `state` and answered with an empty `200` response
/// without any scripted headers, so the client never waits for a response that will not come.
pub(crate) async fn dispatch<B>(
    state: Arc<ServerState>,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Error>
where
    B: hyper::body::Body,
    B::Error: Into<BoxError>,
{
    if !state.is_active() {
        tracing::trace!("abandoning request {} received during shutdown", req.uri());
        return Err(ListenerStopped);
    }

    if !state.in_prefix(req.uri().path()) {
        tracing::trace!("request path {} is outside of the prefix", req.uri().path());
        return Ok(plain_response(StatusCode::NOT_FOUND, Bytes::new()));
    }

    let index = state.claim_index();

    let response = match serve(&state, index, req).await {
        Ok(response) => response,
        Err(err) => {
            state.record(err);
            Response::new(Full::new(Bytes::new()))
        }
    };

    state.complete();

    Ok(response)
}

async fn serve<B>(
    state: &ServerState,
    index: usize,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Error>
where
    B: hyper::body::Body,
    B::Error: Into<BoxError>,
{
    let handler = state.expectations.resolve(index).ok_or(NoExpectations)?;

    tracing::debug!(
        "request[{}] {} {} matched against expectation {}",
        index,
        req.method(),
        req.uri(),
        index.min(state.expectations.len() - 1)
    );

    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|err| BodyReadError(err.into()))?
        .to_bytes();

    validate(index, handler, &parts, &body)?;
    build_response(handler)
}

fn validate(
    index: usize,
    handler: &RequestHandler,
    parts: &Parts,
    body: &Bytes,
) -> Result<(), Error> {
    if let Some(method) = &handler.expected_method {
        assert_equals(index, MismatchField::Method, method, Some(parts.method.as_str()))?;
    }

    if let Some(path_and_query) = &handler.expected_path_and_query {
        let actual = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        assert_equals(index, MismatchField::PathAndQuery, path_and_query, Some(actual))?;
    }

    if let Some(expected_body) = &handler.expected_body {
        let actual = String::from_utf8_lossy(body);
        assert_equals(index, MismatchField::Body, expected_body, Some(actual.as_ref()))?;
    }

    if let Some(headers) = &handler.expected_headers {
        for (name, value) in headers {
            let actual = header_value(&parts.headers, name);
            assert_equals(
                index,
                MismatchField::Header(name.clone()),
                value,
                actual.as_deref(),
            )?;
        }
    }

    Ok(())
}

fn assert_equals(
    index: usize,
    field: MismatchField,
    expected: &str,
    actual: Option<&str>,
) -> Result<(), Error> {
    if actual == Some(expected) {
        return Ok(());
    }

    Err(Mismatch {
        index,
        field,
        expected: expected.to_string(),
        actual: actual.map(str::to_string),
    })
}

/// All values of a header joined by `,`, or `None` if the request does not carry it.
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
    let values: Vec<String> = headers
        .get_all(&name)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).to_string())
        .collect();

    if values.is_empty() {
        return None;
    }

    Some(values.join(","))
}

fn build_response(handler: &RequestHandler) -> Result<Response<Full<Bytes>>, Error> {
    let status = StatusCode::from_u16(handler.status_code_to_send)
        .map_err(|_| InvalidStatusCode(handler.status_code_to_send))?;

    let mut headers = HeaderMap::new();
    if let Some(to_send) = &handler.headers_to_send {
        for (name, value) in to_send {
            let (name, value) = to_header(name, value)?;
            headers.append(name, value);
        }
    }

    let mut body = Bytes::new();
    if let Some(content) = &handler.content_to_send {
        // Content headers replace scripted ones with the same name.
        for (name, value) in &content.headers {
            let (name, value) = to_header(name, value)?;
            headers.insert(name, value);
        }
        body = content.body.clone();
    }

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

fn to_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), Error> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| InvalidHeader(format!("{}: {}", name, value)))?;
    let header_value =
        HeaderValue::from_str(value).map_err(|_| InvalidHeader(format!("{}: {}", name, value)))?;
    Ok((header_name, header_value))
}

fn plain_response<B: Into<Bytes>>(status: StatusCode, body: B) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
