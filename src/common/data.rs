use bytes::Bytes;
use serde::{Deserialize, Serialize};

const DEFAULT_METHOD: &str = "GET";
const DEFAULT_STATUS_CODE: u16 = 200;

fn default_method() -> Option<String> {
    Some(DEFAULT_METHOD.to_string())
}

fn default_status_code() -> u16 {
    DEFAULT_STATUS_CODE
}

/// One scripted exchange: what the n-th request is expected to look like and what the
/// server answers with.
///
/// Every `expected_*` field is optional. An unset field is not checked, with one exception:
/// the expected method starts out as `GET`. Use [`RequestHandler::any_method`] to accept any
/// method.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RequestHandler {
    pub expected_method: Option<String>,
    pub expected_path_and_query: Option<String>,
    pub expected_body: Option<String>,
    pub expected_headers: Option<Vec<(String, String)>>,
    pub headers_to_send: Option<Vec<(String, String)>>,
    pub content_to_send: Option<ResponseContent>,
    pub status_code_to_send: u16,
}

impl RequestHandler {
    pub fn new() -> Self {
        Self {
            expected_method: default_method(),
            expected_path_and_query: None,
            expected_body: None,
            expected_headers: None,
            headers_to_send: None,
            content_to_send: None,
            status_code_to_send: default_status_code(),
        }
    }

    /// Expects the request to use the given HTTP method (compared case-sensitively, as sent
    /// on the wire).
    pub fn method<S: Into<String>>(mut self, method: S) -> Self {
        self.expected_method = Some(method.into());
        self
    }

    /// Disables the method check.
    pub fn any_method(mut self) -> Self {
        self.expected_method = None;
        self
    }

    /// Expects the request target to be exactly this path plus query string,
    /// e.g. `/v1/users/u-1/calls?page=2`.
    pub fn path_and_query<S: Into<String>>(mut self, path_and_query: S) -> Self {
        self.expected_path_and_query = Some(path_and_query.into());
        self
    }

    /// Expects the request body, decoded as UTF-8 text, to equal `body`.
    pub fn body<S: Into<String>>(mut self, body: S) -> Self {
        self.expected_body = Some(body.into());
        self
    }

    /// Expects a request header. Can be called multiple times.
    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.expected_headers
            .get_or_insert_with(Vec::new)
            .push((name.into(), value.into()));
        self
    }

    /// Adds a header to the scripted response. Can be called multiple times.
    pub fn send_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers_to_send
            .get_or_insert_with(Vec::new)
            .push((name.into(), value.into()));
        self
    }

    /// Sets the response payload. Its own headers are merged into the response.
    pub fn content(mut self, content: ResponseContent) -> Self {
        self.content_to_send = Some(content);
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status_code_to_send = status;
        self
    }
}

impl Default for RequestHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// A response payload together with the headers that describe it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ResponseContent {
    pub headers: Vec<(String, String)>,
    #[serde(with = "body_text")]
    pub body: Bytes,
}

impl ResponseContent {
    pub fn new<B: Into<Bytes>>(body: B) -> Self {
        Self {
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn text<S: Into<String>>(body: S) -> Self {
        Self::new(body.into()).with_content_type("text/plain; charset=utf-8")
    }

    pub fn xml<S: Into<String>>(body: S) -> Self {
        Self::new(body.into()).with_content_type("application/xml; charset=utf-8")
    }

    pub fn json(body: serde_json::Value) -> Self {
        Self::new(body.to_string()).with_content_type("application/json; charset=utf-8")
    }

    pub fn with_content_type<S: Into<String>>(self, content_type: S) -> Self {
        self.header("content-type", content_type)
    }

    /// Sets a content header, replacing any previous value with the same
    /// (case-insensitive) name.
    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }
}

/// The ordered, immutable list of scripted exchanges a server plays back.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct ExpectationSet {
    handlers: Vec<RequestHandler>,
}

impl ExpectationSet {
    pub fn new(handlers: Vec<RequestHandler>) -> Self {
        Self { handlers }
    }

    /// Loads a JSON array of handlers. Omitted fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Picks the handler for the request with the given 0-based index. Indexes past the end
    /// resolve to the last handler. Returns `None` only if the set is empty.
    pub fn resolve(&self, index: usize) -> Option<&RequestHandler> {
        self.handlers
            .get(index)
            .or_else(|| self.handlers.last())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RequestHandler> {
        self.handlers.iter()
    }
}

impl From<RequestHandler> for ExpectationSet {
    fn from(handler: RequestHandler) -> Self {
        Self::new(vec![handler])
    }
}

impl From<Vec<RequestHandler>> for ExpectationSet {
    fn from(handlers: Vec<RequestHandler>) -> Self {
        Self::new(handlers)
    }
}

impl<const N: usize> From<[RequestHandler; N]> for ExpectationSet {
    fn from(handlers: [RequestHandler; N]) -> Self {
        Self::new(handlers.into())
    }
}

impl FromIterator<RequestHandler> for ExpectationSet {
    fn from_iter<T: IntoIterator<Item = RequestHandler>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// Scripts are written by hand, so bodies travel as plain strings rather than byte arrays.
mod body_text {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&String::from_utf8_lossy(body))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Ok(Bytes::from(text))
    }
}
