//! Error types and handling for the Dotide Rust SDK.
//!
//! Every fallible operation returns [`Result`]. HTTP failures carry a
//! structured [`HttpError`] whose kind is derived from the response status by
//! [`HttpErrorKind::classify`].

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Dotide SDK
#[derive(Debug)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Additional context about the error
    pub context: Option<String>,
    /// The underlying source error, if any
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Different kinds of errors that can occur
#[derive(Error, Debug)]
pub enum ErrorKind {
    /// Missing or invalid configuration, raised before any request is sent
    #[error("Configuration error: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },

    /// Network-level failures: DNS, refused connections, timeouts
    #[error("Transport error: {message}")]
    Transport {
        /// Transport error message
        message: String,
    },

    /// The server answered with a 4xx or 5xx status
    #[error("{0}")]
    Http(HttpError),

    /// Malformed input handed to the SDK
    #[error("Invalid argument: {message}")]
    Argument {
        /// Argument error message
        message: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Serialization error message
        message: String,
    },

    /// Internal SDK errors
    #[error("Internal error: {message}")]
    Internal {
        /// Internal error message
        message: String,
    },
}

impl Error {
    /// Create a new error with the given kind
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
        }
    }

    /// Create a new error with context
    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Create a new error with a source error
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Configuration {
            message: message.into(),
        })
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Transport {
            message: message.into(),
        })
    }

    /// Create an argument error
    pub fn argument<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Argument {
            message: message.into(),
        })
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Serialization {
            message: message.into(),
        })
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Internal {
            message: message.into(),
        })
    }

    /// The HTTP error details, if the server rejected the request
    pub fn http(&self) -> Option<&HttpError> {
        match &self.kind {
            ErrorKind::Http(err) => Some(err),
            _ => None,
        }
    }

    /// HTTP status code, if the server rejected the request
    pub fn status(&self) -> Option<u16> {
        self.http().map(HttpError::status)
    }

    /// Whether this is a 4xx response
    pub fn is_client_error(&self) -> bool {
        self.http().map_or(false, |e| e.kind().is_client_error())
    }

    /// Whether this is a 5xx response
    pub fn is_server_error(&self) -> bool {
        self.http().map_or(false, |e| e.kind().is_server_error())
    }

    /// Whether the server answered 404
    pub fn is_not_found(&self) -> bool {
        self.http()
            .map_or(false, |e| e.kind() == HttpErrorKind::NotFound)
    }

    /// Whether this error was raised before any request was sent
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, ErrorKind::Configuration { .. })
    }

    /// Whether the request never got an HTTP answer
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport { .. })
    }
}

impl From<HttpError> for Error {
    fn from(err: HttpError) -> Self {
        Self::new(ErrorKind::Http(err))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{}: {}", context, self.kind)?;
        } else {
            write!(f, "{}", self.kind)?;
        }

        if let Some(source) = &self.source {
            write!(f, " (caused by: {})", source)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// Conversion from common error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::configuration(format!("Invalid request: {}", err)).with_source(err)
        } else if err.is_timeout() {
            Self::transport("request timed out").with_source(err)
        } else if err.is_connect() {
            Self::transport("connection failed").with_source(err)
        } else {
            Self::transport(err.to_string()).with_source(err)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string()).with_source(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::configuration(format!("Invalid URL: {}", err)).with_source(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err.to_string()).with_source(err)
    }
}

/// HTTP error categories keyed by response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpErrorKind {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 406
    NotAcceptable,
    /// 409
    Conflict,
    /// 415
    UnsupportedMediaType,
    /// 422
    UnprocessableEntity,
    /// Any other 4xx status
    ClientError,
    /// 500
    InternalServerError,
    /// 501
    NotImplemented,
    /// 502
    BadGateway,
    /// 503
    ServiceUnavailable,
    /// Any other 5xx status
    ServerError,
}

impl HttpErrorKind {
    /// Map a status code to an error kind. Statuses below 400 (and above 599)
    /// are not errors.
    pub fn classify(status: u16) -> Option<Self> {
        let kind = match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            406 => Self::NotAcceptable,
            409 => Self::Conflict,
            415 => Self::UnsupportedMediaType,
            422 => Self::UnprocessableEntity,
            400..=499 => Self::ClientError,
            500 => Self::InternalServerError,
            501 => Self::NotImplemented,
            502 => Self::BadGateway,
            503 => Self::ServiceUnavailable,
            500..=599 => Self::ServerError,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether this kind belongs to the 4xx family
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::BadRequest
                | Self::Unauthorized
                | Self::Forbidden
                | Self::NotFound
                | Self::NotAcceptable
                | Self::Conflict
                | Self::UnsupportedMediaType
                | Self::UnprocessableEntity
                | Self::ClientError
        )
    }

    /// Whether this kind belongs to the 5xx family
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}

impl fmt::Display for HttpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::NotAcceptable => "not acceptable",
            Self::Conflict => "conflict",
            Self::UnsupportedMediaType => "unsupported media type",
            Self::UnprocessableEntity => "unprocessable entity",
            Self::ClientError => "client error",
            Self::InternalServerError => "internal server error",
            Self::NotImplemented => "not implemented",
            Self::BadGateway => "bad gateway",
            Self::ServiceUnavailable => "service unavailable",
            Self::ServerError => "server error",
        };
        f.write_str(name)
    }
}

/// Decoded error response body
#[derive(Debug, Clone, PartialEq)]
enum ErrorBody {
    Empty,
    Json(Value),
    Text(String),
}

impl ErrorBody {
    fn decode(body: &str, headers: &HeaderMap) -> Self {
        if body.trim().is_empty() {
            return Self::Empty;
        }

        let declared_json = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"));

        match declared_json {
            Some(false) => Self::Text(body.to_string()),
            _ => serde_json::from_str(body)
                .map(Self::Json)
                .unwrap_or_else(|_| Self::Text(body.to_string())),
        }
    }

    fn object(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Json(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// A non-success HTTP response
#[derive(Debug, Clone)]
pub struct HttpError {
    kind: HttpErrorKind,
    method: String,
    url: String,
    status: u16,
    headers: HeaderMap,
    body: String,
    data: ErrorBody,
}

impl HttpError {
    /// Build an error from a finished exchange. Returns `None` for statuses
    /// that are not errors.
    pub fn from_response(
        method: &str,
        url: &str,
        status: u16,
        headers: HeaderMap,
        body: impl Into<String>,
    ) -> Option<Self> {
        let kind = HttpErrorKind::classify(status)?;
        let body = body.into();
        let data = ErrorBody::decode(&body, &headers);
        Some(Self {
            kind,
            method: method.to_uppercase(),
            url: url.to_string(),
            status,
            headers,
            body,
            data,
        })
    }

    /// Error category
    pub fn kind(&self) -> HttpErrorKind {
        self.kind
    }

    /// Request method, upper-cased
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Full request URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Response status
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Decoded JSON body, if the body was JSON
    pub fn data(&self) -> Option<&Value> {
        match &self.data {
            ErrorBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The `message` field, or the whole body when it is opaque text
    pub fn message(&self) -> Option<String> {
        match &self.data {
            ErrorBody::Json(Value::Object(map)) => map.get("message").and_then(display_value),
            ErrorBody::Json(Value::String(s)) | ErrorBody::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// The `error` field of a JSON body
    pub fn error_field(&self) -> Option<String> {
        self.data
            .object()
            .and_then(|map| map.get("error"))
            .and_then(display_value)
    }

    /// Validation entries from the `errors` field
    pub fn errors(&self) -> Vec<&Map<String, Value>> {
        self.data
            .object()
            .and_then(|map| map.get("errors"))
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(Value::as_object).collect())
            .unwrap_or_default()
    }

    /// The `documentation_url` field of a JSON body
    pub fn documentation_url(&self) -> Option<String> {
        self.data
            .object()
            .and_then(|map| map.get("documentation_url"))
            .and_then(display_value)
    }

    fn error_summary(&self) -> Option<String> {
        let entries = self.errors();
        if entries.is_empty() {
            return None;
        }

        let lines: Vec<String> = entries
            .iter()
            .flat_map(|entry| {
                entry
                    .iter()
                    .map(|(k, v)| format!("  {}: {}", k, display_value(v).unwrap_or_default()))
            })
            .collect();
        Some(format!("\nError summary:\n{}", lines.join("\n")))
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {} - ", self.method, self.url, self.status)?;
        if let Some(message) = self.message() {
            f.write_str(&message)?;
        }
        if let Some(error) = self.error_field() {
            write!(f, "Error: {}", error)?;
        }
        if let Some(summary) = self.error_summary() {
            f.write_str(&summary)?;
        }
        if let Some(url) = self.documentation_url() {
            write!(f, " // See: {}", url)?;
        }
        Ok(())
    }
}

impl std::error::Error for HttpError {}

/// Render a JSON value the way it reads in a message: strings unquoted,
/// null as absent.
fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn http_error(status: u16, body: Value) -> HttpError {
        HttpError::from_response(
            "get",
            "http://api.example.com/boom",
            status,
            json_headers(),
            body.to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_classify_known_statuses() {
        assert_eq!(HttpErrorKind::classify(400), Some(HttpErrorKind::BadRequest));
        assert_eq!(HttpErrorKind::classify(404), Some(HttpErrorKind::NotFound));
        assert_eq!(HttpErrorKind::classify(415), Some(HttpErrorKind::UnsupportedMediaType));
        assert_eq!(HttpErrorKind::classify(422), Some(HttpErrorKind::UnprocessableEntity));
        assert_eq!(HttpErrorKind::classify(500), Some(HttpErrorKind::InternalServerError));
        assert_eq!(HttpErrorKind::classify(503), Some(HttpErrorKind::ServiceUnavailable));
    }

    #[test]
    fn test_classify_unmapped_statuses() {
        assert_eq!(HttpErrorKind::classify(418), Some(HttpErrorKind::ClientError));
        assert_eq!(HttpErrorKind::classify(509), Some(HttpErrorKind::ServerError));
        assert_eq!(HttpErrorKind::classify(200), None);
        assert_eq!(HttpErrorKind::classify(304), None);
        assert!(HttpErrorKind::ClientError.is_client_error());
        assert!(HttpErrorKind::BadGateway.is_server_error());
    }

    #[test]
    fn test_message_from_message_field() {
        let err = http_error(422, json!({"message": "No stream found"}));
        assert_eq!(
            err.to_string(),
            "GET http://api.example.com/boom: 422 - No stream found"
        );
    }

    #[test]
    fn test_message_from_error_field() {
        let err = http_error(422, json!({"error": "No stream found"}));
        assert_eq!(
            err.to_string(),
            "GET http://api.example.com/boom: 422 - Error: No stream found"
        );
    }

    #[test]
    fn test_error_summary() {
        let err = http_error(
            422,
            json!({"message": "x", "errors": [{"resource": "Database", "field": "name"}]}),
        );
        assert_eq!(err.errors()[0]["resource"], "Database");
        let message = err.to_string();
        assert!(message.starts_with("GET http://api.example.com/boom: 422 - x\nError summary:\n"));
        assert!(message.contains("  resource: Database"));
        assert!(message.contains("  field: name"));
    }

    #[test]
    fn test_documentation_url() {
        let err = http_error(
            415,
            json!({"message": "Unsupported Media Type", "documentation_url": "http://developer.dotide.com/docs"}),
        );
        assert_eq!(err.kind(), HttpErrorKind::UnsupportedMediaType);
        assert_eq!(
            err.documentation_url().as_deref(),
            Some("http://developer.dotide.com/docs")
        );
        assert!(err
            .to_string()
            .ends_with("415 - Unsupported Media Type // See: http://developer.dotide.com/docs"));
    }

    #[test]
    fn test_opaque_and_empty_bodies() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let text = HttpError::from_response("post", "http://h/x", 500, headers, "upstream down").unwrap();
        assert_eq!(text.message().as_deref(), Some("upstream down"));
        assert!(text.errors().is_empty());
        assert_eq!(text.to_string(), "POST http://h/x: 500 - upstream down");

        let empty = HttpError::from_response("delete", "http://h/x", 404, HeaderMap::new(), "").unwrap();
        assert_eq!(empty.message(), None);
        assert_eq!(empty.to_string(), "DELETE http://h/x: 404 - ");
    }

    #[test]
    fn test_success_status_is_not_an_error() {
        assert!(HttpError::from_response("get", "http://h/", 201, HeaderMap::new(), "").is_none());
    }

    #[test]
    fn test_error_predicates() {
        let err: Error = http_error(404, json!({})).into();
        assert!(err.is_not_found());
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert_eq!(err.status(), Some(404));

        let config = Error::configuration("database is not selected");
        assert!(config.is_configuration());
        assert_eq!(config.status(), None);
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::internal("Something went wrong").with_context("During operation X");
        assert!(err.to_string().contains("During operation X"));
    }
}
