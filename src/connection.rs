//! Dotide connection.
//!
//! A [`Connection`] owns a configuration snapshot, derives the authentication
//! mode from it, and performs JSON requests against the API. It is a cheap
//! handle: clones share configuration, HTTP agent and the last response.

use crate::auth::{self, Authentication};
use crate::collection::{AccessTokens, Collection, Datapoints, Datastreams, DATASTREAMS_PATH};
use crate::config::Config;
use crate::error::{Error, HttpError, Result};
use parking_lot::{Mutex, RwLock};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Client as HttpClient, Method};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// A successful response kept for introspection
#[derive(Debug, Clone)]
pub struct LastResponse {
    /// Request method
    pub method: Method,
    /// Final request URL, including the query string
    pub url: String,
    /// Response status
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Decoded response body
    pub data: Value,
}

/// Per-request options for [`Connection::request`]
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters, a JSON object or `Null`
    pub query: Value,
    /// JSON request body
    pub body: Option<Value>,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    /// Empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query parameters
    pub fn with_query(mut self, query: Value) -> Self {
        self.query = query;
        self
    }

    /// Set the JSON body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a request header
    pub fn with_header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Authenticated access to the Dotide API
///
/// # Example
///
/// ```rust,no_run
/// use dotide_sdk::{Config, Connection};
/// use serde_json::json;
///
/// # async fn example() -> dotide_sdk::Result<()> {
/// let conn = Connection::new(Config::default().with_access_token("token"))?;
/// conn.use_database("sensors");
///
/// let streams = conn.get("/datastreams", &json!({"tags": ["a", "b"]})).await?;
/// println!("{}", streams);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    /// Options as requested by the caller
    options: RwLock<Config>,
    /// Options in effect, with netrc credentials filled in
    config: RwLock<Config>,
    agent: Mutex<Option<HttpClient>>,
    last_response: Mutex<Option<LastResponse>>,
}

impl Connection {
    /// Create a connection from a configuration snapshot
    pub fn new(options: Config) -> Result<Self> {
        Url::parse(&options.api_endpoint())?;

        let config = resolve(&options);
        log::info!("Initialized Dotide connection for {}", config.api_endpoint());
        Ok(Self {
            inner: Arc::new(ConnectionInner {
                options: RwLock::new(options),
                config: RwLock::new(config),
                agent: Mutex::new(None),
                last_response: Mutex::new(None),
            }),
        })
    }

    /// Create a connection from environment-derived defaults
    pub fn from_env() -> Result<Self> {
        Self::new(Config::defaults())
    }

    /// Snapshot of the configuration in effect
    pub fn config(&self) -> Config {
        self.inner.config.read().clone()
    }

    /// Change the configuration of this connection. The HTTP agent is rebuilt
    /// on the next request.
    pub fn configure<F>(&self, f: F)
    where
        F: FnOnce(&mut Config),
    {
        {
            let mut options = self.inner.options.write();
            f(&mut *options);
            *self.inner.config.write() = resolve(&options);
        }
        *self.inner.agent.lock() = None;
    }

    /// Select the database that scopes collection URLs
    pub fn use_database(&self, database: impl Into<String>) {
        let database = database.into();
        self.configure(|c| c.set_database(database));
    }

    /// Selected database
    pub fn database(&self) -> Option<String> {
        self.inner.config.read().database().map(str::to_string)
    }

    /// Whether the options this connection was built from equal `other`.
    /// Credentials loaded from netrc do not count.
    pub fn same_options(&self, other: &Config) -> bool {
        self.inner.options.read().same_options(other)
    }

    /// Active authentication mode
    pub fn authentication(&self) -> Authentication {
        Authentication::from_config(&self.inner.config.read())
    }

    /// Whether client credentials are configured
    pub fn basic_authenticated(&self) -> bool {
        auth::basic_authenticated(&self.inner.config.read())
    }

    /// Whether an access token is configured
    pub fn token_authenticated(&self) -> bool {
        auth::token_authenticated(&self.inner.config.read())
    }

    /// Whether any credentials are configured
    pub fn user_authenticated(&self) -> bool {
        auth::user_authenticated(&self.inner.config.read())
    }

    /// The most recent successful response
    pub fn last_response(&self) -> Option<LastResponse> {
        self.inner.last_response.lock().clone()
    }

    /// Data streams of the selected database
    pub fn datastreams(&self) -> Result<Datastreams> {
        Collection::new(self.clone(), DATASTREAMS_PATH)
    }

    /// Data points of one stream
    pub fn datapoints(&self, stream_id: &str) -> Result<Datapoints> {
        Datapoints::new(self.clone(), stream_id)
    }

    /// Access tokens of the selected database; needs client credentials
    pub fn access_tokens(&self) -> Result<AccessTokens> {
        AccessTokens::new(self.clone())
    }

    /// Fetch the API root
    pub async fn root(&self) -> Result<Value> {
        let endpoint = self.inner.config.read().api_endpoint();
        self.get(&endpoint, &Value::Null).await
    }

    /// Make a GET request
    pub async fn get(&self, path: &str, query: &Value) -> Result<Value> {
        let options = RequestOptions::new().with_query(query.clone());
        self.request(Method::GET, path, options).await
    }

    /// Make a HEAD request
    pub async fn head(&self, path: &str, query: &Value) -> Result<Value> {
        let options = RequestOptions::new().with_query(query.clone());
        self.request(Method::HEAD, path, options).await
    }

    /// Make a POST request
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let options = RequestOptions::new().with_body(body.clone());
        self.request(Method::POST, path, options).await
    }

    /// Make a PUT request
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        let options = RequestOptions::new().with_body(body.clone());
        self.request(Method::PUT, path, options).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str, query: &Value) -> Result<Value> {
        let options = RequestOptions::new().with_query(query.clone());
        self.request(Method::DELETE, path, options).await
    }

    /// Make a request and decode the JSON answer. Statuses 400 through 599
    /// fail with [`crate::ErrorKind::Http`]; any other status is a success.
    pub async fn request(&self, method: Method, path: &str, options: RequestOptions) -> Result<Value> {
        let config = self.config();
        let url = build_url(&config, path)?;
        let query = query_pairs(&options.query)?;
        let agent = self.agent()?;

        let mut request_builder = agent.request(method.clone(), &url);
        request_builder = Authentication::from_config(&config).apply(request_builder);
        if !query.is_empty() {
            request_builder = request_builder.query(&query);
        }
        for (name, value) in &options.headers {
            request_builder = request_builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &options.body {
            request_builder = request_builder.json(body);
        }

        log::debug!("{} {}", method, url);
        let response = request_builder.send().await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let final_url = response.url().to_string();
        let text = response.text().await?;

        if let Some(err) =
            HttpError::from_response(method.as_str(), &final_url, status, headers.clone(), text.as_str())
        {
            log::debug!("{} {} failed with {}", method, final_url, status);
            return Err(err.into());
        }

        let data = decode_body(&text);
        log::debug!("{} {} -> {}", method, final_url, status);
        *self.inner.last_response.lock() = Some(LastResponse {
            method,
            url: final_url,
            status,
            headers,
            data: data.clone(),
        });
        Ok(data)
    }

    /// The HTTP agent, built on first use
    fn agent(&self) -> Result<HttpClient> {
        let mut agent = self.inner.agent.lock();
        if let Some(client) = agent.as_ref() {
            return Ok(client.clone());
        }
        let client = build_agent(&self.inner.config.read())?;
        *agent = Some(client.clone());
        Ok(client)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("config", &*self.inner.config.read())
            .finish()
    }
}

/// Options in effect for `options`: netrc credentials are loaded when no
/// other credentials are configured.
fn resolve(options: &Config) -> Config {
    let mut config = options.clone();
    if !auth::user_authenticated(&config) {
        auth::login_from_netrc(&mut config);
    }
    config
}

fn build_agent(config: &Config) -> Result<HttpClient> {
    let options = config.connection_options();

    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_str(config.default_media_type())
            .map_err(|_| Error::configuration("Invalid default media type"))?,
    );
    for (name, value) in &options.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::configuration(format!("Invalid header name: {}", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::configuration(format!("Invalid value for header {}", name)))?;
        headers.insert(name, value);
    }

    let mut builder = HttpClient::builder()
        .timeout(options.timeout)
        .connect_timeout(options.connect_timeout)
        .user_agent(config.user_agent())
        .default_headers(headers);

    if !options.verify_ssl {
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(proxy) = config.proxy() {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }

    Ok(builder.build()?)
}

/// Resolve `path` against the API endpoint and the selected database.
/// Absolute URLs are used as given.
pub(crate) fn build_url(config: &Config, path: &str) -> Result<String> {
    if path.starts_with("http://") || path.starts_with("https://") {
        Url::parse(path)?;
        return Ok(path.to_string());
    }

    let mut url = config.api_endpoint();
    if let Some(database) = config.database() {
        url.push_str(database.trim_matches('/'));
        url.push('/');
    }
    url.push_str(path.trim_start_matches('/'));

    Url::parse(&url).map_err(|e| Error::configuration(format!("Invalid endpoint {}: {}", url, e)))?;
    Ok(url)
}

/// Flatten a JSON query object into URL parameters. Arrays are joined with
/// commas and nulls are dropped.
pub(crate) fn query_pairs(query: &Value) -> Result<Vec<(String, String)>> {
    let map = match query {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(Error::argument(format!(
                "query must be a JSON object, got {}",
                other
            )))
        }
    };

    Ok(map
        .iter()
        .filter_map(|(key, value)| query_value(value).map(|v| (key.clone(), v)))
        .collect())
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(query_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
