//! Client configuration.
//!
//! A [`Config`] is a bag of named options. Each option resolves as explicit
//! override > `DOTIDE_*` environment variable > hardcoded constant from
//! [`crate::defaults`].

use crate::defaults;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Names of the string-addressable configuration options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigKey {
    /// Base URL for API requests
    ApiEndpoint,
    /// Base URL for generated web URLs
    WebEndpoint,
    /// Client id for basic authentication (alias `login`)
    ClientId,
    /// Client secret for basic authentication (alias `password`)
    ClientSecret,
    /// Token for bearer authentication (alias `auth_token`)
    AccessToken,
    /// Database that scopes every collection URL
    Database,
    /// Proxy server URI
    Proxy,
    /// User-Agent header value
    UserAgent,
    /// Accept header value
    DefaultMediaType,
    /// Whether to read credentials from a netrc file
    Netrc,
    /// Path of the netrc file
    NetrcFile,
    /// Page size for paginated listings
    PerPage,
    /// Informational pagination flag, see [`Config::auto_paginate`]
    AutoPaginate,
}

impl ConfigKey {
    /// Every key, in declaration order
    pub const ALL: [ConfigKey; 13] = [
        ConfigKey::ApiEndpoint,
        ConfigKey::WebEndpoint,
        ConfigKey::ClientId,
        ConfigKey::ClientSecret,
        ConfigKey::AccessToken,
        ConfigKey::Database,
        ConfigKey::Proxy,
        ConfigKey::UserAgent,
        ConfigKey::DefaultMediaType,
        ConfigKey::Netrc,
        ConfigKey::NetrcFile,
        ConfigKey::PerPage,
        ConfigKey::AutoPaginate,
    ];

    /// Canonical option name
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::ApiEndpoint => "api_endpoint",
            ConfigKey::WebEndpoint => "web_endpoint",
            ConfigKey::ClientId => "client_id",
            ConfigKey::ClientSecret => "client_secret",
            ConfigKey::AccessToken => "access_token",
            ConfigKey::Database => "database",
            ConfigKey::Proxy => "proxy",
            ConfigKey::UserAgent => "user_agent",
            ConfigKey::DefaultMediaType => "default_media_type",
            ConfigKey::Netrc => "netrc",
            ConfigKey::NetrcFile => "netrc_file",
            ConfigKey::PerPage => "per_page",
            ConfigKey::AutoPaginate => "auto_paginate",
        }
    }

    /// Environment variable consulted for the default value
    pub fn env_var(&self) -> &'static str {
        match self {
            ConfigKey::ApiEndpoint => defaults::env::API_ENDPOINT,
            ConfigKey::WebEndpoint => defaults::env::WEB_ENDPOINT,
            ConfigKey::ClientId => defaults::env::CLIENT_ID,
            ConfigKey::ClientSecret => defaults::env::CLIENT_SECRET,
            ConfigKey::AccessToken => defaults::env::ACCESS_TOKEN,
            ConfigKey::Database => defaults::env::DATABASE,
            ConfigKey::Proxy => defaults::env::PROXY,
            ConfigKey::UserAgent => defaults::env::USER_AGENT,
            ConfigKey::DefaultMediaType => defaults::env::DEFAULT_MEDIA_TYPE,
            ConfigKey::Netrc => defaults::env::NETRC,
            ConfigKey::NetrcFile => defaults::env::NETRC_FILE,
            ConfigKey::PerPage => defaults::env::PER_PAGE,
            ConfigKey::AutoPaginate => defaults::env::AUTO_PAGINATE,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = match s {
            "login" => ConfigKey::ClientId,
            "password" => ConfigKey::ClientSecret,
            "auth_token" => ConfigKey::AccessToken,
            other => ConfigKey::ALL
                .iter()
                .copied()
                .find(|k| k.name() == other)
                .ok_or_else(|| Error::configuration(format!("Unknown option: {}", other)))?,
        };
        Ok(key)
    }
}

/// Transport-level options applied when the HTTP agent is built
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionOptions {
    /// Request timeout duration
    pub timeout: Duration,
    /// Connect timeout duration
    pub connect_timeout: Duration,
    /// Whether to verify SSL certificates
    pub verify_ssl: bool,
    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            timeout: defaults::TIMEOUT,
            connect_timeout: defaults::CONNECT_TIMEOUT,
            verify_ssl: true,
            headers: BTreeMap::new(),
        }
    }
}

/// Configuration for a Dotide connection
///
/// Equality is structural over every option and is what decides whether a
/// cached connection can be reused.
///
/// # Example
///
/// ```
/// use dotide_sdk::Config;
///
/// let config = Config::default()
///     .with_access_token("token")
///     .with_database("sensors");
/// assert!(config.api_endpoint().ends_with('/'));
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Config {
    api_endpoint: String,
    web_endpoint: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    access_token: Option<String>,
    database: Option<String>,
    proxy: Option<String>,
    user_agent: String,
    default_media_type: String,
    netrc: bool,
    netrc_file: String,
    per_page: Option<u32>,
    auto_paginate: bool,
    connection_options: ConnectionOptions,
}

impl Default for Config {
    /// Same as [`Config::defaults`]: constants overridden by the environment.
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Configuration resolved from the process environment and constants
    pub fn defaults() -> Self {
        Self::defaults_from(|name| std::env::var(name).ok())
    }

    /// Configuration resolved from `lookup` (an environment-like source) and
    /// constants. Values that fail to parse are ignored with a warning.
    pub fn defaults_from<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::builtin();
        for key in ConfigKey::ALL {
            if let Some(value) = lookup(key.env_var()) {
                if let Err(err) = config.set(key, value) {
                    log::warn!("Ignoring {}: {}", key.env_var(), err);
                }
            }
        }
        config
    }

    fn builtin() -> Self {
        Self {
            api_endpoint: defaults::API_ENDPOINT.to_string(),
            web_endpoint: defaults::WEB_ENDPOINT.to_string(),
            client_id: None,
            client_secret: None,
            access_token: None,
            database: None,
            proxy: None,
            user_agent: defaults::USER_AGENT.to_string(),
            default_media_type: defaults::MEDIA_TYPE.to_string(),
            netrc: false,
            netrc_file: default_netrc_file(),
            per_page: None,
            auto_paginate: false,
            connection_options: ConnectionOptions::default(),
        }
    }

    /// Reset every option to its default value
    pub fn reset(&mut self) -> &mut Self {
        *self = Self::defaults();
        self
    }

    /// Apply several changes at once
    pub fn configure<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        f(self);
        self
    }

    /// Structural comparison with another configuration
    pub fn same_options(&self, other: &Config) -> bool {
        self == other
    }

    /// Read an option by name, rendered as text
    pub fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::ApiEndpoint => Some(self.api_endpoint()),
            ConfigKey::WebEndpoint => Some(self.web_endpoint()),
            ConfigKey::ClientId => self.client_id.clone(),
            ConfigKey::ClientSecret => self.client_secret.clone(),
            ConfigKey::AccessToken => self.access_token.clone(),
            ConfigKey::Database => self.database.clone(),
            ConfigKey::Proxy => self.proxy.clone(),
            ConfigKey::UserAgent => Some(self.user_agent.clone()),
            ConfigKey::DefaultMediaType => Some(self.default_media_type.clone()),
            ConfigKey::Netrc => Some(self.netrc.to_string()),
            ConfigKey::NetrcFile => Some(self.netrc_file.clone()),
            ConfigKey::PerPage => self.per_page.map(|n| n.to_string()),
            ConfigKey::AutoPaginate => Some(self.auto_paginate.to_string()),
        }
    }

    /// Set an option by name from text. An empty value clears optional
    /// options.
    pub fn set(&mut self, key: ConfigKey, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        match key {
            ConfigKey::ApiEndpoint => self.api_endpoint = value,
            ConfigKey::WebEndpoint => self.web_endpoint = value,
            ConfigKey::ClientId => self.client_id = optional(value),
            ConfigKey::ClientSecret => self.client_secret = optional(value),
            ConfigKey::AccessToken => self.access_token = optional(value),
            ConfigKey::Database => self.database = optional(value),
            ConfigKey::Proxy => self.proxy = optional(value),
            ConfigKey::UserAgent => self.user_agent = value,
            ConfigKey::DefaultMediaType => self.default_media_type = value,
            ConfigKey::Netrc => self.netrc = parse_bool(key, &value)?,
            ConfigKey::NetrcFile => self.netrc_file = value,
            ConfigKey::PerPage => {
                self.per_page = match optional(value) {
                    Some(v) => Some(v.parse().map_err(|_| {
                        Error::configuration(format!("{} must be a positive integer, got {:?}", key, v))
                    })?),
                    None => None,
                }
            }
            ConfigKey::AutoPaginate => self.auto_paginate = parse_bool(key, &value)?,
        }
        Ok(())
    }

    /// Base URL for API requests, always ending with `/`
    pub fn api_endpoint(&self) -> String {
        normalize_endpoint(&self.api_endpoint)
    }

    /// Base URL for web URLs, always ending with `/`
    pub fn web_endpoint(&self) -> String {
        normalize_endpoint(&self.web_endpoint)
    }

    /// Basic authentication client id
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Basic authentication client secret
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    /// Bearer token
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Selected database
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Proxy server URI
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// User-Agent header value
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Accept header value
    pub fn default_media_type(&self) -> &str {
        &self.default_media_type
    }

    /// Whether credentials may be read from the netrc file
    pub fn netrc(&self) -> bool {
        self.netrc
    }

    /// Path of the netrc file
    pub fn netrc_file(&self) -> &str {
        &self.netrc_file
    }

    /// Page size for paginated listings
    pub fn per_page(&self) -> Option<u32> {
        self.per_page
    }

    /// The `auto_paginate` option. It is carried for compatibility with
    /// other Dotide clients and is informational only: listings always fetch
    /// a single page, use [`crate::Collection::find_page`] to walk pages.
    pub fn auto_paginate(&self) -> bool {
        self.auto_paginate
    }

    /// Transport options
    pub fn connection_options(&self) -> &ConnectionOptions {
        &self.connection_options
    }

    /// Set the API endpoint
    pub fn set_api_endpoint(&mut self, endpoint: impl Into<String>) {
        self.api_endpoint = endpoint.into();
    }

    /// Set the web endpoint
    pub fn set_web_endpoint(&mut self, endpoint: impl Into<String>) {
        self.web_endpoint = endpoint.into();
    }

    /// Set the basic authentication client id
    pub fn set_client_id(&mut self, client_id: impl Into<String>) {
        self.client_id = optional(client_id.into());
    }

    /// Set the basic authentication client secret
    pub fn set_client_secret(&mut self, client_secret: impl Into<String>) {
        self.client_secret = optional(client_secret.into());
    }

    /// Set the bearer token
    pub fn set_access_token(&mut self, access_token: impl Into<String>) {
        self.access_token = optional(access_token.into());
    }

    /// Select the database
    pub fn set_database(&mut self, database: impl Into<String>) {
        self.database = optional(database.into());
    }

    /// Set the proxy server URI
    pub fn set_proxy(&mut self, proxy: impl Into<String>) {
        self.proxy = optional(proxy.into());
    }

    /// Set the User-Agent header
    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.user_agent = user_agent.into();
    }

    /// Set the Accept header
    pub fn set_default_media_type(&mut self, media_type: impl Into<String>) {
        self.default_media_type = media_type.into();
    }

    /// Enable or disable netrc lookup
    pub fn set_netrc(&mut self, netrc: bool) {
        self.netrc = netrc;
    }

    /// Set the netrc file path
    pub fn set_netrc_file(&mut self, path: impl Into<String>) {
        self.netrc_file = path.into();
    }

    /// Set the page size
    pub fn set_per_page(&mut self, per_page: Option<u32>) {
        self.per_page = per_page;
    }

    /// Enable or disable automatic pagination
    pub fn set_auto_paginate(&mut self, auto_paginate: bool) {
        self.auto_paginate = auto_paginate;
    }

    /// Mutable access to the transport options
    pub fn connection_options_mut(&mut self) -> &mut ConnectionOptions {
        &mut self.connection_options
    }

    /// Set the API endpoint
    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.set_api_endpoint(endpoint);
        self
    }

    /// Set basic authentication credentials
    pub fn with_basic_auth(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.set_client_id(client_id);
        self.set_client_secret(client_secret);
        self
    }

    /// Set the bearer token
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.set_access_token(access_token);
        self
    }

    /// Select the database
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.set_database(database);
        self
    }

    /// Set the proxy server URI
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.set_proxy(proxy);
        self
    }

    /// Set custom user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.set_user_agent(user_agent);
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connection_options.timeout = timeout;
        self
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.connection_options
            .headers
            .insert(name.into(), value.into());
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_endpoint", &self.api_endpoint)
            .field("web_endpoint", &self.web_endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &mask(&self.client_secret))
            .field("access_token", &mask(&self.access_token))
            .field("database", &self.database)
            .field("proxy", &self.proxy)
            .field("user_agent", &self.user_agent)
            .field("default_media_type", &self.default_media_type)
            .field("netrc", &self.netrc)
            .field("netrc_file", &self.netrc_file)
            .field("per_page", &self.per_page)
            .field("auto_paginate", &self.auto_paginate)
            .field("connection_options", &self.connection_options)
            .finish()
    }
}

/// Append a trailing slash unless one is present
pub fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{}/", endpoint)
    }
}

fn optional(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_bool(key: ConfigKey, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(Error::configuration(format!(
            "{} must be a boolean, got {:?}",
            key, other
        ))),
    }
}

fn mask(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "[REDACTED]")
}

fn default_netrc_file() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(|home| format!("{}/.netrc", home.trim_end_matches('/')))
        .unwrap_or_else(|_| ".netrc".to_string())
}
