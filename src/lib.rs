//! # Dotide Rust SDK
//!
//! A Rust client library for the Dotide time series data API.
//!
//! ## Features
//!
//! - **Datastreams, datapoints and access tokens** as typed models and collections
//! - **Async/await support** on top of `reqwest` and `tokio`
//! - **Layered configuration** from constants, `DOTIDE_*` environment variables and code
//! - **Basic, token and netrc authentication**
//! - **Typed HTTP errors** with the server's message, validation summary and documentation link
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotide_sdk::{Config, Connection, Model, Result};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let conn = Connection::new(
//!         Config::default()
//!             .with_basic_auth("client-id", "client-secret")
//!             .with_database("sensors"),
//!     )?;
//!
//!     // Create a datastream and write a point to it
//!     let stream = conn.datastreams()?.create(&json!({"id": "loc-1", "name": "Location"})).await?;
//!     stream
//!         .datapoints()?
//!         .create(&json!({"t": "2014-06-01T08:00:00Z", "v": 21.5}))
//!         .await?;
//!
//!     // Read it back
//!     let page = stream.datapoints()?.find(&json!({"interval": 3600})).await?;
//!     println!("{} points in {}", page.datapoints.len(), stream.url());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Authentication
//!
//! ```rust,no_run
//! use dotide_sdk::{Config, Connection};
//!
//! # fn example() -> dotide_sdk::Result<()> {
//! // Client credentials (HTTP Basic); needed for managing access tokens
//! let conn = Connection::new(Config::default().with_basic_auth("id", "secret"))?;
//!
//! // Access token (Authorization: Bearer)
//! let conn = Connection::new(Config::default().with_access_token("token"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust,no_run
//! use dotide_sdk::{Connection, Error, ErrorKind, HttpErrorKind};
//!
//! # async fn example(conn: Connection) -> dotide_sdk::Result<()> {
//! match conn.datastreams()?.find_one("loc-1").await {
//!     Ok(stream) => println!("found {:?}", stream.name()),
//!     Err(Error { kind: ErrorKind::Http(err), .. }) if err.kind() == HttpErrorKind::NotFound => {
//!         println!("no such stream");
//!     }
//!     Err(err) => println!("Unexpected error: {}", err),
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod collection;
pub mod config;
pub mod connection;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use auth::Authentication;
pub use client::{global, Dotide};
pub use collection::{
    AccessTokens, Collection, DatapointPage, Datapoints, Datastreams, OneOrMany,
};
pub use config::{Config, ConfigKey, ConnectionOptions};
pub use connection::{Connection, LastResponse, RequestOptions};
pub use error::{Error, ErrorKind, HttpError, HttpErrorKind, Result};
pub use models::{
    AccessToken, Attributes, Datapoint, Datastream, Model, ModelBase, Outcome, Scope,
};

/// SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// SDK name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Default API endpoint
    pub const API_ENDPOINT: &str = "http://api.dotide.com/v1";

    /// Default web endpoint
    pub const WEB_ENDPOINT: &str = "http://dotide.com";

    /// Default `Accept` media type
    pub const MEDIA_TYPE: &str = "application/json";

    /// Default `User-Agent`
    pub const USER_AGENT: &str = concat!("dotide-sdk/", env!("CARGO_PKG_VERSION"));

    /// Default request timeout
    pub const TIMEOUT: Duration = Duration::from_secs(30);

    /// Default connect timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Environment variables read by [`crate::Config::defaults`]
    pub mod env {
        pub const API_ENDPOINT: &str = "DOTIDE_API_ENDPOINT";
        pub const WEB_ENDPOINT: &str = "DOTIDE_WEB_ENDPOINT";
        pub const CLIENT_ID: &str = "DOTIDE_CLIENT_ID";
        pub const CLIENT_SECRET: &str = "DOTIDE_CLIENT_SECRET";
        pub const ACCESS_TOKEN: &str = "DOTIDE_ACCESS_TOKEN";
        pub const DATABASE: &str = "DOTIDE_DATABASE";
        pub const PROXY: &str = "DOTIDE_PROXY";
        pub const USER_AGENT: &str = "DOTIDE_USER_AGENT";
        pub const DEFAULT_MEDIA_TYPE: &str = "DOTIDE_DEFAULT_MEDIA_TYPE";
        pub const NETRC: &str = "DOTIDE_NETRC";
        pub const NETRC_FILE: &str = "DOTIDE_NETRC_FILE";
        pub const PER_PAGE: &str = "DOTIDE_PER_PAGE";
        pub const AUTO_PAGINATE: &str = "DOTIDE_AUTO_PAGINATE";
    }
}

/// Initialize the SDK with logging
///
/// This function sets up environment-based logging for the SDK.
/// Call this once at the start of your application.
///
/// # Example
///
/// ```rust
/// dotide_sdk::init_logging();
/// ```
pub fn init_logging() {
    env_logger::init();
}

/// Get the SDK version
pub fn version() -> &'static str {
    VERSION
}

/// Get the SDK name
pub fn name() -> &'static str {
    NAME
}
