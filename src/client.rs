//! Dotide facade
//!
//! [`Dotide`] keeps a process-wide configuration and a cached [`Connection`]
//! built from it. The cached connection is reused while its options match the
//! facade's configuration and replaced otherwise.

use crate::collection::{AccessTokens, Datapoints, Datastreams};
use crate::config::Config;
use crate::connection::{Connection, LastResponse};
use crate::error::Result;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;

struct FacadeState {
    config: Config,
    connection: Option<Connection>,
}

/// Configuration plus a lazily built, cached connection
///
/// # Example
///
/// ```rust,no_run
/// use serde_json::json;
///
/// # async fn example() -> dotide_sdk::Result<()> {
/// let dotide = dotide_sdk::global();
/// dotide.configure(|c| {
///     c.set_access_token("token");
///     c.set_database("sensors");
/// });
///
/// let streams = dotide.datastreams()?.find(&json!({})).await?;
/// println!("{} streams", streams.len());
/// # Ok(())
/// # }
/// ```
pub struct Dotide {
    state: Mutex<FacadeState>,
}

impl Dotide {
    /// Facade over environment-derived defaults
    pub fn new() -> Self {
        Self::with_config(Config::defaults())
    }

    /// Facade over an explicit configuration
    pub fn with_config(config: Config) -> Self {
        Self {
            state: Mutex::new(FacadeState {
                config,
                connection: None,
            }),
        }
    }

    /// Snapshot of the facade's configuration
    pub fn options(&self) -> Config {
        self.state.lock().config.clone()
    }

    /// Change the configuration; the next call builds a fresh connection
    pub fn configure<F>(&self, f: F)
    where
        F: FnOnce(&mut Config),
    {
        let mut state = self.state.lock();
        f(&mut state.config);
        state.connection = None;
    }

    /// Restore the defaults and drop the cached connection
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.config.reset();
        state.connection = None;
    }

    /// The cached connection, rebuilt when its options no longer match
    pub fn connection(&self) -> Result<Connection> {
        let mut state = self.state.lock();
        if let Some(conn) = &state.connection {
            if conn.same_options(&state.config) {
                return Ok(conn.clone());
            }
            log::debug!("Dotide options changed, rebuilding connection");
        }
        let conn = Connection::new(state.config.clone())?;
        state.connection = Some(conn.clone());
        Ok(conn)
    }

    /// Last successful response of the cached connection
    pub fn last_response(&self) -> Option<LastResponse> {
        self.state
            .lock()
            .connection
            .as_ref()
            .and_then(Connection::last_response)
    }

    /// GET through the cached connection
    pub async fn get(&self, path: &str, query: &Value) -> Result<Value> {
        self.connection()?.get(path, query).await
    }

    /// HEAD through the cached connection
    pub async fn head(&self, path: &str, query: &Value) -> Result<Value> {
        self.connection()?.head(path, query).await
    }

    /// POST through the cached connection
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.connection()?.post(path, body).await
    }

    /// PUT through the cached connection
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.connection()?.put(path, body).await
    }

    /// DELETE through the cached connection
    pub async fn delete(&self, path: &str, query: &Value) -> Result<Value> {
        self.connection()?.delete(path, query).await
    }

    /// API root
    pub async fn root(&self) -> Result<Value> {
        self.connection()?.root().await
    }

    /// Data streams of the configured database
    pub fn datastreams(&self) -> Result<Datastreams> {
        self.connection()?.datastreams()
    }

    /// Data points of one stream
    pub fn datapoints(&self, stream_id: &str) -> Result<Datapoints> {
        self.connection()?.datapoints(stream_id)
    }

    /// Access tokens of the configured database
    pub fn access_tokens(&self) -> Result<AccessTokens> {
        self.connection()?.access_tokens()
    }
}

impl Default for Dotide {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dotide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Dotide")
            .field("config", &state.config)
            .field("connected", &state.connection.is_some())
            .finish()
    }
}

static GLOBAL: Lazy<Dotide> = Lazy::new(Dotide::new);

/// The process-wide facade, initialized from the environment on first use
pub fn global() -> &'static Dotide {
    &GLOBAL
}
