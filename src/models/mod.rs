//! Resource models.
//!
//! A model is an ordered attribute map bound to a connection and the URL of
//! its collection. Models built from server answers are persisted; models
//! built from caller attributes are drafts until saved.

use crate::connection::Connection;
use crate::error::{Error, ErrorKind, HttpError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

/// Generate typed accessors over an attribute map.
///
/// Each entry expands to a getter, a `set_*` setter and a `has_*` presence
/// predicate for one attribute key:
///
/// ```ignore
/// model_attributes!(Datastream {
///     /// Stream id
///     id, set_id, has_id: str => "id";
/// });
/// ```
///
/// Supported accessor shapes are `str`, `bool`, `array`, `object` and
/// `value` (the raw JSON value).
macro_rules! model_attributes {
    (@ty str) => { Option<&str> };
    (@ty bool) => { Option<bool> };
    (@ty array) => { Option<&Vec<serde_json::Value>> };
    (@ty object) => { Option<&serde_json::Map<String, serde_json::Value>> };
    (@ty value) => { Option<&serde_json::Value> };

    (@get str, $value:expr) => { $value.and_then(serde_json::Value::as_str) };
    (@get bool, $value:expr) => { $value.and_then(serde_json::Value::as_bool) };
    (@get array, $value:expr) => { $value.and_then(serde_json::Value::as_array) };
    (@get object, $value:expr) => { $value.and_then(serde_json::Value::as_object) };
    (@get value, $value:expr) => { $value };

    (
        $model:ty {
            $(
                $(#[$meta:meta])*
                $getter:ident, $setter:ident, $has:ident : $shape:ident => $key:literal;
            )*
        }
    ) => {
        impl $model {
            $(
                $(#[$meta])*
                pub fn $getter(&self) -> model_attributes!(@ty $shape) {
                    model_attributes!(@get $shape, $crate::models::Attributes::get(self, $key))
                }

                #[doc = concat!("Set the `", $key, "` attribute")]
                pub fn $setter(&mut self, value: impl Into<serde_json::Value>) {
                    $crate::models::Attributes::set(self, $key, value);
                }

                #[doc = concat!("Whether the `", $key, "` attribute is present and truthy")]
                pub fn $has(&self) -> bool {
                    $crate::models::Attributes::has(self, $key)
                }
            )*
        }
    };
}

mod access_token;
mod datapoint;
mod datastream;

pub use access_token::{AccessToken, Scope};
pub use datapoint::Datapoint;
pub use datastream::Datastream;

/// Result of [`Model::save`] and [`Model::destroy`]
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The server accepted the change
    Completed,
    /// The server answered with a client error; it is also kept on the model
    Rejected(HttpError),
    /// Nothing needed to be sent
    Skipped,
}

impl Outcome {
    /// Whether the change went through
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    /// Whether the server rejected the change
    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }

    /// Whether no request was made
    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }
}

/// Access to an ordered attribute map
pub trait Attributes {
    /// All attributes
    fn attrs(&self) -> &Map<String, Value>;

    /// All attributes, mutably
    fn attrs_mut(&mut self) -> &mut Map<String, Value>;

    /// Read one attribute
    fn get(&self, key: &str) -> Option<&Value> {
        self.attrs().get(key)
    }

    /// Write one attribute
    fn set(&mut self, key: &str, value: impl Into<Value>)
    where
        Self: Sized,
    {
        self.attrs_mut().insert(key.to_string(), value.into());
    }

    /// Whether an attribute is present, not null and not `false`
    fn has(&self, key: &str) -> bool {
        !matches!(self.get(key), None | Some(Value::Null) | Some(Value::Bool(false)))
    }

    /// Request payload for this model
    fn to_value(&self) -> Value {
        Value::Object(self.attrs().clone())
    }
}

/// State shared by every model
#[derive(Clone)]
pub struct ModelBase {
    conn: Connection,
    url_root: String,
    attrs: Map<String, Value>,
    persisted: bool,
    error: Option<HttpError>,
}

impl ModelBase {
    /// Wrap a JSON object. Anything else is an argument error.
    pub fn new(conn: Connection, value: Value, url_root: &str, persisted: bool) -> Result<Self> {
        let attrs = match value {
            Value::Object(map) => map,
            Value::Null if !persisted => Map::new(),
            other => {
                return Err(Error::argument(format!(
                    "expected a JSON object for {}, got {}",
                    url_root, other
                )))
            }
        };
        Ok(Self {
            conn,
            url_root: url_root.to_string(),
            attrs,
            persisted,
            error: None,
        })
    }

    /// Owning connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// URL of the owning collection
    pub fn url_root(&self) -> &str {
        &self.url_root
    }

    /// Whether the model exists on the server
    pub fn persisted(&self) -> bool {
        self.persisted
    }

    /// The client error captured by the last `save` or `destroy`
    pub fn error(&self) -> Option<&HttpError> {
        self.error.as_ref()
    }

    pub(crate) fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    pub(crate) fn attrs_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.attrs
    }

    /// Mark persisted and merge the server's answer into the attributes
    pub(crate) fn merge(&mut self, data: Value) {
        self.persisted = true;
        if let Value::Object(map) = data {
            self.attrs.extend(map);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.attrs.clear();
        self.persisted = false;
    }

    /// Keep client errors on the model; everything else is fatal.
    pub(crate) fn capture<T>(&mut self, result: Result<T>) -> Result<std::result::Result<T, HttpError>> {
        match result {
            Ok(value) => {
                self.error = None;
                Ok(Ok(value))
            }
            Err(err) if err.is_client_error() => match err.kind {
                ErrorKind::Http(http) => {
                    log::warn!("{}", http);
                    self.error = Some(http.clone());
                    Ok(Err(http))
                }
                kind => Err(Error::new(kind)),
            },
            Err(err) => Err(err),
        }
    }
}

impl fmt::Debug for ModelBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBase")
            .field("url_root", &self.url_root)
            .field("attrs", &self.attrs)
            .field("persisted", &self.persisted)
            .field("error", &self.error.as_ref().map(|e| e.status()))
            .finish()
    }
}

/// A resource that can be saved to and destroyed on the server
#[async_trait]
pub trait Model: Attributes + Sized + Send + Sync {
    /// Build the model from its shared state
    fn from_base(base: ModelBase) -> Result<Self>;

    /// Shared state
    fn base(&self) -> &ModelBase;

    /// Shared state, mutably
    fn base_mut(&mut self) -> &mut ModelBase;

    /// Value that names this model under its collection URL
    fn identifier(&self) -> Option<String>;

    /// Model decoded from a server answer
    fn from_server(conn: Connection, value: Value, url_root: &str) -> Result<Self> {
        Self::from_base(ModelBase::new(conn, value, url_root, true)?)
    }

    /// Local draft built from caller attributes
    fn draft(conn: Connection, attrs: Value, url_root: &str) -> Result<Self> {
        Self::from_base(ModelBase::new(conn, attrs, url_root, false)?)
    }

    /// Whether the model exists on the server
    fn persisted(&self) -> bool {
        self.base().persisted()
    }

    /// The client error captured by the last `save` or `destroy`
    fn error(&self) -> Option<&HttpError> {
        self.base().error()
    }

    /// `{url_root}/{identifier}` once persisted, the collection URL before
    fn url(&self) -> String {
        match (self.persisted(), self.identifier()) {
            (true, Some(id)) => format!("{}/{}", self.base().url_root(), urlencoding::encode(&id)),
            _ => self.base().url_root().to_string(),
        }
    }

    /// Fold a server answer into the model
    fn merge(&mut self, data: Value) -> Result<()> {
        self.base_mut().merge(data);
        Ok(())
    }

    /// Drop every attribute and return to draft state
    fn clear(&mut self) {
        self.base_mut().clear();
    }

    /// Create the model (POST) when it is a draft, update it (PUT) otherwise.
    async fn save(&mut self) -> Result<Outcome> {
        let conn = self.base().connection().clone();
        let payload = self.to_value();

        if self.persisted() {
            let url = self.url();
            let result = conn.put(&url, &payload).await;
            return Ok(match self.base_mut().capture(result)? {
                Ok(_) => Outcome::Completed,
                Err(rejected) => Outcome::Rejected(rejected),
            });
        }

        let url = self.base().url_root().to_string();
        let result = conn.post(&url, &payload).await;
        match self.base_mut().capture(result)? {
            Ok(data) => {
                self.merge(data)?;
                Ok(Outcome::Completed)
            }
            Err(rejected) => Ok(Outcome::Rejected(rejected)),
        }
    }

    /// Delete the model on the server, then clear it locally.
    async fn destroy(&mut self) -> Result<Outcome> {
        if self.persisted() {
            let conn = self.base().connection().clone();
            let url = self.url();
            let result = conn.delete(&url, &Value::Null).await;
            if let Err(rejected) = self.base_mut().capture(result)? {
                return Ok(Outcome::Rejected(rejected));
            }
        }
        self.clear();
        Ok(Outcome::Completed)
    }
}

/// Render an identifier attribute for use in a URL
pub(crate) fn identifier_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
