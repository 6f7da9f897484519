use super::{identifier_text, Attributes, Model, ModelBase};
use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// One grant of an access token
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    attrs: Map<String, Value>,
}

model_attributes!(Scope {
    /// Granted permissions, e.g. `["read", "write"]`
    permissions, set_permissions, has_permissions: array => "permissions";
    /// Whether the grant covers the whole database
    global, set_global, has_global: bool => "global";
    /// Datastream ids covered by the grant
    ids, set_ids, has_ids: array => "ids";
    /// Datastream tags covered by the grant
    tags, set_tags, has_tags: array => "tags";
});

impl Scope {
    /// Empty scope
    pub fn new() -> Self {
        Self::default()
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(attrs) => Ok(Self { attrs }),
            other => Err(Error::argument(format!("scope must be a JSON object, got {}", other))),
        }
    }
}

impl Attributes for Scope {
    fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.attrs
    }
}

/// A bearer token with its scopes
#[derive(Debug, Clone)]
pub struct AccessToken {
    base: ModelBase,
    scopes: Vec<Scope>,
}

model_attributes!(AccessToken {
    /// The token string, assigned by the server
    access_token, set_access_token, has_access_token: str => "access_token";
});

impl AccessToken {
    /// Scopes granted by this token
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Scopes, mutably
    pub fn scopes_mut(&mut self) -> &mut Vec<Scope> {
        &mut self.scopes
    }

    /// Append a scope
    pub fn add_scope(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    /// Move the `scopes` attribute out of the map into typed scopes
    fn take_scopes(&mut self) -> Result<()> {
        if let Some(value) = self.base.attrs_mut().remove("scopes") {
            self.scopes = match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(Scope::from_value)
                    .collect::<Result<Vec<_>>>()?,
                Value::Null => Vec::new(),
                other => {
                    return Err(Error::argument(format!(
                        "scopes must be a JSON array, got {}",
                        other
                    )))
                }
            };
        }
        Ok(())
    }
}

impl Attributes for AccessToken {
    fn attrs(&self) -> &Map<String, Value> {
        self.base.attrs()
    }

    fn attrs_mut(&mut self) -> &mut Map<String, Value> {
        self.base.attrs_mut()
    }

    /// `access_token` when known, plus every scope
    fn to_value(&self) -> Value {
        let mut payload = Map::new();
        if let Some(token) = self.access_token() {
            payload.insert("access_token".to_string(), Value::String(token.to_string()));
        }
        payload.insert(
            "scopes".to_string(),
            Value::Array(self.scopes.iter().map(Attributes::to_value).collect()),
        );
        Value::Object(payload)
    }
}

impl Model for AccessToken {
    fn from_base(base: ModelBase) -> Result<Self> {
        let mut token = Self {
            base,
            scopes: Vec::new(),
        };
        token.take_scopes()?;
        Ok(token)
    }

    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn identifier(&self) -> Option<String> {
        identifier_text(self.get("access_token"))
    }

    fn merge(&mut self, data: Value) -> Result<()> {
        self.base.merge(data);
        self.take_scopes()
    }

    fn clear(&mut self) {
        self.base.clear();
        self.scopes.clear();
    }
}
