//! Resource collections.
//!
//! A collection binds a connection, a model type and a URL. Collections are
//! created on demand and hold no state beyond that binding.

use crate::auth;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::models::{AccessToken, Datapoint, Datastream, Model};
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;

/// URL of the datastreams collection
pub const DATASTREAMS_PATH: &str = "/datastreams";
/// URL of the access tokens collection
pub const ACCESS_TOKENS_PATH: &str = "/access_tokens";

/// Data streams of the selected database
pub type Datastreams = Collection<Datastream>;

fn require_database(conn: &Connection) -> Result<()> {
    if conn.database().is_none() {
        return Err(Error::configuration("database is not selected"));
    }
    Ok(())
}

fn models_from<M: Model>(conn: &Connection, value: Value, url: &str) -> Result<Vec<M>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| M::from_server(conn.clone(), item, url))
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::serialization(format!(
            "expected a JSON array from {}, got {}",
            url, other
        ))),
    }
}

/// A list of models of one type at one URL
pub struct Collection<M> {
    conn: Connection,
    url: String,
    model: PhantomData<fn() -> M>,
}

impl<M> Clone for Collection<M> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            url: self.url.clone(),
            model: PhantomData,
        }
    }
}

impl<M> fmt::Debug for Collection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection").field("url", &self.url).finish()
    }
}

impl<M: Model> Collection<M> {
    /// Bind `url` on `conn`. Fails when no database is selected.
    pub fn new(conn: Connection, url: impl Into<String>) -> Result<Self> {
        require_database(&conn)?;
        Ok(Self {
            conn,
            url: url.into(),
            model: PhantomData,
        })
    }

    /// Owning connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Collection URL, relative to the database
    pub fn url(&self) -> &str {
        &self.url
    }

    /// List models matching `query`
    pub async fn find(&self, query: &Value) -> Result<Vec<M>> {
        let data = self.conn.get(&self.url, query).await?;
        models_from(&self.conn, data, &self.url)
    }

    /// List one page of models, sized by the configured `per_page`
    pub async fn find_page(&self, page: u32, query: &Value) -> Result<Vec<M>> {
        let mut params = match query {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(Error::argument(format!(
                    "query must be a JSON object, got {}",
                    other
                )))
            }
        };
        params.insert("page".to_string(), Value::from(page));
        if let Some(per_page) = self.conn.config().per_page() {
            params.insert("per_page".to_string(), Value::from(per_page));
        }
        self.find(&Value::Object(params)).await
    }

    /// Fetch one model by id
    pub async fn find_one(&self, id: &str) -> Result<M> {
        let data = self.conn.get(&self.member_url(id), &Value::Null).await?;
        M::from_server(self.conn.clone(), data, &self.url)
    }

    /// Create a model on the server
    pub async fn create(&self, attrs: &Value) -> Result<M> {
        let data = self.conn.post(&self.url, attrs).await?;
        M::from_server(self.conn.clone(), data, &self.url)
    }

    /// Build a local draft; nothing is sent
    pub fn build(&self, attrs: Value) -> Result<M> {
        M::draft(self.conn.clone(), attrs, &self.url)
    }

    /// Delete every model matching `query`
    pub async fn destroy_all(&self, query: &Value) -> Result<()> {
        self.conn.delete(&self.url, query).await?;
        Ok(())
    }

    /// Delete one model by id
    pub async fn destroy_one(&self, id: &str) -> Result<()> {
        self.conn.delete(&self.member_url(id), &Value::Null).await?;
        Ok(())
    }

    fn member_url(&self, id: &str) -> String {
        format!("{}/{}", self.url, urlencoding::encode(id))
    }
}

/// Either a single model or a list, mirroring the shape that was sent
#[derive(Debug, Clone)]
pub enum OneOrMany<M> {
    /// Answer to a single object
    One(M),
    /// Answer to an array
    Many(Vec<M>),
}

impl<M> OneOrMany<M> {
    /// Flatten into a list
    pub fn into_vec(self) -> Vec<M> {
        match self {
            OneOrMany::One(model) => vec![model],
            OneOrMany::Many(models) => models,
        }
    }

    /// Number of models
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(models) => models.len(),
        }
    }

    /// Whether there are no models
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Answer of a datapoints query
#[derive(Debug, Clone)]
pub struct DatapointPage {
    /// Stream id
    pub id: Option<String>,
    /// Query options echoed by the server
    pub options: Map<String, Value>,
    /// Aggregates over the range; empty when the server sent none
    pub summary: Map<String, Value>,
    /// The points
    pub datapoints: Vec<Datapoint>,
}

/// Data points of one stream
#[derive(Debug, Clone)]
pub struct Datapoints {
    inner: Collection<Datapoint>,
    stream_id: String,
}

impl Datapoints {
    /// Bind the datapoints of `stream_id`. Fails when no database is selected.
    pub fn new(conn: Connection, stream_id: &str) -> Result<Self> {
        let url = format!(
            "{}/{}/datapoints",
            DATASTREAMS_PATH,
            urlencoding::encode(stream_id)
        );
        Ok(Self {
            inner: Collection::new(conn, url)?,
            stream_id: stream_id.to_string(),
        })
    }

    /// Owning stream
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Collection URL, relative to the database
    pub fn url(&self) -> &str {
        self.inner.url()
    }

    /// Query points, e.g. `{"start": ..., "end": ..., "interval": 3600}`
    pub async fn find(&self, query: &Value) -> Result<DatapointPage> {
        let conn = self.inner.connection();
        let url = self.inner.url();
        let mut envelope = match conn.get(url, query).await? {
            Value::Object(map) => map,
            other => {
                return Err(Error::serialization(format!(
                    "expected a JSON object from {}, got {}",
                    url, other
                )))
            }
        };

        let id = match envelope.remove("id") {
            Some(Value::String(id)) => Some(id),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        Ok(DatapointPage {
            id,
            options: take_object(&mut envelope, "options"),
            summary: take_object(&mut envelope, "summary"),
            datapoints: models_from(
                conn,
                envelope.remove("datapoints").unwrap_or(Value::Null),
                url,
            )?,
        })
    }

    /// Create one point (object) or several (array)
    pub async fn create(&self, data: &Value) -> Result<OneOrMany<Datapoint>> {
        let conn = self.inner.connection();
        let url = self.inner.url();
        match data {
            Value::Object(_) => {
                let answer = conn.post(url, data).await?;
                Ok(OneOrMany::One(Datapoint::from_server(conn.clone(), answer, url)?))
            }
            Value::Array(_) => {
                let answer = conn.post(url, data).await?;
                Ok(OneOrMany::Many(models_from(conn, answer, url)?))
            }
            other => Err(Error::argument(format!(
                "datapoints must be a JSON object or array, got {}",
                other
            ))),
        }
    }

    /// Build a local draft point
    pub fn build(&self, attrs: Value) -> Result<Datapoint> {
        self.inner.build(attrs)
    }

    /// Delete the points in a range, e.g. `{"start": ..., "end": ...}`
    pub async fn destroy_all(&self, query: &Value) -> Result<()> {
        self.inner.destroy_all(query).await
    }
}

fn take_object(map: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match map.remove(key) {
        Some(Value::Object(object)) => object,
        _ => Map::new(),
    }
}

/// Access tokens of the selected database
///
/// Managing tokens needs client credentials; a connection authenticated with
/// a token alone cannot open this collection.
#[derive(Debug, Clone)]
pub struct AccessTokens {
    inner: Collection<AccessToken>,
}

impl AccessTokens {
    /// Bind the access tokens collection
    pub fn new(conn: Connection) -> Result<Self> {
        let inner = Collection::new(conn, ACCESS_TOKENS_PATH)?;
        if !auth::basic_authenticated(&inner.connection().config()) {
            return Err(Error::configuration(
                "access tokens need basic authentication",
            ));
        }
        Ok(Self { inner })
    }

    /// Collection URL, relative to the database
    pub fn url(&self) -> &str {
        self.inner.url()
    }

    /// Every token of the database
    pub async fn all(&self) -> Result<Vec<AccessToken>> {
        self.inner.find(&Value::Null).await
    }

    /// Fetch a token by its token string
    pub async fn find_one(&self, token: &str) -> Result<AccessToken> {
        self.inner.find_one(token).await
    }

    /// Create a token, e.g. `{"scopes": [{"permissions": ["read"], "global": true}]}`
    pub async fn create(&self, attrs: &Value) -> Result<AccessToken> {
        self.inner.create(attrs).await
    }

    /// Build a local draft token
    pub fn build(&self, attrs: Value) -> Result<AccessToken> {
        self.inner.build(attrs)
    }

    /// Revoke a token by its token string
    pub async fn destroy_one(&self, token: &str) -> Result<()> {
        self.inner.destroy_one(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Attributes;
    use assert_matches::assert_matches;
    use mockito::Matcher;
    use serde_json::json;

    fn connection(server: &mockito::Server, database: Option<&str>) -> Connection {
        let mut config = Config::defaults_from(|_| None)
            .with_api_endpoint(format!("{}/v1", server.url()))
            .with_access_token("token");
        if let Some(db) = database {
            config.set_database(db);
        }
        Connection::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_requires_database() {
        let mut server = mockito::Server::new_async().await;
        let never = server.mock("GET", Matcher::Any).expect(0).create_async().await;

        let conn = connection(&server, None);
        let err = Datastreams::new(conn.clone(), DATASTREAMS_PATH).unwrap_err();
        assert!(err.is_configuration());
        assert!(conn.datapoints("loc-1").unwrap_err().is_configuration());
        never.assert_async().await;
    }

    #[tokio::test]
    async fn test_find_wraps_persisted_models() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/db/datastreams")
            .match_query(Matcher::UrlEncoded("tags".into(), "a,b".into()))
            .with_status(200)
            .with_body(r#"[{"id":"s1","name":"one"},{"id":"s2","name":"two"}]"#)
            .create_async()
            .await;

        let streams = connection(&server, Some("db")).datastreams().unwrap();
        let found = streams.find(&json!({"tags": ["a", "b"]})).await.unwrap();

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|s| s.persisted()));
        assert_eq!(found[1].url(), "/datastreams/s2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_find_page_adds_paging() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/db/datastreams")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("per_page".into(), "10".into()),
            ]))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let conn = connection(&server, Some("db"));
        conn.configure(|c| c.set_per_page(Some(10)));
        let found = conn.datastreams().unwrap().find_page(2, &Value::Null).await.unwrap();

        assert!(found.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_auto_paginate_fetches_one_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/db/datastreams")
            .with_status(200)
            .with_header("link", "<http://example.com/v1/db/datastreams?page=2>; rel=\"next\"")
            .with_body(r#"[{"id":"s1"}]"#)
            .expect(1)
            .create_async()
            .await;

        let conn = connection(&server, Some("db"));
        conn.configure(|c| c.set_auto_paginate(true));
        let found = conn.datastreams().unwrap().find(&Value::Null).await.unwrap();

        assert_eq!(found.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_find_one_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/db/datastreams/missing")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;

        let streams = connection(&server, Some("db")).datastreams().unwrap();
        let err = streams.find_one("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_build_is_local() {
        let mut server = mockito::Server::new_async().await;
        let never = server.mock("POST", Matcher::Any).expect(0).create_async().await;

        let streams = connection(&server, Some("db")).datastreams().unwrap();
        let draft = streams.build(json!({"name": "draft"})).unwrap();
        assert!(!draft.persisted());
        assert_eq!(draft.url(), "/datastreams");
        assert!(streams.build(json!("nope")).is_err());
        never.assert_async().await;
    }

    #[tokio::test]
    async fn test_destroy_one() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/v1/db/datastreams/s1")
            .with_status(204)
            .create_async()
            .await;

        let streams = connection(&server, Some("db")).datastreams().unwrap();
        streams.destroy_one("s1").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ids_are_escaped_in_paths() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/v1/db/datastreams/a%3Fb%23c")
            .with_status(204)
            .create_async()
            .await;

        let conn = connection(&server, Some("db"));
        conn.datastreams().unwrap().destroy_one("a?b#c").await.unwrap();
        mock.assert_async().await;

        let points = conn.datapoints("a/b").unwrap();
        assert_eq!(points.url(), "/datastreams/a%2Fb/datapoints");
        assert_eq!(points.stream_id(), "a/b");
    }

    #[tokio::test]
    async fn test_datapoints_find_envelope() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/db/datastreams/loc-1/datapoints")
            .match_query(Matcher::UrlEncoded("interval".into(), "3600".into()))
            .with_status(200)
            .with_body(
                r#"{"id":"loc-1","options":{"interval":3600},"datapoints":[{"t":"2014-06-01T08:00:00Z","v":1},{"t":"2014-06-01T09:00:00Z","v":2}]}"#,
            )
            .create_async()
            .await;

        let points = connection(&server, Some("db")).datapoints("loc-1").unwrap();
        let page = points.find(&json!({"interval": 3600})).await.unwrap();

        assert_eq!(page.id.as_deref(), Some("loc-1"));
        assert_eq!(page.options["interval"], 3600);
        assert!(page.summary.is_empty());
        assert_eq!(page.datapoints.len(), 2);
        assert_eq!(page.datapoints[1].v(), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_datapoints_create_shapes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/db/datastreams/loc-1/datapoints")
            .match_body(Matcher::Json(json!({"t": "2014-06-01T08:00:00Z", "v": 1})))
            .with_status(201)
            .with_body(r#"{"t":"2014-06-01T08:00:00Z","v":1}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/db/datastreams/loc-1/datapoints")
            .match_body(Matcher::Json(json!([{"v": 1}, {"v": 2}])))
            .with_status(201)
            .with_body(r#"[{"v":1},{"v":2}]"#)
            .create_async()
            .await;

        let points = connection(&server, Some("db")).datapoints("loc-1").unwrap();

        let one = points
            .create(&json!({"t": "2014-06-01T08:00:00Z", "v": 1}))
            .await
            .unwrap();
        assert_matches!(one, OneOrMany::One(ref p) if p.persisted());

        let many = points.create(&json!([{"v": 1}, {"v": 2}])).await.unwrap();
        assert_eq!(many.len(), 2);
        assert_matches!(many, OneOrMany::Many(_));

        let err = points.create(&json!(5)).await.unwrap_err();
        assert_matches!(err.kind, crate::ErrorKind::Argument { .. });
    }

    #[tokio::test]
    async fn test_datapoints_destroy_range() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/v1/db/datastreams/loc-1/datapoints")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start".into(), "2014-06-01T00:00:00Z".into()),
                Matcher::UrlEncoded("end".into(), "2014-06-02T00:00:00Z".into()),
            ]))
            .with_status(204)
            .create_async()
            .await;

        let points = connection(&server, Some("db")).datapoints("loc-1").unwrap();
        points
            .destroy_all(&json!({"start": "2014-06-01T00:00:00Z", "end": "2014-06-02T00:00:00Z"}))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_access_tokens_need_basic_auth() {
        let server = mockito::Server::new_async().await;
        let conn = connection(&server, Some("db"));
        assert!(conn.access_tokens().unwrap_err().is_configuration());

        conn.configure(|c| {
            c.set_client_id("id");
            c.set_client_secret("secret");
        });
        assert_eq!(conn.access_tokens().unwrap().url(), ACCESS_TOKENS_PATH);
    }

    #[tokio::test]
    async fn test_access_tokens_all_and_destroy() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/db/access_tokens")
            .match_header("authorization", "Basic aWQ6c2VjcmV0")
            .with_status(200)
            .with_body(r#"[{"access_token":"abc","scopes":[{"permissions":["read"],"global":true}]}]"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/v1/db/access_tokens/abc")
            .with_status(204)
            .create_async()
            .await;

        let conn = connection(&server, Some("db"));
        conn.configure(|c| {
            c.set_client_id("id");
            c.set_client_secret("secret");
        });
        let tokens = conn.access_tokens().unwrap();

        let all = tokens.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].access_token(), Some("abc"));
        assert_eq!(all[0].scopes()[0].global(), Some(true));
        assert!(all[0].get("scopes").is_none());

        tokens.destroy_one("abc").await.unwrap();
        delete.assert_async().await;
    }
}
