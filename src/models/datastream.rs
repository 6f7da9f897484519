use super::{identifier_text, Attributes, Model, ModelBase};
use crate::collection::Datapoints;
use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// A named series of data points
#[derive(Debug, Clone)]
pub struct Datastream {
    base: ModelBase,
}

model_attributes!(Datastream {
    /// Stream id, unique within the database
    id, set_id, has_id: str => "id";
    /// Display name
    name, set_name, has_name: str => "name";
    /// Stream type (the `type` attribute)
    kind, set_kind, has_kind: str => "type";
    /// Tags used for filtering
    tags, set_tags, has_tags: array => "tags";
    /// Free-form properties
    properties, set_properties, has_properties: object => "properties";
});

impl Datastream {
    /// Data points of this stream
    pub fn datapoints(&self) -> Result<Datapoints> {
        let id = self
            .identifier()
            .ok_or_else(|| Error::argument("datastream has no id"))?;
        Datapoints::new(self.base.connection().clone(), &id)
    }
}

impl Attributes for Datastream {
    fn attrs(&self) -> &Map<String, Value> {
        self.base.attrs()
    }

    fn attrs_mut(&mut self) -> &mut Map<String, Value> {
        self.base.attrs_mut()
    }
}

impl Model for Datastream {
    fn from_base(base: ModelBase) -> Result<Self> {
        Ok(Self { base })
    }

    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn identifier(&self) -> Option<String> {
        identifier_text(self.get("id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::connection::Connection;
    use crate::models::Outcome;
    use serde_json::json;

    fn connection(server: &mockito::Server) -> Connection {
        let config = Config::defaults_from(|_| None)
            .with_api_endpoint(format!("{}/v1", server.url()))
            .with_access_token("token")
            .with_database("db");
        Connection::new(config).unwrap()
    }

    fn offline() -> Connection {
        Connection::new(Config::defaults_from(|_| None).with_database("db")).unwrap()
    }

    #[test]
    fn test_accessors() {
        let mut stream = Datastream::draft(offline(), json!({"name": "Temp"}), "/datastreams").unwrap();
        assert_eq!(stream.name(), Some("Temp"));
        assert!(stream.has_name());
        assert!(!stream.has_id());

        stream.set_kind("number");
        stream.set_tags(json!(["a", "b"]));
        stream.set_properties(json!({"unit": "C"}));
        assert_eq!(stream.kind(), Some("number"));
        assert_eq!(stream.attrs()["type"], "number");
        assert_eq!(stream.tags().map(Vec::len), Some(2));
        assert_eq!(stream.properties().unwrap()["unit"], "C");

        stream.set_name(Value::Null);
        assert!(!stream.has_name());
    }

    #[test]
    fn test_url_follows_persistence() {
        let draft = Datastream::draft(offline(), json!({"id": "loc-1"}), "/datastreams").unwrap();
        assert!(!draft.persisted());
        assert_eq!(draft.url(), "/datastreams");

        let stored = Datastream::from_server(offline(), json!({"id": "loc-1"}), "/datastreams").unwrap();
        assert!(stored.persisted());
        assert_eq!(stored.url(), "/datastreams/loc-1");

        let odd = Datastream::from_server(offline(), json!({"id": "a?b"}), "/datastreams").unwrap();
        assert_eq!(odd.url(), "/datastreams/a%3Fb");
    }

    #[test]
    fn test_datapoints_collection() {
        let stored = Datastream::from_server(offline(), json!({"id": "loc-1"}), "/datastreams").unwrap();
        assert_eq!(stored.datapoints().unwrap().url(), "/datastreams/loc-1/datapoints");

        let anonymous = Datastream::draft(offline(), json!({}), "/datastreams").unwrap();
        assert!(anonymous.datapoints().is_err());
    }

    #[tokio::test]
    async fn test_save_posts_then_puts() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/v1/db/datastreams")
            .match_body(mockito::Matcher::Json(json!({"name": "Temp"})))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"loc-1","name":"Temp"}"#)
            .create_async()
            .await;
        let update = server
            .mock("PUT", "/v1/db/datastreams/loc-1")
            .with_status(200)
            .with_body(r#"{"id":"loc-1","name":"Renamed"}"#)
            .create_async()
            .await;

        let mut stream = Datastream::draft(connection(&server), json!({"name": "Temp"}), "/datastreams").unwrap();
        let outcome = stream.save().await.unwrap();
        assert!(outcome.is_completed());
        assert!(stream.persisted());
        assert_eq!(stream.url(), "/datastreams/loc-1");

        stream.set_name("Renamed");
        assert!(stream.save().await.unwrap().is_completed());

        create.assert_async().await;
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_save_captures_client_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/db/datastreams")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"Validation Failed"}"#)
            .create_async()
            .await;

        let mut stream = Datastream::draft(connection(&server), json!({}), "/datastreams").unwrap();
        let outcome = stream.save().await.unwrap();

        assert!(matches!(outcome, Outcome::Rejected(ref e) if e.status() == 422));
        assert!(!stream.persisted());
        assert_eq!(stream.error().and_then(|e| e.message()).as_deref(), Some("Validation Failed"));
    }

    #[tokio::test]
    async fn test_save_propagates_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/db/datastreams")
            .with_status(500)
            .create_async()
            .await;

        let mut stream = Datastream::draft(connection(&server), json!({}), "/datastreams").unwrap();
        let err = stream.save().await.unwrap_err();
        assert!(err.is_server_error());
        assert!(stream.error().is_none());
    }

    #[tokio::test]
    async fn test_destroy_clears_attributes() {
        let mut server = mockito::Server::new_async().await;
        let delete = server
            .mock("DELETE", "/v1/db/datastreams/loc-1")
            .with_status(204)
            .create_async()
            .await;

        let mut stream =
            Datastream::from_server(connection(&server), json!({"id": "loc-1", "name": "n"}), "/datastreams").unwrap();
        assert!(stream.destroy().await.unwrap().is_completed());
        assert!(stream.attrs().is_empty());
        assert!(!stream.persisted());
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_destroy_rejected_keeps_attributes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/v1/db/datastreams/loc-1")
            .with_status(403)
            .create_async()
            .await;

        let mut stream =
            Datastream::from_server(connection(&server), json!({"id": "loc-1"}), "/datastreams").unwrap();
        assert!(stream.destroy().await.unwrap().is_rejected());
        assert_eq!(stream.id(), Some("loc-1"));
        assert!(stream.persisted());
    }

    #[tokio::test]
    async fn test_destroy_draft_sends_nothing() {
        let mut server = mockito::Server::new_async().await;
        let never = server.mock("DELETE", mockito::Matcher::Any).expect(0).create_async().await;

        let mut stream = Datastream::draft(connection(&server), json!({"name": "n"}), "/datastreams").unwrap();
        assert!(stream.destroy().await.unwrap().is_completed());
        assert!(stream.attrs().is_empty());
        never.assert_async().await;
    }
}
