use super::{Attributes, Model, ModelBase, Outcome};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// One timestamped value of a data stream
///
/// Points have no URL of their own: they are created through the stream's
/// datapoints collection and removed by range with
/// [`Datapoints::destroy_all`](crate::collection::Datapoints::destroy_all).
#[derive(Debug, Clone)]
pub struct Datapoint {
    base: ModelBase,
}

model_attributes!(Datapoint {
    /// Timestamp as sent by the server
    t, set_t, has_t: value => "t";
    /// Recorded value
    v, set_v, has_v: value => "v";
});

impl Datapoint {
    /// The `t` attribute parsed as an RFC 3339 timestamp
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let text = self.get("t")?.as_str()?;
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Set `t` from a timestamp
    pub fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.set_t(timestamp.to_rfc3339());
    }
}

impl Attributes for Datapoint {
    fn attrs(&self) -> &Map<String, Value> {
        self.base.attrs()
    }

    fn attrs_mut(&mut self) -> &mut Map<String, Value> {
        self.base.attrs_mut()
    }
}

#[async_trait]
impl Model for Datapoint {
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
        None
    }

    fn url(&self) -> String {
        self.base.url_root().to_string()
    }

    /// Points are immutable once stored; saving one again is skipped.
    async fn save(&mut self) -> Result<Outcome> {
        if self.persisted() {
            return Ok(Outcome::Skipped);
        }

        let conn = self.base.connection().clone();
        let url = self.url();
        let result = conn.post(&url, &self.to_value()).await;
        match self.base.capture(result)? {
            Ok(data) => {
                self.merge(data)?;
                Ok(Outcome::Completed)
            }
            Err(rejected) => Ok(Outcome::Rejected(rejected)),
        }
    }

    async fn destroy(&mut self) -> Result<Outcome> {
        Err(Error::argument(
            "datapoints are deleted by range through the datapoints collection",
        ))
    }
}
