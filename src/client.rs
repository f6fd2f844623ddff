//! External data and placement interfaces.
//!
//! The engine only consumes these: listing containers and items, asking for
//! a placement suggestion, and committing a placement. [`PlacementBackend`]
//! is the seam; [`HttpPlacementBackend`] talks to the stowage REST service.

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::model::{Container, Item, PlacementCommand, Position, Suggestion, ValidationError};
use crate::types::{Coordinates, PlacementBox};

/// Failure of an external call.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("could not build request: {0}")]
    Encode(String),
    #[error("service rejected the request: {0}")]
    Rejected(String),
}

/// Result of a suggestion request that reached the service.
#[derive(Clone, Debug, PartialEq)]
pub enum SuggestionOutcome {
    /// The service proposes a placement.
    Suggested(Suggestion),
    /// The service found no placement for the item right now.
    NoPlacement { message: Option<String> },
}

/// Abstract external service consumed by the engine.
///
/// Calls are awaited on the single-threaded executor, so implementations do
/// not need to be `Send`.
#[allow(async_fn_in_trait)]
pub trait PlacementBackend {
    /// Reads all containers.
    async fn list_containers(&self) -> Result<Vec<Container>, ServiceError>;

    /// Reads all items, placed and unplaced.
    async fn list_items(&self) -> Result<Vec<Item>, ServiceError>;

    /// Asks where `item_id` should go.
    async fn placement_suggestion(&self, item_id: &str) -> Result<SuggestionOutcome, ServiceError>;

    /// Commits a placement.
    async fn confirm_placement(&self, command: &PlacementCommand) -> Result<(), ServiceError>;
}

/// Suggested region as the suggestion endpoint encodes it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedPosition {
    pub start_coordinates: Coordinates,
    pub end_coordinates: Coordinates,
}

impl SuggestedPosition {
    fn to_box(self) -> Result<PlacementBox, ServiceError> {
        PlacementBox::checked(self.start_coordinates, self.end_coordinates)
            .map_err(|err| ServiceError::Decode(err.to_string()))
    }
}

/// Suggestion payload of `GET /placement/suggestion/{itemId}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionPayload {
    pub item_id: String,
    pub container_id: String,
    #[serde(default)]
    pub container_zone: Option<String>,
    pub position: SuggestedPosition,
    #[serde(default, rename = "isPreferedZone")]
    pub is_preferred_zone: bool,
}

/// Response of `GET /placement/suggestion/{itemId}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub success: bool,
    #[serde(default)]
    pub suggestion: Option<SuggestionPayload>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SuggestionResponse {
    /// Converts the wire response into a domain outcome.
    ///
    /// `success` without a suggestion is treated as "no placement".
    pub fn into_outcome(self) -> Result<SuggestionOutcome, ServiceError> {
        match (self.success, self.suggestion) {
            (true, Some(payload)) => Ok(SuggestionOutcome::Suggested(Suggestion {
                region: payload.position.to_box()?,
                item_id: payload.item_id,
                container_id: payload.container_id,
                container_zone: payload.container_zone,
                in_preferred_zone: payload.is_preferred_zone,
            })),
            _ => Ok(SuggestionOutcome::NoPlacement {
                message: self.message,
            }),
        }
    }
}

/// Body of `POST /place`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRequest {
    pub item_id: String,
    pub user_id: String,
    pub timestamp: String,
    pub container_id: String,
    pub position: Position,
}

/// Response of `POST /place`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaceResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

fn user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    format!("stowage-view/{version} ({os}; {arch})")
}

/// [`PlacementBackend`] over the stowage REST service.
#[derive(Clone, Debug)]
pub struct HttpPlacementBackend {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpPlacementBackend {
    /// Builds an HTTP client with the configured timeout.
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(user_agent())
            .build()?;
        Ok(Self { client, config })
    }

    fn suggestion_url(&self, item_id: &str) -> Result<Url, ServiceError> {
        let mut url = Url::parse(&self.config.endpoint("placement/suggestion"))
            .map_err(|err| ServiceError::Encode(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| {
                ServiceError::Encode(format!("{} cannot be a base URL", self.config.base_url()))
            })?
            .push(item_id);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ServiceError> {
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        decode(response).await
    }
}

/// Decodes a listing one record at a time. A record that does not decode or
/// does not validate is skipped with a warning, so one bad record does not
/// hide the rest of the listing.
fn decode_records<T, F>(kind: &str, records: Vec<serde_json::Value>, check: F) -> Vec<T>
where
    T: serde::de::DeserializeOwned,
    F: Fn(&T) -> Result<(), ValidationError>,
{
    let total = records.len();
    let decoded: Vec<T> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let parsed = serde_json::from_value::<T>(record)
                .map_err(|err| err.to_string())
                .and_then(|value| check(&value).map(|()| value).map_err(|err| err.to_string()));
            match parsed {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!("⚠️ Skipping {} record {}: {}", kind, index, err);
                    None
                }
            }
        })
        .collect();
    if decoded.len() < total {
        warn!("⚠️ Kept {} of {} {} records", decoded.len(), total, kind);
    }
    decoded
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = response.status();
    if status != StatusCode::OK {
        let body = match response.text().await {
            Ok(body) => body,
            Err(_) => String::from("unknown response"),
        };
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ServiceError::Decode(err.to_string()))
}

impl PlacementBackend for HttpPlacementBackend {
    async fn list_containers(&self) -> Result<Vec<Container>, ServiceError> {
        let url = Url::parse(&self.config.endpoint("containers"))
            .map_err(|err| ServiceError::Encode(err.to_string()))?;
        let records: Vec<serde_json::Value> = self.get_json(url).await?;
        Ok(decode_records("container", records, Container::validate))
    }

    async fn list_items(&self) -> Result<Vec<Item>, ServiceError> {
        let url = Url::parse(&self.config.endpoint("items"))
            .map_err(|err| ServiceError::Encode(err.to_string()))?;
        let records: Vec<serde_json::Value> = self.get_json(url).await?;
        Ok(decode_records("item", records, Item::validate))
    }

    async fn placement_suggestion(&self, item_id: &str) -> Result<SuggestionOutcome, ServiceError> {
        let url = self.suggestion_url(item_id)?;
        let response: SuggestionResponse = self.get_json(url).await?;
        response.into_outcome()
    }

    async fn confirm_placement(&self, command: &PlacementCommand) -> Result<(), ServiceError> {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|err| ServiceError::Encode(err.to_string()))?;
        let body = PlaceRequest {
            item_id: command.item_id.clone(),
            user_id: self.config.user_id().to_string(),
            timestamp,
            container_id: command.container_id.clone(),
            position: command.region.into(),
        };

        info!(
            "📦 Placing {} in {} at {:?}",
            command.item_id, command.container_id, command.region.start
        );
        let response = self
            .client
            .post(self.config.endpoint("place"))
            .json(&body)
            .send()
            .await?;
        let reply: PlaceResponse = decode(response).await?;
        if reply.success {
            Ok(())
        } else {
            Err(ServiceError::Rejected(
                reply
                    .message
                    .unwrap_or_else(|| String::from("placement was not accepted")),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestion_response_parses_camel_case_payload() {
        let json = r#"{
            "success": true,
            "suggestion": {
                "itemId": "004",
                "containerId": "contA",
                "containerZone": "Crew Quarters",
                "position": {
                    "startCoordinates": {"width": 0, "depth": 0, "height": 0},
                    "endCoordinates": {"width": 10, "depth": 20, "height": 30}
                },
                "isPreferedZone": true
            }
        }"#;
        let response: SuggestionResponse = serde_json::from_str(json).expect("Should parse");
        match response.into_outcome().expect("Should convert") {
            SuggestionOutcome::Suggested(suggestion) => {
                assert_eq!(suggestion.container_id, "contA");
                assert!(suggestion.in_preferred_zone);
                assert_eq!(suggestion.region.end, Coordinates::new(10.0, 20.0, 30.0));
            }
            other => panic!("expected a suggestion, got {:?}", other),
        }
    }

    #[test]
    fn bad_item_records_are_skipped() {
        let records = vec![
            serde_json::json!({
                "item_id": "001",
                "name": "Food Packet",
                "dimensions": {"width": 10.0, "depth": 10.0, "height": 20.0},
                "mass": 5.0,
                "priority": 80,
                "usage_limit": 30,
                "preferred_zone": "Crew Quarters"
            }),
            serde_json::json!({
                "item_id": "002",
                "name": "Overrated",
                "dimensions": {"width": 1.0, "depth": 1.0, "height": 1.0},
                "mass": 1.0,
                "priority": 300,
                "usage_limit": 1,
                "preferred_zone": "Lab"
            }),
            serde_json::json!({"item_id": "003", "name": "No dimensions"}),
        ];
        let items: Vec<Item> = decode_records("item", records, Item::validate);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, "001");
    }

    #[test]
    fn unsuccessful_suggestion_becomes_no_placement() {
        let json = r#"{"success": false, "message": "No suitable placement found"}"#;
        let response: SuggestionResponse = serde_json::from_str(json).expect("Should parse");
        assert_eq!(
            response.into_outcome().expect("Should convert"),
            SuggestionOutcome::NoPlacement {
                message: Some("No suitable placement found".to_string())
            }
        );
    }

    #[test]
    fn inverted_suggested_box_is_a_decode_error() {
        let json = r#"{
            "success": true,
            "suggestion": {
                "itemId": "004",
                "containerId": "contA",
                "position": {
                    "startCoordinates": {"width": 10, "depth": 0, "height": 0},
                    "endCoordinates": {"width": 0, "depth": 20, "height": 30}
                }
            }
        }"#;
        let response: SuggestionResponse = serde_json::from_str(json).expect("Should parse");
        assert!(matches!(
            response.into_outcome(),
            Err(ServiceError::Decode(_))
        ));
    }

    #[test]
    fn place_request_uses_mixed_casing_of_the_service() {
        let request = PlaceRequest {
            item_id: "004".into(),
            user_id: "user1".into(),
            timestamp: "2025-01-01T00:00:00Z".into(),
            container_id: "contA".into(),
            position: PlacementBox::new(Coordinates::origin(), Coordinates::new(1.0, 2.0, 3.0))
                .into(),
        };
        let value = serde_json::to_value(&request).expect("Should serialize");
        assert_eq!(value["itemId"], "004");
        assert_eq!(value["containerId"], "contA");
        assert_eq!(value["position"]["end_coordinates"]["height"], 3.0);
    }

    #[test]
    fn suggestion_url_escapes_item_id() {
        let backend = HttpPlacementBackend::new(ServiceConfig::new("http://localhost:8000/api/"))
            .expect("client should build");
        let url = backend.suggestion_url("item 7/b").expect("url should build");
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/placement/suggestion/item%207%2Fb"
        );
    }
}
