//! Home Assistant REST client.
//!
//! Implements [`RemoteStateClient`] over the two endpoints the bridge
//! needs:
//!
//! - `GET  /api/states/{entity_id}` for the reconciliation and post-toggle
//!   state reads;
//! - `POST /api/services/{domain}/{service}` for key presses, where the
//!   service is `toggle` for stateful domains and `turn_on` for one-shot
//!   ones (scenes, scripts).
//!
//! Per the seam contract, nothing here returns an error: failures are
//! logged with their detail and degrade to `Unknown` / `false`.

use anyhow::Context;
use async_trait::async_trait;
use keybridge_core::{EntityId, EntityState};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::remote::RemoteStateClient;
use crate::domain::BridgeConfig;

/// The slice of a state response the bridge cares about.  Home Assistant
/// sends much more (attributes, timestamps); everything else is ignored.
#[derive(Debug, Deserialize)]
struct StateBody {
    state: String,
}

#[derive(Debug, Serialize)]
struct ServiceCallBody<'a> {
    entity_id: &'a str,
}

/// REST client for one Home Assistant instance.
pub struct HaClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl HaClient {
    /// Builds the client with the configured per-request timeout baked into
    /// the connection pool.
    ///
    /// # Errors
    ///
    /// Fails only if the underlying HTTP client cannot be constructed.
    pub fn new(config: &BridgeConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build the Home Assistant HTTP client")?;

        Ok(Self {
            base_url: config.ha_url.clone(),
            token: config.ha_token.clone(),
            http,
        })
    }
}

#[async_trait]
impl RemoteStateClient for HaClient {
    async fn get_state(&self, entity: &EntityId) -> EntityState {
        let url = format!("{}/api/states/{}", self.base_url, entity.as_str());

        let response = match self.http.get(&url).bearer_auth(&self.token).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("state query for {entity} failed: {e}");
                return EntityState::Unknown;
            }
        };

        if response.status() != StatusCode::OK {
            warn!(
                "state query for {entity} returned HTTP {}",
                response.status()
            );
            return EntityState::Unknown;
        }

        match response.json::<StateBody>().await {
            Ok(body) => {
                debug!("{entity} is {:?}", body.state);
                EntityState::from_remote(Some(&body.state))
            }
            Err(e) => {
                warn!("state response for {entity} was unreadable: {e}");
                EntityState::Unknown
            }
        }
    }

    async fn invoke(&self, entity: &EntityId) -> bool {
        let domain = entity.domain();
        let service = entity.activation_service();
        let url = format!("{}/api/services/{domain}/{service}", self.base_url);
        let body = ServiceCallBody {
            entity_id: entity.as_str(),
        };

        match self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status() == StatusCode::OK => {
                debug!("{domain}.{service} invoked for {entity}");
                true
            }
            Ok(response) => {
                warn!(
                    "{domain}.{service} for {entity} returned HTTP {}",
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!("{domain}.{service} for {entity} failed: {e}");
                false
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> HaClient {
        HaClient::new(&BridgeConfig {
            ha_url: server.uri(),
            ha_token: "test-token".to_string(),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_state_maps_on_and_off() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/states/switch.desk_lamp"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"entity_id": "switch.desk_lamp", "state": "on"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/states/switch.fan"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"entity_id": "switch.fan", "state": "off"})),
            )
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        // Act / Assert
        assert_eq!(
            client.get_state(&EntityId::from("switch.desk_lamp")).await,
            EntityState::On
        );
        assert_eq!(
            client.get_state(&EntityId::from("switch.fan")).await,
            EntityState::Off
        );
    }

    #[tokio::test]
    async fn test_get_state_treats_other_state_strings_as_off() {
        // "unavailable", "idle", dimmer percentages: anything that is not
        // exactly "on" reads as off.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/states/media_player.tv"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"state": "unavailable"})),
            )
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        assert_eq!(
            client.get_state(&EntityId::from("media_player.tv")).await,
            EntityState::Off
        );
    }

    #[tokio::test]
    async fn test_get_state_degrades_missing_entities_to_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        assert_eq!(
            client.get_state(&EntityId::from("switch.gone")).await,
            EntityState::Unknown
        );
    }

    #[tokio::test]
    async fn test_get_state_degrades_malformed_bodies_to_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        assert_eq!(
            client.get_state(&EntityId::from("switch.desk_lamp")).await,
            EntityState::Unknown
        );
    }

    #[tokio::test]
    async fn test_get_state_degrades_unreachable_hosts_to_unknown() {
        // Nothing listens on this port; the request fails at connect time.
        let client = HaClient::new(&BridgeConfig {
            ha_url: "http://127.0.0.1:1".to_string(),
            ha_token: "test-token".to_string(),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            client.get_state(&EntityId::from("switch.desk_lamp")).await,
            EntityState::Unknown
        );
    }

    #[tokio::test]
    async fn test_invoke_toggles_stateful_domains() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/services/switch/toggle"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_json(json!({"entity_id": "switch.desk_lamp"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        assert!(client.invoke(&EntityId::from("switch.desk_lamp")).await);
    }

    #[tokio::test]
    async fn test_invoke_turns_on_one_shot_domains() {
        // Scenes have no off state; toggling one is meaningless.
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/services/scene/turn_on"))
            .and(body_json(json!({"entity_id": "scene.movie_night"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        assert!(client.invoke(&EntityId::from("scene.movie_night")).await);
    }

    #[tokio::test]
    async fn test_invoke_reports_failure_on_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        assert!(!client.invoke(&EntityId::from("switch.desk_lamp")).await);
    }

    #[tokio::test]
    async fn test_invoke_reports_failure_on_unreachable_hosts() {
        let client = HaClient::new(&BridgeConfig {
            ha_url: "http://127.0.0.1:1".to_string(),
            ha_token: "test-token".to_string(),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();

        assert!(!client.invoke(&EntityId::from("switch.desk_lamp")).await);
    }
}
