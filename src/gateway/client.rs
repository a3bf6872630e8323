//! Configuration gateway: domain operations over the service API
//!
//! Every operation issues exactly one request and returns an [`Outcome`].
//! Failures are logged, reported once on the [`NotificationBus`], and handed
//! back as `Outcome::Failed`; nothing is ever returned as an error.

use super::models::*;
use super::outcome::{Failure, Outcome};
use super::transport::{ApiRequest, Transport};
use crate::events::NotificationBus;
use serde::de::{DeserializeOwned, Error as _};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Title attached to every failure notification
pub const FAILURE_TITLE: &str = "Configuration service";

/// Stateless façade over the configuration service.
///
/// Cheap to clone; clones share the transport and the bus. Operations are
/// independent and may run concurrently. Nothing is cached: read again after a
/// successful mutation to observe the new state.
#[derive(Clone)]
pub struct ConfigGateway {
    transport: Arc<dyn Transport>,
    bus: NotificationBus,
}

impl ConfigGateway {
    pub fn new(transport: Arc<dyn Transport>, bus: NotificationBus) -> Self {
        Self { transport, bus }
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    /// All profiles, highest precedence first
    pub async fn get_profiles(&self) -> Outcome<Vec<Profile>> {
        self.call(ApiRequest::get("/profiles")).await
    }

    /// Active profiles only, highest precedence first
    pub async fn get_active_profiles(&self) -> Outcome<Vec<Profile>> {
        self.call(ApiRequest::get("/profiles?active_only")).await
    }

    /// Create a profile at the end of the order.
    ///
    /// `Ok(None)` when the service acknowledges without echoing the profile.
    pub async fn add_profile(&self, name: &str, active: bool) -> Outcome<Option<Profile>> {
        let body = to_body(&NewProfile { name, active });
        self.call(ApiRequest::post("/profiles").with_body(body)).await
    }

    pub async fn rename_profile(&self, id: &ProfileId, new_name: &str) -> Outcome<Value> {
        let body = to_body(&Rename { new_name });
        let path = format!("{}/rename", profile_path(id));
        self.call(ApiRequest::post(path).with_body(body)).await
    }

    pub async fn delete_profile(&self, id: &ProfileId) -> Outcome<Value> {
        self.call(ApiRequest::delete(profile_path(id))).await
    }

    /// Swap with the previous profile. Moving the first profile is up to the service.
    pub async fn move_profile_up(&self, id: &ProfileId) -> Outcome<Value> {
        let path = format!("{}/up", profile_path(id));
        self.call(ApiRequest::post(path)).await
    }

    /// Swap with the next profile. Moving the last profile is up to the service.
    pub async fn move_profile_down(&self, id: &ProfileId) -> Outcome<Value> {
        let path = format!("{}/down", profile_path(id));
        self.call(ApiRequest::post(path)).await
    }

    pub async fn activate_profile(&self, id: &ProfileId) -> Outcome<Value> {
        let path = format!("{}/activate", profile_path(id));
        self.call(ApiRequest::post(path)).await
    }

    pub async fn deactivate_profile(&self, id: &ProfileId) -> Outcome<Value> {
        let path = format!("{}/deactivate", profile_path(id));
        self.call(ApiRequest::post(path)).await
    }

    // ========================================================================
    // Properties of one profile
    // ========================================================================

    pub async fn get_profile_properties(&self, profile: &ProfileId) -> Outcome<Vec<Property>> {
        self.call(ApiRequest::get(config_path(profile))).await
    }

    /// Create a property. The service rejects a name already present in the profile.
    pub async fn add_profile_property(
        &self,
        profile: &ProfileId,
        name: &str,
        value: &str,
    ) -> Outcome<Value> {
        let body = to_body(&NewProperty { name, value });
        let path = config_path(profile);
        self.call(ApiRequest::put(path).with_body(body)).await
    }

    /// Replace a property's value; its identity is unchanged.
    pub async fn set_profile_property(
        &self,
        profile: &ProfileId,
        property: &PropertyId,
        value: &str,
    ) -> Outcome<Value> {
        let body = to_body(&ValueUpdate { value });
        let path = property_path(profile, property);
        self.call(ApiRequest::post(path).with_body(body)).await
    }

    /// Rename a property. The old `property` id is invalid afterwards.
    pub async fn rename_profile_property(
        &self,
        profile: &ProfileId,
        property: &PropertyId,
        new_name: &str,
    ) -> Outcome<Value> {
        let body = to_body(&Rename { new_name });
        let path = format!("{}/rename", property_path(profile, property));
        self.call(ApiRequest::post(path).with_body(body)).await
    }

    pub async fn delete_profile_property(
        &self,
        profile: &ProfileId,
        property: &PropertyId,
    ) -> Outcome<Value> {
        let path = property_path(profile, property);
        self.call(ApiRequest::delete(path)).await
    }

    // ========================================================================
    // Effective configuration
    // ========================================================================

    /// Precedence-resolved properties, as computed by the service
    pub async fn get_all_properties(&self, active_only: bool) -> Outcome<Vec<Property>> {
        let path = if active_only {
            "/config?active_only"
        } else {
            "/config"
        };
        self.call(ApiRequest::get(path)).await
    }

    /// Every profile's definition of `name`, highest precedence first
    pub async fn get_property_details(&self, name: &str) -> Outcome<PropertyDetails> {
        let body = to_body(&DetailsQuery { name });
        let request = ApiRequest::post("/config/details").with_body(body);
        self.call(request).await
    }

    // ========================================================================
    // Envelope handling
    // ========================================================================

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Outcome<T> {
        let method = request.method;
        let path = request.path.clone();
        debug!(method = %method, path = %path, "Sending request");

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    method = %method,
                    path = %path,
                    error = %e,
                    "Configuration service unreachable"
                );
                return self.fail(Failure::Connectivity {
                    reason: e.to_string(),
                });
            }
        };

        if !response.is_success() {
            warn!(
                method = %method,
                path = %path,
                status = response.status,
                body = %response.body,
                "Configuration service rejected request"
            );
            return self.fail(Failure::Rejected {
                status: response.status,
            });
        }

        match unwrap_envelope(&response.body) {
            Ok(content) => Outcome::Ok(content),
            Err(e) => {
                error!(
                    method = %method,
                    path = %path,
                    status = response.status,
                    error = %e,
                    "Malformed response envelope"
                );
                self.fail(Failure::Malformed {
                    reason: e.to_string(),
                })
            }
        }
    }

    fn fail<T>(&self, failure: Failure) -> Outcome<T> {
        let message = failure.to_string();
        self.bus.emit(failure.level(), &message, Some(FAILURE_TITLE));
        Outcome::Failed(failure)
    }
}

impl std::fmt::Debug for ConfigGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigGateway")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

/// Extract `content` from the `{ "content": T }` envelope.
///
/// The key is required even when `T` admits null. An empty body counts as
/// `{ "content": null }`.
fn unwrap_envelope<T: DeserializeOwned>(body: &str) -> serde_json::Result<T> {
    if body.trim().is_empty() {
        return serde_json::from_value(Value::Null);
    }
    match serde_json::from_str::<Value>(body)? {
        Value::Object(mut envelope) => match envelope.remove("content") {
            Some(content) => serde_json::from_value(content),
            None => Err(serde_json::Error::missing_field("content")),
        },
        other => Err(serde_json::Error::custom(format!(
            "expected a response envelope, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn to_body<T: Serialize>(body: &T) -> Value {
    serde_json::to_value(body).unwrap_or(Value::Null)
}

fn profile_path(id: &ProfileId) -> String {
    format!("/profiles/{}", urlencoding::encode(id.as_str()))
}

fn config_path(id: &ProfileId) -> String {
    format!("{}/config", profile_path(id))
}

fn property_path(profile: &ProfileId, property: &PropertyId) -> String {
    format!(
        "{}/{}",
        config_path(profile),
        urlencoding::encode(property.as_str())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Level, Notification};
    use crate::gateway::mock::MockConfigService;
    use crate::gateway::transport::{ApiResponse, Method, TransportError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<Notification>>>;

    /// Transport that answers every request with one canned response
    struct Canned(Result<ApiResponse, String>);

    impl Canned {
        fn status(status: u16, body: impl Into<String>) -> Self {
            Self(Ok(ApiResponse::new(status, body)))
        }
    }

    #[async_trait]
    impl Transport for Canned {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            self.0.clone().map_err(|reason| TransportError::Unreachable {
                url: request.path,
                reason,
            })
        }
    }

    fn gateway_with(transport: impl Transport + 'static) -> (ConfigGateway, Seen) {
        let bus = NotificationBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.register_listener("toast", move |level, message, title| {
            let notification = Notification::new(level, message, title);
            sink.lock().unwrap().push(notification);
        })
        .unwrap();
        (ConfigGateway::new(Arc::new(transport), bus), seen)
    }

    #[test]
    fn test_unwrap_envelope_variants() {
        let list: Vec<u8> = unwrap_envelope(r#"{"content": [1, 2]}"#).unwrap();
        assert_eq!(list, vec![1, 2]);

        let raw: Value = unwrap_envelope("").unwrap();
        assert_eq!(raw, Value::Null);

        let maybe: Option<Profile> = unwrap_envelope("  ").unwrap();
        assert!(maybe.is_none());

        let explicit: Option<Profile> = unwrap_envelope(r#"{"content": null}"#).unwrap();
        assert!(explicit.is_none());

        assert!(unwrap_envelope::<Vec<u8>>("").is_err());
        assert!(unwrap_envelope::<Vec<u8>>(r#"{"data": []}"#).is_err());
        assert!(unwrap_envelope::<Value>("[1, 2]").is_err());
    }

    #[test]
    fn test_unwrap_envelope_requires_content_key_for_optional_payload() {
        let body = r#"{"data": {"id": "p2", "name": "staging", "active": true}}"#;

        let err = unwrap_envelope::<Option<Profile>>(body).unwrap_err();

        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn test_paths_percent_encode_ids() {
        let profile = ProfileId::new("team a/b");
        let prop = PropertyId::new("x?y");
        assert_eq!(profile_path(&profile), "/profiles/team%20a%2Fb");
        assert_eq!(
            property_path(&profile, &prop),
            "/profiles/team%20a%2Fb/config/x%3Fy"
        );
    }

    #[tokio::test]
    async fn test_success_passes_content_through_without_emission() {
        let content = json!([
            {"id": "p1", "name": "default", "active": true, "description": "base", "order": 0},
            {"id": "p2", "name": "local", "active": false, "properties_count": 3}
        ]);
        let body = json!({ "content": content }).to_string();
        let (gateway, seen) = gateway_with(Canned::status(200, body));

        let profiles = gateway.get_profiles().await.ok().unwrap();

        assert_eq!(serde_json::to_value(&profiles).unwrap(), content);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_emits_once_with_status() {
        let (gateway, seen) = gateway_with(Canned::status(500, "oops"));

        let outcome = gateway.get_profiles().await;

        assert_eq!(outcome, Outcome::Failed(Failure::Rejected { status: 500 }));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].level, Level::Error);
        assert!(seen[0].message.contains("500"));
        assert_eq!(seen[0].title.as_deref(), Some(FAILURE_TITLE));
    }

    #[tokio::test]
    async fn test_client_error_is_warning() {
        let (gateway, seen) = gateway_with(Canned::status(404, ""));

        let outcome = gateway.delete_profile(&ProfileId::new("gone")).await;

        assert_eq!(outcome.failure().and_then(Failure::status), Some(404));
        assert_eq!(seen.lock().unwrap()[0].level, Level::Warn);
    }

    #[tokio::test]
    async fn test_connectivity_failure_emits_generic_error() {
        let refused = Canned(Err("connection refused".into()));
        let (gateway, seen) = gateway_with(refused);

        let outcome = gateway.get_all_properties(true).await;

        assert!(matches!(
            outcome,
            Outcome::Failed(Failure::Connectivity { .. })
        ));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].level, Level::Error);
        assert!(seen[0].message.contains("Unable to reach"));
    }

    #[tokio::test]
    async fn test_malformed_body_emits_once() {
        let (gateway, seen) = gateway_with(Canned::status(200, "<html>"));

        let outcome = gateway.get_profile_properties(&ProfileId::new("1")).await;

        assert!(matches!(
            outcome,
            Outcome::Failed(Failure::Malformed { .. })
        ));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_profile_rejects_body_without_envelope() {
        let body = json!({"data": {"id": "p2", "name": "staging", "active": true}});
        let (gateway, seen) = gateway_with(Canned::status(200, body.to_string()));

        let outcome = gateway.add_profile("staging", true).await;

        assert!(matches!(
            outcome,
            Outcome::Failed(Failure::Malformed { .. })
        ));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].level, Level::Error);
    }

    #[tokio::test]
    async fn test_add_profile_unwraps_echoed_profile() {
        let content = json!({"id": "p2", "name": "staging", "active": true});
        let body = json!({ "content": content }).to_string();
        let (gateway, seen) = gateway_with(Canned::status(200, body));

        let outcome = gateway.add_profile("staging", true).await;
        let profile = outcome.ok().flatten().unwrap();

        assert_eq!(profile.id, ProfileId::new("p2"));
        assert_eq!(profile.name, "staging");
        assert!(profile.active);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_profile_accepts_empty_acknowledgement() {
        let (gateway, seen) = gateway_with(Canned::status(201, ""));

        assert_eq!(gateway.add_profile("qa", false).await, Outcome::Ok(None));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requests_match_service_api() {
        let service = Arc::new(
            MockConfigService::new()
                .with_profile("default", true, &[("x", "1")])
                .with_profile("local", true, &[]),
        );
        let gateway = ConfigGateway::new(service.clone(), NotificationBus::new());
        let p1 = ProfileId::new("1");
        let x = PropertyId::new("1");

        let _ = gateway.get_profiles().await;
        let _ = gateway.get_active_profiles().await;
        let _ = gateway.get_profile_properties(&p1).await;
        let _ = gateway.add_profile("qa", true).await;
        let _ = gateway.move_profile_down(&p1).await;
        let _ = gateway.move_profile_up(&p1).await;
        let _ = gateway.deactivate_profile(&p1).await;
        let _ = gateway.activate_profile(&p1).await;
        let _ = gateway.set_profile_property(&p1, &x, "2").await;
        let _ = gateway.rename_profile_property(&p1, &x, "y").await;
        let _ = gateway.add_profile_property(&p1, "z", "3").await;
        let _ = gateway
            .delete_profile_property(&p1, &PropertyId::new("3"))
            .await;
        let _ = gateway.get_all_properties(false).await;
        let _ = gateway.get_all_properties(true).await;
        let _ = gateway.get_property_details("y").await;
        let _ = gateway.rename_profile(&p1, "base").await;
        let _ = gateway.delete_profile(&ProfileId::new("3")).await;

        let seen: Vec<(Method, String, Option<Value>)> = service
            .requests()
            .await
            .into_iter()
            .map(|r| (r.method, r.path, r.body))
            .collect();
        let expected = vec![
            (Method::Get, "/profiles", None),
            (Method::Get, "/profiles?active_only", None),
            (Method::Get, "/profiles/1/config", None),
            (
                Method::Post,
                "/profiles",
                Some(json!({"name": "qa", "active": true})),
            ),
            (Method::Post, "/profiles/1/down", None),
            (Method::Post, "/profiles/1/up", None),
            (Method::Post, "/profiles/1/deactivate", None),
            (Method::Post, "/profiles/1/activate", None),
            (
                Method::Post,
                "/profiles/1/config/1",
                Some(json!({"value": "2"})),
            ),
            (
                Method::Post,
                "/profiles/1/config/1/rename",
                Some(json!({"new_name": "y"})),
            ),
            (
                Method::Put,
                "/profiles/1/config",
                Some(json!({"name": "z", "value": "3"})),
            ),
            (Method::Delete, "/profiles/1/config/3", None),
            (Method::Get, "/config", None),
            (Method::Get, "/config?active_only", None),
            (Method::Post, "/config/details", Some(json!({"name": "y"}))),
            (
                Method::Post,
                "/profiles/1/rename",
                Some(json!({"new_name": "base"})),
            ),
            (Method::Delete, "/profiles/3", None),
        ];
        let expected: Vec<(Method, String, Option<Value>)> = expected
            .into_iter()
            .map(|(m, p, b)| (m, p.to_string(), b))
            .collect();
        assert_eq!(seen, expected);
    }
}
