//! In-memory mock of the configuration service for testing without a server.
//!
//! Implements `Transport` by routing requests to an in-process model of the
//! service: ordered profiles, per-profile properties, precedence resolution.
//! Responses use the same `{content}` envelope and status codes as the real
//! service. Failures can be scripted with [`MockConfigService::fail_next`] and
//! [`MockConfigService::set_offline`].

use super::transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeSet, VecDeque};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct PropertyRecord {
    id: u64,
    name: String,
    value: String,
}

#[derive(Debug, Clone)]
struct ProfileRecord {
    id: u64,
    name: String,
    active: bool,
    properties: Vec<PropertyRecord>,
}

impl ProfileRecord {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "active": self.active,
            "properties_count": self.properties.len(),
        })
    }

    fn find(&self, name: &str) -> Option<&PropertyRecord> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Default)]
struct State {
    /// Highest precedence first
    profiles: Vec<ProfileRecord>,
    next_profile_id: u64,
    next_property_id: u64,
    scripted: VecDeque<u16>,
    offline: bool,
    requests: Vec<ApiRequest>,
}

impl State {
    fn profile_index(&self, id: &str) -> Option<usize> {
        let id: u64 = id.parse().ok()?;
        self.profiles.iter().position(|p| p.id == id)
    }

    fn allocate_profile_id(&mut self) -> u64 {
        self.next_profile_id += 1;
        self.next_profile_id
    }

    fn allocate_property_id(&mut self) -> u64 {
        self.next_property_id += 1;
        self.next_property_id
    }
}

/// In-memory configuration service.
///
/// Profiles seeded first take precedence. Ids are small integers assigned in
/// creation order, separately for profiles and properties.
///
/// # Example
///
/// ```rust
/// use config_toolkit::gateway::MockConfigService;
/// use config_toolkit::{ConfigGateway, NotificationBus};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let service = MockConfigService::new()
///     .with_profile("local", true, &[("port", "8080")])
///     .with_profile("default", true, &[("port", "80"), ("host", "example.org")]);
/// let gateway = ConfigGateway::new(Arc::new(service), NotificationBus::new());
///
/// let effective = gateway.get_all_properties(true).await.ok().unwrap();
/// let port = effective.iter().find(|p| p.name == "port").unwrap();
/// assert_eq!(port.value, "8080");
/// # });
/// ```
pub struct MockConfigService {
    state: Mutex<State>,
}

impl Default for MockConfigService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConfigService {
    /// Create an empty service with no profiles.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Seed a profile at the end of the order (lowest precedence).
    pub fn with_profile(mut self, name: &str, active: bool, properties: &[(&str, &str)]) -> Self {
        let state = self.state.get_mut();
        let id = state.allocate_profile_id();
        let properties = properties
            .iter()
            .map(|(name, value)| PropertyRecord {
                id: state.allocate_property_id(),
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect();
        state.profiles.push(ProfileRecord {
            id,
            name: name.to_string(),
            active,
            properties,
        });
        self
    }

    /// Answer the next request with `status` and an empty body, whatever it is.
    pub async fn fail_next(&self, status: u16) {
        self.state.lock().await.scripted.push_back(status);
    }

    /// While offline every request fails without a response.
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    /// Every request received so far, in arrival order
    pub async fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().await.requests.clone()
    }

    /// Profile names in current order
    pub async fn profile_names(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .profiles
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn content(status: u16, value: Value) -> ApiResponse {
    ApiResponse::new(status, json!({ "content": value }).to_string())
}

fn empty(status: u16) -> ApiResponse {
    ApiResponse::new(status, "")
}

fn not_found() -> ApiResponse {
    empty(404)
}

fn body_str<'a>(request: &'a ApiRequest, field: &str) -> Option<&'a str> {
    request.body.as_ref()?.get(field)?.as_str()
}

fn body_bool(request: &ApiRequest, field: &str) -> Option<bool> {
    request.body.as_ref()?.get(field)?.as_bool()
}

fn property_json(profile: u64, prop: &PropertyRecord) -> Value {
    json!({
        "id": prop.id,
        "name": prop.name,
        "value": prop.value,
        "profile": profile,
    })
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

fn route(state: &mut State, request: &ApiRequest) -> ApiResponse {
    let segments: Vec<String> = request
        .route()
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode)
        .collect();
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
    let active_only = request.has_query_flag("active_only");

    match (request.method, segments.as_slice()) {
        (Method::Get, ["profiles"]) => list_profiles(state, active_only),
        (Method::Post, ["profiles"]) => create_profile(state, request),
        (Method::Delete, ["profiles", id]) => delete_profile(state, id),
        (Method::Post, ["profiles", id, "rename"]) => rename_profile(state, id, request),
        (Method::Post, ["profiles", id, "up"]) => move_profile(state, id, -1),
        (Method::Post, ["profiles", id, "down"]) => move_profile(state, id, 1),
        (Method::Post, ["profiles", id, "activate"]) => set_active(state, id, true),
        (Method::Post, ["profiles", id, "deactivate"]) => set_active(state, id, false),
        (Method::Get, ["profiles", id, "config"]) => list_profile_properties(state, id),
        (Method::Put, ["profiles", id, "config"]) => create_property(state, id, request),
        (Method::Post, ["profiles", id, "config", prop]) => set_value(state, id, prop, request),
        (Method::Delete, ["profiles", id, "config", prop]) => delete_property(state, id, prop),
        (Method::Post, ["profiles", id, "config", prop, "rename"]) => {
            rename_property(state, id, prop, request)
        }
        (Method::Get, ["config"]) => effective_properties(state, active_only),
        (Method::Post, ["config", "details"]) => property_details(state, request),
        _ => not_found(),
    }
}

fn list_profiles(state: &State, active_only: bool) -> ApiResponse {
    let list: Vec<Value> = state
        .profiles
        .iter()
        .filter(|p| p.active || !active_only)
        .map(ProfileRecord::to_json)
        .collect();
    content(200, Value::Array(list))
}

fn create_profile(state: &mut State, request: &ApiRequest) -> ApiResponse {
    let Some(name) = body_str(request, "name") else {
        return empty(422);
    };
    if state.profiles.iter().any(|p| p.name == name) {
        return empty(409);
    }
    let id = state.allocate_profile_id();
    let profile = ProfileRecord {
        id,
        name: name.to_string(),
        active: body_bool(request, "active").unwrap_or(true),
        properties: Vec::new(),
    };
    let body = profile.to_json();
    state.profiles.push(profile);
    content(201, body)
}

fn delete_profile(state: &mut State, id: &str) -> ApiResponse {
    match state.profile_index(id) {
        Some(idx) => {
            state.profiles.remove(idx);
            empty(204)
        }
        None => not_found(),
    }
}

fn rename_profile(state: &mut State, id: &str, request: &ApiRequest) -> ApiResponse {
    let Some(new_name) = body_str(request, "new_name") else {
        return empty(422);
    };
    let Some(idx) = state.profile_index(id) else {
        return not_found();
    };
    if state
        .profiles
        .iter()
        .any(|p| p.name == new_name && p.id != state.profiles[idx].id)
    {
        return empty(409);
    }
    state.profiles[idx].name = new_name.to_string();
    empty(200)
}

/// Adjacent swap. Moving past either end is a conflict, not a clamp.
fn move_profile(state: &mut State, id: &str, direction: isize) -> ApiResponse {
    let Some(idx) = state.profile_index(id) else {
        return not_found();
    };
    let Some(target) = idx.checked_add_signed(direction) else {
        return empty(409);
    };
    if target >= state.profiles.len() {
        return empty(409);
    }
    state.profiles.swap(idx, target);
    empty(200)
}

fn set_active(state: &mut State, id: &str, active: bool) -> ApiResponse {
    match state.profile_index(id) {
        Some(idx) => {
            state.profiles[idx].active = active;
            empty(200)
        }
        None => not_found(),
    }
}

fn list_profile_properties(state: &State, id: &str) -> ApiResponse {
    let Some(idx) = state.profile_index(id) else {
        return not_found();
    };
    let profile = &state.profiles[idx];
    let list: Vec<Value> = profile
        .properties
        .iter()
        .map(|p| property_json(profile.id, p))
        .collect();
    content(200, Value::Array(list))
}

fn create_property(state: &mut State, id: &str, request: &ApiRequest) -> ApiResponse {
    let Some(name) = body_str(request, "name") else {
        return empty(422);
    };
    let value = body_str(request, "value").unwrap_or_default().to_string();
    let Some(idx) = state.profile_index(id) else {
        return not_found();
    };
    if state.profiles[idx].find(name).is_some() {
        return empty(409);
    }
    let prop = PropertyRecord {
        id: state.allocate_property_id(),
        name: name.to_string(),
        value,
    };
    let body = property_json(state.profiles[idx].id, &prop);
    state.profiles[idx].properties.push(prop);
    content(201, body)
}

fn find_property(state: &State, id: &str, prop: &str) -> Option<(usize, usize)> {
    let idx = state.profile_index(id)?;
    let prop: u64 = prop.parse().ok()?;
    let pos = state.profiles[idx]
        .properties
        .iter()
        .position(|p| p.id == prop)?;
    Some((idx, pos))
}

fn set_value(state: &mut State, id: &str, prop: &str, request: &ApiRequest) -> ApiResponse {
    let Some(value) = body_str(request, "value") else {
        return empty(422);
    };
    let Some((idx, pos)) = find_property(state, id, prop) else {
        return not_found();
    };
    state.profiles[idx].properties[pos].value = value.to_string();
    empty(200)
}

fn delete_property(state: &mut State, id: &str, prop: &str) -> ApiResponse {
    let Some((idx, pos)) = find_property(state, id, prop) else {
        return not_found();
    };
    state.profiles[idx].properties.remove(pos);
    empty(200)
}

fn rename_property(state: &mut State, id: &str, prop: &str, request: &ApiRequest) -> ApiResponse {
    let Some(new_name) = body_str(request, "new_name").map(str::to_string) else {
        return empty(422);
    };
    let Some((idx, pos)) = find_property(state, id, prop) else {
        return not_found();
    };
    if state.profiles[idx].find(&new_name).is_some() {
        return empty(409);
    }
    let new_id = state.allocate_property_id();
    let profile = &mut state.profiles[idx];
    let record = &mut profile.properties[pos];
    record.id = new_id;
    record.name = new_name;
    content(200, property_json(profile.id, record))
}

/// First profile in order that defines each name; inactive profiles are
/// skipped when `active_only` is set.
fn effective_properties(state: &State, active_only: bool) -> ApiResponse {
    let names: BTreeSet<&str> = state
        .profiles
        .iter()
        .flat_map(|p| p.properties.iter().map(|prop| prop.name.as_str()))
        .collect();

    let list: Vec<Value> = names
        .into_iter()
        .filter_map(|name| {
            state
                .profiles
                .iter()
                .filter(|p| p.active || !active_only)
                .find_map(|p| p.find(name).map(|prop| (p, prop)))
        })
        .map(|(p, prop)| property_json(p.id, prop))
        .collect();
    content(200, Value::Array(list))
}

fn property_details(state: &State, request: &ApiRequest) -> ApiResponse {
    let Some(name) = body_str(request, "name") else {
        return empty(422);
    };
    let mut chain = state.profiles.iter().filter_map(|p| {
        p.find(name).map(|prop| {
            json!({
                "id": prop.id,
                "name": prop.name,
                "value": prop.value,
                "profileName": p.name,
                "active": p.active,
            })
        })
    });

    let Some(mut first) = chain.next() else {
        return not_found();
    };
    first["ancestors"] = Value::Array(chain.collect());
    content(200, first)
}

#[async_trait]
impl Transport for MockConfigService {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut state = self.state.lock().await;
        state.requests.push(request.clone());

        if state.offline {
            return Err(TransportError::Unreachable {
                url: request.path,
                reason: "service offline".to_string(),
            });
        }
        if let Some(status) = state.scripted.pop_front() {
            return Ok(empty(status));
        }
        Ok(route(&mut state, &request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(response: &ApiResponse) -> Value {
        let body: Value = serde_json::from_str(&response.body).unwrap();
        body["content"].clone()
    }

    async fn send(service: &MockConfigService, request: ApiRequest) -> ApiResponse {
        service.send(request).await.unwrap()
    }

    async fn get_status(service: &MockConfigService, path: &str) -> u16 {
        send(service, ApiRequest::get(path)).await.status
    }

    async fn post_status(service: &MockConfigService, path: &str) -> u16 {
        send(service, ApiRequest::post(path)).await.status
    }

    async fn get_content(service: &MockConfigService, path: &str) -> Value {
        parse(&send(service, ApiRequest::get(path)).await)
    }

    fn post_json(path: &str, body: Value) -> ApiRequest {
        ApiRequest::post(path).with_body(body)
    }

    #[tokio::test]
    async fn test_create_appends_and_rejects_duplicate_names() {
        let service = MockConfigService::new().with_profile("default", true, &[]);

        let body = json!({"name": "local", "active": false});
        let created = send(&service, post_json("/profiles", body)).await;
        assert_eq!(created.status, 201);
        assert_eq!(parse(&created)["name"], "local");

        let body = json!({"name": "local", "active": true});
        let dup = send(&service, post_json("/profiles", body)).await;
        assert_eq!(dup.status, 409);
        assert_eq!(service.profile_names().await, vec!["default", "local"]);
    }

    #[tokio::test]
    async fn test_move_is_adjacent_swap_with_boundary_conflict() {
        let service = MockConfigService::new()
            .with_profile("a", true, &[])
            .with_profile("b", true, &[])
            .with_profile("c", true, &[]);

        assert_eq!(post_status(&service, "/profiles/3/up").await, 200);
        assert_eq!(service.profile_names().await, vec!["a", "c", "b"]);

        assert_eq!(post_status(&service, "/profiles/1/up").await, 409);
        assert_eq!(post_status(&service, "/profiles/2/down").await, 409);
        assert_eq!(post_status(&service, "/profiles/9/down").await, 404);
        assert_eq!(service.profile_names().await, vec!["a", "c", "b"]);
    }

    #[tokio::test]
    async fn test_deactivate_keeps_position() {
        let service = MockConfigService::new()
            .with_profile("a", true, &[])
            .with_profile("b", true, &[]);

        post_status(&service, "/profiles/1/deactivate").await;

        let all = get_content(&service, "/profiles").await;
        assert_eq!(all[0]["name"], "a");
        assert_eq!(all[0]["active"], false);

        let active = get_content(&service, "/profiles?active_only").await;
        assert_eq!(active.as_array().unwrap().len(), 1);
        assert_eq!(active[0]["name"], "b");
    }

    #[tokio::test]
    async fn test_effective_view_takes_first_defining_profile() {
        let service = MockConfigService::new()
            .with_profile("local", false, &[("timeout", "5")])
            .with_profile("staging", true, &[("timeout", "30"), ("host", "stg")])
            .with_profile("default", true, &[("timeout", "60"), ("port", "80")]);

        let active = get_content(&service, "/config?active_only").await;
        let pairs: Vec<(&str, &str)> = active
            .as_array()
            .unwrap()
            .iter()
            .map(|p| (p["name"].as_str().unwrap(), p["value"].as_str().unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![("host", "stg"), ("port", "80"), ("timeout", "30")]
        );

        let all = get_content(&service, "/config").await;
        let timeout = all
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == "timeout")
            .unwrap();
        assert_eq!(timeout["value"], "5");
    }

    #[tokio::test]
    async fn test_details_lists_chain_in_precedence_order() {
        let service = MockConfigService::new()
            .with_profile("local", false, &[("timeout", "5")])
            .with_profile("default", true, &[("timeout", "60")]);

        let query = post_json("/config/details", json!({"name": "timeout"}));
        let details = parse(&send(&service, query).await);
        assert_eq!(details["profileName"], "local");
        assert_eq!(details["active"], false);
        assert_eq!(details["ancestors"][0]["profileName"], "default");

        let query = post_json("/config/details", json!({"name": "nope"}));
        assert_eq!(send(&service, query).await.status, 404);
    }

    #[tokio::test]
    async fn test_rename_property_assigns_new_identity() {
        let service = MockConfigService::new()
            .with_profile("a", true, &[("old", "v")]);

        let body = json!({"new_name": "new"});
        let rename = post_json("/profiles/1/config/1/rename", body);
        let renamed = send(&service, rename).await;
        assert_eq!(renamed.status, 200);
        assert_eq!(parse(&renamed)["id"], 2);
        assert_eq!(parse(&renamed)["profile"], 1);

        let update = post_json("/profiles/1/config/1", json!({"value": "x"}));
        let stale = send(&service, update).await;
        assert_eq!(stale.status, 404);
    }

    #[tokio::test]
    async fn test_scripted_failures_and_offline() {
        let service = MockConfigService::new();
        service.fail_next(500).await;

        assert_eq!(get_status(&service, "/profiles").await, 500);
        assert_eq!(get_status(&service, "/profiles").await, 200);

        service.set_offline(true).await;
        assert!(service.send(ApiRequest::get("/profiles")).await.is_err());
        assert_eq!(service.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let service = MockConfigService::new();
        assert_eq!(post_status(&service, "/nope").await, 404);
    }
}
