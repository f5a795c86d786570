//! Request handlers over the friendship ledger.
//!
//! Routing and envelopes only. Identity arrives pre-validated in the
//! `X-User-Id` header; this crate does not authenticate.

pub mod server;

pub use server::{HttpServeError, HttpServerConfig, serve_ledger};

use rapport_ledger::{EdgeStore, FriendshipLedger, LedgerError, ProfileDirectory, UserId};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use thiserror::Error;

pub const USER_HEADER: &str = "x-user-id";

/// A parsed request, independent of the socket it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub target: String,
    /// Header names lowercased.
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn acting_as(mut self, user: &str) -> Self {
        self.headers
            .insert(USER_HEADER.to_string(), user.to_string());
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = body.to_string().into_bytes();
        self
    }

    fn acting_user(&self) -> Option<UserId> {
        self.headers
            .get(USER_HEADER)
            .and_then(|raw| UserId::parse(raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    fn ok(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn failure(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "success": false, "message": message.into() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Healthz,
    ListFriends,
    SearchFriends(Option<String>),
    SendRequest,
    CancelRequest,
    AcceptRequest,
    RemoveFriend,
    FriendStatus,
}

impl Route {
    fn method(&self) -> &'static str {
        match self {
            Route::Healthz | Route::ListFriends | Route::SearchFriends(_) => "GET",
            Route::SendRequest
            | Route::CancelRequest
            | Route::AcceptRequest
            | Route::RemoveFriend
            | Route::FriendStatus => "POST",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
enum RouteError {
    #[error("not found: {0}")]
    NotFound(String),
}

/// Route one request through the ledger and build its response envelope.
pub fn handle_request<S>(ledger: &FriendshipLedger<S>, request: &HttpRequest) -> HttpResponse
where
    S: EdgeStore + ProfileDirectory,
{
    let route = match parse_route_target(&request.target) {
        Ok(route) => route,
        Err(RouteError::NotFound(msg)) => return HttpResponse::failure(404, msg),
    };

    if request.method != route.method() {
        return HttpResponse::failure(
            405,
            format!("method not allowed; use {}", route.method()),
        );
    }

    if route == Route::Healthz {
        return HttpResponse::ok(200, json!({ "ok": true }));
    }

    let Some(user) = request.acting_user() else {
        return HttpResponse::failure(401, format!("missing {USER_HEADER} header"));
    };

    let body = match parse_body(&request.body) {
        Ok(body) => body,
        Err(msg) => return HttpResponse::failure(400, msg),
    };

    match execute_route(ledger, route, &user, &body) {
        Ok(response) => response,
        Err(err) => ledger_error_response(&err),
    }
}

fn execute_route<S>(
    ledger: &FriendshipLedger<S>,
    route: Route,
    user: &UserId,
    body: &Value,
) -> Result<HttpResponse, LedgerError>
where
    S: EdgeStore + ProfileDirectory,
{
    let response = match route {
        Route::Healthz => HttpResponse::ok(200, json!({ "ok": true })),
        Route::ListFriends => {
            let friends = ledger.list_friends(user)?;
            HttpResponse::ok(
                200,
                json!({ "success": true, "count": friends.len(), "friends": friends }),
            )
        }
        Route::SearchFriends(query) => {
            let friends = ledger.search_friends(user, query.as_deref())?;
            HttpResponse::ok(200, json!({ "success": true, "friends": friends }))
        }
        Route::SendRequest => {
            let edge = ledger.send_request(user, body_id(body, "receiverId").as_ref())?;
            HttpResponse::ok(
                201,
                json!({
                    "success": true,
                    "message": "Friend request sent successfully",
                    "data": edge
                }),
            )
        }
        Route::CancelRequest => {
            ledger.cancel_request(user, body_id(body, "receiverId").as_ref())?;
            HttpResponse::ok(
                200,
                json!({ "success": true, "message": "Friend request canceled successfully" }),
            )
        }
        Route::AcceptRequest => {
            let edge = ledger.accept_request(user, body_id(body, "senderId").as_ref())?;
            HttpResponse::ok(
                200,
                json!({
                    "success": true,
                    "message": "Friend request accepted successfully",
                    "data": edge
                }),
            )
        }
        Route::RemoveFriend => {
            ledger.remove_friend(user, body_id(body, "friendId").as_ref())?;
            HttpResponse::ok(
                200,
                json!({ "success": true, "message": "Friend removed successfully" }),
            )
        }
        Route::FriendStatus => {
            let status = ledger.friendship_status(user, body_id(body, "friendId").as_ref())?;
            HttpResponse::ok(200, json!({ "success": true, "status": status }))
        }
    };
    Ok(response)
}

fn ledger_error_response(err: &LedgerError) -> HttpResponse {
    match err {
        LedgerError::InvalidArgument(msg) => HttpResponse::failure(400, capitalize(msg)),
        LedgerError::Conflict { .. } => HttpResponse::failure(400, capitalize(&err.to_string())),
        LedgerError::NotFound(msg) => HttpResponse::failure(404, capitalize(msg)),
        LedgerError::StoreFailure(source) => {
            log::error!("ledger store failure: {source}");
            HttpResponse::failure(500, "Internal server error")
        }
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn parse_body(raw: &[u8]) -> Result<Value, String> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(raw).map_err(|e| format!("malformed JSON body: {e}"))
}

fn body_id(body: &Value, field: &str) -> Option<UserId> {
    body.get(field)
        .and_then(Value::as_str)
        .and_then(UserId::parse)
}

fn parse_route_target(target: &str) -> Result<Route, RouteError> {
    let (path, query) = split_target(target);
    let params = parse_query_params(query);

    match path.trim_end_matches('/') {
        "/healthz" => Ok(Route::Healthz),
        "/friends" => Ok(Route::ListFriends),
        "/friends/search" => {
            // Older clients nest the text under `search`.
            let query = params
                .get("query")
                .or_else(|| params.get("search.query"))
                .or_else(|| params.get("search[query]"))
                .cloned();
            Ok(Route::SearchFriends(query))
        }
        "/friends/request" => Ok(Route::SendRequest),
        "/friends/cancel" => Ok(Route::CancelRequest),
        "/friends/accept" => Ok(Route::AcceptRequest),
        "/friends/remove" => Ok(Route::RemoveFriend),
        "/friends/status" => Ok(Route::FriendStatus),
        _ => Err(RouteError::NotFound(format!("unknown route: {path}"))),
    }
}

fn split_target(target: &str) -> (&str, &str) {
    match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    }
}

fn parse_query_params(query: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        let key = percent_decode(k);
        if key.is_empty() {
            continue;
        }
        out.insert(key, percent_decode(v));
    }
    out
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                if let (Some(h), Some(l)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    out.push(h * 16 + l);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapport_ledger::{SharedStore, UserProfile};

    fn ledger() -> FriendshipLedger<SharedStore> {
        let store = SharedStore::default();
        for (user, name, email) in [
            ("u-a", "Amy March", "amy@example.com"),
            ("u-b", "Jo March", "jo@example.com"),
        ] {
            let mut profile = UserProfile::new(user, name, email);
            profile.password = "secret-hash".to_string();
            store
                .upsert_profile(profile)
                .expect("profile seed should succeed");
        }
        FriendshipLedger::new(store)
    }

    fn post(target: &str, user: &str, body: Value) -> HttpRequest {
        HttpRequest::new("POST", target)
            .acting_as(user)
            .with_json(body)
    }

    fn get(target: &str, user: &str) -> HttpRequest {
        HttpRequest::new("GET", target).acting_as(user)
    }

    #[test]
    fn route_parsing_handles_nested_search_param() {
        let route = parse_route_target("/friends/search?search%5Bquery%5D=jo").expect("route");
        assert_eq!(route, Route::SearchFriends(Some("jo".to_string())));

        let route = parse_route_target("/friends/search?query=jo+m").expect("route");
        assert_eq!(route, Route::SearchFriends(Some("jo m".to_string())));

        let route = parse_route_target("/friends/search").expect("route");
        assert_eq!(route, Route::SearchFriends(None));
    }

    #[test]
    fn unknown_route_is_404() {
        let response = handle_request(&ledger(), &get("/enemies", "u-a"));
        assert_eq!(response.status, 404);
    }

    #[test]
    fn wrong_method_is_405() {
        let response = handle_request(&ledger(), &get("/friends/request", "u-a"));
        assert_eq!(response.status, 405);
    }

    #[test]
    fn missing_identity_is_401() {
        let response = handle_request(&ledger(), &HttpRequest::new("GET", "/friends"));
        assert_eq!(response.status, 401);
        assert_eq!(response.body["success"], false);
    }

    #[test]
    fn malformed_body_is_400() {
        let mut request = HttpRequest::new("POST", "/friends/request").acting_as("u-a");
        request.body = b"{receiverId:".to_vec();
        let response = handle_request(&ledger(), &request);
        assert_eq!(response.status, 400);
    }

    #[test]
    fn full_lifecycle_over_handlers() {
        let ledger = ledger();

        let sent = handle_request(
            &ledger,
            &post("/friends/request", "u-a", json!({ "receiverId": "u-b" })),
        );
        assert_eq!(sent.status, 201);
        assert_eq!(sent.body["data"]["status"], "pending");
        assert_eq!(sent.body["data"]["sender"], "u-a");

        let wrong_side = handle_request(
            &ledger,
            &post("/friends/accept", "u-a", json!({ "senderId": "u-b" })),
        );
        assert_eq!(wrong_side.status, 404);

        let accepted = handle_request(
            &ledger,
            &post("/friends/accept", "u-b", json!({ "senderId": "u-a" })),
        );
        assert_eq!(accepted.status, 200);
        assert_eq!(accepted.body["data"]["status"], "accepted");

        let listed = handle_request(&ledger, &get("/friends", "u-b"));
        assert_eq!(listed.status, 200);
        assert_eq!(listed.body["count"], 1);
        assert_eq!(listed.body["friends"][0]["id"], "u-a");
        assert!(listed.body["friends"][0].get("password").is_none());

        let searched = handle_request(&ledger, &get("/friends/search?query=AMY", "u-b"));
        assert_eq!(searched.status, 200);
        assert_eq!(searched.body["friends"][0]["fullName"], "Amy March");

        let removed = handle_request(
            &ledger,
            &post("/friends/remove", "u-a", json!({ "friendId": "u-b" })),
        );
        assert_eq!(removed.status, 200);

        let status = handle_request(
            &ledger,
            &post("/friends/status", "u-a", json!({ "friendId": "u-b" })),
        );
        assert_eq!(status.status, 404);
    }

    #[test]
    fn conflict_envelope_names_existing_status() {
        let ledger = ledger();
        let request = post("/friends/request", "u-a", json!({ "receiverId": "u-b" }));
        assert_eq!(handle_request(&ledger, &request).status, 201);

        let reverse = post("/friends/request", "u-b", json!({ "receiverId": "u-a" }));
        let response = handle_request(&ledger, &reverse);
        assert_eq!(response.status, 400);
        insta::assert_json_snapshot!(response.body, @r###"
        {
          "message": "Friend request already exists with status: pending",
          "success": false
        }
        "###);
    }

    #[test]
    fn status_envelope_reports_pending() {
        let ledger = ledger();
        let request = post("/friends/request", "u-a", json!({ "receiverId": "u-b" }));
        assert_eq!(handle_request(&ledger, &request).status, 201);

        let response = handle_request(
            &ledger,
            &post("/friends/status", "u-b", json!({ "friendId": "u-a" })),
        );
        assert_eq!(response.status, 200);
        insta::assert_json_snapshot!(response.body, @r###"
        {
          "status": "pending",
          "success": true
        }
        "###);
    }

    #[test]
    fn missing_receiver_is_400() {
        let response = handle_request(&ledger(), &post("/friends/request", "u-a", json!({})));
        assert_eq!(response.status, 400);
        assert_eq!(response.body["message"], "Receiver id is required");
    }

    #[test]
    fn empty_search_is_400() {
        let response = handle_request(&ledger(), &get("/friends/search?query=%20", "u-a"));
        assert_eq!(response.status, 400);
    }

    #[test]
    fn cancel_without_pending_is_404() {
        let response = handle_request(
            &ledger(),
            &post("/friends/cancel", "u-a", json!({ "receiverId": "u-b" })),
        );
        assert_eq!(response.status, 404);
        assert_eq!(
            response.body["message"],
            "No pending friend request found to cancel"
        );
    }

    #[test]
    fn percent_decode_works_for_common_forms() {
        assert_eq!(percent_decode("jo%40example.com"), "jo@example.com");
        assert_eq!(percent_decode("jo+march"), "jo march");
        assert_eq!(percent_decode("100%"), "100%");
    }

    #[test]
    fn store_failure_is_500_without_detail() {
        let unique = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "rapport-http-corrupt-{}-{unique}.jsonl",
            std::process::id()
        ));
        std::fs::write(&path, b"\xff\n").expect("fixture should write");

        let ledger = FriendshipLedger::new(rapport_ledger::JsonlStore::new(path.clone()));
        let response = handle_request(&ledger, &get("/friends", "u-a"));
        assert_eq!(response.status, 500);
        insta::assert_json_snapshot!(response.body, @r###"
        {
          "message": "Internal server error",
          "success": false
        }
        "###);

        let rendered = response.body.to_string();
        assert!(!rendered.contains(&path.display().to_string()));
        assert!(!rendered.contains("UTF-8"));

        let _ = std::fs::remove_file(path);
    }
}
