//! HTTP interface of the budget server.
//!
//! Session endpoints, the per-user data store, calendar views and the client
//! log sink live under `/api`. Every other path is served from the static
//! directory, with `index.html` as the single-page app fallback.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use shared::{BudgetData, DataEntry, LogEntry, LogResponse, LoginRequest, UserResponse};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, error, info, warn};

use crate::auth::{expired_session_cookie, session_cookie, session_token, AuthService, CurrentUser};
use crate::config::ServerConfig;
use crate::domain::{BudgetError, BudgetService, CalendarService};

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub budget_service: BudgetService,
    pub calendar_service: CalendarService,
    pub auth_service: AuthService,
}

impl AppState {
    pub fn new(
        budget_service: BudgetService,
        calendar_service: CalendarService,
        auth_service: AuthService,
    ) -> Self {
        Self {
            budget_service,
            calendar_service,
            auth_service,
        }
    }
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, config: &ServerConfig) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);
    match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => warn!("Ignoring invalid CORS origin {:?}", config.cors_origin),
    }

    let api_routes = Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/data", get(get_data).put(put_data))
        .route("/data/:key", get(get_entry).put(put_entry).delete(delete_entry))
        .route("/calendar/month", get(calendar_month))
        .route("/calendar/day", get(calendar_day))
        .route("/calendar/week", get(calendar_week))
        .route("/logs", post(log_message))
        .fallback(api_not_found);

    let index = config.static_dir.join("index.html");
    let static_files = ServeDir::new(&config.static_dir).fallback(ServeFile::new(index));

    Router::new()
        .nest("/api", api_routes)
        .fallback_service(static_files)
        .layer(cors)
        .with_state(app_state)
}

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}

fn budget_error_response(e: BudgetError) -> axum::response::Response {
    match e {
        BudgetError::InvalidKey(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        BudgetError::Storage(e) => {
            error!("Storage error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Storage error").into_response()
        }
    }
}

/// Axum handler function for POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> impl IntoResponse {
    info!("POST /api/login - user: {}", request.username);

    match state.auth_service.login(&request).await {
        Ok((token, user)) => (
            StatusCode::OK,
            [(header::SET_COOKIE, session_cookie(&token, state.auth_service.session_ttl()))],
            Json(user),
        )
            .into_response(),
        Err(e) => (StatusCode::UNAUTHORIZED, e.to_string()).into_response(),
    }
}

/// Axum handler function for POST /api/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    info!("POST /api/logout");

    if let Some(token) = session_token(&headers) {
        state.auth_service.logout(&token).await;
    }
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, expired_session_cookie())],
    )
}

/// Axum handler function for GET /api/me
pub async fn me(CurrentUser(username): CurrentUser) -> impl IntoResponse {
    Json(UserResponse { username })
}

/// Axum handler function for GET /api/data
pub async fn get_data(
    State(state): State<AppState>,
    CurrentUser(username): CurrentUser,
) -> impl IntoResponse {
    info!("GET /api/data - user: {}", username);

    match state.budget_service.load(&username).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => budget_error_response(e),
    }
}

/// Axum handler function for PUT /api/data
pub async fn put_data(
    State(state): State<AppState>,
    CurrentUser(username): CurrentUser,
    Json(data): Json<BudgetData>,
) -> impl IntoResponse {
    info!("PUT /api/data - user: {}, {} entries", username, data.len());

    match state.budget_service.save(&username, &data).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => budget_error_response(e),
    }
}

/// Axum handler function for GET /api/data/:key
pub async fn get_entry(
    State(state): State<AppState>,
    CurrentUser(username): CurrentUser,
    Path(key): Path<String>,
) -> impl IntoResponse {
    info!("GET /api/data/{} - user: {}", key, username);

    match state.budget_service.get_day(&username, &key).await {
        Ok(Some(value)) => (StatusCode::OK, Json(DataEntry { key, value })).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Key not found").into_response(),
        Err(e) => budget_error_response(e),
    }
}

/// Axum handler function for PUT /api/data/:key
pub async fn put_entry(
    State(state): State<AppState>,
    CurrentUser(username): CurrentUser,
    Path(key): Path<String>,
    Json(value): Json<serde_json::Value>,
) -> impl IntoResponse {
    info!("PUT /api/data/{} - user: {}", key, username);

    match state.budget_service.put_day(&username, &key, &value).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => budget_error_response(e),
    }
}

/// Axum handler function for DELETE /api/data/:key
pub async fn delete_entry(
    State(state): State<AppState>,
    CurrentUser(username): CurrentUser,
    Path(key): Path<String>,
) -> impl IntoResponse {
    info!("DELETE /api/data/{} - user: {}", key, username);

    match state.budget_service.delete_day(&username, &key).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Key not found").into_response(),
        Err(e) => budget_error_response(e),
    }
}

/// Query parameters for the calendar endpoints
#[derive(Deserialize, Debug)]
pub struct CalendarQuery {
    /// ISO date; today when absent
    pub date: Option<String>,
}

/// Axum handler function for GET /api/calendar/month
pub async fn calendar_month(
    State(state): State<AppState>,
    Query(query): Query<CalendarQuery>,
) -> impl IntoResponse {
    debug!("GET /api/calendar/month - query: {:?}", query);

    match state.calendar_service.month_view(query.date.as_deref()) {
        Ok(month) => (StatusCode::OK, Json(month)).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

/// Axum handler function for GET /api/calendar/day
pub async fn calendar_day(
    State(state): State<AppState>,
    Query(query): Query<CalendarQuery>,
) -> impl IntoResponse {
    debug!("GET /api/calendar/day - query: {:?}", query);

    match state.calendar_service.day_view(query.date.as_deref()) {
        Ok(day) => (StatusCode::OK, Json(day)).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

/// Axum handler function for GET /api/calendar/week
pub async fn calendar_week(
    State(state): State<AppState>,
    Query(query): Query<CalendarQuery>,
) -> impl IntoResponse {
    debug!("GET /api/calendar/week - query: {:?}", query);

    match state.calendar_service.week_view(query.date.as_deref()) {
        Ok(week) => (StatusCode::OK, Json(week)).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

/// Axum handler function for POST /api/logs
pub async fn log_message(Json(entry): Json<LogEntry>) -> Json<LogResponse> {
    let component = entry.component.as_deref().unwrap_or("frontend");
    let message = format!("[{}] {}", component, entry.message);

    match entry.level.to_lowercase().as_str() {
        "debug" => debug!("{}", message),
        "warn" => warn!("{}", message),
        "error" => error!("{}", message),
        _ => info!("{}", message),
    }

    Json(LogResponse { success: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserCredentials;
    use crate::db::DbConnection;
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::Response;
    use serde_json::{json, Value};
    use shared::{from_iso_date, CALENDAR_GRID_CELLS};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_app_with_config(config: ServerConfig) -> Router {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        let calendar = CalendarService::with_today(from_iso_date("2025-06-13").unwrap());
        let state = AppState::new(
            BudgetService::new(Arc::new(db), calendar.clone()),
            calendar,
            AuthService::new(&config.users, config.session_ttl()),
        );
        create_router(state, &config)
    }

    async fn test_app() -> Router {
        let config = ServerConfig {
            users: vec![
                UserCredentials {
                    username: "alice".to_string(),
                    password: "secret".to_string(),
                },
                UserCredentials {
                    username: "bob".to_string(),
                    password: "hunter2".to_string(),
                },
            ],
            ..ServerConfig::default()
        };
        test_app_with_config(config).await
    }

    fn request(method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Log in and return the `session=...` cookie pair
    async fn login_as(app: &Router, username: &str, password: &str) -> String {
        let response = send(
            app,
            request(
                Method::POST,
                "/api/login",
                None,
                Some(json!({ "username": username, "password": password })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_login_me_logout() {
        let app = test_app().await;

        let cookie = login_as(&app, "alice", "secret").await;
        assert!(cookie.starts_with("session="));

        let response = send(&app, request(Method::GET, "/api/me", Some(&cookie), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "username": "alice" }));

        let response = send(&app, request(Method::POST, "/api/logout", Some(&cookie), None)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, request(Method::GET, "/api/me", Some(&cookie), None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let app = test_app().await;

        let response = send(
            &app,
            request(
                Method::POST,
                "/api/login",
                None,
                Some(json!({ "username": "alice", "password": "nope" })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_data_requires_session() {
        let app = test_app().await;

        let response = send(&app, request(Method::GET, "/api/data", None, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &app,
            request(Method::GET, "/api/data", Some("session=forged"), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_whole_mapping_round_trip() {
        let app = test_app().await;
        let cookie = login_as(&app, "alice", "secret").await;

        let response = send(&app, request(Method::GET, "/api/data", Some(&cookie), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({}));

        let data = json!({
            "2025-06-12": { "purchases": [{ "label": "pain", "amount": "1,20" }] },
            "2025-06-13": { "purchases": [] },
        });
        let response = send(&app, request(Method::PUT, "/api/data", Some(&cookie), Some(data.clone()))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, request(Method::GET, "/api/data", Some(&cookie), None)).await;
        assert_eq!(body_json(response).await, data);
    }

    #[tokio::test]
    async fn test_entries_are_per_user() {
        let app = test_app().await;
        let alice = login_as(&app, "alice", "secret").await;
        let bob = login_as(&app, "bob", "hunter2").await;

        let response = send(
            &app,
            request(Method::PUT, "/api/data/2025-06-13", Some(&alice), Some(json!({ "total": "12,5" }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, request(Method::GET, "/api/data/2025-06-13", Some(&alice), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "key": "2025-06-13", "value": { "total": "12,5" } })
        );

        let response = send(&app, request(Method::GET, "/api/data/2025-06-13", Some(&bob), None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_entry_keys_must_be_iso_dates() {
        let app = test_app().await;
        let cookie = login_as(&app, "alice", "secret").await;

        let response = send(
            &app,
            request(Method::PUT, "/api/data/13-06-2025", Some(&cookie), Some(json!(1))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, request(Method::GET, "/api/data/2025-02-30", Some(&cookie), None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let app = test_app().await;
        let cookie = login_as(&app, "alice", "secret").await;

        send(&app, request(Method::PUT, "/api/data/2025-06-13", Some(&cookie), Some(json!(5)))).await;

        let response = send(&app, request(Method::DELETE, "/api/data/2025-06-13", Some(&cookie), None)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, request(Method::DELETE, "/api/data/2025-06-13", Some(&cookie), None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_calendar_month_endpoint() {
        let app = test_app().await;

        let response = send(&app, request(Method::GET, "/api/calendar/month?date=2025-06-20", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["label"], "juin 2025");
        assert_eq!(body["month"], "2025-06-01");
        assert_eq!(body["cells"].as_array().unwrap().len(), CALENDAR_GRID_CELLS);
        assert_eq!(body["cells"][5], json!({ "kind": "empty" }));
        assert_eq!(body["cells"][6], json!({ "kind": "day", "date": "2025-06-01" }));
        assert_eq!(body["next_month"], "2025-07-01");

        let response = send(&app, request(Method::GET, "/api/calendar/month?date=june", None, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_calendar_day_endpoint_stops_at_today() {
        let app = test_app().await;

        let response = send(&app, request(Method::GET, "/api/calendar/day", None, None)).await;
        let body = body_json(response).await;
        assert_eq!(body["date"], "2025-06-13");
        assert_eq!(body["label"], "vendredi 13 juin 2025");
        assert_eq!(body["previous"], "2025-06-12");
        assert!(body["next"].is_null());
        assert_eq!(body["is_today"], true);

        let response = send(&app, request(Method::GET, "/api/calendar/day?date=2025-06-12", None, None)).await;
        assert_eq!(body_json(response).await["next"], "2025-06-13");
    }

    #[tokio::test]
    async fn test_calendar_day_endpoint_rejects_future_days() {
        let app = test_app().await;

        for uri in ["/api/calendar/day?date=2025-06-14", "/api/calendar/day?date=2099-01-01"] {
            let response = send(&app, request(Method::GET, uri, None, None)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_future_entries_are_rejected() {
        let app = test_app().await;
        let cookie = login_as(&app, "alice", "secret").await;

        let response = send(
            &app,
            request(Method::PUT, "/api/data/2025-06-14", Some(&cookie), Some(json!(1))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_expired_session_is_unauthorized() {
        let config = ServerConfig {
            session_ttl_secs: 0,
            users: vec![UserCredentials {
                username: "alice".to_string(),
                password: "secret".to_string(),
            }],
            ..ServerConfig::default()
        };
        let app = test_app_with_config(config).await;

        let response = send(
            &app,
            request(
                Method::POST,
                "/api/login",
                None,
                Some(json!({ "username": "alice", "password": "secret" })),
            ),
        )
        .await;
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.contains("Max-Age=0"));

        let cookie = set_cookie.split(';').next().unwrap().to_string();
        let response = send(&app, request(Method::GET, "/api/me", Some(&cookie), None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_api_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>budget</html>").unwrap();
        let config = ServerConfig {
            static_dir: dir.path().to_path_buf(),
            ..ServerConfig::default()
        };
        let app = test_app_with_config(config).await;

        let response = send(&app, request(Method::GET, "/api/nope", None, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, request(Method::GET, "/semaine", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_calendar_week_endpoint() {
        let app = test_app().await;

        let response = send(&app, request(Method::GET, "/api/calendar/week?date=2025-06-15", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["start"], "2025-06-09");
        assert_eq!(body["days"].as_array().unwrap().len(), 7);
        assert_eq!(body["days"][6]["date"], "2025-06-15");
        assert_eq!(body["days"][6]["is_future"], true);
    }

    #[tokio::test]
    async fn test_log_message() {
        let app = test_app().await;

        let response = send(
            &app,
            request(
                Method::POST,
                "/api/logs",
                None,
                Some(json!({ "level": "warn", "message": "save failed", "component": "daily" })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "success": true }));
    }

    #[tokio::test]
    async fn test_static_files_with_spa_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>budget</html>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log('ok')").unwrap();

        let config = ServerConfig {
            static_dir: dir.path().to_path_buf(),
            ..ServerConfig::default()
        };
        let app = test_app_with_config(config).await;

        for (uri, expected) in [
            ("/", "<html>budget</html>"),
            ("/app.js", "console.log('ok')"),
            ("/semaine", "<html>budget</html>"),
        ] {
            let response = send(&app, request(Method::GET, uri, None, None)).await;
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&bytes[..], expected.as_bytes(), "{uri}");
        }
    }
}
