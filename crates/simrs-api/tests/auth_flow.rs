//! 인증 흐름 통합 테스트
//!
//! 인메모리 저장소 위에서 전체 라우터를 `oneshot`으로 구동합니다.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use simrs_api::audit::MemoryAuditSink;
use simrs_api::auth::{Argon2Hasher, LivenessConfig, TokenCodec};
use simrs_api::middleware::InMemoryRateLimitStore;
use simrs_api::repository::MemoryStore;
use simrs_api::{create_app, AppComponents, AppState, AuthSettings};
use simrs_core::CredentialHasher;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

const PASSWORD: &str = "rahasia-123";

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
    audit: Arc<MemoryAuditSink>,
    password_hash: String,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let hasher = Arc::new(Argon2Hasher::new());
        let password_hash = hasher.hash(PASSWORD).unwrap();

        let components = AppComponents::in_memory(
            store.clone(),
            hasher,
            audit.clone(),
            Arc::new(InMemoryRateLimitStore::new()),
        );
        let settings = AuthSettings {
            codec: TokenCodec::new(
                &SecretString::from("integration-secret-0123456789abcdef".to_string()),
                chrono::Duration::minutes(15),
                chrono::Duration::days(7),
            ),
            max_login_attempts: 10,
            login_window: Duration::from_secs(300),
            last_seen_interval: Duration::from_secs(60),
            liveness: LivenessConfig::default(),
            trust_forwarded_headers: false,
        };
        let (state, _worker) = AppState::build(components, settings, CancellationToken::new());

        Self {
            app: create_app(Arc::new(state)),
            store,
            audit,
            password_hash,
        }
    }

    fn user(&self, username: &str) -> Uuid {
        self.store.seed_user(username, &self.password_hash, true)
    }

    fn admin(&self) -> Uuid {
        let id = self.user("admin");
        self.store
            .seed_role_with_permissions(id, "admin", &["permission.manage", "session.revoke"]);
        id
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn login(&self, username: &str) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body
    }

    async fn access_token(&self, username: &str) -> String {
        let body = self.login(username).await;
        body["tokens"]["access_token"].as_str().unwrap().to_string()
    }
}

// ==================== 로그인 / 로그아웃 ====================

#[tokio::test]
async fn test_login_me_logout_cycle() {
    let app = TestApp::new();
    let user = app.user("dokter");
    app.store
        .seed_role_with_permissions(user, "dokter", &["vedika.read", "patient.read"]);

    let login = app.login("dokter").await;
    assert_eq!(login["tokens"]["token_type"], "Bearer");
    assert_eq!(login["user"]["permissions"], json!(["patient.read", "vedika.read"]));
    let token = login["tokens"]["access_token"].as_str().unwrap().to_string();

    let (status, me) = app.send(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "dokter");
    assert_eq!(me["roles"][0]["name"], "dokter");

    let (status, _) = app.send(Method::POST, "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.send(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "SESSION_REVOKED");
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user_look_the_same() {
    let app = TestApp::new();
    app.user("dokter");

    let (status_wrong, wrong) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "dokter", "password": "salah" })),
        )
        .await;
    let (status_unknown, unknown) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "hantu", "password": "salah" })),
        )
        .await;

    assert_eq!(status_wrong, StatusCode::UNAUTHORIZED);
    assert_eq!(status_unknown, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong["code"], "INVALID_CREDENTIALS");
    assert_eq!(wrong["message"], unknown["message"]);
}

#[tokio::test]
async fn test_missing_or_malformed_authorization() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");

    let (status, body) = app
        .send(Method::GET, "/auth/me", Some("not.a.jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let app = TestApp::new();
    app.user("perawat");

    let login = app.login("perawat").await;
    let refresh = login["tokens"]["refresh_token"].as_str().unwrap().to_string();

    let (status, rotated) = app
        .send(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["refresh_token"], login["tokens"]["refresh_token"]);

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_REFRESH_TOKEN");

    // 새 access token은 같은 세션으로 계속 유효
    let token = rotated["access_token"].as_str().unwrap();
    let (status, _) = app.send(Method::GET, "/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_blocked_after_ten_attempts() {
    let app = TestApp::new();
    app.user("dokter");
    app.user("perawat");
    let wrong = json!({ "username": "dokter", "password": "salah" });

    for _ in 0..10 {
        let (status, body) = app
            .send(Method::POST, "/auth/login", None, Some(wrong.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
    }

    // 윈도우 안에서는 올바른 비밀번호도 차단
    for _ in 0..2 {
        let (status, body) = app
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "username": "dokter", "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
    }

    // 다른 사용자 이름은 별도 카운터
    app.login("perawat").await;
}

#[tokio::test]
async fn test_invalid_login_body_is_validation_error() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "", "password": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

// ==================== 세션 ====================

#[tokio::test]
async fn test_list_sessions_marks_current() {
    let app = TestApp::new();
    app.user("dokter");

    app.login("dokter").await;
    let token = app.access_token("dokter").await;

    let (status, body) = app
        .send(Method::GET, "/auth/sessions", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let current: Vec<_> = body["sessions"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["is_current"] == true)
        .collect();
    assert_eq!(current.len(), 1);
}

#[tokio::test]
async fn test_foreign_session_revoke_requires_permission() {
    let app = TestApp::new();
    app.user("dokter");
    app.user("perawat");
    app.admin();

    let dokter = app.login("dokter").await;
    let dokter_token = dokter["tokens"]["access_token"].as_str().unwrap().to_string();
    let dokter_session = dokter["session"]["id"].as_str().unwrap().to_string();
    let uri = format!("/auth/sessions/{dokter_session}/revoke");

    let perawat_token = app.access_token("perawat").await;
    let (status, body) = app
        .send(Method::POST, &uri, Some(&perawat_token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SESSION_NOT_FOUND");

    let admin_token = app.access_token("admin").await;
    let (status, _) = app.send(Method::POST, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send(Method::GET, "/auth/me", Some(&dokter_token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "SESSION_REVOKED");
}

#[tokio::test]
async fn test_admin_revokes_all_sessions() {
    let app = TestApp::new();
    let dokter = app.user("dokter");
    app.admin();

    let first = app.access_token("dokter").await;
    app.login("dokter").await;

    let admin_token = app.access_token("admin").await;
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/admin/users/{dokter}/sessions/revoke"),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], 2);

    let (status, _) = app.send(Method::GET, "/auth/me", Some(&first), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!app.audit.events().is_empty());
}

// ==================== 권한 오버라이드 ====================

#[tokio::test]
async fn test_override_administration() {
    let app = TestApp::new();
    let dokter = app.user("dokter");
    app.admin();
    app.store.seed_permission("claim.approve");
    let uri = format!("/admin/users/{dokter}/permissions/claim.approve");

    let dokter_token = app.access_token("dokter").await;
    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(&dokter_token),
            Some(json!({ "effect": "GRANT" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let admin_token = app.access_token("admin").await;
    let (status, change) = app
        .send(
            Method::PUT,
            &uri,
            Some(&admin_token),
            Some(json!({ "effect": "GRANT" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(change["previous"], Value::Null);
    assert_eq!(change["current"], "GRANT");

    let (_, me) = app
        .send(Method::GET, "/auth/me", Some(&dokter_token), None)
        .await;
    assert_eq!(me["permissions"], json!(["claim.approve"]));

    let (status, change) = app
        .send(Method::DELETE, &uri, Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(change["previous"], "GRANT");
    assert_eq!(change["current"], Value::Null);

    let (_, me) = app
        .send(Method::GET, "/auth/me", Some(&dokter_token), None)
        .await;
    assert_eq!(me["permissions"], json!([]));

    assert_eq!(app.audit.events().len(), 2);
}

#[tokio::test]
async fn test_override_rejects_unknown_permission_and_effect() {
    let app = TestApp::new();
    let dokter = app.user("dokter");
    app.admin();
    let admin_token = app.access_token("admin").await;

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/admin/users/{dokter}/permissions/nothing.here"),
            Some(&admin_token),
            Some(json!({ "effect": "GRANT" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "PERMISSION_NOT_FOUND");

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/admin/users/{dokter}/permissions/ClaimApprove"),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    app.store.seed_permission("claim.approve");
    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/admin/users/{dokter}/permissions/claim.approve"),
            Some(&admin_token),
            Some(json!({ "effect": "ALLOW" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

// ==================== 기타 ====================

#[tokio::test]
async fn test_health_and_docs_are_public() {
    let app = TestApp::new();

    let (status, _) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, spec) = app
        .send(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(spec["paths"].get("/auth/login").is_some());

    // 메트릭 핸들이 없으면 404
    let (status, _) = app.send(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
