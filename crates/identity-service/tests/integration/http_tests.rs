//! Full router tests: public endpoints and the protected identity route.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::types::IdentityId;
use http_body_util::BodyExt;
use identity_service::auth::{
    Claims, EcdsaSigner, TokenSigner, TokenValidator, ValidationOptions,
};
use identity_service::cache::IdentityCache;
use identity_service::keys::EcPrivateKey;
use identity_service::lookup::IdentityLookup;
use identity_service::middleware::AuthState;
use identity_service::resolver::HttpIdentityResolver;
use identity_service::routes::{build_routes, AppState, DEFAULT_REQUEST_TIMEOUT};
use identity_test_utils::{mount_identity, mount_identity_status, TestKeyPair};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::MockServer;

struct TestApp {
    app: Router,
    signer: EcdsaSigner,
}

impl TestApp {
    fn new(issuer_url: &str) -> Result<Self, anyhow::Error> {
        let key = EcPrivateKey::from_pem("test", &TestKeyPair::from_seed(21).pkcs8_pem)?;
        let signer = EcdsaSigner::new(&key);

        let validator = Arc::new(TokenValidator::new(
            signer.public_key(),
            ValidationOptions {
                issuer: "svcA".to_string(),
                audience: "svcB".to_string(),
                leeway: Duration::ZERO,
            },
        ));
        let resolver = HttpIdentityResolver::new(issuer_url, Duration::from_secs(2))?;
        let lookup = IdentityLookup::new(
            Arc::new(IdentityCache::new(Duration::from_secs(60))),
            Arc::new(resolver),
        );

        let state = AppState {
            auth: Arc::new(AuthState { validator, lookup }),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        };
        let handle = PrometheusBuilder::new().build_recorder().handle();

        Ok(Self {
            app: build_routes(state, handle),
            signer,
        })
    }

    fn token_for(&self, id: i64) -> Result<String, anyhow::Error> {
        let subject = IdentityId::new(id).ok_or_else(|| anyhow::anyhow!("invalid id"))?;
        Ok(self.signer.sign(&Claims::new(
            subject,
            "svcA",
            &["svcB"],
            Duration::from_secs(3600),
        ))?)
    }

    async fn get(
        &self,
        uri: &str,
        bearer: Option<&str>,
    ) -> Result<(StatusCode, serde_json::Value), anyhow::Error> {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = self
            .app
            .clone()
            .oneshot(request.body(Body::empty())?)
            .await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        Ok((status, body))
    }
}

#[tokio::test]
async fn test_health_endpoint_is_public() -> Result<(), anyhow::Error> {
    let app = TestApp::new("http://127.0.0.1:1")?;

    let response = app
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await?.to_bytes();
    assert_eq!(body.as_ref(), b"OK");
    Ok(())
}

#[tokio::test]
async fn test_me_returns_identity_record() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    mount_identity(&server, 42, "ada@example.com", "Ada", true).await;
    let app = TestApp::new(&server.uri())?;
    let token = app.token_for(42)?;

    let (status, body) = app.get("/v1/identity/me", Some(&token)).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 42);
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["name"], "Ada");
    assert_eq!(body["activated"], true);
    assert!(body["token_expires_at"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_me_without_token_is_unauthorized() -> Result<(), anyhow::Error> {
    let app = TestApp::new("http://127.0.0.1:1")?;

    let (status, body) = app.get("/v1/identity/me", None).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    Ok(())
}

#[tokio::test]
async fn test_me_with_garbage_token_is_unauthorized() -> Result<(), anyhow::Error> {
    let app = TestApp::new("http://127.0.0.1:1")?;

    let (status, _) = app.get("/v1/identity/me", Some("not.a.token")).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_me_for_deactivated_identity_is_forbidden() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    mount_identity(&server, 42, "ada@example.com", "Ada", false).await;
    let app = TestApp::new(&server.uri())?;
    let token = app.token_for(42)?;

    let (status, body) = app.get("/v1/identity/me", Some(&token)).await?;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    Ok(())
}

#[tokio::test]
async fn test_me_with_issuer_down_is_unavailable() -> Result<(), anyhow::Error> {
    // Nothing listens on port 1
    let app = TestApp::new("http://127.0.0.1:1")?;
    let token = app.token_for(42)?;

    let (status, body) = app.get("/v1/identity/me", Some(&token)).await?;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    Ok(())
}

#[tokio::test]
async fn test_me_with_issuer_error_is_bad_gateway() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    mount_identity_status(&server, 42, 404).await;
    let app = TestApp::new(&server.uri())?;
    let token = app.token_for(42)?;

    let (status, body) = app.get("/v1/identity/me", Some(&token)).await?;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_not_found() -> Result<(), anyhow::Error> {
    let app = TestApp::new("http://127.0.0.1:1")?;

    let (status, _) = app.get("/v1/unknown", None).await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
