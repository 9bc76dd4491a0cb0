//! Mock identity issuer endpoints on a `wiremock` server.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Identity record body as the issuer serves it.
pub fn identity_body(id: i64, email: &str, name: &str, activated: bool) -> serde_json::Value {
    json!({
        "id": id,
        "email": email,
        "name": name,
        "activated": activated,
    })
}

/// Serve `GET /identities/{id}` with a 200 record.
pub async fn mount_identity(server: &MockServer, id: i64, email: &str, name: &str, activated: bool) {
    Mock::given(method("GET"))
        .and(path(format!("/identities/{id}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(identity_body(id, email, name, activated)),
        )
        .mount(server)
        .await;
}

/// Serve `GET /identities/{id}` with a 200 record, asserting it is requested
/// exactly `times` times by the time the server is dropped.
pub async fn mount_identity_expecting(
    server: &MockServer,
    id: i64,
    email: &str,
    name: &str,
    activated: bool,
    times: u64,
) {
    Mock::given(method("GET"))
        .and(path(format!("/identities/{id}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(identity_body(id, email, name, activated)),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Serve `GET /identities/{id}` with an empty response of `status`.
pub async fn mount_identity_status(server: &MockServer, id: i64, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/identities/{id}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
