//! Sign, verify, resolve and cache against a mock identity issuer.

use common::types::IdentityId;
use identity_service::auth::{
    Claims, EcdsaSigner, TokenSigner, TokenValidator, ValidationOptions,
};
use identity_service::cache::IdentityCache;
use identity_service::errors::{ResolveError, TokenError};
use identity_service::keys::EcPrivateKey;
use identity_service::lookup::IdentityLookup;
use identity_service::resolver::HttpIdentityResolver;
use identity_test_utils::{
    mount_identity_expecting, mount_identity_status, sign_claims_es256, TestKeyPair,
    TestTokenBuilder,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

fn signer(seed: u8) -> Result<EcdsaSigner, anyhow::Error> {
    let key = EcPrivateKey::from_pem("test", &TestKeyPair::from_seed(seed).pkcs8_pem)?;
    Ok(EcdsaSigner::new(&key))
}

fn validator_for(signer: &EcdsaSigner, audience: &str) -> TokenValidator {
    TokenValidator::new(
        signer.public_key(),
        ValidationOptions {
            issuer: "svcA".to_string(),
            audience: audience.to_string(),
            leeway: Duration::ZERO,
        },
    )
}

fn lookup_against(server: &MockServer) -> Result<IdentityLookup, anyhow::Error> {
    let resolver = HttpIdentityResolver::new(server.uri(), Duration::from_secs(2))?;
    let cache = Arc::new(IdentityCache::new(Duration::from_secs(60)));
    Ok(IdentityLookup::new(cache, Arc::new(resolver)))
}

#[tokio::test]
async fn test_token_to_identity_resolves_once() -> Result<(), anyhow::Error> {
    // Arrange
    let server = MockServer::start().await;
    mount_identity_expecting(&server, 42, "ada@example.com", "Ada", true, 1).await;

    let signer = signer(1)?;
    let validator = validator_for(&signer, "svcB");
    let lookup = lookup_against(&server)?;

    let subject = IdentityId::new(42).ok_or_else(|| anyhow::anyhow!("invalid id"))?;
    let token = signer.sign(&Claims::new(
        subject,
        "svcA",
        &["svcB"],
        Duration::from_secs(3600),
    ))?;

    // Act
    let verified = validator.verify(&token)?;
    let first = lookup.lookup(verified.identity_id(), None).await?;
    let second = lookup.lookup(verified.identity_id(), None).await?;

    // Assert
    assert_eq!(verified.identity_id(), subject);
    assert_eq!(first, second);
    assert_eq!(first.email, "ada@example.com");
    assert!(first.activated);
    assert_eq!(lookup.cache().size().await, 1);

    // MockServer verifies the single-call expectation on drop
    Ok(())
}

#[tokio::test]
async fn test_wrong_audience_is_rejected() -> Result<(), anyhow::Error> {
    let signer = signer(1)?;
    let validator = validator_for(&signer, "svcC");

    let subject = IdentityId::new(42).ok_or_else(|| anyhow::anyhow!("invalid id"))?;
    let token = signer.sign(&Claims::new(
        subject,
        "svcA",
        &["svcB"],
        Duration::from_secs(3600),
    ))?;

    assert_eq!(validator.verify(&token).err(), Some(TokenError::AudienceMismatch));
    Ok(())
}

#[tokio::test]
async fn test_token_from_another_key_is_rejected() -> Result<(), anyhow::Error> {
    let trusted = signer(1)?;
    let attacker = TestKeyPair::from_seed(2);
    let validator = validator_for(&trusted, "svcB");

    let claims = TestTokenBuilder::new()
        .for_identity(42)
        .issued_by("svcA")
        .for_audience("svcB")
        .build();
    let token = sign_claims_es256(&claims, &attacker.pkcs8_der)?;

    assert_eq!(validator.verify(&token).err(), Some(TokenError::Signature));
    Ok(())
}

#[tokio::test]
async fn test_externally_signed_token_is_accepted() -> Result<(), anyhow::Error> {
    let pair = TestKeyPair::from_seed(1);
    let validator = validator_for(&signer(1)?, "svcB");

    let claims = TestTokenBuilder::new()
        .for_identity(7)
        .issued_by("svcA")
        .for_audience("other")
        .for_audience("svcB")
        .build();
    let token = sign_claims_es256(&claims, &pair.pkcs8_der)?;

    let verified = validator.verify(&token)?;
    assert_eq!(verified.identity_id().get(), 7);
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_rejected() -> Result<(), anyhow::Error> {
    let pair = TestKeyPair::from_seed(1);
    let validator = validator_for(&signer(1)?, "svcB");

    let claims = TestTokenBuilder::new()
        .for_identity(42)
        .issued_by("svcA")
        .for_audience("svcB")
        .issued_at(chrono::Utc::now().timestamp() - 7200)
        .expires_in(-3600)
        .build();
    let token = sign_claims_es256(&claims, &pair.pkcs8_der)?;

    assert_eq!(validator.verify(&token).err(), Some(TokenError::Expired));
    Ok(())
}

#[tokio::test]
async fn test_upstream_failure_is_not_cached() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    mount_identity_status(&server, 42, 500).await;
    let lookup = lookup_against(&server)?;
    let id = IdentityId::new(42).ok_or_else(|| anyhow::anyhow!("invalid id"))?;

    let result = lookup.lookup(id, None).await;

    assert_eq!(result, Err(ResolveError::UpstreamStatus(500)));
    assert_eq!(lookup.cache().size().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_invalidate_forces_fresh_resolution() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    mount_identity_expecting(&server, 42, "ada@example.com", "Ada", true, 2).await;
    let lookup = lookup_against(&server)?;
    let id = IdentityId::new(42).ok_or_else(|| anyhow::anyhow!("invalid id"))?;

    lookup.lookup(id, None).await?;
    lookup.invalidate(id).await;
    lookup.lookup(id, None).await?;

    Ok(())
}
