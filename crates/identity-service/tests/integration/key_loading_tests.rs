//! Key material loaded from disk, the way the service binary loads it.

use common::types::IdentityId;
use identity_service::auth::{
    Claims, EcdsaSigner, TokenSigner, TokenValidator, ValidationOptions,
};
use identity_service::errors::KeyFormatError;
use identity_service::keys::{load_key_pair, load_public_key};
use identity_test_utils::{write_key_file, write_key_files, TestKeyPair};
use std::time::Duration;

#[test]
fn test_key_files_sign_and_verify() -> Result<(), anyhow::Error> {
    let pair = TestKeyPair::generate();
    let files = write_key_files(&pair);

    let private = load_key_pair(&files.private_key, &files.public_key)?;
    let public = load_public_key(&files.public_key)?;

    let signer = EcdsaSigner::new(&private);
    let validator = TokenValidator::new(&public, ValidationOptions::default());

    let subject = IdentityId::new(5).ok_or_else(|| anyhow::anyhow!("invalid id"))?;
    let token = signer.sign(&Claims::new(subject, "", &[], Duration::from_secs(60)))?;

    assert_eq!(validator.verify(&token)?.identity_id(), subject);
    Ok(())
}

#[test]
fn test_sec1_key_file_pairs_with_public_key() -> Result<(), anyhow::Error> {
    let pair = TestKeyPair::from_seed(9);
    let files = write_key_files(&pair);
    let sec1 = write_key_file(&files.dir, "sec1.pem", &pair.sec1_pem);

    let private = load_key_pair(&sec1, &files.public_key)?;

    assert_eq!(private.pkcs8_der(), pair.pkcs8_der.as_slice());
    Ok(())
}

#[test]
fn test_mismatched_key_files_are_rejected() {
    let files = write_key_files(&TestKeyPair::from_seed(1));
    let other = write_key_file(
        &files.dir,
        "other_public.pem",
        &TestKeyPair::from_seed(2).public_pem,
    );

    let result = load_key_pair(&files.private_key, &other);

    assert!(matches!(result, Err(KeyFormatError::MismatchedPair)));
}

#[test]
fn test_missing_key_file_is_unreadable() {
    let files = write_key_files(&TestKeyPair::from_seed(1));
    let missing = files.dir.path().join("absent.pem");

    let result = load_public_key(&missing);

    assert!(matches!(result, Err(KeyFormatError::Unreadable { .. })));
}
