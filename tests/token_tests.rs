use uuid::Uuid;

use tecnicoya_backend::auth::{TokenError, TokenService};
use tecnicoya_backend::domain::users::Role;

const SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

#[test]
fn issued_token_round_trips() {
    let tokens = TokenService::new(SECRET, 7);
    let user_id = Uuid::new_v4();

    let token = tokens
        .issue(user_id, "ana@example.com", Role::Client)
        .unwrap();
    let claims = tokens.verify(&token).unwrap();

    assert_eq!(claims.sub, user_id.to_string());
    assert_eq!(claims.email, "ana@example.com");
    assert_eq!(claims.role, "client");
    assert!(claims.exp > claims.iat);
}

#[test]
fn technician_role_survives_round_trip() {
    let tokens = TokenService::new(SECRET, 7);
    let token = tokens
        .issue(Uuid::new_v4(), "tech@example.com", Role::Technician)
        .unwrap();
    assert_eq!(tokens.verify(&token).unwrap().role, "technician");
}

#[test]
fn token_signed_with_other_secret_is_rejected() {
    let issuer = TokenService::new("another-secret-that-is-32-bytes-long!!", 7);
    let verifier = TokenService::new(SECRET, 7);

    let token = issuer
        .issue(Uuid::new_v4(), "ana@example.com", Role::Client)
        .unwrap();
    assert!(verifier.verify(&token).is_err());
}

#[test]
fn tampered_token_is_rejected() {
    let tokens = TokenService::new(SECRET, 7);
    let token = tokens
        .issue(Uuid::new_v4(), "ana@example.com", Role::Client)
        .unwrap();

    let mut tampered = token.clone();
    tampered.pop();
    tampered.push('A');
    assert!(tokens.verify(&tampered).is_err());

    assert!(tokens.verify("not-a-token").is_err());
    assert!(tokens.verify("").is_err());
}

#[test]
fn expired_token_is_reported_as_expired() {
    // Negative TTL puts the expiry beyond the validation leeway.
    let tokens = TokenService::new(SECRET, -1);
    let token = tokens
        .issue(Uuid::new_v4(), "ana@example.com", Role::Client)
        .unwrap();
    assert!(matches!(tokens.verify(&token), Err(TokenError::Expired)));
}

#[test]
fn ttl_is_reported_in_seconds() {
    let tokens = TokenService::new(SECRET, 2);
    assert_eq!(tokens.ttl_seconds(), 2 * 24 * 60 * 60);
}
