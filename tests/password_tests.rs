use tecnicoya_backend::auth::password::{
    hash_password, validate_password_strength, verify_password,
};

#[test]
fn hash_verifies_original_password() {
    let hash = hash_password("correct-horse-9").unwrap();
    assert!(verify_password("correct-horse-9", &hash).unwrap());
}

#[test]
fn wrong_password_fails_verification() {
    let hash = hash_password("correct-horse-9").unwrap();
    assert!(!verify_password("wrong-horse-9", &hash).unwrap());
}

#[test]
fn hashes_are_salted() {
    let a = hash_password("correct-horse-9").unwrap();
    let b = hash_password("correct-horse-9").unwrap();
    assert_ne!(a, b);
}

#[test]
fn malformed_hash_is_an_error_not_a_mismatch() {
    assert!(verify_password("anything1", "not-a-phc-string").is_err());
}

#[test]
fn strength_gate_requires_length_letter_and_digit() {
    assert!(validate_password_strength("abc1").is_err());
    assert!(validate_password_strength("12345678").is_err());
    assert!(validate_password_strength("abcdefgh").is_err());
    assert!(validate_password_strength("abcdefg1").is_ok());
}
