use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::core::config::Settings;

const ARGON2_MEMORY_KIB: u32 = 19_456;
const ARGON2_TIME: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("password hashing failed")]
    Hashing,
    #[error("password verification failed")]
    Verification,
    #[error("jwt encoding failed")]
    JwtEncoding,
    #[error("jwt decoding failed")]
    JwtDecoding,
    #[error("unsupported jwt algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Claims {
    /// User name, which is also the user document id.
    pub(crate) sub: String,
    pub(crate) exp: i64,
    pub(crate) jti: String,
}

fn argon2() -> Result<Argon2<'static>, SecurityError> {
    let params = argon2::Params::new(ARGON2_MEMORY_KIB, ARGON2_TIME, ARGON2_PARALLELISM, None)
        .map_err(|_| SecurityError::Hashing)?;
    Ok(Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params))
}

pub(crate) fn hash_password(password: &str) -> Result<String, SecurityError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| SecurityError::Hashing)?
        .to_string();

    Ok(hash)
}

/// Unsalted SHA-256 hex digest, the format of accounts enrolled before Argon2id.
pub(crate) fn legacy_password_hash(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn is_legacy_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.chars().all(|ch| ch.is_ascii_hexdigit())
}

/// Stored hashes in the legacy format should be replaced after a successful login.
pub(crate) fn needs_rehash(hash: &str) -> bool {
    is_legacy_hash(hash)
}

pub(crate) fn verify_password(password: &str, hash: &str) -> Result<bool, SecurityError> {
    if password.is_empty() {
        return Ok(false);
    }

    if is_legacy_hash(hash) {
        let candidate = legacy_password_hash(password);
        return Ok(constant_time_eq(candidate.as_bytes(), hash.to_ascii_lowercase().as_bytes()));
    }

    let parsed = PasswordHash::new(hash).map_err(|_| SecurityError::Verification)?;
    match argon2()?.verify_password(password.as_bytes(), &parsed) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(SecurityError::Verification),
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

/// Document key for a sentence template's progress record.
pub(crate) fn template_hash(template: &str) -> String {
    hex::encode(Sha256::digest(template.as_bytes()))
}

pub(crate) fn create_access_token(
    subject: &str,
    settings: &Settings,
    expires_in: Option<Duration>,
) -> Result<String, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let expire = OffsetDateTime::now_utc()
        + expires_in.unwrap_or_else(|| {
            Duration::minutes(settings.security().access_token_expire_minutes as i64)
        });

    let claims = Claims {
        sub: subject.to_string(),
        exp: expire.unix_timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &jsonwebtoken::Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(settings.security().secret_key.as_bytes()),
    )
    .map_err(|_| SecurityError::JwtEncoding)
}

pub(crate) fn verify_token(token: &str, settings: &Settings) -> Result<Claims, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = true;
    validation.required_spec_claims.insert("exp".to_string());
    validation.required_spec_claims.insert("sub".to_string());

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.security().secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| SecurityError::JwtDecoding)
}

/// Redis key marking a token id as logged out.
pub(crate) fn revoked_token_key(jti: &str) -> String {
    format!("revoked:{jti}")
}

fn algorithm_from_settings(settings: &Settings) -> Result<Algorithm, SecurityError> {
    match settings.security().algorithm.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(SecurityError::UnsupportedAlgorithm(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn legacy_hash_round_trip() {
        let stored = legacy_password_hash("1234");

        assert!(verify_password("1234", &stored).unwrap());
        assert!(!verify_password("1235", &stored).unwrap());
        assert!(!verify_password("", &stored).unwrap());
        assert!(needs_rehash(&stored));
    }

    #[test]
    fn legacy_hash_matches_sha256_hex() {
        assert_eq!(
            legacy_password_hash("1234"),
            "03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4"
        );
    }

    #[test]
    fn argon2_hash_round_trip() {
        let stored = hash_password("1234").expect("hash");

        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("1234", &stored).unwrap());
        assert!(!verify_password("1235", &stored).unwrap());
        assert!(!verify_password("", &stored).unwrap());
        assert!(!needs_rehash(&stored));
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(verify_password("1234", "not-a-hash").is_err());
    }

    #[test]
    fn template_hash_is_stable() {
        let first = template_hash("I like ___ very much.");
        let second = template_hash("I like ___ very much.");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert_ne!(first, template_hash("I like ___ a lot."));
    }

    #[tokio::test]
    async fn token_round_trip_carries_subject_and_id() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");

        let token = create_access_token("Esme", &settings, None).expect("token");
        let claims = verify_token(&token, &settings).expect("claims");

        assert_eq!(claims.sub, "Esme");
        assert!(!claims.jti.is_empty());
        assert!(verify_token("garbage", &settings).is_err());
    }
}
