use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;

/// JWT claims stored in bearer access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub is_reviewer: bool,
    pub exp: i64,
    pub iat: i64,
    /// Unique token identifier; prevents collisions when multiple tokens
    /// are issued for the same user within the same second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

pub fn create_access_token(
    user_id: Uuid,
    email: &str,
    is_reviewer: bool,
) -> Result<String, jsonwebtoken::errors::Error> {
    let cfg = config::get();
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        is_reviewer,
        iat: now.timestamp(),
        exp: (now + Duration::minutes(cfg.access_token_ttl_minutes)).timestamp(),
        jti: Some(Uuid::new_v4().to_string()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret_key.as_bytes()),
    )
}

pub fn validate_access_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config::get().secret_key.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() {
        crate::config::init_with(crate::config::test_config());
    }

    #[test]
    fn create_and_validate_access_token() {
        setup();
        let id = Uuid::new_v4();
        let token = create_access_token(id, "ola@example.com", false).unwrap();
        let claims = validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "ola@example.com");
        assert!(!claims.is_reviewer);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn reviewer_flag_survives_roundtrip() {
        setup();
        let token = create_access_token(Uuid::new_v4(), "udi@example.com", true).unwrap();
        let claims = validate_access_token(&token).unwrap();
        assert!(claims.is_reviewer);
    }

    #[test]
    fn expired_token_rejected() {
        setup();
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "expired@example.com".to_string(),
            is_reviewer: false,
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
            jti: None,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(crate::config::get().secret_key.as_bytes()),
        )
        .unwrap();

        assert!(validate_access_token(&token).is_err());
    }

    #[test]
    fn invalid_token_rejected() {
        setup();
        assert!(validate_access_token("not.a.valid.jwt").is_err());
        assert!(validate_access_token("").is_err());
    }

    #[test]
    fn tokens_carry_distinct_jti() {
        setup();
        let id = Uuid::new_v4();
        let a = create_access_token(id, "a@b.com", false).unwrap();
        let b = create_access_token(id, "a@b.com", false).unwrap();
        let ca = validate_access_token(&a).unwrap();
        let cb = validate_access_token(&b).unwrap();
        assert_ne!(ca.jti, cb.jti);
    }
}
