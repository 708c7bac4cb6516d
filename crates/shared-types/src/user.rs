use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A user account row. `password_hash` never leaves the server; API
/// responses use [`UserPublic`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_reviewer: bool,
    pub created_at: DateTime<Utc>,
}

/// API response shape for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserPublic {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_reviewer: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserPublic {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            full_name: u.full_name,
            is_active: u.is_active,
            is_reviewer: u.is_reviewer,
            created_at: u.created_at,
        }
    }
}

/// Signup request body.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserSignupRequest {
    #[validate(
        email(message = "must be a valid email address"),
        length(max = 255, message = "must be at most 255 characters")
    )]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "must be 8-128 characters"))]
    pub password: String,
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub full_name: Option<String>,
}

/// Self-service account update (settings page).
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserUpdateMeRequest {
    #[validate(
        email(message = "must be a valid email address"),
        length(max = 255, message = "must be at most 255 characters")
    )]
    pub email: Option<String>,
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub full_name: Option<String>,
}

/// Login request body.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Bearer token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

impl Token {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_request_validates_email_and_password() {
        let ok = UserSignupRequest {
            email: "ola@example.com".to_string(),
            password: "long-enough".to_string(),
            full_name: None,
        };
        assert!(ok.validate().is_ok());

        let bad_email = UserSignupRequest {
            email: "not-an-email".to_string(),
            password: "long-enough".to_string(),
            full_name: None,
        };
        assert!(bad_email.validate().is_err());

        let short_password = UserSignupRequest {
            email: "ola@example.com".to_string(),
            password: "short".to_string(),
            full_name: None,
        };
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn token_defaults_to_bearer() {
        let token = Token::bearer("abc".to_string());
        assert_eq!(token.token_type, "bearer");
    }
}
