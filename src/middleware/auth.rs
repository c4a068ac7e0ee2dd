//! Authentication middleware
//!
//! Sign-in happens at the identity provider. Requests carry its session token
//! as `Authorization: Bearer <jwt>`; this layer verifies it and resolves the
//! caller into a [`CurrentUser`].

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::state::AppState;

/// Organization roles that grant admin rights
const ADMIN_ROLES: [&str; 2] = ["admin", "org:admin"];

/// Session token claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User subject
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Active organization
    pub org_id: i64,
    /// Role within the active organization
    #[serde(default)]
    pub org_role: Option<String>,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.org_role
            .as_deref()
            .map(|role| ADMIN_ROLES.contains(&role))
            .unwrap_or(false)
    }
}

/// Extension to store current user in request
#[derive(Clone, Debug)]
pub struct CurrentUser {
    /// Identity provider subject
    pub user_id: String,
    pub organization_id: i64,
    /// Person row linked to this user, if any
    pub person_id: Option<i64>,
    pub is_admin: bool,
}

impl CurrentUser {
    /// Require the caller to be an organization admin
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Paths that don't require authentication
fn is_public_path(path: &str) -> bool {
    !path.starts_with("/api") || path == "/api/health"
}

/// Verify a session token against the configured secret
pub fn verify_token(token: &str, config: &AuthConfig) -> Result<Claims, jsonwebtoken::errors::Error> {
    // An empty secret would accept tokens anyone can sign
    if config.jwt_secret.is_empty() {
        return Err(ErrorKind::InvalidKeyFormat.into());
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = config.leeway_secs;
    if let Some(issuer) = config.issuer.as_deref().filter(|iss| !iss.is_empty()) {
        // set_issuer alone lets tokens without `iss` through
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
    }

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

/// Authentication middleware
pub async fn auth_layer(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    // Skip auth for public paths
    if is_public_path(&path) {
        return next.run(request).await;
    }

    let Some(bearer) = request.headers().typed_get::<Authorization<Bearer>>() else {
        return AppError::Unauthorized.into_response();
    };

    let claims = match verify_token(bearer.token(), &state.config.auth) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!("Rejected session token: {}", e);
            return AppError::Unauthorized.into_response();
        }
    };

    // Link the caller to their person row, if one exists
    let person = match state.directory(claims.org_id).find_by_user(&claims.sub).await {
        Ok(person) => person,
        Err(e) => {
            tracing::error!("Database error during auth: {}", e);
            return AppError::Database(e).into_response();
        }
    };

    let current_user = CurrentUser {
        is_admin: claims.is_admin(),
        user_id: claims.sub,
        organization_id: claims.org_id,
        person_id: person.map(|p| p.id),
    };

    request.extensions_mut().insert(current_user);

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tokio_test::{assert_err, assert_ok};

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            issuer: None,
            leeway_secs: 0,
        }
    }

    fn token(secret: &str, exp_offset: i64, org_role: Option<&str>) -> String {
        issued_token(secret, exp_offset, org_role, None)
    }

    fn issued_token(
        secret: &str,
        exp_offset: i64,
        org_role: Option<&str>,
        iss: Option<&str>,
    ) -> String {
        let claims = Claims {
            sub: "user_2abc".to_string(),
            iss: iss.map(|i| i.to_string()),
            org_id: 7,
            org_role: org_role.map(|r| r.to_string()),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/api/health"));
        assert!(is_public_path("/index.html"));
        assert!(!is_public_path("/api/people"));
        assert!(!is_public_path("/api/tasks"));
    }

    #[test]
    fn test_verify_valid_token() {
        let claims = assert_ok!(verify_token(&token("test-secret", 600, None), &auth_config()));
        assert_eq!(claims.sub, "user_2abc");
        assert_eq!(claims.org_id, 7);
        assert!(!claims.is_admin());
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        assert_err!(verify_token(&token("other", 600, None), &auth_config()));
    }

    #[test]
    fn test_verify_rejects_expired() {
        assert_err!(verify_token(&token("test-secret", -600, None), &auth_config()));
    }

    #[test]
    fn test_verify_rejects_empty_secret() {
        let config = AuthConfig {
            jwt_secret: String::new(),
            ..auth_config()
        };
        assert_err!(verify_token(&token("test-secret", 600, None), &config));
    }

    #[test]
    fn test_verify_checks_issuer() {
        let config = AuthConfig {
            issuer: Some("https://id.example.com".to_string()),
            ..auth_config()
        };
        assert_err!(verify_token(&token("test-secret", 600, None), &config));

        let other = issued_token("test-secret", 600, None, Some("https://evil.example.com"));
        assert_err!(verify_token(&other, &config));

        let issued = issued_token("test-secret", 600, None, Some("https://id.example.com"));
        assert_eq!(assert_ok!(verify_token(&issued, &config)).sub, "user_2abc");
    }

    #[test]
    fn test_admin_roles() {
        let claims = assert_ok!(verify_token(&token("test-secret", 600, Some("org:admin")), &auth_config()));
        assert!(claims.is_admin());
        let claims = assert_ok!(verify_token(&token("test-secret", 600, Some("org:member")), &auth_config()));
        assert!(!claims.is_admin());
    }

    #[test]
    fn test_require_admin() {
        let user = CurrentUser {
            user_id: "u".to_string(),
            organization_id: 1,
            person_id: None,
            is_admin: false,
        };
        assert!(matches!(user.require_admin(), Err(AppError::Forbidden)));
    }
}
