//! Requester authentication and capability facts.
//!
//! Requests carry an HS256 JWT minted by the embedding platform. The
//! middleware validates it and stores a `RequesterContext` in the request
//! extensions; handlers extract it with `FromRequestParts`. Capability
//! questions are answered by a request-scoped oracle over the token's role
//! claims - the playback service itself never looks at a token.

use crate::error::ErrorResponse;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::extract::{Request, State};
use axum::http::{header, request::Parts, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use uuid::Uuid;
use vidgate_core::{AppError, CapabilityOracle};

/// Role claims the platform mints into tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Grader,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Role::Student => write!(f, "student"),
            Role::Grader => write!(f, "grader"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: Uuid, // user_id
    pub roles: Vec<Role>,
    pub exp: i64, // expiration timestamp
    pub iat: i64, // issued at timestamp
}

/// Requester identity extracted from the JWT and stored in request
/// extensions.
#[derive(Debug, Clone)]
pub struct RequesterContext {
    pub user_id: Uuid,
    pub roles: Vec<Role>,
}

impl RequesterContext {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Request-scoped capability oracle over this requester's role claims.
    pub fn oracle(&self) -> ClaimsOracle {
        ClaimsOracle {
            context: self.clone(),
        }
    }
}

impl<S> FromRequestParts<S> for RequesterContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequesterContext>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse {
                        error: "Missing requester context".to_string(),
                        details: None,
                        error_type: None,
                        code: "MISSING_REQUESTER_CONTEXT".to_string(),
                        recoverable: false,
                        suggested_action: Some("Check authentication token".to_string()),
                    }),
                )
            })
    }
}

/// Answers capability questions from the requester's role claims. A
/// deployment embedding vidgate in a platform with per-assignment enrolment
/// would swap in an oracle backed by that platform's tables.
pub struct ClaimsOracle {
    context: RequesterContext,
}

#[async_trait::async_trait]
impl CapabilityOracle for ClaimsOracle {
    async fn can_submit(&self, user_id: Uuid, _assignment_id: Uuid) -> Result<bool, AppError> {
        Ok(user_id == self.context.user_id && self.context.has_role(Role::Student))
    }

    async fn can_grade(&self, user_id: Uuid, _assignment_id: Uuid) -> Result<bool, AppError> {
        Ok(user_id == self.context.user_id && self.context.has_role(Role::Grader))
    }

    async fn is_admin(&self, user_id: Uuid) -> Result<bool, AppError> {
        Ok(user_id == self.context.user_id && self.context.has_role(Role::Admin))
    }
}

/// Validate the Bearer token and attach a `RequesterContext`.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, crate::error::HttpAppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let decoding_key = DecodingKey::from_secret(state.config.server.jwt_secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<JwtClaims>(token, &decoding_key, &validation)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    let context = RequesterContext {
        user_id: token_data.claims.sub,
        roles: token_data.claims.roles,
    };
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}
