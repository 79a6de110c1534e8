/// Operator authentication: static bearer tokens from the config file.
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use edge_proto::config::OperatorConfig;
use subtle::ConstantTimeEq;

use crate::api::ApiError;
use crate::state::AppState;

pub struct OperatorTokens {
    operators: Vec<OperatorConfig>,
}

impl OperatorTokens {
    pub fn new(operators: Vec<OperatorConfig>) -> Self {
        Self { operators }
    }

    /// Operator id owning `token`. Every configured token is compared so the
    /// time taken does not depend on which one matched.
    pub fn authenticate(&self, token: &str) -> Option<&str> {
        let mut found = None;
        for op in &self.operators {
            if bool::from(op.token.as_bytes().ct_eq(token.as_bytes())) {
                found = Some(op.id.as_str());
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Authenticated operator, extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator(pub String);

impl FromRequestParts<AppState> for Operator {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthorized("Token no proporcionado"))?;

        match state.operators.authenticate(token) {
            Some(id) => Ok(Operator(id.to_string())),
            None => {
                tracing::debug!("Rejected operator token");
                Err(ApiError::Unauthorized("Token invalido"))
            }
        }
    }
}
