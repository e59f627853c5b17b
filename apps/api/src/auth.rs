//! Caller identity. Sign-in happens at the upstream identity provider, which
//! forwards the authenticated account id and the role the session runs under.

use std::str::FromStr;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::log::MarkedBy;

pub const ACCOUNT_HEADER: &str = "x-account-id";
pub const ROLE_HEADER: &str = "x-account-role";

/// Patient and caretaker share one account; the role only decides what they may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Caretaker,
}

impl Role {
    pub fn can_manage_medications(self) -> bool {
        matches!(self, Role::Caretaker)
    }

    pub fn marked_by(self) -> MarkedBy {
        match self {
            Role::Patient => MarkedBy::Patient,
            Role::Caretaker => MarkedBy::Caretaker,
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "caretaker" => Ok(Role::Caretaker),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub account_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn require_caretaker(&self) -> Result<(), AppError> {
        if self.role.can_manage_medications() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Only the caretaker view can change medications".to_string(),
            ))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let account_id = parts
            .headers
            .get(ACCOUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or(AppError::Unauthorized)?;

        // Sessions that do not state a role get the read-mostly patient view.
        let role = match parts.headers.get(ROLE_HEADER) {
            None => Role::Patient,
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| AppError::Validation(format!("Invalid {ROLE_HEADER} header")))?,
        };

        Ok(Actor { account_id, role })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(builder: axum::http::request::Builder) -> Result<Actor, AppError> {
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_missing_account_is_unauthorized() {
        let result = extract(Request::builder()).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_role_defaults_to_patient() {
        let id = Uuid::new_v4();
        let actor = extract(Request::builder().header(ACCOUNT_HEADER, id.to_string()))
            .await
            .unwrap();
        assert_eq!(actor.account_id, id);
        assert_eq!(actor.role, Role::Patient);
        assert!(actor.require_caretaker().is_err());
    }

    #[tokio::test]
    async fn test_caretaker_role() {
        let actor = extract(
            Request::builder()
                .header(ACCOUNT_HEADER, Uuid::new_v4().to_string())
                .header(ROLE_HEADER, "Caretaker"),
        )
        .await
        .unwrap();
        assert!(actor.require_caretaker().is_ok());
        assert_eq!(actor.role.marked_by(), MarkedBy::Caretaker);
    }

    #[tokio::test]
    async fn test_unknown_role_rejected() {
        let result = extract(
            Request::builder()
                .header(ACCOUNT_HEADER, Uuid::new_v4().to_string())
                .header(ROLE_HEADER, "admin"),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
