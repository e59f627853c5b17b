use async_trait::async_trait;
use axum::{extract::State, Json};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::Actor;
use crate::db::bounded;
use crate::errors::AppError;
use crate::models::account::Account;
use crate::state::AppState;

/// Resolves where caretaker email for an account goes.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn contact_email(&self, account_id: Uuid) -> Result<Option<String>, AppError>;
}

#[derive(Clone)]
pub struct PgAccountDirectory {
    pool: PgPool,
}

impl PgAccountDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn contact_email(&self, account_id: Uuid) -> Result<Option<String>, AppError> {
        let email: Option<String> = sqlx::query_scalar("SELECT email FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(email.filter(|e| !e.trim().is_empty()))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpsertAccountRequest {
    pub email: String,
    pub display_name: Option<String>,
}

fn validate(req: &UpsertAccountRequest) -> Result<(), AppError> {
    let email = req.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::Validation(format!("'{email}' is not a valid email address"))),
    }
}

pub async fn upsert_account(
    pool: &PgPool,
    account_id: Uuid,
    req: &UpsertAccountRequest,
) -> Result<Account, AppError> {
    Ok(sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (id, email, display_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE
            SET email = EXCLUDED.email,
                display_name = EXCLUDED.display_name,
                updated_at = now()
        RETURNING *
        "#,
    )
    .bind(account_id)
    .bind(req.email.trim())
    .bind(req.display_name.as_deref().map(str::trim))
    .fetch_one(pool)
    .await?)
}

/// GET /api/v1/account
pub async fn handle_get_account(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Account>, AppError> {
    let account: Option<Account> = sqlx::query_as("SELECT * FROM accounts WHERE id = $1")
        .bind(actor.account_id)
        .fetch_optional(&state.db)
        .await?;
    account
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Account {} has no profile", actor.account_id)))
}

/// PUT /api/v1/account
pub async fn handle_upsert_account(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<UpsertAccountRequest>,
) -> Result<Json<Account>, AppError> {
    validate(&req)?;
    let account = bounded(
        state.config.store_timeout(),
        "save account",
        upsert_account(&state.db, actor.account_id, &req),
    )
    .await?;
    Ok(Json(account))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str) -> UpsertAccountRequest {
        UpsertAccountRequest {
            email: email.to_string(),
            display_name: None,
        }
    }

    #[test]
    fn test_validate_email() {
        assert!(validate(&request("carer@example.com")).is_ok());
        assert!(validate(&request(" carer@example.com ")).is_ok());
        assert!(validate(&request("carer")).is_err());
        assert!(validate(&request("@example.com")).is_err());
        assert!(validate(&request("carer@localhost")).is_err());
    }
}
