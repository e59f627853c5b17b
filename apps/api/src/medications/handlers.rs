use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::auth::Actor;
use crate::db::bounded;
use crate::errors::AppError;
use crate::medications::store::{
    deactivate_medication, get_medication, insert_medication, list_active, update_medication,
};
use crate::medications::MedicationRequest;
use crate::models::medication::Medication;
use crate::state::AppState;

/// GET /api/v1/medications
pub async fn handle_list_medications(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<Medication>>, AppError> {
    Ok(Json(list_active(&state.db, actor.account_id).await?))
}

/// POST /api/v1/medications
pub async fn handle_add_medication(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<MedicationRequest>,
) -> Result<(StatusCode, Json<Medication>), AppError> {
    actor.require_caretaker()?;
    let input = req.validate()?;

    let medication = bounded(
        state.config.store_timeout(),
        "add medication",
        insert_medication(&state.db, actor.account_id, &input),
    )
    .await?;

    info!(
        "Medication {} ({}) added for account {}",
        medication.id, medication.name, actor.account_id
    );
    Ok((StatusCode::CREATED, Json(medication)))
}

/// GET /api/v1/medications/:id
pub async fn handle_get_medication(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Medication>, AppError> {
    Ok(Json(get_medication(&state.db, actor.account_id, id).await?))
}

/// PUT /api/v1/medications/:id
pub async fn handle_update_medication(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<MedicationRequest>,
) -> Result<Json<Medication>, AppError> {
    actor.require_caretaker()?;
    let input = req.validate()?;

    let medication = bounded(
        state.config.store_timeout(),
        "update medication",
        update_medication(&state.db, actor.account_id, id, &input),
    )
    .await?;
    Ok(Json(medication))
}

/// DELETE /api/v1/medications/:id
pub async fn handle_delete_medication(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    actor.require_caretaker()?;
    bounded(
        state.config.store_timeout(),
        "delete medication",
        deactivate_medication(&state.db, actor.account_id, id),
    )
    .await?;

    info!("Medication {id} deactivated for account {}", actor.account_id);
    Ok(StatusCode::NO_CONTENT)
}
