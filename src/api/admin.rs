use super::{json_body, parse_id, AppState};
use crate::catalog::{parse_status, BookInput};
use crate::error::{AppError, AppResult};
use crate::gate::AdminIdentity;
use crate::models::{AdminRental, Book};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, patch, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/books", get(list_books).post(create_book))
        .route("/admin/books/:id", put(update_book))
        .route("/admin/books/:id/status", patch(set_status))
        .route("/admin/rentals", get(list_rentals))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: Option<String>,
}

/// Admin writes report bad input under the `error` key.
fn admin_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    json_body(payload).map_err(|err| match err {
        AppError::Validation(message) => AppError::Rejected(message),
        other => other,
    })
}

async fn list_books(
    State(state): State<AppState>,
    AdminIdentity(_): AdminIdentity,
) -> AppResult<Json<Vec<Book>>> {
    Ok(Json(state.catalog.list_all()?))
}

async fn create_book(
    State(state): State<AppState>,
    AdminIdentity(_): AdminIdentity,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let input = admin_body(payload)?;
    let id = state.catalog.create(input)?;
    Ok(Json(json!({ "id": id })))
}

async fn update_book(
    State(state): State<AppState>,
    AdminIdentity(_): AdminIdentity,
    Path(id): Path<String>,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let input = admin_body(payload)?;
    let updated = match parse_id(&id) {
        Some(id) => state.catalog.update(id, input)?,
        None => 0,
    };
    Ok(Json(json!({ "updated": updated })))
}

async fn set_status(
    State(state): State<AppState>,
    AdminIdentity(_): AdminIdentity,
    Path(id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let body = admin_body(payload)?;
    let status = parse_status(body.status.as_deref().unwrap_or_default())?;
    let updated = match parse_id(&id) {
        Some(id) => state.catalog.set_status(id, status)?,
        None => 0,
    };
    Ok(Json(json!({ "updated": updated })))
}

async fn list_rentals(
    State(state): State<AppState>,
    AdminIdentity(_): AdminIdentity,
) -> AppResult<Json<Vec<AdminRental>>> {
    Ok(Json(state.ledger.list_all(Utc::now())?))
}
