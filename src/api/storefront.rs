use super::{json_body, parse_id, AppState};
use crate::catalog::BookFilter;
use crate::error::{AppError, AppResult};
use crate::gate::Identity;
use crate::ledger::parse_period;
use crate::models::{Book, UserRental};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books))
        .route("/books/:id", get(get_book))
        .route("/buy", post(buy))
        .route("/rent", post(rent))
        .route("/my/rentals", get(my_rentals))
}

#[derive(Debug, Deserialize)]
struct BuyRequest {
    #[serde(rename = "bookId")]
    book_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RentRequest {
    #[serde(rename = "bookId")]
    book_id: Option<i64>,
    period: Option<String>,
}

async fn list_books(
    State(state): State<AppState>,
    Query(filter): Query<BookFilter>,
) -> AppResult<Json<Vec<Book>>> {
    Ok(Json(state.catalog.search(&filter)?))
}

async fn get_book(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Book>> {
    let id = parse_id(&id).ok_or(AppError::BookNotFound)?;
    Ok(Json(state.catalog.get(id)?))
}

async fn buy(
    State(state): State<AppState>,
    Identity(claims): Identity,
    payload: Result<Json<BuyRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let body = json_body(payload)?;
    let book_id = body.book_id.ok_or(AppError::NotPurchasable)?;
    let id = state.ledger.purchase(claims.id, book_id, Utc::now())?;
    Ok(Json(json!({ "id": id, "message": "Покупка оформлена успешно" })))
}

async fn rent(
    State(state): State<AppState>,
    Identity(claims): Identity,
    payload: Result<Json<RentRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let body = json_body(payload)?;
    let period = parse_period(body.period.as_deref())?;
    let book_id = body.book_id.ok_or(AppError::NotRentable)?;
    let id = state.ledger.rent(claims.id, book_id, period, Utc::now())?;
    Ok(Json(json!({ "id": id, "message": "Аренда оформлена успешно" })))
}

async fn my_rentals(
    State(state): State<AppState>,
    Identity(claims): Identity,
) -> AppResult<Json<Vec<UserRental>>> {
    Ok(Json(state.ledger.list_for_user(claims.id, Utc::now())?))
}
