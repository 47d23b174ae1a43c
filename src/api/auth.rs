use super::{blocking, json_body, AppState};
use crate::error::AppResult;
use crate::models::Role;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    role: Role,
    name: String,
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let body = json_body(payload)?;
    let credentials = state.credentials.clone();
    let id = blocking(move || {
        credentials.register(
            body.name.as_deref().unwrap_or_default(),
            body.email.as_deref().unwrap_or_default(),
            body.password.as_deref().unwrap_or_default(),
        )
    })
    .await?;
    log::info!("[auth] registered user {}", id);
    Ok(Json(json!({ "id": id })))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let body = json_body(payload)?;
    let credentials = state.credentials.clone();
    let (token, user) = blocking(move || {
        let user = credentials.verify(
            body.email.as_deref().unwrap_or_default(),
            body.password.as_deref().unwrap_or_default(),
        )?;
        let token = credentials.issue_session(&user)?;
        Ok((token, user))
    })
    .await?;
    Ok(Json(LoginResponse {
        token,
        role: user.role,
        name: user.name,
    }))
}
