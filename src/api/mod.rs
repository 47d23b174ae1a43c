//! HTTP surface. Every route lives under `/api`.

pub mod admin;
pub mod auth;
pub mod storefront;

use crate::catalog::CatalogStore;
use crate::config::Settings;
use crate::credentials::CredentialStore;
use crate::db::Store;
use crate::error::AppError;
use crate::ledger::Ledger;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRef, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Json, Router};
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialStore,
    pub catalog: CatalogStore,
    pub ledger: Ledger,
}

impl AppState {
    pub fn new(store: Store, settings: &Settings) -> Self {
        Self {
            credentials: CredentialStore::new(
                store.clone(),
                &settings.token_secret,
                chrono::Duration::seconds(settings.token_ttl_secs),
                settings.bcrypt_cost,
            ),
            catalog: CatalogStore::new(store.clone()),
            ledger: Ledger::new(store),
        }
    }
}

impl FromRef<AppState> for CredentialStore {
    fn from_ref(state: &AppState) -> Self {
        state.credentials.clone()
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::routes())
        .merge(storefront::routes())
        .merge(admin::routes());
    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis();
    if status >= 400 {
        log::warn!("[http] {} {} -> {} ({} ms)", method, path, status, duration_ms);
    } else {
        log::info!("[http] {} {} -> {} ({} ms)", method, path, status, duration_ms);
    }
    response
}

/// Unwraps a JSON body, turning a malformed one into a 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Path ids that are not integers can never match a row.
pub(crate) fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// Runs blocking credential work (password hashing) off the async thread.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| AppError::Internal(err.to_string()))?
}
