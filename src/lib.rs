pub mod api;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod models;
pub mod reminders;

pub use api::{router, AppState};

use config::{ConfigError, Settings};
use db::Store;
use error::{AppError, AppResult};
use reminders::{LogNotifier, ReminderScheduler};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    App(#[from] AppError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Prepares a freshly opened store for serving: the admin account and, when
/// enabled, the demo catalog.
pub fn bootstrap(store: Store, settings: &Settings) -> AppResult<AppState> {
    let state = AppState::new(store.clone(), settings);
    state.credentials.seed_admin(
        &settings.admin_name,
        &settings.admin_email,
        &settings.admin_password,
    )?;
    if settings.seed_demo_books {
        let conn = store.lock()?;
        db::seed_demo_books(&conn)?;
    }
    Ok(state)
}

/// `RUST_LOG` wins over the configured level when set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("logger already initialised");
    }
}

pub fn run() -> Result<(), StartupError> {
    let settings = Settings::load()?;
    init_logging(&settings.log_level);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(settings))
}

pub async fn serve(settings: Settings) -> Result<(), StartupError> {
    settings.validate()?;
    let store = Store::open(&settings.database_path)?;
    log::info!("[db] using {}", settings.database_path.display());
    let state = bootstrap(store.clone(), &settings)?;

    let reminders = ReminderScheduler::new(store, Arc::new(LogNotifier))
        .spawn(Duration::from_secs(settings.reminder_interval_secs));

    let listener = tokio::net::TcpListener::bind(&settings.bind).await?;
    log::info!("[server] listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reminders.abort();
    log::info!("[server] stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("[server] cannot listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
    log::info!("[server] shutting down");
}
