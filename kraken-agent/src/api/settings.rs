//! Settings endpoints
//!
//! Reads and writes go to the shared settings document on the blocking
//! pool. A request's whole change set is validated before the document is
//! touched and is then written exactly once.

use axum::extract::{Query, State};
use tracing::{error, info};

use super::envelope::{ApiError, Envelope};
use super::params::{QueryParams, SettingsRequest};
use crate::AppState;

/// Run a settings store call off the async workers
async fn run_blocking<T, F>(operation: F) -> Result<T, ApiError>
where
    F: FnOnce() -> kraken_common::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(operation).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            error!("Settings task failed: {}", e);
            Err(ApiError::internal(format!("Settings task failed: {}", e)))
        }
    }
}

/// GET /api/krakensdr/get_config
///
/// Returns the full settings document under `settings`.
pub async fn get_config(State(state): State<AppState>) -> Result<Envelope, ApiError> {
    let store = state.settings.clone();
    let document = run_blocking(move || store.get_config())
        .await
        .map_err(|e| ApiError::new(e.kind(), format!("ERROR getting config: {}", e.message())))?;

    Envelope::ok().with("settings", document)
}

/// GET /api/krakensdr/<setter>
///
/// Shared by every endpoint that changes settings; `R` decides which
/// parameters are needed and what gets written.
pub async fn apply_settings<R: SettingsRequest>(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Envelope, ApiError> {
    let params = QueryParams::from_pairs(pairs);
    let update = R::from_query(&params)?.into_update()?;

    let keys: Vec<String> = update.keys().map(str::to_string).collect();
    let store = state.settings.clone();
    run_blocking(move || store.apply(&update))
        .await
        .map_err(|e| ApiError::new(e.kind(), format!("ERROR setting value: {}", e.message())))?;

    info!(?keys, "Settings updated");
    Ok(Envelope::ok())
}
