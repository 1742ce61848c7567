//! DOA endpoint

use axum::extract::State;

use super::envelope::{ApiError, Envelope};
use crate::AppState;

/// GET /api/krakensdr/get_doa
///
/// Latest DOA estimate from the device feed under `doa_info`, or `null`
/// when the feed is empty or unreachable. Feed trouble is never an error
/// envelope.
pub async fn get_doa(State(state): State<AppState>) -> Result<Envelope, ApiError> {
    let host = state.doa_feed.host().to_string();
    let records = state.doa_feed.fetch_and_process(&host).await;

    Envelope::ok().with("doa_info", records.into_iter().next())
}
