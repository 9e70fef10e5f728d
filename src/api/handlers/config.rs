//! `GET /api/v1/config` and `PUT /api/v1/config`

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::extract::ValidatedJson;
use crate::api::state::AppState;
use crate::config::NodeConfig;
use crate::error::ApiError;
use crate::model::Response;

pub async fn get_config(State(state): State<AppState>) -> Json<Response<NodeConfig>> {
    let cfg = state.config.read().await.clone();
    Json(Response::new(cfg))
}

#[derive(Debug, Serialize)]
pub struct SaveConfigResponse {
    pub status: &'static str,
}

/// Validates and persists a new config, then hands it to the
/// orchestrator's reload loop. The reload itself runs asynchronously --
/// this handler returns as soon as the config is saved, matching
/// spec.md §6's "PUT /config triggers an asynchronous config-reload
/// callback".
pub async fn put_config(
    State(state): State<AppState>,
    ValidatedJson(mut new_config): ValidatedJson<NodeConfig>,
) -> Result<Json<Response<SaveConfigResponse>>, ApiError> {
    new_config.apply_defaults_and_validate().map_err(ApiError::from)?;

    new_config.save(state.config_path.as_str()).map_err(ApiError::from)?;
    *state.config.write().await = new_config.clone();

    if state.reload_tx.send(new_config).await.is_err() {
        tracing::warn!("config reload channel closed; new config saved but not applied live");
    }

    Ok(Json(Response::new(SaveConfigResponse { status: "saved" })))
}
