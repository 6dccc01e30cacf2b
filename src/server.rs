//! The `/updateDNS` trigger.
//!
//! The candidate address is taken verbatim from `X-Forwarded-For`: the
//! service is meant to sit behind a reverse proxy that sets that header, and
//! does not validate it further.

use std::{path::PathBuf, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;

use crate::{
    config::UDConfig,
    ddns::{self, Upserted},
    resolve,
};

pub const FORWARDED_FOR: &str = "X-Forwarded-For";

#[derive(Clone)]
pub struct AppState {
    pub config_path: PathBuf,
    pub resolver: Arc<dyn resolve::Resolve + Send + Sync>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct StatusBody {
    pub status: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/updateDNS", get(update_dns))
        .with_state(state)
}

async fn update_dns(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatusBody>, AppError> {
    // Re-read on every request so edits apply without a restart.
    let config = UDConfig::load_from_path(&state.config_path)?;

    let client_ip = headers
        .get(FORWARDED_FOR)
        .ok_or_else(|| anyhow::anyhow!("Request carries no {} header", FORWARDED_FOR))?
        .to_str()?;

    if !resolve::needs_update(state.resolver.as_ref(), &config.domain, client_ip).await? {
        tracing::info!("No update needed");
        return Ok(Json(StatusBody {
            status: "No update needed",
        }));
    }

    tracing::info!(ip = %client_ip, "Updating record");
    match ddns::from_config(&config)?.upsert_a(client_ip).await? {
        Upserted::Patched { record_id } => tracing::info!(record_id = %record_id, "Record patched"),
        Upserted::Created => tracing::info!("Record created"),
    }

    Ok(Json(StatusBody { status: "Updated" }))
}

/// Collapses every failure into one opaque response; the detail only goes to
/// the log.
pub struct AppError(anyhow::Error);

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = ?self.0, "An exception occured");

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusBody {
                status: "An error occured",
            }),
        )
            .into_response()
    }
}
