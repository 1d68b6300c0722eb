//! Admin endpoints, mounted behind the shared-key gate.

use std::collections::BTreeMap;
use std::str::FromStr;

use axum::{extract::State, Json};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::services::BalanceReport;
use crate::AppState;

pub async fn get_markups(State(state): State<AppState>) -> Json<serde_json::Value> {
    // BTreeMap for a stable listing order
    let markups: BTreeMap<String, String> = state
        .markups
        .snapshot()
        .into_iter()
        .map(|(network, percent)| (network, percent.to_string()))
        .collect();

    Json(json!({ "markups": markups }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateMarkupRequest {
    pub network: String,
    /// Percentage on top of the base price, e.g. `7.5`.
    pub markup: serde_json::Number,
}

pub async fn update_markup(
    State(state): State<AppState>,
    Json(req): Json<UpdateMarkupRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    // via the JSON literal to keep the decimal exact
    let percent = BigDecimal::from_str(&req.markup.to_string()).map_err(|_| {
        AppError::validation("INVALID_MARKUP", "markup must be a decimal percentage")
    })?;

    let saved = state
        .markups
        .set(state.store.as_ref(), &req.network, percent)
        .await?;

    tracing::info!(network = %saved.network, percent = %saved.percent, "markup updated");

    Ok(Json(json!({
        "network": saved.network,
        "percent": saved.percent.to_string(),
        "updated_at": saved.updated_at,
    })))
}

pub async fn get_balance(State(state): State<AppState>) -> Result<Json<BalanceReport>, AppError> {
    let report = state.purchase.check_balance().await?;
    Ok(Json(report))
}
