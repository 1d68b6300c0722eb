use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    pub provider: Option<String>,
}

/// Catalog entry with the live customer price applied. Prices are
/// decimal strings to keep cedis exact on the wire.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlanResponse {
    pub id: Uuid,
    pub provider: String,
    pub size_gb: String,
    pub base_price: String,
    pub customer_price: String,
}

#[utoipa::path(
    get,
    path = "/plans",
    params(
        ("provider" = Option<String>, Query, description = "Filter by network provider")
    ),
    responses(
        (status = 200, description = "Available data plans", body = [PlanResponse])
    ),
    tag = "Plans"
)]
pub async fn list_plans(
    State(state): State<AppState>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<Vec<PlanResponse>>, AppError> {
    let provider = query
        .provider
        .as_deref()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty());

    let plans = state.store.list_plans(provider.as_deref()).await?;

    let priced = plans
        .into_iter()
        .map(|plan| {
            let customer_price = state.markups.price(&plan.base_price, &plan.provider);
            PlanResponse {
                id: plan.id,
                provider: plan.provider,
                size_gb: plan.size_gb.to_string(),
                base_price: plan.base_price.to_string(),
                customer_price: customer_price.to_string(),
            }
        })
        .collect();

    Ok(Json(priced))
}
