//! Purchase endpoints: checkout initiation, the browser callback leg,
//! the gateway webhook, status lookup and receipt resends.

use axum::{
    async_trait,
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
    response::Redirect,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::db::models::Transaction;
use crate::domain::PaymentOutcome;
use crate::error::AppError;
use crate::middleware::AuthedUser;
use crate::services::InitiatedPurchase;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    pub plan_id: Uuid,
    pub phone_number: String,
}

pub async fn initialize(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Json(req): Json<InitiateRequest>,
) -> Result<Json<InitiatedPurchase>, AppError> {
    let initiated = state
        .purchase
        .initiate_purchase(&user, req.plan_id, &req.phone_number)
        .await?;
    Ok(Json(initiated))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub reference: Option<String>,
    // Paystack repeats the reference under this name
    pub trxref: Option<String>,
}

/// Browser return leg of the hosted checkout. Always redirects to the
/// success or failure page; the webhook remains the source of truth
/// for fulfillment.
pub async fn callback(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<CallbackQuery>,
) -> Redirect {
    let Some(reference) = query.reference.or(query.trxref) else {
        tracing::warn!("payment callback without a reference");
        return Redirect::to(&state.config.payment_failed_url);
    };

    match state.purchase.confirm_from_callback(&reference).await {
        Ok(true) => Redirect::to(&format!(
            "{}?reference={}",
            state.config.payment_success_url, reference
        )),
        Ok(false) => Redirect::to(&format!(
            "{}?reference={}",
            state.config.payment_failed_url, reference
        )),
        Err(e) => {
            tracing::error!(reference, error = %e, "payment callback processing failed");
            Redirect::to(&format!(
                "{}?reference={}",
                state.config.payment_failed_url, reference
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookData {
    pub reference: Option<String>,
}

/// Webhook body that passed the `x-paystack-signature` check. The
/// signature covers the raw bytes, so verification happens before any
/// JSON parsing.
pub struct VerifiedWebhook(pub WebhookEvent);

#[async_trait]
impl FromRequest<AppState> for VerifiedWebhook {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let signature = req
            .headers()
            .get("x-paystack-signature")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("missing webhook signature".to_string()))?;

        let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
            .await
            .map_err(|_| AppError::BadRequest("unreadable webhook body".to_string()))?;

        if !state.paystack.validate_signature(&bytes, &signature) {
            tracing::warn!("webhook rejected: signature mismatch");
            return Err(AppError::BadRequest(
                "invalid webhook signature".to_string(),
            ));
        }

        let event: WebhookEvent = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::BadRequest(format!("malformed webhook payload: {e}")))?;
        Ok(VerifiedWebhook(event))
    }
}

/// Gateway-to-server event feed. Replies 200 for everything that
/// authenticated, including events we do not act on, so the gateway
/// stops redelivering them.
pub async fn webhook(
    State(state): State<AppState>,
    VerifiedWebhook(event): VerifiedWebhook,
) -> Result<StatusCode, AppError> {
    match event.event.as_str() {
        "charge.success" | "charge.failed" => {
            let Some(reference) = event.data.reference else {
                tracing::warn!(event = %event.event, "charge event without a reference");
                return Ok(StatusCode::OK);
            };
            let outcome = if event.event == "charge.success" {
                PaymentOutcome::Success
            } else {
                PaymentOutcome::Failure
            };
            state
                .purchase
                .handle_payment_outcome(&reference, outcome)
                .await?;
        }
        other => {
            tracing::info!(event = other, "ignoring webhook event");
        }
    }

    Ok(StatusCode::OK)
}

/// Transaction view with money rendered as decimal strings.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub reference: String,
    pub status: String,
    pub network: String,
    pub phone_number: String,
    pub amount: String,
    pub plan_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self {
            reference: tx.payment_reference,
            status: tx.status,
            network: tx.network,
            phone_number: tx.phone_number,
            amount: tx.amount.to_string(),
            plan_id: tx.plan_id,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

pub async fn status(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(reference): Path<String>,
) -> Result<Json<TransactionResponse>, AppError> {
    let tx = state.purchase.get_transaction(&user, &reference).await?;
    Ok(Json(TransactionResponse::from(tx)))
}

#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    pub reference: String,
}

pub async fn resend_receipt(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Json(req): Json<ResendRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let records = state.purchase.resend_receipt(&user, &req.reference).await?;

    let sent: Vec<_> = records
        .iter()
        .map(|record| {
            json!({
                "channel": record.channel,
                "delivered": record.delivered(),
            })
        })
        .collect();

    Ok(Json(json!({ "success": true, "sent": sent })))
}
