//! Purchase orchestration.
//!
//! Drives a transaction through `pending -> paid -> success|failed`
//! using conditional status claims, so replayed webhooks and the
//! redirect/webhook race settle on exactly one top-up per payment.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{NewTransaction, Transaction, User};
use crate::db::store::Store;
use crate::domain::{ConfirmationMethod, Network, PaymentOutcome, TransactionStatus};
use crate::error::AppError;
use crate::notify::{DispatchRecord, Notifier};
use crate::paystack::PaystackClient;
use crate::pricing::MarkupTable;
use crate::reloadly::ReloadlyClient;
use crate::validation::screen::{NumberScreen, ScreenPolicy, ScreenVerdict};
use crate::validation::{self, PhoneError};

pub const DEFAULT_LOW_BALANCE_THRESHOLD: f64 = 100.0;

/// Hand-off to the hosted checkout page.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InitiatedPurchase {
    pub reference: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceReport {
    pub balance: f64,
    pub currency_code: String,
    pub threshold: f64,
    pub low: bool,
}

pub struct PurchaseService {
    store: Arc<dyn Store>,
    paystack: PaystackClient,
    reloadly: ReloadlyClient,
    notifier: Arc<Notifier>,
    markups: Arc<MarkupTable>,
    screen: Option<Arc<dyn NumberScreen>>,
    screen_policy: ScreenPolicy,
    low_balance_threshold: f64,
}

impl PurchaseService {
    pub fn new(
        store: Arc<dyn Store>,
        paystack: PaystackClient,
        reloadly: ReloadlyClient,
        notifier: Arc<Notifier>,
        markups: Arc<MarkupTable>,
    ) -> Self {
        Self {
            store,
            paystack,
            reloadly,
            notifier,
            markups,
            screen: None,
            screen_policy: ScreenPolicy::default(),
            low_balance_threshold: DEFAULT_LOW_BALANCE_THRESHOLD,
        }
    }

    pub fn with_screen(mut self, screen: Arc<dyn NumberScreen>, policy: ScreenPolicy) -> Self {
        self.screen = Some(screen);
        self.screen_policy = policy;
        self
    }

    pub fn with_low_balance_threshold(mut self, threshold: f64) -> Self {
        self.low_balance_threshold = threshold;
        self
    }

    pub fn markups(&self) -> &MarkupTable {
        &self.markups
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Validates the request, prices the plan, registers the charge
    /// with the gateway and records a `pending` transaction keyed by
    /// the gateway's payment reference.
    pub async fn initiate_purchase(
        &self,
        user: &User,
        plan_id: Uuid,
        raw_phone: &str,
    ) -> Result<InitiatedPurchase, AppError> {
        let plan = self
            .store
            .find_plan_by_id(plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("data plan {plan_id} not found")))?;

        let network: Network = plan.provider.parse().map_err(|_| {
            AppError::validation(
                "UNSUPPORTED_NETWORK",
                format!("plans for {} cannot be purchased yet", plan.provider),
            )
        })?;

        let phone =
            validation::validate_for_network(raw_phone, network).map_err(phone_error)?;
        self.screen_number(&phone.e164).await?;

        let amount = self.markups.price(&plan.base_price, &plan.provider);
        let metadata = json!({
            "user_id": user.id,
            "plan_id": plan.id,
            "network": network.as_str(),
            "phone_number": phone.e164,
            "size_gb": plan.size_gb.to_string(),
        });

        let payment = self
            .paystack
            .initialize(&user.email, &amount, metadata)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "payment initialization failed");
                AppError::Upstream(format!("payment initialization failed: {e}"))
            })?;

        let tx = Transaction::pending(NewTransaction {
            user_id: user.id,
            plan_id: plan.id,
            network,
            phone_number: phone.e164.clone(),
            amount,
            payment_reference: payment.reference.clone(),
            confirmation_method: ConfirmationMethod::Both,
            confirmation_contact: Some(phone.e164),
        });
        self.store.create_transaction(&tx).await?;

        tracing::info!(
            reference = %payment.reference,
            user_id = %user.id,
            network = %network,
            "purchase initiated"
        );

        Ok(InitiatedPurchase {
            reference: payment.reference,
            redirect_url: payment.authorization_url,
        })
    }

    /// Browser-redirect leg: verifies the charge server-side, then
    /// feeds the verdict through the same outcome pipeline as the
    /// webhook. Returns whether the payment succeeded.
    pub async fn confirm_from_callback(&self, reference: &str) -> Result<bool, AppError> {
        let verification = self.paystack.verify(reference).await.map_err(|e| {
            tracing::error!(reference, error = %e, "charge verification failed");
            AppError::Upstream(format!("charge verification failed: {e}"))
        })?;

        let outcome = if verification.succeeded {
            PaymentOutcome::Success
        } else {
            tracing::info!(
                reference,
                gateway_status = %verification.gateway_status,
                "charge did not succeed"
            );
            PaymentOutcome::Failure
        };
        self.handle_payment_outcome(reference, outcome).await?;

        Ok(verification.succeeded)
    }

    /// Applies a gateway outcome to the referenced transaction.
    /// Unknown references and already-processed transactions are
    /// logged no-ops, which makes webhook redelivery safe.
    pub async fn handle_payment_outcome(
        &self,
        reference: &str,
        outcome: PaymentOutcome,
    ) -> Result<(), AppError> {
        let Some(tx) = self.store.find_transaction_by_reference(reference).await? else {
            tracing::warn!(reference, "payment event for unknown reference ignored");
            return Ok(());
        };

        match outcome {
            PaymentOutcome::Success => self.process_successful_payment(tx).await,
            PaymentOutcome::Failure => self.process_failed_payment(tx).await,
        }
    }

    async fn process_successful_payment(&self, tx: Transaction) -> Result<(), AppError> {
        let reference = tx.payment_reference.clone();
        let claimed = self
            .store
            .transition_status(&reference, TransactionStatus::Pending, TransactionStatus::Paid)
            .await?;
        if !claimed {
            tracing::info!(reference, status = %tx.status, "payment already processed, skipping");
            return Ok(());
        }

        let plan = self.store.find_plan_by_id(tx.plan_id).await?;
        let user = self.store.find_user_by_id(tx.user_id).await?;
        let (Some(plan), Some(user)) = (plan, user) else {
            tracing::error!(reference, "paid transaction references missing plan or user");
            self.notifier
                .send_admin_alert(
                    "Paid transaction with broken references",
                    &json!({ "reference": reference, "transaction_id": tx.id }),
                )
                .await;
            return Ok(());
        };

        let operator = tx
            .network
            .parse::<Network>()
            .ok()
            .and_then(|network| self.reloadly.operators().resolve(network));
        let Some(operator) = operator else {
            tracing::error!(reference, network = %tx.network, "no operator id mapped for network");
            self.store
                .transition_status(&reference, TransactionStatus::Paid, TransactionStatus::Failed)
                .await?;
            self.notifier
                .send_admin_alert(
                    "Paid transaction for unprovisioned operator",
                    &json!({
                        "reference": reference,
                        "network": tx.network,
                        "user_id": tx.user_id,
                        "amount": tx.amount.to_string(),
                    }),
                )
                .await;
            return Ok(());
        };

        match self.reloadly.topup(&tx.phone_number, operator, &tx.amount).await {
            Ok(reply) => {
                self.store.set_aggregator_response(&reference, &reply).await?;
                self.store
                    .transition_status(
                        &reference,
                        TransactionStatus::Paid,
                        TransactionStatus::Success,
                    )
                    .await?;
                tracing::info!(reference, "bundle delivered");
                self.notifier
                    .send_purchase_confirmation(&tx, &user, &plan)
                    .await;
            }
            Err(e) => {
                tracing::error!(reference, error = %e, "bundle delivery failed");
                self.store
                    .set_aggregator_response(&reference, &json!({ "error": e.to_string() }))
                    .await?;
                self.store
                    .transition_status(
                        &reference,
                        TransactionStatus::Paid,
                        TransactionStatus::Failed,
                    )
                    .await?;
                self.notifier
                    .send_failure_notice(&tx, &user, &e.to_string())
                    .await;
                self.notifier
                    .send_admin_alert(
                        "Bundle delivery failed after payment",
                        &json!({
                            "reference": reference,
                            "network": tx.network,
                            "user_id": tx.user_id,
                            "amount": tx.amount.to_string(),
                            "error": e.to_string(),
                        }),
                    )
                    .await;
            }
        }

        Ok(())
    }

    async fn process_failed_payment(&self, tx: Transaction) -> Result<(), AppError> {
        let reference = tx.payment_reference.clone();
        let claimed = self
            .store
            .transition_status(
                &reference,
                TransactionStatus::Pending,
                TransactionStatus::Failed,
            )
            .await?;
        if !claimed {
            tracing::info!(reference, status = %tx.status, "failure event for settled transaction, skipping");
            return Ok(());
        }

        tracing::info!(reference, "payment failed, transaction closed");

        match self.store.find_user_by_id(tx.user_id).await? {
            Some(user) => {
                self.notifier
                    .send_failure_notice(&tx, &user, "your payment was not completed")
                    .await;
            }
            None => {
                tracing::error!(reference, "failed transaction references missing user");
            }
        }
        self.notifier
            .send_admin_alert(
                "Payment failed",
                &json!({
                    "reference": reference,
                    "user_id": tx.user_id,
                    "amount": tx.amount.to_string(),
                }),
            )
            .await;

        Ok(())
    }

    /// Looks up a transaction for its owner. Admins can read any
    /// transaction.
    pub async fn get_transaction(
        &self,
        user: &User,
        reference: &str,
    ) -> Result<Transaction, AppError> {
        let tx = self
            .store
            .find_transaction_by_reference(reference)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transaction {reference} not found")))?;

        if tx.user_id != user.id && !user.is_admin() {
            return Err(AppError::Forbidden(
                "transaction belongs to another account".to_string(),
            ));
        }
        Ok(tx)
    }

    /// Re-issues the receipt for a delivered purchase over the
    /// channels the customer originally chose.
    pub async fn resend_receipt(
        &self,
        user: &User,
        reference: &str,
    ) -> Result<Vec<DispatchRecord>, AppError> {
        let tx = self.get_transaction(user, reference).await?;
        if tx.status != TransactionStatus::Success.as_str() {
            return Err(AppError::BadRequest(
                "receipts are only available for delivered purchases".to_string(),
            ));
        }

        let plan = self
            .store
            .find_plan_by_id(tx.plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound("plan for this transaction no longer exists".to_string()))?;
        let owner = self
            .store
            .find_user_by_id(tx.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("account for this transaction no longer exists".to_string()))?;

        Ok(self.notifier.resend_receipt(&tx, &owner, &plan).await)
    }

    /// Reads the aggregator balance and raises an admin alert when it
    /// drops under the configured threshold.
    pub async fn check_balance(&self) -> Result<BalanceReport, AppError> {
        let balance = self.reloadly.check_balance().await.map_err(|e| {
            tracing::error!(error = %e, "aggregator balance check failed");
            AppError::Upstream(format!("balance check failed: {e}"))
        })?;

        let low = balance.balance < self.low_balance_threshold;
        if low {
            tracing::warn!(
                balance = balance.balance,
                threshold = self.low_balance_threshold,
                "aggregator balance below threshold"
            );
            self.notifier
                .send_admin_alert(
                    "Aggregator balance low",
                    &json!({
                        "balance": balance.balance,
                        "currency": balance.currency_code,
                        "threshold": self.low_balance_threshold,
                    }),
                )
                .await;
        }

        Ok(BalanceReport {
            balance: balance.balance,
            currency_code: balance.currency_code,
            threshold: self.low_balance_threshold,
            low,
        })
    }

    async fn screen_number(&self, phone_e164: &str) -> Result<(), AppError> {
        let Some(screen) = &self.screen else {
            return Ok(());
        };

        match screen.screen(phone_e164).await {
            Ok(ScreenVerdict::Clear) => Ok(()),
            Ok(ScreenVerdict::Blocked) => Err(AppError::validation(
                "NUMBER_BLOCKED",
                "this number cannot receive bundles",
            )),
            Err(e) => match self.screen_policy {
                ScreenPolicy::FailOpen => {
                    tracing::warn!(error = %e, "number screening unavailable, proceeding");
                    Ok(())
                }
                ScreenPolicy::FailClosed => {
                    tracing::error!(error = %e, "number screening unavailable, rejecting");
                    Err(AppError::validation(
                        "SCREEN_UNAVAILABLE",
                        "number screening is temporarily unavailable, try again shortly",
                    ))
                }
            },
        }
    }
}

fn phone_error(err: PhoneError) -> AppError {
    AppError::Validation {
        code: err.code(),
        message: err.to_string(),
        detected_network: err.detected_network(),
    }
}
