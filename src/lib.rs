pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod notify;
pub mod paystack;
pub mod pricing;
pub mod reloadly;
pub mod services;
pub mod startup;
pub mod utils;
pub mod validation;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;

use crate::config::Config;
use crate::db::Store;
use crate::notify::{EmailClient, Notifier, SmsClient};
use crate::paystack::PaystackClient;
use crate::pricing::MarkupTable;
use crate::reloadly::{OperatorMap, ReloadlyClient};
use crate::services::PurchaseService;
use crate::validation::screen::{HttpNumberScreen, NumberScreen};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub purchase: Arc<PurchaseService>,
    pub markups: Arc<MarkupTable>,
    pub notifier: Arc<Notifier>,
    pub paystack: PaystackClient,
    pub config: Arc<Config>,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DataWaves API",
        description = "Mobile data bundle resale for Ghana: plan catalog, phone validation, Paystack checkout and Reloadly fulfillment."
    ),
    paths(handlers::health, handlers::plans::list_plans),
    components(schemas(handlers::HealthStatus, handlers::plans::PlanResponse)),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Plans", description = "Data plan catalog")
    )
)]
pub struct ApiDoc;

pub fn reloadly_client(config: &Config) -> ReloadlyClient {
    let operators = OperatorMap {
        mtn: config.operator_id_mtn,
        telecel: config.operator_id_telecel,
        airteltigo: config.operator_id_airteltigo,
    };
    ReloadlyClient::new(
        config.reloadly_auth_url.clone(),
        config.reloadly_base_url.clone(),
        config.reloadly_client_id.clone(),
        config.reloadly_client_secret.clone(),
        operators,
    )
}

/// Wires the full application state from configuration and a store.
/// Markups are loaded from the store up front so the first purchase
/// already prices correctly.
pub async fn build_state(config: Config, store: Arc<dyn Store>) -> anyhow::Result<AppState> {
    let markups = Arc::new(MarkupTable::load(store.as_ref()).await?);

    let paystack = PaystackClient::new(
        config.paystack_base_url.clone(),
        config.paystack_secret_key.clone(),
        format!("{}/purchase/callback", config.app_url),
    );
    let reloadly = reloadly_client(&config);
    let notifier = Arc::new(Notifier::new(
        EmailClient::new(
            config.email_api_url.clone(),
            config.email_api_key.clone(),
            config.email_from.clone(),
        ),
        SmsClient::new(config.sms_api_url.clone(), config.sms_api_key.clone()),
        config.admin_email.clone(),
        config.admin_phone.clone(),
    ));

    let mut purchase = PurchaseService::new(
        store.clone(),
        paystack.clone(),
        reloadly,
        notifier.clone(),
        markups.clone(),
    )
    .with_low_balance_threshold(config.low_balance_threshold);

    if let Some(screen_url) = &config.screen_url {
        let screen: Arc<dyn NumberScreen> = Arc::new(HttpNumberScreen::new(
            screen_url.clone(),
            config.screen_api_key.clone(),
        ));
        purchase = purchase.with_screen(screen, config.screen_policy);
    }

    Ok(AppState {
        store,
        purchase: Arc::new(purchase),
        markups,
        notifier,
        paystack,
        config: Arc::new(config),
    })
}

pub fn create_app(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/admin/markups",
            get(handlers::admin::get_markups).put(handlers::admin::update_markup),
        )
        .route("/admin/balance", get(handlers::admin::get_balance))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::admin_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/openapi.json", get(handlers::openapi_doc))
        .route("/plans", get(handlers::plans::list_plans))
        .route("/validate/phone", post(handlers::validate::validate_phone))
        .route("/validate/networks", get(handlers::validate::list_networks))
        .route("/purchase/initialize", post(handlers::purchase::initialize))
        .route("/purchase/callback", get(handlers::purchase::callback))
        .route("/purchase/webhook", post(handlers::purchase::webhook))
        .route(
            "/purchase/status/:reference",
            get(handlers::purchase::status),
        )
        .route(
            "/purchase/resend-receipt",
            post(handlers::purchase::resend_receipt),
        )
        .merge(admin_routes)
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    match &config.cors_allowed_origins {
        Some(raw) => {
            let origins: Vec<HeaderValue> = raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .filter_map(|origin| origin.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    }
}
