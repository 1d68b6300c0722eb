use std::env;

use anyhow::Context;
use dotenvy::dotenv;

use crate::validation::screen::ScreenPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    /// Public base URL of this deployment, used to build the payment
    /// callback and redirect targets.
    pub app_url: String,

    pub paystack_secret_key: String,
    pub paystack_base_url: String,

    pub reloadly_client_id: String,
    pub reloadly_client_secret: String,
    pub reloadly_base_url: String,
    pub reloadly_auth_url: String,
    pub operator_id_mtn: Option<i64>,
    pub operator_id_telecel: Option<i64>,
    pub operator_id_airteltigo: Option<i64>,
    pub low_balance_threshold: f64,

    pub email_api_url: String,
    pub email_api_key: Option<String>,
    pub email_from: String,
    pub sms_api_url: String,
    pub sms_api_key: Option<String>,

    pub admin_email: Option<String>,
    pub admin_phone: Option<String>,
    pub admin_api_key: String,

    pub screen_url: Option<String>,
    pub screen_api_key: Option<String>,
    pub screen_policy: ScreenPolicy,

    pub payment_success_url: String,
    pub payment_failed_url: String,
    pub cors_allowed_origins: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let app_url =
            env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let app_url = app_url.trim_end_matches('/').to_string();

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a number")?,

            paystack_secret_key: env::var("PAYSTACK_SECRET_KEY")
                .context("PAYSTACK_SECRET_KEY is required")?,
            paystack_base_url: env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),

            reloadly_client_id: env::var("RELOADLY_CLIENT_ID")
                .context("RELOADLY_CLIENT_ID is required")?,
            reloadly_client_secret: env::var("RELOADLY_CLIENT_SECRET")
                .context("RELOADLY_CLIENT_SECRET is required")?,
            reloadly_base_url: env::var("RELOADLY_BASE_URL")
                .unwrap_or_else(|_| "https://topups.reloadly.com".to_string()),
            reloadly_auth_url: env::var("RELOADLY_AUTH_URL")
                .unwrap_or_else(|_| "https://auth.reloadly.com/oauth/token".to_string()),
            operator_id_mtn: operator_id("RELOADLY_OPERATOR_MTN", 1)?,
            operator_id_telecel: operator_id("RELOADLY_OPERATOR_TELECEL", 2)?,
            operator_id_airteltigo: operator_id("RELOADLY_OPERATOR_AIRTELTIGO", 3)?,
            low_balance_threshold: env::var("LOW_BALANCE_THRESHOLD")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("LOW_BALANCE_THRESHOLD must be a number")?,

            email_api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
            email_api_key: optional("EMAIL_API_KEY"),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "no-reply@datawaves.app".to_string()),
            sms_api_url: env::var("SMS_API_URL")
                .unwrap_or_else(|_| "https://api.smsphoneapi.com/v1/send".to_string()),
            sms_api_key: optional("SMS_API_KEY"),

            admin_email: optional("ADMIN_EMAIL"),
            admin_phone: optional("ADMIN_PHONE"),
            admin_api_key: env::var("ADMIN_API_KEY")
                .unwrap_or_else(|_| "admin-secret-key".to_string()),

            screen_url: optional("SCREEN_URL"),
            screen_api_key: optional("SCREEN_API_KEY"),
            screen_policy: env::var("SCREEN_POLICY")
                .unwrap_or_else(|_| "fail_open".to_string())
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?,

            payment_success_url: env::var("PAYMENT_SUCCESS_URL")
                .unwrap_or_else(|_| format!("{app_url}/payment-success.html")),
            payment_failed_url: env::var("PAYMENT_FAILED_URL")
                .unwrap_or_else(|_| format!("{app_url}/payment-failed.html")),
            cors_allowed_origins: optional("CORS_ALLOWED_ORIGINS"),

            app_url,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Operator mappings default to the known Ghana ids; setting the
/// variable to `none` takes the network out of service deliberately.
fn operator_id(key: &str, default: i64) -> anyhow::Result<Option<i64>> {
    match env::var(key) {
        Err(_) => Ok(Some(default)),
        Ok(raw) => {
            let raw = raw.trim().to_lowercase();
            if raw.is_empty() || raw == "none" {
                return Ok(None);
            }
            let id = raw
                .parse::<i64>()
                .with_context(|| format!("{key} must be an operator id or 'none'"))?;
            Ok(Some(id))
        }
    }
}
