use anyhow::{Context, Result};
use sqlx::PgPool;
use std::time::Duration;

use crate::config::Config;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub paystack: bool,
    pub reloadly: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.paystack && self.reloadly
    }

    /// Environment and database must hold for the service to run at
    /// all; unreachable upstreams only degrade it.
    pub fn required_ok(&self) -> bool {
        self.environment && self.database
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Paystack Reachability: {}", status(self.paystack));
        println!("Reloadly Reachability: {}", status(self.reloadly));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() { "✅ PASS" } else { "❌ FAIL" }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "✅ OK"
    } else {
        "❌ FAIL"
    }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        paystack: true,
        reloadly: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {}", e));
    }

    if let Err(e) = validate_reachable(&config.paystack_base_url).await {
        report.paystack = false;
        report.errors.push(format!("Paystack: {}", e));
    }

    if let Err(e) = validate_reachable(&config.reloadly_base_url).await {
        report.reloadly = false;
        report.errors.push(format!("Reloadly: {}", e));
    }

    Ok(report)
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL is empty");
    }
    if config.paystack_secret_key.is_empty() {
        anyhow::bail!("PAYSTACK_SECRET_KEY is empty");
    }
    if config.reloadly_client_id.is_empty() || config.reloadly_client_secret.is_empty() {
        anyhow::bail!("RELOADLY_CLIENT_ID / RELOADLY_CLIENT_SECRET are required");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.low_balance_threshold < 0.0 {
        anyhow::bail!("LOW_BALANCE_THRESHOLD must not be negative");
    }

    url::Url::parse(&config.app_url).context("APP_URL is not a valid URL")?;
    url::Url::parse(&config.paystack_base_url).context("PAYSTACK_BASE_URL is not a valid URL")?;
    url::Url::parse(&config.reloadly_base_url).context("RELOADLY_BASE_URL is not a valid URL")?;
    url::Url::parse(&config.reloadly_auth_url).context("RELOADLY_AUTH_URL is not a valid URL")?;

    if config.screen_url.is_some() && config.screen_api_key.is_none() {
        tracing::warn!("SCREEN_URL set without SCREEN_API_KEY, screening calls go unauthenticated");
    }

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

/// Transport-level reachability only. Gateways answer errors for bare
/// GETs; any HTTP response means the host is up.
async fn validate_reachable(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    client
        .get(base_url)
        .send()
        .await
        .with_context(|| format!("Failed to connect to {base_url}"))?;

    Ok(())
}
