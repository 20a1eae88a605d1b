use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// Log output format. Defaults to JSON in production and pretty elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn default_for(env: &Environment) -> Self {
        if env.is_prod() {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Business knobs shared by admission, the state machine and payments.
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    /// Discount applied to PRO members, in percent (5 = 5%).
    pub pro_discount_percentage: Decimal,
    /// One-off price of the Pro membership.
    pub pro_price: Decimal,
    /// Deposit charged when a condition report flags damage.
    pub damage_deposit_amount: Decimal,
    /// ISO currency code sent to the gateway.
    pub currency: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            pro_discount_percentage: Decimal::from(5),
            pro_price: Decimal::from(25),
            damage_deposit_amount: Decimal::from(50),
            currency: "eur".to_string(),
            checkout_success_url: "http://localhost:5173/payment/success".to_string(),
            checkout_cancel_url: "http://localhost:5173/payment/cancelled".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,
    pub log_format: LogFormat,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Payment gateway
    pub stripe_api_base: String,
    /// When absent the simulated gateway is used.
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: String,
    pub stripe_payout_destination: Option<String>,
    pub payment_timeout_seconds: u64,

    pub booking_policy: BookingPolicy,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let log_format = env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| LogFormat::parse(&s))
            .unwrap_or_else(|| LogFormat::default_for(&env));

        // Database
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Payment gateway
        let stripe_api_base =
            env::var("STRIPE_API_BASE").unwrap_or_else(|_| "https://api.stripe.com".to_string());
        let stripe_secret_key = env::var("STRIPE_SECRET_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let stripe_webhook_secret = match env::var("STRIPE_WEBHOOK_SECRET") {
            Ok(secret) => secret,
            Err(_) if stripe_secret_key.is_none() => "whsec_dev".to_string(),
            Err(_) => anyhow::bail!("STRIPE_WEBHOOK_SECRET must be set when STRIPE_SECRET_KEY is"),
        };
        let stripe_payout_destination = env::var("STRIPE_PAYOUT_DESTINATION").ok();
        let payment_timeout_seconds = env::var("PAYMENT_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        // Booking policy
        let defaults = BookingPolicy::default();
        let booking_policy = BookingPolicy {
            pro_discount_percentage: decimal_var("PRO_DISCOUNT_PERCENTAGE")?
                .unwrap_or(defaults.pro_discount_percentage),
            pro_price: decimal_var("PRO_PRICE")?.unwrap_or(defaults.pro_price),
            damage_deposit_amount: decimal_var("DAMAGE_DEPOSIT_AMOUNT")?
                .unwrap_or(defaults.damage_deposit_amount),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or(defaults.currency),
            checkout_success_url: env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or(defaults.checkout_success_url),
            checkout_cancel_url: env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or(defaults.checkout_cancel_url),
        };

        Ok(Settings {
            env,
            server_addr,
            log_format,
            database_url,
            database_max_connections,
            cors_allow_origins,
            stripe_api_base,
            stripe_secret_key,
            stripe_webhook_secret,
            stripe_payout_destination,
            payment_timeout_seconds,
            booking_policy,
        })
    }
}

fn decimal_var(name: &str) -> Result<Option<Decimal>> {
    match env::var(name) {
        Ok(raw) => Decimal::from_str(raw.trim())
            .map(Some)
            .with_context(|| format!("{} must be a decimal number", name)),
        Err(_) => Ok(None),
    }
}
