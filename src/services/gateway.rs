//! Payment gateway clients.
//!
//! `StripeGateway` talks to the Stripe REST API with form-encoded requests:
//! - hosted checkout sessions for rentals, deposits and Pro memberships
//! - transfers for owner payouts
//! - `Stripe-Signature` verification for webhooks
//!
//! `SimulatedGateway` fakes the network half for local development and keeps
//! the same signature check.

use anyhow::{Context, Result};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff, ExponentialBackoffBuilder};
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::domain::payments::{CheckoutParams, CheckoutSession};
use crate::error::{ApiError, ApiResult};

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, params: &CheckoutParams) -> ApiResult<CheckoutSession>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;

    /// Move `amount_cents` to the configured payout account and return the
    /// transfer id.
    ///
    /// `PaymentOutcomeUnknown` means the transfer may exist anyway; look it up
    /// with [`PaymentGateway::find_transfer`] before giving the funds back.
    async fn create_transfer(&self, amount_cents: i64, reference: &str) -> ApiResult<String>;

    /// Id of the transfer created for `reference`, if there is one.
    async fn find_transfer(&self, reference: &str) -> ApiResult<Option<String>>;

    async fn health_check(&self) -> ApiResult<()>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    Malformed,
    #[error("timestamp outside tolerance window")]
    Expired,
    #[error("signature mismatch")]
    Mismatch,
}

/// Check a `t=<unix>,v1=<hex>` header against HMAC-SHA256 of `"{t}.{payload}"`.
pub fn verify_stripe_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let matches = candidates.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        // Constant-time comparison
        mac.verify_slice(&expected).is_ok()
    });

    if matches {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build a header the way the gateway signs webhooks. Used by local tooling
/// and tests.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return format!("t={}", timestamp),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

fn verify_now(payload: &[u8], signature: &str, secret: &str) -> bool {
    match verify_stripe_signature(payload, signature, secret, chrono::Utc::now().timestamp()) {
        Ok(()) => true,
        Err(e) => {
            warn!(reason = %e, "Webhook signature rejected");
            false
        }
    }
}

// ============================================================================
// Stripe
// ============================================================================

#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    base_url: String,
    secret_key: String,
    webhook_secret: String,
    payout_destination: Option<String>,
    currency: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TransferList {
    data: Vec<TransferResponse>,
}

impl StripeGateway {
    pub fn new(
        base_url: &str,
        secret_key: &str,
        webhook_secret: &str,
        payout_destination: Option<String>,
        currency: &str,
        timeout_seconds: u64,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_seconds);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(base_url = base_url, "Stripe gateway initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            webhook_secret: webhook_secret.to_string(),
            payout_destination,
            currency: currency.to_string(),
            timeout,
        })
    }

    fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_interval(Duration::from_secs(2))
            .with_max_elapsed_time(Some(self.timeout))
            .build()
    }

    /// POST a form to the Stripe API, retrying transient failures.
    async fn post_form<R>(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: &str,
    ) -> ApiResult<R>
    where
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Stripe request");

        let client = &self.client;
        let secret_key = &self.secret_key;
        let url = &url;

        retry(self.retry_policy(), || async move {
            let response = client
                .post(url)
                .bearer_auth(secret_key)
                .header("Idempotency-Key", idempotency_key)
                .form(form)
                .send()
                .await
                .map_err(|e| {
                    warn!(error = %e, "Stripe request failed");
                    if e.is_connect() {
                        // Never reached Stripe
                        backoff::Error::transient(ApiError::PaymentProcessing(format!(
                            "Gateway unavailable: {}",
                            e
                        )))
                    } else {
                        // Sent, but the reply was lost. The idempotency key
                        // makes a retry safe.
                        backoff::Error::transient(ApiError::PaymentOutcomeUnknown(format!(
                            "No response from gateway: {}",
                            e
                        )))
                    }
                })?;

            let status = response.status();
            if status.is_success() {
                return response.json::<R>().await.map_err(|e| {
                    error!(error = %e, "Failed to parse Stripe response");
                    backoff::Error::permanent(ApiError::PaymentOutcomeUnknown(format!(
                        "Unreadable gateway response: {}",
                        e
                    )))
                });
            }

            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("Gateway error: {}", status));
            if status.is_server_error() {
                warn!(status = %status, "Stripe server error, retrying");
                Err(backoff::Error::transient(ApiError::PaymentOutcomeUnknown(message)))
            } else if status == StatusCode::TOO_MANY_REQUESTS {
                warn!(status = %status, "Rate limited by Stripe, retrying");
                Err(backoff::Error::transient(ApiError::PaymentProcessing(message)))
            } else {
                error!(status = %status, error = %message, "Stripe rejected request");
                Err(backoff::Error::permanent(ApiError::PaymentProcessing(message)))
            }
        })
        .await
    }
}

fn session_form(params: &CheckoutParams) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), params.success_url.clone()),
        ("cancel_url".to_string(), params.cancel_url.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        (
            "line_items[0][price_data][currency]".to_string(),
            params.currency.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_string(),
            params.amount_cents.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_string(),
            params.product_name.clone(),
        ),
    ];

    if let Some(description) = params.description.as_ref().filter(|d| !d.is_empty()) {
        form.push((
            "line_items[0][price_data][product_data][description]".to_string(),
            description.clone(),
        ));
    }

    for (key, value) in &params.metadata {
        form.push((format!("metadata[{}]", key), value.clone()));
    }

    form
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, params), fields(amount_cents = params.amount_cents))]
    async fn create_session(&self, params: &CheckoutParams) -> ApiResult<CheckoutSession> {
        let form = session_form(params);
        let session: SessionResponse = self
            .post_form("/v1/checkout/sessions", &form, &params.idempotency_key)
            .await?;

        let checkout_url = session
            .url
            .ok_or_else(|| ApiError::PaymentProcessing("Gateway returned no checkout URL".into()))?;

        Ok(CheckoutSession {
            session_id: session.id,
            checkout_url,
        })
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        verify_now(payload, signature, &self.webhook_secret)
    }

    #[instrument(skip(self))]
    async fn create_transfer(&self, amount_cents: i64, reference: &str) -> ApiResult<String> {
        let destination = self.payout_destination.as_ref().ok_or_else(|| {
            ApiError::PaymentProcessing("No payout destination configured".into())
        })?;

        let form = vec![
            ("amount".to_string(), amount_cents.to_string()),
            ("currency".to_string(), self.currency.clone()),
            ("destination".to_string(), destination.clone()),
            ("transfer_group".to_string(), reference.to_string()),
            ("metadata[payoutId]".to_string(), reference.to_string()),
        ];

        let transfer: TransferResponse = self
            .post_form("/v1/transfers", &form, &format!("payout-{}", reference))
            .await?;
        Ok(transfer.id)
    }

    #[instrument(skip(self))]
    async fn find_transfer(&self, reference: &str) -> ApiResult<Option<String>> {
        let url = format!("{}/v1/transfers", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .query(&[("transfer_group", reference), ("limit", "1")])
            .send()
            .await
            .map_err(|e| ApiError::PaymentOutcomeUnknown(format!("Transfer lookup failed: {}", e)))?
            .error_for_status()
            .map_err(|e| ApiError::PaymentOutcomeUnknown(format!("Transfer lookup failed: {}", e)))?;

        let transfers: TransferList = response.json().await.map_err(|e| {
            ApiError::PaymentOutcomeUnknown(format!("Unreadable transfer list: {}", e))
        })?;
        Ok(transfers.data.into_iter().next().map(|t| t.id))
    }

    async fn health_check(&self) -> ApiResult<()> {
        let url = format!("{}/v1/balance", self.base_url);

        self.client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| ApiError::PaymentProcessing(format!("Gateway unreachable: {}", e)))?
            .error_for_status()
            .map_err(|e| ApiError::PaymentProcessing(format!("Gateway unhealthy: {}", e)))?;

        Ok(())
    }
}

// ============================================================================
// Simulated gateway
// ============================================================================

/// Offline gateway used when no Stripe key is configured.
#[derive(Clone)]
pub struct SimulatedGateway {
    webhook_secret: String,
}

impl SimulatedGateway {
    pub fn new(webhook_secret: &str) -> Self {
        tracing::warn!("No STRIPE_SECRET_KEY set, using simulated payment gateway");
        Self {
            webhook_secret: webhook_secret.to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn create_session(&self, params: &CheckoutParams) -> ApiResult<CheckoutSession> {
        let session_id = format!("cs_sim_{}", Uuid::new_v4().simple());
        let checkout_url = params
            .success_url
            .replace("{CHECKOUT_SESSION_ID}", &session_id);

        debug!(session_id = %session_id, amount_cents = params.amount_cents, "Simulated checkout session");
        Ok(CheckoutSession {
            session_id,
            checkout_url,
        })
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        verify_now(payload, signature, &self.webhook_secret)
    }

    async fn create_transfer(&self, amount_cents: i64, reference: &str) -> ApiResult<String> {
        let transfer_id = format!("tr_simulated_{}", Uuid::new_v4().simple());
        debug!(transfer_id = %transfer_id, amount_cents, reference, "Simulated transfer");
        Ok(transfer_id)
    }

    async fn find_transfer(&self, _reference: &str) -> ApiResult<Option<String>> {
        Ok(None)
    }

    async fn health_check(&self) -> ApiResult<()> {
        Ok(())
    }
}
