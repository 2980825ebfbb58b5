//! Billing webhook handler (spec section 4.6, section 6: `POST /webhooks/billing`).

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::Serialize;
use uuid::Uuid;

use luster_common::{crypto::verify_hmac_sha256, Error, Result};
use luster_credits::{transactions, ApplyOutcome};

use super::middleware::WebhooksState;
use crate::domain::entities::{BillingEventType, BillingWebhookPayload};

const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

fn ack() -> Json<WebhookAck> {
    Json(WebhookAck { status: "ok" })
}

/// `POST /webhooks/billing`
///
/// Never raises to the caller beyond signature rejection (spec section 7):
/// unknown event types, malformed identities, and unconfigured products are
/// all logged and acknowledged with `200` so the provider doesn't retry into
/// a storm. Only an invalid signature (when a secret is configured) or a
/// body that isn't even JSON rejects the request outright.
pub async fn billing_webhook(
    State(state): State<WebhooksState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    if let Some(secret) = &state.config.webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_hmac_sha256(secret, &body, signature) {
            tracing::warn!("billing webhook rejected: invalid signature");
            return Err(Error::Authentication("invalid webhook signature".to_string()));
        }
    }

    let payload: BillingWebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "billing webhook rejected: malformed JSON body");
        Error::Validation("malformed webhook payload".to_string())
    })?;

    if let Err(e) = dispatch(&state, payload).await {
        tracing::error!(error = %e, "billing webhook event processing failed; acknowledging anyway");
    }

    Ok(ack())
}

async fn dispatch(state: &WebhooksState, payload: BillingWebhookPayload) -> Result<()> {
    let event = payload.event;

    if !event.event_type.grants_credits() {
        tracing::info!(
            event_id = %event.id,
            event_type = ?event.event_type,
            "billing event acknowledged, no credit effect"
        );
        return Ok(());
    }

    let Ok(user_id) = Uuid::parse_str(&event.app_user_id) else {
        tracing::warn!(app_user_id = %event.app_user_id, "billing webhook: app_user_id is not a valid user id");
        return Ok(());
    };

    let delta = match state.config.credits_per_product.get(&event.product_id) {
        Some(credits) => *credits,
        None => {
            tracing::warn!(product_id = %event.product_id, "billing webhook: no credits configured for product");
            return Ok(());
        }
    };

    let email = event
        .email
        .unwrap_or_else(|| format!("{user_id}@billing.luster"));

    let mut tx = state.ledger.pool().begin().await?;
    transactions::get_or_create_user_tx(&mut tx, user_id, &email).await?;
    let outcome = transactions::apply_delta_tx(
        &mut tx,
        user_id,
        delta,
        event_type_label(&event.event_type),
        &event.id,
    )
    .await?;
    tx.commit().await?;

    match outcome {
        ApplyOutcome::Applied { new_balance } => {
            tracing::info!(
                user_id = %user_id, delta, new_balance, event_id = %event.id,
                "billing webhook applied credit delta"
            );
        }
        ApplyOutcome::AlreadyApplied => {
            tracing::info!(event_id = %event.id, "billing webhook delivery already applied, ignoring replay");
        }
    }

    Ok(())
}

fn event_type_label(event_type: &BillingEventType) -> &'static str {
    match event_type {
        BillingEventType::InitialPurchase => "initial_purchase",
        BillingEventType::Renewal => "renewal",
        BillingEventType::NonRenewingPurchase => "non_renewing_purchase",
        BillingEventType::Cancellation => "cancellation",
        BillingEventType::Expiration => "expiration",
        BillingEventType::Unknown => "unknown",
    }
}
