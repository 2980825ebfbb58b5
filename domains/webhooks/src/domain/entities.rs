//! Billing event types accepted by the webhook sink.
//!
//! The taxonomy mirrors the subscription-provider event model the core
//! reacts to (spec section 4.6): the first three event types add credits
//! per a product→credits table, the last two have no credit effect.

use serde::Deserialize;

/// Billing provider event type, as carried in the `event.type` field of the
/// webhook payload. Unrecognized strings deserialize to `Unknown` rather
/// than failing the whole payload — an unknown event is acknowledged and
/// ignored, not rejected (spec section 4.6, section 7).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingEventType {
    InitialPurchase,
    Renewal,
    NonRenewingPurchase,
    Cancellation,
    Expiration,
    #[serde(other)]
    Unknown,
}

impl BillingEventType {
    /// Whether this event type grants credits in the core.
    pub fn grants_credits(&self) -> bool {
        matches!(
            self,
            BillingEventType::InitialPurchase
                | BillingEventType::Renewal
                | BillingEventType::NonRenewingPurchase
        )
    }
}

/// The inner `event` object of a billing webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: BillingEventType,
    pub app_user_id: String,
    pub product_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Top-level webhook body: `{"event": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingWebhookPayload {
    pub event: BillingEvent,
}
