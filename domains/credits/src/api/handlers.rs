//! Credit balance handler (spec section 6: `GET /credits`).

use axum::{extract::State, Json};
use luster_auth::VerifiedCaller;
use luster_common::Result;
use serde::Serialize;

use super::middleware::CreditsState;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i32,
}

/// Snapshot read of the caller's own balance. There is no path to read
/// another user's balance; the caller's id comes entirely from the
/// verified bearer token, never from a path or query parameter.
pub async fn get_balance(
    VerifiedCaller(ctx): VerifiedCaller,
    State(state): State<CreditsState>,
) -> Result<Json<BalanceResponse>> {
    let balance = state.ledger.balance(ctx.user_id).await?;
    Ok(Json(BalanceResponse { balance }))
}
