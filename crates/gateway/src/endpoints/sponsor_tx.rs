//! # POST /sponsor-tx
//!
//! ユーザー署名済みの意図にガスを付与し、スポンサー署名して送信する。

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use gas_station_core::SponsorRequest;
use gas_station_types::{SponsorTxRequest, SponsorTxResponse};

use super::{decode_b64, reject, reject_body, required};
use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /sponsor-tx — スポンサー付きトランザクションの送信。
///
/// `tx_kind_b64`, `user_signature_b64`, `user_address`は全て必須。
/// いずれかが欠けていればエンジンを呼ばずに400を返す。
pub async fn handle_sponsor_tx(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<SponsorTxRequest>, JsonRejection>,
) -> Result<Json<SponsorTxResponse>, GatewayError> {
    let Json(body) = payload.map_err(reject_body)?;

    let user_address = required(body.user_address);
    let (Some(tx_kind_b64), Some(user_signature_b64), Some(user_address)) = (
        required(body.tx_kind_b64),
        required(body.user_signature_b64),
        user_address.clone(),
    ) else {
        return Err(reject(user_address.as_deref(), GatewayError::MissingFields));
    };

    let request_id = uuid::Uuid::new_v4();
    tracing::info!(%request_id, user_address = %user_address, "スポンサー要求を受信しました");

    let request = SponsorRequest {
        intent_bytes: decode_b64("tx_kind_b64", &tx_kind_b64, &user_address)?,
        user_signature: decode_b64("user_signature_b64", &user_signature_b64, &user_address)?,
        user_address,
    };

    let receipt = state.engine.sponsor(request).await?;
    tracing::info!(%request_id, digest = %receipt.digest, "スポンサー要求を完了しました");

    Ok(Json(SponsorTxResponse {
        digest: receipt.digest,
    }))
}
