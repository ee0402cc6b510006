//! # POST /sponsor-tx/prepare
//!
//! ユーザーが署名すべき`TransactionData`を返す。署名・送信は行わない。

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use base64::Engine;
use gas_station_core::PrepareRequest;
use gas_station_crypto::b64;
use gas_station_types::{PrepareTxRequest, PrepareTxResponse};

use super::{decode_b64, reject, reject_body, required};
use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /sponsor-tx/prepare — 署名対象バイト列の取得。
pub async fn handle_prepare_tx(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<PrepareTxRequest>, JsonRejection>,
) -> Result<Json<PrepareTxResponse>, GatewayError> {
    let Json(body) = payload.map_err(reject_body)?;

    let user_address = required(body.user_address);
    let (Some(tx_kind_b64), Some(user_address)) = (required(body.tx_kind_b64), user_address.clone())
    else {
        return Err(reject(user_address.as_deref(), GatewayError::MissingFields));
    };

    let intent_bytes = decode_b64("tx_kind_b64", &tx_kind_b64, &user_address)?;
    let prepared = state
        .engine
        .prepare(PrepareRequest {
            intent_bytes,
            user_address,
        })
        .await?;

    Ok(Json(PrepareTxResponse {
        tx_bytes_b64: b64().encode(&prepared.tx_bytes),
        digest: prepared.digest,
    }))
}
