//! # Gatewayエンドポイント
//!
//! - `POST /sponsor-tx`
//! - `POST /sponsor-tx/prepare`
//! - `GET /`
//! - `GET /health`

pub mod prepare_tx;
pub mod sponsor_tx;
pub mod status;

pub use prepare_tx::handle_prepare_tx;
pub use sponsor_tx::handle_sponsor_tx;
pub use status::{handle_health, handle_status};

use axum::extract::rejection::JsonRejection;
use base64::Engine;
use gas_station_crypto::b64;

use crate::error::GatewayError;

/// 空文字列を欠落として扱う。
fn required(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}

/// エンジンに渡す前に拒否したリクエストを記録する。
fn reject(user_address: Option<&str>, error: GatewayError) -> GatewayError {
    tracing::warn!(
        user_address = user_address.unwrap_or("-"),
        error_kind = "malformed_input",
        error = %error,
        "リクエストを拒否しました"
    );
    error
}

fn reject_body(rejection: JsonRejection) -> GatewayError {
    reject(None, GatewayError::BadRequest(rejection.body_text()))
}

/// Base64フィールドをデコードする。
fn decode_b64(field: &str, value: &str, user_address: &str) -> Result<Vec<u8>, GatewayError> {
    b64().decode(value.trim()).map_err(|_| {
        reject(
            Some(user_address),
            GatewayError::BadRequest(format!("{field} is not valid base64")),
        )
    })
}
