//! # Gateway エラー型
//!
//! 全てのエラーは`{"error": "..."}`形式のJSONで返す。

use axum::http::StatusCode;
use axum::Json;
use gas_station_core::SponsorError;
use gas_station_types::ErrorResponse;

/// 必須フィールド欠落時のメッセージ
pub const MISSING_REQUIRED_FIELDS: &str = "Missing required fields";

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 必須フィールドの欠落・空文字列
    #[error("{}", MISSING_REQUIRED_FIELDS)]
    MissingFields,
    /// 不正なリクエスト（JSON・Base64の不備）
    #[error("{0}")]
    BadRequest(String),
    /// エンジンのエラー
    #[error(transparent)]
    Sponsor(#[from] SponsorError),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingFields | GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Sponsor(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            GatewayError::Sponsor(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
