//! # GET / と GET /health

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use gas_station_types::{HealthResponse, StatusResponse};

use crate::config::GatewayState;

/// GET / — 稼働確認とスポンサーアドレスの公開。
pub async fn handle_status(State(state): State<Arc<GatewayState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "online".to_string(),
        sponsor_address: state.sponsor_address.clone(),
    })
}

/// GET /health — 台帳への到達性とスポンサー残高。
///
/// 台帳に到達できない場合は500で`unhealthy`を返す。
pub async fn handle_health(
    State(state): State<Arc<GatewayState>>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.engine.sponsor_balance().await {
        Ok(balance) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                sponsor_address: Some(state.sponsor_address.clone()),
                balance: Some(balance.to_string()),
                network: Some(state.network.clone()),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!(error = ?e, "ヘルスチェックに失敗しました");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    sponsor_address: None,
                    balance: None,
                    network: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
