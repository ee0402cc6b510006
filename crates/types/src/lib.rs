//! # Gas Station 共有型定義
//!
//! GatewayのHTTP APIで送受信するJSON構造体を提供する。
//!
//! ## エンコーディング規則
//! - Base64 (Standard): BCSバイト列、署名
//! - Base58: トランザクションダイジェスト
//! - 0x付き16進数: Suiアドレス

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// スポンサーリクエスト
// ---------------------------------------------------------------------------

/// POST /sponsor-tx リクエスト。
///
/// 全フィールドを`Option`で受け取り、存在チェックはGateway境界で一度だけ行う。
/// 欠落・空文字列はいずれも "Missing required fields" として扱われる。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SponsorTxRequest {
    /// Base64エンコードされたBCS `TransactionKind`（ガス情報を含まない意図）
    #[serde(default)]
    pub tx_kind_b64: Option<String>,
    /// Base64エンコードされたユーザー署名（`flag || sig || pubkey`）
    #[serde(default)]
    pub user_signature_b64: Option<String>,
    /// トランザクション送信者のSuiアドレス
    #[serde(default)]
    pub user_address: Option<String>,
}

/// POST /sponsor-tx 成功レスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorTxResponse {
    /// ネットワークが割り当てたトランザクションダイジェスト（Base58）
    pub digest: String,
}

/// POST /sponsor-tx/prepare リクエスト。
///
/// ユーザー署名の対象となる`TransactionData`を事前に取得するための入力。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrepareTxRequest {
    /// Base64エンコードされたBCS `TransactionKind`
    #[serde(default)]
    pub tx_kind_b64: Option<String>,
    /// トランザクション送信者のSuiアドレス
    #[serde(default)]
    pub user_address: Option<String>,
}

/// POST /sponsor-tx/prepare レスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareTxResponse {
    /// Base64エンコードされたBCS `TransactionData`（ユーザーが署名するバイト列）
    pub tx_bytes_b64: String,
    /// 提出時に割り当てられるトランザクションダイジェスト（Base58）
    pub digest: String,
}

// ---------------------------------------------------------------------------
// エラー / ヘルスチェック
// ---------------------------------------------------------------------------

/// 全エンドポイント共通のエラーレスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// クライアント向けエラーメッセージ
    pub error: String,
}

/// GET / レスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// 常に "online"
    pub status: String,
    /// スポンサー（ガス支払者）のSuiアドレス
    pub sponsor_address: String,
}

/// GET /health レスポンス。
///
/// 台帳への到達性とスポンサー残高を含む。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" または "unhealthy"
    pub status: String,
    /// スポンサーのSuiアドレス
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_address: Option<String>,
    /// スポンサーのSUI残高（MIST、10進文字列）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    /// 接続先RPCエンドポイント
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// unhealthy時のエラー内容
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
