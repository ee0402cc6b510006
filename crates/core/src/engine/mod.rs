//! # スポンサーシップエンジン
//!
//! ## 処理フロー（sponsor）
//! 1. 意図のBCSデコード
//! 2. 許可リスト検査（失敗時は署名・台帳に一切触れない）
//! 3. ユーザー署名のパースと送信者アドレスの照合
//! 4. ガス見積もりとエンベロープ構築（送信者 = ユーザー、ガス所有者 = スポンサー）
//! 5. BCS `TransactionData`への決定的シリアライズ
//! 6. Ed25519ユーザー署名の事前検証
//! 7. スポンサー署名（1リクエストにつき1回のみ）
//! 8. `[user, sponsor]`の順で署名を付与
//! 9. 送信（自動リトライなし）
//!
//! `prepare`は1, 2, 4, 5のみを実行し、ユーザーが署名すべきバイト列を返す。
//! `prepare`が選んだガスコインは（送信者, 意図）をキーに台帳側で保持され、
//! 後続の`sponsor`はコインを選び直さずその見積もりから同一のバイト列を再構築する。
//! 保持の期限切れ後は新たに予約する。

use std::sync::Arc;
use std::time::Duration;

use gas_station_crypto::{ed25519_verify_transaction, SignatureScheme, SuiSignature};

use crate::capability::{GasHoldKey, GasQuote, Ledger, LedgerError, SponsorSigner};
use crate::envelope::{SponsoredEnvelope, UnsignedEnvelope};
use crate::intent::{DecodeError, TransactionIntent};
use crate::transaction::SuiAddress;
use crate::validator::{AllowList, RejectionReason};


/// デフォルトのガス予算（0.05 SUI）。
pub const DEFAULT_GAS_BUDGET: u64 = 50_000_000;

/// デフォルトの送信タイムアウト。
pub const DEFAULT_SUBMISSION_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// エラー型
// ---------------------------------------------------------------------------

/// スポンサー処理のエラー型。
///
/// `Display`はクライアントに返すメッセージ。`Internal`の詳細はログにのみ出力する。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SponsorError {
    #[error("{0}")]
    MalformedInput(String),
    #[error("{0}")]
    ValidationRejected(#[from] RejectionReason),
    #[error("{0}")]
    InvalidUserSignature(String),
    #[error("Failed to sign transaction")]
    SigningFailure,
    #[error("Transaction submission timed out; outcome unknown")]
    SubmissionTimeout,
    #[error("Ledger network unavailable")]
    NetworkUnavailable(String),
    /// 送信後に台帳の応答が得られない・解釈できない（実行されたかは不明）
    #[error("Ledger did not confirm the submission; outcome unknown")]
    SubmissionUnconfirmed(String),
    #[error("{0}")]
    ExecutionFailed(String),
    #[error("An internal error occurred")]
    Internal(String),
}

impl SponsorError {
    /// ログ用の分類名。
    pub fn kind(&self) -> &'static str {
        match self {
            SponsorError::MalformedInput(_) => "malformed_input",
            SponsorError::ValidationRejected(_) => "validation_rejected",
            SponsorError::InvalidUserSignature(_) => "invalid_user_signature",
            SponsorError::SigningFailure => "signing_failure",
            SponsorError::SubmissionTimeout => "submission_timeout",
            SponsorError::NetworkUnavailable(_) => "network_unavailable",
            SponsorError::SubmissionUnconfirmed(_) => "submission_unconfirmed",
            SponsorError::ExecutionFailed(_) => "execution_failed",
            SponsorError::Internal(_) => "internal",
        }
    }

    /// クライアント起因（HTTP 400）のエラーか。
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SponsorError::MalformedInput(_)
                | SponsorError::ValidationRejected(_)
                | SponsorError::InvalidUserSignature(_)
        )
    }

    /// ログ出力用の詳細。
    fn detail(&self) -> String {
        match self {
            SponsorError::NetworkUnavailable(detail)
            | SponsorError::SubmissionUnconfirmed(detail)
            | SponsorError::Internal(detail) => detail.clone(),
            other => other.to_string(),
        }
    }

    /// ガス見積もり段階の台帳エラーを変換する。ここでは何も実行されていない。
    fn from_quote(err: LedgerError) -> Self {
        match err {
            LedgerError::Timeout => SponsorError::NetworkUnavailable(err.to_string()),
            LedgerError::Unavailable(detail) => SponsorError::NetworkUnavailable(detail),
            other => SponsorError::Internal(other.to_string()),
        }
    }

    /// 送信段階の台帳エラーを変換する。拒否メッセージはそのまま返す。
    /// 拒否以外は実行済みの可能性があるため結果不明として扱う。
    fn from_submission(err: LedgerError) -> Self {
        match err {
            LedgerError::Timeout => SponsorError::SubmissionTimeout,
            LedgerError::Rejected(message) => SponsorError::ExecutionFailed(message),
            other => SponsorError::SubmissionUnconfirmed(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// リクエスト / レスポンス
// ---------------------------------------------------------------------------

/// スポンサー要求。Base64デコードはGateway境界で済んでいる。
#[derive(Debug, Clone)]
pub struct SponsorRequest {
    /// BCS `TransactionKind`
    pub intent_bytes: Vec<u8>,
    /// Sui署名（`flag || sig || pubkey`）
    pub user_signature: Vec<u8>,
    /// 送信者アドレス（0x付き16進数）
    pub user_address: String,
}

#[derive(Debug, Clone)]
pub struct PrepareRequest {
    pub intent_bytes: Vec<u8>,
    pub user_address: String,
}

/// 送信成功時の受領証。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorReceipt {
    /// 台帳が割り当てたトランザクションダイジェスト（Base58）
    pub digest: String,
}

/// `prepare`の結果。ユーザーは`tx_bytes`に署名する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
    pub tx_bytes: Vec<u8>,
    pub digest: String,
}

/// エンジン設定。
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 1トランザクションあたりのガス予算（MIST）
    pub gas_budget: u64,
    /// 送信完了を待つ上限
    pub submission_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gas_budget: DEFAULT_GAS_BUDGET,
            submission_timeout: DEFAULT_SUBMISSION_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// エンジン
// ---------------------------------------------------------------------------

/// スポンサーシップエンジン。
///
/// 許可リストと署名ケイパビリティは読み取り専用で、リクエスト間の可変状態を持たない。
pub struct SponsorshipEngine {
    allow_list: Arc<AllowList>,
    signer: Arc<dyn SponsorSigner>,
    ledger: Arc<dyn Ledger>,
    config: EngineConfig,
}

impl SponsorshipEngine {
    pub fn new(
        allow_list: Arc<AllowList>,
        signer: Arc<dyn SponsorSigner>,
        ledger: Arc<dyn Ledger>,
        config: EngineConfig,
    ) -> Self {
        Self {
            allow_list,
            signer,
            ledger,
            config,
        }
    }

    /// スポンサー（ガス所有者）のアドレス。
    pub fn sponsor_address(&self) -> SuiAddress {
        self.signer.address()
    }

    /// スポンサーのSUI残高（MIST）。
    pub async fn sponsor_balance(&self) -> Result<u128, SponsorError> {
        self.ledger
            .balance(self.signer.address())
            .await
            .map_err(SponsorError::from_quote)
    }

    /// ユーザーが署名すべき`TransactionData`を構築する。署名・送信は行わない。
    pub async fn prepare(
        &self,
        request: PrepareRequest,
    ) -> Result<PreparedTransaction, SponsorError> {
        let result = self.prepare_inner(&request).await;
        match &result {
            Ok(prepared) => tracing::info!(
                user_address = %request.user_address,
                digest = %prepared.digest,
                "トランザクションを準備しました"
            ),
            Err(e) => log_failure(&request.user_address, e),
        }
        result
    }

    async fn prepare_inner(
        &self,
        request: &PrepareRequest,
    ) -> Result<PreparedTransaction, SponsorError> {
        let intent = self.decode_and_validate(&request.intent_bytes)?;
        let sender = parse_user_address(&request.user_address)?;

        let hold = GasHoldKey::new(&sender, &request.intent_bytes);
        let quote = self
            .ledger
            .hold_gas(self.signer.address(), self.config.gas_budget, hold)
            .await
            .map_err(SponsorError::from_quote)?;
        let unsigned = self.build(&intent, sender, &quote)?;

        Ok(PreparedTransaction {
            digest: unsigned.digest(),
            tx_bytes: unsigned.tx_bytes().to_vec(),
        })
    }

    /// 意図を検査・構築・署名し、台帳に送信する。
    pub async fn sponsor(&self, request: SponsorRequest) -> Result<SponsorReceipt, SponsorError> {
        let result = self.sponsor_inner(&request).await;
        match &result {
            Ok(receipt) => tracing::info!(
                user_address = %request.user_address,
                digest = %receipt.digest,
                "スポンサー付きトランザクションを送信しました"
            ),
            Err(e) => log_failure(&request.user_address, e),
        }
        result
    }

    async fn sponsor_inner(
        &self,
        request: &SponsorRequest,
    ) -> Result<SponsorReceipt, SponsorError> {
        // Step 1-2: デコードと許可リスト検査
        let intent = self.decode_and_validate(&request.intent_bytes)?;

        // Step 3: ユーザー署名と送信者アドレス
        let sender = parse_user_address(&request.user_address)?;
        let user_signature = SuiSignature::from_bytes(&request.user_signature).map_err(|e| {
            tracing::debug!(error = %e, "ユーザー署名のパースに失敗しました");
            SponsorError::MalformedInput("Invalid user signature encoding".to_string())
        })?;
        if let Some(signer) = user_signature.signer_address() {
            if signer != sender.0 {
                return Err(SponsorError::InvalidUserSignature(
                    "User signature does not match user_address".to_string(),
                ));
            }
        }

        // Step 4: prepareで保持したガスを引き取る。なければ新たに予約する
        let hold = GasHoldKey::new(&sender, &request.intent_bytes);
        let quote = match self.ledger.claim_gas(&hold) {
            Some(quote) => quote,
            None => self
                .ledger
                .reserve_gas(self.signer.address(), self.config.gas_budget)
                .await
                .map_err(SponsorError::from_quote)?,
        };

        // Step 5-8: 構築・検証・署名。失敗時は予約を解放する
        let envelope = match self.authorize(&intent, sender, user_signature, &quote).await {
            Ok(envelope) => envelope,
            Err(e) => {
                self.ledger.release_gas(&quote.payment);
                return Err(e);
            }
        };

        // Step 9: 送信
        self.submit(envelope, &request.user_address).await
    }

    fn decode_and_validate(&self, intent_bytes: &[u8]) -> Result<TransactionIntent, SponsorError> {
        let intent = TransactionIntent::decode(intent_bytes).map_err(|e| match e {
            DecodeError::UnsupportedKind(_) => {
                SponsorError::ValidationRejected(RejectionReason::MalformedIntent(e.to_string()))
            }
            other => SponsorError::MalformedInput(format!("Invalid transaction intent: {other}")),
        })?;
        self.allow_list.validate(&intent)?;
        Ok(intent)
    }

    fn build(
        &self,
        intent: &TransactionIntent,
        sender: SuiAddress,
        quote: &GasQuote,
    ) -> Result<UnsignedEnvelope, SponsorError> {
        UnsignedEnvelope::build(intent, sender, self.signer.address(), quote)
            .map_err(|e| SponsorError::Internal(format!("シリアライズに失敗: {e}")))
    }

    async fn authorize(
        &self,
        intent: &TransactionIntent,
        sender: SuiAddress,
        user_signature: SuiSignature,
        quote: &GasQuote,
    ) -> Result<SponsoredEnvelope, SponsorError> {
        let unsigned = self.build(intent, sender, quote)?;

        // Ed25519以外のスキームは台帳側で検証される
        if user_signature.scheme() == SignatureScheme::Ed25519 {
            ed25519_verify_transaction(&user_signature, unsigned.tx_bytes()).map_err(|e| {
                tracing::debug!(error = %e, "ユーザー署名の検証に失敗しました");
                SponsorError::InvalidUserSignature(
                    "User signature does not cover the sponsored transaction".to_string(),
                )
            })?;
        }

        let sponsor_signature = self.signer.sign(unsigned.tx_bytes()).await.map_err(|e| {
            tracing::error!(error = %e, "スポンサー署名に失敗しました");
            SponsorError::SigningFailure
        })?;

        Ok(unsigned.into_signed(user_signature, sponsor_signature))
    }

    /// 送信は独立したタスクで実行する。呼び出し元が切断・タイムアウトしても
    /// 送信は継続し、最終結果はタスク内でログに残る。
    async fn submit(
        &self,
        envelope: SponsoredEnvelope,
        user_address: &str,
    ) -> Result<SponsorReceipt, SponsorError> {
        let ledger = Arc::clone(&self.ledger);
        let expected_digest = envelope.digest();
        let user = user_address.to_string();

        let task = tokio::spawn(async move {
            let outcome = ledger.submit(envelope).await;
            match &outcome {
                Ok(digest) => {
                    if *digest != expected_digest {
                        tracing::warn!(
                            user_address = %user,
                            expected = %expected_digest,
                            actual = %digest,
                            "台帳のダイジェストがローカル計算値と一致しません"
                        );
                    }
                    tracing::info!(
                        user_address = %user,
                        digest = %digest,
                        "送信タスクが完了しました"
                    );
                }
                Err(e) => tracing::warn!(
                    user_address = %user,
                    digest = %expected_digest,
                    error = %e,
                    "送信タスクが失敗しました"
                ),
            }
            outcome
        });

        match tokio::time::timeout(self.config.submission_timeout, task).await {
            Err(_) => Err(SponsorError::SubmissionTimeout),
            Ok(Err(join_error)) => Err(SponsorError::SubmissionUnconfirmed(format!(
                "送信タスクが異常終了しました: {join_error}"
            ))),
            Ok(Ok(Ok(digest))) => Ok(SponsorReceipt { digest }),
            Ok(Ok(Err(e))) => Err(SponsorError::from_submission(e)),
        }
    }
}

fn parse_user_address(user_address: &str) -> Result<SuiAddress, SponsorError> {
    user_address
        .parse()
        .map_err(|e| SponsorError::MalformedInput(format!("Invalid user_address: {e}")))
}

/// 失敗経路ごとに1件のログを出す。鍵素材は含めない。
fn log_failure(user_address: &str, error: &SponsorError) {
    if error.is_client_error() {
        tracing::warn!(
            user_address = %user_address,
            error_kind = error.kind(),
            error = %error.detail(),
            "スポンサー要求を拒否しました"
        );
    } else {
        tracing::error!(
            user_address = %user_address,
            error_kind = error.kind(),
            error = %error.detail(),
            "スポンサー処理に失敗しました"
        );
    }
}
