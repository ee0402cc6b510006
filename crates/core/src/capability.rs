//! # 外部ケイパビリティ
//!
//! エンジンが依存する外部協調者の抽象。
//! 実装はGateway側（鍵ペア署名、Sui JSON-RPC）とテスト用モックが提供する。

use async_trait::async_trait;
use gas_station_crypto::{blake2b256, SuiSignature};

use crate::envelope::SponsoredEnvelope;
use crate::transaction::{ObjectRef, SuiAddress};

/// 署名ケイパビリティのエラー型
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// 署名処理に失敗
    #[error("署名処理に失敗しました: {0}")]
    Failed(String),
}

/// 台帳ケイパビリティのエラー型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// 応答待ちがタイムアウト（結果は不確定）
    #[error("台帳への要求がタイムアウトしました")]
    Timeout,
    /// 接続失敗・HTTPレベルの失敗
    #[error("台帳に到達できません: {0}")]
    Unavailable(String),
    /// 台帳がトランザクションを拒否した（メッセージは台帳のもの）
    #[error("{0}")]
    Rejected(String),
    /// スポンサーのガスコインが予算に足りない
    #[error("ガスコイン不足: 必要 {required} MIST, 利用可能 {available} MIST")]
    InsufficientGas { required: u64, available: u128 },
    /// 応答形式が想定外
    #[error("台帳の応答形式が不正です: {0}")]
    Protocol(String),
}

/// ガス見積もり。エンベロープの`GasData`に埋め込まれる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasQuote {
    /// 参照ガス価格（MIST）
    pub price: u64,
    /// ガス予算（MIST）
    pub budget: u64,
    /// 支払いに使うスポンサー所有のSUIコイン
    pub payment: Vec<ObjectRef>,
}

/// `prepare`で確保したガスを`sponsor`で引き取るためのキー。
///
/// 送信者と意図のバイト列から導出するため、同じ意図を再度`prepare`すると同じキーになる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GasHoldKey([u8; 32]);

impl GasHoldKey {
    pub fn new(sender: &SuiAddress, intent_bytes: &[u8]) -> Self {
        let mut preimage = Vec::with_capacity(32 + intent_bytes.len());
        preimage.extend_from_slice(&sender.0);
        preimage.extend_from_slice(intent_bytes);
        Self(blake2b256(&preimage))
    }
}

/// スポンサー署名ケイパビリティ。
///
/// 鍵素材は実装の内部に閉じ、エンジンには渡されない。
#[async_trait]
pub trait SponsorSigner: Send + Sync {
    /// スポンサー（ガス所有者）のアドレス。
    fn address(&self) -> SuiAddress;

    /// BCS `TransactionData`に署名する。
    async fn sign(&self, tx_bytes: &[u8]) -> Result<SuiSignature, SignerError>;
}

/// 台帳ケイパビリティ。
#[async_trait]
pub trait Ledger: Send + Sync {
    /// ガス見積もりを取得する（コインを予約しない）。
    async fn gas_quote(&self, owner: SuiAddress, budget: u64) -> Result<GasQuote, LedgerError>;

    /// ガス見積もりを取得し、選んだコインを送信完了まで予約する。
    async fn reserve_gas(&self, owner: SuiAddress, budget: u64) -> Result<GasQuote, LedgerError> {
        self.gas_quote(owner, budget).await
    }

    /// コインを予約し、見積もりを`key`に紐づけて保持する。
    /// 有効な保持が既にあれば新たに選ばず同じ見積もりを返す。
    async fn hold_gas(
        &self,
        owner: SuiAddress,
        budget: u64,
        _key: GasHoldKey,
    ) -> Result<GasQuote, LedgerError> {
        self.gas_quote(owner, budget).await
    }

    /// `hold_gas`で保持した見積もりを取り出す。予約は送信完了まで引き継がれる。
    /// 期限切れ・未保持なら`None`。
    fn claim_gas(&self, _key: &GasHoldKey) -> Option<GasQuote> {
        None
    }

    /// 送信前に中断した場合に予約を解放する。
    fn release_gas(&self, _payment: &[ObjectRef]) {}

    /// 署名済みエンベロープを送信し、台帳が割り当てたダイジェストを返す。
    /// 完了時（成否を問わず）にガスコインの予約を解放する。
    async fn submit(&self, envelope: SponsoredEnvelope) -> Result<String, LedgerError>;

    /// アドレスのSUI残高（MIST）。
    async fn balance(&self, owner: SuiAddress) -> Result<u128, LedgerError>;
}
