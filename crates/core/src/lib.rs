//! # Gas Station Core
//!
//! Suiトランザクションのスポンサー（ガス代行支払い）プロトコルを実装する。
//!
//! ## 構成
//! - [`transaction`]: BCS `TransactionKind` / `TransactionData`のデータモデル
//! - [`intent`]: クライアントが送る意図のデコード
//! - [`validator`]: 許可リストと意図の静的検査
//! - [`envelope`]: ユーザー・スポンサー双方の署名を持つエンベロープ
//! - [`capability`]: 署名・台帳ケイパビリティのトレイト
//! - [`engine`]: 検査から送信までを統括するエンジン

pub mod capability;
pub mod engine;
pub mod envelope;
pub mod intent;
pub mod transaction;
pub mod validator;

pub use capability::{GasHoldKey, GasQuote, Ledger, LedgerError, SignerError, SponsorSigner};
pub use engine::{
    EngineConfig, PrepareRequest, PreparedTransaction, SponsorError, SponsorReceipt,
    SponsorRequest, SponsorshipEngine,
};
pub use envelope::{SponsoredEnvelope, UnsignedEnvelope};
pub use intent::{DecodeError, TransactionIntent};
pub use transaction::{ObjectDigest, ObjectRef, SuiAddress};
pub use validator::{AllowList, AllowListEntry, AllowListError, RejectionReason};
