//! # Gas Station 暗号処理
//!
//! Suiネットワークのトランザクション署名に必要な暗号プリミティブを実装する。
//!
//! ## 暗号アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | ハッシュ | Blake2b-256 |
//! | スポンサー署名 | Ed25519 |
//! | 署名対象 | `Blake2b256(intent || BCS(TransactionData))` |
//! | アドレス | `Blake2b256(flag || pubkey)` |
//! | ダイジェスト | `Blake2b256("TransactionData::" || BCS(TransactionData))` |

pub mod signature;

use base64::Engine;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signer, Verifier};

pub use ed25519_dalek::{
    Signature as Ed25519Signature, SigningKey as Ed25519SigningKey,
    VerifyingKey as Ed25519VerifyingKey,
};
pub use signature::{SignatureScheme, SuiSignature};

/// 暗号処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Base64デコードエラー
    #[error("Base64デコードに失敗しました: {0}")]
    Base64(String),
    /// 秘密鍵の形式が不正
    #[error("秘密鍵の形式が不正です: {0}")]
    InvalidPrivateKey(String),
    /// 署名の形式が不正
    #[error("署名の形式が不正です: {0}")]
    InvalidSignature(String),
    /// 未対応の署名スキーム
    #[error("未対応の署名スキームです: flag=0x{0:02x}")]
    UnsupportedScheme(u8),
    /// 署名検証エラー
    #[error("署名検証に失敗しました")]
    SignatureVerifyError,
}

/// Base64エンジン（Standard）
pub fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

type Blake2b256 = Blake2b<U32>;

/// `TransactionData`に対するユーザー/スポンサー署名のインテント接頭辞。
/// `[scope = TransactionData, version = V0, app_id = Sui]`
pub const TRANSACTION_DATA_INTENT: [u8; 3] = [0, 0, 0];

/// トランザクションダイジェスト計算時のドメイン分離タグ。
const TRANSACTION_DATA_DIGEST_PREFIX: &[u8] = b"TransactionData::";

/// Blake2b-256ハッシュ計算。
pub fn blake2b256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// BCS `TransactionData`の署名対象ハッシュを計算する。
///
/// Suiの署名はトランザクションバイト列そのものではなく、
/// インテント接頭辞を付けたメッセージのBlake2b-256に対して行う。
pub fn transaction_signing_digest(tx_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(TRANSACTION_DATA_INTENT);
    hasher.update(tx_bytes);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// BCS `TransactionData`からトランザクションダイジェスト（32バイト）を計算する。
/// ネットワークが割り当てるダイジェストと一致する。
pub fn transaction_digest(tx_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(TRANSACTION_DATA_DIGEST_PREFIX);
    hasher.update(tx_bytes);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// 公開鍵からSuiアドレス（32バイト）を導出する。
pub fn sui_address_from_public_key(scheme: SignatureScheme, public_key: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update([scheme.flag()]);
    hasher.update(public_key);
    let result = hasher.finalize();
    let mut address = [0u8; 32];
    address.copy_from_slice(&result);
    address
}

/// Ed25519公開鍵からSuiアドレスを導出する。
pub fn ed25519_address(verifying_key: &Ed25519VerifyingKey) -> [u8; 32] {
    sui_address_from_public_key(SignatureScheme::Ed25519, verifying_key.as_bytes())
}

/// Base64エンコードされたEd25519秘密鍵を読み込む。
///
/// 受け付ける形式:
/// - 32バイト: シード
/// - 33バイト: `0x00 || シード`（Suiキーストア形式）
/// - 64バイト: `シード || 公開鍵`（旧形式、公開鍵の一致を確認する）
pub fn load_ed25519_signing_key(encoded: &str) -> Result<Ed25519SigningKey, CryptoError> {
    let bytes = b64()
        .decode(encoded.trim())
        .map_err(|e| CryptoError::Base64(e.to_string()))?;

    match bytes.len() {
        32 => Ok(Ed25519SigningKey::from_bytes(&seed_from_slice(&bytes)?)),
        33 => {
            let flag = bytes[0];
            if flag != SignatureScheme::Ed25519.flag() {
                return Err(CryptoError::UnsupportedScheme(flag));
            }
            Ok(Ed25519SigningKey::from_bytes(&seed_from_slice(&bytes[1..])?))
        }
        64 => {
            let signing_key = Ed25519SigningKey::from_bytes(&seed_from_slice(&bytes[..32])?);
            if signing_key.verifying_key().as_bytes() != &bytes[32..] {
                return Err(CryptoError::InvalidPrivateKey(
                    "64バイト鍵の公開鍵部分がシードと一致しません".to_string(),
                ));
            }
            Ok(signing_key)
        }
        n => Err(CryptoError::InvalidPrivateKey(format!(
            "鍵長は32/33/64バイトである必要があります（実際: {n}バイト）"
        ))),
    }
}

fn seed_from_slice(bytes: &[u8]) -> Result<[u8; 32], CryptoError> {
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidPrivateKey("シードが32バイトではありません".to_string()))
}

/// BCS `TransactionData`にEd25519で署名し、Sui署名形式で返す。
pub fn ed25519_sign_transaction(signing_key: &Ed25519SigningKey, tx_bytes: &[u8]) -> SuiSignature {
    let digest = transaction_signing_digest(tx_bytes);
    let signature = signing_key.sign(&digest);
    SuiSignature::ed25519(&signature, &signing_key.verifying_key())
}

/// Ed25519のSui署名を`TransactionData`に対して検証する。
pub fn ed25519_verify_transaction(
    signature: &SuiSignature,
    tx_bytes: &[u8],
) -> Result<(), CryptoError> {
    if signature.scheme() != SignatureScheme::Ed25519 {
        return Err(CryptoError::UnsupportedScheme(signature.scheme().flag()));
    }
    let public_key: [u8; 32] = signature
        .public_key()
        .and_then(|pk| pk.try_into().ok())
        .ok_or_else(|| CryptoError::InvalidSignature("Ed25519公開鍵は32バイトです".to_string()))?;
    let sig_bytes: [u8; 64] = signature
        .signature_bytes()
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| CryptoError::InvalidSignature("Ed25519署名は64バイトです".to_string()))?;

    let verifying_key = Ed25519VerifyingKey::from_bytes(&public_key)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    let digest = transaction_signing_digest(tx_bytes);
    verifying_key
        .verify(&digest, &Ed25519Signature::from_bytes(&sig_bytes))
        .map_err(|_| CryptoError::SignatureVerifyError)
}
