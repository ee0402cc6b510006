//! # スポンサー鍵ペア署名
//!
//! 起動時に読み込んだEd25519鍵でスポンサー署名を行う。
//! 鍵は起動後読み取り専用で、`Arc`経由でロックなしに共有される。

use async_trait::async_trait;
use gas_station_core::capability::{SignerError, SponsorSigner};
use gas_station_core::SuiAddress;
use gas_station_crypto::{
    ed25519_address, ed25519_sign_transaction, load_ed25519_signing_key, CryptoError,
    Ed25519SigningKey, SuiSignature,
};

/// Ed25519鍵ペアによる`SponsorSigner`実装。
pub struct KeypairSigner {
    signing_key: Ed25519SigningKey,
    address: SuiAddress,
}

impl KeypairSigner {
    pub fn new(signing_key: Ed25519SigningKey) -> Self {
        let address = SuiAddress(ed25519_address(&signing_key.verifying_key()));
        Self {
            signing_key,
            address,
        }
    }

    /// `SPONSOR_PRIVATE_KEY`形式（Base64）の鍵を読み込む。
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        load_ed25519_signing_key(encoded).map(Self::new)
    }
}

#[async_trait]
impl SponsorSigner for KeypairSigner {
    fn address(&self) -> SuiAddress {
        self.address
    }

    async fn sign(&self, tx_bytes: &[u8]) -> Result<SuiSignature, SignerError> {
        Ok(ed25519_sign_transaction(&self.signing_key, tx_bytes))
    }
}
