//! # スポンサー付きエンベロープ
//!
//! 意図・送信者・スポンサーのガス情報から`TransactionData`を組み立て、
//! 署名を付与して送信可能な形にする。
//!
//! 署名順序は常に`[ユーザー, スポンサー]`。
//! `UnsignedEnvelope`から`SponsoredEnvelope`への遷移でのみ署名が付与されるため、
//! 署名のない、あるいは順序の異なるエンベロープは構築できない。

use gas_station_crypto::SuiSignature;

use crate::capability::GasQuote;
use crate::intent::TransactionIntent;
use crate::transaction::{
    transaction_digest_base58, GasData, SuiAddress, TransactionData, TransactionDataV1,
    TransactionExpiration,
};

/// 署名前のエンベロープ。シリアライズ済みバイト列を保持し、署名対象として使う。
#[derive(Debug, Clone)]
pub struct UnsignedEnvelope {
    data: TransactionData,
    tx_bytes: Vec<u8>,
}

impl UnsignedEnvelope {
    /// `TransactionData::V1`を組み立て、BCSで決定的にシリアライズする。
    /// ガス所有者は常にスポンサーアドレス。
    pub fn build(
        intent: &TransactionIntent,
        sender: SuiAddress,
        sponsor: SuiAddress,
        quote: &GasQuote,
    ) -> Result<Self, bcs::Error> {
        let data = TransactionData::V1(TransactionDataV1 {
            kind: intent.to_kind(),
            sender,
            gas_data: GasData {
                payment: quote.payment.clone(),
                owner: sponsor,
                price: quote.price,
                budget: quote.budget,
            },
            expiration: TransactionExpiration::None,
        });
        let tx_bytes = data.to_bcs_bytes()?;
        Ok(Self { data, tx_bytes })
    }

    pub fn data(&self) -> &TransactionData {
        &self.data
    }

    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    pub fn digest(&self) -> String {
        transaction_digest_base58(&self.tx_bytes)
    }

    /// 署名を付与する。順序は`[user, sponsor]`で固定。
    pub fn into_signed(self, user: SuiSignature, sponsor: SuiSignature) -> SponsoredEnvelope {
        SponsoredEnvelope {
            data: self.data,
            tx_bytes: self.tx_bytes,
            signatures: [user, sponsor],
        }
    }
}

/// 両者の署名が付与された送信可能なエンベロープ。
#[derive(Debug, Clone)]
pub struct SponsoredEnvelope {
    data: TransactionData,
    tx_bytes: Vec<u8>,
    signatures: [SuiSignature; 2],
}

impl SponsoredEnvelope {
    pub fn data(&self) -> &TransactionData {
        &self.data
    }

    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    pub fn user_signature(&self) -> &SuiSignature {
        &self.signatures[0]
    }

    pub fn sponsor_signature(&self) -> &SuiSignature {
        &self.signatures[1]
    }

    pub fn signatures(&self) -> &[SuiSignature] {
        &self.signatures
    }

    pub fn digest(&self) -> String {
        transaction_digest_base58(&self.tx_bytes)
    }
}
