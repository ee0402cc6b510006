//! Sui署名形式（`flag || signature || public_key`）。
//!
//! ユーザー署名はEd25519以外のスキームでも受け付ける。
//! MultiSig / zkLogin / Passkey は内部構造を解釈せず、フラグのみ確認して不透明なまま転送する。

use base64::Engine;

use crate::{b64, CryptoError, Ed25519Signature, Ed25519VerifyingKey};

/// Sui署名スキームのフラグ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureScheme {
    Ed25519,
    Secp256k1,
    Secp256r1,
    MultiSig,
    ZkLogin,
    Passkey,
}

impl SignatureScheme {
    /// 署名先頭の1バイトフラグ。
    pub fn flag(self) -> u8 {
        match self {
            SignatureScheme::Ed25519 => 0x00,
            SignatureScheme::Secp256k1 => 0x01,
            SignatureScheme::Secp256r1 => 0x02,
            SignatureScheme::MultiSig => 0x03,
            SignatureScheme::ZkLogin => 0x05,
            SignatureScheme::Passkey => 0x06,
        }
    }

    pub fn from_flag(flag: u8) -> Result<Self, CryptoError> {
        match flag {
            0x00 => Ok(SignatureScheme::Ed25519),
            0x01 => Ok(SignatureScheme::Secp256k1),
            0x02 => Ok(SignatureScheme::Secp256r1),
            0x03 => Ok(SignatureScheme::MultiSig),
            0x05 => Ok(SignatureScheme::ZkLogin),
            0x06 => Ok(SignatureScheme::Passkey),
            other => Err(CryptoError::UnsupportedScheme(other)),
        }
    }

    /// `(署名長, 公開鍵長)`。可変長スキームは`None`。
    fn fixed_layout(self) -> Option<(usize, usize)> {
        match self {
            SignatureScheme::Ed25519 => Some((64, 32)),
            SignatureScheme::Secp256k1 | SignatureScheme::Secp256r1 => Some((64, 33)),
            _ => None,
        }
    }
}

/// フラグ付きのSui署名バイト列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiSignature {
    scheme: SignatureScheme,
    bytes: Vec<u8>,
}

impl SuiSignature {
    /// バイト列からSui署名を構築する。
    ///
    /// 固定長スキームは長さを検証する。可変長スキームはフラグ以降が空でないことのみ確認する。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let (&flag, rest) = bytes
            .split_first()
            .ok_or_else(|| CryptoError::InvalidSignature("署名が空です".to_string()))?;
        let scheme = SignatureScheme::from_flag(flag)?;

        match scheme.fixed_layout() {
            Some((sig_len, pk_len)) if rest.len() != sig_len + pk_len => {
                return Err(CryptoError::InvalidSignature(format!(
                    "{scheme:?}署名は{}バイトである必要があります（実際: {}バイト）",
                    1 + sig_len + pk_len,
                    bytes.len()
                )));
            }
            None if rest.is_empty() => {
                return Err(CryptoError::InvalidSignature(format!(
                    "{scheme:?}署名の本体が空です"
                )));
            }
            _ => {}
        }

        Ok(Self {
            scheme,
            bytes: bytes.to_vec(),
        })
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = b64()
            .decode(encoded.trim())
            .map_err(|e| CryptoError::Base64(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Ed25519署名と公開鍵からSui署名を構築する。
    pub fn ed25519(signature: &Ed25519Signature, verifying_key: &Ed25519VerifyingKey) -> Self {
        let mut bytes = Vec::with_capacity(97);
        bytes.push(SignatureScheme::Ed25519.flag());
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.extend_from_slice(verifying_key.as_bytes());
        Self {
            scheme: SignatureScheme::Ed25519,
            bytes,
        }
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        b64().encode(&self.bytes)
    }

    /// 固定長スキームの署名部分。
    pub fn signature_bytes(&self) -> Option<&[u8]> {
        let (sig_len, _) = self.scheme.fixed_layout()?;
        Some(&self.bytes[1..1 + sig_len])
    }

    /// 固定長スキームの公開鍵部分。
    pub fn public_key(&self) -> Option<&[u8]> {
        let (sig_len, _) = self.scheme.fixed_layout()?;
        Some(&self.bytes[1 + sig_len..])
    }

    /// 署名者のSuiアドレス。公開鍵を含む固定長スキームでのみ導出できる。
    pub fn signer_address(&self) -> Option<[u8; 32]> {
        self.public_key()
            .map(|pk| crate::sui_address_from_public_key(self.scheme, pk))
    }
}
