//! # トランザクション意図（TransactionIntent）
//!
//! クライアントが送るBCS `TransactionKind`をデコードする。
//! ガス情報を含まないため、スポンサー側でガスを付与してから`TransactionData`に組み立てる。

use crate::transaction::{
    CallArg, Command, ProgrammableMoveCall, ProgrammableTransaction, TransactionKind,
};

/// `TransactionKind::ProgrammableTransaction`のBCSタグ。
const PROGRAMMABLE_TRANSACTION_TAG: u8 = 0;

/// 意図デコードのエラー型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// 入力が空
    #[error("transaction intent is empty")]
    Empty,
    /// PTB以外のトランザクション種別（システムトランザクション）
    #[error("unsupported transaction kind: {0}")]
    UnsupportedKind(u8),
    /// BCSとして不正
    #[error("invalid BCS transaction kind: {0}")]
    Bcs(String),
}

/// デコード済みのトランザクション意図。デコード後は不変。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    programmable: ProgrammableTransaction,
}

impl TransactionIntent {
    /// BCS `TransactionKind`をデコードする。末尾の余剰バイトは拒否する。
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (&tag, body) = bytes.split_first().ok_or(DecodeError::Empty)?;
        if tag != PROGRAMMABLE_TRANSACTION_TAG {
            return Err(DecodeError::UnsupportedKind(tag));
        }
        let programmable: ProgrammableTransaction =
            bcs::from_bytes(body).map_err(|e| DecodeError::Bcs(e.to_string()))?;
        Ok(Self { programmable })
    }

    pub fn from_programmable(programmable: ProgrammableTransaction) -> Self {
        Self { programmable }
    }

    pub fn inputs(&self) -> &[CallArg] {
        &self.programmable.inputs
    }

    pub fn commands(&self) -> &[Command] {
        &self.programmable.commands
    }

    /// 意図に含まれるMoveCallを出現順に返す。
    pub fn move_calls(&self) -> impl Iterator<Item = &ProgrammableMoveCall> {
        self.programmable.commands.iter().filter_map(|cmd| match cmd {
            Command::MoveCall(call) => Some(call.as_ref()),
            _ => None,
        })
    }

    /// `TransactionData`に埋め込む`TransactionKind`。
    pub fn to_kind(&self) -> TransactionKind {
        TransactionKind::ProgrammableTransaction(self.programmable.clone())
    }

    pub fn to_bcs_bytes(&self) -> Result<Vec<u8>, bcs::Error> {
        bcs::to_bytes(&self.to_kind())
    }
}
