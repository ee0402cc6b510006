//! # Suiトランザクションのデータモデル
//!
//! BCSでエンコードされる`TransactionKind` / `TransactionData`の型定義。
//! フィールド順とenumのバリアント順がそのままワイヤ形式になるため、並べ替えてはならない。

use std::fmt;
use std::str::FromStr;

use base58::ToBase58;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// アドレス / オブジェクトIDのバイト長。
pub const ADDRESS_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// アドレス・オブジェクト参照
// ---------------------------------------------------------------------------

/// 32バイトのSuiアドレス。BCS上は長さプレフィックスなしの固定長。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SuiAddress(pub [u8; ADDRESS_LENGTH]);

/// オブジェクトID（アドレスと同一表現）。
pub type ObjectId = SuiAddress;

/// アドレス文字列のパースエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),
    #[error("address must have 1 to 64 hex digits: {0}")]
    InvalidLength(String),
    #[error("address contains non-hex characters: {0}")]
    InvalidHex(String),
}

impl SuiAddress {
    pub const ZERO: SuiAddress = SuiAddress([0u8; ADDRESS_LENGTH]);

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }
}

impl FromStr for SuiAddress {
    type Err = AddressParseError;

    /// `0x`付き16進数をパースする。64桁未満は左ゼロ埋めする（`0x2` == `0x00..02`）。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| AddressParseError::MissingPrefix(s.to_string()))?;
        if digits.is_empty() || digits.len() > ADDRESS_LENGTH * 2 {
            return Err(AddressParseError::InvalidLength(s.to_string()));
        }
        let padded = format!("{digits:0>64}");
        let bytes =
            hex::decode(&padded).map_err(|_| AddressParseError::InvalidHex(s.to_string()))?;
        let mut address = [0u8; ADDRESS_LENGTH];
        address.copy_from_slice(&bytes);
        Ok(SuiAddress(address))
    }
}

impl fmt::Display for SuiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// オブジェクトのバージョン（シーケンス番号）。
pub type SequenceNumber = u64;

/// 32バイトのオブジェクトダイジェスト。
///
/// アドレスと異なり、BCS上は長さプレフィックス付きのバイト列として表現される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectDigest(pub [u8; 32]);

impl ObjectDigest {
    pub fn to_base58(&self) -> String {
        self.0.to_base58()
    }
}

impl Serialize for ObjectDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for ObjectDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        let digest: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            serde::de::Error::invalid_length(bytes.len(), &"a 32-byte object digest")
        })?;
        Ok(ObjectDigest(digest))
    }
}

/// `(ID, バージョン, ダイジェスト)`で特定されるオブジェクト参照。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_id: ObjectId,
    pub version: SequenceNumber,
    pub digest: ObjectDigest,
}

// ---------------------------------------------------------------------------
// Programmable Transaction
// ---------------------------------------------------------------------------

/// PTBの入力。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallArg {
    Pure(Vec<u8>),
    Object(ObjectArg),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectArg {
    ImmOrOwnedObject(ObjectRef),
    SharedObject {
        id: ObjectId,
        initial_shared_version: SequenceNumber,
        mutable: bool,
    },
    Receiving(ObjectRef),
}

/// コマンド引数。`GasCoin`はガス支払いコイン（スポンサー所有）を指す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Argument {
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTag {
    Bool,
    U8,
    U64,
    U128,
    Address,
    Signer,
    Vector(Box<TypeTag>),
    Struct(Box<StructTag>),
    U16,
    U32,
    U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructTag {
    pub address: SuiAddress,
    pub module: String,
    pub name: String,
    pub type_params: Vec<TypeTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammableMoveCall {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub type_arguments: Vec<TypeTag>,
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    MoveCall(Box<ProgrammableMoveCall>),
    TransferObjects(Vec<Argument>, Argument),
    SplitCoins(Argument, Vec<Argument>),
    MergeCoins(Argument, Vec<Argument>),
    Publish(Vec<Vec<u8>>, Vec<ObjectId>),
    MakeMoveVec(Option<TypeTag>, Vec<Argument>),
    Upgrade(Vec<Vec<u8>>, Vec<ObjectId>, ObjectId, Argument),
}

impl Command {
    /// ログ・拒否理由に使うコマンド名。
    pub fn name(&self) -> &'static str {
        match self {
            Command::MoveCall(_) => "MoveCall",
            Command::TransferObjects(..) => "TransferObjects",
            Command::SplitCoins(..) => "SplitCoins",
            Command::MergeCoins(..) => "MergeCoins",
            Command::Publish(..) => "Publish",
            Command::MakeMoveVec(..) => "MakeMoveVec",
            Command::Upgrade(..) => "Upgrade",
        }
    }

    /// コマンドが参照する全引数。
    pub fn arguments(&self) -> Vec<Argument> {
        match self {
            Command::MoveCall(call) => call.arguments.clone(),
            Command::TransferObjects(objects, recipient) => {
                let mut args = objects.clone();
                args.push(*recipient);
                args
            }
            Command::SplitCoins(coin, amounts) => {
                let mut args = vec![*coin];
                args.extend_from_slice(amounts);
                args
            }
            Command::MergeCoins(target, sources) => {
                let mut args = vec![*target];
                args.extend_from_slice(sources);
                args
            }
            Command::Publish(..) => Vec::new(),
            Command::MakeMoveVec(_, elements) => elements.clone(),
            Command::Upgrade(_, _, _, ticket) => vec![*ticket],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammableTransaction {
    pub inputs: Vec<CallArg>,
    pub commands: Vec<Command>,
}

/// トランザクションの種類。システムトランザクションはスポンサー対象外のため表現しない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    ProgrammableTransaction(ProgrammableTransaction),
}

// ---------------------------------------------------------------------------
// TransactionData
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasData {
    pub payment: Vec<ObjectRef>,
    pub owner: SuiAddress,
    pub price: u64,
    pub budget: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionExpiration {
    None,
    Epoch(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDataV1 {
    pub kind: TransactionKind,
    pub sender: SuiAddress,
    pub gas_data: GasData,
    pub expiration: TransactionExpiration,
}

/// ユーザーとスポンサーの双方が署名する対象。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionData {
    V1(TransactionDataV1),
}

impl TransactionData {
    pub fn sender(&self) -> SuiAddress {
        match self {
            TransactionData::V1(data) => data.sender,
        }
    }

    pub fn gas_data(&self) -> &GasData {
        match self {
            TransactionData::V1(data) => &data.gas_data,
        }
    }

    pub fn to_bcs_bytes(&self) -> Result<Vec<u8>, bcs::Error> {
        bcs::to_bytes(self)
    }

    pub fn from_bcs_bytes(bytes: &[u8]) -> Result<Self, bcs::Error> {
        bcs::from_bytes(bytes)
    }
}

/// BCSバイト列からBase58のトランザクションダイジェストを計算する。
pub fn transaction_digest_base58(tx_bytes: &[u8]) -> String {
    gas_station_crypto::transaction_digest(tx_bytes).to_base58()
}
