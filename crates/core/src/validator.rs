//! # 意図バリデータ
//!
//! スポンサーがガスを支払ってよい呼び出し先の許可リストと、
//! トランザクション意図に対する静的検査を提供する。
//!
//! ## 検査規則
//! - MoveCallは許可リストに含まれる`package::module::function`のみ
//! - Publish / Upgrade は常に拒否
//! - `GasCoin`引数（スポンサー所有のガスコイン）の使用は拒否
//! - TransferObjects / SplitCoins / MergeCoins / MakeMoveVec は許可
//! - MoveCallを1つも含まない意図は拒否
//! - 引数の参照先（入力・先行コマンドの結果）が範囲外なら不正な意図として拒否
//!
//! 検査は純粋関数で、署名・送信の前に必ず実行される。

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::intent::TransactionIntent;
use crate::transaction::{Argument, Command, ProgrammableMoveCall, SuiAddress};

// ---------------------------------------------------------------------------
// 拒否理由
// ---------------------------------------------------------------------------

/// 意図が拒否された理由。メッセージはクライアントにそのまま返される。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionReason {
    #[error("Transaction contains no Move calls")]
    EmptyIntent,
    #[error("Malformed transaction intent: {0}")]
    MalformedIntent(String),
    #[error("Move call target is not allowed: {0}")]
    DisallowedCall(String),
    #[error("Command is not allowed in sponsored transactions: {0}")]
    DisallowedCommand(String),
}

impl RejectionReason {
    /// ログ用の分類名。
    pub fn kind(&self) -> &'static str {
        match self {
            RejectionReason::EmptyIntent => "empty_intent",
            RejectionReason::MalformedIntent(_) => "malformed_intent",
            RejectionReason::DisallowedCall(_) => "disallowed_call",
            RejectionReason::DisallowedCommand(_) => "disallowed_command",
        }
    }
}

// ---------------------------------------------------------------------------
// 許可リスト
// ---------------------------------------------------------------------------

/// 許可リストエントリのパースエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllowListError {
    #[error("allow-list entry must be package::module::function: {0}")]
    InvalidFormat(String),
    #[error("invalid package address in allow-list entry {entry}: {reason}")]
    InvalidPackage { entry: String, reason: String },
    #[error("invalid Move identifier in allow-list entry: {0}")]
    InvalidIdentifier(String),
}

/// 許可された呼び出し先。パッケージアドレスは32バイトに正規化される。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AllowListEntry {
    pub package: SuiAddress,
    pub module: String,
    pub function: String,
}

impl AllowListEntry {
    fn of_call(call: &ProgrammableMoveCall) -> Self {
        Self {
            package: call.package,
            module: call.module.clone(),
            function: call.function.clone(),
        }
    }
}

impl FromStr for AllowListEntry {
    type Err = AllowListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entry = s.trim();
        let parts: Vec<&str> = entry.split("::").collect();
        let [package, module, function] = parts.as_slice() else {
            return Err(AllowListError::InvalidFormat(entry.to_string()));
        };
        let package = package
            .parse::<SuiAddress>()
            .map_err(|e| AllowListError::InvalidPackage {
                entry: entry.to_string(),
                reason: e.to_string(),
            })?;
        for ident in [module, function] {
            if !is_move_identifier(ident) {
                return Err(AllowListError::InvalidIdentifier(entry.to_string()));
            }
        }
        Ok(Self {
            package,
            module: module.to_string(),
            function: function.to_string(),
        })
    }
}

impl fmt::Display for AllowListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.module, self.function)
    }
}

fn is_move_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && s != "_"
}

/// 起動時に一度だけ構築される読み取り専用の許可リスト。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: HashSet<AllowListEntry>,
}

impl AllowList {
    pub fn new(entries: impl IntoIterator<Item = AllowListEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// カンマ区切りのエントリ列をパースする。空要素は無視する。
    pub fn parse_csv(s: &str) -> Result<Self, AllowListError> {
        let entries = s
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::parse::<AllowListEntry>)
            .collect::<Result<Vec<AllowListEntry>, _>>()?;
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, call: &ProgrammableMoveCall) -> bool {
        self.entries.contains(&AllowListEntry::of_call(call))
    }

    /// 意図を検査する。最初に見つかった違反を返す。
    pub fn validate(&self, intent: &TransactionIntent) -> Result<(), RejectionReason> {
        let input_count = intent.inputs().len();
        let mut move_calls = 0usize;

        for (index, command) in intent.commands().iter().enumerate() {
            for argument in command.arguments() {
                check_argument(argument, index, input_count)?;
            }

            match command {
                Command::MoveCall(call) => {
                    move_calls += 1;
                    if !self.contains(call) {
                        return Err(RejectionReason::DisallowedCall(
                            AllowListEntry::of_call(call).to_string(),
                        ));
                    }
                }
                Command::Publish(..) | Command::Upgrade(..) => {
                    return Err(RejectionReason::DisallowedCommand(command.name().to_string()));
                }
                Command::TransferObjects(..)
                | Command::SplitCoins(..)
                | Command::MergeCoins(..)
                | Command::MakeMoveVec(..) => {}
            }
        }

        if move_calls == 0 {
            return Err(RejectionReason::EmptyIntent);
        }
        Ok(())
    }
}

/// 引数の参照範囲を確認する。結果参照は先行コマンドのみ有効。
fn check_argument(
    argument: Argument,
    command_index: usize,
    input_count: usize,
) -> Result<(), RejectionReason> {
    match argument {
        Argument::GasCoin => Err(RejectionReason::DisallowedCommand(format!(
            "GasCoin argument in command {command_index}"
        ))),
        Argument::Input(i) if usize::from(i) >= input_count => {
            Err(RejectionReason::MalformedIntent(format!(
                "command {command_index} references input {i} but only {input_count} inputs exist"
            )))
        }
        Argument::Result(r) | Argument::NestedResult(r, _) if usize::from(r) >= command_index => {
            Err(RejectionReason::MalformedIntent(format!(
                "command {command_index} references result of command {r}"
            )))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{CallArg, ProgrammableTransaction};

    const PKG: &str = "0xabc";

    fn move_call(package: &str, module: &str, function: &str, args: Vec<Argument>) -> Command {
        Command::MoveCall(Box::new(ProgrammableMoveCall {
            package: package.parse().unwrap(),
            module: module.to_string(),
            function: function.to_string(),
            type_arguments: vec![],
            arguments: args,
        }))
    }

    fn intent(inputs: usize, commands: Vec<Command>) -> TransactionIntent {
        TransactionIntent::from_programmable(ProgrammableTransaction {
            inputs: (0..inputs).map(|i| CallArg::Pure(vec![i as u8])).collect(),
            commands,
        })
    }

    fn allow_list() -> AllowList {
        AllowList::parse_csv("0xabc::profile::create_profile, 0x2::coin::join").unwrap()
    }

    #[test]
    fn test_entry_normalizes_package_address() {
        let short: AllowListEntry = "0x2::coin::join".parse().unwrap();
        let long: AllowListEntry =
            "0x0000000000000000000000000000000000000000000000000000000000000002::coin::join"
                .parse()
                .unwrap();
        assert_eq!(short, long);
        assert_eq!(allow_list().len(), 2);
    }

    #[test]
    fn test_entry_parse_errors() {
        assert!(matches!(
            "0x2::coin".parse::<AllowListEntry>(),
            Err(AllowListError::InvalidFormat(_))
        ));
        assert!(matches!(
            "0x2::coin::join::extra".parse::<AllowListEntry>(),
            Err(AllowListError::InvalidFormat(_))
        ));
        assert!(matches!(
            "two::coin::join".parse::<AllowListEntry>(),
            Err(AllowListError::InvalidPackage { .. })
        ));
        assert!(matches!(
            "0x2::1coin::join".parse::<AllowListEntry>(),
            Err(AllowListError::InvalidIdentifier(_))
        ));
        assert!(AllowList::parse_csv("").unwrap().is_empty());
        assert!(AllowList::parse_csv("0x2::coin::join,bad").is_err());
    }

    #[test]
    fn test_allow_listed_call_accepted() {
        let intent = intent(
            2,
            vec![
                move_call(PKG, "profile", "create_profile", vec![Argument::Input(0)]),
                Command::TransferObjects(vec![Argument::Result(0)], Argument::Input(1)),
            ],
        );
        assert_eq!(allow_list().validate(&intent), Ok(()));
    }

    #[test]
    fn test_disallowed_call_rejected() {
        let intent = intent(
            0,
            vec![
                move_call(PKG, "profile", "create_profile", vec![]),
                move_call(PKG, "profile", "delete_everything", vec![]),
            ],
        );
        let err = allow_list().validate(&intent).unwrap_err();
        assert!(matches!(
            &err,
            RejectionReason::DisallowedCall(t) if t.ends_with("::profile::delete_everything")
        ));
    }

    #[test]
    fn test_empty_allow_list_rejects_everything() {
        let intent = intent(0, vec![move_call(PKG, "profile", "create_profile", vec![])]);
        assert!(matches!(
            AllowList::default().validate(&intent),
            Err(RejectionReason::DisallowedCall(_))
        ));
    }

    #[test]
    fn test_intent_without_move_call_is_empty() {
        assert_eq!(
            allow_list().validate(&intent(0, vec![])),
            Err(RejectionReason::EmptyIntent)
        );
        let transfer_only = intent(
            2,
            vec![Command::TransferObjects(vec![Argument::Input(0)], Argument::Input(1))],
        );
        assert_eq!(
            allow_list().validate(&transfer_only),
            Err(RejectionReason::EmptyIntent)
        );
    }

    #[test]
    fn test_publish_and_upgrade_rejected() {
        let publish = intent(
            0,
            vec![
                move_call(PKG, "profile", "create_profile", vec![]),
                Command::Publish(vec![vec![0xA1]], vec![]),
            ],
        );
        assert_eq!(
            allow_list().validate(&publish),
            Err(RejectionReason::DisallowedCommand("Publish".to_string()))
        );

        let upgrade = intent(
            1,
            vec![Command::Upgrade(
                vec![],
                vec![],
                PKG.parse().unwrap(),
                Argument::Input(0),
            )],
        );
        assert_eq!(
            allow_list().validate(&upgrade),
            Err(RejectionReason::DisallowedCommand("Upgrade".to_string()))
        );
    }

    #[test]
    fn test_gas_coin_usage_rejected() {
        let drain = intent(
            1,
            vec![
                move_call(PKG, "profile", "create_profile", vec![]),
                Command::SplitCoins(Argument::GasCoin, vec![Argument::Input(0)]),
            ],
        );
        assert!(matches!(
            allow_list().validate(&drain),
            Err(RejectionReason::DisallowedCommand(_))
        ));
    }

    #[test]
    fn test_out_of_range_references_are_malformed() {
        let bad_input = intent(
            0,
            vec![move_call(PKG, "profile", "create_profile", vec![Argument::Input(3)])],
        );
        assert!(matches!(
            allow_list().validate(&bad_input),
            Err(RejectionReason::MalformedIntent(_))
        ));

        let forward_result = intent(
            0,
            vec![move_call(PKG, "profile", "create_profile", vec![Argument::NestedResult(0, 0)])],
        );
        assert!(matches!(
            allow_list().validate(&forward_result),
            Err(RejectionReason::MalformedIntent(_))
        ));
    }

    #[test]
    fn test_validation_is_repeatable() {
        let intent = intent(0, vec![move_call(PKG, "admin", "drain", vec![])]);
        let list = allow_list();
        assert_eq!(list.validate(&intent), list.validate(&intent));
    }
}
