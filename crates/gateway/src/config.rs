//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。
//! 不正な値は起動前に致命的エラーとする。

use std::time::Duration;

use anyhow::Context;
use gas_station_core::engine::{DEFAULT_GAS_BUDGET, DEFAULT_SUBMISSION_TIMEOUT};
use gas_station_core::{AllowList, SponsorshipEngine};

/// 既定のSui JSON-RPCエンドポイント
pub const DEFAULT_SUI_RPC_URL: &str = "https://fullnode.testnet.sui.io:443";

/// Gatewayの起動設定。
///
/// 秘密鍵を含むため`Debug`は実装しない。
pub struct GatewayConfig {
    /// スポンサー秘密鍵（Base64）
    pub sponsor_private_key: String,
    /// スポンサー対象の呼び出し先
    pub allow_list: AllowList,
    /// Sui JSON-RPCエンドポイント
    pub sui_rpc_url: String,
    /// ガス予算（MIST）
    pub gas_budget: u64,
    /// エンジンの送信タイムアウト
    pub submission_timeout: Duration,
    /// JSON-RPCリクエストごとのタイムアウト
    pub rpc_timeout: Duration,
    /// ガスコイン予約の有効期間
    pub gas_coin_lease: Duration,
    pub host: String,
    pub port: u16,
}

impl GatewayConfig {
    /// プロセス環境変数から読み込む。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の変数ソースから読み込む。空文字列は未設定として扱う。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let sponsor_private_key =
            var("SPONSOR_PRIVATE_KEY").context("SPONSOR_PRIVATE_KEYが設定されていません")?;

        let allow_list = match var("SPONSOR_ALLOWED_TARGETS") {
            Some(targets) => AllowList::parse_csv(&targets)
                .context("SPONSOR_ALLOWED_TARGETSの形式が不正です")?,
            None => AllowList::default(),
        };

        let secs = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            match var(key) {
                Some(v) => {
                    let secs: u64 = v
                        .trim()
                        .parse()
                        .with_context(|| format!("{key}は秒数（整数）である必要があります"))?;
                    anyhow::ensure!(secs > 0, "{key}は1以上である必要があります");
                    Ok(Duration::from_secs(secs))
                }
                None => Ok(default),
            }
        };

        let gas_budget = match var("SPONSOR_GAS_BUDGET") {
            Some(v) => v
                .trim()
                .parse()
                .context("SPONSOR_GAS_BUDGETはMIST単位の整数である必要があります")?,
            None => DEFAULT_GAS_BUDGET,
        };
        anyhow::ensure!(gas_budget > 0, "SPONSOR_GAS_BUDGETは1以上である必要があります");

        let port = match var("PORT") {
            Some(v) => v.trim().parse().context("PORTの形式が不正です")?,
            None => 10000,
        };

        Ok(Self {
            sponsor_private_key,
            allow_list,
            sui_rpc_url: var("SUI_RPC_URL").unwrap_or_else(|| DEFAULT_SUI_RPC_URL.to_string()),
            gas_budget,
            submission_timeout: secs("SUBMISSION_TIMEOUT_SECS", DEFAULT_SUBMISSION_TIMEOUT)?,
            rpc_timeout: secs("RPC_TIMEOUT_SECS", Duration::from_secs(30))?,
            gas_coin_lease: secs("GAS_COIN_LEASE_SECS", Duration::from_secs(60))?,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Gatewayの共有状態。
pub struct GatewayState {
    /// スポンサーシップエンジン
    pub engine: SponsorshipEngine,
    /// スポンサーアドレス（0x付き16進数）
    pub sponsor_address: String,
    /// 接続先ネットワーク（ヘルスチェックで公開）
    pub network: String,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            GatewayConfig::from_lookup(lookup(&[("SPONSOR_PRIVATE_KEY", "AAAA")])).unwrap();
        assert!(config.allow_list.is_empty());
        assert_eq!(config.sui_rpc_url, DEFAULT_SUI_RPC_URL);
        assert_eq!(config.gas_budget, DEFAULT_GAS_BUDGET);
        assert_eq!(config.submission_timeout, Duration::from_secs(30));
        assert_eq!(config.gas_coin_lease, Duration::from_secs(60));
        assert_eq!(config.bind_addr(), "0.0.0.0:10000");
    }

    #[test]
    fn test_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("SPONSOR_PRIVATE_KEY", "AAAA"),
            ("SPONSOR_ALLOWED_TARGETS", "0xabc::profile::create_profile, 0x2::coin::join"),
            ("SUI_RPC_URL", "http://127.0.0.1:9000"),
            ("SPONSOR_GAS_BUDGET", "10000000"),
            ("SUBMISSION_TIMEOUT_SECS", "5"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(config.allow_list.len(), 2);
        assert_eq!(config.sui_rpc_url, "http://127.0.0.1:9000");
        assert_eq!(config.gas_budget, 10_000_000);
        assert_eq!(config.submission_timeout, Duration::from_secs(5));
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_invalid_values_are_fatal() {
        assert!(GatewayConfig::from_lookup(lookup(&[])).is_err());
        assert!(GatewayConfig::from_lookup(lookup(&[("SPONSOR_PRIVATE_KEY", " ")])).is_err());
        assert!(GatewayConfig::from_lookup(lookup(&[
            ("SPONSOR_PRIVATE_KEY", "AAAA"),
            ("SPONSOR_ALLOWED_TARGETS", "not-a-target"),
        ]))
        .is_err());
        assert!(GatewayConfig::from_lookup(lookup(&[
            ("SPONSOR_PRIVATE_KEY", "AAAA"),
            ("SUBMISSION_TIMEOUT_SECS", "0"),
        ]))
        .is_err());
        assert!(GatewayConfig::from_lookup(lookup(&[
            ("SPONSOR_PRIVATE_KEY", "AAAA"),
            ("SPONSOR_GAS_BUDGET", "lots"),
        ]))
        .is_err());
    }
}
