//! # Sui JSON-RPC 台帳
//!
//! Suiフルノードに対する`Ledger`実装。
//!
//! ## 使用するメソッド
//! - `suix_getReferenceGasPrice`: 参照ガス価格
//! - `suix_getCoins`: スポンサーのSUIコイン一覧
//! - `sui_executeTransactionBlock`: 署名済みトランザクションの送信
//! - `suix_getBalance`: 残高
//!
//! ## ガスコインの予約
//! 同じコインバージョンを2つのトランザクションで同時に使うと一方が失敗するため、
//! 送信中のトランザクションが使うコインを予約表（TTL付き）で管理する。
//! 予約は送信完了時に解放され、解放されなかった予約もTTL経過で無効になる。
//!
//! `prepare`で選んだコインは見積もりごと保持表に残し、`sponsor`が引き取る。
//! 保持の期限は予約の期限と同じ。

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base58::FromBase58;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use gas_station_core::capability::{GasHoldKey, GasQuote, Ledger, LedgerError};
use gas_station_core::transaction::ObjectId;
use gas_station_core::{ObjectDigest, ObjectRef, SponsoredEnvelope, SuiAddress};
use gas_station_crypto::b64;

/// SUIコインの型
const SUI_COIN_TYPE: &str = "0x2::sui::SUI";

/// 1トランザクションで使えるガス支払いオブジェクトの上限
const MAX_GAS_PAYMENT_OBJECTS: usize = 255;

/// `suix_getCoins`の1ページあたりの件数
const COIN_PAGE_LIMIT: u64 = 50;

// ---------------------------------------------------------------------------
// JSON-RPC レスポンス型
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinPage {
    data: Vec<CoinInfo>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinInfo {
    coin_object_id: String,
    version: String,
    digest: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceInfo {
    total_balance: String,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    digest: String,
    #[serde(default)]
    effects: Option<TransactionEffects>,
}

#[derive(Debug, Deserialize)]
struct TransactionEffects {
    status: ExecutionStatus,
}

#[derive(Debug, Deserialize)]
struct ExecutionStatus {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

impl CoinInfo {
    fn object_ref(&self) -> Result<ObjectRef, LedgerError> {
        let object_id: ObjectId = self
            .coin_object_id
            .parse()
            .map_err(|e| LedgerError::Protocol(format!("coinObjectIdが不正です: {e}")))?;
        let version = self
            .version
            .parse::<u64>()
            .map_err(|e| LedgerError::Protocol(format!("versionが不正です: {e}")))?;
        let digest_bytes = self
            .digest
            .from_base58()
            .map_err(|e| LedgerError::Protocol(format!("digestのBase58デコードに失敗: {e:?}")))?;
        let digest: [u8; 32] = digest_bytes
            .try_into()
            .map_err(|_| LedgerError::Protocol("digestが32バイトではありません".to_string()))?;
        Ok(ObjectRef {
            object_id,
            version,
            digest: ObjectDigest(digest),
        })
    }

    fn balance(&self) -> Result<u64, LedgerError> {
        self.balance
            .parse()
            .map_err(|e| LedgerError::Protocol(format!("balanceが不正です: {e}")))
    }
}

/// BigInt系の値は文字列で返るが、数値で返すノードもあるため両方受け付ける。
fn parse_u64_value(value: &serde_json::Value) -> Result<u64, LedgerError> {
    match value {
        serde_json::Value::String(s) => s
            .parse()
            .map_err(|e| LedgerError::Protocol(format!("数値のパースに失敗: {e}"))),
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| LedgerError::Protocol(format!("u64ではない数値です: {n}"))),
        other => Err(LedgerError::Protocol(format!("数値ではありません: {other}"))),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> LedgerError {
    if err.is_timeout() {
        LedgerError::Timeout
    } else {
        LedgerError::Unavailable(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// SuiRpcLedger
// ---------------------------------------------------------------------------

/// Sui JSON-RPCによる`Ledger`実装。
pub struct SuiRpcLedger {
    rpc_url: String,
    http_client: reqwest::Client,
    lease_ttl: Duration,
    /// 予約中のガスコインと予約期限
    leases: Mutex<HashMap<ObjectId, Instant>>,
    /// `prepare`が保持した見積もりと保持期限
    holds: Mutex<HashMap<GasHoldKey, (GasQuote, Instant)>>,
    /// コイン選択から予約登録までを直列化する
    reserve_lock: tokio::sync::Mutex<()>,
}

impl SuiRpcLedger {
    /// `rpc_timeout`はリクエストごとのタイムアウト。
    pub fn new(
        rpc_url: impl Into<String>,
        rpc_timeout: Duration,
        lease_ttl: Duration,
    ) -> Result<Self, LedgerError> {
        let http_client = reqwest::Client::builder()
            .timeout(rpc_timeout)
            .build()
            .map_err(|e| LedgerError::Unavailable(format!("HTTPクライアントの構築に失敗: {e}")))?;
        Ok(Self {
            rpc_url: rpc_url.into(),
            http_client,
            lease_ttl,
            leases: Mutex::new(HashMap::new()),
            holds: Mutex::new(HashMap::new()),
            reserve_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// JSON-RPCを呼び出し、`result`をデシリアライズして返す。
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, LedgerError> {
        let rpc_request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let rpc_response = self
            .http_client
            .post(&self.rpc_url)
            .json(&rpc_request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = rpc_response.status();
        if !status.is_success() {
            return Err(LedgerError::Unavailable(format!(
                "{method}: HTTPステータス {status}"
            )));
        }

        let rpc_body: serde_json::Value = rpc_response.json().await.map_err(|e| {
            if e.is_timeout() {
                LedgerError::Timeout
            } else {
                LedgerError::Protocol(format!("{method}: レスポンスのパースに失敗: {e}"))
            }
        })?;

        if let Some(error) = rpc_body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(LedgerError::Rejected(message));
        }

        let result = rpc_body
            .get("result")
            .cloned()
            .ok_or_else(|| LedgerError::Protocol(format!("{method}: resultがありません")))?;
        serde_json::from_value(result)
            .map_err(|e| LedgerError::Protocol(format!("{method}: resultの形式が不正: {e}")))
    }

    async fn reference_gas_price(&self) -> Result<u64, LedgerError> {
        let value: serde_json::Value = self
            .call("suix_getReferenceGasPrice", serde_json::json!([]))
            .await?;
        parse_u64_value(&value)
    }

    fn is_leased(&self, object_id: &ObjectId, now: Instant) -> bool {
        let leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        leases.get(object_id).is_some_and(|expiry| *expiry > now)
    }

    /// 予約されていないコインをRPCの返却順に選び、予算に達するまで積み上げる。
    async fn select_coins(&self, owner: SuiAddress, budget: u64) -> Result<GasQuote, LedgerError> {
        let price = self.reference_gas_price().await?;
        let now = Instant::now();

        let mut payment = Vec::new();
        let mut total: u128 = 0;
        let mut cursor: Option<String> = None;

        'pages: loop {
            let page: CoinPage = self
                .call(
                    "suix_getCoins",
                    serde_json::json!([owner.to_string(), SUI_COIN_TYPE, cursor, COIN_PAGE_LIMIT]),
                )
                .await?;

            for coin in &page.data {
                let object_ref = coin.object_ref()?;
                if self.is_leased(&object_ref.object_id, now) {
                    continue;
                }
                let balance = coin.balance()?;
                if balance == 0 {
                    continue;
                }
                payment.push(object_ref);
                total += u128::from(balance);
                if total >= u128::from(budget) || payment.len() >= MAX_GAS_PAYMENT_OBJECTS {
                    break 'pages;
                }
            }

            match page.next_cursor {
                Some(next) if page.has_next_page => cursor = Some(next),
                _ => break,
            }
        }

        if total < u128::from(budget) {
            return Err(LedgerError::InsufficientGas {
                required: budget,
                available: total,
            });
        }

        Ok(GasQuote {
            price,
            budget,
            payment,
        })
    }

    /// 選んだコインを`expires_at`まで予約する。期限切れの予約はここで掃除する。
    fn lease(&self, payment: &[ObjectRef], now: Instant, expires_at: Instant) {
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        leases.retain(|_, expiry| *expiry > now);
        for object_ref in payment {
            leases.insert(object_ref.object_id, expires_at);
        }
        tracing::debug!(coins = payment.len(), leased = leases.len(), "ガスコインを予約しました");
    }

    fn release(&self, payment: &[ObjectRef]) {
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        for object_ref in payment {
            leases.remove(&object_ref.object_id);
        }
    }
}

#[async_trait]
impl Ledger for SuiRpcLedger {
    async fn gas_quote(&self, owner: SuiAddress, budget: u64) -> Result<GasQuote, LedgerError> {
        self.select_coins(owner, budget).await
    }

    async fn reserve_gas(&self, owner: SuiAddress, budget: u64) -> Result<GasQuote, LedgerError> {
        let _guard = self.reserve_lock.lock().await;
        let quote = self.select_coins(owner, budget).await?;

        let now = Instant::now();
        self.lease(&quote.payment, now, now + self.lease_ttl);
        Ok(quote)
    }

    async fn hold_gas(
        &self,
        owner: SuiAddress,
        budget: u64,
        key: GasHoldKey,
    ) -> Result<GasQuote, LedgerError> {
        let _guard = self.reserve_lock.lock().await;
        {
            let now = Instant::now();
            let mut holds = self.holds.lock().unwrap_or_else(|e| e.into_inner());
            holds.retain(|_, (_, expiry)| *expiry > now);
            if let Some((quote, _)) = holds.get(&key) {
                return Ok(quote.clone());
            }
        }

        let quote = self.select_coins(owner, budget).await?;

        let now = Instant::now();
        let expires_at = now + self.lease_ttl;
        self.lease(&quote.payment, now, expires_at);
        self.holds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, (quote.clone(), expires_at));
        Ok(quote)
    }

    fn claim_gas(&self, key: &GasHoldKey) -> Option<GasQuote> {
        let now = Instant::now();
        let (quote, expiry) = self
            .holds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)?;
        if expiry <= now {
            return None;
        }
        // 引き取り後の署名・送信の間も予約を維持する
        self.lease(&quote.payment, now, now + self.lease_ttl);
        Some(quote)
    }

    fn release_gas(&self, payment: &[ObjectRef]) {
        self.release(payment);
    }

    async fn submit(&self, envelope: SponsoredEnvelope) -> Result<String, LedgerError> {
        let tx_b64 = b64().encode(envelope.tx_bytes());
        let signatures: Vec<String> = envelope
            .signatures()
            .iter()
            .map(|signature| signature.to_base64())
            .collect();

        let result: Result<ExecuteResponse, LedgerError> = self
            .call(
                "sui_executeTransactionBlock",
                serde_json::json!([
                    tx_b64,
                    signatures,
                    {"showEffects": true},
                    "WaitForLocalExecution"
                ]),
            )
            .await;
        self.release(&envelope.data().gas_data().payment);

        let response = result?;
        if let Some(effects) = response.effects {
            if effects.status.status != "success" {
                return Err(LedgerError::Rejected(
                    effects.status.error.unwrap_or(effects.status.status),
                ));
            }
        }
        Ok(response.digest)
    }

    async fn balance(&self, owner: SuiAddress) -> Result<u128, LedgerError> {
        let info: BalanceInfo = self
            .call(
                "suix_getBalance",
                serde_json::json!([owner.to_string(), SUI_COIN_TYPE]),
            )
            .await?;
        info.total_balance
            .parse()
            .map_err(|e| LedgerError::Protocol(format!("totalBalanceが不正です: {e}")))
    }
}
