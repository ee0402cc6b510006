//! # Gas Station Gateway
//!
//! Suiトランザクションのスポンサー（ガス代行支払い）を行うHTTPリレー。
//!
//! ## 役割
//! - リクエストの必須フィールド確認とBase64デコード
//! - スポンサーシップエンジンへの委譲
//! - エンジンの結果をHTTPステータスとJSONに変換
//!
//! ## API エンドポイント
//! - `POST /sponsor-tx` — 検査・スポンサー署名・送信
//! - `POST /sponsor-tx/prepare` — ユーザーが署名すべきバイト列の取得
//! - `GET /` — 稼働確認
//! - `GET /health` — 台帳到達性とスポンサー残高

mod config;
mod endpoints;
mod error;
mod signer;
mod sui_rpc;

use std::sync::Arc;

use gas_station_core::{EngineConfig, SponsorshipEngine};

use config::{GatewayConfig, GatewayState};
use endpoints::{handle_health, handle_prepare_tx, handle_sponsor_tx, handle_status};
use signer::KeypairSigner;
use sui_rpc::SuiRpcLedger;

/// ルーターを構築する。
fn build_router(state: Arc<GatewayState>) -> axum::Router {
    axum::Router::new()
        .route("/", axum::routing::get(handle_status))
        .route("/health", axum::routing::get(handle_health))
        .route("/sponsor-tx", axum::routing::post(handle_sponsor_tx))
        .route("/sponsor-tx/prepare", axum::routing::post(handle_prepare_tx))
        .with_state(state)
}

/// 設定から署名者・台帳・エンジンを組み立てる。
fn build_state(config: &GatewayConfig) -> anyhow::Result<Arc<GatewayState>> {
    let signer = KeypairSigner::from_base64(&config.sponsor_private_key)
        .map_err(|e| anyhow::anyhow!("SPONSOR_PRIVATE_KEYの読み込みに失敗しました: {e}"))?;
    let ledger = SuiRpcLedger::new(
        config.sui_rpc_url.clone(),
        config.rpc_timeout,
        config.gas_coin_lease,
    )?;
    let network = ledger.rpc_url().to_string();

    let engine = SponsorshipEngine::new(
        Arc::new(config.allow_list.clone()),
        Arc::new(signer),
        Arc::new(ledger),
        EngineConfig {
            gas_budget: config.gas_budget,
            submission_timeout: config.submission_timeout,
        },
    );
    let sponsor_address = engine.sponsor_address().to_string();

    Ok(Arc::new(GatewayState {
        engine,
        sponsor_address,
        network,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env()?;
    let state = build_state(&config)?;

    if config.allow_list.is_empty() {
        tracing::warn!("SPONSOR_ALLOWED_TARGETSが空です。全てのスポンサー要求が拒否されます");
    }
    tracing::info!(
        sponsor_address = %state.sponsor_address,
        network = %state.network,
        allowed_targets = config.allow_list.len(),
        gas_budget = config.gas_budget,
        "スポンサー設定を読み込みました"
    );

    let app = build_router(state);

    let addr = config.bind_addr();
    tracing::info!("Gas Station Gatewayを {} で起動します", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// テスト
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::Json;
    use base58::ToBase58;
    use base64::Engine;
    use serde_json::{json, Value};

    use gas_station_core::transaction::{
        Argument, CallArg, Command, ProgrammableMoveCall, ProgrammableTransaction,
    };
    use gas_station_core::{AllowList, TransactionIntent};
    use gas_station_crypto::{
        b64, ed25519_address, ed25519_sign_transaction, Ed25519SigningKey, SuiSignature,
    };
    use gas_station_types::*;

    use super::*;
    use crate::error::{GatewayError, MISSING_REQUIRED_FIELDS};

    const SPONSOR_SEED: [u8; 32] = [21u8; 32];
    const USER_SEED: [u8; 32] = [7u8; 32];

    type Requests = Arc<Mutex<Vec<Value>>>;

    fn rpc_result(result: Value) -> Value {
        json!({"jsonrpc": "2.0", "id": 1, "result": result})
    }

    /// モックSuiフルノードを起動する。
    /// `execute_error`がSomeなら`sui_executeTransactionBlock`はそのメッセージで失敗する。
    async fn start_mock_node(execute_error: Option<&'static str>) -> (String, Requests) {
        let requests: Requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        let mock_node = axum::Router::new().route(
            "/",
            axum::routing::post(move |Json(body): Json<Value>| {
                let recorded = recorded.clone();
                async move {
                    recorded.lock().unwrap().push(body.clone());
                    let coin_digest = [5u8; 32].to_base58();
                    let response = match body["method"].as_str().unwrap_or_default() {
                        "suix_getReferenceGasPrice" => rpc_result(json!("1000")),
                        "suix_getCoins" => rpc_result(json!({
                            "data": [{
                                "coinObjectId": "0xc0",
                                "version": "3",
                                "digest": coin_digest,
                                "balance": "1000000000",
                            }],
                            "nextCursor": null,
                            "hasNextPage": false,
                        })),
                        "suix_getBalance" => rpc_result(json!({"totalBalance": "1000000000"})),
                        "sui_executeTransactionBlock" => match execute_error {
                            Some(message) => json!({
                                "jsonrpc": "2.0",
                                "id": 1,
                                "error": {"code": -32002, "message": message},
                            }),
                            None => {
                                let tx_bytes = b64()
                                    .decode(body["params"][0].as_str().unwrap())
                                    .unwrap();
                                let digest =
                                    gas_station_core::transaction::transaction_digest_base58(
                                        &tx_bytes,
                                    );
                                rpc_result(json!({
                                    "digest": digest,
                                    "effects": {"status": {"status": "success"}},
                                }))
                            }
                        },
                        _ => json!({"jsonrpc": "2.0", "id": 1, "error": {"message": "unknown"}}),
                    };
                    Json(response)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, mock_node).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        (format!("http://127.0.0.1:{port}"), requests)
    }

    /// テスト用GatewayStateを構築するヘルパー
    fn test_state(rpc_url: &str) -> Arc<GatewayState> {
        let config = GatewayConfig {
            sponsor_private_key: b64().encode(SPONSOR_SEED),
            allow_list: AllowList::parse_csv("0xabc::profile::create_profile").unwrap(),
            sui_rpc_url: rpc_url.to_string(),
            gas_budget: 50_000_000,
            submission_timeout: Duration::from_secs(5),
            rpc_timeout: Duration::from_secs(5),
            gas_coin_lease: Duration::from_secs(60),
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        build_state(&config).unwrap()
    }

    fn user_key() -> Ed25519SigningKey {
        Ed25519SigningKey::from_bytes(&USER_SEED)
    }

    fn user_address() -> String {
        gas_station_core::SuiAddress(ed25519_address(&user_key().verifying_key())).to_string()
    }

    fn intent_b64(function: &str) -> String {
        let intent = TransactionIntent::from_programmable(ProgrammableTransaction {
            inputs: vec![CallArg::Pure(bcs::to_bytes(&"alice".to_string()).unwrap())],
            commands: vec![Command::MoveCall(Box::new(ProgrammableMoveCall {
                package: "0xabc".parse().unwrap(),
                module: "profile".to_string(),
                function: function.to_string(),
                type_arguments: vec![],
                arguments: vec![Argument::Input(0)],
            }))],
        });
        b64().encode(intent.to_bcs_bytes().unwrap())
    }

    /// prepareで署名対象を取得し、ユーザー鍵で署名したリクエストを作る
    async fn signed_request(state: &Arc<GatewayState>, function: &str) -> SponsorTxRequest {
        let tx_kind_b64 = intent_b64(function);
        let prepared = handle_prepare_tx(
            State(state.clone()),
            Ok(Json(PrepareTxRequest {
                tx_kind_b64: Some(tx_kind_b64.clone()),
                user_address: Some(user_address()),
            })),
        )
        .await
        .unwrap()
        .0;
        let tx_bytes = b64().decode(&prepared.tx_bytes_b64).unwrap();
        let signature = ed25519_sign_transaction(&user_key(), &tx_bytes);

        SponsorTxRequest {
            tx_kind_b64: Some(tx_kind_b64),
            user_signature_b64: Some(signature.to_base64()),
            user_address: Some(user_address()),
        }
    }

    async fn error_body(err: GatewayError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn count_method(requests: &Requests, method: &str) -> usize {
        requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r["method"] == method)
            .count()
    }

    /// GET / がスポンサーアドレスを返すことを確認
    #[tokio::test]
    async fn test_status() {
        let state = test_state("http://127.0.0.1:9");
        let Json(response) = handle_status(State(state)).await;

        let expected = gas_station_core::SuiAddress(ed25519_address(
            &Ed25519SigningKey::from_bytes(&SPONSOR_SEED).verifying_key(),
        ));
        assert_eq!(response.status, "online");
        assert_eq!(response.sponsor_address, expected.to_string());
    }

    /// 許可された create_profile の送信が200とダイジェストを返す
    #[tokio::test]
    async fn test_sponsor_tx_success() {
        let (url, requests) = start_mock_node(None).await;
        let state = test_state(&url);
        let request = signed_request(&state, "create_profile").await;
        let user_signature_b64 = request.user_signature_b64.clone().unwrap();
        let sponsor_address = state.engine.sponsor_address();

        let result = handle_sponsor_tx(State(state), Ok(Json(request))).await;
        assert!(result.is_ok(), "handle_sponsor_tx failed: {:?}", result.err());
        let response = result.unwrap().0;
        assert!(!response.digest.is_empty());

        let requests = requests.lock().unwrap();
        let execute = requests
            .iter()
            .find(|r| r["method"] == "sui_executeTransactionBlock")
            .unwrap();
        // 署名は [user, sponsor] の順
        let signatures = execute["params"][1].as_array().unwrap();
        assert_eq!(signatures.len(), 2);
        assert_eq!(signatures[0], user_signature_b64.as_str());
        let sponsor_signature =
            SuiSignature::from_base64(signatures[1].as_str().unwrap()).unwrap();
        assert_eq!(sponsor_signature.signer_address(), Some(sponsor_address.0));
    }

    /// user_address欠落は400 "Missing required fields"で、台帳に一切触れない
    #[tokio::test]
    async fn test_sponsor_tx_missing_fields() {
        let (url, requests) = start_mock_node(None).await;
        let state = test_state(&url);

        for request in [
            SponsorTxRequest {
                tx_kind_b64: Some(intent_b64("create_profile")),
                user_signature_b64: Some("AA==".to_string()),
                user_address: None,
            },
            SponsorTxRequest {
                tx_kind_b64: Some(String::new()),
                user_signature_b64: Some("AA==".to_string()),
                user_address: Some(user_address()),
            },
            SponsorTxRequest::default(),
        ] {
            let err = handle_sponsor_tx(State(state.clone()), Ok(Json(request)))
                .await
                .unwrap_err();
            let (status, body) = error_body(err).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, json!({"error": MISSING_REQUIRED_FIELDS}));
        }

        assert!(requests.lock().unwrap().is_empty());
    }

    /// 許可されていない関数は400で、送信も署名も行われない
    #[tokio::test]
    async fn test_sponsor_tx_disallowed_function() {
        let (url, requests) = start_mock_node(None).await;
        let state = test_state(&url);

        let signature = ed25519_sign_transaction(&user_key(), b"irrelevant");
        let err = handle_sponsor_tx(
            State(state),
            Ok(Json(SponsorTxRequest {
                tx_kind_b64: Some(intent_b64("delete_profile")),
                user_signature_b64: Some(signature.to_base64()),
                user_address: Some(user_address()),
            })),
        )
        .await
        .unwrap_err();

        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("profile::delete_profile"));
        assert!(requests.lock().unwrap().is_empty());
    }

    /// 台帳の "InsufficientGas" は500でメッセージがそのまま返る
    #[tokio::test]
    async fn test_sponsor_tx_execution_failure() {
        let (url, requests) = start_mock_node(Some("InsufficientGas")).await;
        let state = test_state(&url);
        let request = signed_request(&state, "create_profile").await;

        let err = handle_sponsor_tx(State(state), Ok(Json(request)))
            .await
            .unwrap_err();
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "InsufficientGas"}));
        assert_eq!(count_method(&requests, "sui_executeTransactionBlock"), 1);
    }

    #[tokio::test]
    async fn test_sponsor_tx_invalid_base64() {
        let state = test_state("http://127.0.0.1:9");
        let err = handle_sponsor_tx(
            State(state),
            Ok(Json(SponsorTxRequest {
                tx_kind_b64: Some("***".to_string()),
                user_signature_b64: Some("AA==".to_string()),
                user_address: Some(user_address()),
            })),
        )
        .await
        .unwrap_err();
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "tx_kind_b64 is not valid base64");
    }

    #[tokio::test]
    async fn test_prepare_missing_fields() {
        let state = test_state("http://127.0.0.1:9");
        let err = handle_prepare_tx(
            State(state),
            Ok(Json(PrepareTxRequest {
                tx_kind_b64: Some(intent_b64("create_profile")),
                user_address: None,
            })),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GatewayError::MissingFields));
    }

    #[tokio::test]
    async fn test_health() {
        let (url, _) = start_mock_node(None).await;
        let (status, Json(health)) = handle_health(State(test_state(&url))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, "healthy");
        assert_eq!(health.balance.as_deref(), Some("1000000000"));
        assert_eq!(health.network.as_deref(), Some(url.as_str()));
    }

    #[tokio::test]
    async fn test_health_unreachable_ledger() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (status, Json(health)) =
            handle_health(State(test_state(&format!("http://127.0.0.1:{port}")))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(health.status, "unhealthy");
        assert!(health.error.is_some());
        assert!(health.balance.is_none());
    }

    /// 実サーバー経由で、JSONとして不正なボディが400 {error}になることを確認
    #[tokio::test]
    async fn test_router_rejects_malformed_json() {
        let app = build_router(test_state("http://127.0.0.1:9"));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://127.0.0.1:{port}/sponsor-tx"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].is_string());

        let response = client
            .get(format!("http://127.0.0.1:{port}/"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let body: StatusResponse = response.json().await.unwrap();
        assert_eq!(body.status, "online");
    }
}
