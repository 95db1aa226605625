//! # bsync Gateway
//!
//! 複数のクラウドストレージに対する署名付きURLの発行サービス。
//! データ本体は経由せず、クライアントは発行されたURLへ直接アップロードする。
//!
//! ## 役割
//! - リクエスト検証（Content-Type、メタデータ、有効期間、ターゲット）
//! - ターゲットごとの暗号化ポリシーの適用
//! - プロバイダごとの署名器への振り分け
//!
//! ## API エンドポイント
//! - `POST /v1/put`: アップロード用署名付きURL発行
//! - `POST /v1/presign/put`: 同上
//! - `POST /v1/presign/get`: ダウンロード用署名付きURL発行

mod config;
mod endpoints;
mod error;
mod policy;
mod presign;
mod validate;

use std::sync::Arc;

use anyhow::Context;

use crate::config::{GatewayConfig, GatewayState};
use crate::endpoints::{handle_presign_get, handle_put_object};
use crate::presign::Registry;

/// GatewayのRouterを構築する。
pub(crate) fn app(state: Arc<GatewayState>) -> axum::Router {
    axum::Router::new()
        .route("/v1/put", axum::routing::post(handle_put_object))
        .route("/v1/presign/put", axum::routing::post(handle_put_object))
        .route("/v1/presign/get", axum::routing::post(handle_presign_get))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env()?;

    // 認証情報の解決（インスタンスメタデータ等）はブロッキングI/O
    let primary = config.primary_provider.clone();
    let registry = tokio::task::spawn_blocking(move || Registry::from_env(primary))
        .await
        .context("署名器の初期化タスクが異常終了")??;

    let providers: Vec<String> = registry.providers().iter().map(|p| p.to_string()).collect();
    tracing::info!(
        primary = %config.primary_provider,
        providers = ?providers,
        "署名器を初期化"
    );

    let state = Arc::new(GatewayState::new(registry, config.request_timeout));

    tracing::info!("Gatewayを {} で起動します", config.listen_addr);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
