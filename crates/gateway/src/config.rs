//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。
//!
//! | 環境変数 | デフォルト |
//! |---|---|
//! | `GATEWAY_PROVIDER` | `aws` |
//! | `GATEWAY_LISTEN_ADDR` | `0.0.0.0:3000` |
//! | `GATEWAY_REQUEST_TIMEOUT_MS` | `10000` |
//!
//! プロバイダ固有の設定（リージョン、エンドポイント、HMACキー）は
//! 各署名器の `from_env` が読む。

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use bsync_types::Provider;

use crate::presign::Registry;

/// 待ち受けアドレスのデフォルト
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
/// リクエスト処理期限のデフォルト（ミリ秒）
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// 起動時に一度だけ読み込む設定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// このプロセスが担当する主プロバイダ
    pub primary_provider: Provider,
    /// 待ち受けアドレス
    pub listen_addr: SocketAddr,
    /// リクエストごとの処理期限
    pub request_timeout: Duration,
}

impl GatewayConfig {
    /// プロセス環境変数から読み込む。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の参照関数から読み込む。未設定の項目はデフォルト値。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let primary_provider = match lookup("GATEWAY_PROVIDER") {
            Some(value) => value
                .parse::<Provider>()
                .context("GATEWAY_PROVIDER が不正です")?,
            None => Provider::Aws,
        };

        let listen_addr = lookup("GATEWAY_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("GATEWAY_LISTEN_ADDR が不正です")?;

        let timeout_ms = match lookup("GATEWAY_REQUEST_TIMEOUT_MS") {
            Some(value) => value
                .parse::<u64>()
                .context("GATEWAY_REQUEST_TIMEOUT_MS が不正です")?,
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };
        if timeout_ms == 0 {
            anyhow::bail!("GATEWAY_REQUEST_TIMEOUT_MS は1以上である必要があります");
        }

        Ok(Self {
            primary_provider,
            listen_addr,
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Gatewayの共有状態。構築後は読み取り専用。
pub struct GatewayState {
    /// プロバイダごとの署名器
    pub registry: Registry,
    /// リクエストごとの処理期限
    pub request_timeout: Duration,
}

impl GatewayState {
    pub fn new(registry: Registry, request_timeout: Duration) -> Self {
        Self {
            registry,
            request_timeout,
        }
    }
}
