//! # エンドポイントテスト用ヘルパー
//!
//! 呼び出しを記録するモック署名器と、実際のRouterを
//! `127.0.0.1:0` で起動するヘルパー。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bsync_types::{PresignedUrl, Provider, TargetRef};

use crate::config::GatewayState;
use crate::presign::{PresignError, Presigner, PutOptions, Registry};

/// モック署名器が受け取った呼び出し。
#[derive(Debug, Clone)]
pub(crate) enum MockCall {
    Put {
        bucket: String,
        key: String,
        options: PutOptions,
    },
    Get {
        bucket: String,
        key: String,
        ttl: Option<Duration>,
    },
}

/// 呼び出しを記録し `https://signed/<n>` を返すモック署名器。
pub(crate) struct MockPresigner {
    provider: Provider,
    error: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockPresigner {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            error: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 常にエラーを返すモック。
    pub fn failing(provider: Provider, message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::new(provider)
        }
    }

    /// 応答前に指定時間待機する。
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond(
        &self,
        call: MockCall,
        bucket: &str,
        key: &str,
        headers: BTreeMap<String, String>,
    ) -> Result<PresignedUrl, PresignError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.error {
            return Err(PresignError::Provider(message.clone()));
        }

        Ok(PresignedUrl {
            target: TargetRef::new(self.provider.clone(), bucket, key),
            url: format!("https://signed/{n}"),
            headers,
        })
    }
}

#[async_trait::async_trait]
impl Presigner for MockPresigner {
    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        options: &PutOptions,
    ) -> Result<PresignedUrl, PresignError> {
        let headers = BTreeMap::from([("content-type".to_string(), options.content_type.clone())]);
        let call = MockCall::Put {
            bucket: bucket.to_string(),
            key: key.to_string(),
            options: options.clone(),
        };
        self.respond(call, bucket, key, headers).await
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<PresignedUrl, PresignError> {
        let call = MockCall::Get {
            bucket: bucket.to_string(),
            key: key.to_string(),
            ttl,
        };
        self.respond(call, bucket, key, BTreeMap::new()).await
    }
}

/// Routerを起動し、ベースURL（`http://127.0.0.1:<port>`）を返す。
pub(crate) async fn start_gateway(state: Arc<GatewayState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, crate::app(state)).await.unwrap();
    });
    format!("http://{addr}")
}

/// モック署名器を登録したGatewayを起動する。処理期限は5秒。
pub(crate) async fn gateway_with<I>(signers: I) -> (String, Arc<GatewayState>)
where
    I: IntoIterator<Item = (Provider, Arc<MockPresigner>)>,
{
    let registry = Registry::from_signers(
        signers
            .into_iter()
            .map(|(provider, signer)| (provider, signer as Arc<dyn Presigner>)),
    );
    let state = Arc::new(GatewayState::new(registry, Duration::from_secs(5)));
    let base = start_gateway(state.clone()).await;
    (base, state)
}
