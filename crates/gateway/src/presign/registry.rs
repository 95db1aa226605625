//! # 署名器レジストリ
//!
//! プロバイダ識別子から署名器を引く。起動時に一度だけ構築し、
//! 以降は `Arc<GatewayState>` 経由で全リクエストから読み取り専用で共有する。
//!
//! - 主プロバイダ（`GATEWAY_PROVIDER`）の署名器が構築できない場合は起動失敗
//! - それ以外のプロバイダの構築失敗は warn ログを出して登録しない

use std::collections::HashMap;
use std::sync::Arc;

use bsync_types::Provider;

use super::Presigner;

/// レジストリ構築エラー。
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// 主プロバイダの署名器を構築できない
    #[error("primary provider {provider} unavailable: {reason}")]
    PrimaryUnavailable { provider: Provider, reason: String },
}

/// プロバイダ → 署名器の対応表。
pub struct Registry {
    signers: HashMap<Provider, Arc<dyn Presigner>>,
}

impl Registry {
    /// 署名器の構築結果からレジストリを組み立てる。
    pub fn build<I>(primary: Provider, candidates: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (Provider, anyhow::Result<Arc<dyn Presigner>>)>,
    {
        let mut signers = HashMap::new();

        for (provider, result) in candidates {
            match result {
                Ok(signer) => {
                    signers.insert(provider, signer);
                }
                Err(e) if provider == primary => {
                    return Err(RegistryError::PrimaryUnavailable {
                        provider,
                        reason: format!("{e:#}"),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %provider,
                        error = %format!("{e:#}"),
                        "署名器の初期化に失敗したため登録しません"
                    );
                }
            }
        }

        if !signers.contains_key(&primary) {
            return Err(RegistryError::PrimaryUnavailable {
                provider: primary,
                reason: "no signer available for this provider".to_string(),
            });
        }

        Ok(Self { signers })
    }

    /// 環境変数から対応プロバイダ全ての署名器を構築する。
    ///
    /// 認証情報の解決がブロッキングI/Oを伴うため、非同期コンテキストからは
    /// `spawn_blocking` 経由で呼ぶこと。
    pub fn from_env(primary: Provider) -> Result<Self, RegistryError> {
        let mut candidates: Vec<(Provider, anyhow::Result<Arc<dyn Presigner>>)> = Vec::new();

        #[cfg(feature = "vendor-aws")]
        candidates.push((
            Provider::Aws,
            super::aws::AwsS3Presigner::from_env()
                .map(|signer| Arc::new(signer) as Arc<dyn Presigner>),
        ));

        #[cfg(feature = "vendor-gcp")]
        candidates.push((
            Provider::Gcp,
            super::gcs::GcsPresigner::from_env()
                .map(|signer| Arc::new(signer) as Arc<dyn Presigner>),
        ));

        Self::build(primary, candidates)
    }

    /// 構築済みの署名器から組み立てる（主プロバイダの検査なし）。
    pub fn from_signers<I>(signers: I) -> Self
    where
        I: IntoIterator<Item = (Provider, Arc<dyn Presigner>)>,
    {
        Self {
            signers: signers.into_iter().collect(),
        }
    }

    /// プロバイダの署名器を取得する。未登録の場合は None。
    pub fn get(&self, provider: &Provider) -> Option<&dyn Presigner> {
        self.signers.get(provider).map(|signer| signer.as_ref())
    }

    /// 登録済みプロバイダ（識別子順）
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.signers.keys().cloned().collect();
        providers.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        providers
    }
}
