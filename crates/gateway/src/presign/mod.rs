//! # 署名器
//!
//! プロバイダごとの署名付きURL生成を `Presigner` トレイトで抽象化する。
//! 実装はプロバイダごとに1つ:
//!
//! - `aws`: Amazon S3（SigV4）
//! - `gcs`: Google Cloud Storage（XML API の S3 互換モード）
//!
//! どちらも `s3_compat::S3PresignApi` を経由して署名するため、
//! テストでは署名ライブラリをモックに差し替えられる。

#[cfg(feature = "vendor-aws")]
pub mod aws;
#[cfg(feature = "vendor-gcp")]
pub mod gcs;
pub mod registry;
pub mod s3_compat;

#[cfg(test)]
pub(crate) mod test_support;

use std::collections::BTreeMap;
use std::time::Duration;

use bsync_types::{EncryptionSpec, PresignedUrl};
use http::HeaderMap;

pub use registry::Registry;

/// 署名付きURLのデフォルト有効期間（15分）
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// 署名器のエラー。プロバイダ側の原因はそのまま保持する。
#[derive(Debug, thiserror::Error)]
pub enum PresignError {
    /// 署名ライブラリ/プロバイダが返したエラー
    #[error("{0}")]
    Provider(String),
    /// ヘッダ名または値として使用できない入力
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },
    /// プロバイダが受け付けない有効期間
    #[error("invalid expiry {0:?}")]
    InvalidExpiry(Duration),
}

/// PUT署名のパラメータ。
///
/// デフォルト値（Content-Typeなし、メタデータ空、TTL 15分、暗号化なし）に
/// `with_*` で上書きを重ねて構築する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    /// Content-Type（空の場合はプロバイダのデフォルト）
    pub content_type: String,
    /// オブジェクトメタデータ
    pub metadata: BTreeMap<String, String>,
    /// 署名付きURLの有効期間
    pub ttl: Duration,
    /// サーバーサイド暗号化指定
    pub encryption: Option<EncryptionSpec>,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            content_type: String::new(),
            metadata: BTreeMap::new(),
            ttl: DEFAULT_TTL,
            encryption: None,
        }
    }
}

impl PutOptions {
    /// デフォルト値で構築する。
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_encryption(mut self, encryption: Option<EncryptionSpec>) -> Self {
        self.encryption = encryption;
        self
    }
}

/// プロバイダ固有の署名器。
///
/// レジストリに登録され、全リクエストから並行に参照される。
/// リトライは行わない。失敗はそのまま呼び出し元に返す。
#[async_trait::async_trait]
pub trait Presigner: Send + Sync {
    /// PUT用の署名付きURLを生成する。
    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        options: &PutOptions,
    ) -> Result<PresignedUrl, PresignError>;

    /// GET用の署名付きURLを生成する。`ttl` 未指定時は `DEFAULT_TTL`。
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<PresignedUrl, PresignError>;
}

/// 複数値ヘッダを単一値に平坦化する。同名ヘッダは最初の値を採用する。
pub fn flatten_headers(headers: &HeaderMap) -> Result<BTreeMap<String, String>, PresignError> {
    let mut flat = BTreeMap::new();
    for name in headers.keys() {
        let Some(value) = headers.get(name) else {
            continue;
        };
        let value = value.to_str().map_err(|e| PresignError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        flat.insert(name.as_str().to_string(), value.to_string());
    }
    Ok(flat)
}
