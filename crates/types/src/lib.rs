//! # bsync 共有型定義
//!
//! GatewayとCLIの間でやり取りされるJSONリクエスト/レスポンスを
//! Rust構造体として提供する。フィールド名はそのままワイヤ上の契約となる。
//!
//! ## 空文字列の扱い
//! 任意フィールドは「未指定」と「空文字列」を区別しない。
//! どちらも未設定として扱う。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// プロバイダ
// ---------------------------------------------------------------------------

/// ストレージプロバイダ識別子。
///
/// 未知の識別子もデコード自体は成功させ、`Other` として保持する。
/// 署名器が登録されていなければGatewayが "provider not configured" として拒否する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Provider {
    /// Amazon S3
    Aws,
    /// Azure Blob Storage
    Azure,
    /// Google Cloud Storage
    Gcp,
    /// 上記以外の識別子
    Other(String),
}

impl Provider {
    /// ワイヤ上の識別子を返す。
    pub fn as_str(&self) -> &str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
            Provider::Gcp => "gcp",
            Provider::Other(other) => other,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Provider {
    fn from(value: String) -> Self {
        match value.as_str() {
            "aws" => Provider::Aws,
            "azure" => Provider::Azure,
            "gcp" => Provider::Gcp,
            _ => Provider::Other(value),
        }
    }
}

impl From<Provider> for String {
    fn from(value: Provider) -> Self {
        match value {
            Provider::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

/// 未知のプロバイダ識別子。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0:?} (expected aws, azure or gcp)")]
pub struct ParseProviderError(pub String);

/// 既知のプロバイダのみを受け付ける（設定値・CLI引数用）。
impl FromStr for Provider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Provider::from(s.to_string()) {
            Provider::Other(other) => Err(ParseProviderError(other)),
            known => Ok(known),
        }
    }
}

// ---------------------------------------------------------------------------
// 暗号化指定
// ---------------------------------------------------------------------------

/// サーバーサイド暗号化の種別。
///
/// 未知の値もデコード自体は成功させ、`Other` として保持する。
/// 拒否するかどうかはGatewayの暗号化ポリシーが決める。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EncryptionType {
    /// プロバイダが鍵を完全に管理する暗号化
    ProviderManaged,
    /// `key_ref` で指定した外部管理鍵による暗号化
    CustomerManaged,
    /// 上記以外の値
    Other(String),
}

impl From<String> for EncryptionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "provider_managed" => EncryptionType::ProviderManaged,
            "customer_managed" => EncryptionType::CustomerManaged,
            _ => EncryptionType::Other(value),
        }
    }
}

impl From<EncryptionType> for String {
    fn from(value: EncryptionType) -> Self {
        match value {
            EncryptionType::ProviderManaged => "provider_managed".to_string(),
            EncryptionType::CustomerManaged => "customer_managed".to_string(),
            EncryptionType::Other(other) => other,
        }
    }
}

/// ターゲットごとの暗号化指定。
///
/// 顧客提供鍵（`customer_key_*`）のフィールドはスキーマ上存在するが、
/// Gatewayは生の鍵素材を扱わないため常に拒否される。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionSpec {
    /// 暗号化種別。未指定の場合はポリシー違反となる。
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub encryption_type: Option<EncryptionType>,
    /// プロバイダ側の管理鍵の参照（KMSキーARN、エイリアス、Cloud KMSキー名等）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ref: Option<String>,
    /// Base64エンコードされた顧客提供鍵
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_key_b64: Option<String>,
    /// 顧客提供鍵のMD5（Base64）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_key_md5_b64: Option<String>,
    /// 顧客提供鍵のSHA-256（Base64）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_key_sha256_b64: Option<String>,
}

impl EncryptionSpec {
    /// プロバイダ管理鍵による暗号化指定を構築する。
    pub fn provider_managed() -> Self {
        Self {
            encryption_type: Some(EncryptionType::ProviderManaged),
            ..Self::default()
        }
    }

    /// 外部管理鍵による暗号化指定を構築する。
    pub fn customer_managed(key_ref: impl Into<String>) -> Self {
        Self {
            encryption_type: Some(EncryptionType::CustomerManaged),
            key_ref: Some(key_ref.into()),
            ..Self::default()
        }
    }

    /// `key_ref` を返す。未指定の場合は空文字列。
    pub fn key_ref(&self) -> &str {
        self.key_ref.as_deref().unwrap_or_default()
    }

    /// 顧客提供鍵のフィールドがいずれか設定されているか。
    pub fn has_customer_key_material(&self) -> bool {
        [
            &self.customer_key_b64,
            &self.customer_key_md5_b64,
            &self.customer_key_sha256_b64,
        ]
        .into_iter()
        .any(|field| field.as_deref().is_some_and(|v| !v.is_empty()))
    }
}

// ---------------------------------------------------------------------------
// ターゲット
// ---------------------------------------------------------------------------

/// アップロード先の1つ（プロバイダ + バケット + キー）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    /// ストレージプロバイダ
    pub provider: Provider,
    /// バケット名
    #[serde(default)]
    pub bucket: String,
    /// オブジェクトキー
    #[serde(default)]
    pub key: String,
    /// 暗号化指定。Noneの場合はプロバイダ/バケットのデフォルトに従う。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionSpec>,
}

impl TargetRef {
    /// 暗号化指定なしのターゲットを構築する。
    pub fn new(provider: Provider, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            provider,
            bucket: bucket.into(),
            key: key.into(),
            encryption: None,
        }
    }

    /// 暗号化指定を付与する。
    pub fn with_encryption(mut self, encryption: EncryptionSpec) -> Self {
        self.encryption = Some(encryption);
        self
    }
}

// ---------------------------------------------------------------------------
// API リクエスト/レスポンス
// ---------------------------------------------------------------------------

/// `POST /v1/put` リクエスト。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutObjectRequest {
    /// レプリケーション先の一覧（0件も可）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replication_targets: Vec<TargetRef>,
    /// オブジェクトのMIMEタイプ
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    /// オブジェクトメタデータ。キー順に保持する。
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// 署名付きURLの有効期間（ミリ秒）
    #[serde(default)]
    pub expires_ms: i64,
}

/// ターゲット1件分の署名付きURL。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedUrl {
    /// 署名対象のターゲット（暗号化指定は含まない）
    #[serde(rename = "target")]
    pub target: TargetRef,
    /// 署名付きURL
    pub url: String,
    /// アップロード時にクライアントが送信すべきヘッダ
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// `POST /v1/put` レスポンス。ターゲットの入力順を保持する。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutObjectResponse {
    /// ターゲットごとの署名付きURL
    pub targets: Vec<PresignedUrl>,
}

/// `POST /v1/presign/get` リクエスト。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetObjectRequest {
    /// ダウンロード対象
    pub target: TargetRef,
    /// 有効期間（ミリ秒）。未指定の場合は署名器のデフォルト。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_ms: Option<i64>,
}

// ---------------------------------------------------------------------------
// テスト
// ---------------------------------------------------------------------------
