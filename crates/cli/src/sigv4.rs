//! # Gateway呼び出しのSigV4署名
//!
//! GatewayをAPI Gateway（IAM認証）の背後に置く場合、`POST /v1/put` に
//! サービス名 `execute-api` のSigV4署名が必要になる。
//! 認証情報はAWSの標準チェーン（環境変数 → プロファイル → インスタンスメタデータ）から解決する。

use http::header::HeaderValue;
use reqsign::{AwsConfig, AwsDefaultLoader, AwsV4Signer};

use crate::upload::{sha256_hex, UploadError};

/// 署名対象のサービス名
pub const SERVICE: &str = "execute-api";

const X_AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";

/// Gatewayへのリクエストに署名する。
pub struct GatewaySigner {
    signer: AwsV4Signer,
    loader: AwsDefaultLoader,
}

impl GatewaySigner {
    /// 標準の認証情報チェーンを使う署名器。
    pub fn new(client: reqwest::Client, region: &str) -> Self {
        let config = AwsConfig::default().from_profile().from_env();
        Self::from_config(client, region, config)
    }

    pub fn from_config(client: reqwest::Client, region: &str, config: AwsConfig) -> Self {
        Self {
            signer: AwsV4Signer::new(SERVICE, region),
            loader: AwsDefaultLoader::new(client, config),
        }
    }

    /// 本文のSHA-256をペイロードハッシュとしてヘッダに載せ、署名する。
    pub async fn sign(&self, request: &mut http::Request<Vec<u8>>) -> Result<(), UploadError> {
        let credential = self
            .loader
            .load()
            .await
            .map_err(|e| UploadError::Signing(format!("{e:#}")))?
            .ok_or(UploadError::NoCredentials)?;

        let payload_hash = sha256_hex(request.body());
        let payload_hash = HeaderValue::from_str(&payload_hash)
            .map_err(|e| UploadError::Signing(e.to_string()))?;
        request
            .headers_mut()
            .insert(X_AMZ_CONTENT_SHA256, payload_hash);

        self.signer
            .sign(request, &credential)
            .map_err(|e| UploadError::Signing(format!("{e:#}")))
    }
}
