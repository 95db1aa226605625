//! # Google Cloud Storage 署名器
//!
//! Cloud Storage XML API の S3 互換モード（HMACキー + SigV4）で署名する。
//! provider_managed ではヘッダを付けない（Googleのデフォルト暗号化が常に適用される）。
//! customer_managed では `x-goog-encryption-kms-key-name` に Cloud KMS の鍵名を設定する。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bsync_types::{EncryptionType, PresignedUrl, Provider};
use http::HeaderMap;

use super::s3_compat::{
    insert_header, insert_metadata_header, into_presigned_url, RustS3Api, S3PresignApi,
    SigningMethod, SigningRequest,
};
use super::{PresignError, Presigner, PutOptions, DEFAULT_TTL};

/// GCS_ENDPOINT 未設定時のエンドポイント
const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Google Cloud Storage の署名器。
pub struct GcsPresigner {
    api: Arc<dyn S3PresignApi>,
}

impl GcsPresigner {
    pub fn new(api: Arc<dyn S3PresignApi>) -> Self {
        Self { api }
    }

    /// `GCS_HMAC_ACCESS_KEY` / `GCS_HMAC_SECRET_KEY` から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        let access_key = std::env::var("GCS_HMAC_ACCESS_KEY")
            .context("GCS_HMAC_ACCESS_KEY が設定されていません")?;
        let secret_key = std::env::var("GCS_HMAC_SECRET_KEY")
            .context("GCS_HMAC_SECRET_KEY が設定されていません")?;
        let endpoint =
            std::env::var("GCS_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());

        if endpoint != DEFAULT_ENDPOINT {
            tracing::info!(gcs_endpoint = %endpoint, "GCSエンドポイントを設定");
        }

        let region = s3::Region::Custom {
            region: "auto".to_string(),
            endpoint,
        };
        let credentials = s3::creds::Credentials::new(
            Some(&access_key),
            Some(&secret_key),
            None,
            None,
            None,
        )?;

        Ok(Self::new(Arc::new(RustS3Api::new(region, credentials, true))))
    }
}

fn put_headers(options: &PutOptions) -> Result<HeaderMap, PresignError> {
    let mut headers = HeaderMap::new();

    if !options.content_type.is_empty() {
        insert_header(&mut headers, "content-type", &options.content_type)?;
    }

    if let Some(encryption) = &options.encryption {
        if encryption.encryption_type == Some(EncryptionType::CustomerManaged) {
            insert_header(
                &mut headers,
                "x-goog-encryption-kms-key-name",
                encryption.key_ref(),
            )?;
        }
    }

    for (key, value) in &options.metadata {
        insert_metadata_header(&mut headers, &format!("x-goog-meta-{key}"), value)?;
    }

    Ok(headers)
}

#[async_trait::async_trait]
impl Presigner for GcsPresigner {
    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        options: &PutOptions,
    ) -> Result<PresignedUrl, PresignError> {
        let signed = self
            .api
            .presign(SigningRequest {
                method: SigningMethod::Put,
                bucket: bucket.to_string(),
                key: key.to_string(),
                headers: put_headers(options)?,
                expires: options.ttl,
            })
            .await?;

        into_presigned_url(Provider::Gcp, bucket, key, signed)
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<PresignedUrl, PresignError> {
        let signed = self
            .api
            .presign(SigningRequest {
                method: SigningMethod::Get,
                bucket: bucket.to_string(),
                key: key.to_string(),
                headers: HeaderMap::new(),
                expires: ttl.unwrap_or(DEFAULT_TTL),
            })
            .await?;

        into_presigned_url(Provider::Gcp, bucket, key, signed)
    }
}
