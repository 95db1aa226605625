//! # Amazon S3 署名器
//!
//! PUT記述子に設定するヘッダ:
//! - `content-type`
//! - `x-amz-acl: private`
//! - `x-amz-meta-<key>`（メタデータ1件ごと）
//! - provider_managed: `x-amz-server-side-encryption: AES256`（SSE-S3）
//! - customer_managed: `x-amz-server-side-encryption: aws:kms` と
//!   `x-amz-server-side-encryption-aws-kms-key-id: <key_ref>`（SSE-KMS）
//!
//! 署名済みヘッダはそのままレスポンスに含め、クライアントは
//! アップロード時に同じヘッダを送信する。

use std::sync::Arc;
use std::time::Duration;

use bsync_types::{EncryptionType, PresignedUrl, Provider};
use http::HeaderMap;

use super::s3_compat::{
    insert_header, insert_metadata_header, into_presigned_url, RustS3Api, S3PresignApi,
    SigningMethod, SigningRequest,
};
use super::{PresignError, Presigner, PutOptions, DEFAULT_TTL};

/// S3_REGION / AWS_REGION 未設定時のリージョン
const DEFAULT_REGION: &str = "us-east-1";

/// Amazon S3 の署名器。
pub struct AwsS3Presigner {
    api: Arc<dyn S3PresignApi>,
}

impl AwsS3Presigner {
    pub fn new(api: Arc<dyn S3PresignApi>) -> Self {
        Self { api }
    }

    /// 環境変数と既定の認証情報チェーン（環境変数、プロファイル、
    /// インスタンスメタデータ）から構築する。
    ///
    /// `S3_ENDPOINT` が設定されている場合はS3互換ストレージ（MinIO等）として
    /// パススタイルで署名する。
    pub fn from_env() -> anyhow::Result<Self> {
        let region_name = std::env::var("S3_REGION")
            .or_else(|_| std::env::var("AWS_REGION"))
            .unwrap_or_else(|_| DEFAULT_REGION.to_string());

        let (region, path_style) = match std::env::var("S3_ENDPOINT") {
            Ok(endpoint) => {
                tracing::info!(s3_endpoint = %endpoint, "S3互換エンドポイントを設定");
                (
                    s3::Region::Custom {
                        region: region_name,
                        endpoint,
                    },
                    true,
                )
            }
            Err(_) => {
                let endpoint = format!("https://s3.{region_name}.amazonaws.com");
                (
                    s3::Region::Custom {
                        region: region_name,
                        endpoint,
                    },
                    false,
                )
            }
        };

        let credentials = s3::creds::Credentials::default()?;

        Ok(Self::new(Arc::new(RustS3Api::new(
            region,
            credentials,
            path_style,
        ))))
    }
}

/// PUT記述子のヘッダを組み立てる。
fn put_headers(options: &PutOptions) -> Result<HeaderMap, PresignError> {
    let mut headers = HeaderMap::new();

    if !options.content_type.is_empty() {
        insert_header(&mut headers, "content-type", &options.content_type)?;
    }
    insert_header(&mut headers, "x-amz-acl", "private")?;

    if let Some(encryption) = &options.encryption {
        match &encryption.encryption_type {
            Some(EncryptionType::ProviderManaged) => {
                insert_header(&mut headers, "x-amz-server-side-encryption", "AES256")?;
            }
            Some(EncryptionType::CustomerManaged) => {
                insert_header(&mut headers, "x-amz-server-side-encryption", "aws:kms")?;
                insert_header(
                    &mut headers,
                    "x-amz-server-side-encryption-aws-kms-key-id",
                    encryption.key_ref(),
                )?;
            }
            // ポリシー検証済みのため到達しない
            Some(EncryptionType::Other(_)) | None => {}
        }
    }

    for (key, value) in &options.metadata {
        insert_metadata_header(&mut headers, &format!("x-amz-meta-{key}"), value)?;
    }

    Ok(headers)
}

#[async_trait::async_trait]
impl Presigner for AwsS3Presigner {
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

        into_presigned_url(Provider::Aws, bucket, key, signed)
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

        into_presigned_url(Provider::Aws, bucket, key, signed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use bsync_types::{EncryptionSpec, TargetRef};
    use http::HeaderValue;

    use super::*;
    use crate::presign::test_support::MockS3Api;

    fn presigner(api: &Arc<MockS3Api>) -> AwsS3Presigner {
        AwsS3Presigner::new(api.clone())
    }

    fn options(
        content_type: &str,
        metadata: &[(&str, &str)],
        ttl: Duration,
        encryption: Option<EncryptionSpec>,
    ) -> PutOptions {
        PutOptions::new()
            .with_content_type(content_type)
            .with_metadata(
                metadata
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
            .with_ttl(ttl)
            .with_encryption(encryption)
    }

    #[tokio::test]
    async fn test_put_without_encryption() {
        let api = Arc::new(MockS3Api::returning("https://signed/put?ok=1"));
        let opts = options(
            "application/octet-stream",
            &[("a", "b")],
            Duration::from_secs(120),
            None,
        );

        let url = presigner(&api).presign_put("b1", "k1", &opts).await.unwrap();

        assert_eq!(url.url, "https://signed/put?ok=1");
        assert_eq!(url.target, TargetRef::new(Provider::Aws, "b1", "k1"));
        assert_eq!(url.headers["content-type"], "application/octet-stream");
        assert_eq!(url.headers["x-amz-meta-a"], "b");
        assert_eq!(url.headers["x-amz-acl"], "private");

        let requests = api.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.method, SigningMethod::Put);
        assert_eq!(req.bucket, "b1");
        assert_eq!(req.key, "k1");
        assert_eq!(req.expires, Duration::from_secs(120));
        assert!(req.headers.get("x-amz-server-side-encryption").is_none());
        assert!(req
            .headers
            .get("x-amz-server-side-encryption-aws-kms-key-id")
            .is_none());
    }

    #[tokio::test]
    async fn test_put_provider_managed_uses_sse_s3() {
        let api = Arc::new(MockS3Api::returning("https://signed/put?pm=1"));
        let opts = options(
            "text/plain",
            &[],
            Duration::from_secs(90),
            Some(EncryptionSpec::provider_managed()),
        );

        let url = presigner(&api).presign_put("b2", "k2", &opts).await.unwrap();

        assert_eq!(url.headers["x-amz-server-side-encryption"], "AES256");
        assert!(!url
            .headers
            .contains_key("x-amz-server-side-encryption-aws-kms-key-id"));
        // メタデータ空でもヘッダは揃う
        assert!(!url.headers.keys().any(|k| k.starts_with("x-amz-meta-")));
        assert_eq!(api.requests()[0].expires, Duration::from_secs(90));
    }

    #[tokio::test]
    async fn test_put_customer_managed_uses_sse_kms() {
        let key_ref = "arn:aws:kms:us-east-1:111122223333:key/abcd-ef";
        let api = Arc::new(MockS3Api::returning("https://signed/put?kms=1"));
        let opts = options(
            "application/json",
            &[("x", "y")],
            Duration::from_secs(30),
            Some(EncryptionSpec::customer_managed(key_ref)),
        );

        let url = presigner(&api).presign_put("b3", "k3", &opts).await.unwrap();

        assert_eq!(url.url, "https://signed/put?kms=1");
        assert_eq!(url.headers["x-amz-server-side-encryption"], "aws:kms");
        assert_eq!(
            url.headers["x-amz-server-side-encryption-aws-kms-key-id"],
            key_ref
        );
        assert_eq!(url.headers["x-amz-meta-x"], "y");
    }

    #[tokio::test]
    async fn test_put_flattens_multi_value_headers() {
        let mut signed = HeaderMap::new();
        signed.append("X-Custom", HeaderValue::from_static("first"));
        signed.append("X-Custom", HeaderValue::from_static("second"));
        signed.insert("Content-Type", HeaderValue::from_static("text/plain"));
        let api = Arc::new(MockS3Api::returning_headers(
            "https://signed/put?multi=1",
            signed,
        ));
        let opts = options("text/plain", &[], Duration::from_secs(75), None);

        let url = presigner(&api).presign_put("b4", "k4", &opts).await.unwrap();

        assert_eq!(
            url.headers,
            BTreeMap::from([
                ("content-type".to_string(), "text/plain".to_string()),
                ("x-custom".to_string(), "first".to_string()),
            ])
        );
    }

    #[tokio::test]
    async fn test_put_error_bubbles_up() {
        let api = Arc::new(MockS3Api::failing("http: Handler timeout"));
        let opts = options(
            "application/json",
            &[("z", "1")],
            Duration::from_secs(45),
            None,
        );

        let err = presigner(&api)
            .presign_put("b5", "k5", &opts)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "http: Handler timeout");
        assert_eq!(api.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_put_invalid_metadata_key_never_reaches_signer() {
        let api = Arc::new(MockS3Api::returning("https://signed/put"));
        let opts = options("text/plain", &[("bad key", "v")], Duration::from_secs(60), None);

        let err = presigner(&api)
            .presign_put("b1", "k1", &opts)
            .await
            .unwrap_err();

        assert!(matches!(err, PresignError::InvalidHeader { .. }));
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn test_put_case_colliding_metadata_never_reaches_signer() {
        let api = Arc::new(MockS3Api::returning("https://signed/put"));
        let opts = options(
            "text/plain",
            &[("A", "1"), ("a", "2")],
            Duration::from_secs(60),
            None,
        );

        let err = presigner(&api)
            .presign_put("b1", "k1", &opts)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("duplicate header name"), "{err}");
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn test_get_uses_default_ttl() {
        let api = Arc::new(MockS3Api::returning("https://signed/get"));
        let signer = presigner(&api);

        let url = signer.presign_get("b1", "k1", None).await.unwrap();
        assert_eq!(url.url, "https://signed/get");
        assert!(url.headers.is_empty());

        signer
            .presign_get("b1", "k1", Some(Duration::from_secs(300)))
            .await
            .unwrap();

        let requests = api.requests();
        assert_eq!(requests[0].method, SigningMethod::Get);
        assert_eq!(requests[0].expires, DEFAULT_TTL);
        assert_eq!(requests[1].expires, Duration::from_secs(300));
    }
}
