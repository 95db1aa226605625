//! # S3互換署名API
//!
//! AWS S3とGCS（S3互換モード）の署名器が共有する下位インターフェース。
//! 署名器はプロバイダ固有のヘッダを組み立てて `SigningRequest` を作り、
//! 実際のSigV4クエリ署名は `S3PresignApi` に委譲する。

use std::time::Duration;

use bsync_types::{PresignedUrl, Provider, TargetRef};
use http::{HeaderMap, HeaderName, HeaderValue};

use super::{flatten_headers, PresignError};

/// 署名対象のHTTPメソッド。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMethod {
    Put,
    Get,
}

/// 署名ライブラリに渡すリクエスト記述子。
#[derive(Debug, Clone)]
pub struct SigningRequest {
    pub method: SigningMethod,
    pub bucket: String,
    pub key: String,
    /// 署名に含めるヘッダ。クライアントは同じヘッダを送信する必要がある。
    pub headers: HeaderMap,
    pub expires: Duration,
}

/// 署名結果。
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub url: String,
    /// 署名済みヘッダ（同名ヘッダが複数値を持つ場合がある）
    pub signed_headers: HeaderMap,
}

/// S3互換の署名付きURL生成API。
#[async_trait::async_trait]
pub trait S3PresignApi: Send + Sync {
    async fn presign(&self, request: SigningRequest) -> Result<SignedRequest, PresignError>;
}

/// ヘッダを記述子に設定する。名前・値として不正な入力はエラー。
pub(crate) fn insert_header(
    headers: &mut HeaderMap,
    name: &str,
    value: &str,
) -> Result<(), PresignError> {
    let (header_name, header_value) = parse_header(name, value)?;
    headers.insert(header_name, header_value);
    Ok(())
}

/// メタデータヘッダを設定する。正規化後の名前が既に存在する場合はエラー。
pub(crate) fn insert_metadata_header(
    headers: &mut HeaderMap,
    name: &str,
    value: &str,
) -> Result<(), PresignError> {
    let (header_name, header_value) = parse_header(name, value)?;
    if headers.contains_key(&header_name) {
        return Err(PresignError::InvalidHeader {
            name: name.to_string(),
            reason: "duplicate header name".to_string(),
        });
    }
    headers.insert(header_name, header_value);
    Ok(())
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), PresignError> {
    let invalid = |reason: String| PresignError::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    Ok((header_name, header_value))
}

/// 署名結果を `PresignedUrl` に変換する。ターゲットには暗号化指定を含めない。
pub(crate) fn into_presigned_url(
    provider: Provider,
    bucket: &str,
    key: &str,
    signed: SignedRequest,
) -> Result<PresignedUrl, PresignError> {
    Ok(PresignedUrl {
        target: TargetRef::new(provider, bucket, key),
        url: signed.url,
        headers: flatten_headers(&signed.signed_headers)?,
    })
}

// ---------------------------------------------------------------------------
// rust-s3 実装
// ---------------------------------------------------------------------------

/// `rust-s3` によるSigV4クエリ署名。
///
/// バケットごとに `s3::Bucket` を組み立てる。リージョンと認証情報は
/// 起動時に一度だけ解決し、以降は読み取り専用で共有する。
#[cfg(any(feature = "vendor-aws", feature = "vendor-gcp"))]
pub struct RustS3Api {
    region: s3::Region,
    credentials: s3::creds::Credentials,
    path_style: bool,
}

#[cfg(any(feature = "vendor-aws", feature = "vendor-gcp"))]
impl RustS3Api {
    pub fn new(
        region: s3::Region,
        credentials: s3::creds::Credentials,
        path_style: bool,
    ) -> Self {
        Self {
            region,
            credentials,
            path_style,
        }
    }

    fn bucket(&self, name: &str) -> Result<Box<s3::Bucket>, PresignError> {
        let bucket = s3::Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| PresignError::Provider(e.to_string()))?;
        Ok(if self.path_style {
            bucket.with_path_style()
        } else {
            bucket
        })
    }
}

#[cfg(any(feature = "vendor-aws", feature = "vendor-gcp"))]
#[async_trait::async_trait]
impl S3PresignApi for RustS3Api {
    async fn presign(&self, request: SigningRequest) -> Result<SignedRequest, PresignError> {
        let bucket = self.bucket(&request.bucket)?;
        let expiry_secs = u32::try_from(request.expires.as_secs())
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(PresignError::InvalidExpiry(request.expires))?;

        let url = match request.method {
            SigningMethod::Put => {
                let headers = to_rust_s3_headers(&request.headers)?;
                bucket
                    .presign_put(&request.key, expiry_secs, Some(headers), None)
                    .await
            }
            SigningMethod::Get => bucket.presign_get(&request.key, expiry_secs, None).await,
        }
        .map_err(|e| PresignError::Provider(e.to_string()))?;

        Ok(SignedRequest {
            url,
            signed_headers: request.headers,
        })
    }
}

/// rust-s3 が受け取る http 0.2 の `HeaderMap` に詰め替える。
#[cfg(any(feature = "vendor-aws", feature = "vendor-gcp"))]
fn to_rust_s3_headers(headers: &HeaderMap) -> Result<http02::HeaderMap, PresignError> {
    let mut converted = http02::HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let invalid = |reason: String| PresignError::InvalidHeader {
            name: name.to_string(),
            reason,
        };
        let name = http02::HeaderName::from_bytes(name.as_str().as_bytes())
            .map_err(|e| invalid(e.to_string()))?;
        let value =
            http02::HeaderValue::from_bytes(value.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        converted.append(name, value);
    }
    Ok(converted)
}
